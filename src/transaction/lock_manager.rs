//! Row-level two-phase locking with wound-wait deadlock prevention.
//!
//! Wound-wait: an older transaction forces younger conflicting ones into
//! ABORTED; a younger transaction waits behind older ones. A waiter is
//! therefore always the oldest among the requests it waits behind, which
//! rules out cycles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use log::debug;
use thiserror::Error;

use crate::common::types::{Rid, TxnId};
use crate::transaction::transaction::{IsolationLevel, Transaction, TransactionState};

/// Lock modes a request can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Why a transaction was aborted by the lock manager. A wound surfaces as
/// `LockOnShrinking` because the state is already `Aborted` when the waiter
/// unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    LockOnShrinking,
    LockSharedOnReadUncommitted,
    UpgradeConflict,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transaction {txn_id} aborted: {reason:?}")]
pub struct LockAbortError {
    pub txn_id: TxnId,
    pub reason: AbortReason,
}

impl LockAbortError {
    fn new(txn_id: TxnId, reason: AbortReason) -> Self {
        Self { txn_id, reason }
    }
}

/// A request for a lock by a transaction. The transaction handle is kept so
/// older requesters can wound this transaction across threads.
struct LockRequest {
    txn: Arc<Transaction>,
    mode: LockMode,
    granted: bool,
}

impl LockRequest {
    fn new(txn: Arc<Transaction>, mode: LockMode) -> Self {
        Self {
            txn,
            mode,
            granted: false,
        }
    }
}

/// Per-row request queue: FIFO order (front = oldest), guarded by its own
/// mutex, with a condvar waiters block on.
#[derive(Default)]
struct LockRequestQueue {
    requests: Mutex<VecDeque<LockRequest>>,
    cv: Condvar,
}

/// The lock manager. The outer mutex protects only the map from row id to
/// queue; queues are created on first request for a row and dropped when an
/// unlock empties them.
#[derive(Default)]
pub struct LockManager {
    lock_table: Mutex<HashMap<Rid, Arc<LockRequestQueue>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a shared lock on `rid`
    pub fn lock_shared(&self, txn: &Arc<Transaction>, rid: Rid) -> Result<(), LockAbortError> {
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(LockAbortError::new(txn.id(), AbortReason::LockOnShrinking));
        }
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            txn.set_state(TransactionState::Aborted);
            return Err(LockAbortError::new(
                txn.id(),
                AbortReason::LockSharedOnReadUncommitted,
            ));
        }

        let queue;
        let mut requests;
        {
            // Requests are enqueued under the table mutex so an unlock can
            // never observe-and-drop a queue with a push in flight.
            let mut table = self.lock_table.lock().unwrap();
            queue = table.entry(rid).or_default().clone();
            requests = queue.requests.lock().unwrap();
        }

        requests.push_back(LockRequest::new(txn.clone(), LockMode::Shared));
        Self::wound_younger(txn, &requests, &queue, |req| req.mode == LockMode::Exclusive);

        // Wait until wounded or no exclusive request from another
        // transaction sits ahead of us
        requests = queue
            .cv
            .wait_while(requests, |reqs| {
                if txn.state() != TransactionState::Growing {
                    return false;
                }
                for req in reqs.iter() {
                    if req.txn.id() == txn.id() {
                        return false;
                    }
                    if req.mode == LockMode::Exclusive {
                        return true;
                    }
                }
                false
            })
            .unwrap();

        Self::finish_wait(txn, rid, LockMode::Shared, &queue, requests)
    }

    /// Acquire an exclusive lock on `rid`
    pub fn lock_exclusive(&self, txn: &Arc<Transaction>, rid: Rid) -> Result<(), LockAbortError> {
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(LockAbortError::new(txn.id(), AbortReason::LockOnShrinking));
        }

        let queue;
        let mut requests;
        {
            let mut table = self.lock_table.lock().unwrap();
            queue = table.entry(rid).or_default().clone();
            requests = queue.requests.lock().unwrap();
        }

        requests.push_back(LockRequest::new(txn.clone(), LockMode::Exclusive));
        Self::wound_younger(txn, &requests, &queue, |_| true);

        requests = Self::wait_for_exclusive(txn, &queue, requests);

        Self::finish_wait(txn, rid, LockMode::Exclusive, &queue, requests)
    }

    /// Upgrade an already-held shared lock to an exclusive one
    pub fn lock_upgrade(&self, txn: &Arc<Transaction>, rid: Rid) -> Result<(), LockAbortError> {
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(LockAbortError::new(txn.id(), AbortReason::LockOnShrinking));
        }

        let queue;
        let mut requests;
        {
            let mut table = self.lock_table.lock().unwrap();
            match table.get(&rid) {
                Some(q) => {
                    queue = q.clone();
                    requests = queue.requests.lock().unwrap();
                }
                None => {
                    txn.set_state(TransactionState::Aborted);
                    return Err(LockAbortError::new(txn.id(), AbortReason::UpgradeConflict));
                }
            }
        }

        // The shared request being upgraded leaves the queue first
        match requests.iter().position(|req| req.txn.id() == txn.id()) {
            Some(pos) => {
                requests.remove(pos);
                txn.shared_lock_set().lock().remove(&rid);
            }
            None => {
                drop(requests);
                txn.set_state(TransactionState::Aborted);
                return Err(LockAbortError::new(txn.id(), AbortReason::UpgradeConflict));
            }
        }

        requests.push_back(LockRequest::new(txn.clone(), LockMode::Exclusive));
        Self::wound_younger(txn, &requests, &queue, |_| true);

        requests = Self::wait_for_exclusive(txn, &queue, requests);

        Self::finish_wait(txn, rid, LockMode::Exclusive, &queue, requests)
    }

    /// Release `txn`'s lock on `rid`. The first unlock moves a growing
    /// transaction into the shrinking phase, whether or not a request for
    /// this row was actually held. Returns whether a request was removed.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        txn.shared_lock_set().lock().remove(&rid);
        txn.exclusive_lock_set().lock().remove(&rid);

        let mut table = self.lock_table.lock().unwrap();

        let mut removed = false;
        let mut now_empty = false;
        if let Some(queue) = table.get(&rid) {
            let mut requests = queue.requests.lock().unwrap();
            if let Some(pos) = requests.iter().position(|req| req.txn.id() == txn.id()) {
                requests.remove(pos);
                removed = true;
            }
            now_empty = requests.is_empty();
            queue.cv.notify_all();
        }
        if now_empty {
            table.remove(&rid);
        }

        if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }

        removed
    }

    /// Force every younger transaction in the queue whose request matches
    /// `conflicts` into ABORTED, then wake the queue so wounded waiters can
    /// unwind.
    fn wound_younger(
        txn: &Arc<Transaction>,
        requests: &VecDeque<LockRequest>,
        queue: &LockRequestQueue,
        conflicts: impl Fn(&LockRequest) -> bool,
    ) {
        let mut wounded = false;
        for req in requests.iter() {
            if req.txn.id() > txn.id() && conflicts(req) {
                debug!("txn {} wounds txn {}", txn.id(), req.txn.id());
                req.txn.set_state(TransactionState::Aborted);
                wounded = true;
            }
        }
        if wounded {
            queue.cv.notify_all();
        }
    }

    /// Block until wounded or this transaction owns the oldest request in
    /// the queue (every older request has been removed)
    fn wait_for_exclusive<'a>(
        txn: &Arc<Transaction>,
        queue: &'a LockRequestQueue,
        requests: std::sync::MutexGuard<'a, VecDeque<LockRequest>>,
    ) -> std::sync::MutexGuard<'a, VecDeque<LockRequest>> {
        queue
            .cv
            .wait_while(requests, |reqs| {
                if txn.state() != TransactionState::Growing {
                    return false;
                }
                reqs.front().map_or(false, |req| req.txn.id() != txn.id())
            })
            .unwrap()
    }

    /// Common tail of every lock wait: a transaction that is no longer
    /// growing was wounded and unwinds; otherwise its request is granted.
    fn finish_wait(
        txn: &Arc<Transaction>,
        rid: Rid,
        mode: LockMode,
        queue: &LockRequestQueue,
        mut requests: std::sync::MutexGuard<'_, VecDeque<LockRequest>>,
    ) -> Result<(), LockAbortError> {
        if txn.state() != TransactionState::Growing {
            if let Some(pos) = requests
                .iter()
                .position(|req| req.txn.id() == txn.id() && !req.granted)
            {
                requests.remove(pos);
            }
            queue.cv.notify_all();
            return Err(LockAbortError::new(txn.id(), AbortReason::LockOnShrinking));
        }

        if let Some(req) = requests
            .iter_mut()
            .find(|req| req.txn.id() == txn.id() && !req.granted)
        {
            req.granted = true;
        }

        match mode {
            LockMode::Shared => txn.shared_lock_set().lock().insert(rid),
            LockMode::Exclusive => txn.exclusive_lock_set().lock().insert(rid),
        };

        Ok(())
    }
}
