// Represents an active database transaction and the two-phase locking
// state machine it moves through.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, Rid, TxnId};
use crate::transaction::wal::log_manager::LogManager;
use crate::transaction::wal::log_record::LogRecordType;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Two-phase locking states. Locks may only be acquired while growing;
/// the first unlock moves the transaction to shrinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TxnId),

    #[error("Failed to write to WAL: {0}")]
    LogError(String),

    #[error("Internal transaction error: {0}")]
    InternalError(String),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Transaction handle. Shared across threads through an `Arc` so the lock
/// manager can wound it while its owner is running or waiting; state and
/// lock sets therefore sit behind their own locks.
pub struct Transaction {
    id: TxnId,
    state: Mutex<TransactionState>,
    isolation_level: IsolationLevel,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    log_manager: Arc<LogManager>,
    first_lsn: AtomicU64,
    last_lsn: AtomicU64,
}

impl Transaction {
    pub fn new(txn_id: TxnId, log_manager: Arc<LogManager>, isolation_level: IsolationLevel) -> Self {
        Self {
            id: txn_id,
            state: Mutex::new(TransactionState::Growing),
            isolation_level,
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            log_manager,
            first_lsn: AtomicU64::new(0),
            last_lsn: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Row ids this transaction holds shared locks on
    pub fn shared_lock_set(&self) -> &Mutex<HashSet<Rid>> {
        &self.shared_lock_set
    }

    /// Row ids this transaction holds exclusive locks on
    pub fn exclusive_lock_set(&self) -> &Mutex<HashSet<Rid>> {
        &self.exclusive_lock_set
    }

    pub fn is_shared_locked(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn is_exclusive_locked(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    /// Begin the transaction by writing a BEGIN record to the log
    pub fn begin(&self) -> Result<Lsn> {
        let lsn = self
            .log_manager
            .append_record(self.id, 0, LogRecordType::Begin)
            .map_err(|e| TransactionError::LogError(e.to_string()))?;

        self.first_lsn.store(lsn, Ordering::SeqCst);
        self.last_lsn.store(lsn, Ordering::SeqCst);

        Ok(lsn)
    }

    /// Commit the transaction
    pub fn commit(&self) -> Result<Lsn> {
        {
            let mut state = self.state.lock();
            match *state {
                TransactionState::Growing | TransactionState::Shrinking => {
                    *state = TransactionState::Committed;
                }
                _ => return Err(TransactionError::InvalidState(self.id)),
            }
        }

        let prev_lsn = self.last_lsn.load(Ordering::SeqCst);
        let lsn = self
            .log_manager
            .append_record(self.id, prev_lsn, LogRecordType::Commit)
            .map_err(|e| TransactionError::LogError(e.to_string()))?;

        self.last_lsn.store(lsn, Ordering::SeqCst);

        Ok(lsn)
    }

    /// Abort the transaction
    pub fn abort(&self) -> Result<Lsn> {
        {
            let mut state = self.state.lock();
            if *state == TransactionState::Committed {
                return Err(TransactionError::InvalidState(self.id));
            }
            *state = TransactionState::Aborted;
        }

        let prev_lsn = self.last_lsn.load(Ordering::SeqCst);
        let lsn = self
            .log_manager
            .append_record(self.id, prev_lsn, LogRecordType::Abort)
            .map_err(|e| TransactionError::LogError(e.to_string()))?;

        self.last_lsn.store(lsn, Ordering::SeqCst);

        Ok(lsn)
    }

    /// Get the first LSN of this transaction
    pub fn first_lsn(&self) -> Lsn {
        self.first_lsn.load(Ordering::SeqCst)
    }

    /// Get the last LSN of this transaction
    pub fn last_lsn(&self) -> Lsn {
        self.last_lsn.load(Ordering::SeqCst)
    }
}
