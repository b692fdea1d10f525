use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionError,
};
use crate::transaction::wal::log_manager::LogManager;

/// Transaction manager - responsible for creating and tracking transactions
pub struct TransactionManager {
    /// Next transaction ID to assign; smaller ids are older transactions
    next_txn_id: AtomicU32,

    /// Log manager reference
    log_manager: Arc<LogManager>,

    /// Active transactions map (txn_id -> Transaction)
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(log_manager: Arc<LogManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            log_manager,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self, isolation_level: IsolationLevel) -> Result<Arc<Transaction>, TransactionError> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, self.log_manager.clone(), isolation_level));

        txn.begin()?;

        self.active_transactions.lock().insert(txn_id, txn.clone());

        Ok(txn)
    }

    /// Commit a transaction and drop it from the active set
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        txn.commit()?;
        self.active_transactions.lock().remove(&txn.id());
        Ok(())
    }

    /// Abort a transaction and drop it from the active set
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        txn.abort()?;
        self.active_transactions.lock().remove(&txn.id());
        Ok(())
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    /// Get all active transaction IDs
    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        self.active_transactions.lock().keys().copied().collect()
    }
}
