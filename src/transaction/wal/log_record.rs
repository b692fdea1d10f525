use serde::{Deserialize, Serialize};

use crate::common::types::{Lsn, TxnId};

/// Kinds of records the write-ahead log accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordType {
    Begin,
    Commit,
    Abort,
}

/// A single write-ahead log record. The core treats the log as a
/// write-through sink; redo/undo interpretation is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub txn_id: TxnId,
    pub prev_lsn: Lsn,
    pub record_type: LogRecordType,
}

impl LogRecord {
    pub fn new(lsn: Lsn, txn_id: TxnId, prev_lsn: Lsn, record_type: LogRecordType) -> Self {
        Self {
            lsn,
            txn_id,
            prev_lsn,
            record_type,
        }
    }
}
