use std::sync::Arc;
use anyhow::Result;
use tempfile::TempDir;

use karstdb::storage::buffer::BufferPoolManager;
use karstdb::storage::disk::DiskManager;
use karstdb::transaction::wal::LogManager;
use karstdb::transaction::TransactionManager;
use karstdb::LockManager;

// Create a buffer pool over a temporary database directory
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, TempDir)> {
    let dir = TempDir::new()?;
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db"))?);
    let log_manager = Arc::new(LogManager::new(dir.path().join("test.wal"))?);
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk_manager, log_manager));
    Ok((buffer_pool, dir))
}

// Create one instance of a federated buffer pool
#[allow(dead_code)]
pub fn create_test_buffer_pool_instance(
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
) -> Result<(Arc<BufferPoolManager>, TempDir)> {
    let dir = TempDir::new()?;
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db"))?);
    let log_manager = Arc::new(LogManager::new(dir.path().join("test.wal"))?);
    let buffer_pool = Arc::new(BufferPoolManager::new_instance(
        pool_size,
        num_instances,
        instance_index,
        disk_manager,
        log_manager,
    ));
    Ok((buffer_pool, dir))
}

// Create a transaction manager and lock manager over a temporary WAL
#[allow(dead_code)]
pub fn create_test_transaction_env() -> Result<(TransactionManager, Arc<LockManager>, TempDir)> {
    let dir = TempDir::new()?;
    let log_manager = Arc::new(LogManager::new(dir.path().join("test.wal"))?);
    Ok((
        TransactionManager::new(log_manager),
        Arc::new(LockManager::new()),
        dir,
    ))
}
