use std::thread;
use std::time::Duration;
use anyhow::Result;

use karstdb::common::types::Rid;
use karstdb::transaction::lock_manager::AbortReason;
use karstdb::transaction::TransactionState;
use karstdb::IsolationLevel;

mod common;
use common::create_test_transaction_env;

const SETTLE: Duration = Duration::from_millis(100);

#[test]
fn test_shared_then_unlock_moves_to_shrinking() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let txn = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(1, 1);

    lm.lock_shared(&txn, row)?;
    assert!(txn.is_shared_locked(&row));
    assert_eq!(txn.state(), TransactionState::Growing);

    assert!(lm.unlock(&txn, row));
    assert!(!txn.is_shared_locked(&row));
    assert_eq!(txn.state(), TransactionState::Shrinking);

    Ok(())
}

#[test]
fn test_lock_on_shrinking_aborts() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let txn = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(1, 1);

    lm.lock_shared(&txn, row)?;
    lm.unlock(&txn, row);

    let err = lm.lock_shared(&txn, Rid::new(1, 2)).unwrap_err();
    assert_eq!(err.reason, AbortReason::LockOnShrinking);
    assert_eq!(txn.state(), TransactionState::Aborted);

    Ok(())
}

#[test]
fn test_shared_lock_rejected_under_read_uncommitted() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let txn = tm.begin(IsolationLevel::ReadUncommitted)?;

    let err = lm.lock_shared(&txn, Rid::new(1, 1)).unwrap_err();
    assert_eq!(err.reason, AbortReason::LockSharedOnReadUncommitted);
    assert_eq!(txn.state(), TransactionState::Aborted);

    Ok(())
}

#[test]
fn test_upgrade_without_shared_lock_conflicts() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let txn = tm.begin(IsolationLevel::ReadCommitted)?;

    let err = lm.lock_upgrade(&txn, Rid::new(1, 1)).unwrap_err();
    assert_eq!(err.reason, AbortReason::UpgradeConflict);
    assert_eq!(txn.state(), TransactionState::Aborted);

    Ok(())
}

#[test]
fn test_upgrade_shared_to_exclusive() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let txn = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(1, 1);

    lm.lock_shared(&txn, row)?;
    lm.lock_upgrade(&txn, row)?;

    assert!(!txn.is_shared_locked(&row));
    assert!(txn.is_exclusive_locked(&row));
    assert_eq!(txn.state(), TransactionState::Growing);

    Ok(())
}

#[test]
fn test_wound_wait_older_aborts_younger_waiter() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let older = tm.begin(IsolationLevel::ReadCommitted)?;
    let younger = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(1, 1);

    lm.lock_exclusive(&older, row)?;

    // The younger transaction queues up behind the older holder
    let lm_clone = lm.clone();
    let younger_clone = younger.clone();
    let waiter = thread::spawn(move || lm_clone.lock_exclusive(&younger_clone, row));
    thread::sleep(SETTLE);
    assert_eq!(younger.state(), TransactionState::Growing);

    // The older transaction's second request wounds the younger one
    lm.lock_exclusive(&older, row)?;

    let result = waiter.join().unwrap();
    let err = result.unwrap_err();
    assert_eq!(err.reason, AbortReason::LockOnShrinking);
    assert_eq!(younger.state(), TransactionState::Aborted);
    assert!(older.is_exclusive_locked(&row));

    Ok(())
}

#[test]
fn test_wound_wait_younger_waits_for_older() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let older = tm.begin(IsolationLevel::ReadCommitted)?;
    let younger = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(1, 1);

    lm.lock_exclusive(&older, row)?;

    let lm_clone = lm.clone();
    let younger_clone = younger.clone();
    let waiter = thread::spawn(move || lm_clone.lock_exclusive(&younger_clone, row));

    // The younger transaction must wait, not be wounded
    thread::sleep(SETTLE);
    assert_eq!(younger.state(), TransactionState::Growing);

    lm.unlock(&older, row);

    waiter.join().unwrap()?;
    assert!(younger.is_exclusive_locked(&row));
    assert_eq!(younger.state(), TransactionState::Growing);

    Ok(())
}

#[test]
fn test_older_shared_requester_wounds_younger_exclusive_holder() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let older = tm.begin(IsolationLevel::ReadCommitted)?;
    let younger = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(2, 5);

    lm.lock_exclusive(&younger, row)?;

    let lm_clone = lm.clone();
    let older_clone = older.clone();
    let waiter = thread::spawn(move || lm_clone.lock_shared(&older_clone, row));

    // The younger holder is wounded immediately; the older requester waits
    // for the row to clear
    thread::sleep(SETTLE);
    assert_eq!(younger.state(), TransactionState::Aborted);

    // The wounded transaction rolls back, releasing its lock
    lm.unlock(&younger, row);

    waiter.join().unwrap()?;
    assert!(older.is_shared_locked(&row));

    Ok(())
}

#[test]
fn test_exclusive_waits_for_shared_holders() -> Result<()> {
    let (tm, lm, _dir) = create_test_transaction_env()?;
    let older = tm.begin(IsolationLevel::ReadCommitted)?;
    let younger = tm.begin(IsolationLevel::ReadCommitted)?;
    let row = Rid::new(3, 1);

    lm.lock_shared(&older, row)?;

    let lm_clone = lm.clone();
    let younger_clone = younger.clone();
    let waiter = thread::spawn(move || lm_clone.lock_exclusive(&younger_clone, row));

    thread::sleep(SETTLE);
    assert_eq!(younger.state(), TransactionState::Growing);
    assert!(!younger.is_exclusive_locked(&row));

    lm.unlock(&older, row);

    waiter.join().unwrap()?;
    assert!(younger.is_exclusive_locked(&row));

    Ok(())
}
