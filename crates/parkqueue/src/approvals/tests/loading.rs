use super::common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::approvals::{ApprovalError, LoadOutcome, LoadState, StudentIdSource};
use crate::config::ApprovalsConfig;
use crate::directory::{AccountId, Collection};
use serde_json::json;

#[tokio::test]
async fn load_keeps_only_pending_non_admin_accounts() {
    let harness = harness();

    let outcome = harness.manager.load_accounts().await.expect("load succeeds");

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            pending: 2,
            attempts: 1
        }
    );
    let mut loaded = ids(&harness.manager.all_accounts());
    loaded.sort();
    assert_eq!(loaded, vec!["u1", "u2-long-identifier"]);
    assert_eq!(harness.manager.load_state(), LoadState::Ready);
    assert_eq!(harness.manager.pending_count(), 2);
}

#[tokio::test]
async fn student_ids_come_from_personal_info_or_short_account_id() {
    let harness = loaded_harness().await;

    let recorded = harness
        .manager
        .account(&AccountId::new("u1"))
        .expect("u1 listed");
    assert_eq!(recorded.student_id, "2023-0001");
    assert_eq!(recorded.student_id_source, StudentIdSource::Recorded);

    let fallback = harness
        .manager
        .account(&AccountId::new("u2-long-identifier"))
        .expect("u2 listed");
    assert_eq!(fallback.student_id, "u2-long-");
    assert_eq!(fallback.student_id_source, StudentIdSource::Fallback);
}

#[tokio::test]
async fn failed_student_id_lookup_keeps_the_account() {
    let harness = harness();
    harness
        .directory
        .fail_personal_info
        .store(true, Ordering::SeqCst);

    harness.manager.load_accounts().await.expect("load succeeds");

    let account = harness
        .manager
        .account(&AccountId::new("u1"))
        .expect("u1 still listed");
    assert!(account.student_id.is_empty());
    assert_eq!(account.student_id_source, StudentIdSource::Unavailable);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let harness = harness();
    harness.directory.list_failures.store(2, Ordering::SeqCst);

    let outcome = harness.manager.load_accounts().await.expect("load recovers");

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            pending: 2,
            attempts: 3
        }
    );
}

#[tokio::test(start_paused = true)]
async fn retry_delay_grows_linearly_with_each_attempt() {
    let config = ApprovalsConfig {
        retry_base_delay: Duration::from_secs(2),
        ..fast_config()
    };
    let harness = harness_with(seeded_directory(), config);
    harness.directory.list_failures.store(3, Ordering::SeqCst);

    let outcome = harness.manager.load_accounts().await.expect("load recovers");

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            pending: 2,
            attempts: 4
        }
    );
    assert_eq!(
        harness.directory.list_gaps(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6)
        ]
    );
}

#[tokio::test]
async fn malformed_reviewed_account_does_not_block_the_queue() {
    let directory = seeded_directory();
    directory
        .insert(
            Collection::Users,
            "u9",
            json!({ "approval_status": "approved", "created_at": 1717228800000u64 }),
        )
        .expect("seed user");
    let harness = harness_with(directory, fast_config());

    let outcome = harness.manager.load_accounts().await.expect("load succeeds");

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            pending: 2,
            attempts: 1
        }
    );
    assert!(harness.manager.account(&AccountId::new("u9")).is_none());
}

#[tokio::test]
async fn exhausted_retries_surface_failure_and_keep_previous_set() {
    let harness = loaded_harness().await;
    harness.directory.list_failures.store(10, Ordering::SeqCst);

    let result = harness.manager.load_accounts().await;

    match result {
        Err(ApprovalError::LoadFailed { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected load failure, got {other:?}"),
    }
    assert_eq!(harness.manager.all_accounts().len(), 2);
    assert!(matches!(
        harness.manager.load_state(),
        LoadState::Failed { .. }
    ));
}

#[tokio::test]
async fn overlapping_load_is_a_silent_no_op() {
    let harness = harness();
    harness.directory.list_delay_ms.store(50, Ordering::SeqCst);

    let (first, second) = tokio::join!(
        harness.manager.load_accounts(),
        harness.manager.load_accounts()
    );

    assert!(matches!(
        first.expect("first load succeeds"),
        LoadOutcome::Loaded { .. }
    ));
    assert_eq!(
        second.expect("second trigger ignored"),
        LoadOutcome::AlreadyLoading
    );

    harness.directory.list_delay_ms.store(0, Ordering::SeqCst);
    assert!(matches!(
        harness.manager.load_accounts().await.expect("flag released"),
        LoadOutcome::Loaded { .. }
    ));
}

#[tokio::test]
async fn missing_created_at_is_estimated() {
    let directory = seeded_directory();
    directory
        .insert(
            Collection::Users,
            "u7",
            json!({ "email": "new@x.com", "approval_status": "pending" }),
        )
        .expect("seed user");
    let harness = harness_with(directory, fast_config());

    harness.manager.load_accounts().await.expect("load succeeds");

    let account = harness
        .manager
        .account(&AccountId::new("u7"))
        .expect("u7 listed");
    assert!(account.created_at_estimated);
    let dated = harness
        .manager
        .account(&AccountId::new("u1"))
        .expect("u1 listed");
    assert!(!dated.created_at_estimated);
}

#[tokio::test]
async fn external_changes_need_a_reload() {
    let harness = loaded_harness().await;
    harness
        .directory
        .inner
        .insert(
            Collection::Users,
            "u8",
            json!({ "email": "late@x.com", "approval_status": "pending" }),
        )
        .expect("seed user");

    assert_eq!(harness.manager.pending_count(), 2);
    harness.manager.load_accounts().await.expect("reload succeeds");
    assert_eq!(harness.manager.pending_count(), 3);
}
