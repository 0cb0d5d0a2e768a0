//! End-to-end deployment lifecycle against mocked git and docker

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use blacktree_worker::handlers::{
    clone::handle_clone, delete::handle_delete, stop::handle_stop, trigger::handle_trigger,
};
use blacktree_worker::models::message::{JobKind, ResultStatus};
use blacktree_worker::store::DeploymentStatus;
use blacktree_worker::workers::builder::BuildExecutor;
use blacktree_worker::workers::reconciler;

use common::{build_message, harness, TestHarness};

async fn status_of(h: &TestHarness, id: &str) -> DeploymentStatus {
    h.ctx.store.read(id).await.unwrap().unwrap().status
}

/// Poll until the deployment reaches `want` or the deadline passes
async fn wait_for_status(h: &TestHarness, id: &str, want: DeploymentStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let got = h.ctx.store.read(id).await.unwrap().map(|r| r.status);
        if got == Some(want) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for status {} (last seen {:?})",
            want,
            got
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_successful_clone_writes_record_and_tracker_entry() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    handle_clone(h.ctx.clone(), build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "8080")).await;

    let record = h.ctx.store.read("dep-1").await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Cloned);
    assert_eq!(record.image_name.as_deref(), Some("blacktree/raktconnect-dep-1"));
    assert_eq!(record.port, Some(8080));

    let entries = h.ctx.tracker.load_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].deployment_id, "dep-1");
    assert_eq!(entries[0].repo, "RaktConnect");
    assert!(h.ctx.repos_dir.join(&entries[0].path).exists());
}

#[tokio::test]
async fn test_failed_clone_leaves_failed_record_without_tracker_entry() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.git.fail.store(true, Ordering::SeqCst);

    handle_clone(h.ctx.clone(), build_message("dep-1", "https://example.com/missing.git", "")).await;

    assert_eq!(status_of(&h, "dep-1").await, DeploymentStatus::Failed);
    assert!(h.ctx.tracker.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_builds_cloned_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    handle_clone(h.ctx.clone(), build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "")).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Built).await;

    // Finalized: entry and workspace gone, one built event out
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !h.ctx.tracker.load_all().await.unwrap().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "tracker entry not removed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let events = h.events.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].deployment_id, "dep-1");
    assert_eq!(events[0].status, ResultStatus::Built);
}

#[tokio::test]
async fn test_failed_build_is_not_resubmitted() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.docker.fail_builds.store(true, Ordering::SeqCst);
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    handle_clone(h.ctx.clone(), build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "")).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Failed).await;

    // The entry stays behind but the record is no longer `cloned`, so the
    // next cycle skips it
    assert_eq!(h.ctx.tracker.load_all().await.unwrap().len(), 1);
    reconciler::run_cycle(&h.ctx, &executor).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.docker.build_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_trigger_leases_port_and_publishes_running() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    let msg = build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "8080");
    handle_clone(h.ctx.clone(), msg.clone()).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Built).await;

    let mut trigger = msg.clone();
    trigger.kind = JobKind::Trigger;
    handle_trigger(h.ctx.clone(), trigger.clone()).await;

    let record = h.ctx.store.read("dep-1").await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Running);
    // Lowest free host port leased and persisted; the container port
    // recorded at clone time is untouched
    assert_eq!(record.host_port, Some(3000));
    assert_eq!(record.port, Some(8080));
    let mapping = h.docker.last_port_mapping.lock().unwrap().unwrap();
    assert_eq!(mapping.host, 3000);
    assert_eq!(mapping.container, 8080);

    let events = h.events.events.lock().unwrap().clone();
    assert_eq!(events.last().unwrap().status, ResultStatus::Running);

    // A second trigger while the container runs is a no-op
    let runs_before = h.docker.run_calls.load(Ordering::SeqCst);
    let events_before = events.len();
    handle_trigger(h.ctx.clone(), trigger).await;
    assert_eq!(h.docker.run_calls.load(Ordering::SeqCst), runs_before);
    assert_eq!(h.events.events.lock().unwrap().len(), events_before);
}

#[tokio::test]
async fn test_stop_tears_down_containers_and_marks_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    let msg = build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "8080");
    handle_clone(h.ctx.clone(), msg.clone()).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Built).await;

    let mut trigger = msg.clone();
    trigger.kind = JobKind::Trigger;
    handle_trigger(h.ctx.clone(), trigger).await;

    let mut stop = msg.clone();
    stop.kind = JobKind::Stop;
    handle_stop(h.ctx.clone(), stop).await;

    assert_eq!(status_of(&h, "dep-1").await, DeploymentStatus::Stopped);
    assert!(h.docker.containers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_retrigger_after_stop_keeps_container_port() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    let msg = build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "8080");
    handle_clone(h.ctx.clone(), msg.clone()).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Built).await;

    let mut trigger = msg.clone();
    trigger.kind = JobKind::Trigger;
    handle_trigger(h.ctx.clone(), trigger.clone()).await;

    let mut stop = msg.clone();
    stop.kind = JobKind::Stop;
    handle_stop(h.ctx.clone(), stop).await;

    handle_trigger(h.ctx.clone(), trigger).await;

    // The second run still exposes the container port from the deploy
    // request, and the first lease went back to the pool rather than
    // leaking, so the same host port is picked again
    let mapping = h.docker.last_port_mapping.lock().unwrap().unwrap();
    assert_eq!(mapping.container, 8080);
    assert_eq!(mapping.host, 3000);

    let record = h.ctx.store.read("dep-1").await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Running);
    assert_eq!(record.port, Some(8080));
    assert_eq!(record.host_port, Some(3000));

    // Exactly one lease is outstanding
    assert_eq!(h.ctx.ports.acquire().unwrap(), 3001);
}

#[tokio::test]
async fn test_delete_removes_record_and_releases_port() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let executor = Arc::new(BuildExecutor::new(h.ctx.clone(), 2));

    let msg = build_message("dep-1", "https://github.com/vky5/RaktConnect.git", "8080");
    handle_clone(h.ctx.clone(), msg.clone()).await;
    reconciler::run_cycle(&h.ctx, &executor).await;
    wait_for_status(&h, "dep-1", DeploymentStatus::Built).await;

    let mut trigger = msg.clone();
    trigger.kind = JobKind::Trigger;
    handle_trigger(h.ctx.clone(), trigger).await;
    assert_eq!(h.ctx.store.read("dep-1").await.unwrap().unwrap().host_port, Some(3000));

    let mut delete = msg.clone();
    delete.kind = JobKind::Delete;
    handle_delete(h.ctx.clone(), delete).await;

    assert!(h.ctx.store.read("dep-1").await.unwrap().is_none());
    assert!(h
        .docker
        .removed_images
        .lock()
        .unwrap()
        .contains(&"blacktree/raktconnect-dep-1".to_string()));
    // The lease went back to the pool, so the lowest port is free again
    assert_eq!(h.ctx.ports.acquire().unwrap(), 3000);
}
