/// Background task runner tests
///
/// Completion signaling end to end: a task updates its entity, waiters are
/// released whatever the outcome, and the probe covers late arrivals.
/// Run with: cargo test --test task_runner_tests

use entitydb::facade::Payload;
use entitydb::{
    Completion, ConditionRegistry, DataType, DbError, EntityKind, EntityService,
    InMemoryDocumentStore, Scope, ServiceConfig, TaskRunner, Value, WaitOutcome,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn job_kind() -> EntityKind {
    EntityKind::builder("job")
        .field("status", DataType::Text)
        .build()
        .unwrap()
}

fn setup() -> (EntityService<InMemoryDocumentStore>, TaskRunner) {
    let config = ServiceConfig::default();
    let service = EntityService::new(Arc::new(InMemoryDocumentStore::new()), config.clone());
    let runner = TaskRunner::new(ConditionRegistry::from_config(&config));
    (service, runner)
}

fn status(value: &str) -> Payload {
    json!({ "status": value }).as_object().cloned().unwrap()
}

async fn is_done(service: &EntityService<InMemoryDocumentStore>, id: Uuid) -> entitydb::Result<bool> {
    let job = service.get_by_identifier(&job_kind(), id).await?;
    Ok(job.is_some_and(|j| j.attribute("status") == Value::from("done")))
}

#[tokio::test]
async fn test_waiter_sees_task_completion() {
    let (service, runner) = setup();
    let kind = job_kind();
    let job = service.create(&kind, &Scope::new(), status("queued")).await.unwrap();
    let id = job.identifier;

    let waiter = runner.registry().subscribe(id);

    let worker = service.clone();
    runner.spawn(id, async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.update(&job_kind(), job, status("done")).await
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiter.wait(None))
        .await
        .unwrap();
    assert_eq!(outcome, WaitOutcome::Signaled);
    assert!(is_done(&service, id).await.unwrap());
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_completion_probe_for_late_caller() {
    let (service, runner) = setup();
    let kind = job_kind();
    let job = service.create(&kind, &Scope::new(), status("queued")).await.unwrap();
    let id = job.identifier;

    let worker = service.clone();
    runner
        .spawn(id, async move { worker.update(&job_kind(), job, status("done")).await })
        .await
        .unwrap();

    // the release already happened; only the probe can tell
    let completion = runner
        .wait_for_completion(id, Some(Duration::from_secs(1)), || is_done(&service, id))
        .await
        .unwrap();
    assert_eq!(completion, Completion::AlreadyDone);
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_completion_signaled_while_waiting() {
    let (service, runner) = setup();
    let kind = job_kind();
    let job = service.create(&kind, &Scope::new(), status("queued")).await.unwrap();
    let id = job.identifier;

    let worker = service.clone();
    let waiting = {
        let runner = runner.clone();
        let service = service.clone();
        tokio::spawn(async move {
            runner
                .wait_for_completion(id, None, || is_done(&service, id))
                .await
        })
    };
    while runner.registry().waiters(id) == 0 {
        tokio::task::yield_now().await;
    }

    runner.spawn(id, async move { worker.update(&job_kind(), job, status("done")).await });

    let completion = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(completion, Completion::Signaled);
}

#[tokio::test]
async fn test_failed_and_panicking_tasks_release() {
    let (_, runner) = setup();

    let failing = Uuid::new_v4();
    let waiter = runner.registry().subscribe(failing);
    runner.spawn(failing, async {
        Err::<(), _>(DbError::NotFound("upstream job".into()))
    });
    assert_eq!(waiter.wait(Some(Duration::from_secs(5))).await, WaitOutcome::Signaled);

    let panicking = Uuid::new_v4();
    let waiter = runner.registry().subscribe(panicking);
    let handle = runner.spawn(panicking, async move {
        if panicking.is_nil() {
            return Ok::<(), DbError>(());
        }
        panic!("worker crashed");
    });
    assert!(handle.await.unwrap_err().is_panic());
    assert_eq!(waiter.wait(Some(Duration::from_secs(5))).await, WaitOutcome::Signaled);
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_aborted_task_releases() {
    let (_, runner) = setup();
    let key = Uuid::new_v4();
    let waiter = runner.registry().subscribe(key);

    let handle = runner.spawn(key, async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), DbError>(())
    });
    handle.abort();
    let _ = handle.await;

    assert!(waiter.is_signaled());
    assert_eq!(waiter.wait(None).await, WaitOutcome::Signaled);
}

#[tokio::test(start_paused = true)]
async fn test_completion_times_out() {
    let (service, runner) = setup();
    let job = service.create(&job_kind(), &Scope::new(), status("queued")).await.unwrap();

    let completion = runner
        .wait_for_completion(job.identifier, Some(Duration::from_secs(180)), || {
            is_done(&service, job.identifier)
        })
        .await
        .unwrap();
    assert_eq!(completion, Completion::TimedOut);
    assert!(runner.registry().is_empty());
}
