use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use spindle_core::domain::CANCELLED_ERROR;
use spindle_core::impls::{FixedBackoff, JsonFileStore, MemoryStore};
use spindle_core::ports::DurableStore;
use spindle_core::{
    CorrelationKey, EnqueueOptions, EnqueueRequest, HandlerError, Job, JobFilter, JobId, JobKind,
    JobQueue, JobQueueBuilder, JobStatus, Priority, QueueConfig,
};

fn config(max_concurrent: usize) -> QueueConfig {
    QueueConfig {
        max_concurrent,
        poll_interval: Duration::from_millis(20),
        ..QueueConfig::default()
    }
}

fn builder(max_concurrent: usize) -> JobQueueBuilder {
    JobQueueBuilder::new(config(max_concurrent))
        .store(Arc::new(MemoryStore::new()))
        .backoff(FixedBackoff::new(Duration::ZERO))
}

async fn wait_for(queue: &JobQueue, id: &JobId, done: impl Fn(&Job) -> bool) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = queue.get_job(id).await
                && done(&job)
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not settle in time")
}

async fn wait_terminal(queue: &JobQueue, id: &JobId) -> Job {
    wait_for(queue, id, |j| j.status.is_terminal()).await
}

fn request(job_type: &str) -> EnqueueRequest {
    EnqueueRequest::new(job_type, "instagram", serde_json::json!({ "caption": "hi" }))
}

#[tokio::test]
async fn fails_twice_then_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let queue = builder(2)
        .register_fn("publish", move |_, _| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    return Err(HandlerError::new(format!("transient {n}")));
                }
                Ok(())
            }
        })
        .unwrap()
        .build()
        .unwrap();

    let id = queue.enqueue(request("publish")).await;
    queue.start().await;
    let job = wait_terminal(&queue, &id).await;
    queue.stop().await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 3);
    assert!(job.completed_at.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_budget_ends_dead() {
    let queue = builder(2)
        .register_fn("publish", |_, _| async { Err(HandlerError::new("token expired")) })
        .unwrap()
        .build()
        .unwrap();

    let id = queue.enqueue(request("publish").with_max_attempts(2)).await;
    queue.start().await;
    let job = wait_terminal(&queue, &id).await;
    // nothing picks it up again
    tokio::time::sleep(Duration::from_millis(100)).await;
    let job_later = queue.get_job(&id).await.unwrap();
    queue.stop().await;

    assert_eq!(job.status, JobStatus::Dead);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.error.as_deref(), Some("token expired"));
    assert_eq!(job_later, job);
}

#[tokio::test]
async fn single_slot_runs_high_priority_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();
    let queue = builder(1)
        .register_fn("publish", move |_, data| {
            o.lock().unwrap().push(data["name"].as_str().unwrap_or_default().to_string());
            async { Ok(()) }
        })
        .unwrap()
        .build()
        .unwrap();

    let low = queue
        .enqueue(
            EnqueueRequest::new("publish", "tiktok", serde_json::json!({ "name": "low" }))
                .with_priority(Priority::Low),
        )
        .await;
    let high = queue
        .enqueue(
            EnqueueRequest::new("publish", "tiktok", serde_json::json!({ "name": "high" }))
                .with_priority(Priority::High),
        )
        .await;

    queue.start().await;
    let low = wait_terminal(&queue, &low).await;
    let high = wait_terminal(&queue, &high).await;
    queue.stop().await;

    assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
    assert!(high.processed_at <= low.processed_at);
}

#[tokio::test]
async fn cancel_only_before_dispatch() {
    let gate = Arc::new(Semaphore::new(0));
    let g = gate.clone();
    let queue = builder(1)
        .register_fn("render", move |_, _| {
            let g = g.clone();
            async move {
                let _permit = g.acquire().await.map_err(|e| HandlerError::new(e.to_string()))?;
                Ok(())
            }
        })
        .unwrap()
        .build()
        .unwrap();

    let running = queue.enqueue(request("render")).await;
    let waiting = queue.enqueue(request("render")).await;
    queue.start().await;
    wait_for(&queue, &running, |j| j.status == JobStatus::Processing).await;

    assert!(!queue.cancel(&running).await);
    assert!(queue.cancel(&waiting).await);
    assert!(!queue.cancel(&waiting).await);
    assert!(!queue.cancel(&JobId::from_ulid(ulid::Ulid::new())).await);

    gate.add_permits(1);
    let running = wait_terminal(&queue, &running).await;
    queue.stop().await;

    let cancelled = queue.get_job(&waiting).await.unwrap();
    assert_eq!(running.status, JobStatus::Completed);
    assert_eq!(cancelled.status, JobStatus::Dead);
    assert_eq!(cancelled.attempts, 0);
    assert_eq!(cancelled.error.as_deref(), Some(CANCELLED_ERROR));
}

#[tokio::test]
async fn manual_retry_revives_dead_job() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let queue = builder(1)
        .register_fn("publish", move |_, _| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    return Err(HandlerError::new("account suspended"));
                }
                Ok(())
            }
        })
        .unwrap()
        .build()
        .unwrap();

    let id = queue.enqueue(request("publish").with_max_attempts(1)).await;
    queue.start().await;
    assert_eq!(wait_terminal(&queue, &id).await.status, JobStatus::Dead);

    assert!(queue.retry_job(&id).await);
    let job = wait_for(&queue, &id, |j| j.status == JobStatus::Completed).await;
    queue.stop().await;

    assert_eq!(job.attempts, 1);
    assert!(job.error.is_none());
    assert!(!queue.retry_job(&id).await, "completed jobs are not retryable");
}

#[tokio::test]
async fn unknown_type_fails_and_is_not_retried() {
    let queue = builder(1).build().unwrap();
    let id = queue.enqueue(request("publish-fax")).await;

    assert_eq!(queue.tick().await, 0);
    let job = queue.get_job(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.error.as_deref(), Some("No handler registered for job type: publish-fax"));

    assert_eq!(queue.tick().await, 0);
    assert_eq!(queue.get_job(&id).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn delayed_job_waits_for_its_time() {
    let queue = builder(1)
        .register_fn("publish", |_, _| async { Ok(()) })
        .unwrap()
        .build()
        .unwrap();
    let id = queue
        .enqueue(request("publish").run_at(Utc::now() + chrono::Duration::hours(1)))
        .await;

    assert_eq!(queue.tick().await, 0);
    assert_eq!(queue.get_job(&id).await.unwrap().status, JobStatus::Pending);
}

#[derive(Serialize, Deserialize)]
struct RefreshToken {
    account: String,
}

impl JobKind for RefreshToken {
    const TYPE: &'static str = "refresh-token";
}

#[tokio::test]
async fn typed_enqueue_and_queries() {
    let queue = builder(1)
        .register_fn(RefreshToken::TYPE, |_, _| async { Ok(()) })
        .unwrap()
        .build()
        .unwrap();

    let id = queue
        .enqueue_kind(
            "tiktok",
            &RefreshToken {
                account: "acme".into(),
            },
            EnqueueOptions::new().token_id("tok-7").priority(Priority::High).max_attempts(5),
        )
        .await
        .unwrap();
    queue.enqueue(request("publish").with_token_id("tok-8")).await;

    let job = queue.get_job(&id).await.unwrap();
    assert_eq!(job.job_type.as_str(), "refresh-token");
    assert_eq!(job.data["account"], "acme");
    assert_eq!(job.max_attempts, 5);

    let by_token = queue.jobs_by_correlation(&CorrelationKey::Token("tok-7".into())).await;
    assert_eq!(by_token.len(), 1);
    assert_eq!(by_token[0].id, id);

    let listed = queue.list_jobs(&JobFilter::new().provider("tiktok")).await;
    assert_eq!(listed.len(), 1);

    let stats = queue.stats().await;
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.total(), 2);
}

#[tokio::test]
async fn start_is_idempotent_and_stop_lets_handlers_finish() {
    let gate = Arc::new(Semaphore::new(0));
    let g = gate.clone();
    let queue = builder(1)
        .register_fn("render", move |_, _| {
            let g = g.clone();
            async move {
                let _permit = g.acquire().await.map_err(|e| HandlerError::new(e.to_string()))?;
                Ok(())
            }
        })
        .unwrap()
        .build()
        .unwrap();

    assert!(queue.start().await);
    assert!(!queue.start().await);

    let id = queue.enqueue(request("render")).await;
    wait_for(&queue, &id, |j| j.status == JobStatus::Processing).await;

    queue.stop().await;
    assert!(!queue.is_running().await);

    gate.add_permits(1);
    let job = wait_terminal(&queue, &id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(queue.active().await, 0);
}

fn seeded_job(status: JobStatus, completed_days_ago: Option<i64>) -> Job {
    let now = Utc::now();
    let mut job = Job::new(
        JobId::from_ulid(ulid::Ulid::new()),
        request("publish"),
        3,
        now - chrono::Duration::days(10),
    );
    job.status = status;
    job.completed_at = completed_days_ago.map(|d| now - chrono::Duration::days(d));
    job
}

#[tokio::test]
async fn reload_recovers_interrupted_jobs_and_prunes_old_ones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");

    let mut interrupted = seeded_job(JobStatus::Pending, None);
    interrupted.start_attempt(Utc::now());
    let stale = seeded_job(JobStatus::Completed, Some(8));
    let fresh = seeded_job(JobStatus::Completed, Some(1));
    let failed = seeded_job(JobStatus::Failed, None);
    let (interrupted_id, fresh_id, failed_id) = (interrupted.id.clone(), fresh.id.clone(), failed.id.clone());
    JsonFileStore::new(&path)
        .save_all(&[interrupted, stale, fresh, failed])
        .unwrap();

    let queue = JobQueueBuilder::new(QueueConfig {
        store_path: path.clone(),
        ..config(1)
    })
    .backoff(FixedBackoff::new(Duration::ZERO))
    .register_fn("publish", |_, _| async { Ok(()) })
    .unwrap()
    .build()
    .unwrap();

    let on_disk = JsonFileStore::new(&path).load_all().unwrap();
    let ids: Vec<JobId> = on_disk.iter().map(|j| j.id.clone()).collect();
    assert_eq!(ids, vec![interrupted_id.clone(), fresh_id, failed_id]);
    assert_eq!(on_disk[0].status, JobStatus::Pending);
    assert_eq!(on_disk[0].attempts, 1);

    queue.start().await;
    let job = wait_terminal(&queue, &interrupted_id).await;
    queue.stop().await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);

    let persisted = JsonFileStore::new(&path).load_all().unwrap();
    assert_eq!(persisted.iter().find(|j| j.id == interrupted_id), Some(&job));
}

#[tokio::test]
async fn corrupt_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    std::fs::write(&path, "not json").unwrap();

    let queue = JobQueueBuilder::new(QueueConfig {
        store_path: path.clone(),
        ..config(1)
    })
    .build()
    .unwrap();

    assert_eq!(queue.stats().await.total(), 0);
    queue.enqueue(request("publish")).await;
    assert_eq!(JsonFileStore::new(&path).load_all().unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_old_job_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    let old = seeded_job(JobStatus::Pending, None);
    let id = old.id.clone();
    JsonFileStore::new(&path).save_all(&[old]).unwrap();

    let open = || {
        JobQueueBuilder::new(QueueConfig {
            store_path: path.clone(),
            ..config(1)
        })
        .build()
        .unwrap()
    };

    let queue = open();
    assert!(queue.cancel(&id).await);
    drop(queue);

    let reopened = open();
    let job = reopened.get_job(&id).await.expect("cancelled job was pruned");
    assert_eq!(job.status, JobStatus::Dead);
    assert_eq!(job.error.as_deref(), Some(CANCELLED_ERROR));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn legacy_ids_load_and_dispatch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    let now = Utc::now().to_rfc3339();
    std::fs::write(
        &path,
        format!(
            r#"[{{"id":"job_1700000000000_ab12cd","type":"publish","provider":"instagram",
                "scheduledAt":"{now}","status":"pending","createdAt":"{now}"}}]"#
        ),
    )
    .unwrap();

    let queue = JobQueueBuilder::new(QueueConfig {
        store_path: path.clone(),
        ..config(1)
    })
    .register_fn("publish", |_, _| async { Ok(()) })
    .unwrap()
    .build()
    .unwrap();

    assert_eq!(queue.stats().await.total(), 1);
    let id: JobId = "job_1700000000000_ab12cd".parse().unwrap();
    queue.start().await;
    let job = wait_terminal(&queue, &id).await;
    queue.stop().await;
    assert_eq!(job.status, JobStatus::Completed);

    let persisted = JsonFileStore::new(&path).load_all().unwrap();
    assert_eq!(persisted[0].id.as_str(), "job_1700000000000_ab12cd");
}
