use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use spindle_core::app::BackoffConfig;
use spindle_core::domain::{GenerationSnapshot, Priority};
use spindle_core::ports::GenerationSource;
use spindle_core::{
    EnqueueOptions, EnqueueRequest, GenerationError, GenerationTracker, Handler, HandlerError,
    JobContext, JobFilter, JobKind, JobQueue, JobQueueBuilder, QueueConfig,
};

#[derive(Debug, Serialize, Deserialize)]
struct PublishPost {
    caption: String,
}

impl JobKind for PublishPost {
    const TYPE: &'static str = "publish-post";
}

/// Fails the first `n` calls, like a rate-limited provider.
struct FlakyPublisher {
    remaining_failures: AtomicU32,
}

impl FlakyPublisher {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<PublishPost> for FlakyPublisher {
    async fn handle(&self, ctx: &JobContext, payload: PublishPost) -> Result<(), HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::new(format!("rate limited (left={left})")));
        }
        tracing::info!(job_id = %ctx.job_id, provider = %ctx.provider, caption = %payload.caption, "published");
        Ok(())
    }
}

/// Pretends to render a video: a few "processing" answers, then done.
struct SimulatedRenderer {
    polls: AtomicU32,
}

#[async_trait]
impl GenerationSource for SimulatedRenderer {
    async fn poll(&self, external_id: &str) -> Result<GenerationSnapshot, GenerationError> {
        let n = self.polls.fetch_add(1, Ordering::Relaxed);
        Ok(match n {
            0 => GenerationSnapshot::new("submitted"),
            1..=3 => GenerationSnapshot::new("processing").with_progress((n * 30) as u8),
            _ => GenerationSnapshot::new("succeed").with_output_url(format!("file:///tmp/{external_id}.mp4")),
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SPINDLE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config() -> Result<QueueConfig, spindle_core::QueueError> {
    match std::env::var("SPINDLE_CONFIG") {
        Ok(path) => QueueConfig::from_json_file(path),
        // demo defaults: short poll and backoff so the run finishes quickly
        Err(_) => Ok(QueueConfig {
            store_path: "data/demo-jobs.json".into(),
            poll_interval: Duration::from_millis(500),
            backoff: BackoffConfig {
                base_ms: 200,
                max_ms: 2_000,
                ..BackoffConfig::default()
            },
            ..QueueConfig::default()
        }),
    }
}

fn build_queue(config: QueueConfig) -> Result<JobQueue, Box<dyn std::error::Error>> {
    let renderer = Arc::new(SimulatedRenderer {
        polls: AtomicU32::new(0),
    });
    let tracker = GenerationTracker::new()
        .with_poll_interval(Duration::from_millis(200))
        .with_timeout(Duration::from_secs(30));

    let queue = JobQueueBuilder::new(config)
        .register::<PublishPost, _>(FlakyPublisher::new(2))?
        .register_fn("generate-video", move |ctx, data| {
            let renderer = Arc::clone(&renderer);
            let tracker = tracker.clone();
            async move {
                let external_id = data["task_id"].as_str().unwrap_or("render").to_string();
                let url = tracker
                    .wait_for_completion(renderer.as_ref(), &external_id, |state, progress| {
                        tracing::info!(job_id = %ctx.job_id, ?state, progress, "render progress");
                    })
                    .await?;
                tracing::info!(job_id = %ctx.job_id, %url, "video ready");
                Ok(())
            }
        })?
        .expect_job_types(&[PublishPost::TYPE, "generate-video"])
        .build()?;
    Ok(queue)
}

async fn wait_until_settled(queue: &JobQueue) {
    loop {
        let stats = queue.stats().await;
        if stats.pending == 0 && stats.processing == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let queue = Arc::new(build_queue(load_config()?)?);

    queue
        .enqueue_kind(
            "instagram",
            &PublishPost {
                caption: "hello from spindle".into(),
            },
            EnqueueOptions::new().publication_id("pub-1").priority(Priority::High),
        )
        .await?;
    queue
        .enqueue(
            EnqueueRequest::new("generate-video", "kling", serde_json::json!({ "task_id": "render-1" }))
                .with_publication_id("pub-1"),
        )
        .await;
    queue
        .enqueue(EnqueueRequest::new("publish-fax", "fax", serde_json::Value::Null).with_priority(Priority::Low))
        .await;

    queue.start().await;

    tokio::select! {
        _ = wait_until_settled(&queue) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    queue.stop().await;

    let stats = queue.stats().await;
    tracing::info!(
        pending = stats.pending,
        processing = stats.processing,
        completed = stats.completed,
        failed = stats.failed,
        dead = stats.dead,
        "final stats"
    );
    for job in queue.list_jobs(&JobFilter::new()).await {
        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            status = %job.status,
            attempts = job.attempts,
            error = job.error.as_deref().unwrap_or(""),
            "job"
        );
    }
    Ok(())
}
