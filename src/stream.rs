//! Streaming conversion: yield results as jobs finish.
//!
//! [`conversion_stream`] runs at most `workers` converter processes at once
//! and yields each [`ConversionResult`] the moment its job completes, not
//! in submission order. The orchestrator consumes it to drive progress
//! reporting; library callers can consume it directly to patch or log
//! incrementally.

use crate::config::RunConfig;
use crate::error::JobError;
use crate::output::{ConversionJob, ConversionOutcome, ConversionResult};
use crate::pipeline::job;
use crate::pipeline::profile::ProfilePool;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// A boxed stream of conversion results in completion order.
pub type ResultStream = Pin<Box<dyn Stream<Item = ConversionResult> + Send>>;

/// Profile pool sized for `config.workers`.
pub fn profile_pool(config: &RunConfig) -> Arc<ProfilePool> {
    ProfilePool::new((0..config.workers).map(|slot| config.profile_dir(slot)).collect())
}

/// Convert `jobs` with bounded concurrency.
///
/// Each in-flight job holds an exclusive profile lease for the whole
/// converter invocation.
pub fn conversion_stream(jobs: Vec<ConversionJob>, config: &RunConfig) -> ResultStream {
    let pool = profile_pool(config);
    let workers = config.workers;
    let config = Arc::new(config.clone());

    let s = stream::iter(jobs.into_iter().map(move |job| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        async move {
            match pool.acquire().await {
                Some(lease) => job::run_job(job, lease.dir(), &config).await,
                None => ConversionResult {
                    job,
                    outcome: ConversionOutcome::Error(JobError::Internal(
                        "no converter profile available".into(),
                    )),
                },
            }
        }
    }))
    .buffer_unordered(workers);

    Box::pin(s)
}
