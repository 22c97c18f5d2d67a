use crate::flatten::flatten;
use crate::normalize::{normalize_comment, normalize_post};
use crate::report::BatchOutcome;
use crate::resolver::TreeResolver;
use futures::stream::{self, StreamExt};
use harvest_core::{
    CanonicalRecord, CoreError, ErrorExt, ExtractionError, FetchedThread, NormalizationError, PlatformClient,
    RetrieveTime, ThreadIdentifier, TimeWindow, MAX_CONCURRENCY,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures that stop a whole batch rather than a single thread.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("could not list top threads of r/{community}: {source}")]
    Listing {
        community: String,
        #[source]
        source: CoreError,
    },

    /// Credentials were rejected mid-run. `partial` holds everything
    /// collected before the rejection, with the aborting thread in its report.
    #[error("batch aborted: {source}")]
    Aborted {
        #[source]
        source: ExtractionError,
        partial: Box<BatchOutcome>,
    },
}

impl BatchError {
    /// Records gathered before the batch stopped, if any were.
    pub fn into_partial(self) -> Option<BatchOutcome> {
        match self {
            BatchError::Aborted { partial, .. } => Some(*partial),
            BatchError::Listing { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Threads in flight at once. Output order never depends on it.
    pub concurrency: usize,
    /// Log a line per completed thread.
    pub report_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            report_progress: true,
        }
    }
}

/// Records of one successfully processed thread, post first.
#[derive(Debug, Clone)]
pub struct ThreadRecords {
    pub records: Vec<CanonicalRecord>,
    pub skipped: Vec<NormalizationError>,
}

/// Drives fetch, resolve, flatten and normalize over a list of threads with
/// one client handle shared by every thread.
pub struct BatchOrchestrator<C: PlatformClient + ?Sized> {
    client: Arc<C>,
    options: BatchOptions,
}

impl<C: PlatformClient + ?Sized> BatchOrchestrator<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Full pipeline for one thread. A comment that cannot be normalized is
    /// skipped and returned in `skipped`; anything else fails the thread.
    pub async fn process_thread(
        &self,
        identifier: &ThreadIdentifier,
        retrieve_time: &RetrieveTime,
    ) -> Result<ThreadRecords, ExtractionError> {
        let thread_id = identifier.thread_id();
        debug!("Fetching thread {}", identifier);

        let FetchedThread { post, comments } = self
            .client
            .fetch_thread(identifier)
            .await
            .map_err(|source| ExtractionError::FetchFailed {
                thread: identifier.to_string(),
                source,
            })?;

        let post_record = normalize_post(&post, retrieve_time)?;
        let tree = TreeResolver::new(&*self.client, thread_id)
            .resolve(comments)
            .await?;
        let comments = flatten(tree);

        let mut records = Vec::with_capacity(comments.len() + 1);
        records.push(post_record);
        let mut skipped = Vec::new();

        for comment in &comments {
            let normalized = normalize_comment(comment, retrieve_time).and_then(|record| {
                if record.submission_id() == post.id {
                    Ok(record)
                } else {
                    Err(NormalizationError {
                        node_id: comment.id.clone(),
                        field: "link_id",
                    })
                }
            });
            match normalized {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping comment in thread {}: {}", identifier, e);
                    skipped.push(e);
                }
            }
        }

        Ok(ThreadRecords { records, skipped })
    }

    /// Processes `identifiers` in order. Per-thread failures land in the
    /// report; only a rejected credential aborts the batch.
    pub async fn run(&self, identifiers: Vec<ThreadIdentifier>) -> Result<BatchOutcome, BatchError> {
        self.run_inputs(identifiers.into_iter().map(Ok).collect())
            .await
    }

    /// Like [`run`](Self::run) for caller-supplied text. Inputs that are not
    /// thread identifiers are reported as malformed without any network call.
    pub async fn run_raw<S: AsRef<str>>(&self, inputs: &[S]) -> Result<BatchOutcome, BatchError> {
        let parsed = inputs
            .iter()
            .map(|input| {
                let input = input.as_ref();
                ThreadIdentifier::parse(input).map_err(|_| {
                    (
                        input.to_string(),
                        ExtractionError::MalformedIdentifier {
                            input: input.to_string(),
                        },
                    )
                })
            })
            .collect();
        self.run_inputs(parsed).await
    }

    /// Lists the top threads of a community and processes them.
    pub async fn run_top(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<BatchOutcome, BatchError> {
        let identifiers = self
            .client
            .list_top_thread_ids(community, window, limit)
            .await
            .map_err(|source| BatchError::Listing {
                community: community.to_string(),
                source,
            })?;
        info!(
            "Processing {} top threads of r/{} ({})",
            identifiers.len(),
            community,
            window
        );
        self.run(identifiers).await
    }

    async fn run_inputs(
        &self,
        inputs: Vec<Result<ThreadIdentifier, (String, ExtractionError)>>,
    ) -> Result<BatchOutcome, BatchError> {
        let retrieve_time = RetrieveTime::now();
        let retrieve_time = &retrieve_time;
        let concurrency = self.options.concurrency.clamp(1, MAX_CONCURRENCY);
        let total = inputs.len();
        debug!("Starting batch of {} threads, concurrency {}", total, concurrency);

        // `buffered` yields in input order whatever order threads finish in.
        let mut results = stream::iter(inputs.into_iter().map(|input| async move {
            match input {
                Ok(identifier) => {
                    let result = self.process_thread(&identifier, retrieve_time).await;
                    (identifier.to_string(), result)
                }
                Err((raw, error)) => (raw, Err(error)),
            }
        }))
        .buffered(concurrency);

        let mut outcome = BatchOutcome::default();
        while let Some((label, result)) = results.next().await {
            match result {
                Ok(thread) => {
                    if self.options.report_progress {
                        info!(
                            records = thread.records.len(),
                            thread = %label,
                            "Downloaded {} records from {}",
                            thread.records.len(),
                            label
                        );
                    }
                    for skip in &thread.skipped {
                        outcome.report.record_skip(label.as_str(), skip);
                    }
                    outcome.records.extend(thread.records);
                    outcome.report.record_success(label);
                }
                Err(e) if e.is_authentication_failure() => {
                    error!("Credentials rejected while processing {}, aborting the batch", label);
                    e.log_error();
                    outcome.report.record_failure(label, &e);
                    return Err(BatchError::Aborted {
                        source: e,
                        partial: Box::new(outcome),
                    });
                }
                Err(e) => {
                    warn!("Thread {} failed: {}", label, e);
                    outcome.report.record_failure(label, &e);
                }
            }
        }

        info!(
            "Batch finished: {} of {} threads, {} records",
            outcome.report.succeeded.len(),
            total,
            outcome.records.len()
        );
        Ok(outcome)
    }
}
