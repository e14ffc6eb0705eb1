//! Dispatch pipeline
//!
//! For every settled source document:
//!
//! ```text
//! extract fields -> run injector -> delete source
//!        \______ retry ______/
//! ```
//!
//! Extraction and injection are retried together up to `attempts` times.
//! Failures that cannot change between attempts (too few pages, injector exit
//! status 2) end the cycle at once. The source document is only deleted after
//! a successful injection; otherwise it stays put for manual inspection.

use crate::invoke::{Injector, InvokeStatus};
use crate::watcher::FileWatcher;
use anyhow::Result;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tddgen_core::{extract_fields, Config, ExtractError, FieldValues, PagedDocument, PdfDocument};

/// How long the watch loop blocks before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Opens source documents for extraction.
pub trait DocumentOpener {
    type Document: PagedDocument;

    fn open(&self, path: &Path) -> Result<Self::Document, ExtractError>;
}

/// Opens PDFs with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfOpener;

impl DocumentOpener for PdfOpener {
    type Document = PdfDocument;

    fn open(&self, path: &Path) -> Result<PdfDocument, ExtractError> {
        PdfDocument::open(path)
    }
}

/// Retry bounds and delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extract + inject cycles per document
    pub attempts: u32,
    pub retry_delay: Duration,
    pub delete_attempts: u32,
    pub delete_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.max_attempts(),
            retry_delay: config.retry_delay(),
            delete_attempts: config.delete_attempts(),
            delete_delay: config.delete_delay(),
        }
    }

    /// No delays; handy in tests.
    pub fn immediate(attempts: u32, delete_attempts: u32) -> Self {
        Self {
            attempts,
            retry_delay: Duration::ZERO,
            delete_attempts,
            delete_delay: Duration::ZERO,
        }
    }
}

/// Terminal state of one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Output written and source deleted
    Done,
    /// Output written but the source could not be deleted
    DoneDeleteFailed,
    /// Every attempt failed; source left in place
    Failed { attempts: u32 },
    /// Stopped early on a failure that would repeat; source left in place
    Abandoned { reason: String },
    /// Path was already handled
    Duplicate,
}

impl Outcome {
    /// True when the output document was written.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done | Self::DoneDeleteFailed)
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptError {
    Retryable(String),
    Permanent(String),
}

impl From<ExtractError> for AttemptError {
    fn from(err: ExtractError) -> Self {
        if err.is_permanent() {
            Self::Permanent(err.to_string())
        } else {
            Self::Retryable(err.to_string())
        }
    }
}

pub struct Pipeline<O, I> {
    opener: O,
    injector: I,
    policy: RetryPolicy,
    /// Paths seen so far. Only grows: sources are deleted on success, so a
    /// path is not expected to come back.
    processed: HashSet<PathBuf>,
}

impl<O: DocumentOpener, I: Injector> Pipeline<O, I> {
    pub fn new(opener: O, injector: I, policy: RetryPolicy) -> Self {
        Self {
            opener,
            injector,
            policy,
            processed: HashSet::new(),
        }
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed.contains(path)
    }

    /// Run one source document through the whole cycle.
    ///
    /// Never fails: every problem ends up in the returned [`Outcome`] and the
    /// log, so the caller can move on to the next document.
    pub fn handle(&mut self, path: &Path) -> Outcome {
        if !self.processed.insert(path.to_path_buf()) {
            tracing::debug!("Already handled {}, ignoring", path.display());
            return Outcome::Duplicate;
        }

        tracing::info!("Processing {}", path.display());
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            match self.attempt(path) {
                Ok(()) => return self.remove_source(path),
                Err(AttemptError::Permanent(reason)) => {
                    tracing::error!(
                        "Giving up on {} (will not succeed on retry): {}",
                        path.display(),
                        reason
                    );
                    return Outcome::Abandoned { reason };
                }
                Err(AttemptError::Retryable(reason)) => {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        attempts,
                        path.display(),
                        reason
                    );
                    if attempt < attempts {
                        std::thread::sleep(self.policy.retry_delay);
                    }
                }
            }
        }

        tracing::error!(
            "Failed to process {} after {} attempts, leaving it in place",
            path.display(),
            attempts
        );
        Outcome::Failed { attempts }
    }

    /// Extract, release the document, then run the injector.
    fn attempt(&self, path: &Path) -> Result<(), AttemptError> {
        let values = self.extract(path)?;

        match self.injector.invoke(&values, path) {
            Ok(InvokeStatus::Success) => Ok(()),
            Ok(InvokeStatus::Permanent(code)) => Err(AttemptError::Permanent(format!(
                "injector exited with status {code}"
            ))),
            Ok(InvokeStatus::Retryable(Some(code))) => Err(AttemptError::Retryable(format!(
                "injector exited with status {code}"
            ))),
            Ok(InvokeStatus::Retryable(None)) => Err(AttemptError::Retryable(
                "injector was terminated by a signal".to_string(),
            )),
            Err(err) => Err(AttemptError::Retryable(format!("{err:#}"))),
        }
    }

    fn extract(&self, path: &Path) -> Result<FieldValues, AttemptError> {
        let document = self.opener.open(path)?;
        let values = extract_fields(&document)?;
        // `document` is dropped here, before the injector touches any files
        Ok(values)
    }

    fn remove_source(&self, path: &Path) -> Outcome {
        let attempts = self.policy.delete_attempts.max(1);

        for attempt in 1..=attempts {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::info!("Deleted {}", path.display());
                    return Outcome::Done;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!("{} was already removed", path.display());
                    return Outcome::Done;
                }
                Err(err) => {
                    tracing::warn!(
                        "Delete attempt {}/{} failed for {}: {}",
                        attempt,
                        attempts,
                        path.display(),
                        err
                    );
                    if attempt < attempts {
                        std::thread::sleep(self.policy.delete_delay);
                    }
                }
            }
        }

        tracing::error!(
            "Could not delete {} after {} attempts; output was written",
            path.display(),
            attempts
        );
        Outcome::DoneDeleteFailed
    }
}

/// Feed settled documents from `watcher` into `pipeline` until `shutdown` is set.
pub fn run<O, I>(
    watcher: &mut FileWatcher,
    pipeline: &mut Pipeline<O, I>,
    shutdown: &AtomicBool,
) -> Result<()>
where
    O: DocumentOpener,
    I: Injector,
{
    while !shutdown.load(Ordering::SeqCst) {
        for path in watcher.next_events(POLL_INTERVAL) {
            let outcome = pipeline.handle(&path);
            tracing::debug!("{} -> {:?}", path.display(), outcome);
        }
    }
    Ok(())
}
