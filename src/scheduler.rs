//! Fans documents out over a fixed pool of worker threads.
//!
//! Workers claim indices from one shared atomic counter. Each result goes
//! into its own pre-allocated slot, so the output always follows input
//! order no matter which document finishes first. Failures are collected
//! separately under a mutex.

use crate::{
    error::ErrorRecord,
    pipeline::{DocumentJob, DocumentProcessor, DocumentText},
};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tracing::{debug, info, info_span};

/// Everything a batch produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One entry per input document; `None` where the document failed.
    pub documents: Vec<Option<DocumentText>>,
    /// Failed documents, sorted by input index.
    pub errors: Vec<ErrorRecord>,
    pub workers: usize,
}

impl BatchOutcome {
    /// Texts in input order; failed documents are empty strings.
    pub fn texts(&self) -> Vec<&str> {
        self.documents
            .iter()
            .map(|d| d.as_ref().map_or("", |d| d.text.as_str()))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Number of workers for `documents` inputs: the configured cap (0 means
/// `available`), at least 1, never more than there are documents.
pub fn worker_count(available: usize, max_workers: usize, documents: usize) -> usize {
    let cap = if max_workers == 0 { available } else { max_workers };
    cap.max(1).min(documents)
}

/// Process every path, blocking until all workers are done.
///
/// `max_workers == 0` sizes the pool to the number of logical CPUs.
pub fn run_batch<P: DocumentProcessor>(
    processor: &P,
    paths: &[PathBuf],
    max_workers: usize,
) -> BatchOutcome {
    let workers = worker_count(num_cpus::get(), max_workers, paths.len());
    info!("batch documents={} workers={workers}", paths.len());
    if workers == 0 {
        return BatchOutcome::default();
    }

    let started = Instant::now();
    let next = AtomicUsize::new(0);
    let slots: Vec<OnceLock<DocumentText>> = (0..paths.len()).map(|_| OnceLock::new()).collect();
    let errors: Mutex<Vec<ErrorRecord>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let (next, slots, errors) = (&next, &slots, &errors);
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = paths.get(index) else {
                        break;
                    };
                    let span = info_span!("document", worker, index);
                    let _enter = span.enter();

                    let job = DocumentJob {
                        index,
                        path: path.clone(),
                    };
                    match run_contained(processor, &job) {
                        Ok(text) => {
                            // Each index is claimed exactly once.
                            let _ = slots[index].set(text);
                        }
                        Err(record) => errors
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(record),
                    }
                }
                debug!("worker {worker} done");
            });
        }
    });

    let mut errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
    errors.sort_by_key(|e| e.index);
    let documents: Vec<Option<DocumentText>> = slots.into_iter().map(OnceLock::into_inner).collect();

    info!(
        "batch finished ok={} failed={} elapsed={:?}",
        documents.iter().filter(|d| d.is_some()).count(),
        errors.len(),
        started.elapsed()
    );

    BatchOutcome {
        documents,
        errors,
        workers,
    }
}

/// Run one job, turning both errors and panics into an [`ErrorRecord`].
fn run_contained<P: DocumentProcessor>(
    processor: &P,
    job: &DocumentJob,
) -> Result<DocumentText, ErrorRecord> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| processor.process(job))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(ErrorRecord::new(job.index, job.path.clone(), &err)),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ErrorRecord {
                index: job.index,
                path: job.path.clone(),
                kind: "panic",
                message: format!("worker panicked on {}: {msg}", job.path.display()),
            })
        }
    }
}
