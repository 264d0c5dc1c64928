//! Enrichment worker pool
//!
//! Every fetched record is queued before any result is read. N workers drain
//! the shared queue and report one [`WorkResult`] per record on a
//! multi-producer result channel; the single consumer is the pipeline.
//! Workers exit once the queue is closed and empty.

use crate::catalog::CatalogApi;
use crate::error::EnrichError;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use xyzb_common::{isbn, BookRecord};

/// Step at which a record failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// ISBN-13 could not be converted
    Convert,
    /// Catalog refused the corrected record
    Push,
}

/// Why a record could not be enriched
#[derive(Debug)]
pub struct WorkFailure {
    pub stage: FailureStage,
    pub error: EnrichError,
}

/// Outcome of processing one record
#[derive(Debug)]
pub struct WorkResult {
    /// The record, carrying the new ISBN-10 when `isbn_updated` is set
    pub book: BookRecord,
    /// An ISBN-10 was derived and accepted by the catalog in this run
    pub isbn_updated: bool,
    pub failure: Option<WorkFailure>,
}

impl WorkResult {
    fn unchanged(book: BookRecord) -> Self {
        Self {
            book,
            isbn_updated: false,
            failure: None,
        }
    }

    fn enriched(book: BookRecord) -> Self {
        Self {
            book,
            isbn_updated: true,
            failure: None,
        }
    }

    fn failed(book: BookRecord, stage: FailureStage, error: EnrichError) -> Self {
        Self {
            book,
            isbn_updated: false,
            failure: Some(WorkFailure { stage, error }),
        }
    }
}

/// Workers plus the receiving end of their result channel
pub(crate) struct Dispatch {
    pub results: mpsc::Receiver<WorkResult>,
    pub workers: Vec<JoinHandle<()>>,
    /// Records actually placed on the queue
    pub submitted: usize,
}

/// Queue every record and start `worker_count` workers
///
/// The queue holds all records at once, so submission never waits on the
/// workers. The queue is closed after the last record is sent.
pub(crate) async fn dispatch(
    books: Vec<BookRecord>,
    worker_count: usize,
    catalog: Arc<dyn CatalogApi>,
) -> Dispatch {
    let worker_count = worker_count.max(1);
    let capacity = books.len().max(1);
    info!(worker_count, records = books.len(), "Dispatching records to workers");

    let (book_tx, book_rx) = mpsc::channel::<BookRecord>(capacity);
    let (result_tx, result_rx) = mpsc::channel::<WorkResult>(capacity);
    let book_rx = Arc::new(Mutex::new(book_rx));

    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let receiver = Arc::clone(&book_rx);
        let results = result_tx.clone();
        let catalog = Arc::clone(&catalog);

        workers.push(tokio::spawn(async move {
            enrichment_worker(worker_id, receiver, results, catalog).await;
        }));
    }
    // Only workers hold result senders from here on
    drop(result_tx);

    let mut submitted = 0;
    for book in books {
        if book_tx.send(book).await.is_err() {
            warn!(submitted, "Work queue closed early, all workers have exited");
            break;
        }
        submitted += 1;
    }
    drop(book_tx);

    Dispatch {
        results: result_rx,
        workers,
        submitted,
    }
}

async fn enrichment_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<BookRecord>>>,
    results: mpsc::Sender<WorkResult>,
    catalog: Arc<dyn CatalogApi>,
) {
    debug!(worker_id, "Enrichment worker started");

    loop {
        let book = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };

        let Some(book) = book else {
            debug!(worker_id, "Enrichment worker shutting down");
            break;
        };

        let result = enrich_book(worker_id, book, catalog.as_ref()).await;
        if results.send(result).await.is_err() {
            warn!(worker_id, "Result channel closed, stopping worker");
            break;
        }
    }
}

/// Derive and push a missing ISBN-10 for one record
///
/// Records that already have an ISBN-10 pass through untouched. A record
/// whose ISBN-13 cannot be converted is never pushed.
pub(crate) async fn enrich_book(
    worker_id: usize,
    book: BookRecord,
    catalog: &dyn CatalogApi,
) -> WorkResult {
    if !book.needs_isbn10() {
        return WorkResult::unchanged(book);
    }

    if !isbn::is_valid_isbn13(&book.isbn13) {
        debug!(worker_id, isbn13 = %book.isbn13, "ISBN-13 check digit does not verify");
    }

    let isbn10 = match isbn::isbn13_to_isbn10(&book.isbn13) {
        Ok(isbn10) => isbn10,
        Err(e) => {
            warn!(
                worker_id,
                book_id = %book.id,
                isbn13 = %book.isbn13,
                error = %e,
                "Failed to convert ISBN 13 to ISBN 10"
            );
            return WorkResult::failed(book, FailureStage::Convert, e.into());
        }
    };

    let mut updated = book.clone();
    updated.isbn10 = Some(isbn10);

    match catalog.push_update(&updated).await {
        Ok(()) => {
            debug!(
                worker_id,
                book_id = %updated.id,
                isbn13 = %updated.isbn13,
                isbn10 = updated.isbn10().unwrap_or(""),
                "Book enriched"
            );
            WorkResult::enriched(updated)
        }
        Err(e) => {
            warn!(worker_id, book_id = %book.id, error = %e, "Failed to update book");
            WorkResult::failed(book, FailureStage::Push, e)
        }
    }
}
