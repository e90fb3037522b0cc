//! Document status tracking.
//!
//! Keeps the set of documents still being processed by the backend and the
//! polling fallback that runs while that set is non-empty.
//!
//! ## Lifecycle
//!
//! ```text
//!   upload accepted ──► Processing ──(marker "Processed…" or embedding)──► Ready
//! ```
//!
//! `Ready` is terminal. There is no failed state: a document that never
//! resolves stays in the processing set and keeps being polled.
//!
//! Membership is recomputed from the documents' derived state on every
//! ingest, so re-ingesting the same snapshot any number of times converges
//! to the same set. A `doc_processed` push removes its document right away
//! and asks for one delayed re-fetch; the re-fetch is the authority and may
//! put the document back if the backend still reports it as processing.

use crate::realtime::DocProcessed;
use crate::store::ConversationStore;
use crate::types::{Document, DocumentId, DocumentState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Callback fired on each poll tick.
pub type Ticker = Arc<dyn Fn() + Send + Sync>;

/// Outcome of an ingest pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Documents that left the processing set in this pass
    pub became_ready: Vec<DocumentId>,
    /// Size of the processing set after the pass
    pub still_processing: usize,
}

/// Outcome of a `doc_processed` push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushProcessedOutcome {
    /// Cleared (or already absent); a delayed re-fetch should follow
    Reconcile { document_id: DocumentId },
    /// No document id on the event; nothing changed
    Malformed,
}

/// Tracks processing documents and owns the poll timer.
pub struct DocumentTracker {
    processing: HashSet<DocumentId>,
    poll_interval: Duration,
    ticker: Option<Ticker>,
    poll: Option<JoinHandle<()>>,
}

impl DocumentTracker {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            processing: HashSet::new(),
            poll_interval,
            ticker: None,
            poll: None,
        }
    }

    /// Upsert fetched documents and recompute processing membership.
    pub fn ingest(&mut self, store: &mut ConversationStore, docs: Vec<Document>) -> IngestSummary {
        store.upsert_documents(docs);

        let processing: HashSet<DocumentId> = store
            .documents()
            .iter()
            .filter(|d| d.state() == DocumentState::Processing)
            .map(|d| d.id.clone())
            .collect();

        let mut became_ready: Vec<DocumentId> = self
            .processing
            .difference(&processing)
            .cloned()
            .collect();
        became_ready.sort();

        for id in &became_ready {
            tracing::info!(document_id = %id, "Document ready");
        }

        self.processing = processing;
        self.refresh_polling();

        IngestSummary {
            became_ready,
            still_processing: self.processing.len(),
        }
    }

    /// Record a freshly uploaded document as processing.
    pub fn on_upload_accepted(&mut self, store: &mut ConversationStore, doc: Document) {
        tracing::debug!(document_id = %doc.id, filename = %doc.filename, "Upload accepted");
        self.processing.insert(doc.id.clone());
        store.upsert_documents(std::iter::once(doc));
        self.refresh_polling();
    }

    /// Apply a `doc_processed` push.
    pub fn on_push_processed(&mut self, event: &DocProcessed) -> PushProcessedOutcome {
        let Some(document_id) = event.document_id.clone() else {
            tracing::warn!(
                chunks = ?event.chunks,
                status = ?event.status,
                "doc_processed event without document id, ignoring"
            );
            return PushProcessedOutcome::Malformed;
        };

        if self.processing.remove(&document_id) {
            tracing::debug!(
                document_id = %document_id,
                chunks = ?event.chunks,
                "Cleared processing document on push"
            );
        }
        self.refresh_polling();

        PushProcessedOutcome::Reconcile { document_id }
    }

    pub fn is_processing(&self, id: &str) -> bool {
        self.processing.contains(id)
    }

    pub fn processing_count(&self) -> usize {
        self.processing.len()
    }

    /// Processing ids, sorted for stable display.
    pub fn processing_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.processing.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Install the callback used by the poll timer.
    ///
    /// Starts polling right away if documents are already processing.
    pub fn set_ticker(&mut self, ticker: Ticker) {
        self.cancel_polling();
        self.ticker = Some(ticker);
        self.refresh_polling();
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// Stop the poll timer if it is running.
    pub fn cancel_polling(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.abort();
            tracing::debug!("Poll timer stopped");
        }
    }

    /// Drop all state and the ticker (conversation switch or teardown).
    pub fn reset(&mut self) {
        self.cancel_polling();
        self.ticker = None;
        self.processing.clear();
    }

    /// Start or stop the timer to match the processing set.
    fn refresh_polling(&mut self) {
        if self.processing.is_empty() {
            self.cancel_polling();
            return;
        }
        if self.poll.is_some() {
            return;
        }
        let Some(ticker) = self.ticker.clone() else {
            return;
        };

        let period = self.poll_interval;
        tracing::debug!(interval_ms = period.as_millis() as u64, "Poll timer started");
        self.poll = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                ticker();
            }
        }));
    }
}

impl Drop for DocumentTracker {
    fn drop(&mut self) {
        self.cancel_polling();
    }
}

impl std::fmt::Debug for DocumentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentTracker")
            .field("processing", &self.processing)
            .field("poll_interval", &self.poll_interval)
            .field("polling", &self.poll.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PROCESSED_PREFIX, PROCESSING_MARKER};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(id: &str, marker: &str) -> Document {
        Document {
            id: id.to_string(),
            conversation_id: Some("c1".to_string()),
            filename: format!("{}.pdf", id),
            file_path: None,
            created_at: None,
            marker: Some(marker.to_string()),
            embedding: None,
        }
    }

    fn processed(id: &str) -> DocProcessed {
        DocProcessed {
            document_id: Some(id.to_string()),
            chunks: Some(4),
            status: Some("completed".to_string()),
        }
    }

    #[test]
    fn test_ingest_builds_processing_set() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));

        let summary = tracker.ingest(
            &mut store,
            vec![doc("a", PROCESSING_MARKER), doc("b", PROCESSED_PREFIX)],
        );

        assert_eq!(summary.still_processing, 1);
        assert!(tracker.is_processing("a"));
        assert!(!tracker.is_processing("b"));
        assert_eq!(store.documents().len(), 2);
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));
        let docs = vec![doc("a", PROCESSING_MARKER), doc("b", "Processed 3 chunks")];

        tracker.ingest(&mut store, docs.clone());
        let first = (tracker.processing_ids(), store.documents().to_vec());
        tracker.ingest(&mut store, docs.clone());
        tracker.ingest(&mut store, docs);

        assert_eq!(first, (tracker.processing_ids(), store.documents().to_vec()));
    }

    #[test]
    fn test_ingest_reports_newly_ready() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));
        tracker.ingest(&mut store, vec![doc("a", PROCESSING_MARKER)]);

        let summary = tracker.ingest(&mut store, vec![doc("a", "Processed")]);
        assert_eq!(summary.became_ready, vec!["a".to_string()]);
        assert_eq!(summary.still_processing, 0);
    }

    #[test]
    fn test_push_clears_and_requests_reconcile() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));
        tracker.on_upload_accepted(&mut store, doc("a", PROCESSING_MARKER));
        assert!(tracker.is_processing("a"));

        let outcome = tracker.on_push_processed(&processed("a"));
        assert_eq!(
            outcome,
            PushProcessedOutcome::Reconcile {
                document_id: "a".to_string()
            }
        );
        assert!(!tracker.is_processing("a"));

        // Same event again: same state
        tracker.on_push_processed(&processed("a"));
        assert_eq!(tracker.processing_count(), 0);
    }

    #[test]
    fn test_push_without_document_id_is_ignored() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));
        tracker.on_upload_accepted(&mut store, doc("a", PROCESSING_MARKER));

        let outcome = tracker.on_push_processed(&DocProcessed {
            document_id: None,
            chunks: Some(10),
            status: Some("completed".to_string()),
        });
        assert_eq!(outcome, PushProcessedOutcome::Malformed);
        assert!(tracker.is_processing("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timer_runs_while_processing() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(3));
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        tracker.set_ticker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!tracker.is_polling());

        tracker.on_upload_accepted(&mut store, doc("a", PROCESSING_MARKER));
        assert!(tracker.is_polling());

        tokio::time::sleep(Duration::from_millis(6500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        tracker.ingest(&mut store, vec![doc("a", "Processed")]);
        assert!(!tracker.is_polling());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_timer() {
        let mut store = ConversationStore::new();
        let mut tracker = DocumentTracker::new(Duration::from_secs(1));
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        tracker.set_ticker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        tracker.on_upload_accepted(&mut store, doc("a", PROCESSING_MARKER));

        tracker.reset();
        assert!(!tracker.is_polling());
        assert_eq!(tracker.processing_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
