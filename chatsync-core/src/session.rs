//! Session: one active conversation kept in sync with the backend.
//!
//! The session owns the store, reconciler, tracker and selection and runs
//! them on one logical thread. Network calls, push handlers and timers never
//! touch that state directly; they post [`SessionEvent`]s to an internal
//! queue that [`Session::step`] drains one event at a time.
//!
//! ```text
//!   user op ──► optimistic change ──► spawned request ──┐
//!   push handler ───────────────────────────────────────┼──► queue ──► handle()
//!   poll / reconcile / notice timers ───────────────────┘
//! ```
//!
//! Every event that belongs to a conversation carries its id and is
//! discarded if that conversation is no longer active when it is handled.
//!
//! Must be used from inside a tokio runtime.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{fetch_snapshot, ConversationApi, ConversationSnapshot};
use crate::config::{Config, SyncConfig};
use crate::error::Result;
use crate::notify::{Notice, NoticeId, NoticeLevel, Notifications};
use crate::realtime::{EventKind, HandlerId, Lifecycle, PushEvent, RealtimeChannel};
use crate::reconciler::{AckOutcome, MessageReconciler, PushOutcome};
use crate::selection::GroundingSelection;
use crate::store::ConversationStore;
use crate::tracker::{DocumentTracker, PushProcessedOutcome};
use crate::types::{
    ConversationDetail, ConversationId, ConversationSummary, Document, DocumentId, Message,
    MessageId, UploadFile,
};
use crate::upload::UploadGate;

/// Re-fetches spent waiting for the stored copy of a send that was
/// answered with a reply, before its temporary message is dropped.
const MAX_SETTLE_ATTEMPTS: u32 = 5;

/// Why a conversation was re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// Processing-set polling fallback
    Poll,
    /// Delayed re-fetch after a `doc_processed` push
    Reconcile,
    /// Re-fetch for the stored copy of a send answered with a reply
    Settle,
    /// Requested by the user
    Manual,
}

/// Everything the session reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    Loaded {
        conversation_id: ConversationId,
        result: Result<ConversationSnapshot>,
    },
    Refreshed {
        conversation_id: ConversationId,
        reason: RefreshReason,
        result: Result<ConversationSnapshot>,
    },
    SendCompleted {
        conversation_id: ConversationId,
        temp_id: MessageId,
        result: Result<Message>,
    },
    UploadCompleted {
        conversation_id: ConversationId,
        filename: String,
        result: Result<Document>,
    },
    Created {
        result: Result<ConversationDetail>,
    },
    Deleted {
        conversation_id: ConversationId,
        result: Result<()>,
    },
    /// Push event delivered to the handlers registered for `conversation_id`
    Push {
        conversation_id: ConversationId,
        event: PushEvent,
    },
    Lifecycle(Lifecycle),
    PollTick {
        conversation_id: ConversationId,
    },
    ReconcileDue {
        conversation_id: ConversationId,
    },
    SettleDue {
        conversation_id: ConversationId,
    },
    NoticeExpired(NoticeId),
}

/// Drives the sync engine for one active conversation at a time.
pub struct Session {
    api: Arc<dyn ConversationApi>,
    channel: RealtimeChannel,
    sync: SyncConfig,
    gate: UploadGate,

    store: ConversationStore,
    reconciler: MessageReconciler,
    tracker: DocumentTracker,
    selection: GroundingSelection,
    notifications: Notifications,

    active: Option<ConversationId>,
    conversation_handlers: Vec<(EventKind, HandlerId)>,
    lifecycle_handler: Option<HandlerId>,
    reconcile_timers: Vec<JoinHandle<()>>,
    refreshes_in_flight: usize,
    /// A settle re-fetch (or its timer) is outstanding
    settle_scheduled: bool,
    settle_attempts: u32,
    /// Pushed messages that arrived before the active conversation loaded
    early_messages: Vec<Message>,
    /// Spawned requests whose completion event has not been handled yet
    in_flight: usize,

    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new(api: Arc<dyn ConversationApi>, channel: RealtimeChannel, config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let lifecycle_tx = tx.clone();
        let lifecycle_handler = channel.subscribe(
            EventKind::Lifecycle,
            Arc::new(move |event: &PushEvent| {
                if let PushEvent::Lifecycle(lifecycle) = event {
                    let _ = lifecycle_tx.send(SessionEvent::Lifecycle(lifecycle.clone()));
                }
            }),
        );

        Self {
            api,
            channel,
            sync: config.sync.clone(),
            gate: UploadGate::new(&config.upload),
            store: ConversationStore::new(),
            reconciler: MessageReconciler::new(),
            tracker: DocumentTracker::new(config.sync.poll_interval()),
            selection: GroundingSelection::new(),
            notifications: Notifications::new(config.sync.notification_ttl()),
            active: None,
            conversation_handlers: Vec::new(),
            lifecycle_handler: Some(lifecycle_handler),
            reconcile_timers: Vec::new(),
            refreshes_in_flight: 0,
            settle_scheduled: false,
            settle_attempts: 0,
            early_messages: Vec::new(),
            in_flight: 0,
            tx,
            rx,
        }
    }

    /// Start (or keep) the realtime connection.
    pub fn connect(&self) -> Result<()> {
        self.channel.connect()
    }

    // ============================================
    // Conversation switching
    // ============================================

    /// Make `conversation_id` the active conversation.
    ///
    /// Tears the previous conversation down first: poll timer, handlers,
    /// room, then local state. Then starts loading the new one and joins
    /// its room.
    pub fn open(&mut self, conversation_id: &str) {
        self.teardown();

        tracing::info!(conversation_id = %conversation_id, "Opening conversation");
        self.active = Some(conversation_id.to_string());

        let api = self.api.clone();
        let id = conversation_id.to_string();
        self.spawn_request(async move {
            let result = fetch_snapshot(api.as_ref(), &id).await;
            SessionEvent::Loaded {
                conversation_id: id,
                result,
            }
        });

        self.channel.join_room(conversation_id);
        self.attach_handlers(conversation_id);

        let tx = self.tx.clone();
        let id = conversation_id.to_string();
        self.tracker.set_ticker(Arc::new(move || {
            let _ = tx.send(SessionEvent::PollTick {
                conversation_id: id.clone(),
            });
        }));
    }

    /// Leave the active conversation without opening another.
    pub fn close(&mut self) {
        if let Some(id) = self.active.as_deref() {
            tracing::info!(conversation_id = %id, "Closing conversation");
        }
        self.teardown();
    }

    /// Close the conversation, drop every handler and stop the channel.
    pub fn shutdown(&mut self) {
        self.teardown();
        if let Some(id) = self.lifecycle_handler.take() {
            self.channel.unsubscribe(EventKind::Lifecycle, id);
        }
        self.channel.shutdown();
    }

    fn teardown(&mut self) {
        self.tracker.cancel_polling();
        for (kind, id) in self.conversation_handlers.drain(..) {
            self.channel.unsubscribe(kind, id);
        }
        if let Some(previous) = self.active.take() {
            self.channel.leave_room(&previous);
        }

        self.store.clear();
        self.selection.clear();
        self.reconciler.reset();
        self.tracker.reset();
        for timer in self.reconcile_timers.drain(..) {
            timer.abort();
        }
        self.refreshes_in_flight = 0;
        self.settle_scheduled = false;
        self.settle_attempts = 0;
        self.early_messages.clear();
    }

    fn attach_handlers(&mut self, conversation_id: &str) {
        for kind in [EventKind::NewMessage, EventKind::DocProcessed] {
            let tx = self.tx.clone();
            let id = conversation_id.to_string();
            let handler = self.channel.subscribe(
                kind,
                Arc::new(move |event: &PushEvent| {
                    let _ = tx.send(SessionEvent::Push {
                        conversation_id: id.clone(),
                        event: event.clone(),
                    });
                }),
            );
            self.conversation_handlers.push((kind, handler));
        }
    }

    // ============================================
    // User operations
    // ============================================

    /// Send a message in the loaded conversation.
    ///
    /// The optimistic copy is in the store when this returns. Returns its
    /// temporary id, or `None` if nothing is loaded or `content` is blank.
    pub fn send_message(&mut self, content: &str) -> Option<MessageId> {
        if content.trim().is_empty() {
            return None;
        }
        let Some(conversation_id) = self.store.conversation_id().map(str::to_string) else {
            self.notify(NoticeLevel::Error, "No conversation loaded");
            return None;
        };

        let message = self.reconciler.begin_send(&mut self.store, content)?;
        let doc_ids = self.selection.ids();
        let temp_id = message.id.clone();

        let api = self.api.clone();
        let content = content.to_string();
        let pending_id = temp_id.clone();
        self.spawn_request(async move {
            let result = api.send_message(&conversation_id, &content, &doc_ids).await;
            SessionEvent::SendCompleted {
                conversation_id,
                temp_id: pending_id,
                result,
            }
        });

        Some(temp_id)
    }

    /// Upload a batch into the loaded conversation.
    ///
    /// Unsupported and duplicate files are held back with a notice; the
    /// rest are uploaded independently. Returns how many uploads started.
    pub fn upload(&mut self, files: Vec<UploadFile>) -> usize {
        let Some(conversation_id) = self.store.conversation_id().map(str::to_string) else {
            self.notify(NoticeLevel::Error, "No conversation loaded");
            return 0;
        };

        let plan = self.gate.plan(files);
        for filename in &plan.rejected {
            self.notify(
                NoticeLevel::Error,
                format!("Unsupported file type: {}", filename),
            );
        }
        for filename in &plan.duplicates {
            self.notify(
                NoticeLevel::Info,
                format!("Skipped duplicate file: {}", filename),
            );
        }

        let started = plan.accepted.len();
        for file in plan.accepted {
            let api = self.api.clone();
            let conversation_id = conversation_id.clone();
            self.spawn_request(async move {
                let result = api.upload_document(&conversation_id, &file).await;
                SessionEvent::UploadCompleted {
                    conversation_id,
                    filename: file.filename,
                    result,
                }
            });
        }
        started
    }

    /// Flip a document in the grounding selection. Only ready documents can be added.
    pub fn toggle_grounding(&mut self, document_id: &str) -> bool {
        self.selection.toggle(document_id, &self.store)
    }

    pub fn clear_grounding(&mut self) {
        self.selection.clear();
    }

    /// Re-fetch the active conversation.
    pub fn refresh(&mut self) {
        self.spawn_refresh(RefreshReason::Manual);
    }

    /// Create a conversation and open it once the backend has it.
    pub fn create_conversation(&mut self, first_message: &str) {
        let api = self.api.clone();
        let first_message = first_message.to_string();
        self.spawn_request(async move {
            let result = api.create_conversation(&first_message, &[]).await;
            SessionEvent::Created { result }
        });
    }

    /// Delete a conversation, closing it first if it is active.
    pub fn delete_conversation(&mut self, conversation_id: &str) {
        if self.active.as_deref() == Some(conversation_id) {
            self.close();
        }
        let api = self.api.clone();
        let id = conversation_id.to_string();
        self.spawn_request(async move {
            let result = api.delete_conversation(&id).await;
            SessionEvent::Deleted {
                conversation_id: id,
                result,
            }
        });
    }

    pub async fn list_conversations(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        self.api.list_conversations(skip, limit).await
    }

    // ============================================
    // Event loop
    // ============================================

    /// Wait for one event and handle it.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    /// Handle every event already queued without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Step until every spawned request has reported back.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            if !self.step().await {
                break;
            }
        }
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Loaded {
                conversation_id,
                result,
            } => {
                self.request_done();
                if self.is_stale(&conversation_id, "load") {
                    return;
                }
                self.on_loaded(&conversation_id, result);
            }
            SessionEvent::Refreshed {
                conversation_id,
                reason,
                result,
            } => {
                self.request_done();
                if self.is_stale(&conversation_id, "refresh") {
                    return;
                }
                self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
                self.on_refreshed(&conversation_id, reason, result);
                if reason == RefreshReason::Settle {
                    self.settle_scheduled = false;
                    self.follow_up_settle(&conversation_id);
                } else if !self.reconciler.has_unsettled() {
                    self.settle_attempts = 0;
                }
            }
            SessionEvent::SendCompleted {
                conversation_id,
                temp_id,
                result,
            } => {
                self.request_done();
                if self.is_stale(&conversation_id, "send") {
                    return;
                }
                self.on_send_completed(&temp_id, result);
            }
            SessionEvent::UploadCompleted {
                conversation_id,
                filename,
                result,
            } => {
                self.request_done();
                if self.is_stale(&conversation_id, "upload") {
                    return;
                }
                match result {
                    Ok(doc) => {
                        self.tracker.on_upload_accepted(&mut self.store, doc);
                        self.notify(NoticeLevel::Info, format!("Uploaded {}", filename));
                    }
                    Err(err) => self.notify(
                        NoticeLevel::Error,
                        format!("Failed to upload {}: {}", filename, err),
                    ),
                }
            }
            SessionEvent::Created { result } => {
                self.request_done();
                match result {
                    Ok(detail) => {
                        tracing::info!(conversation_id = %detail.id, "Conversation created");
                        self.open(&detail.id);
                    }
                    Err(err) => self.notify(
                        NoticeLevel::Error,
                        format!("Failed to create conversation: {}", err),
                    ),
                }
            }
            SessionEvent::Deleted {
                conversation_id,
                result,
            } => {
                self.request_done();
                match result {
                    Ok(()) => self.notify(
                        NoticeLevel::Info,
                        format!("Deleted conversation {}", conversation_id),
                    ),
                    Err(err) => self.notify(
                        NoticeLevel::Error,
                        format!("Failed to delete conversation {}: {}", conversation_id, err),
                    ),
                }
            }
            SessionEvent::Push {
                conversation_id,
                event,
            } => {
                if self.is_stale(&conversation_id, "push") {
                    return;
                }
                self.on_push(&conversation_id, event);
            }
            SessionEvent::Lifecycle(lifecycle) => match lifecycle {
                Lifecycle::Disconnected { reason } => {
                    tracing::warn!(reason = %reason, "Realtime disconnected")
                }
                other => tracing::debug!(event = ?other, "Realtime lifecycle"),
            },
            SessionEvent::PollTick { conversation_id } => {
                if self.is_stale(&conversation_id, "poll") {
                    return;
                }
                if self.refreshes_in_flight > 0 {
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        "Refresh in flight, skipping poll tick"
                    );
                    return;
                }
                self.spawn_refresh(RefreshReason::Poll);
            }
            SessionEvent::ReconcileDue { conversation_id } => {
                if self.is_stale(&conversation_id, "reconcile") {
                    return;
                }
                self.spawn_refresh(RefreshReason::Reconcile);
            }
            SessionEvent::SettleDue { conversation_id } => {
                if self.is_stale(&conversation_id, "settle") {
                    return;
                }
                if self.reconciler.has_unsettled() {
                    self.spawn_refresh(RefreshReason::Settle);
                } else {
                    self.settle_scheduled = false;
                    self.settle_attempts = 0;
                }
            }
            SessionEvent::NoticeExpired(id) => {
                self.notifications.dismiss(id);
            }
        }
    }

    fn on_loaded(&mut self, conversation_id: &str, result: Result<ConversationSnapshot>) {
        match result {
            Ok(snapshot) => {
                let mut detail = snapshot.into_detail();
                let documents = std::mem::take(&mut detail.documents);
                self.store.load(detail);
                let summary = self.tracker.ingest(&mut self.store, documents);
                for message in std::mem::take(&mut self.early_messages) {
                    self.reconciler.apply_push(&mut self.store, message);
                }
                tracing::info!(
                    conversation_id = %conversation_id,
                    messages = self.store.messages().len(),
                    documents = self.store.documents().len(),
                    processing = summary.still_processing,
                    "Conversation loaded"
                );
            }
            Err(err) => self.notify(
                NoticeLevel::Error,
                format!("Failed to load conversation {}: {}", conversation_id, err),
            ),
        }
    }

    fn on_refreshed(
        &mut self,
        conversation_id: &str,
        reason: RefreshReason,
        result: Result<ConversationSnapshot>,
    ) {
        let snapshot = match result {
            // The initial load failed; this re-fetch stands in for it
            Ok(snapshot) if self.store.conversation_id().is_none() => {
                self.on_loaded(conversation_id, Ok(snapshot));
                return;
            }
            Ok(snapshot) => snapshot,
            Err(err) if reason == RefreshReason::Manual => {
                self.notify(NoticeLevel::Error, format!("Failed to refresh: {}", err));
                return;
            }
            Err(err) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    reason = ?reason,
                    error = %err,
                    "Refresh failed"
                );
                return;
            }
        };

        let detail = snapshot.into_detail();
        self.reconciler.merge_fetched(&mut self.store, detail.messages);
        let summary = self.tracker.ingest(&mut self.store, detail.documents);

        for id in self.selection.retain_ready(&self.store) {
            tracing::debug!(document_id = %id, "Deselected document that is no longer ready");
        }
        for id in summary.became_ready {
            let name = self
                .store
                .document(&id)
                .map(|d| d.filename.clone())
                .unwrap_or(id);
            self.notify(NoticeLevel::Info, format!("{} is ready", name));
        }
    }

    fn on_send_completed(&mut self, temp_id: &str, result: Result<Message>) {
        match result {
            Ok(response) => {
                let outcome = self.reconciler.acknowledge(&mut self.store, temp_id, response);
                if outcome == AckOutcome::AwaitingServerCopy && !self.settle_scheduled {
                    self.settle_scheduled = true;
                    self.spawn_refresh(RefreshReason::Settle);
                }
            }
            Err(err) => {
                tracing::warn!(
                    message_id = %temp_id,
                    transient = err.is_transient(),
                    error = %err,
                    "Send failed, rolling back"
                );
                self.reconciler.rollback(&mut self.store, temp_id);
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to send message: {}", err),
                );
            }
        }
    }

    fn on_push(&mut self, conversation_id: &str, event: PushEvent) {
        match event {
            PushEvent::NewMessage(message) if self.store.conversation_id().is_none() => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    message_id = %message.id,
                    "Holding pushed message until the conversation loads"
                );
                self.early_messages.push(message);
            }
            PushEvent::NewMessage(message) => {
                let message_id = message.id.clone();
                let outcome = self.reconciler.apply_push(&mut self.store, message);
                if outcome != PushOutcome::Appended {
                    tracing::debug!(
                        message_id = %message_id,
                        outcome = ?outcome,
                        "Pushed message not applied"
                    );
                }
            }
            PushEvent::DocProcessed(processed) => {
                if let PushProcessedOutcome::Reconcile { document_id } =
                    self.tracker.on_push_processed(&processed)
                {
                    tracing::debug!(document_id = %document_id, "Scheduling reconcile re-fetch");
                    self.schedule_reconcile(conversation_id);
                }
            }
            PushEvent::Lifecycle(lifecycle) => {
                tracing::debug!(event = ?lifecycle, "Realtime lifecycle");
            }
        }
    }

    // ============================================
    // Spawning helpers
    // ============================================

    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
    }

    fn request_done(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn spawn_refresh(&mut self, reason: RefreshReason) {
        let Some(conversation_id) = self.active.clone() else {
            return;
        };
        self.refreshes_in_flight += 1;
        let api = self.api.clone();
        self.spawn_request(async move {
            let result = fetch_snapshot(api.as_ref(), &conversation_id).await;
            SessionEvent::Refreshed {
                conversation_id,
                reason,
                result,
            }
        });
    }

    fn schedule_reconcile(&mut self, conversation_id: &str) {
        self.post_after_delay(SessionEvent::ReconcileDue {
            conversation_id: conversation_id.to_string(),
        });
    }

    /// After a settle re-fetch: retry while answered sends still lack their
    /// server copy, and give up on them once the attempts run out.
    fn follow_up_settle(&mut self, conversation_id: &str) {
        if !self.reconciler.has_unsettled() {
            self.settle_attempts = 0;
            return;
        }

        self.settle_attempts += 1;
        if self.settle_attempts >= MAX_SETTLE_ATTEMPTS {
            let dropped = self.reconciler.abandon_unsettled(&mut self.store);
            self.settle_attempts = 0;
            self.notify(
                NoticeLevel::Error,
                format!(
                    "{} sent message(s) could not be confirmed; refresh to reload",
                    dropped.len()
                ),
            );
            return;
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            attempt = self.settle_attempts,
            "Server copy of sent message not seen yet, retrying"
        );
        self.settle_scheduled = true;
        self.post_after_delay(SessionEvent::SettleDue {
            conversation_id: conversation_id.to_string(),
        });
    }

    /// Post `event` once the reconcile delay has passed. Aborted on teardown.
    fn post_after_delay(&mut self, event: SessionEvent) {
        self.reconcile_timers.retain(|timer| !timer.is_finished());
        let tx = self.tx.clone();
        let delay = self.sync.reconcile_delay();
        self.reconcile_timers.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        }));
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let id = self.notifications.push(level, text);
        let tx = self.tx.clone();
        let ttl = self.notifications.ttl();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = tx.send(SessionEvent::NoticeExpired(id));
        });
    }

    fn is_stale(&self, conversation_id: &str, what: &str) -> bool {
        if self.active.as_deref() == Some(conversation_id) {
            return false;
        }
        tracing::debug!(
            conversation_id = %conversation_id,
            active = ?self.active,
            "Discarding stale {}",
            what
        );
        true
    }

    // ============================================
    // Accessors
    // ============================================

    /// Conversation being shown (or loading).
    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn processing_ids(&self) -> Vec<DocumentId> {
        self.tracker.processing_ids()
    }

    pub fn is_processing(&self, document_id: &str) -> bool {
        self.tracker.is_processing(document_id)
    }

    pub fn is_polling(&self) -> bool {
        self.tracker.is_polling()
    }

    pub fn selection(&self) -> &GroundingSelection {
        &self.selection
    }

    pub fn pending_sends(&self) -> usize {
        self.reconciler.pending_count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn notices(&self) -> &[Notice] {
        self.notifications.active()
    }

    /// Notices raised since the last call.
    pub fn take_new_notices(&mut self) -> Vec<Notice> {
        self.notifications.unseen()
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    /// Handlers registered for the active conversation.
    pub fn conversation_handlers(&self) -> &[(EventKind, HandlerId)] {
        &self.conversation_handlers
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
        if let Some(id) = self.lifecycle_handler.take() {
            self.channel.unsubscribe(EventKind::Lifecycle, id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.active)
            .field("messages", &self.store.messages().len())
            .field("documents", &self.store.documents().len())
            .field("tracker", &self.tracker)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
