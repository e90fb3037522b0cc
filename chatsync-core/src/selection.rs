//! Grounding selection: which ready documents the next message is grounded against.

use crate::store::ConversationStore;
use crate::types::DocumentId;
use std::collections::BTreeSet;

/// Set of selected document ids, restricted to `Ready` documents.
#[derive(Debug, Default, Clone)]
pub struct GroundingSelection {
    selected: BTreeSet<DocumentId>,
}

impl GroundingSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of a document.
    ///
    /// Deselecting always works. Selecting only works for a document the
    /// store knows and whose derived state is `Ready`; anything else is a
    /// no-op. Returns whether the set changed.
    pub fn toggle(&mut self, document_id: &str, store: &ConversationStore) -> bool {
        if self.selected.remove(document_id) {
            return true;
        }
        match store.document(document_id) {
            Some(doc) if doc.is_ready() => {
                self.selected.insert(document_id.to_string());
                true
            }
            Some(doc) => {
                tracing::debug!(
                    document_id = %document_id,
                    state = %doc.state(),
                    "Cannot select document that is not ready"
                );
                false
            }
            None => {
                tracing::debug!(document_id = %document_id, "Cannot select unknown document");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop ids that are no longer ready documents in `store`.
    ///
    /// Returns the dropped ids.
    pub fn retain_ready(&mut self, store: &ConversationStore) -> Vec<DocumentId> {
        let dropped: Vec<DocumentId> = self
            .selected
            .iter()
            .filter(|id| !store.document(id).is_some_and(|d| d.is_ready()))
            .cloned()
            .collect();
        for id in &dropped {
            self.selected.remove(id);
        }
        dropped
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.selected.contains(document_id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected ids in a stable order, as attached to an outgoing message.
    pub fn ids(&self) -> Vec<DocumentId> {
        self.selected.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, PROCESSING_MARKER};

    fn store_with(docs: Vec<(&str, &str)>) -> ConversationStore {
        let mut store = ConversationStore::new();
        store.upsert_documents(docs.into_iter().map(|(id, marker)| Document {
            id: id.to_string(),
            conversation_id: Some("c1".to_string()),
            filename: format!("{}.pdf", id),
            file_path: None,
            created_at: None,
            marker: Some(marker.to_string()),
            embedding: None,
        }));
        store
    }

    #[test]
    fn test_processing_document_cannot_be_selected() {
        let store = store_with(vec![("a", PROCESSING_MARKER)]);
        let mut selection = GroundingSelection::new();
        assert!(!selection.toggle("a", &store));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_ready_document_toggles() {
        let store = store_with(vec![("a", "Processed"), ("b", "Processed 2 chunks")]);
        let mut selection = GroundingSelection::new();

        assert!(selection.toggle("b", &store));
        assert!(selection.toggle("a", &store));
        assert_eq!(selection.ids(), vec!["a".to_string(), "b".to_string()]);

        assert!(selection.toggle("a", &store));
        assert_eq!(selection.ids(), vec!["b".to_string()]);
    }

    #[test]
    fn test_unknown_document_is_ignored() {
        let store = store_with(vec![]);
        let mut selection = GroundingSelection::new();
        assert!(!selection.toggle("ghost", &store));
    }

    #[test]
    fn test_retain_ready_drops_regressed_documents() {
        let mut store = store_with(vec![("a", "Processed"), ("b", "Processed")]);
        let mut selection = GroundingSelection::new();
        selection.toggle("a", &store);
        selection.toggle("b", &store);

        // A re-fetch reports "b" as still processing
        store.upsert_documents(store_with(vec![("b", PROCESSING_MARKER)]).documents().to_vec());
        assert_eq!(selection.retain_ready(&store), vec!["b".to_string()]);
        assert_eq!(selection.ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_clear() {
        let store = store_with(vec![("a", "Processed")]);
        let mut selection = GroundingSelection::new();
        selection.toggle("a", &store);
        selection.clear();
        assert_eq!(selection.len(), 0);
        assert!(!selection.contains("a"));
    }
}
