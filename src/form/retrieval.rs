//! Attach stored memories to questions and raw fields ahead of planning.

use super::types::{BatchItem, FormField, GeneratedQuestion, Question};
use crate::memory::KnowledgeStore;

pub const DEFAULT_MEMORIES_PER_ITEM: usize = 3;

/// Number the questions by position and fetch `k` memories for each.
///
/// Questions with no memories at all are left out: there is nothing to
/// answer them from.
pub fn retrieve_for_questions(
    store: &KnowledgeStore,
    questions: &[GeneratedQuestion],
    k: usize,
) -> Vec<BatchItem<Question>> {
    questions
        .iter()
        .enumerate()
        .filter_map(|(id, q)| {
            let memories = store.search(&q.question, k);
            if memories.is_empty() {
                tracing::debug!(id, field = %q.field_name, "no memories for question, dropping");
                return None;
            }
            Some(BatchItem {
                item: Question {
                    question: q.question.clone(),
                    field_name: q.field_name.clone(),
                    id,
                },
                memories,
            })
        })
        .collect()
}

/// Fetch `k` memories per field, querying by the field's name.
///
/// Every field is kept, even without memories, so the filler still sees it.
pub fn retrieve_for_fields(
    store: &KnowledgeStore,
    fields: &[FormField],
    k: usize,
) -> Vec<BatchItem<FormField>> {
    fields
        .iter()
        .map(|field| BatchItem {
            item: field.clone(),
            memories: store.search(&field.query_text(), k),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embedding::hashing::HashingEmbeddingProvider;
    use crate::index::InMemoryIndex;
    use crate::memory::merge::NeverMerge;
    use serde_json::json;

    fn store() -> KnowledgeStore {
        let index = InMemoryIndex::new(Arc::new(HashingEmbeddingProvider::new()));
        let store = KnowledgeStore::new(Box::new(index), Box::new(NeverMerge));
        store.add_fact("Jane Doe email is jane@example.com", "profile").unwrap();
        store.add_fact("Jane Doe phone number is 555 0100", "profile").unwrap();
        store
    }

    #[test]
    fn questions_get_positional_ids() {
        let questions = vec![
            GeneratedQuestion { field_name: "email".into(), question: "What is the email?".into() },
            GeneratedQuestion { field_name: "phone".into(), question: "What is the phone number?".into() },
        ];
        let items = retrieve_for_questions(&store(), &questions, 1);
        let ids: Vec<usize> = items.iter().map(|i| i.item.id).collect();
        assert_eq!(ids, [0, 1]);
        assert!(items[1].memories[0].content.contains("phone"));
    }

    #[test]
    fn questions_dropped_when_store_is_empty() {
        let index = InMemoryIndex::new(Arc::new(HashingEmbeddingProvider::new()));
        let empty = KnowledgeStore::new(Box::new(index), Box::new(NeverMerge));
        let questions = vec![GeneratedQuestion { field_name: "x".into(), question: "?".into() }];
        assert!(retrieve_for_questions(&empty, &questions, 3).is_empty());
    }

    #[test]
    fn fields_query_by_name_and_are_all_kept() {
        let fields = vec![
            FormField(json!({"id": "f1", "name": "email"})),
            FormField(json!({"id": "f2", "name": "phone number"})),
        ];
        let items = retrieve_for_fields(&store(), &fields, 1);
        assert_eq!(items.len(), 2);
        assert!(items[0].memories[0].content.contains("email"));
        assert!(items[1].memories[0].content.contains("phone"));
    }
}
