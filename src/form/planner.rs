//! Word-budgeted grouping of items and their memories into filler batches.
//!
//! Items are taken in order. Each item brings its retrieved memories, minus
//! any already present in the batch being built. When an item would push a
//! non-empty batch over budget the batch is closed, and the item's memories
//! are filtered again against the fresh batch so nothing it needs is lost.

use std::collections::HashSet;

use super::types::{Batch, BatchEntry, BatchItem, BatchMemory};
use crate::memory::types::RetrievalResult;
use crate::util;

pub const DEFAULT_BATCH_WORD_BUDGET: usize = 3000;

/// Memories of `item` whose ids are not in `seen` (or repeated within the item).
fn fresh_memories<'a>(memories: &'a [RetrievalResult], seen: &HashSet<String>) -> Vec<&'a RetrievalResult> {
    let mut local: HashSet<&str> = HashSet::new();
    memories
        .iter()
        .filter(|m| !seen.contains(&m.id) && local.insert(m.id.as_str()))
        .collect()
}

fn memory_cost(memories: &[&RetrievalResult]) -> usize {
    memories.iter().map(|m| util::word_count(&m.content)).sum()
}

/// Partition `items` into batches of at most `word_budget` words.
///
/// A single item too large for the budget still gets a batch of its own.
/// No memory id appears twice in one batch.
pub fn plan_batches<T: BatchEntry>(
    items: impl IntoIterator<Item = BatchItem<T>>,
    word_budget: usize,
) -> Vec<Batch<T>> {
    let mut batches = Vec::new();
    let mut current = Batch::new();
    let mut seen: HashSet<String> = HashSet::new();

    for BatchItem { item, memories } in items {
        let item_cost = item.word_cost();
        let mut fresh = fresh_memories(&memories, &seen);
        let mut cost = item_cost + memory_cost(&fresh);

        if current.word_count + cost > word_budget && !current.is_empty() {
            batches.push(std::mem::replace(&mut current, Batch::new()));
            seen.clear();
            fresh = fresh_memories(&memories, &seen);
            cost = item_cost + memory_cost(&fresh);
        }

        for memory in fresh {
            seen.insert(memory.id.clone());
            current.memories.push(BatchMemory {
                content: memory.content.clone(),
                metadata: T::memory_metadata(&memory.metadata),
            });
        }
        current.items.push(item);
        current.word_count += cost;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    tracing::debug!(
        batches = batches.len(),
        budget = word_budget,
        kind = T::KEY,
        "batches planned"
    );
    batches
}
