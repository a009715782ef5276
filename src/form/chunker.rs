//! Greedy, order-preserving split of form units under a word budget.

use serde::Serialize;

use super::types::{Chunk, FormContext};
use crate::util;

pub const DEFAULT_CHUNK_WORD_BUDGET: usize = 2000;

/// Split `units` into chunks whose summed word cost stays within `word_budget`.
///
/// A unit is priced by the word count of its spaced JSON. A new chunk starts
/// only when the next unit would overflow a non-empty chunk, so a unit that
/// alone exceeds the budget ends up in a chunk by itself. Every chunk carries
/// a copy of `context`.
pub fn chunk_units<T: Serialize>(
    units: impl IntoIterator<Item = T>,
    context: &FormContext,
    word_budget: usize,
) -> Vec<Chunk<T>> {
    let mut chunks = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut used = 0;

    for unit in units {
        let cost = util::json_word_cost(&unit);
        if used + cost > word_budget && !current.is_empty() {
            chunks.push(Chunk {
                units: std::mem::take(&mut current),
                context: context.clone(),
            });
            used = 0;
        }
        current.push(unit);
        used += cost;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            units: current,
            context: context.clone(),
        });
    }

    tracing::debug!(chunks = chunks.len(), budget = word_budget, "form units chunked");
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Spaced JSON of `{"k": "a b"}` is `{"k": "a b"}`: three words per pair.
    fn unit(words: usize) -> Value {
        assert!(words >= 2);
        let filler = vec!["w"; words - 1].join(" ");
        json!({ "k": filler })
    }

    #[test]
    fn budget_ten_costs_four_four_four() {
        let units = vec![unit(4), unit(4), unit(4)];
        let chunks = chunk_units(units.clone(), &FormContext::default(), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].units, units[..2]);
        assert_eq!(chunks[1].units, units[2..]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_units(Vec::<Value>::new(), &FormContext::default(), 10).is_empty());
    }

    #[test]
    fn oversized_unit_stands_alone() {
        let units = vec![unit(2), unit(50), unit(2)];
        let chunks = chunk_units(units, &FormContext::default(), 10);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.units.len()).collect();
        assert_eq!(sizes, [1, 1, 1]);
    }

    #[test]
    fn exact_fit_stays_in_one_chunk() {
        let chunks = chunk_units(vec![unit(5), unit(5)], &FormContext::default(), 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn order_and_context_preserved() {
        let context = FormContext {
            website_overview: json!("Visa application"),
            comment: "home address please".into(),
            url: "https://example.com".into(),
        };
        let units: Vec<Value> = (0..7).map(|i| json!({ "id": format!("f{i}") })).collect();
        let chunks = chunk_units(units.clone(), &context, 4);

        let flattened: Vec<Value> = chunks.iter().flat_map(|c| c.units.clone()).collect();
        assert_eq!(flattened, units);
        assert!(chunks.iter().all(|c| c.context == context));
        for chunk in &chunks {
            let cost: usize = chunk.units.iter().map(util::json_word_cost).sum();
            assert!(cost <= 4 || chunk.units.len() == 1);
        }
    }
}
