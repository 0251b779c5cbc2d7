use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::collection::{Identified, OrderedCollection, PositionUpdate};
use crate::errors::ReconciliationError;

/// The set of positions that changed as the result of one move, sent to the
/// authority as a single batch: `{"updates": [{"itemId": .., "position": ..}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequest<Id> {
    pub updates: Vec<PositionUpdate<Id>>,
}

impl<Id: Clone + Eq + std::hash::Hash> ReconciliationRequest<Id> {
    /// Diff two orderings of the same items.
    ///
    /// Only entries whose position differs are kept. The moved item comes
    /// first, the rest follow in ascending new position.
    pub fn between<T>(before: &OrderedCollection<T>, after: &OrderedCollection<T>, moved: &Id) -> Self
    where
        T: Identified<Id = Id>,
    {
        let mut updates: Vec<PositionUpdate<Id>> = after
            .to_position_list()
            .into_iter()
            .filter(|u| before.position_of(&u.item_id) != Some(u.position))
            .collect();
        // Stable sort: ascending position is preserved for everything else.
        updates.sort_by_key(|u| u.item_id != *moved);
        Self { updates }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }
}

/// Remote authority for one collection.
///
/// Implementations must turn every failure into a `ReconciliationError`
/// and never retry on their own.
#[async_trait]
pub trait ReconciliationClient<T: Identified>: Send + Sync {
    /// Persist one batch of changed positions. On success returns the
    /// authority's full ordering for the collection.
    async fn persist(
        &self,
        request: &ReconciliationRequest<T::Id>,
    ) -> Result<Vec<PositionUpdate<T::Id>>, ReconciliationError>;

    /// Fetch every item in authoritative order.
    async fn fetch(&self) -> Result<Vec<T>, ReconciliationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorder::collection::tests::abcd;

    #[test]
    fn test_request_lists_moved_item_first_then_shifted_items() {
        let before = abcd();
        let mut after = before.snapshot();
        after.move_item(&"B".to_string(), 1, 3).unwrap();

        let request = ReconciliationRequest::between(&before, &after, &"B".to_string());
        let pairs: Vec<(&str, usize)> = request
            .updates
            .iter()
            .map(|u| (u.item_id.as_str(), u.position))
            .collect();
        assert_eq!(pairs, vec![("B", 3), ("C", 1), ("D", 2)]);
    }

    #[test]
    fn test_request_omits_items_outside_the_move_range() {
        let before = crate::reorder::collection::OrderedCollection::new([
            crate::reorder::collection::tests::Card("A"),
            crate::reorder::collection::tests::Card("B"),
            crate::reorder::collection::tests::Card("C"),
            crate::reorder::collection::tests::Card("D"),
            crate::reorder::collection::tests::Card("E"),
        ]);
        let mut after = before.snapshot();
        after.move_item(&"D".to_string(), 3, 1).unwrap();

        let request = ReconciliationRequest::between(&before, &after, &"D".to_string());
        let ids: Vec<&str> = request.updates.iter().map(|u| u.item_id.as_str()).collect();
        assert_eq!(ids, vec!["D", "B", "C"]);
        assert_eq!(request.len(), 3);
    }

    #[test]
    fn test_request_for_identical_orderings_is_empty() {
        let before = abcd();
        let request = ReconciliationRequest::between(&before, &before.snapshot(), &"A".to_string());
        assert!(request.is_empty());
    }

    #[test]
    fn test_request_serializes_as_updates_batch() {
        let request = ReconciliationRequest {
            updates: vec![PositionUpdate { item_id: 2i64, position: 0 }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"updates": [{"itemId": 2, "position": 0}]})
        );
    }
}
