use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{InvalidMoveError, StaleAuthorityError};

/// Anything with a stable identity that can live in an [`OrderedCollection`].
pub trait Identified {
    type Id: Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

/// An item together with its zero-based position in its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedItem<T> {
    pub item: T,
    pub position: usize,
}

/// One `{itemId, position}` pair, both as produced locally and as returned by
/// the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate<Id> {
    pub item_id: Id,
    pub position: usize,
}

/// "Move item X from index A to index B", as produced by a drag gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent<Id> {
    pub item_id: Id,
    pub from_index: usize,
    pub to_index: usize,
}

impl<Id> MoveIntent<Id> {
    pub fn new(item_id: Id, from_index: usize, to_index: usize) -> Self {
        Self {
            item_id,
            from_index,
            to_index,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.from_index == self.to_index
    }
}

/// Dense, gapless ordering over identified items.
///
/// Positions always equal the vector index, so for `N` items they are a
/// permutation of `0..N`. The id index is rebuilt on every structural change.
#[derive(Debug, Clone)]
pub struct OrderedCollection<T: Identified> {
    items: Vec<PositionedItem<T>>,
    index: HashMap<T::Id, usize>,
}

impl<T: Identified> OrderedCollection<T> {
    /// Build a collection from items already in display order.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self {
            items: items
                .into_iter()
                .map(|item| PositionedItem { item, position: 0 })
                .collect(),
            index: HashMap::new(),
        };
        collection.reindex();
        collection
    }

    /// Build a collection from items carrying an external rank (e.g. a stored
    /// position that may contain gaps). Items are ordered by rank, ties keep
    /// input order, and positions are then made dense.
    pub fn from_ranked(items: impl IntoIterator<Item = (i64, T)>) -> Self {
        let mut ranked: Vec<(i64, T)> = items.into_iter().collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        Self::new(ranked.into_iter().map(|(_, item)| item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionedItem<T>> {
        self.items.iter()
    }

    pub fn get(&self, id: &T::Id) -> Option<&PositionedItem<T>> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn position_of(&self, id: &T::Id) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(|p| p.item.id()).collect()
    }

    /// Move `item_id` from `from_index` to `to_index`, shifting every item in
    /// between by one place towards the vacated slot.
    ///
    /// All preconditions are checked before anything is touched, so on error
    /// the collection is unchanged. Moving an item onto its own index is a
    /// no-op.
    pub fn move_item(
        &mut self,
        item_id: &T::Id,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), InvalidMoveError> {
        let len = self.items.len();
        for index in [from_index, to_index] {
            if index >= len {
                return Err(InvalidMoveError::IndexOutOfRange { index, len });
            }
        }
        let actual = self
            .position_of(item_id)
            .ok_or_else(|| InvalidMoveError::UnknownItem {
                item_id: format!("{:?}", item_id),
            })?;
        if actual != from_index {
            return Err(InvalidMoveError::ItemNotAtIndex {
                item_id: format!("{:?}", item_id),
                expected: from_index,
                actual,
            });
        }
        if from_index == to_index {
            return Ok(());
        }

        let moved = self.items.remove(from_index);
        self.items.insert(to_index, moved);
        self.reindex();
        Ok(())
    }

    /// Immutable copy of the current state, used for rollback.
    pub fn snapshot(&self) -> Self
    where
        T: Clone,
    {
        self.clone()
    }

    /// `{itemId, position}` for every item, in display order.
    pub fn to_position_list(&self) -> Vec<PositionUpdate<T::Id>> {
        self.items
            .iter()
            .map(|p| PositionUpdate {
                item_id: p.item.id(),
                position: p.position,
            })
            .collect()
    }

    /// True when both collections hold the same ids at the same positions.
    pub fn same_order(&self, other: &Self) -> bool {
        self.to_position_list() == other.to_position_list()
    }

    /// Overwrite local positions with an authoritative full ordering.
    ///
    /// The authoritative list must name exactly the ids held locally and its
    /// positions must be dense; otherwise nothing changes and the caller is
    /// expected to re-fetch.
    pub fn apply_positions(
        &mut self,
        authoritative: &[PositionUpdate<T::Id>],
    ) -> Result<(), StaleAuthorityError> {
        let len = self.items.len();
        if authoritative.len() != len {
            return Err(StaleAuthorityError::LengthMismatch {
                local: len,
                authoritative: authoritative.len(),
            });
        }

        let mut slots: Vec<Option<usize>> = vec![None; len];
        let mut seen: HashSet<&T::Id> = HashSet::with_capacity(len);
        for update in authoritative {
            let current = self.position_of(&update.item_id).ok_or_else(|| {
                StaleAuthorityError::UnknownItem {
                    item_id: format!("{:?}", update.item_id),
                }
            })?;
            if !seen.insert(&update.item_id) {
                return Err(StaleAuthorityError::DuplicateItem {
                    item_id: format!("{:?}", update.item_id),
                });
            }
            if update.position >= len || slots[update.position].is_some() {
                // Out of range or taken twice; report the first hole.
                let position = slots.iter().position(Option::is_none).unwrap_or(len);
                return Err(StaleAuthorityError::PositionGap { position });
            }
            slots[update.position] = Some(current);
        }

        let mut old: Vec<Option<PositionedItem<T>>> =
            std::mem::take(&mut self.items).into_iter().map(Some).collect();
        self.items = slots
            .into_iter()
            .flatten()
            .filter_map(|from| old[from].take())
            .collect();
        self.reindex();
        Ok(())
    }

    /// Assign `position = index` to every element and rebuild the id index.
    fn reindex(&mut self) {
        self.index.clear();
        for (i, positioned) in self.items.iter_mut().enumerate() {
            positioned.position = i;
            self.index.insert(positioned.item.id(), i);
        }
    }
}

impl<T: Identified> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Card(pub &'static str);

    impl Identified for Card {
        type Id = String;

        fn id(&self) -> String {
            self.0.to_string()
        }
    }

    pub(crate) fn abcd() -> OrderedCollection<Card> {
        OrderedCollection::new([Card("A"), Card("B"), Card("C"), Card("D")])
    }

    fn order(c: &OrderedCollection<Card>) -> Vec<(String, usize)> {
        c.iter().map(|p| (p.item.id(), p.position)).collect()
    }

    fn assert_dense(c: &OrderedCollection<Card>) {
        let mut positions: Vec<usize> = c.to_position_list().iter().map(|u| u.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..c.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_new_assigns_dense_positions() {
        let c = abcd();
        assert_eq!(c.len(), 4);
        assert_eq!(c.position_of(&"C".to_string()), Some(2));
        assert_dense(&c);
    }

    #[test]
    fn test_move_down_shifts_gap_closed() {
        let mut c = abcd();
        c.move_item(&"B".to_string(), 1, 3).unwrap();
        assert_eq!(
            order(&c),
            vec![
                ("A".into(), 0),
                ("C".into(), 1),
                ("D".into(), 2),
                ("B".into(), 3)
            ]
        );
    }

    #[test]
    fn test_move_up_leaves_outside_range_untouched() {
        let mut c = OrderedCollection::new([Card("A"), Card("B"), Card("C"), Card("D"), Card("E")]);
        c.move_item(&"D".to_string(), 3, 1).unwrap();
        assert_eq!(c.ids(), vec!["A", "D", "B", "C", "E"]);
        assert_eq!(c.position_of(&"A".to_string()), Some(0));
        assert_eq!(c.position_of(&"E".to_string()), Some(4));
    }

    #[test]
    fn test_every_move_keeps_positions_dense() {
        let mut c = OrderedCollection::new([Card("A"), Card("B"), Card("C"), Card("D"), Card("E")]);
        let n = c.len();
        for from in 0..n {
            for to in 0..n {
                let id = c.ids()[from].clone();
                c.move_item(&id, from, to).unwrap();
                assert_dense(&c);
                assert_eq!(c.position_of(&id), Some(to));
            }
        }
    }

    #[test]
    fn test_move_to_same_index_is_noop() {
        let mut c = abcd();
        let before = c.snapshot();
        c.move_item(&"C".to_string(), 2, 2).unwrap();
        assert!(c.same_order(&before));
    }

    #[test]
    fn test_move_out_of_range_is_rejected_without_change() {
        let mut c = abcd();
        let before = c.snapshot();
        let err = c.move_item(&"B".to_string(), 1, 4).unwrap_err();
        assert_eq!(err, InvalidMoveError::IndexOutOfRange { index: 4, len: 4 });
        let err = c.move_item(&"B".to_string(), 9, 0).unwrap_err();
        assert_eq!(err, InvalidMoveError::IndexOutOfRange { index: 9, len: 4 });
        assert!(c.same_order(&before));
    }

    #[test]
    fn test_move_wrong_item_is_rejected_without_change() {
        let mut c = abcd();
        let before = c.snapshot();
        let err = c.move_item(&"C".to_string(), 1, 3).unwrap_err();
        assert!(matches!(
            err,
            InvalidMoveError::ItemNotAtIndex {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        let err = c.move_item(&"Z".to_string(), 0, 1).unwrap_err();
        assert!(matches!(err, InvalidMoveError::UnknownItem { .. }));
        assert!(c.same_order(&before));
    }

    #[test]
    fn test_move_on_empty_collection_is_rejected() {
        let mut c: OrderedCollection<Card> = OrderedCollection::default();
        let err = c.move_item(&"A".to_string(), 0, 0).unwrap_err();
        assert_eq!(err, InvalidMoveError::IndexOutOfRange { index: 0, len: 0 });
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut c = abcd();
        let snap = c.snapshot();
        c.move_item(&"A".to_string(), 0, 3).unwrap();
        assert_eq!(snap.ids(), vec!["A", "B", "C", "D"]);
        assert!(!c.same_order(&snap));
    }

    #[test]
    fn test_from_ranked_sorts_and_closes_gaps() {
        let c = OrderedCollection::from_ranked([(10, Card("C")), (-1, Card("A")), (4, Card("B"))]);
        assert_eq!(
            order(&c),
            vec![("A".into(), 0), ("B".into(), 1), ("C".into(), 2)]
        );
    }

    #[test]
    fn test_apply_positions_reorders() {
        let mut c = abcd();
        let authoritative = vec![
            PositionUpdate { item_id: "D".to_string(), position: 0 },
            PositionUpdate { item_id: "C".to_string(), position: 1 },
            PositionUpdate { item_id: "B".to_string(), position: 2 },
            PositionUpdate { item_id: "A".to_string(), position: 3 },
        ];
        c.apply_positions(&authoritative).unwrap();
        assert_eq!(c.ids(), vec!["D", "C", "B", "A"]);
        assert_eq!(c.get(&"A".to_string()).map(|p| p.position), Some(3));
    }

    #[test]
    fn test_apply_own_position_list_is_identity() {
        let mut c = abcd();
        c.move_item(&"B".to_string(), 1, 3).unwrap();
        let expected = c.snapshot();
        c.apply_positions(&expected.to_position_list()).unwrap();
        assert!(c.same_order(&expected));
    }

    #[test]
    fn test_apply_positions_rejects_stale_sets() {
        let mut c = abcd();
        let before = c.snapshot();

        let short = before.to_position_list()[..3].to_vec();
        assert!(matches!(
            c.apply_positions(&short),
            Err(StaleAuthorityError::LengthMismatch { local: 4, authoritative: 3 })
        ));

        let mut unknown = before.to_position_list();
        unknown[2].item_id = "Z".to_string();
        assert!(matches!(
            c.apply_positions(&unknown),
            Err(StaleAuthorityError::UnknownItem { .. })
        ));

        let mut duplicate = before.to_position_list();
        duplicate[3].item_id = "A".to_string();
        assert!(matches!(
            c.apply_positions(&duplicate),
            Err(StaleAuthorityError::DuplicateItem { .. })
        ));

        let mut gap = before.to_position_list();
        gap[3].position = 7;
        assert!(matches!(
            c.apply_positions(&gap),
            Err(StaleAuthorityError::PositionGap { position: 3 })
        ));

        assert!(c.same_order(&before));
    }

    #[test]
    fn test_position_update_uses_camel_case_on_the_wire() {
        let update = PositionUpdate { item_id: 7i64, position: 2 };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"itemId": 7, "position": 2}));
    }
}
