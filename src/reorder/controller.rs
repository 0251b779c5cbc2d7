use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::collection::{Identified, MoveIntent, OrderedCollection, PositionUpdate};
use super::reconcile::{ReconciliationClient, ReconciliationRequest};
use crate::errors::{MoveError, ReconciliationError, StaleAuthorityError};

/// Default bound on one reconciliation round-trip.
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// A persist call that takes longer than this is treated as failed.
    pub timeout: Duration,
    /// Buffered notifications per subscriber before it starts lagging.
    pub notification_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RECONCILE_TIMEOUT,
            notification_capacity: 64,
        }
    }
}

/// Lifecycle of a single move gesture.
///
/// `Idle → Applied → Pending → Confirmed | RolledBack → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    Applied,
    Pending,
    Confirmed,
    RolledBack,
}

/// One-shot notice for the surrounding UI (toast, log line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveNotification<Id> {
    Persisted { item_id: Id },
    RolledBack { item_id: Id, message: String },
    Resynced { item_id: Id, message: String },
}

/// How a gesture ended.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The item was dropped where it already was; nothing was sent.
    Noop,
    /// The authority accepted the move and its positions were applied.
    Confirmed,
    /// The authority's answer did not match this view; the collection was
    /// replaced by a fresh fetch.
    Resynced(StaleAuthorityError),
    /// Persisting failed and the pre-move snapshot was restored.
    RolledBack(ReconciliationError),
    /// The view was unmounted before the answer arrived.
    Discarded,
}

impl MoveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Resynced(_))
    }
}

/// A move that has been applied locally and still owes a round-trip.
#[derive(Debug)]
pub struct PendingMove<T: Identified> {
    intent: MoveIntent<T::Id>,
    snapshot: OrderedCollection<T>,
    request: ReconciliationRequest<T::Id>,
    state: MoveState,
}

impl<T: Identified> PendingMove<T> {
    pub fn intent(&self) -> &MoveIntent<T::Id> {
        &self.intent
    }

    /// Collection as it was immediately before the move.
    pub fn snapshot(&self) -> &OrderedCollection<T> {
        &self.snapshot
    }

    pub fn request(&self) -> &ReconciliationRequest<T::Id> {
        &self.request
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    fn transition(&mut self, next: MoveState) {
        debug!(item_id = ?self.intent.item_id, from = ?self.state, to = ?next, "move state");
        self.state = next;
    }
}

struct View<T: Identified> {
    /// `None` once the owning view has unmounted.
    collection: Option<OrderedCollection<T>>,
}

/// Owns the optimistic apply / reconcile / commit-or-rollback lifecycle for
/// one board view.
///
/// Gestures are never queued: several reconciliations may be in flight and
/// whichever outcome is applied last wins.
pub struct OptimisticMoveController<T: Identified, C> {
    view: Arc<Mutex<View<T>>>,
    client: Arc<C>,
    notifications: broadcast::Sender<MoveNotification<T::Id>>,
    config: ControllerConfig,
}

impl<T: Identified, C> Clone for OptimisticMoveController<T, C> {
    fn clone(&self) -> Self {
        Self {
            view: Arc::clone(&self.view),
            client: Arc::clone(&self.client),
            notifications: self.notifications.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T, C> OptimisticMoveController<T, C>
where
    T: Identified + Clone + Send + 'static,
    C: ReconciliationClient<T> + 'static,
{
    /// Mount a view over an already-fetched collection.
    pub fn new(collection: OrderedCollection<T>, client: C, config: ControllerConfig) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            view: Arc::new(Mutex::new(View {
                collection: Some(collection),
            })),
            client: Arc::new(client),
            notifications,
            config,
        }
    }

    /// Mount a view from the authority's current ordering.
    pub async fn load(client: C, config: ControllerConfig) -> Result<Self, ReconciliationError> {
        let items = client.fetch().await?;
        debug!(count = items.len(), "loaded collection from authority");
        Ok(Self::new(OrderedCollection::new(items), client, config))
    }

    /// Copy of the current local collection, or `None` after unmount.
    pub fn collection(&self) -> Option<OrderedCollection<T>> {
        self.lock().collection.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().collection.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoveNotification<T::Id>> {
        self.notifications.subscribe()
    }

    /// Drop the collection. Answers that arrive later are discarded.
    pub fn unmount(&self) {
        self.lock().collection = None;
        debug!("board view unmounted");
    }

    /// Apply a gesture to the local collection right away.
    ///
    /// Returns `None` for a no-op move (nothing to persist). The returned
    /// `PendingMove` carries the snapshot needed to undo this move.
    pub fn begin_move(
        &self,
        intent: MoveIntent<T::Id>,
    ) -> Result<Option<PendingMove<T>>, MoveError> {
        let mut view = self.lock();
        let collection = view.collection.as_mut().ok_or(MoveError::Unmounted)?;

        let snapshot = collection.snapshot();
        if let Err(err) = collection.move_item(&intent.item_id, intent.from_index, intent.to_index) {
            error!(item_id = ?intent.item_id, error = %err, "rejected invalid move");
            return Err(err.into());
        }
        if intent.is_noop() {
            return Ok(None);
        }

        let request = ReconciliationRequest::between(&snapshot, collection, &intent.item_id);
        let mut pending = PendingMove {
            intent,
            snapshot,
            request,
            state: MoveState::Idle,
        };
        pending.transition(MoveState::Applied);
        Ok(Some(pending))
    }

    /// Persist an applied move and settle the local collection.
    pub async fn reconcile(&self, mut pending: PendingMove<T>) -> MoveOutcome {
        pending.transition(MoveState::Pending);
        let result = match tokio::time::timeout(
            self.config.timeout,
            self.client.persist(&pending.request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ReconciliationError::Timeout(self.config.timeout)),
        };

        let outcome = match result {
            Ok(positions) => self.commit(&mut pending, positions).await,
            Err(err) => self.roll_back(&mut pending, err),
        };
        if !matches!(outcome, MoveOutcome::Discarded) {
            pending.transition(MoveState::Idle);
        }
        outcome
    }

    /// Apply and persist one gesture, waiting for the outcome.
    pub async fn move_item(&self, intent: MoveIntent<T::Id>) -> Result<MoveOutcome, MoveError> {
        match self.begin_move(intent)? {
            Some(pending) => Ok(self.reconcile(pending).await),
            None => Ok(MoveOutcome::Noop),
        }
    }

    /// Apply a gesture now and reconcile it in the background.
    pub fn spawn_move(
        &self,
        intent: MoveIntent<T::Id>,
    ) -> Result<Option<JoinHandle<MoveOutcome>>, MoveError> {
        let Some(pending) = self.begin_move(intent)? else {
            return Ok(None);
        };
        let controller = self.clone();
        Ok(Some(tokio::spawn(async move {
            controller.reconcile(pending).await
        })))
    }

    async fn commit(
        &self,
        pending: &mut PendingMove<T>,
        positions: Vec<PositionUpdate<T::Id>>,
    ) -> MoveOutcome {
        let item_id = pending.intent.item_id.clone();
        let stale = {
            let mut view = self.lock();
            let Some(collection) = view.collection.as_mut() else {
                debug!(item_id = ?item_id, "discarding confirmation for unmounted view");
                return MoveOutcome::Discarded;
            };
            match collection.apply_positions(&positions) {
                Ok(()) => {
                    pending.transition(MoveState::Confirmed);
                    info!(item_id = ?item_id, updates = pending.request.len(), "move persisted");
                    self.notify(MoveNotification::Persisted { item_id });
                    return MoveOutcome::Confirmed;
                }
                Err(stale) => stale,
            }
        };

        warn!(item_id = ?item_id, error = %stale, "authority order is stale, re-fetching");
        match self.client.fetch().await {
            Ok(items) => {
                let mut view = self.lock();
                let Some(collection) = view.collection.as_mut() else {
                    return MoveOutcome::Discarded;
                };
                *collection = OrderedCollection::new(items);
                pending.transition(MoveState::Confirmed);
                self.notify(MoveNotification::Resynced {
                    item_id,
                    message: stale.to_string(),
                });
                MoveOutcome::Resynced(stale)
            }
            Err(err) => self.roll_back(pending, err),
        }
    }

    fn roll_back(&self, pending: &mut PendingMove<T>, err: ReconciliationError) -> MoveOutcome {
        let item_id = pending.intent.item_id.clone();
        let mut view = self.lock();
        let Some(collection) = view.collection.as_mut() else {
            debug!(item_id = ?item_id, error = %err, "discarding failure for unmounted view");
            return MoveOutcome::Discarded;
        };
        *collection = std::mem::take(&mut pending.snapshot);
        pending.transition(MoveState::RolledBack);
        warn!(item_id = ?item_id, error = %err, "move not persisted, rolled back");
        self.notify(MoveNotification::RolledBack {
            item_id,
            message: err.to_string(),
        });
        MoveOutcome::RolledBack(err)
    }

    fn notify(&self, notification: MoveNotification<T::Id>) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    fn lock(&self) -> MutexGuard<'_, View<T>> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::reorder::collection::tests::{Card, abcd};

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Accept,
        Reject,
        Stale,
        StaleAndFetchFails,
    }

    /// In-memory authority holding its own copy of the order.
    struct FakeAuthority {
        order: Arc<Mutex<Vec<Card>>>,
        mode: Mode,
        gate: Option<Arc<Semaphore>>,
        persists: Arc<AtomicUsize>,
    }

    impl FakeAuthority {
        fn new(mode: Mode) -> Self {
            Self {
                order: Arc::new(Mutex::new(vec![Card("A"), Card("B"), Card("C"), Card("D")])),
                mode,
                gate: None,
                persists: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn gated(mode: Mode, gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(mode)
            }
        }
    }

    #[async_trait]
    impl ReconciliationClient<Card> for FakeAuthority {
        async fn persist(
            &self,
            request: &ReconciliationRequest<String>,
        ) -> Result<Vec<PositionUpdate<String>>, ReconciliationError> {
            self.persists.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            match self.mode {
                Mode::Reject => Err(ReconciliationError::Rejected {
                    status: 500,
                    message: "boom".into(),
                }),
                Mode::Stale | Mode::StaleAndFetchFails => {
                    let mut order = self.order.lock().unwrap();
                    order.push(Card("E"));
                    Ok(OrderedCollection::new(order.clone()).to_position_list())
                }
                Mode::Accept => {
                    let mut order = self.order.lock().unwrap();
                    let mut collection = OrderedCollection::new(order.clone());
                    let mut ranked: Vec<(i64, Card)> = collection
                        .iter()
                        .map(|p| {
                            let rank = request
                                .updates
                                .iter()
                                .find(|u| u.item_id == p.item.0)
                                .map(|u| u.position)
                                .unwrap_or(p.position);
                            (rank as i64, p.item.clone())
                        })
                        .collect();
                    ranked.sort_by_key(|(rank, _)| *rank);
                    collection = OrderedCollection::from_ranked(ranked);
                    *order = collection.iter().map(|p| p.item.clone()).collect();
                    Ok(collection.to_position_list())
                }
            }
        }

        async fn fetch(&self) -> Result<Vec<Card>, ReconciliationError> {
            if self.mode == Mode::StaleAndFetchFails {
                return Err(ReconciliationError::Decode("bad payload".into()));
            }
            Ok(self.order.lock().unwrap().clone())
        }
    }

    fn controller(authority: FakeAuthority) -> OptimisticMoveController<Card, FakeAuthority> {
        OptimisticMoveController::new(abcd(), authority, ControllerConfig::default())
    }

    fn intent(id: &str, from: usize, to: usize) -> MoveIntent<String> {
        MoveIntent::new(id.to_string(), from, to)
    }

    #[tokio::test]
    async fn test_begin_move_applies_immediately_and_keeps_snapshot() {
        let ctl = controller(FakeAuthority::new(Mode::Accept));
        let pending = ctl.begin_move(intent("B", 1, 3)).unwrap().unwrap();

        assert_eq!(pending.state(), MoveState::Applied);
        assert_eq!(ctl.collection().unwrap().ids(), vec!["A", "C", "D", "B"]);
        assert_eq!(pending.snapshot().ids(), vec!["A", "B", "C", "D"]);
        let pairs: Vec<(&str, usize)> = pending
            .request()
            .updates
            .iter()
            .map(|u| (u.item_id.as_str(), u.position))
            .collect();
        assert_eq!(pairs, vec![("B", 3), ("C", 1), ("D", 2)]);
    }

    #[tokio::test]
    async fn test_confirmed_move_matches_optimistic_state() {
        let ctl = controller(FakeAuthority::new(Mode::Accept));
        let mut rx = ctl.subscribe();

        let pending = ctl.begin_move(intent("B", 1, 3)).unwrap().unwrap();
        let optimistic = ctl.collection().unwrap();
        let outcome = ctl.reconcile(pending).await;

        assert!(matches!(outcome, MoveOutcome::Confirmed));
        assert!(ctl.collection().unwrap().same_order(&optimistic));
        assert_eq!(
            rx.recv().await.unwrap(),
            MoveNotification::Persisted {
                item_id: "B".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_move_restores_snapshot() {
        let ctl = controller(FakeAuthority::new(Mode::Reject));
        let mut rx = ctl.subscribe();
        let before = ctl.collection().unwrap();

        let outcome = ctl.move_item(intent("B", 1, 3)).await.unwrap();

        assert!(matches!(
            outcome,
            MoveOutcome::RolledBack(ReconciliationError::Rejected { status: 500, .. })
        ));
        assert!(ctl.collection().unwrap().same_order(&before));
        match rx.recv().await.unwrap() {
            MoveNotification::RolledBack { item_id, message } => {
                assert_eq!(item_id, "B");
                assert!(message.contains("boom"));
            }
            other => panic!("Expected RolledBack, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noop_move_sends_nothing() {
        let authority = FakeAuthority::new(Mode::Accept);
        let persists = Arc::clone(&authority.persists);
        let ctl = controller(authority);
        let before = ctl.collection().unwrap();

        let outcome = ctl.move_item(intent("C", 2, 2)).await.unwrap();

        assert!(matches!(outcome, MoveOutcome::Noop));
        assert!(ctl.collection().unwrap().same_order(&before));
        assert_eq!(persists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_move_is_rejected_and_nothing_sent() {
        let authority = FakeAuthority::new(Mode::Accept);
        let persists = Arc::clone(&authority.persists);
        let ctl = controller(authority);
        let before = ctl.collection().unwrap();

        let err = ctl.move_item(intent("B", 1, 9)).await.unwrap_err();
        assert!(matches!(err, MoveError::Invalid(_)));
        let err = ctl.move_item(intent("D", 1, 2)).await.unwrap_err();
        assert!(matches!(err, MoveError::Invalid(_)));

        assert!(ctl.collection().unwrap().same_order(&before));
        assert_eq!(persists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_answer_triggers_refetch() {
        let ctl = controller(FakeAuthority::new(Mode::Stale));
        let mut rx = ctl.subscribe();

        let outcome = ctl.move_item(intent("A", 0, 1)).await.unwrap();

        assert!(matches!(
            outcome,
            MoveOutcome::Resynced(StaleAuthorityError::LengthMismatch { .. })
        ));
        assert!(outcome.is_committed());
        assert_eq!(ctl.collection().unwrap().ids(), vec!["A", "B", "C", "D", "E"]);
        assert!(matches!(
            rx.recv().await.unwrap(),
            MoveNotification::Resynced { .. }
        ));
    }

    #[tokio::test]
    async fn test_stale_answer_with_failed_refetch_rolls_back() {
        let ctl = controller(FakeAuthority::new(Mode::StaleAndFetchFails));
        let before = ctl.collection().unwrap();

        let outcome = ctl.move_item(intent("A", 0, 3)).await.unwrap();

        assert!(matches!(
            outcome,
            MoveOutcome::RolledBack(ReconciliationError::Decode(_))
        ));
        assert!(ctl.collection().unwrap().same_order(&before));
    }

    #[tokio::test]
    async fn test_timeout_rolls_back() {
        let gate = Arc::new(Semaphore::new(0));
        let ctl = OptimisticMoveController::new(
            abcd(),
            FakeAuthority::gated(Mode::Accept, gate),
            ControllerConfig {
                timeout: Duration::from_millis(20),
                ..ControllerConfig::default()
            },
        );
        let before = ctl.collection().unwrap();

        let outcome = ctl.move_item(intent("D", 3, 0)).await.unwrap();

        assert!(matches!(
            outcome,
            MoveOutcome::RolledBack(ReconciliationError::Timeout(_))
        ));
        assert!(ctl.collection().unwrap().same_order(&before));
    }

    #[tokio::test]
    async fn test_spawned_move_is_visible_before_answer() {
        let gate = Arc::new(Semaphore::new(0));
        let ctl = controller(FakeAuthority::gated(Mode::Accept, Arc::clone(&gate)));

        let handle = ctl.spawn_move(intent("A", 0, 2)).unwrap().unwrap();
        assert_eq!(ctl.collection().unwrap().ids(), vec!["B", "C", "A", "D"]);

        gate.add_permits(1);
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Confirmed));
        assert_eq!(ctl.collection().unwrap().ids(), vec!["B", "C", "A", "D"]);
    }

    #[tokio::test]
    async fn test_gestures_are_not_blocked_while_pending() {
        let authority = FakeAuthority::new(Mode::Accept);
        let server_order = Arc::clone(&authority.order);
        let ctl = controller(authority);

        let first = ctl.begin_move(intent("A", 0, 3)).unwrap().unwrap();
        // B is now at index 0.
        let second = ctl.begin_move(intent("B", 0, 1)).unwrap().unwrap();
        assert_eq!(ctl.collection().unwrap().ids(), vec!["C", "B", "D", "A"]);

        // Answers applied in the order the authority produced them.
        assert!(ctl.reconcile(first).await.is_committed());
        assert!(ctl.reconcile(second).await.is_committed());

        let server_ids: Vec<String> = server_order
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.0.to_string())
            .collect();
        assert_eq!(ctl.collection().unwrap().ids(), server_ids);
    }

    #[tokio::test]
    async fn test_spawned_moves_leave_a_dense_order() {
        let gate = Arc::new(Semaphore::new(0));
        let ctl = controller(FakeAuthority::gated(Mode::Accept, Arc::clone(&gate)));

        let first = ctl.spawn_move(intent("A", 0, 3)).unwrap().unwrap();
        let second = ctl.spawn_move(intent("B", 0, 1)).unwrap().unwrap();

        gate.add_permits(2);
        assert!(first.await.unwrap().is_committed());
        assert!(second.await.unwrap().is_committed());

        let collection = ctl.collection().unwrap();
        let positions: Vec<usize> = collection.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        let mut ids = collection.ids();
        ids.sort();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_answer_after_unmount_is_discarded() {
        let gate = Arc::new(Semaphore::new(0));
        let ctl = controller(FakeAuthority::gated(Mode::Reject, Arc::clone(&gate)));

        let handle = ctl.spawn_move(intent("B", 1, 0)).unwrap().unwrap();
        ctl.unmount();
        gate.add_permits(1);

        assert!(matches!(handle.await.unwrap(), MoveOutcome::Discarded));
        assert!(!ctl.is_mounted());
        assert_eq!(
            ctl.begin_move(intent("A", 0, 1)).unwrap_err(),
            MoveError::Unmounted
        );
    }

    #[tokio::test]
    async fn test_load_mounts_authoritative_order() {
        let ctl: OptimisticMoveController<Card, FakeAuthority> =
            OptimisticMoveController::load(FakeAuthority::new(Mode::Accept), ControllerConfig::default())
                .await
                .unwrap();
        assert_eq!(ctl.collection().unwrap().ids(), vec!["A", "B", "C", "D"]);
    }
}
