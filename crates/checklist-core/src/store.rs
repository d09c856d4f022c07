//! Reactive task collection backed by a [`RecordStore`].
//!
//! Writes are queued through the backend first and then applied locally, so
//! every view sees a new record on its next read without waiting for any
//! durable confirmation beyond the queueing call itself.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::PersistenceError;
use crate::filter::{self, Predicate};
use crate::observable::{Observable, Subscription};
use crate::task::{Task, TaskId, TaskPatch};

/// Name of a record collection inside a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRef(String);

impl CollectionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for CollectionRef {
    fn default() -> Self {
        Self::new("tasks")
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence collaborator. Each write either queues durably and returns
/// `Ok`, or fails with a [`PersistenceError`].
pub trait RecordStore {
    fn create_record(
        &mut self,
        collection: &CollectionRef,
        record: &Task,
    ) -> Result<(), PersistenceError>;

    fn change_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<(), PersistenceError>;

    fn delete_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
    ) -> Result<(), PersistenceError>;

    /// Records currently held for `collection`, in storage order.
    fn snapshot(&self, collection: &CollectionRef) -> Result<Vec<Task>, PersistenceError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn create_record(
        &mut self,
        collection: &CollectionRef,
        record: &Task,
    ) -> Result<(), PersistenceError> {
        (**self).create_record(collection, record)
    }

    fn change_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<(), PersistenceError> {
        (**self).change_record(collection, id, patch)
    }

    fn delete_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
    ) -> Result<(), PersistenceError> {
        (**self).delete_record(collection, id)
    }

    fn snapshot(&self, collection: &CollectionRef) -> Result<Vec<Task>, PersistenceError> {
        (**self).snapshot(collection)
    }
}

/// In-process backend. Keeps insertion order per collection.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<CollectionRef, Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(collection: CollectionRef, records: Vec<Task>) -> Self {
        let mut collections = HashMap::new();
        collections.insert(collection, records);
        Self { collections }
    }

    fn records_mut(&mut self, collection: &CollectionRef) -> &mut Vec<Task> {
        self.collections.entry(collection.clone()).or_default()
    }
}

impl RecordStore for MemoryStore {
    fn create_record(
        &mut self,
        collection: &CollectionRef,
        record: &Task,
    ) -> Result<(), PersistenceError> {
        let records = self.records_mut(collection);
        if records.iter().any(|t| t.id == record.id) {
            return Err(PersistenceError::DuplicateId(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    fn change_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<(), PersistenceError> {
        let task = self
            .records_mut(collection)
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        task.apply(patch);
        Ok(())
    }

    fn delete_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
    ) -> Result<(), PersistenceError> {
        let records = self.records_mut(collection);
        let idx = records
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        records.remove(idx);
        Ok(())
    }

    fn snapshot(&self, collection: &CollectionRef) -> Result<Vec<Task>, PersistenceError> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }
}

/// Canonical local state of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionState {
    pub is_loading: bool,
    pub records: Vec<Task>,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            is_loading: true,
            records: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

pub struct TaskCollection<S> {
    collection: CollectionRef,
    backend: S,
    state: Observable<CollectionState>,
}

impl<S: fmt::Debug> fmt::Debug for TaskCollection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCollection")
            .field("collection", &self.collection)
            .field("backend", &self.backend)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: RecordStore> TaskCollection<S> {
    pub fn new(collection: CollectionRef, backend: S) -> Self {
        Self {
            collection,
            backend,
            state: Observable::new(CollectionState::default()),
        }
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn is_loading(&self) -> bool {
        self.state.get().is_loading
    }

    pub fn state(&self) -> Rc<CollectionState> {
        self.state.get()
    }

    /// Leaves the loading phase with the backend's snapshot. Records created
    /// before the snapshot arrived are kept after it.
    #[tracing::instrument(skip(self), fields(collection = %self.collection))]
    pub fn load(&mut self) -> Result<(), PersistenceError> {
        if !self.is_loading() {
            trace!("collection already loaded");
            return Ok(());
        }

        let snapshot = self.backend.snapshot(&self.collection)?;
        let seen: HashSet<TaskId> = snapshot.iter().map(|t| t.id.clone()).collect();
        let local = self.state.get();
        let early: Vec<Task> = local
            .records
            .iter()
            .filter(|t| !seen.contains(&t.id))
            .cloned()
            .collect();

        info!(
            snapshot = snapshot.len(),
            early = early.len(),
            "collection loaded"
        );

        let mut records = snapshot;
        records.extend(early);
        self.state.set(CollectionState {
            is_loading: false,
            records,
        });
        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(collection = %self.collection, id = %record.id))]
    pub fn create_record(&mut self, record: Task) -> Result<(), PersistenceError> {
        if self.state.get().records.iter().any(|t| t.id == record.id) {
            warn!("rejecting duplicate task id");
            return Err(PersistenceError::DuplicateId(record.id));
        }

        self.backend.create_record(&self.collection, &record)?;
        self.state.update(|state| state.records.push(record));
        debug!("record created");
        Ok(())
    }

    #[tracing::instrument(skip(self, patch), fields(collection = %self.collection, id = %id))]
    pub fn change_record(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), PersistenceError> {
        if !self.contains(id) {
            return Err(PersistenceError::NotFound(id.clone()));
        }
        if patch.is_empty() {
            trace!("empty patch; nothing to write");
            return Ok(());
        }

        self.backend.change_record(&self.collection, id, patch)?;
        self.state.update(|state| {
            if let Some(task) = state.records.iter_mut().find(|t| &t.id == id) {
                task.apply(patch);
            }
        });
        debug!(?patch, "record changed");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(collection = %self.collection, id = %id))]
    pub fn delete_record(&mut self, id: &TaskId) -> Result<(), PersistenceError> {
        if !self.contains(id) {
            return Err(PersistenceError::NotFound(id.clone()));
        }

        self.backend.delete_record(&self.collection, id)?;
        self.state.update(|state| state.records.retain(|t| &t.id != id));
        debug!("record deleted");
        Ok(())
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.state.get().records.iter().find(|t| &t.id == id).cloned()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.state.get().records.iter().any(|t| &t.id == id)
    }

    pub fn counts(&self) -> Counts {
        let state = self.state.get();
        let completed = state.records.iter().filter(|t| t.completed).count();
        Counts {
            total: state.records.len(),
            active: state.records.len() - completed,
            completed,
        }
    }

    /// Reactive, lazily derived view of the records matching `predicate`.
    pub fn query(&self, predicate: Option<Predicate>) -> CollectionView {
        CollectionView::new(self.state.clone(), predicate)
    }

    pub fn subscribe(
        &self,
        listener: impl FnMut(&Rc<CollectionState>) + 'static,
    ) -> Subscription {
        self.state.subscribe(listener)
    }
}

/// What a reader of a [`CollectionView`] gets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub is_loading: bool,
    pub list: Vec<Task>,
}

impl ViewSnapshot {
    pub fn ids(&self) -> Vec<&TaskId> {
        self.list.iter().map(|t| &t.id).collect()
    }
}

/// Filtered projection over a collection. The projection is computed on the
/// first read after a change and cached until the next one.
pub struct CollectionView {
    source: Observable<CollectionState>,
    predicate: Option<Predicate>,
    cache: Rc<RefCell<Option<Rc<ViewSnapshot>>>>,
    _invalidate: Subscription,
}

impl fmt::Debug for CollectionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("predicate", &self.predicate)
            .field("cached", &self.cache.borrow().is_some())
            .finish()
    }
}

impl CollectionView {
    fn new(source: Observable<CollectionState>, predicate: Option<Predicate>) -> Self {
        let cache: Rc<RefCell<Option<Rc<ViewSnapshot>>>> = Rc::new(RefCell::new(None));
        let stale = Rc::clone(&cache);
        let invalidate = source.subscribe(move |_| {
            stale.borrow_mut().take();
        });

        Self {
            source,
            predicate,
            cache,
            _invalidate: invalidate,
        }
    }

    pub fn predicate(&self) -> Option<Predicate> {
        self.predicate
    }

    pub fn snapshot(&self) -> Rc<ViewSnapshot> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return Rc::clone(cached);
        }

        let state = self.source.get();
        let snapshot = if state.is_loading {
            ViewSnapshot {
                is_loading: true,
                list: vec![],
            }
        } else {
            ViewSnapshot {
                is_loading: false,
                list: state
                    .records
                    .iter()
                    .filter(|t| filter::matches(self.predicate.as_ref(), t))
                    .cloned()
                    .collect(),
            }
        };
        trace!(
            loading = snapshot.is_loading,
            matched = snapshot.list.len(),
            "derived collection view"
        );

        let snapshot = Rc::new(snapshot);
        *self.cache.borrow_mut() = Some(Rc::clone(&snapshot));
        snapshot
    }

    /// Calls `listener` with a fresh snapshot after every store change.
    pub fn subscribe(&self, mut listener: impl FnMut(&ViewSnapshot) + 'static) -> Subscription {
        let predicate = self.predicate;
        self.source.subscribe(move |state| {
            let list = if state.is_loading {
                vec![]
            } else {
                state
                    .records
                    .iter()
                    .filter(|t| filter::matches(predicate.as_ref(), t))
                    .cloned()
                    .collect()
            };
            listener(&ViewSnapshot {
                is_loading: state.is_loading,
                list,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::filter::{Filter, predicate};

    fn task(id: &str, text: &str) -> Task {
        Task::new_active(TaskId::from(id), text.to_string())
    }

    fn loaded(records: Vec<Task>) -> TaskCollection<MemoryStore> {
        let mut store = TaskCollection::new(
            CollectionRef::default(),
            MemoryStore::with_records(CollectionRef::default(), records),
        );
        store.load().expect("load");
        store
    }

    #[test]
    fn view_is_loading_and_empty_before_first_load() {
        let mut store = TaskCollection::new(CollectionRef::default(), MemoryStore::new());
        let view = store.query(None);

        store.create_record(task("t1", "early")).expect("create");

        let snap = view.snapshot();
        assert!(snap.is_loading);
        assert!(snap.list.is_empty());

        store.load().expect("load");
        let snap = view.snapshot();
        assert!(!snap.is_loading);
        assert_eq!(snap.ids(), vec![&TaskId::from("t1")]);
    }

    #[test]
    fn load_merges_snapshot_before_early_records() {
        let backend = MemoryStore::with_records(CollectionRef::default(), vec![task("a", "stored")]);
        let mut store = TaskCollection::new(CollectionRef::default(), backend);

        store.create_record(task("b", "optimistic")).expect("create");
        store.load().expect("load");

        let ids: Vec<String> = store
            .state()
            .records
            .iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn created_ids_accumulate_in_order() {
        let mut store = loaded(vec![]);
        let view = store.query(None);
        let mut last_len = 0;

        for (n, id) in ["t1", "t2", "t3"].iter().enumerate() {
            store.create_record(task(id, "x")).expect("create");
            let snap = view.snapshot();
            assert!(snap.list.len() >= last_len);
            assert_eq!(snap.list.len(), n + 1);
            last_len = snap.list.len();
        }

        let snap = view.snapshot();
        let ids: Vec<&str> = snap.list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn duplicate_id_is_rejected_without_touching_state() {
        let mut store = loaded(vec![task("t1", "first")]);

        let err = store
            .create_record(task("t1", "second"))
            .expect_err("duplicate");
        assert!(matches!(err, PersistenceError::DuplicateId(_)));
        assert_eq!(store.counts().total, 1);
        assert_eq!(store.get(&TaskId::from("t1")).map(|t| t.text), Some("first".to_string()));
    }

    #[test]
    fn filtered_view_tracks_changes() {
        let mut store = loaded(vec![task("t1", "a"), task("t2", "b")]);
        let active = store.query(predicate(Filter::Active));
        let done = store.query(predicate(Filter::Completed));

        store
            .change_record(&TaskId::from("t1"), &TaskPatch::completed(true))
            .expect("change");

        assert_eq!(active.snapshot().ids(), vec![&TaskId::from("t2")]);
        assert_eq!(done.snapshot().ids(), vec![&TaskId::from("t1")]);
        assert_eq!(
            store.counts(),
            Counts {
                total: 2,
                active: 1,
                completed: 1
            }
        );
    }

    #[test]
    fn view_snapshot_is_cached_until_store_changes() {
        let mut store = loaded(vec![task("t1", "a")]);
        let view = store.query(None);

        let first = view.snapshot();
        assert!(Rc::ptr_eq(&first, &view.snapshot()));

        store.delete_record(&TaskId::from("t1")).expect("delete");
        let after = view.snapshot();
        assert!(!Rc::ptr_eq(&first, &after));
        assert!(after.list.is_empty());
    }

    #[test]
    fn view_subscribers_receive_filtered_lists() {
        let mut store = loaded(vec![]);
        let view = store.query(predicate(Filter::Completed));
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&lengths);
        let _sub = view.subscribe(move |snap| sink.borrow_mut().push(snap.list.len()));

        store.create_record(task("t1", "a")).expect("create");
        store
            .change_record(&TaskId::from("t1"), &TaskPatch::completed(true))
            .expect("change");

        assert_eq!(*lengths.borrow(), vec![0, 1]);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut store = loaded(vec![]);
        let missing = TaskId::from("nope");

        assert!(matches!(
            store.change_record(&missing, &TaskPatch::text("x")),
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_record(&missing),
            Err(PersistenceError::NotFound(_))
        ));
    }

    struct RejectingStore {
        attempts: Rc<Cell<u32>>,
    }

    impl RecordStore for RejectingStore {
        fn create_record(&mut self, _: &CollectionRef, _: &Task) -> Result<(), PersistenceError> {
            self.attempts.set(self.attempts.get() + 1);
            Err(PersistenceError::Unavailable("offline".to_string()))
        }

        fn change_record(
            &mut self,
            _: &CollectionRef,
            _: &TaskId,
            _: &TaskPatch,
        ) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".to_string()))
        }

        fn delete_record(&mut self, _: &CollectionRef, _: &TaskId) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".to_string()))
        }

        fn snapshot(&self, _: &CollectionRef) -> Result<Vec<Task>, PersistenceError> {
            Ok(vec![])
        }
    }

    #[test]
    fn failed_write_leaves_local_state_alone() {
        let attempts = Rc::new(Cell::new(0));
        let mut store = TaskCollection::new(
            CollectionRef::default(),
            RejectingStore {
                attempts: Rc::clone(&attempts),
            },
        );
        store.load().expect("load");

        assert!(store.create_record(task("t1", "x")).is_err());
        assert_eq!(attempts.get(), 1);
        assert_eq!(store.counts().total, 0);
    }
}
