//! The task list screen: create form, filter toggle and rows with inline
//! editing, expressed independently of any rendering toolkit.
//!
//! `N` is whatever the host uses to identify a row's label node (a DOM
//! element in the browser, a string in the shell). `G` is the guard type of
//! the host's global click listener.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::edit_mode::{EditMode, EditModeController, NodeRegistry};
use crate::error::{InvalidFilterError, PersistenceError};
use crate::filter::{Filter, FilterSelector};
use crate::ids::IdGenerator;
use crate::listener::ScopedListener;
use crate::observable::{Observable, Subscription};
use crate::store::{CollectionView, Counts, RecordStore, TaskCollection, ViewSnapshot};
use crate::task::{Task, TaskId, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRender {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "rows", rename_all = "lowercase")]
pub enum ListBody {
    Loading,
    Loaded(Vec<RowRender>),
}

/// Everything a renderer needs; nothing else is read while drawing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRender {
    pub draft: String,
    pub filter: Filter,
    pub editing: Option<TaskId>,
    pub counts: Counts,
    pub body: ListBody,
}

impl ListRender {
    pub fn rows(&self) -> &[RowRender] {
        match &self.body {
            ListBody::Loading => &[],
            ListBody::Loaded(rows) => rows,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.body, ListBody::Loading)
    }
}

pub struct ListView<S, N, G = ()> {
    store: TaskCollection<S>,
    filter: FilterSelector,
    view: RefCell<CollectionView>,
    edit: EditModeController,
    nodes: NodeRegistry<N>,
    listener: ScopedListener<G>,
    ids: Box<dyn IdGenerator>,
    draft: Observable<String>,
}

impl<S, N, G> ListView<S, N, G>
where
    S: RecordStore,
    N: PartialEq,
{
    pub fn new(
        store: TaskCollection<S>,
        initial_filter: Filter,
        ids: Box<dyn IdGenerator>,
        listener: ScopedListener<G>,
    ) -> Self {
        let filter = FilterSelector::new(initial_filter);
        let view = RefCell::new(store.query(filter.predicate()));
        Self {
            store,
            filter,
            view,
            edit: EditModeController::new(),
            nodes: NodeRegistry::default(),
            listener,
            ids,
            draft: Observable::new(String::new()),
        }
    }

    pub fn store(&self) -> &TaskCollection<S> {
        &self.store
    }

    pub fn filter(&self) -> Filter {
        self.filter.current()
    }

    pub fn draft(&self) -> String {
        (*self.draft.get()).clone()
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit.state()
    }

    pub fn listener_attached(&self) -> bool {
        self.listener.is_attached()
    }

    /// One-shot readiness gate: pulls the initial snapshot from the backend.
    pub fn load(&mut self) -> Result<(), PersistenceError> {
        self.store.load()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.draft.replace_if_changed(text.into());
    }

    /// Creates a task from the draft. The draft is cleared only after the
    /// store accepted the write, so a failed create can be retried.
    #[tracing::instrument(skip(self))]
    pub fn submit(&mut self) -> Result<TaskId, PersistenceError> {
        let text = self.draft();
        let id = self.ids.generate_id();

        if let Err(err) = self
            .store
            .create_record(Task::new_active(id.clone(), text))
        {
            warn!(error = %err, "create failed; keeping draft");
            return Err(err);
        }

        self.draft.set(String::new());
        info!(id = %id, "task created");
        Ok(id)
    }

    /// Unknown names are rejected and the previous filter stays active.
    pub fn set_filter(&mut self, value: &str) -> Result<Filter, InvalidFilterError> {
        match self.filter.set_filter(value) {
            Ok(_) => Ok(self.filter.current()),
            Err(err) => {
                warn!(error = %err, "ignoring filter change");
                Err(err)
            }
        }
    }

    pub fn apply_filter(&mut self, filter: Filter) {
        self.filter.set(filter);
    }

    pub fn cycle_filter(&mut self) -> Filter {
        self.filter.cycle()
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_completed(&mut self, id: &TaskId) -> Result<bool, PersistenceError> {
        let task = self
            .store
            .get(id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        let completed = !task.completed;
        self.store
            .change_record(id, &TaskPatch::completed(completed))?;
        Ok(completed)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &TaskId) -> Result<(), PersistenceError> {
        self.store.delete_record(id)?;
        if self.edit.state().is_editing(id) {
            self.edit.deactivate();
        }
        self.nodes.unregister(id);
        self.sync_listener();
        Ok(())
    }

    pub fn register_node(&mut self, id: TaskId, node: N) {
        self.nodes.register(id, node);
    }

    pub fn unregister_node(&mut self, id: &TaskId) {
        self.nodes.unregister(id);
    }

    pub fn node(&self, id: &TaskId) -> Option<&N> {
        self.nodes.get(id)
    }

    pub fn activate(&mut self, id: TaskId) {
        self.edit.activate(id);
        self.sync_listener();
    }

    /// Writes `text` to the task being edited and leaves edit mode. On a
    /// failed write the editor stays open with nothing lost. Fails with
    /// [`PersistenceError::NotEditing`] when no editor is open.
    #[tracing::instrument(skip(self, text))]
    pub fn commit_edit(&mut self, text: impl Into<String>) -> Result<(), PersistenceError> {
        let Some(id) = self.edit.editing_id() else {
            warn!("commit without an active editor");
            return Err(PersistenceError::NotEditing);
        };

        self.store.change_record(&id, &TaskPatch::text(text))?;
        self.edit.deactivate();
        self.sync_listener();
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit.deactivate();
        self.sync_listener();
    }

    /// Entry point for every global click while the listener is attached.
    pub fn handle_global_click(&mut self, target: &N) -> bool {
        let left = self.edit.deactivate_if_outside(target, &self.nodes);
        self.sync_listener();
        left
    }

    /// Leaves edit mode and detaches the global listener. Hosts that keep
    /// the view behind a shared handle call this from their teardown.
    pub fn unmount(&mut self) {
        self.edit.deactivate();
        self.listener.release();
        debug!("list view unmounted");
    }

    pub fn snapshot(&self) -> Rc<ViewSnapshot> {
        let wanted = self.filter.predicate();
        if self.view.borrow().predicate() != wanted {
            *self.view.borrow_mut() = self.store.query(wanted);
        }
        self.view.borrow().snapshot()
    }

    pub fn render(&self) -> ListRender {
        let snapshot = self.snapshot();
        let editing = self.edit.editing_id();

        let body = if snapshot.is_loading {
            ListBody::Loading
        } else {
            ListBody::Loaded(
                snapshot
                    .list
                    .iter()
                    .map(|task| RowRender {
                        id: task.id.clone(),
                        text: task.text.clone(),
                        completed: task.completed,
                        editable: editing.as_ref() == Some(&task.id),
                    })
                    .collect(),
            )
        };

        ListRender {
            draft: self.draft(),
            filter: self.filter.current(),
            editing,
            counts: self.store.counts(),
            body,
        }
    }

    /// Fires `on_change` whenever anything [`render`](Self::render) reads changes.
    pub fn subscribe(&self, on_change: impl FnMut() + 'static) -> Subscription {
        let on_change: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(on_change));
        let notify = move |cb: &Rc<RefCell<dyn FnMut()>>| {
            if let Ok(mut call) = cb.try_borrow_mut() {
                (&mut *call)();
            }
        };

        let store_cb = Rc::clone(&on_change);
        let filter_cb = Rc::clone(&on_change);
        let edit_cb = Rc::clone(&on_change);
        let draft_cb = on_change;

        Subscription::merge(vec![
            self.store.subscribe(move |_| notify(&store_cb)),
            self.filter.subscribe(move |_| notify(&filter_cb)),
            self.edit.subscribe(move |_| notify(&edit_cb)),
            self.draft.subscribe(move |_| notify(&draft_cb)),
        ])
    }

    fn sync_listener(&mut self) {
        if self.edit.is_editing() {
            self.listener.acquire();
        } else {
            self.listener.release();
        }
    }
}
