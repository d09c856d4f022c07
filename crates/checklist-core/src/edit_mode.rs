use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::observable::{Observable, Subscription};
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Idle,
    Editing(TaskId),
}

impl EditMode {
    pub fn editing_id(&self) -> Option<&TaskId> {
        match self {
            EditMode::Idle => None,
            EditMode::Editing(id) => Some(id),
        }
    }

    pub fn is_editing(&self, id: &TaskId) -> bool {
        self.editing_id() == Some(id)
    }
}

/// Maps each row id to the node of its editable label. Rows write it when
/// they mount or unmount; outside-click detection only reads it.
#[derive(Debug, Clone)]
pub struct NodeRegistry<N> {
    nodes: HashMap<TaskId, N>,
}

impl<N> Default for NodeRegistry<N> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }
}

impl<N> NodeRegistry<N> {
    pub fn register(&mut self, id: TaskId, node: N) -> Option<N> {
        trace!(id = %id, "registering label node");
        self.nodes.insert(id, node)
    }

    pub fn unregister(&mut self, id: &TaskId) -> Option<N> {
        trace!(id = %id, "unregistering label node");
        self.nodes.remove(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&N> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Owns the single-editor state machine: `Idle` or `Editing(id)`.
#[derive(Debug, Clone, Default)]
pub struct EditModeController {
    state: Observable<EditMode>,
}

impl EditModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditMode {
        (*self.state.get()).clone()
    }

    pub fn editing_id(&self) -> Option<TaskId> {
        self.state.get().editing_id().cloned()
    }

    pub fn is_editing(&self) -> bool {
        self.editing_id().is_some()
    }

    /// Any previous editor is evicted.
    #[tracing::instrument(skip(self))]
    pub fn activate(&self, id: TaskId) {
        let previous = self.editing_id();
        if self.state.replace_if_changed(EditMode::Editing(id.clone())) {
            debug!(id = %id, previous = ?previous, "entered edit mode");
        }
    }

    pub fn deactivate(&self) {
        if self.state.replace_if_changed(EditMode::Idle) {
            debug!("left edit mode");
        }
    }

    /// Leaves edit mode unless `target` is the active row's registered node.
    /// A missing node counts as outside. Returns whether the state changed.
    pub fn deactivate_if_outside<N: PartialEq>(&self, target: &N, registry: &NodeRegistry<N>) -> bool {
        let Some(id) = self.editing_id() else {
            return false;
        };

        if registry.get(&id).is_some_and(|node| node == target) {
            trace!(id = %id, "click inside active editor");
            return false;
        }

        debug!(id = %id, registered = registry.get(&id).is_some(), "click outside active editor");
        self.deactivate();
        true
    }

    pub fn subscribe(&self, listener: impl FnMut(&Rc<EditMode>) + 'static) -> Subscription {
        self.state.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> TaskId {
        TaskId::from(raw)
    }

    #[test]
    fn activating_a_second_item_evicts_the_first() {
        let ctl = EditModeController::new();
        ctl.activate(id("a"));
        ctl.activate(id("b"));

        assert_eq!(ctl.state(), EditMode::Editing(id("b")));
        assert!(!ctl.state().is_editing(&id("a")));
    }

    #[test]
    fn click_outside_returns_to_idle() {
        let ctl = EditModeController::new();
        let mut nodes = NodeRegistry::default();
        nodes.register(id("a"), "label-a");
        nodes.register(id("b"), "label-b");

        ctl.activate(id("a"));
        assert!(ctl.deactivate_if_outside(&"label-b", &nodes));
        assert_eq!(ctl.state(), EditMode::Idle);
    }

    #[test]
    fn click_inside_keeps_editing() {
        let ctl = EditModeController::new();
        let mut nodes = NodeRegistry::default();
        nodes.register(id("a"), "label-a");

        ctl.activate(id("a"));
        assert!(!ctl.deactivate_if_outside(&"label-a", &nodes));
        assert_eq!(ctl.state(), EditMode::Editing(id("a")));
    }

    #[test]
    fn missing_node_counts_as_outside() {
        let ctl = EditModeController::new();
        let nodes: NodeRegistry<&str> = NodeRegistry::default();

        ctl.activate(id("a"));
        assert!(ctl.deactivate_if_outside(&"anything", &nodes));
        assert!(!ctl.is_editing());
    }

    #[test]
    fn idle_click_is_a_no_op() {
        let ctl = EditModeController::new();
        let nodes: NodeRegistry<u32> = NodeRegistry::default();
        assert!(!ctl.deactivate_if_outside(&7, &nodes));
        assert_eq!(ctl.state(), EditMode::Idle);
    }

    #[test]
    fn explicit_deactivate_always_idles() {
        let ctl = EditModeController::new();
        ctl.activate(id("a"));
        ctl.deactivate();
        assert_eq!(ctl.editing_id(), None);
    }
}
