//! Arena-backed virtual tree.
//!
//! Nodes live in a slot vector addressed by generational `NodeId`s; a freed
//! slot bumps its generation so stale ids are detected instead of aliasing a
//! new node. Children are owned through the parent's `child`/`children`
//! fields; `parent` is a non-owning back index.
//!
//! Invariants:
//! - Component and Root nodes always hold exactly one child, which is either
//!   a rendered node or a Placeholder.
//! - Only Element and Placeholder nodes carry their own backing target.
//!   A component is represented in its host by the target of its child chain.
//! - Slot mutations name the node expected to occupy the slot and fail with
//!   `TreeError` on mismatch.

use crate::types::{ComponentDesc, Description, ElementDesc};
use core_types::TargetId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// Per-node lifecycle: Created -> Attached -> Updated* -> Detached -> Destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Created,
    Attached,
    Updated,
    Detached,
    Destroyed,
}

impl Lifecycle {
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Created, Attached)
                | (Attached | Updated, Updated)
                | (Attached | Updated, Detached)
                | (Detached, Destroyed)
        )
    }

    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Attached | Lifecycle::Updated)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Created => "created",
            Lifecycle::Attached => "attached",
            Lifecycle::Updated => "updated",
            Lifecycle::Detached => "detached",
            Lifecycle::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Root {
        container: TargetId,
        child: NodeId,
        initialized: bool,
    },
    Component {
        desc: Arc<ComponentDesc>,
        child: NodeId,
    },
    Element {
        desc: Arc<ElementDesc>,
        children: Vec<NodeId>,
    },
    Placeholder,
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Root { .. } => "root",
            NodeKind::Component { .. } => "component",
            NodeKind::Element { .. } => "element",
            NodeKind::Placeholder => "placeholder",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub target: TargetId,
    pub state: Lifecycle,
}

impl VNode {
    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Root { .. } => "#root",
            NodeKind::Component { desc, .. } => desc.component.name(),
            NodeKind::Element { desc, .. } => &desc.tag,
            NodeKind::Placeholder => "#placeholder",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("stale or unknown node {0}")]
    StaleNode(NodeId),
    #[error("slot of {parent} holds {found}, expected {expected}")]
    SlotMismatch {
        parent: NodeId,
        expected: NodeId,
        found: NodeId,
    },
    #[error("{child} is not a child of {parent} at the addressed position")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("{node} is a {found}, expected {expected}")]
    WrongNodeKind {
        node: NodeId,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{node}: invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        node: NodeId,
        from: Lifecycle,
        to: Lifecycle,
    },
    #[error("index {index} out of range for {parent} with {len} children")]
    IndexOutOfRange {
        parent: NodeId,
        index: usize,
        len: usize,
    },
}

struct Slot {
    generation: u32,
    node: Option<VNode>,
}

pub struct VTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    by_target: HashMap<TargetId, NodeId>,
}

impl VTree {
    /// Creates an uninitialized root bound to `container`, holding a
    /// placeholder already materialized as `placeholder_target`.
    pub fn new(container: TargetId, placeholder_target: TargetId) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            by_target: HashMap::new(),
        };
        let placeholder = tree.insert(VNode {
            kind: NodeKind::Placeholder,
            parent: None,
            target: placeholder_target,
            state: Lifecycle::Created,
        });
        let root = tree.insert(VNode {
            kind: NodeKind::Root {
                container,
                child: placeholder,
                initialized: false,
            },
            parent: None,
            target: TargetId::INVALID,
            state: Lifecycle::Created,
        });
        if let Some(node) = tree.slot_mut(placeholder) {
            node.parent = Some(root);
        }
        if placeholder_target.is_valid() {
            tree.by_target.insert(placeholder_target, placeholder);
        }
        tree.root = root;
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&VNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn node(&self, id: NodeId) -> Result<&VNode, TreeError> {
        self.get(id).ok_or(TreeError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn container(&self) -> TargetId {
        match self.get(self.root).map(|n| &n.kind) {
            Some(NodeKind::Root { container, .. }) => *container,
            _ => TargetId::INVALID,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.get(self.root).map(|n| &n.kind),
            Some(NodeKind::Root {
                initialized: true,
                ..
            })
        )
    }

    /// Children of an element; empty for every other kind.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element { children, .. }) => children,
            _ => &[],
        }
    }

    /// Occupant of a component or root slot.
    pub fn slot_child(&self, id: NodeId) -> Option<NodeId> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Root { child, .. } | NodeKind::Component { child, .. }) => Some(*child),
            _ => None,
        }
    }

    pub fn description(&self, id: NodeId) -> Option<Description> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element { desc, .. }) => Some(Description::Element(Arc::clone(desc))),
            Some(NodeKind::Component { desc, .. }) => {
                Some(Description::Component(Arc::clone(desc)))
            }
            _ => None,
        }
    }

    /// Target representing `id` inside its host: its own target for elements
    /// and placeholders, the target of the child chain for components.
    pub fn host_target(&self, id: NodeId) -> Result<TargetId, TreeError> {
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match &node.kind {
                NodeKind::Element { .. } | NodeKind::Placeholder => return Ok(node.target),
                NodeKind::Component { child, .. } | NodeKind::Root { child, .. } => {
                    current = *child
                }
            }
        }
    }

    /// Target whose child list receives the host targets of `owner`'s children.
    pub fn container_of(&self, owner: NodeId) -> Result<TargetId, TreeError> {
        let mut current = owner;
        loop {
            let node = self.node(current)?;
            match &node.kind {
                NodeKind::Element { .. } => return Ok(node.target),
                NodeKind::Root { container, .. } => return Ok(*container),
                NodeKind::Component { .. } => match node.parent {
                    Some(parent) => current = parent,
                    None => {
                        return Err(TreeError::WrongNodeKind {
                            node: current,
                            expected: "attached component",
                            found: "detached component",
                        });
                    }
                },
                NodeKind::Placeholder => {
                    return Err(TreeError::WrongNodeKind {
                        node: current,
                        expected: "element, component or root",
                        found: "placeholder",
                    });
                }
            }
        }
    }

    pub fn node_for_target(&self, target: TargetId) -> Option<NodeId> {
        self.by_target.get(&target).copied()
    }

    /// Nodes of the subtree rooted at `id`, children before parents.
    pub fn subtree_post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            match &node.kind {
                NodeKind::Element { children, .. } => {
                    for child in children.iter().rev() {
                        stack.push((*child, false));
                    }
                }
                NodeKind::Component { child, .. } | NodeKind::Root { child, .. } => {
                    stack.push((*child, false))
                }
                NodeKind::Placeholder => {}
            }
        }
        out
    }

    fn insert(&mut self, node: VNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut VNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut VNode, TreeError> {
        self.slot_mut(id).ok_or(TreeError::StaleNode(id))
    }
}

#[cfg(any(test, feature = "internal-api"))]
impl VTree {
    /// Allocates a detached node in the Created state. Children already
    /// listed in `kind` are re-parented to the new node.
    pub fn alloc(&mut self, kind: NodeKind, target: TargetId) -> NodeId {
        let owned: Vec<NodeId> = match &kind {
            NodeKind::Element { children, .. } => children.clone(),
            NodeKind::Component { child, .. } | NodeKind::Root { child, .. } => vec![*child],
            NodeKind::Placeholder => Vec::new(),
        };
        let id = self.insert(VNode {
            kind,
            parent: None,
            target,
            state: Lifecycle::Created,
        });
        for child in owned {
            if let Some(node) = self.slot_mut(child) {
                node.parent = Some(id);
            }
        }
        if target.is_valid() {
            self.by_target.insert(target, id);
        }
        id
    }

    pub fn mark_initialized(&mut self, root: NodeId) -> Result<bool, TreeError> {
        let node = self.node_mut(root)?;
        match &mut node.kind {
            NodeKind::Root { initialized, .. } => Ok(!std::mem::replace(initialized, true)),
            other => Err(TreeError::WrongNodeKind {
                node: root,
                expected: "root",
                found: other.name(),
            }),
        }
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.node(child)?;
        let children = self.element_children_mut(parent)?;
        if index > children.len() {
            return Err(TreeError::IndexOutOfRange {
                parent,
                index,
                len: children.len(),
            });
        }
        children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn move_child(
        &mut self,
        parent: NodeId,
        from: usize,
        to: usize,
        expected: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let children = self.element_children_mut(parent)?;
        let len = children.len();
        if from >= len || to >= len {
            return Err(TreeError::IndexOutOfRange {
                parent,
                index: from.max(to),
                len,
            });
        }
        if let Some(expected) = expected.filter(|e| children[from] != *e) {
            return Err(TreeError::NotAChild {
                parent,
                child: expected,
            });
        }
        let moved = children.remove(from);
        children.insert(to, moved);
        Ok(moved)
    }

    pub fn remove_child(
        &mut self,
        parent: NodeId,
        index: usize,
        expected: NodeId,
    ) -> Result<(), TreeError> {
        let children = self.element_children_mut(parent)?;
        if children.get(index) != Some(&expected) {
            return Err(TreeError::NotAChild {
                parent,
                child: expected,
            });
        }
        children.remove(index);
        self.node_mut(expected)?.parent = None;
        Ok(())
    }

    /// Swaps `old` for `new` in `parent`, which is either an element (at
    /// `index`) or a component/root slot (index ignored).
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        index: usize,
        old: NodeId,
        new: NodeId,
    ) -> Result<(), TreeError> {
        self.node(new)?;
        let node = self.node_mut(parent)?;
        match &mut node.kind {
            NodeKind::Element { children, .. } => {
                if children.get(index) != Some(&old) {
                    return Err(TreeError::NotAChild { parent, child: old });
                }
                children[index] = new;
            }
            NodeKind::Component { child, .. } | NodeKind::Root { child, .. } => {
                if *child != old {
                    return Err(TreeError::SlotMismatch {
                        parent,
                        expected: old,
                        found: *child,
                    });
                }
                *child = new;
            }
            NodeKind::Placeholder => {
                return Err(TreeError::WrongNodeKind {
                    node: parent,
                    expected: "element, component or root",
                    found: "placeholder",
                });
            }
        }
        self.node_mut(old)?.parent = None;
        self.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    /// Stores a new description; the variant and compatibility must match.
    pub fn set_desc(&mut self, id: NodeId, desc: &Description) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        match (&mut node.kind, desc) {
            (NodeKind::Element { desc: stored, .. }, Description::Element(next))
                if stored.tag == next.tag =>
            {
                *stored = Arc::clone(next);
            }
            (NodeKind::Component { desc: stored, .. }, Description::Component(next))
                if stored.component == next.component =>
            {
                *stored = Arc::clone(next);
            }
            (kind, _) => {
                return Err(TreeError::WrongNodeKind {
                    node: id,
                    expected: "compatible element or component",
                    found: kind.name(),
                });
            }
        }
        Ok(())
    }

    pub fn advance(&mut self, id: NodeId, next: Lifecycle) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        if !node.state.can_transition_to(next) {
            return Err(TreeError::InvalidTransition {
                node: id,
                from: node.state,
                to: next,
            });
        }
        node.state = next;
        Ok(())
    }

    /// Releases a node's slot. The node must already be Destroyed.
    pub fn free(&mut self, id: NodeId) -> Result<VNode, TreeError> {
        let node = self.node(id)?;
        if node.state != Lifecycle::Destroyed {
            return Err(TreeError::InvalidTransition {
                node: id,
                from: node.state,
                to: Lifecycle::Destroyed,
            });
        }
        let slot = &mut self.slots[id.index as usize];
        let Some(node) = slot.node.take() else {
            return Err(TreeError::StaleNode(id));
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        if node.target.is_valid() && self.by_target.get(&node.target) == Some(&id) {
            self.by_target.remove(&node.target);
        }
        Ok(node)
    }

    fn element_children_mut(&mut self, parent: NodeId) -> Result<&mut Vec<NodeId>, TreeError> {
        let node = self.node_mut(parent)?;
        match &mut node.kind {
            NodeKind::Element { children, .. } => Ok(children),
            other => Err(TreeError::WrongNodeKind {
                node: parent,
                expected: "element",
                found: other.name(),
            }),
        }
    }
}
