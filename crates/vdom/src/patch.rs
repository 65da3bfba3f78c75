//! Patch records produced by the diff engine.
//!
//! Invariants:
//! - Patches are applied in order; every index is valid against the tree as
//!   left by the preceding patches of the same batch.
//! - `NodeId`/`TargetId` references were resolved at diff time and point to
//!   nodes that exist when the patch applies. Nodes created by a patch are
//!   never addressed by later patches of the same batch, except positionally
//!   by `MoveChild` (with `child: None`).
//! - Payloads are frozen copies; applying never consults live state.
//! - `host` is the backing target whose child list holds the affected
//!   target: the parent element's own target, or the root container.

use crate::tree::NodeId;
use crate::types::{ComponentDesc, Description, ElementDesc, Listener, Name, Value};
use core_types::TargetId;
use std::fmt;
use std::sync::Arc;

/// Pre-rendered subtree, materialized by the applier in one step.
#[derive(Clone, Debug, PartialEq)]
pub enum Blueprint {
    Element {
        desc: Arc<ElementDesc>,
        children: Vec<Blueprint>,
    },
    Component {
        desc: Arc<ComponentDesc>,
        child: Box<Blueprint>,
    },
    Placeholder,
}

impl Blueprint {
    pub fn description(&self) -> Option<Description> {
        match self {
            Blueprint::Element { desc, .. } => Some(Description::Element(Arc::clone(desc))),
            Blueprint::Component { desc, .. } => Some(Description::Component(Arc::clone(desc))),
            Blueprint::Placeholder => None,
        }
    }

    /// Number of virtual nodes this blueprint materializes into.
    pub fn node_count(&self) -> usize {
        match self {
            Blueprint::Element { children, .. } => {
                1 + children.iter().map(Blueprint::node_count).sum::<usize>()
            }
            Blueprint::Component { child, .. } => 1 + child.node_count(),
            Blueprint::Placeholder => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchFamily {
    TreeShape,
    Property,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    /// Bind the root to its container and mark it initialized.
    InitRoot {
        root: NodeId,
        container: TargetId,
    },
    AppendChild {
        parent: NodeId,
        host: TargetId,
        child: Blueprint,
    },
    InsertChild {
        parent: NodeId,
        host: TargetId,
        index: usize,
        child: Blueprint,
    },
    /// Reposition a child of an element. `child` is `None` when the moved
    /// child was inserted earlier in the same batch.
    MoveChild {
        parent: NodeId,
        host: TargetId,
        child: Option<NodeId>,
        from: usize,
        to: usize,
    },
    RemoveChild {
        parent: NodeId,
        host: TargetId,
        child: NodeId,
        target: TargetId,
        index: usize,
    },
    /// Destroy `old` and put `new` in its place. `index` addresses element
    /// children and is 0 for component and root slots.
    ReplaceChild {
        parent: NodeId,
        host: TargetId,
        old: NodeId,
        old_target: TargetId,
        index: usize,
        new: Blueprint,
    },
    SetAttribute {
        node: NodeId,
        target: TargetId,
        name: Name,
        value: Value,
    },
    RemoveAttribute {
        node: NodeId,
        target: TargetId,
        name: Name,
    },
    SetData {
        node: NodeId,
        target: TargetId,
        name: Name,
        value: Value,
    },
    RemoveData {
        node: NodeId,
        target: TargetId,
        name: Name,
    },
    SetStyle {
        node: NodeId,
        target: TargetId,
        name: Name,
        value: Value,
    },
    RemoveStyle {
        node: NodeId,
        target: TargetId,
        name: Name,
    },
    SetClass {
        node: NodeId,
        target: TargetId,
        class: Name,
    },
    RemoveClass {
        node: NodeId,
        target: TargetId,
    },
    AddListener {
        node: NodeId,
        target: TargetId,
        event: Name,
        listener: Listener,
    },
    ReplaceListener {
        node: NodeId,
        target: TargetId,
        event: Name,
        listener: Listener,
    },
    RemoveListener {
        node: NodeId,
        target: TargetId,
        event: Name,
    },
    SetProperty {
        node: NodeId,
        target: TargetId,
        name: Name,
        value: Value,
    },
    DeleteProperty {
        node: NodeId,
        target: TargetId,
        name: Name,
    },
    SetText {
        node: NodeId,
        target: TargetId,
        text: Name,
    },
    RemoveText {
        node: NodeId,
        target: TargetId,
    },
    /// Store the full new description on an element or component node.
    UpdateNode {
        node: NodeId,
        desc: Description,
    },
}

impl Patch {
    pub fn family(&self) -> PatchFamily {
        match self {
            Patch::InitRoot { .. }
            | Patch::AppendChild { .. }
            | Patch::InsertChild { .. }
            | Patch::MoveChild { .. }
            | Patch::RemoveChild { .. }
            | Patch::ReplaceChild { .. } => PatchFamily::TreeShape,
            _ => PatchFamily::Property,
        }
    }

    /// Short kind tag, used in logs and snapshot tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Patch::InitRoot { .. } => "init-root",
            Patch::AppendChild { .. } => "append-child",
            Patch::InsertChild { .. } => "insert-child",
            Patch::MoveChild { .. } => "move-child",
            Patch::RemoveChild { .. } => "remove-child",
            Patch::ReplaceChild { .. } => "replace-child",
            Patch::SetAttribute { .. } => "set-attribute",
            Patch::RemoveAttribute { .. } => "remove-attribute",
            Patch::SetData { .. } => "set-data",
            Patch::RemoveData { .. } => "remove-data",
            Patch::SetStyle { .. } => "set-style",
            Patch::RemoveStyle { .. } => "remove-style",
            Patch::SetClass { .. } => "set-class",
            Patch::RemoveClass { .. } => "remove-class",
            Patch::AddListener { .. } => "add-listener",
            Patch::ReplaceListener { .. } => "replace-listener",
            Patch::RemoveListener { .. } => "remove-listener",
            Patch::SetProperty { .. } => "set-property",
            Patch::DeleteProperty { .. } => "delete-property",
            Patch::SetText { .. } => "set-text",
            Patch::RemoveText { .. } => "remove-text",
            Patch::UpdateNode { .. } => "update-node",
        }
    }

    /// The node a property patch mutates, or the parent of a tree-shape patch.
    pub fn node(&self) -> NodeId {
        match self {
            Patch::InitRoot { root, .. } => *root,
            Patch::AppendChild { parent, .. }
            | Patch::InsertChild { parent, .. }
            | Patch::MoveChild { parent, .. }
            | Patch::RemoveChild { parent, .. }
            | Patch::ReplaceChild { parent, .. } => *parent,
            Patch::SetAttribute { node, .. }
            | Patch::RemoveAttribute { node, .. }
            | Patch::SetData { node, .. }
            | Patch::RemoveData { node, .. }
            | Patch::SetStyle { node, .. }
            | Patch::RemoveStyle { node, .. }
            | Patch::SetClass { node, .. }
            | Patch::RemoveClass { node, .. }
            | Patch::AddListener { node, .. }
            | Patch::ReplaceListener { node, .. }
            | Patch::RemoveListener { node, .. }
            | Patch::SetProperty { node, .. }
            | Patch::DeleteProperty { node, .. }
            | Patch::SetText { node, .. }
            | Patch::RemoveText { node, .. }
            | Patch::UpdateNode { node, .. } => *node,
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::InitRoot { root, container } => write!(f, "init-root {root} in {container}"),
            Patch::AppendChild { parent, child, .. } => {
                write!(f, "append-child {parent} <- {}", blueprint_label(child))
            }
            Patch::InsertChild {
                parent,
                index,
                child,
                ..
            } => write!(
                f,
                "insert-child {parent}[{index}] <- {}",
                blueprint_label(child)
            ),
            Patch::MoveChild {
                parent, from, to, ..
            } => write!(f, "move-child {parent} {from} -> {to}"),
            Patch::RemoveChild {
                parent,
                child,
                index,
                ..
            } => write!(f, "remove-child {parent}[{index}] {child}"),
            Patch::ReplaceChild {
                parent, old, new, ..
            } => write!(f, "replace-child {parent} {old} -> {}", blueprint_label(new)),
            Patch::SetAttribute { node, name, value, .. }
            | Patch::SetData { node, name, value, .. }
            | Patch::SetStyle { node, name, value, .. }
            | Patch::SetProperty { node, name, value, .. } => {
                write!(f, "{} {node} {name}={value}", self.kind())
            }
            Patch::RemoveAttribute { node, name, .. }
            | Patch::RemoveData { node, name, .. }
            | Patch::RemoveStyle { node, name, .. }
            | Patch::DeleteProperty { node, name, .. } => {
                write!(f, "{} {node} {name}", self.kind())
            }
            Patch::SetClass { node, class, .. } => write!(f, "set-class {node} {class:?}"),
            Patch::SetText { node, text, .. } => write!(f, "set-text {node} {text:?}"),
            Patch::RemoveClass { node, .. } | Patch::RemoveText { node, .. } => {
                write!(f, "{} {node}", self.kind())
            }
            Patch::AddListener {
                node,
                event,
                listener,
                ..
            }
            | Patch::ReplaceListener {
                node,
                event,
                listener,
                ..
            } => write!(f, "{} {node} {event} {}", self.kind(), listener.id()),
            Patch::RemoveListener { node, event, .. } => {
                write!(f, "remove-listener {node} {event}")
            }
            Patch::UpdateNode { node, desc } => write!(f, "update-node {node} <{}>", desc.label()),
        }
    }
}

fn blueprint_label(blueprint: &Blueprint) -> String {
    match blueprint {
        Blueprint::Element { desc, .. } => format!("<{}>", desc.tag),
        Blueprint::Component { desc, .. } => format!("<{}>", desc.component),
        Blueprint::Placeholder => "placeholder".to_string(),
    }
}
