//! Applies patch batches to a virtual tree and its backend in lockstep.
//!
//! Batch protocol:
//! 1. `before_patch` for every patch, in order. A failure here aborts the
//!    batch before anything is mutated.
//! 2. Every patch is applied in order: the virtual tree and the backend are
//!    mutated together and lifecycle transitions are recorded.
//! 3. `after_patch` for every patch, in reverse order, with the events that
//!    patch caused.
//!
//! Any error in step 2 or 3 leaves the tree and backend partially updated;
//! the caller must treat the root as poisoned.

use crate::backend::{Backend, BackendError};
use crate::hooks::{HookError, LifecycleSink, NodeEvent};
use core_types::TargetId;
use vdom::internal::NodeKind;
use vdom::{Blueprint, ElementDesc, Lifecycle, NodeId, Patch, TreeError, VTree};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Summary of one applied batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub patches: usize,
    pub created: usize,
    pub destroyed: usize,
    pub events: usize,
}

pub fn apply_batch<B, S>(
    tree: &mut VTree,
    backend: &mut B,
    sink: &mut S,
    patches: &[Patch],
) -> Result<BatchReport, ApplyError>
where
    B: Backend + ?Sized,
    S: LifecycleSink + ?Sized,
{
    for (index, patch) in patches.iter().enumerate() {
        sink.before_patch(index, patch)?;
    }

    let mut report = BatchReport {
        patches: patches.len(),
        ..BatchReport::default()
    };
    let mut per_patch = Vec::with_capacity(patches.len());
    {
        let mut applier = Applier {
            tree,
            backend,
            report: &mut report,
        };
        for patch in patches {
            log::trace!(target: "runtime.apply", "apply {patch}");
            per_patch.push(applier.apply(patch)?);
        }
    }

    for (index, patch) in patches.iter().enumerate().rev() {
        sink.after_patch(index, patch, &per_patch[index])?;
    }
    report.events = per_patch.iter().map(Vec::len).sum();
    log::debug!(
        target: "runtime.apply",
        "applied {} patches: {} nodes created, {} destroyed",
        report.patches,
        report.created,
        report.destroyed
    );
    Ok(report)
}

struct Applier<'a, B: Backend + ?Sized> {
    tree: &'a mut VTree,
    backend: &'a mut B,
    report: &'a mut BatchReport,
}

impl<B: Backend + ?Sized> Applier<'_, B> {
    fn apply(&mut self, patch: &Patch) -> Result<Vec<NodeEvent>, ApplyError> {
        let mut events = Vec::new();
        match patch {
            Patch::InitRoot { root, .. } => {
                if self.tree.mark_initialized(*root)? {
                    self.attach_subtree(*root, &mut events)?;
                } else {
                    self.transition(*root, Lifecycle::Updated, &mut events)?;
                }
            }
            Patch::AppendChild {
                parent,
                host,
                child,
            } => {
                let (node, target) = self.build(child)?;
                self.backend.append_child(*host, target)?;
                self.tree.push_child(*parent, node)?;
                self.attach_subtree(node, &mut events)?;
            }
            Patch::InsertChild {
                parent,
                host,
                index,
                child,
            } => {
                let (node, target) = self.build(child)?;
                self.backend.insert_child(*host, *index, target)?;
                self.tree.insert_child(*parent, *index, node)?;
                self.attach_subtree(node, &mut events)?;
            }
            Patch::MoveChild {
                parent,
                host,
                child,
                from,
                to,
            } => {
                self.tree.move_child(*parent, *from, *to, *child)?;
                self.backend.move_child(*host, *from, *to)?;
            }
            Patch::RemoveChild {
                parent,
                host,
                child,
                target,
                index,
            } => {
                self.tree.remove_child(*parent, *index, *child)?;
                self.backend.remove_child(*host, *target)?;
                self.teardown(*child, &mut events)?;
            }
            Patch::ReplaceChild {
                parent,
                host,
                old,
                old_target,
                index,
                new,
            } => {
                let (node, target) = self.build(new)?;
                self.backend.replace_child(*host, *old_target, target)?;
                self.tree.replace_child(*parent, *index, *old, node)?;
                self.attach_subtree(node, &mut events)?;
                self.teardown(*old, &mut events)?;
            }
            Patch::UpdateNode { node, desc } => {
                self.tree.set_desc(*node, desc)?;
                self.transition(*node, Lifecycle::Updated, &mut events)?;
            }
            property => self.apply_property(property)?,
        }
        Ok(events)
    }

    fn apply_property(&mut self, patch: &Patch) -> Result<(), ApplyError> {
        let node = patch.node();
        if !self.tree.contains(node) {
            return Err(TreeError::StaleNode(node).into());
        }
        let backend = &mut *self.backend;
        match patch {
            Patch::SetAttribute {
                target,
                name,
                value,
                ..
            } => backend.set_attribute(*target, name, value)?,
            Patch::RemoveAttribute { target, name, .. } => backend.remove_attribute(*target, name)?,
            Patch::SetData {
                target,
                name,
                value,
                ..
            } => backend.set_data(*target, name, value)?,
            Patch::RemoveData { target, name, .. } => backend.remove_data(*target, name)?,
            Patch::SetStyle {
                target,
                name,
                value,
                ..
            } => backend.set_style(*target, name, value)?,
            Patch::RemoveStyle { target, name, .. } => backend.remove_style(*target, name)?,
            Patch::SetClass { target, class, .. } => backend.set_class(*target, class)?,
            Patch::RemoveClass { target, .. } => backend.remove_class(*target)?,
            Patch::AddListener {
                target,
                event,
                listener,
                ..
            } => backend.add_listener(*target, event, listener.id())?,
            Patch::ReplaceListener {
                target,
                event,
                listener,
                ..
            } => backend.replace_listener(*target, event, listener.id())?,
            Patch::RemoveListener { target, event, .. } => {
                backend.remove_listener(*target, event)?
            }
            Patch::SetProperty {
                target,
                name,
                value,
                ..
            } => backend.set_property(*target, name, value)?,
            Patch::DeleteProperty { target, name, .. } => backend.delete_property(*target, name)?,
            Patch::SetText { target, text, .. } => backend.set_text(*target, text)?,
            Patch::RemoveText { target, .. } => backend.remove_text(*target)?,
            Patch::InitRoot { .. }
            | Patch::AppendChild { .. }
            | Patch::InsertChild { .. }
            | Patch::MoveChild { .. }
            | Patch::RemoveChild { .. }
            | Patch::ReplaceChild { .. }
            | Patch::UpdateNode { .. } => {}
        }
        Ok(())
    }

    /// Materializes a blueprint: allocates nodes, creates their targets and
    /// sets every property. Returns the new node and its host target.
    fn build(&mut self, blueprint: &Blueprint) -> Result<(NodeId, TargetId), ApplyError> {
        match blueprint {
            Blueprint::Element { desc, children } => {
                let target = self.backend.create_element(&desc.tag);
                self.write_properties(target, desc)?;
                let mut nodes = Vec::with_capacity(children.len());
                for child in children {
                    let (node, child_target) = self.build(child)?;
                    self.backend.append_child(target, child_target)?;
                    nodes.push(node);
                }
                let id = self.tree.alloc(
                    NodeKind::Element {
                        desc: desc.clone(),
                        children: nodes,
                    },
                    target,
                );
                self.report.created += 1;
                Ok((id, target))
            }
            Blueprint::Component { desc, child } => {
                let (child, target) = self.build(child)?;
                let id = self.tree.alloc(
                    NodeKind::Component {
                        desc: desc.clone(),
                        child,
                    },
                    TargetId::INVALID,
                );
                self.report.created += 1;
                Ok((id, target))
            }
            Blueprint::Placeholder => {
                let target = self.backend.create_placeholder();
                let id = self.tree.alloc(NodeKind::Placeholder, target);
                self.report.created += 1;
                Ok((id, target))
            }
        }
    }

    fn write_properties(&mut self, target: TargetId, desc: &ElementDesc) -> Result<(), ApplyError> {
        let backend = &mut *self.backend;
        if let Some(class) = &desc.class {
            backend.set_class(target, class)?;
        }
        for (name, value) in &desc.style {
            backend.set_style(target, name, value)?;
        }
        for (name, value) in &desc.attrs {
            backend.set_attribute(target, name, value)?;
        }
        for (event, listener) in &desc.listeners {
            backend.add_listener(target, event, listener.id())?;
        }
        for (name, value) in &desc.dataset {
            backend.set_data(target, name, value)?;
        }
        for (name, value) in &desc.properties {
            backend.set_property(target, name, value)?;
        }
        for (name, value) in &desc.custom.attrs {
            backend.set_attribute(target, name, value)?;
        }
        for (event, listener) in &desc.custom.listeners {
            backend.add_listener(target, event, listener.id())?;
        }
        if let Some(text) = desc.content.text() {
            backend.set_text(target, text)?;
        }
        Ok(())
    }

    fn attach_subtree(
        &mut self,
        node: NodeId,
        events: &mut Vec<NodeEvent>,
    ) -> Result<(), ApplyError> {
        for id in self.tree.subtree_post_order(node) {
            self.transition(id, Lifecycle::Attached, events)?;
        }
        Ok(())
    }

    /// Detaches and destroys a subtree already unlinked from its parent.
    /// Events go leaf first; backend targets are released parents first so
    /// every target is detached when destroyed.
    fn teardown(&mut self, node: NodeId, events: &mut Vec<NodeEvent>) -> Result<(), ApplyError> {
        let order = self.tree.subtree_post_order(node);
        for &id in &order {
            self.transition(id, Lifecycle::Detached, events)?;
            self.transition(id, Lifecycle::Destroyed, events)?;
        }
        for &id in order.iter().rev() {
            let target = self.tree.node(id)?.target;
            if target.is_valid() {
                self.backend.destroy(target)?;
            }
        }
        for &id in &order {
            self.tree.free(id)?;
            self.report.destroyed += 1;
        }
        Ok(())
    }

    fn transition(
        &mut self,
        id: NodeId,
        next: Lifecycle,
        events: &mut Vec<NodeEvent>,
    ) -> Result<(), ApplyError> {
        self.tree.advance(id, next)?;
        events.push(NodeEvent {
            node: id,
            kind: next,
            label: event_label(self.tree, id)?,
        });
        Ok(())
    }
}

fn event_label(tree: &VTree, id: NodeId) -> Result<String, TreeError> {
    let node = tree.node(id)?;
    let (name, key) = match &node.kind {
        NodeKind::Root { .. } => ("root", None),
        NodeKind::Placeholder => ("placeholder", None),
        NodeKind::Element { desc, .. } => (&*desc.tag, desc.key.as_ref()),
        NodeKind::Component { desc, .. } => (desc.component.name(), desc.key.as_ref()),
    };
    Ok(match key {
        Some(key) => format!("{name}#{key}"),
        None => name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::hooks::{HookPhase, NoopSink, RecordingSink};
    use std::collections::HashMap;
    use std::rc::Rc;
    use vdom::{
        Component, ComponentRef, DiffConfig, DiffOptions, NormalizeConfig, PropBag, Template,
        diff_root, normalize,
    };

    struct Fixture {
        tree: VTree,
        backend: MemoryBackend,
        container: TargetId,
    }

    fn fixture() -> Fixture {
        let mut backend = MemoryBackend::new();
        let container = backend.create_container();
        let placeholder = backend.create_placeholder();
        backend.append_child(container, placeholder).unwrap();
        Fixture {
            tree: VTree::new(container, placeholder),
            backend,
            container,
        }
    }

    fn diff(tree: &VTree, template: &Template) -> Vec<Patch> {
        let desc = normalize(template, &NormalizeConfig::default()).unwrap();
        let mut registry: HashMap<ComponentRef, Rc<dyn Component>> = HashMap::new();
        diff_root(
            tree,
            desc.as_ref(),
            &mut registry,
            &DiffConfig::default(),
            &NormalizeConfig::default(),
            DiffOptions::default(),
        )
        .unwrap()
    }

    fn list(items: &[&str]) -> Template {
        Template::element(
            "ul",
            PropBag::new(),
            items
                .iter()
                .map(|k| {
                    Template::element("li", PropBag::new().with("key", *k), vec![(*k).into()])
                })
                .collect(),
        )
    }

    #[test]
    fn first_batch_materializes_and_attaches() {
        let mut fx = fixture();
        let patches = diff(&fx.tree, &list(&["a", "b"]));
        let mut sink = RecordingSink::new();
        let report = apply_batch(&mut fx.tree, &mut fx.backend, &mut sink, &patches).unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(report.destroyed, 1);
        assert_eq!(
            sink.lines(),
            [
                "before init-root",
                "before replace-child",
                "after replace-child: attached li#a, attached li#b, attached ul, detached placeholder, destroyed placeholder",
                "after init-root: attached placeholder, attached root",
            ]
        );
        assert_eq!(
            fx.backend.render_lines(fx.container).unwrap(),
            vec!["#container", "  <ul>", "    <li>", "      \"a\"", "    <li>", "      \"b\""]
        );
        assert!(fx.tree.is_initialized());
    }

    #[test]
    fn removal_destroys_the_backing_subtree() {
        let mut fx = fixture();
        let first = diff(&fx.tree, &list(&["a", "b"]));
        apply_batch(&mut fx.tree, &mut fx.backend, &mut NoopSink, &first).unwrap();
        let live_before = fx.backend.live_count();

        let second = diff(&fx.tree, &list(&["b"]));
        let mut sink = RecordingSink::new();
        apply_batch(&mut fx.tree, &mut fx.backend, &mut sink, &second).unwrap();
        assert_eq!(fx.backend.live_count(), live_before - 1);
        assert_eq!(
            sink.lines(),
            [
                "before remove-child",
                "before update-node",
                "after update-node: updated ul",
                "after remove-child: detached li#a, destroyed li#a",
            ]
        );
    }

    #[test]
    fn before_hook_failure_mutates_nothing() {
        let mut fx = fixture();
        let patches = diff(&fx.tree, &list(&["a"]));
        let ops_before = fx.backend.ops().len();
        let mut sink = RecordingSink::failing_at(HookPhase::Before, 1);
        let err = apply_batch(&mut fx.tree, &mut fx.backend, &mut sink, &patches).unwrap_err();
        assert!(matches!(err, ApplyError::Hook(_)));
        assert_eq!(fx.backend.ops().len(), ops_before);
        assert!(!fx.tree.is_initialized());
    }

    #[test]
    fn stale_patch_is_reported_as_a_tree_error() {
        let mut fx = fixture();
        let first = diff(&fx.tree, &list(&["a"]));
        apply_batch(&mut fx.tree, &mut fx.backend, &mut NoopSink, &first).unwrap();
        let removal = diff(&fx.tree, &list(&[]));
        apply_batch(&mut fx.tree, &mut fx.backend, &mut NoopSink, &removal).unwrap();
        let err = apply_batch(&mut fx.tree, &mut fx.backend, &mut NoopSink, &removal).unwrap_err();
        assert!(matches!(err, ApplyError::Tree(_)));
    }
}
