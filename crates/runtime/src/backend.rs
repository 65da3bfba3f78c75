//! Backing tree abstraction and an in-memory implementation.
//!
//! A backend owns the real (host) nodes. Targets are opaque handles it hands
//! out from `create_*`; the applier only ever refers to targets it was given.
//! Child operations address the host's child list by position, mirroring the
//! virtual tree one to one.

use core_types::TargetId;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use vdom::{ListenerId, Value};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
    #[error("{0} cannot hold children or properties")]
    WrongTargetKind(TargetId),
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: TargetId, child: TargetId },
    #[error("{child} already has a parent")]
    AlreadyAttached { child: TargetId },
    #[error("index {index} out of range for {parent} with {len} children")]
    IndexOutOfRange {
        parent: TargetId,
        index: usize,
        len: usize,
    },
    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: TargetId, child: TargetId },
}

/// Primitive operations the applier drives. Property operations map one to
/// one onto the property patch family.
pub trait Backend {
    fn create_element(&mut self, tag: &str) -> TargetId;
    fn create_placeholder(&mut self) -> TargetId;
    /// Releases a target that has already been detached from its host.
    fn destroy(&mut self, target: TargetId) -> Result<(), BackendError>;

    fn append_child(&mut self, host: TargetId, child: TargetId) -> Result<(), BackendError>;
    fn insert_child(
        &mut self,
        host: TargetId,
        index: usize,
        child: TargetId,
    ) -> Result<(), BackendError>;
    fn move_child(&mut self, host: TargetId, from: usize, to: usize) -> Result<(), BackendError>;
    fn remove_child(&mut self, host: TargetId, child: TargetId) -> Result<(), BackendError>;
    fn replace_child(
        &mut self,
        host: TargetId,
        old: TargetId,
        new: TargetId,
    ) -> Result<(), BackendError>;

    fn set_attribute(&mut self, target: TargetId, name: &str, value: &Value)
    -> Result<(), BackendError>;
    fn remove_attribute(&mut self, target: TargetId, name: &str) -> Result<(), BackendError>;
    fn set_data(&mut self, target: TargetId, name: &str, value: &Value)
    -> Result<(), BackendError>;
    fn remove_data(&mut self, target: TargetId, name: &str) -> Result<(), BackendError>;
    fn set_style(&mut self, target: TargetId, name: &str, value: &Value)
    -> Result<(), BackendError>;
    fn remove_style(&mut self, target: TargetId, name: &str) -> Result<(), BackendError>;
    fn set_class(&mut self, target: TargetId, class: &str) -> Result<(), BackendError>;
    fn remove_class(&mut self, target: TargetId) -> Result<(), BackendError>;
    fn add_listener(
        &mut self,
        target: TargetId,
        event: &str,
        listener: &ListenerId,
    ) -> Result<(), BackendError>;
    fn replace_listener(
        &mut self,
        target: TargetId,
        event: &str,
        listener: &ListenerId,
    ) -> Result<(), BackendError>;
    fn remove_listener(&mut self, target: TargetId, event: &str) -> Result<(), BackendError>;
    fn set_property(
        &mut self,
        target: TargetId,
        name: &str,
        value: &Value,
    ) -> Result<(), BackendError>;
    fn delete_property(&mut self, target: TargetId, name: &str) -> Result<(), BackendError>;
    fn set_text(&mut self, target: TargetId, text: &str) -> Result<(), BackendError>;
    fn remove_text(&mut self, target: TargetId) -> Result<(), BackendError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum TargetKind {
    Container,
    Element { tag: String },
    Placeholder,
}

#[derive(Debug)]
struct TargetRecord {
    kind: TargetKind,
    parent: Option<TargetId>,
    children: Vec<TargetId>,
    class: Option<String>,
    attrs: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    properties: BTreeMap<String, Value>,
    listeners: BTreeMap<String, ListenerId>,
    text: Option<String>,
}

impl TargetRecord {
    fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            class: None,
            attrs: BTreeMap::new(),
            data: BTreeMap::new(),
            style: BTreeMap::new(),
            properties: BTreeMap::new(),
            listeners: BTreeMap::new(),
            text: None,
        }
    }

    fn allows_children(&self) -> bool {
        !matches!(self.kind, TargetKind::Placeholder)
    }
}

/// Reference backend: an arena of host nodes plus a log of every mutation.
#[derive(Debug)]
pub struct MemoryBackend {
    records: Vec<TargetRecord>,
    live: HashMap<TargetId, usize>,
    next: u64,
    ops: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            live: HashMap::new(),
            next: 1,
            ops: Vec::new(),
        }
    }

    /// A parentless host node that roots are mounted into.
    pub fn create_container(&mut self) -> TargetId {
        let target = self.alloc(TargetKind::Container);
        self.ops.push(format!("create-container {target}"));
        target
    }

    pub fn contains(&self, target: TargetId) -> bool {
        self.live.contains_key(&target)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn children(&self, target: TargetId) -> &[TargetId] {
        self.record(target)
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, target: TargetId) -> Option<TargetId> {
        self.record(target).ok().and_then(|r| r.parent)
    }

    pub fn tag(&self, target: TargetId) -> Option<&str> {
        match self.record(target).map(|r| &r.kind) {
            Ok(TargetKind::Element { tag }) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, target: TargetId) -> Option<&str> {
        self.record(target).ok().and_then(|r| r.text.as_deref())
    }

    pub fn class(&self, target: TargetId) -> Option<&str> {
        self.record(target).ok().and_then(|r| r.class.as_deref())
    }

    pub fn attribute(&self, target: TargetId, name: &str) -> Option<&str> {
        self.record(target)
            .ok()
            .and_then(|r| r.attrs.get(name))
            .map(String::as_str)
    }

    pub fn style(&self, target: TargetId, name: &str) -> Option<&str> {
        self.record(target)
            .ok()
            .and_then(|r| r.style.get(name))
            .map(String::as_str)
    }

    pub fn listener(&self, target: TargetId, event: &str) -> Option<&ListenerId> {
        self.record(target).ok().and_then(|r| r.listeners.get(event))
    }

    /// Every mutation so far, oldest first, e.g. `set-style t4 color="red"`.
    pub fn ops(&self) -> &[String] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ops)
    }

    /// Element targets under `root` with tag `tag`, in document order.
    pub fn query_tag(&self, root: TargetId, tag: &str) -> Vec<TargetId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if self.tag(current) == Some(tag) {
                out.push(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Indented serialization of the host subtree under `root`.
    pub fn render_lines(&self, root: TargetId) -> Result<Vec<String>, BackendError> {
        let mut out = Vec::new();
        self.render_into(root, 0, &mut out)?;
        Ok(out)
    }

    fn render_into(
        &self,
        target: TargetId,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<(), BackendError> {
        let record = self.record(target)?;
        let indent = "  ".repeat(depth);
        let mut line = indent.clone();
        match &record.kind {
            TargetKind::Container => line.push_str("#container"),
            TargetKind::Placeholder => line.push_str("<!---->"),
            TargetKind::Element { tag } => {
                let _ = write!(line, "<{tag}");
                if let Some(class) = &record.class {
                    let _ = write!(line, " class={class:?}");
                }
                for (name, value) in &record.attrs {
                    let _ = write!(line, " {name}={value:?}");
                }
                for (name, value) in &record.data {
                    let _ = write!(line, " data-{name}={value:?}");
                }
                if !record.style.is_empty() {
                    let style = record
                        .style
                        .iter()
                        .map(|(k, v)| format!("{k}: {v}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    let _ = write!(line, " style={style:?}");
                }
                for (name, value) in &record.properties {
                    let _ = write!(line, " .{name}={value}");
                }
                for (event, id) in &record.listeners {
                    let _ = write!(line, " on{event}={id}");
                }
                line.push('>');
            }
        }
        out.push(line);
        if let Some(text) = &record.text {
            out.push(format!("{indent}  {text:?}"));
        }
        for child in &record.children {
            self.render_into(*child, depth + 1, out)?;
        }
        Ok(())
    }

    fn alloc(&mut self, kind: TargetKind) -> TargetId {
        let target = TargetId(self.next);
        self.next += 1;
        self.live.insert(target, self.records.len());
        self.records.push(TargetRecord::new(kind));
        target
    }

    fn record(&self, target: TargetId) -> Result<&TargetRecord, BackendError> {
        self.live
            .get(&target)
            .map(|&index| &self.records[index])
            .ok_or(BackendError::UnknownTarget(target))
    }

    fn record_mut(&mut self, target: TargetId) -> Result<&mut TargetRecord, BackendError> {
        match self.live.get(&target) {
            Some(&index) => Ok(&mut self.records[index]),
            None => Err(BackendError::UnknownTarget(target)),
        }
    }

    fn element_mut(&mut self, target: TargetId) -> Result<&mut TargetRecord, BackendError> {
        let record = self.record_mut(target)?;
        match record.kind {
            TargetKind::Element { .. } => Ok(record),
            _ => Err(BackendError::WrongTargetKind(target)),
        }
    }

    fn host_children_mut(&mut self, host: TargetId) -> Result<&mut Vec<TargetId>, BackendError> {
        let record = self.record_mut(host)?;
        if !record.allows_children() {
            return Err(BackendError::WrongTargetKind(host));
        }
        Ok(&mut record.children)
    }

    fn check_attachable(&self, host: TargetId, child: TargetId) -> Result<(), BackendError> {
        if host == child || self.is_ancestor(child, host) {
            debug_assert!(false, "cannot create cycle");
            return Err(BackendError::CycleDetected {
                parent: host,
                child,
            });
        }
        if self.record(child)?.parent.is_some() {
            return Err(BackendError::AlreadyAttached { child });
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: TargetId, node: TargetId) -> bool {
        let mut current = self.parent(node);
        while let Some(target) = current {
            if target == ancestor {
                return true;
            }
            current = self.parent(target);
        }
        false
    }

    fn set_parent(
        &mut self,
        child: TargetId,
        parent: Option<TargetId>,
    ) -> Result<(), BackendError> {
        self.record_mut(child)?.parent = parent;
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}

impl Backend for MemoryBackend {
    fn create_element(&mut self, tag: &str) -> TargetId {
        let target = self.alloc(TargetKind::Element {
            tag: tag.to_string(),
        });
        self.ops.push(format!("create-element {target} {tag}"));
        target
    }

    fn create_placeholder(&mut self) -> TargetId {
        let target = self.alloc(TargetKind::Placeholder);
        self.ops.push(format!("create-placeholder {target}"));
        target
    }

    fn destroy(&mut self, target: TargetId) -> Result<(), BackendError> {
        let record = self.record(target)?;
        if let Some(parent) = record.parent {
            return Err(BackendError::NotAChild {
                parent,
                child: target,
            });
        }
        let children = record.children.clone();
        for child in children {
            self.set_parent(child, None)?;
        }
        self.live.remove(&target);
        self.ops.push(format!("destroy {target}"));
        Ok(())
    }

    fn append_child(&mut self, host: TargetId, child: TargetId) -> Result<(), BackendError> {
        self.check_attachable(host, child)?;
        self.host_children_mut(host)?.push(child);
        self.set_parent(child, Some(host))?;
        self.ops.push(format!("append {host} {child}"));
        Ok(())
    }

    fn insert_child(
        &mut self,
        host: TargetId,
        index: usize,
        child: TargetId,
    ) -> Result<(), BackendError> {
        self.check_attachable(host, child)?;
        let children = self.host_children_mut(host)?;
        if index > children.len() {
            return Err(BackendError::IndexOutOfRange {
                parent: host,
                index,
                len: children.len(),
            });
        }
        children.insert(index, child);
        self.set_parent(child, Some(host))?;
        self.ops.push(format!("insert {host}[{index}] {child}"));
        Ok(())
    }

    fn move_child(&mut self, host: TargetId, from: usize, to: usize) -> Result<(), BackendError> {
        let children = self.host_children_mut(host)?;
        let len = children.len();
        if from >= len || to >= len {
            return Err(BackendError::IndexOutOfRange {
                parent: host,
                index: from.max(to),
                len,
            });
        }
        let moved = children.remove(from);
        children.insert(to, moved);
        self.ops.push(format!("move {host}[{from}->{to}] {moved}"));
        Ok(())
    }

    fn remove_child(&mut self, host: TargetId, child: TargetId) -> Result<(), BackendError> {
        let children = self.host_children_mut(host)?;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return Err(BackendError::NotAChild {
                parent: host,
                child,
            });
        };
        children.remove(pos);
        self.set_parent(child, None)?;
        self.ops.push(format!("remove {host} {child}"));
        Ok(())
    }

    fn replace_child(
        &mut self,
        host: TargetId,
        old: TargetId,
        new: TargetId,
    ) -> Result<(), BackendError> {
        self.check_attachable(host, new)?;
        let children = self.host_children_mut(host)?;
        let Some(pos) = children.iter().position(|c| *c == old) else {
            return Err(BackendError::NotAChild {
                parent: host,
                child: old,
            });
        };
        children[pos] = new;
        self.set_parent(old, None)?;
        self.set_parent(new, Some(host))?;
        self.ops.push(format!("replace {host} {old}->{new}"));
        Ok(())
    }

    fn set_attribute(
        &mut self,
        target: TargetId,
        name: &str,
        value: &Value,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .attrs
            .insert(name.to_string(), text_of(value));
        self.ops.push(format!("set-attribute {target} {name}={value}"));
        Ok(())
    }

    fn remove_attribute(&mut self, target: TargetId, name: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.attrs.remove(name);
        self.ops.push(format!("remove-attribute {target} {name}"));
        Ok(())
    }

    fn set_data(
        &mut self,
        target: TargetId,
        name: &str,
        value: &Value,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .data
            .insert(name.to_string(), text_of(value));
        self.ops.push(format!("set-data {target} {name}={value}"));
        Ok(())
    }

    fn remove_data(&mut self, target: TargetId, name: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.data.remove(name);
        self.ops.push(format!("remove-data {target} {name}"));
        Ok(())
    }

    fn set_style(
        &mut self,
        target: TargetId,
        name: &str,
        value: &Value,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .style
            .insert(name.to_string(), text_of(value));
        self.ops.push(format!("set-style {target} {name}={value}"));
        Ok(())
    }

    fn remove_style(&mut self, target: TargetId, name: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.style.remove(name);
        self.ops.push(format!("remove-style {target} {name}"));
        Ok(())
    }

    fn set_class(&mut self, target: TargetId, class: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.class = Some(class.to_string());
        self.ops.push(format!("set-class {target} {class:?}"));
        Ok(())
    }

    fn remove_class(&mut self, target: TargetId) -> Result<(), BackendError> {
        self.element_mut(target)?.class = None;
        self.ops.push(format!("remove-class {target}"));
        Ok(())
    }

    fn add_listener(
        &mut self,
        target: TargetId,
        event: &str,
        listener: &ListenerId,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .listeners
            .insert(event.to_string(), listener.clone());
        self.ops.push(format!("add-listener {target} {event}={listener}"));
        Ok(())
    }

    fn replace_listener(
        &mut self,
        target: TargetId,
        event: &str,
        listener: &ListenerId,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .listeners
            .insert(event.to_string(), listener.clone());
        self.ops
            .push(format!("replace-listener {target} {event}={listener}"));
        Ok(())
    }

    fn remove_listener(&mut self, target: TargetId, event: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.listeners.remove(event);
        self.ops.push(format!("remove-listener {target} {event}"));
        Ok(())
    }

    fn set_property(
        &mut self,
        target: TargetId,
        name: &str,
        value: &Value,
    ) -> Result<(), BackendError> {
        self.element_mut(target)?
            .properties
            .insert(name.to_string(), value.clone());
        self.ops.push(format!("set-property {target} {name}={value}"));
        Ok(())
    }

    fn delete_property(&mut self, target: TargetId, name: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.properties.remove(name);
        self.ops.push(format!("delete-property {target} {name}"));
        Ok(())
    }

    fn set_text(&mut self, target: TargetId, text: &str) -> Result<(), BackendError> {
        self.element_mut(target)?.text = Some(text.to_string());
        self.ops.push(format!("set-text {target} {text:?}"));
        Ok(())
    }

    fn remove_text(&mut self, target: TargetId) -> Result<(), BackendError> {
        self.element_mut(target)?.text = None;
        self.ops.push(format!("remove-text {target}"));
        Ok(())
    }
}
