use crate::tree::{NodeId, NodeKind, VTree};
use crate::types::{ComponentDesc, Content, ElementDesc, Prop};
use std::fmt::{self, Write};

/// Deterministic virtual-tree serialization and equality rules for tests.
/// Not a public stable format; intended for internal comparisons.
///
/// Equivalence rules:
/// - Node kinds, tags and component identities must match.
/// - Every property category must match: class, style, attributes,
///   listeners (by identity), data attributes, DOM properties, custom
///   attributes and custom listeners.
/// - Text content must match exactly; child order is significant.
/// - Backing targets and lifecycle states can be ignored by options.
#[derive(Clone, Copy, Debug)]
pub struct TreeSnapshotOptions {
    pub ignore_targets: bool,
    pub ignore_lifecycle: bool,
}

impl Default for TreeSnapshotOptions {
    fn default() -> Self {
        Self {
            ignore_targets: true,
            ignore_lifecycle: true,
        }
    }
}

#[derive(Debug)]
pub struct TreeSnapshot {
    lines: Vec<String>,
}

impl TreeSnapshot {
    pub fn new(tree: &VTree, options: TreeSnapshotOptions) -> Self {
        Self::of_subtree(tree, tree.root(), options)
    }

    pub fn of_subtree(tree: &VTree, node: NodeId, options: TreeSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(tree, node, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug)]
pub struct TreeMismatch {
    line: usize,
    expected: String,
    actual: String,
    expected_tree: String,
    actual_tree: String,
}

impl fmt::Display for TreeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree mismatch at line {}", self.line)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        writeln!(f, "expected tree:\n{}", self.expected_tree)?;
        writeln!(f, "actual tree:\n{}", self.actual_tree)?;
        Ok(())
    }
}

impl std::error::Error for TreeMismatch {}

pub fn assert_tree_eq(expected: &VTree, actual: &VTree, options: TreeSnapshotOptions) {
    if let Err(mismatch) = compare_trees(expected, actual, options) {
        panic!("{mismatch}");
    }
}

pub fn compare_trees(
    expected: &VTree,
    actual: &VTree,
    options: TreeSnapshotOptions,
) -> Result<(), Box<TreeMismatch>> {
    let expected_snapshot = TreeSnapshot::new(expected, options);
    let actual_snapshot = TreeSnapshot::new(actual, options);
    compare_snapshots(&expected_snapshot, &actual_snapshot)
}

pub fn compare_snapshots(
    expected: &TreeSnapshot,
    actual: &TreeSnapshot,
) -> Result<(), Box<TreeMismatch>> {
    let missing = "<missing>".to_string();
    let len = expected.lines.len().max(actual.lines.len());
    for line in 0..len {
        let exp = expected.lines.get(line).unwrap_or(&missing);
        let act = actual.lines.get(line).unwrap_or(&missing);
        if exp != act {
            return Err(Box::new(TreeMismatch {
                line,
                expected: exp.clone(),
                actual: act.clone(),
                expected_tree: expected.render(),
                actual_tree: actual.render(),
            }));
        }
    }
    Ok(())
}

fn walk_snapshot(
    tree: &VTree,
    id: NodeId,
    options: &TreeSnapshotOptions,
    depth: usize,
    out: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    let Some(node) = tree.get(id) else {
        out.push(format!("{indent}<stale {id}>"));
        return;
    };
    let mut line = String::with_capacity(indent.len() + 64);
    line.push_str(&indent);
    match &node.kind {
        NodeKind::Root {
            initialized, child, ..
        } => {
            let _ = write!(line, "#root initialized={initialized}");
            push_meta(&mut line, node.target, node.state, options);
            out.push(line);
            walk_snapshot(tree, *child, options, depth + 1, out);
        }
        NodeKind::Component { desc, child } => {
            write_component(&mut line, desc);
            push_meta(&mut line, node.target, node.state, options);
            out.push(line);
            walk_snapshot(tree, *child, options, depth + 1, out);
        }
        NodeKind::Element { desc, children } => {
            write_element(&mut line, desc);
            push_meta(&mut line, node.target, node.state, options);
            out.push(line);
            if let Content::Text(text) = &desc.content {
                out.push(format!("{indent}  {text:?}"));
            }
            for child in children {
                walk_snapshot(tree, *child, options, depth + 1, out);
            }
        }
        NodeKind::Placeholder => {
            line.push_str("#placeholder");
            push_meta(&mut line, node.target, node.state, options);
            out.push(line);
        }
    }
}

fn push_meta(
    line: &mut String,
    target: core_types::TargetId,
    state: crate::tree::Lifecycle,
    options: &TreeSnapshotOptions,
) {
    if !options.ignore_targets {
        let _ = write!(line, " @{target}");
    }
    if !options.ignore_lifecycle {
        let _ = write!(line, " [{state}]");
    }
}

fn write_component(line: &mut String, desc: &ComponentDesc) {
    let _ = write!(line, "<{}", desc.component);
    if let Some(key) = &desc.key {
        let _ = write!(line, " key={key}");
    }
    for (name, prop) in desc.props.iter() {
        match prop {
            Prop::Value(value) => {
                let _ = write!(line, " {name}={value}");
            }
            Prop::Listener(listener) => {
                let _ = write!(line, " {name}=fn:{}", listener.id());
            }
            Prop::Custom(bag) => {
                let _ = write!(line, " {name}=custom({})", bag.len());
            }
        }
    }
    line.push('>');
}

fn write_element(line: &mut String, desc: &ElementDesc) {
    let _ = write!(line, "<{}", desc.tag);
    if let Some(key) = &desc.key {
        let _ = write!(line, " key={key}");
    }
    if let Some(class) = &desc.class {
        let _ = write!(line, " class={class:?}");
    }
    for (name, value) in &desc.attrs {
        let _ = write!(line, " {name}={value}");
    }
    for (name, value) in &desc.style {
        let _ = write!(line, " style.{name}={value}");
    }
    for (event, listener) in &desc.listeners {
        let _ = write!(line, " on{event}=fn:{}", listener.id());
    }
    for (name, value) in &desc.dataset {
        let _ = write!(line, " data.{name}={value}");
    }
    for (name, value) in &desc.properties {
        let _ = write!(line, " prop.{name}={value}");
    }
    for (name, value) in &desc.custom.attrs {
        let _ = write!(line, " custom.{name}={value}");
    }
    for (event, listener) in &desc.custom.listeners {
        let _ = write!(line, " custom.on{event}=fn:{}", listener.id());
    }
    line.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Listener, Value};
    use core_types::TargetId;
    use std::sync::Arc;

    fn tree_with(desc: ElementDesc, target: u64) -> VTree {
        let mut tree = VTree::new(TargetId(1), TargetId(2));
        let el = tree.alloc(
            NodeKind::Element {
                desc: Arc::new(desc),
                children: Vec::new(),
            },
            TargetId(target),
        );
        let root = tree.root();
        let placeholder = tree.slot_child(root).unwrap();
        tree.replace_child(root, 0, placeholder, el).unwrap();
        tree
    }

    #[test]
    fn snapshot_lists_every_category() {
        let mut desc = ElementDesc::new("div");
        desc.class = Some(Arc::from("row"));
        desc.style.insert(Arc::from("color"), Value::from("red"));
        desc.listeners
            .insert(Arc::from("click"), Listener::new("select", |_| None));
        desc.content = Content::Text(Arc::from("hi"));
        let snapshot = TreeSnapshot::new(&tree_with(desc, 10), TreeSnapshotOptions::default());
        assert_eq!(
            snapshot.as_lines(),
            [
                "#root initialized=false",
                "  <div class=\"row\" style.color=\"red\" onclick=fn:select>",
                "    \"hi\"",
            ]
        );
    }

    #[test]
    fn targets_are_ignored_by_default() {
        let a = tree_with(ElementDesc::new("p"), 10);
        let b = tree_with(ElementDesc::new("p"), 99);
        assert_tree_eq(&a, &b, TreeSnapshotOptions::default());
        let strict = TreeSnapshotOptions {
            ignore_targets: false,
            ignore_lifecycle: true,
        };
        assert!(compare_trees(&a, &b, strict).is_err());
    }

    #[test]
    fn mismatch_reports_the_first_differing_line() {
        let a = tree_with(ElementDesc::new("p"), 10);
        let b = tree_with(ElementDesc::new("span"), 10);
        let mismatch = compare_trees(&a, &b, TreeSnapshotOptions::default()).unwrap_err();
        assert_eq!(mismatch.line, 1);
        assert!(mismatch.to_string().contains("<span>"));
    }
}
