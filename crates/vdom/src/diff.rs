//! Diff engine: last-applied tree vs. next description, to an ordered patch list.
//!
//! Contract:
//! - An uninitialized (or force-initialized) root gets a leading `InitRoot`.
//! - A node whose stored description equals the next one is skipped unless
//!   the root is being forced; forcing applies to the root's own slot only.
//! - Components re-render with their next props; the rendered child is
//!   diffed first and the component's `UpdateNode` follows its child patches.
//! - Elements emit property patches per category (class, style, attributes,
//!   listeners, data, properties, custom attributes, custom listeners), then
//!   content patches, then `UpdateNode`.
//! - Compatible nodes update in place; incompatible ones are replaced
//!   wholesale by a single `ReplaceChild` carrying a pre-rendered blueprint.
//! - Child lists go through the keyed reconciler; retained children at
//!   aligned positions are diffed afterwards, inserted ones are not.

use crate::component::{ComponentResolver, RenderContext, RenderError, ResolveError};
use crate::patch::{Blueprint, Patch};
use crate::reconcile::{MoveOp, ReconcileError, ReconcileOptions, reconcile};
use crate::template::{NormalizeConfig, NormalizeError, normalize};
use crate::tree::{NodeId, TreeError, VTree};
use crate::types::{ComponentDesc, Content, Description, ElementDesc, Key, Name};
use core_types::TargetId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct DiffConfig {
    /// Reject duplicate sibling keys while reconciling child lists.
    pub check_duplicate_keys: bool,
    /// Replay every move list against its source before emitting patches.
    pub verify_moves: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            check_duplicate_keys: cfg!(debug_assertions),
            verify_moves: cfg!(debug_assertions),
        }
    }
}

impl DiffConfig {
    fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            check_duplicates: self.check_duplicate_keys,
            verify_moves: self.verify_moves,
        }
    }
}

/// Per-call switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffOptions<'a> {
    /// Re-initialize the root and re-render its top node even if unchanged.
    pub force: bool,
    /// Key whose position should stay stable when child lists reorder.
    pub favored: Option<&'a Key>,
}

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("tree invariant violated: {0}")]
    TreeInvariant(#[from] TreeError),
}

/// Diffs the root slot of `tree` against `next` (`None` renders a placeholder).
pub fn diff_root<R>(
    tree: &VTree,
    next: Option<&Description>,
    resolver: &mut R,
    config: &DiffConfig,
    normalize: &NormalizeConfig,
    options: DiffOptions<'_>,
) -> Result<Vec<Patch>, DiffError>
where
    R: ComponentResolver + ?Sized,
{
    let mut differ = Differ {
        tree,
        resolver,
        config: *config,
        normalize: *normalize,
        favored: options.favored.cloned().map(ChildKey::Explicit),
        patches: Vec::new(),
    };
    let root = tree.root();
    if !tree.is_initialized() || options.force {
        differ.patches.push(Patch::InitRoot {
            root,
            container: tree.container(),
        });
    }
    let current = tree.slot_child(root).ok_or(TreeError::WrongNodeKind {
        node: root,
        expected: "root",
        found: "non-root",
    })?;
    differ.diff_slot(root, current, next, options.force)?;

    let patches = differ.patches;
    #[cfg(feature = "diff-guards")]
    crate::diff_guards::record_diff(patches.len());
    log::debug!(target: "vdom.diff", "diff produced {} patches", patches.len());
    if log::log_enabled!(target: "vdom.diff", log::Level::Trace) {
        for patch in &patches {
            log::trace!(target: "vdom.diff", "  {patch}");
        }
    }
    Ok(patches)
}

/// Pre-renders `desc` into a blueprint, rendering every component inside it.
pub fn build_blueprint<R>(
    desc: &Description,
    resolver: &mut R,
    normalize: &NormalizeConfig,
) -> Result<Blueprint, DiffError>
where
    R: ComponentResolver + ?Sized,
{
    match desc {
        Description::Element(el) => {
            let children = el
                .content
                .children()
                .iter()
                .map(|child| build_blueprint(child, resolver, normalize))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Blueprint::Element {
                desc: Arc::clone(el),
                children,
            })
        }
        Description::Component(c) => {
            let child = match render(c, resolver, normalize)? {
                Some(rendered) => build_blueprint(&rendered, resolver, normalize)?,
                None => Blueprint::Placeholder,
            };
            Ok(Blueprint::Component {
                desc: Arc::clone(c),
                child: Box::new(child),
            })
        }
    }
}

/// Resolves and renders one component, returning its normalized child.
pub fn render<R>(
    desc: &ComponentDesc,
    resolver: &mut R,
    normalize_config: &NormalizeConfig,
) -> Result<Option<Description>, DiffError>
where
    R: ComponentResolver + ?Sized,
{
    #[cfg(feature = "diff-guards")]
    crate::diff_guards::record_resolve();
    let component = resolver.resolve(&desc.component)?;
    let cx = RenderContext::new(&desc.component, desc.key.as_ref(), &desc.props, &desc.content);
    #[cfg(feature = "diff-guards")]
    crate::diff_guards::record_render();
    let template = component.render(&cx)?;
    Ok(normalize(&template, normalize_config)?)
}

/// Target slot of a key the reconciler asks to insert. A key missing from the
/// target list means the move list diverged from the children being diffed.
fn insert_position(
    positions: &HashMap<&ChildKey, usize>,
    key: &ChildKey,
    at: usize,
) -> Result<usize, ReconcileError> {
    positions
        .get(key)
        .copied()
        .ok_or(ReconcileError::Diverged { at })
}

/// Sibling identity used by the reconciler: explicit key, else position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum ChildKey {
    Explicit(Key),
    Index(usize),
}

impl ChildKey {
    fn of(desc: Option<&Description>, index: usize) -> ChildKey {
        match desc.and_then(Description::key) {
            Some(key) => ChildKey::Explicit(key.clone()),
            None => ChildKey::Index(index),
        }
    }
}

struct Differ<'a, R: ?Sized> {
    tree: &'a VTree,
    resolver: &'a mut R,
    config: DiffConfig,
    normalize: NormalizeConfig,
    favored: Option<ChildKey>,
    patches: Vec<Patch>,
}

impl<R: ComponentResolver + ?Sized> Differ<'_, R> {
    fn diff_slot(
        &mut self,
        owner: NodeId,
        current: NodeId,
        next: Option<&Description>,
        force: bool,
    ) -> Result<(), DiffError> {
        let stored = self.tree.description(current);
        match (stored, next) {
            (None, None) => Ok(()),
            (Some(stored), Some(next)) if stored.is_compatible(next) => {
                self.diff_node(current, &stored, next, force)
            }
            (_, next) => {
                let new = match next {
                    Some(desc) => self.build(desc)?,
                    None => Blueprint::Placeholder,
                };
                self.patches.push(Patch::ReplaceChild {
                    parent: owner,
                    host: self.tree.container_of(owner)?,
                    old: current,
                    old_target: self.tree.host_target(current)?,
                    index: 0,
                    new,
                });
                Ok(())
            }
        }
    }

    fn diff_node(
        &mut self,
        id: NodeId,
        stored: &Description,
        next: &Description,
        force: bool,
    ) -> Result<(), DiffError> {
        if !force && stored == next {
            return Ok(());
        }
        match (stored, next) {
            (Description::Component(_), Description::Component(next_desc)) => {
                let rendered = render(next_desc, self.resolver, &self.normalize)?;
                let child = self.tree.slot_child(id).ok_or(TreeError::WrongNodeKind {
                    node: id,
                    expected: "component",
                    found: "non-component",
                })?;
                self.diff_slot(id, child, rendered.as_ref(), false)?;
            }
            (Description::Element(current), Description::Element(next_desc)) => {
                self.diff_element(id, current, next_desc)?;
            }
            _ => {
                return Err(TreeError::WrongNodeKind {
                    node: id,
                    expected: "node compatible with the next description",
                    found: "incompatible node",
                }
                .into());
            }
        }
        self.patches.push(Patch::UpdateNode {
            node: id,
            desc: next.clone(),
        });
        Ok(())
    }

    fn diff_element(
        &mut self,
        id: NodeId,
        current: &ElementDesc,
        next: &ElementDesc,
    ) -> Result<(), DiffError> {
        let target = self.tree.node(id)?.target;
        let node = id;
        let patches = &mut self.patches;

        match (&current.class, &next.class) {
            (old, Some(class)) if old.as_ref() != Some(class) => patches.push(Patch::SetClass {
                node,
                target,
                class: Arc::clone(class),
            }),
            (Some(_), None) => patches.push(Patch::RemoveClass { node, target }),
            _ => {}
        }
        diff_map(&current.style, &next.style, |name, change| {
            patches.push(match change {
                Change::Set(value, _) => Patch::SetStyle {
                    node,
                    target,
                    name,
                    value: value.clone(),
                },
                Change::Removed => Patch::RemoveStyle { node, target, name },
            })
        });
        diff_map(&current.attrs, &next.attrs, |name, change| {
            patches.push(attribute_patch(node, target, name, change))
        });
        diff_map(&current.listeners, &next.listeners, |name, change| {
            patches.push(listener_patch(node, target, name, change))
        });
        diff_map(&current.dataset, &next.dataset, |name, change| {
            patches.push(match change {
                Change::Set(value, _) => Patch::SetData {
                    node,
                    target,
                    name,
                    value: value.clone(),
                },
                Change::Removed => Patch::RemoveData { node, target, name },
            })
        });
        diff_map(&current.properties, &next.properties, |name, change| {
            patches.push(match change {
                Change::Set(value, _) => Patch::SetProperty {
                    node,
                    target,
                    name,
                    value: value.clone(),
                },
                Change::Removed => Patch::DeleteProperty { node, target, name },
            })
        });
        diff_map(&current.custom.attrs, &next.custom.attrs, |name, change| {
            patches.push(attribute_patch(node, target, name, change))
        });
        diff_map(
            &current.custom.listeners,
            &next.custom.listeners,
            |name, change| patches.push(listener_patch(node, target, name, change)),
        );

        let no_children: &[Description] = &[];
        match (&current.content, &next.content) {
            (Content::Text(old), Content::Text(new)) => {
                if old != new {
                    self.patches.push(Patch::SetText {
                        node,
                        target,
                        text: Arc::clone(new),
                    });
                }
            }
            (Content::Text(_), Content::Empty) => {
                self.patches.push(Patch::RemoveText { node, target });
            }
            (Content::Text(_), Content::Children(children)) => {
                self.patches.push(Patch::RemoveText { node, target });
                self.diff_children(id, target, &[], children)?;
            }
            (Content::Empty | Content::Children(_), Content::Text(text)) => {
                let existing = self.tree.children(id).to_vec();
                self.diff_children(id, target, &existing, no_children)?;
                self.patches.push(Patch::SetText {
                    node,
                    target,
                    text: Arc::clone(text),
                });
            }
            (Content::Empty | Content::Children(_), next_content) => {
                let existing = self.tree.children(id).to_vec();
                self.diff_children(id, target, &existing, next_content.children())?;
            }
        }
        Ok(())
    }

    fn diff_children(
        &mut self,
        parent: NodeId,
        host: TargetId,
        existing: &[NodeId],
        next: &[Description],
    ) -> Result<(), DiffError> {
        if existing.is_empty() && next.is_empty() {
            return Ok(());
        }
        let source: Vec<ChildKey> = existing
            .iter()
            .enumerate()
            .map(|(i, id)| ChildKey::of(self.tree.description(*id).as_ref(), i))
            .collect();
        let target: Vec<ChildKey> = next
            .iter()
            .enumerate()
            .map(|(i, desc)| ChildKey::of(Some(desc), i))
            .collect();
        let positions: HashMap<&ChildKey, usize> =
            target.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let ops = reconcile(
            &source,
            &target,
            self.favored.as_ref(),
            self.config.reconcile_options(),
        )?;

        // Live order of the parent's children as the patches so far leave it;
        // `None` marks a child inserted by this batch.
        let mut live: Vec<Option<NodeId>> = existing.iter().copied().map(Some).collect();
        for (at, op) in ops.into_iter().enumerate() {
            match op {
                MoveOp::Remove { index, .. } => {
                    let child = live
                        .get(index)
                        .copied()
                        .flatten()
                        .ok_or(TreeError::IndexOutOfRange {
                            parent,
                            index,
                            len: live.len(),
                        })?;
                    self.patches.push(Patch::RemoveChild {
                        parent,
                        host,
                        child,
                        target: self.tree.host_target(child)?,
                        index,
                    });
                    live.remove(index);
                }
                MoveOp::Insert { key, index } => {
                    let position = insert_position(&positions, &key, at)?;
                    let child = self.build(&next[position])?;
                    self.patches.push(if index == live.len() {
                        Patch::AppendChild {
                            parent,
                            host,
                            child,
                        }
                    } else {
                        Patch::InsertChild {
                            parent,
                            host,
                            index,
                            child,
                        }
                    });
                    live.insert(index, None);
                }
                MoveOp::Move { from, to, .. } => {
                    if from >= live.len() || to >= live.len() {
                        return Err(TreeError::IndexOutOfRange {
                            parent,
                            index: from.max(to),
                            len: live.len(),
                        }
                        .into());
                    }
                    let child = live.remove(from);
                    live.insert(to, child);
                    self.patches.push(Patch::MoveChild {
                        parent,
                        host,
                        child,
                        from,
                        to,
                    });
                }
            }
        }

        for (index, (slot, desc)) in live.iter().zip(next).enumerate() {
            let Some(child) = *slot else {
                continue;
            };
            match self.tree.description(child) {
                Some(stored) if stored.is_compatible(desc) => {
                    self.diff_node(child, &stored, desc, false)?;
                }
                _ => {
                    let new = self.build(desc)?;
                    self.patches.push(Patch::ReplaceChild {
                        parent,
                        host,
                        old: child,
                        old_target: self.tree.host_target(child)?,
                        index,
                        new,
                    });
                }
            }
        }
        Ok(())
    }

    fn build(&mut self, desc: &Description) -> Result<Blueprint, DiffError> {
        build_blueprint(desc, self.resolver, &self.normalize)
    }
}

enum Change<'v, V> {
    /// New value, and whether the key existed before.
    Set(&'v V, bool),
    Removed,
}

/// Merge-walks two sorted maps, reporting added, changed and removed keys.
fn diff_map<V: PartialEq>(
    current: &BTreeMap<Name, V>,
    next: &BTreeMap<Name, V>,
    mut emit: impl FnMut(Name, Change<'_, V>),
) {
    let mut old = current.iter().peekable();
    let mut new = next.iter().peekable();
    loop {
        match (old.peek(), new.peek()) {
            (Some((ok, ov)), Some((nk, nv))) => match ok.cmp(nk) {
                std::cmp::Ordering::Equal => {
                    if ov != nv {
                        emit(Arc::clone(nk), Change::Set(*nv, true));
                    }
                    old.next();
                    new.next();
                }
                std::cmp::Ordering::Less => {
                    emit(Arc::clone(ok), Change::Removed);
                    old.next();
                }
                std::cmp::Ordering::Greater => {
                    emit(Arc::clone(nk), Change::Set(*nv, false));
                    new.next();
                }
            },
            (Some((ok, _)), None) => {
                emit(Arc::clone(ok), Change::Removed);
                old.next();
            }
            (None, Some((nk, nv))) => {
                emit(Arc::clone(nk), Change::Set(*nv, false));
                new.next();
            }
            (None, None) => break,
        }
    }
}

fn attribute_patch(
    node: NodeId,
    target: TargetId,
    name: Name,
    change: Change<'_, crate::types::Value>,
) -> Patch {
    match change {
        Change::Set(value, _) => Patch::SetAttribute {
            node,
            target,
            name,
            value: value.clone(),
        },
        Change::Removed => Patch::RemoveAttribute { node, target, name },
    }
}

fn listener_patch(
    node: NodeId,
    target: TargetId,
    event: Name,
    change: Change<'_, crate::types::Listener>,
) -> Patch {
    match change {
        Change::Set(listener, false) => Patch::AddListener {
            node,
            target,
            event,
            listener: listener.clone(),
        },
        Change::Set(listener, true) => Patch::ReplaceListener {
            node,
            target,
            event,
            listener: listener.clone(),
        },
        Change::Removed => Patch::RemoveListener {
            node,
            target,
            event,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::template::{Template, value_map};
    use crate::tree::NodeKind;
    use crate::types::{ComponentRef, Listener, PropBag, Value};
    use std::rc::Rc;

    type Registry = HashMap<ComponentRef, Rc<dyn Component>>;

    struct Harness {
        tree: VTree,
        registry: Registry,
        next_target: u64,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tree: VTree::new(TargetId(1), TargetId(2)),
                registry: HashMap::new(),
                next_target: 10,
            }
        }

        fn desc(template: Template) -> Description {
            let cfg = NormalizeConfig {
                check_duplicate_keys: true,
            };
            normalize(&template, &cfg).unwrap().unwrap()
        }

        fn diff(&mut self, next: &Description) -> Vec<Patch> {
            self.diff_with(next, DiffOptions::default())
        }

        fn diff_with(&mut self, next: &Description, options: DiffOptions<'_>) -> Vec<Patch> {
            let config = DiffConfig {
                check_duplicate_keys: true,
                verify_moves: true,
            };
            diff_root(
                &self.tree,
                Some(next),
                &mut self.registry,
                &config,
                &NormalizeConfig::default(),
                options,
            )
            .unwrap()
        }

        /// Materializes `desc` straight into the root slot, bypassing patches.
        fn mount(&mut self, desc: &Description) {
            let blueprint =
                build_blueprint(desc, &mut self.registry, &NormalizeConfig::default()).unwrap();
            let node = self.materialize(&blueprint);
            let root = self.tree.root();
            let placeholder = self.tree.slot_child(root).unwrap();
            self.tree.replace_child(root, 0, placeholder, node).unwrap();
            self.tree.mark_initialized(root).unwrap();
        }

        fn materialize(&mut self, blueprint: &Blueprint) -> NodeId {
            self.next_target += 1;
            let target = TargetId(self.next_target);
            match blueprint {
                Blueprint::Element { desc, children } => {
                    let children = children.iter().map(|c| self.materialize(c)).collect();
                    self.tree.alloc(
                        NodeKind::Element {
                            desc: Arc::clone(desc),
                            children,
                        },
                        target,
                    )
                }
                Blueprint::Component { desc, child } => {
                    let child = self.materialize(child);
                    self.tree.alloc(
                        NodeKind::Component {
                            desc: Arc::clone(desc),
                            child,
                        },
                        TargetId::INVALID,
                    )
                }
                Blueprint::Placeholder => self.tree.alloc(NodeKind::Placeholder, target),
            }
        }
    }

    fn kinds(patches: &[Patch]) -> Vec<&'static str> {
        patches.iter().map(Patch::kind).collect()
    }

    fn div(props: PropBag, items: Vec<Template>) -> Template {
        Template::element("div", props, items)
    }

    fn rows(ids: &[i64]) -> Description {
        let items = ids
            .iter()
            .map(|id| {
                Template::element(
                    "li",
                    PropBag::new().with("key", *id),
                    vec![Template::text(format!("row {id}"))],
                )
            })
            .collect();
        Harness::desc(Template::element("ul", PropBag::new(), items))
    }

    #[test]
    fn first_render_initializes_and_fills_the_root_slot() {
        let mut h = Harness::new();
        let desc = Harness::desc(div(PropBag::new(), vec![Template::text("hi")]));
        let patches = h.diff(&desc);
        assert_eq!(kinds(&patches), ["init-root", "replace-child"]);
        match &patches[1] {
            Patch::ReplaceChild {
                host, old_target, ..
            } => {
                assert_eq!(*host, TargetId(1));
                assert_eq!(*old_target, TargetId(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn structurally_equal_description_yields_no_patches() {
        let mut h = Harness::new();
        let make = || {
            Harness::desc(div(
                PropBag::new()
                    .with("class", "a")
                    .on("click", Listener::new("select", |_| None)),
                vec![Template::text("x")],
            ))
        };
        h.mount(&make());
        assert!(h.diff(&make()).is_empty());
    }

    #[test]
    fn forced_root_reinitializes_even_when_equal() {
        let mut h = Harness::new();
        let desc = Harness::desc(div(PropBag::new(), Vec::new()));
        h.mount(&desc);
        let patches = h.diff_with(
            &desc,
            DiffOptions {
                force: true,
                favored: None,
            },
        );
        assert_eq!(kinds(&patches), ["init-root", "update-node"]);
    }

    #[test]
    fn style_diff_emits_only_the_added_entry() {
        let mut h = Harness::new();
        let style =
            |entries: Value| Harness::desc(div(PropBag::new().with("style", entries), Vec::new()));
        h.mount(&style(value_map([("color", Value::from("red"))])));
        let patches = h.diff(&style(value_map([
            ("color", Value::from("red")),
            ("fontSize", Value::from("12px")),
        ])));
        assert_eq!(kinds(&patches), ["set-style", "update-node"]);
        assert!(matches!(&patches[0], Patch::SetStyle { name, .. } if &**name == "fontSize"));
    }

    #[test]
    fn property_categories_emit_in_order() {
        let mut h = Harness::new();
        h.mount(&Harness::desc(div(
            PropBag::new()
                .with("class", "a")
                .with("title", "t")
                .with("dataset", value_map([("id", Value::Int(1))]))
                .on("click", Listener::new("one", |_| None)),
            vec![Template::text("old")],
        )));
        let patches = h.diff(&Harness::desc(div(
            PropBag::new()
                .with("class", "b")
                .with("dataset", value_map([("id", Value::Int(2))]))
                .on("click", Listener::new("two", |_| None))
                .on("input", Listener::new("three", |_| None)),
            vec![Template::text("new")],
        )));
        assert_eq!(
            kinds(&patches),
            [
                "set-class",
                "remove-attribute",
                "replace-listener",
                "add-listener",
                "set-data",
                "set-text",
                "update-node"
            ]
        );
    }

    #[test]
    fn rebuilt_listener_with_same_identity_is_not_a_change() {
        let mut h = Harness::new();
        let make = |n: i64| {
            Harness::desc(div(
                PropBag::new()
                    .with("tabindex", n)
                    .on("click", Listener::new("select", move |_| None)),
                Vec::new(),
            ))
        };
        h.mount(&make(0));
        let patches = h.diff(&make(1));
        assert_eq!(kinds(&patches), ["set-attribute", "update-node"]);
    }

    #[test]
    fn incompatible_keyed_child_is_replaced_whole() {
        let mut h = Harness::new();
        let list = |tag: &str| {
            Harness::desc(div(
                PropBag::new(),
                vec![Template::element(
                    tag,
                    PropBag::new().with("key", "row-1").with("title", tag),
                    Vec::new(),
                )],
            ))
        };
        h.mount(&list("div"));
        let patches = h.diff(&list("span"));
        assert_eq!(kinds(&patches), ["replace-child", "update-node"]);
        let Patch::ReplaceChild {
            index: 0,
            new: Blueprint::Element { desc, .. },
            ..
        } = &patches[0]
        else {
            panic!("expected an element replacement: {patches:?}");
        };
        assert_eq!(&*desc.tag, "span");
    }

    #[test]
    fn rotated_keyed_rows_move_once() {
        let mut h = Harness::new();
        h.mount(&rows(&[1, 2, 3]));
        let patches = h.diff(&rows(&[3, 1, 2]));
        assert_eq!(kinds(&patches), ["move-child", "update-node"]);
        assert!(matches!(
            patches[0],
            Patch::MoveChild { from: 2, to: 0, child: Some(_), .. }
        ));
    }

    #[test]
    fn keyed_rows_insert_remove_and_update_retained() {
        let mut h = Harness::new();
        h.mount(&rows(&[1, 2, 3]));
        let patches = h.diff(&rows(&[1, 4, 3]));
        // Row 4 is freshly inserted, so only the ul itself is updated.
        assert_eq!(kinds(&patches), ["remove-child", "insert-child", "update-node"]);
    }

    #[test]
    fn favored_key_is_threaded_to_the_reconciler() {
        let mut h = Harness::new();
        h.mount(&rows(&[1, 2, 3]));
        let favored = Key::Int(1);
        let patches = h.diff_with(
            &rows(&[2, 1, 3]),
            DiffOptions {
                force: false,
                favored: Some(&favored),
            },
        );
        assert!(matches!(
            patches[0],
            Patch::MoveChild { from: 1, to: 0, .. }
        ));
    }

    #[test]
    fn component_update_follows_its_child_patches() {
        let mut h = Harness::new();
        let label: Rc<dyn Component> =
            Rc::new(|cx: &RenderContext<'_>| -> Result<Template, RenderError> {
                let text = cx.str("label").unwrap_or_default().to_string();
                Ok(Template::element("span", PropBag::new(), vec![Template::text(text)]))
            });
        let label_ref = ComponentRef::new("Label");
        h.registry.insert(label_ref.clone(), label);
        let make = |text: &str| {
            Harness::desc(Template::component(
                &label_ref,
                PropBag::new().with("label", text),
                Vec::new(),
            ))
        };
        h.mount(&make("a"));
        let patches = h.diff(&make("b"));
        assert_eq!(kinds(&patches), ["set-text", "update-node", "update-node"]);
        let root_child = h.tree.slot_child(h.tree.root()).unwrap();
        assert_eq!(patches[2].node(), root_child);
    }

    #[test]
    fn component_rendering_empty_gets_a_placeholder() {
        let mut h = Harness::new();
        let toggle: Rc<dyn Component> =
            Rc::new(|cx: &RenderContext<'_>| -> Result<Template, RenderError> {
                Ok(match cx.value("on").and_then(Value::as_bool) {
                    Some(true) => Template::element("b", PropBag::new(), Vec::new()),
                    _ => Template::Empty,
                })
            });
        let toggle_ref = ComponentRef::new("Toggle");
        h.registry.insert(toggle_ref.clone(), toggle);
        let make = |on: bool| {
            Harness::desc(Template::component(
                &toggle_ref,
                PropBag::new().with("on", on),
                Vec::new(),
            ))
        };
        h.mount(&make(true));
        let patches = h.diff(&make(false));
        assert!(matches!(
            &patches[0],
            Patch::ReplaceChild { new: Blueprint::Placeholder, .. }
        ));
    }

    #[test]
    fn unknown_component_is_a_resolve_error() {
        let mut h = Harness::new();
        let desc = Harness::desc(Template::component(
            &ComponentRef::new("Nope"),
            PropBag::new(),
            Vec::new(),
        ));
        let err = diff_root(
            &h.tree,
            Some(&desc),
            &mut h.registry,
            &DiffConfig::default(),
            &NormalizeConfig::default(),
            DiffOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DiffError::Resolve(ResolveError::Unknown(_))));
    }

    #[test]
    fn insert_of_a_key_outside_the_target_list_is_an_error() {
        let first = ChildKey::Explicit(Key::Int(1));
        let stray = ChildKey::Index(4);
        let positions: HashMap<&ChildKey, usize> = [(&first, 0)].into_iter().collect();
        assert_eq!(insert_position(&positions, &first, 0).unwrap(), 0);
        assert!(matches!(
            insert_position(&positions, &stray, 3),
            Err(ReconcileError::Diverged { at: 3 })
        ));
    }
}
