//! Values, keys, listeners and the canonical description model.
//!
//! Descriptions are immutable once produced. Equality is structural and
//! order-sensitive for child lists; listeners compare by identity only.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type Name = Arc<str>;

/// Plain data carried by props, attributes, styles and root state.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Name),
    List(Vec<Value>),
    Map(BTreeMap<Name, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Name, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Text form used when a scalar ends up as text content.
    ///
    /// Returns `None` for values that render nothing (`Null`, `false`) and for
    /// containers, which have no text form.
    pub fn to_text(&self) -> Option<Name> {
        match self {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(Arc::from("true")),
            Value::Int(n) => Some(Arc::from(n.to_string())),
            Value::Float(x) => Some(Arc::from(x.to_string())),
            Value::Str(s) => Some(Arc::clone(s)),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    pub fn map<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Name>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Name> for Value {
    fn from(value: Name) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

/// Sibling-scoped identity used to position children across renders.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(Name),
}

impl Key {
    /// Keys may only be built from scalar strings or integers.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(n) => Some(Key::Int(*n)),
            Value::Str(s) => Some(Key::Str(Arc::clone(s))),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Arc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

/// A state transition for one root. Commands run serially, each to completion.
pub struct Command {
    label: Name,
    run: Box<dyn FnOnce(&mut State)>,
}

/// Root state: the props handed to a root's top-level component.
pub type State = BTreeMap<Name, Value>;

impl Command {
    pub fn new(label: impl Into<Name>, run: impl FnOnce(&mut State) + 'static) -> Self {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self, state: &mut State) {
        (self.run)(state)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.label).finish()
    }
}

/// Event delivered to a listener by the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: Name,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<Name>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Stable identity of a listener, independent of the closure that implements it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerId {
    Named(Name),
    Anonymous(u64),
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerId::Named(name) => f.write_str(name),
            ListenerId::Anonymous(n) => write!(f, "anon#{n}"),
        }
    }
}

pub type Handler = Rc<dyn Fn(&Event) -> Option<Command>>;

/// An `{identity, invocation thunk}` pair. Equality looks at the identity only,
/// so re-creating the closure on every render never produces a patch.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    handler: Handler,
}

impl Listener {
    pub fn new(
        id: impl Into<Name>,
        handler: impl Fn(&Event) -> Option<Command> + 'static,
    ) -> Self {
        Self {
            id: ListenerId::Named(id.into()),
            handler: Rc::new(handler),
        }
    }

    /// A listener with a fresh identity; every call compares unequal to all others.
    pub fn anonymous(handler: impl Fn(&Event) -> Option<Command> + 'static) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: ListenerId::Anonymous(NEXT.fetch_add(1, Ordering::Relaxed)),
            handler: Rc::new(handler),
        }
    }

    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    pub fn invoke(&self, event: &Event) -> Option<Command> {
        (self.handler)(event)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.id)
    }
}

/// One entry of a template property bag.
#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    Value(Value),
    Listener(Listener),
    /// Attributes and listeners that bypass the allow-list (`custom` key only).
    Custom(PropBag),
}

impl From<Value> for Prop {
    fn from(value: Value) -> Self {
        Prop::Value(value)
    }
}

impl From<Listener> for Prop {
    fn from(value: Listener) -> Self {
        Prop::Listener(value)
    }
}

/// Ordered property bag, as written in a template or passed to a component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropBag(BTreeMap<Name, Prop>);

impl PropBag {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<Name>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), Prop::Value(value.into()));
        self
    }

    pub fn on(mut self, event: &str, listener: Listener) -> Self {
        self.0.insert(Arc::from(format!("on{event}")), Prop::Listener(listener));
        self
    }

    pub fn custom(mut self, bag: PropBag) -> Self {
        self.0.insert(Arc::from("custom"), Prop::Custom(bag));
        self
    }

    pub fn insert(&mut self, name: impl Into<Name>, prop: impl Into<Prop>) {
        self.0.insert(name.into(), prop.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Prop> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.0.get(name) {
            Some(Prop::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        match self.0.get(name) {
            Some(Prop::Listener(listener)) => Some(listener),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Prop)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Name, Prop)> for PropBag {
    fn from_iter<T: IntoIterator<Item = (Name, Prop)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PropBag {
    type Item = (Name, Prop);
    type IntoIter = std::collections::btree_map::IntoIter<Name, Prop>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Opaque component identity; two component descriptions are compatible iff
/// their references are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef(Name);

impl ComponentRef {
    pub fn new(name: impl Into<Name>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text content and child descriptions are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Content {
    #[default]
    Empty,
    Text(Name),
    Children(Vec<Description>),
}

impl Content {
    pub fn children(&self) -> &[Description] {
        match self {
            Content::Children(children) => children,
            Content::Empty | Content::Text(_) => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Empty | Content::Children(_) => None,
        }
    }
}

/// Allow-list bypass channel of an element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomProps {
    pub attrs: BTreeMap<Name, Value>,
    pub listeners: BTreeMap<Name, Listener>,
}

impl CustomProps {
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.listeners.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementDesc {
    pub tag: Name,
    pub key: Option<Key>,
    pub class: Option<Name>,
    pub style: BTreeMap<Name, Value>,
    pub attrs: BTreeMap<Name, Value>,
    pub listeners: BTreeMap<Name, Listener>,
    pub dataset: BTreeMap<Name, Value>,
    pub properties: BTreeMap<Name, Value>,
    pub custom: CustomProps,
    pub content: Content,
}

impl ElementDesc {
    pub fn new(tag: impl Into<Name>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            class: None,
            style: BTreeMap::new(),
            attrs: BTreeMap::new(),
            listeners: BTreeMap::new(),
            dataset: BTreeMap::new(),
            properties: BTreeMap::new(),
            custom: CustomProps::default(),
            content: Content::Empty,
        }
    }

    /// Listener bound to `event`, looking at the allow-listed map first.
    pub fn listener(&self, event: &str) -> Option<&Listener> {
        self.listeners
            .get(event)
            .or_else(|| self.custom.listeners.get(event))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDesc {
    pub component: ComponentRef,
    pub key: Option<Key>,
    pub props: PropBag,
    pub content: Content,
}

impl ComponentDesc {
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            key: None,
            props: PropBag::new(),
            content: Content::Empty,
        }
    }
}

/// Canonical, comparable form of one template instantiation.
#[derive(Clone, Debug)]
pub enum Description {
    Element(Arc<ElementDesc>),
    Component(Arc<ComponentDesc>),
}

impl Description {
    pub fn key(&self) -> Option<&Key> {
        match self {
            Description::Element(el) => el.key.as_ref(),
            Description::Component(c) => c.key.as_ref(),
        }
    }

    pub fn content(&self) -> &Content {
        match self {
            Description::Element(el) => &el.content,
            Description::Component(c) => &c.content,
        }
    }

    /// Same variant and same tag name or component identity. Keys are
    /// compared separately by the reconciler.
    pub fn is_compatible(&self, other: &Description) -> bool {
        match (self, other) {
            (Description::Element(a), Description::Element(b)) => a.tag == b.tag,
            (Description::Component(a), Description::Component(b)) => a.component == b.component,
            _ => false,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Description::Element(el) => &el.tag,
            Description::Component(c) => c.component.name(),
        }
    }
}

impl PartialEq for Description {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Description::Element(a), Description::Element(b)) => Arc::ptr_eq(a, b) || a == b,
            (Description::Component(a), Description::Component(b)) => {
                Arc::ptr_eq(a, b) || a == b
            }
            _ => false,
        }
    }
}

impl From<ElementDesc> for Description {
    fn from(value: ElementDesc) -> Self {
        Description::Element(Arc::new(value))
    }
}

impl From<ComponentDesc> for Description {
    fn from(value: ComponentDesc) -> Self {
        Description::Component(Arc::new(value))
    }
}
