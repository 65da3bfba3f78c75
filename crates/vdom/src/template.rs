//! List-form templates and their normalization into descriptions.
//!
//! A node template is a list: `[head, props?, items...]`. The head is a tag
//! name (element) or a component reference. The optional second item is a
//! property bag; every other item is text or a child template. Text content
//! and child nodes are mutually exclusive.
//!
//! Property keys outside the allow-list are dropped with a warning. Special
//! keys (`key`, `class`, `style`, `dataset`, `properties`, `custom`) are
//! routed to dedicated description fields.

use crate::allow_list;
use crate::types::{
    ComponentDesc, ComponentRef, Content, CustomProps, Description, ElementDesc, Key, Name, Prop,
    PropBag, Value,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Nested template value as produced by a render contract.
#[derive(Clone, Debug, PartialEq)]
pub enum Template {
    /// Renders nothing; skipped among items, a placeholder at a slot.
    Empty,
    Text(Name),
    Scalar(Value),
    Component(ComponentRef),
    Props(PropBag),
    List(Vec<Template>),
    /// A run of items spliced into the surrounding item list.
    Fragment(Vec<Template>),
    /// An already normalized description (children handed to a component).
    Described(Description),
}

impl Template {
    /// `[tag, props, items...]`
    pub fn element(tag: &str, props: PropBag, items: Vec<Template>) -> Template {
        let mut list = Vec::with_capacity(items.len() + 2);
        list.push(Template::Text(Arc::from(tag)));
        list.push(Template::Props(props));
        list.extend(items);
        Template::List(list)
    }

    /// `[component, props, items...]`
    pub fn component(component: &ComponentRef, props: PropBag, items: Vec<Template>) -> Template {
        let mut list = Vec::with_capacity(items.len() + 2);
        list.push(Template::Component(component.clone()));
        list.push(Template::Props(props));
        list.extend(items);
        Template::List(list)
    }

    pub fn text(text: impl Into<Name>) -> Template {
        Template::Text(text.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Template::Empty => "empty",
            Template::Text(_) => "text",
            Template::Scalar(_) => "scalar",
            Template::Component(_) => "component",
            Template::Props(_) => "props",
            Template::List(_) => "list",
            Template::Fragment(_) => "fragment",
            Template::Described(_) => "description",
        }
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Template::Text(Arc::from(value))
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Template::Text(Arc::from(value))
    }
}

impl From<Description> for Template {
    fn from(value: Description) -> Self {
        Template::Described(value)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NormalizeConfig {
    /// Reject sibling key collisions. Defaults to on in debug builds only.
    pub check_duplicate_keys: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            check_duplicate_keys: cfg!(debug_assertions),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unrecognized template head: {found}")]
    UnrecognizedHead { found: &'static str },
    #[error("<{node}> defines both text content and child nodes")]
    TextWithChildren { node: String },
    #[error("duplicate sibling key {key} under <{parent}>")]
    DuplicateKey { parent: String, key: Key },
    #[error("property bag is only allowed right after the head of <{node}>")]
    UnexpectedProps { node: String },
    #[error("invalid key value {value} on <{node}>")]
    InvalidKey { node: String, value: String },
}

/// Normalizes a template into a description. `Template::Empty` yields `None`.
pub fn normalize(
    template: &Template,
    config: &NormalizeConfig,
) -> Result<Option<Description>, NormalizeError> {
    #[cfg(feature = "diff-guards")]
    crate::diff_guards::record_normalize();
    match template {
        Template::Empty => Ok(None),
        Template::List(items) => parse_node(items, config).map(Some),
        Template::Component(component) => Ok(Some(Description::from(ComponentDesc::new(
            component.clone(),
        )))),
        Template::Described(desc) => Ok(Some(desc.clone())),
        other => Err(NormalizeError::UnrecognizedHead {
            found: other.kind(),
        }),
    }
}

enum Head<'a> {
    Element(&'a Name),
    Component(&'a ComponentRef),
}

fn parse_node(items: &[Template], config: &NormalizeConfig) -> Result<Description, NormalizeError> {
    let head = match items.first() {
        Some(Template::Text(tag)) if !tag.is_empty() => Head::Element(tag),
        Some(Template::Component(component)) => Head::Component(component),
        Some(other) => {
            return Err(NormalizeError::UnrecognizedHead {
                found: other.kind(),
            });
        }
        None => return Err(NormalizeError::UnrecognizedHead { found: "nothing" }),
    };
    let label = match head {
        Head::Element(tag) => tag.to_string(),
        Head::Component(component) => component.name().to_string(),
    };

    let mut rest = &items[1..];
    let mut bag = None;
    if let Some(Template::Props(props)) = rest.first() {
        bag = Some(props);
        rest = &rest[1..];
    }

    let mut text = String::new();
    let mut has_text = false;
    let mut children = Vec::new();
    collect_items(rest, &label, config, &mut text, &mut has_text, &mut children)?;
    if has_text && !children.is_empty() {
        return Err(NormalizeError::TextWithChildren { node: label });
    }
    if config.check_duplicate_keys {
        check_sibling_keys(&label, &children)?;
    }
    let content = if has_text {
        Content::Text(Arc::from(text))
    } else if children.is_empty() {
        Content::Empty
    } else {
        Content::Children(children)
    };

    match head {
        Head::Element(tag) => {
            let mut desc = ElementDesc::new(Arc::clone(tag));
            if let Some(bag) = bag {
                route_element_props(&mut desc, bag)?;
            }
            desc.content = content;
            Ok(Description::from(desc))
        }
        Head::Component(component) => {
            let mut desc = ComponentDesc::new(component.clone());
            if let Some(bag) = bag {
                for (name, prop) in bag.iter() {
                    if &**name == "key" {
                        desc.key = Some(parse_key(&label, prop)?);
                    } else {
                        desc.props.insert(Arc::clone(name), prop.clone());
                    }
                }
            }
            desc.content = content;
            Ok(Description::from(desc))
        }
    }
}

fn collect_items(
    items: &[Template],
    label: &str,
    config: &NormalizeConfig,
    text: &mut String,
    has_text: &mut bool,
    children: &mut Vec<Description>,
) -> Result<(), NormalizeError> {
    for item in items {
        match item {
            Template::Empty => {}
            Template::Text(s) => {
                text.push_str(s);
                *has_text = true;
            }
            Template::Scalar(value) => {
                if let Some(s) = value.to_text() {
                    text.push_str(&s);
                    *has_text = true;
                }
            }
            Template::Props(_) => {
                return Err(NormalizeError::UnexpectedProps {
                    node: label.to_string(),
                });
            }
            Template::Fragment(inner) => {
                collect_items(inner, label, config, text, has_text, children)?;
            }
            Template::List(_) | Template::Component(_) | Template::Described(_) => {
                if let Some(child) = normalize(item, config)? {
                    children.push(child);
                }
            }
        }
    }
    Ok(())
}

fn check_sibling_keys(parent: &str, children: &[Description]) -> Result<(), NormalizeError> {
    let mut seen = HashSet::with_capacity(children.len());
    for key in children.iter().filter_map(Description::key) {
        if !seen.insert(key) {
            return Err(NormalizeError::DuplicateKey {
                parent: parent.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

fn parse_key(node: &str, prop: &Prop) -> Result<Key, NormalizeError> {
    match prop {
        Prop::Value(value) => Key::from_value(value).ok_or_else(|| NormalizeError::InvalidKey {
            node: node.to_string(),
            value: value.to_string(),
        }),
        Prop::Listener(listener) => Err(NormalizeError::InvalidKey {
            node: node.to_string(),
            value: format!("{listener:?}"),
        }),
        Prop::Custom(_) => Err(NormalizeError::InvalidKey {
            node: node.to_string(),
            value: "custom".to_string(),
        }),
    }
}

fn route_element_props(desc: &mut ElementDesc, bag: &PropBag) -> Result<(), NormalizeError> {
    for (name, prop) in bag.iter() {
        match (&**name, prop) {
            ("key", prop) => desc.key = Some(parse_key(&desc.tag, prop)?),
            ("class", Prop::Value(value)) => match class_string(value) {
                Some(class) => desc.class = (!class.is_empty()).then(|| Arc::from(class)),
                None => drop_prop(&desc.tag, name, "class must be a string, list or map"),
            },
            ("style", Prop::Value(Value::Map(map))) => desc.style = map.clone(),
            ("dataset", Prop::Value(Value::Map(map))) => desc.dataset = map.clone(),
            ("properties", Prop::Value(Value::Map(map))) => desc.properties = map.clone(),
            ("custom", Prop::Custom(custom)) => desc.custom = custom_props(custom),
            ("style" | "dataset" | "properties" | "custom", _) => {
                drop_prop(&desc.tag, name, "unexpected value shape")
            }
            (key, Prop::Listener(listener)) => match allow_list::event_for_key(key) {
                Some(event) => {
                    desc.listeners.insert(Arc::from(event), listener.clone());
                }
                None => drop_prop(&desc.tag, name, "unsupported event"),
            },
            (key, Prop::Value(value)) if allow_list::is_allowed_attribute(key) => {
                desc.attrs.insert(Arc::clone(name), value.clone());
            }
            _ => drop_prop(&desc.tag, name, "unsupported property key"),
        }
    }
    Ok(())
}

fn custom_props(bag: &PropBag) -> CustomProps {
    let mut custom = CustomProps::default();
    for (name, prop) in bag.iter() {
        match prop {
            Prop::Value(value) => {
                custom.attrs.insert(Arc::clone(name), value.clone());
            }
            Prop::Listener(listener) => {
                let event = name.strip_prefix("on").unwrap_or(name);
                custom.listeners.insert(Arc::from(event), listener.clone());
            }
            Prop::Custom(_) => log::warn!(
                target: "vdom.template",
                "nested custom bag under {name:?} dropped"
            ),
        }
    }
    custom
}

/// Class may be written as a string, a list of names, or a `{name: bool}` map.
fn class_string(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::List(items) => {
            let names = items
                .iter()
                .map(|item| item.as_str())
                .collect::<Option<Vec<_>>>()?;
            Some(names.join(" "))
        }
        Value::Map(map) => Some(
            map.iter()
                .filter(|(_, on)| on.as_bool().unwrap_or(false))
                .map(|(name, _)| &**name)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn drop_prop(tag: &str, name: &str, reason: &str) {
    log::warn!(target: "vdom.template", "<{tag}> dropping property {name:?}: {reason}");
}

/// Convenience for building plain value maps (`style`, `dataset`, `properties`).
pub fn value_map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Arc::from(k), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Listener;

    fn cfg() -> NormalizeConfig {
        NormalizeConfig {
            check_duplicate_keys: true,
        }
    }

    fn element(desc: Option<Description>) -> Arc<ElementDesc> {
        match desc {
            Some(Description::Element(el)) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn routes_special_keys_to_dedicated_fields() {
        let props = PropBag::new()
            .with("key", "row-1")
            .with("class", "row  selected")
            .with("style", value_map([("color", Value::from("red"))]))
            .with("dataset", value_map([("id", Value::Int(1))]))
            .with("properties", value_map([("scrollTop", Value::Int(0))]))
            .with("title", "hello")
            .on("click", Listener::new("select", |_| None))
            .custom(
                PropBag::new()
                    .with("x-flag", true)
                    .on("swipe", Listener::new("swipe", |_| None)),
            );
        let tpl = Template::element("div", props, vec![Template::text("a")]);
        let el = element(normalize(&tpl, &cfg()).unwrap());
        assert_eq!(el.key, Some(Key::from("row-1")));
        assert_eq!(el.class.as_deref(), Some("row selected"));
        assert_eq!(el.style.get("color"), Some(&Value::from("red")));
        assert_eq!(el.dataset.get("id"), Some(&Value::Int(1)));
        assert_eq!(el.properties.get("scrollTop"), Some(&Value::Int(0)));
        assert_eq!(el.attrs.len(), 1);
        assert!(el.listeners.contains_key("click"));
        assert_eq!(el.custom.attrs.get("x-flag"), Some(&Value::Bool(true)));
        assert!(el.custom.listeners.contains_key("swipe"));
        assert_eq!(el.content, Content::Text(Arc::from("a")));
    }

    #[test]
    fn unknown_keys_are_dropped_not_fatal() {
        let props = PropBag::new()
            .with("frobnicate", 1)
            .with("onclick", "not a listener");
        let tpl = Template::element("div", props, Vec::new());
        let el = element(normalize(&tpl, &cfg()).unwrap());
        assert!(el.attrs.is_empty());
        assert!(el.listeners.is_empty());
    }

    #[test]
    fn text_and_children_are_exclusive() {
        let tpl = Template::element(
            "p",
            PropBag::new(),
            vec![
                Template::text("x"),
                Template::element("b", PropBag::new(), Vec::new()),
            ],
        );
        assert_eq!(
            normalize(&tpl, &cfg()),
            Err(NormalizeError::TextWithChildren {
                node: "p".to_string()
            })
        );
    }

    #[test]
    fn unrecognized_head_is_fatal() {
        let tpl = Template::List(vec![Template::Scalar(Value::Int(3))]);
        assert!(matches!(
            normalize(&tpl, &cfg()),
            Err(NormalizeError::UnrecognizedHead { found: "scalar" })
        ));
        let tpl = Template::List(Vec::new());
        assert!(normalize(&tpl, &cfg()).is_err());
        assert!(normalize(&Template::text("loose"), &cfg()).is_err());
    }

    #[test]
    fn duplicate_sibling_keys_are_rejected_when_checked() {
        let li = |k: &str| Template::element("li", PropBag::new().with("key", k), Vec::new());
        let tpl = Template::element("ul", PropBag::new(), vec![li("a"), li("a")]);
        assert!(matches!(
            normalize(&tpl, &cfg()),
            Err(NormalizeError::DuplicateKey { .. })
        ));
        let lenient = NormalizeConfig {
            check_duplicate_keys: false,
        };
        assert!(normalize(&tpl, &lenient).is_ok());
    }

    #[test]
    fn fragments_splice_and_empty_items_skip() {
        let li = |k: i64| Template::element("li", PropBag::new().with("key", k), Vec::new());
        let tpl = Template::element(
            "ul",
            PropBag::new(),
            vec![
                li(1),
                Template::Empty,
                Template::Fragment(vec![li(2), li(3)]),
            ],
        );
        let el = element(normalize(&tpl, &cfg()).unwrap());
        let keys: Vec<_> = el
            .content
            .children()
            .iter()
            .map(|c| c.key().cloned())
            .collect();
        assert_eq!(keys, vec![Some(Key::Int(1)), Some(Key::Int(2)), Some(Key::Int(3))]);
    }

    #[test]
    fn component_head_keeps_arbitrary_props() {
        let row = ComponentRef::new("Row");
        let tpl = Template::component(
            &row,
            PropBag::new().with("key", 7).with("label", "a"),
            Vec::new(),
        );
        match normalize(&tpl, &cfg()).unwrap() {
            Some(Description::Component(c)) => {
                assert_eq!(c.component, row);
                assert_eq!(c.key, Some(Key::Int(7)));
                assert_eq!(c.props.value("label"), Some(&Value::from("a")));
                assert!(c.props.get("key").is_none());
            }
            other => panic!("expected component, got {other:?}"),
        }
    }

    #[test]
    fn class_accepts_list_and_toggle_map() {
        let list = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(class_string(&list).as_deref(), Some("a b"));
        let toggles = value_map([("on", Value::Bool(true)), ("off", Value::Bool(false))]);
        assert_eq!(class_string(&toggles).as_deref(), Some("on"));
        assert_eq!(class_string(&Value::Int(1)), None);
    }
}
