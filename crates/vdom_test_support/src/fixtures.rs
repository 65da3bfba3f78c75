//! Lifecycle ordering fixtures.
//!
//! A fixture file holds cases; each case is a sequence of tree steps. The
//! first step is mounted, every following step is rendered over the previous
//! one, and `expected` lists the hook lines recorded for the last batch.
//! Files are TOML or JSON, chosen by extension.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use vdom::{
    Component, ComponentRef, PropBag, RenderContext, RenderError, Template, Value, value_map,
};

pub const LIFECYCLE_FORMAT_V1: &str = "lifecycle-v1";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeySpec {
    Int(i64),
    Str(String),
}

impl From<&KeySpec> for Value {
    fn from(key: &KeySpec) -> Self {
        match key {
            KeySpec::Int(n) => Value::Int(*n),
            KeySpec::Str(s) => Value::from(s.as_str()),
        }
    }
}

/// One node of a fixture tree: an element (`tag`) or a component (`component`).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub key: Option<KeySpec>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn to_template(&self) -> Result<Template, String> {
        let mut props = PropBag::new();
        if let Some(key) = &self.key {
            props = props.with("key", Value::from(key));
        }
        let mut items = Vec::with_capacity(self.children.len() + 1);
        if let Some(text) = &self.text {
            items.push(Template::text(text.as_str()));
        }
        for child in &self.children {
            items.push(child.to_template()?);
        }

        match (&self.tag, &self.component) {
            (Some(tag), None) => {
                if let Some(class) = &self.class {
                    props = props.with("class", class.as_str());
                }
                for (name, value) in &self.attrs {
                    props = props.with(name.as_str(), value.as_str());
                }
                if !self.style.is_empty() {
                    props = props.with("style", string_map(&self.style));
                }
                if !self.data.is_empty() {
                    props = props.with("dataset", string_map(&self.data));
                }
                Ok(Template::element(tag, props, items))
            }
            (None, Some(component)) => {
                for (name, value) in &self.attrs {
                    props = props.with(name.as_str(), value.as_str());
                }
                Ok(Template::component(
                    &ComponentRef::new(component.as_str()),
                    props,
                    items,
                ))
            }
            _ => Err(format!(
                "node needs exactly one of `tag` and `component`: {self:?}"
            )),
        }
    }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::map(
        map.iter()
            .map(|(k, v)| (k.as_str(), Value::from(v.as_str()))),
    )
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LifecycleCase {
    pub id: String,
    pub steps: Vec<NodeSpec>,
    pub expected: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
struct LifecycleManifest {
    format: String,
    cases: Vec<LifecycleCase>,
}

/// Loads and validates every case of a `.toml` or `.json` fixture file.
pub fn load_lifecycle_cases(path: &Path) -> Vec<LifecycleCase> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read lifecycle fixture {path:?}: {err}"));
    let manifest: LifecycleManifest = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse lifecycle TOML {path:?}: {err}")),
        Some("json") => serde_json::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse lifecycle JSON {path:?}: {err}")),
        other => panic!("unsupported lifecycle fixture extension {other:?} for {path:?}"),
    };
    assert_eq!(
        manifest.format, LIFECYCLE_FORMAT_V1,
        "unsupported lifecycle fixture format in {path:?}"
    );

    let mut seen = BTreeSet::new();
    for case in &manifest.cases {
        assert!(
            seen.insert(case.id.as_str()),
            "duplicate lifecycle case id in {path:?}: {}",
            case.id
        );
        assert!(
            !case.steps.is_empty(),
            "lifecycle case {} in {path:?} has no steps",
            case.id
        );
        for (i, step) in case.steps.iter().enumerate() {
            if let Err(err) = step.to_template() {
                panic!("lifecycle case {} step {i} in {path:?}: {err}", case.id);
            }
        }
    }
    manifest.cases
}

/// Components that fixture trees may reference by name.
///
/// - `Wrap` renders its children inside a `<section>`, or nothing at all
///   when it has none.
/// - `Label` renders a `<span>` holding its `text` prop.
pub fn fixture_components() -> HashMap<ComponentRef, Rc<dyn Component>> {
    let wrap = |cx: &RenderContext<'_>| -> Result<Template, RenderError> {
        if cx.child_descriptions().is_empty() {
            return Ok(Template::Empty);
        }
        Ok(Template::element("section", PropBag::new(), vec![cx.children()]))
    };
    let label = |cx: &RenderContext<'_>| -> Result<Template, RenderError> {
        let text = cx
            .require("text")?
            .to_text()
            .map(|t| t.to_string())
            .unwrap_or_default();
        Ok(Template::element(
            "span",
            PropBag::new().with("style", value_map([("font-weight", Value::from("bold"))])),
            vec![Template::text(text)],
        ))
    };

    let mut components: HashMap<ComponentRef, Rc<dyn Component>> = HashMap::new();
    components.insert(ComponentRef::new("Wrap"), Rc::new(wrap));
    components.insert(ComponentRef::new("Label"), Rc::new(label));
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdom::{Content, Description, NormalizeConfig, normalize};

    #[test]
    fn node_spec_from_toml_builds_a_template() {
        let node: NodeSpec = toml::from_str(
            r#"
            tag = "ul"
            class = "rows"
            children = [{ tag = "li", key = 1, text = "one", data = { id = "1" } }]
            "#,
        )
        .unwrap();
        let desc = normalize(&node.to_template().unwrap(), &NormalizeConfig::default())
            .unwrap()
            .unwrap();
        let Description::Element(ul) = desc else {
            panic!("expected an element");
        };
        assert_eq!(ul.class.as_deref(), Some("rows"));
        let Content::Children(children) = &ul.content else {
            panic!("expected children");
        };
        assert_eq!(children[0].key(), Some(&vdom::Key::Int(1)));
    }

    #[test]
    fn node_spec_rejects_ambiguous_heads() {
        let node = NodeSpec {
            tag: Some("div".into()),
            component: Some("Wrap".into()),
            key: None,
            class: None,
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
            data: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        };
        assert!(node.to_template().is_err());
    }
}
