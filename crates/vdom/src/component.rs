//! Render contract and the capability object handed to it.
//!
//! A component sees its props and children through `RenderContext` only;
//! there is no access to the live tree or to root state from inside `render`.

use crate::template::Template;
use crate::types::{ComponentRef, Content, Description, Key, Listener, PropBag, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("component {component} failed to render: {message}")]
pub struct RenderError {
    pub component: String,
    pub message: String,
}

impl RenderError {
    pub fn new(component: &ComponentRef, message: impl Into<String>) -> Self {
        Self {
            component: component.name().to_string(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown component {0}")]
    Unknown(String),
    #[error("component {component} failed to load: {message}")]
    Load { component: String, message: String },
}

/// Synchronous, deterministic render contract.
pub trait Component {
    fn render(&self, cx: &RenderContext<'_>) -> Result<Template, RenderError>;
}

impl<F> Component for F
where
    F: Fn(&RenderContext<'_>) -> Result<Template, RenderError>,
{
    fn render(&self, cx: &RenderContext<'_>) -> Result<Template, RenderError> {
        self(cx)
    }
}

/// Maps component references to definitions. Implementations must be
/// idempotent; callers may cache results for the lifetime of a process.
pub trait ComponentResolver {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError>;
}

impl<R: ComponentResolver + ?Sized> ComponentResolver for Box<R> {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        (**self).resolve(component)
    }
}

/// Lets several roots on one thread share a single (caching) resolver.
impl<R: ComponentResolver + ?Sized> ComponentResolver for Rc<RefCell<R>> {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        self.borrow_mut().resolve(component)
    }
}

/// Resolver over a plain map, handy for tests and small hosts.
impl ComponentResolver for HashMap<ComponentRef, Rc<dyn Component>> {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        self.get(component)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(component.name().to_string()))
    }
}

/// Props, children and a few read helpers for one render call.
pub struct RenderContext<'a> {
    component: &'a ComponentRef,
    key: Option<&'a Key>,
    props: &'a PropBag,
    content: &'a Content,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        component: &'a ComponentRef,
        key: Option<&'a Key>,
        props: &'a PropBag,
        content: &'a Content,
    ) -> Self {
        Self {
            component,
            key,
            props,
            content,
        }
    }

    pub fn component(&self) -> &ComponentRef {
        self.component
    }

    pub fn key(&self) -> Option<&Key> {
        self.key
    }

    pub fn props(&self) -> &PropBag {
        self.props
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.props.value(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.props.listener(name)
    }

    /// Required prop, as a render error when absent.
    pub fn require(&self, name: &str) -> Result<&Value, RenderError> {
        self.value(name)
            .ok_or_else(|| RenderError::new(self.component, format!("missing prop {name:?}")))
    }

    /// Children passed to the component, ready to be placed in a template.
    pub fn children(&self) -> Template {
        match self.content {
            Content::Empty => Template::Empty,
            Content::Text(text) => Template::Text(text.clone()),
            Content::Children(children) => Template::Fragment(
                children
                    .iter()
                    .cloned()
                    .map(Template::Described)
                    .collect(),
            ),
        }
    }

    pub fn child_descriptions(&self) -> &[Description] {
        self.content.children()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementDesc;
    use std::sync::Arc;

    #[test]
    fn closures_implement_the_render_contract() {
        let label: Rc<dyn Component> =
            Rc::new(|cx: &RenderContext<'_>| -> Result<Template, RenderError> {
                let text = cx.require("label")?.to_string();
                Ok(Template::element("span", PropBag::new(), vec![Template::text(text)]))
            });
        let component = ComponentRef::new("Label");
        let props = PropBag::new().with("label", 3);
        let content = Content::Empty;
        let cx = RenderContext::new(&component, None, &props, &content);
        assert!(label.render(&cx).is_ok());

        let empty = PropBag::new();
        let cx = RenderContext::new(&component, None, &empty, &content);
        let err = label.render(&cx).unwrap_err();
        assert_eq!(err.component, "Label");
    }

    #[test]
    fn children_become_a_fragment_of_descriptions() {
        let component = ComponentRef::new("Frame");
        let props = PropBag::new();
        let child = Description::from(ElementDesc::new("p"));
        let content = Content::Children(vec![child.clone()]);
        let cx = RenderContext::new(&component, None, &props, &content);
        assert_eq!(cx.children(), Template::Fragment(vec![Template::Described(child)]));

        let text = Content::Text(Arc::from("hi"));
        let cx = RenderContext::new(&component, None, &props, &text);
        assert_eq!(cx.children(), Template::text("hi"));
    }

    #[test]
    fn map_resolver_reports_unknown_components() {
        let mut registry: HashMap<ComponentRef, Rc<dyn Component>> = HashMap::new();
        let missing = ComponentRef::new("Missing");
        assert!(matches!(
            registry.resolve(&missing),
            Err(ResolveError::Unknown(name)) if name == "Missing"
        ));
    }
}
