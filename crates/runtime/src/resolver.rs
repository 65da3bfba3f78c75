//! Component registries and the resolution cache.

use std::collections::HashMap;
use std::rc::Rc;
use vdom::{Component, ComponentRef, ComponentResolver, ResolveError};

/// Name-to-implementation table populated by the host before mounting.
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<ComponentRef, Rc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component` under `name` and returns its reference.
    pub fn register(
        &mut self,
        name: &str,
        component: impl Component + 'static,
    ) -> ComponentRef {
        let reference = ComponentRef::new(name);
        self.components
            .insert(reference.clone(), Rc::new(component));
        reference
    }

    pub fn with(mut self, name: &str, component: impl Component + 'static) -> Self {
        self.register(name, component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentResolver for ComponentRegistry {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        self.components
            .get(component)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(component.name().to_string()))
    }
}

/// Resolves each distinct reference at most once for the cache's lifetime.
/// Failures are cached too, so a broken reference fails the same way on
/// every render instead of retrying the inner resolver.
pub struct ResolverCache<R> {
    inner: R,
    cache: HashMap<ComponentRef, Result<Rc<dyn Component>, ResolveError>>,
    inner_calls: usize,
}

impl<R: ComponentResolver> ResolverCache<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
            inner_calls: 0,
        }
    }

    /// How many times the inner resolver has been consulted.
    pub fn inner_calls(&self) -> usize {
        self.inner_calls
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ComponentResolver> ComponentResolver for ResolverCache<R> {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        if let Some(hit) = self.cache.get(component) {
            return hit.clone();
        }
        self.inner_calls += 1;
        let resolved = self.inner.resolve(component);
        match &resolved {
            Ok(_) => log::trace!(target: "runtime.resolve", "resolved {component}"),
            Err(err) => log::warn!(target: "runtime.resolve", "cannot resolve {component}: {err}"),
        }
        self.cache.insert(component.clone(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdom::{RenderContext, RenderError, Template};

    fn empty(_: &RenderContext<'_>) -> Result<Template, RenderError> {
        Ok(Template::Empty)
    }

    #[test]
    fn cache_consults_the_inner_resolver_once_per_reference() {
        let registry = ComponentRegistry::new().with("Row", empty);
        let mut cache = ResolverCache::new(registry);
        let row = ComponentRef::new("Row");
        for _ in 0..3 {
            assert!(cache.resolve(&row).is_ok());
        }
        assert_eq!(cache.inner_calls(), 1);
    }

    #[test]
    fn failures_are_cached_too() {
        let mut cache = ResolverCache::new(ComponentRegistry::new());
        let missing = ComponentRef::new("Missing");
        assert!(matches!(
            cache.resolve(&missing),
            Err(ResolveError::Unknown(name)) if name == "Missing"
        ));
        assert!(cache.resolve(&missing).is_err());
        assert_eq!(cache.inner_calls(), 1);
        assert_eq!(cache.cached(), 1);
    }
}
