#![allow(dead_code)]

use core_types::{RootHandle, TargetId};
use runtime::{LifecycleSink, MemoryBackend, Root};
use std::collections::HashMap;
use std::rc::Rc;
use vdom::{
    Command, Component, ComponentRef, ComponentResolver, RenderContext, RenderError, State,
    Template, Value,
};

pub const STEP: &str = "Step";

/// State selecting `step` as the current template of a step component.
pub fn step_state(step: usize) -> State {
    let mut state = State::new();
    state.insert("step".into(), Value::Int(step as i64));
    state
}

pub fn go_to(step: usize) -> Command {
    Command::new(format!("go-to-{step}"), move |state| {
        state.insert("step".into(), Value::Int(step as i64));
    })
}

/// A root component rendering `templates[state.step]`.
pub fn step_component(templates: Vec<Template>) -> Rc<dyn Component> {
    Rc::new(
        move |cx: &RenderContext<'_>| -> Result<Template, RenderError> {
            let step = cx.int("step").unwrap_or(0) as usize;
            templates
                .get(step)
                .cloned()
                .ok_or_else(|| RenderError::new(cx.component(), format!("no step {step}")))
        },
    )
}

/// Mounts `component` into a fresh in-memory container.
pub fn mount<S: LifecycleSink>(
    component: &str,
    resolver: impl ComponentResolver + 'static,
    sink: S,
) -> (Root<MemoryBackend, S>, TargetId) {
    let mut backend = MemoryBackend::new();
    let container = backend.create_container();
    let root = Root::mount(
        RootHandle(1),
        backend,
        container,
        ComponentRef::new(component),
        resolver,
    )
    .unwrap()
    .with_sink(sink);
    (root, container)
}

/// Mounts a step component over `templates`, plus `extra` components.
pub fn mount_steps<S: LifecycleSink>(
    templates: Vec<Template>,
    mut extra: HashMap<ComponentRef, Rc<dyn Component>>,
    sink: S,
) -> (Root<MemoryBackend, S>, TargetId) {
    extra.insert(ComponentRef::new(STEP), step_component(templates));
    mount(STEP, extra, sink)
}
