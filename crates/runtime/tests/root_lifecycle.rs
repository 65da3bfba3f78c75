mod common;

use common::{go_to, mount, mount_steps, step_state};
use core_types::{BatchVersion, RootHandle, TargetId};
use runtime::{
    ApplyError, ComponentRegistry, HookPhase, NoopSink, RecordingSink, ResolverCache, RootError,
    RootEvent,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use vdom::{
    Command, Component, ComponentRef, ComponentResolver, DiffError, Event, Listener,
    NormalizeError, PropBag, RenderContext, RenderError, ResolveError, State, Template, Value,
};

fn counter(cx: &RenderContext<'_>) -> Result<Template, RenderError> {
    let count = cx.int("count").unwrap_or(0);
    let increment = Listener::new("increment", |_: &Event| {
        Some(Command::new("increment", |state: &mut State| {
            let next = state.get("count").and_then(Value::as_int).unwrap_or(0) + 1;
            state.insert("count".into(), Value::Int(next));
        }))
    });
    let button = Template::element(
        "button",
        PropBag::new().on("click", increment),
        vec!["+".into()],
    );
    let value = Template::element(
        "span",
        PropBag::new(),
        vec![Template::Scalar(Value::Int(count))],
    );
    Ok(Template::element("div", PropBag::new(), vec![button, value]))
}

fn counter_state(count: i64) -> State {
    let mut state = State::new();
    state.insert("count".into(), Value::Int(count));
    state
}

fn counter_registry() -> ComponentRegistry {
    ComponentRegistry::new().with("Counter", counter)
}

fn row(cx: &RenderContext<'_>) -> Result<Template, RenderError> {
    let label = cx.str("label").unwrap_or("").to_string();
    Ok(Template::element("li", PropBag::new(), vec![label.into()]))
}

fn list(cx: &RenderContext<'_>) -> Result<Template, RenderError> {
    let n = cx.int("rows").unwrap_or(0);
    let items = (0..n)
        .map(|i| {
            Template::component(
                &ComponentRef::new("Row"),
                PropBag::new().with("key", i).with("label", format!("row {i}")),
                Vec::new(),
            )
        })
        .collect();
    Ok(Template::element("ul", PropBag::new(), items))
}

fn list_registry() -> ComponentRegistry {
    ComponentRegistry::new().with("Row", row).with("List", list)
}

fn rows_state(n: i64) -> State {
    let mut state = State::new();
    state.insert("rows".into(), Value::Int(n));
    state
}

fn grow_to(n: i64) -> Command {
    Command::new("grow", move |state: &mut State| {
        state.insert("rows".into(), Value::Int(n));
    })
}

/// Counts every lookup that reaches the wrapped registry.
struct CountingResolver {
    inner: ComponentRegistry,
    calls: Rc<Cell<usize>>,
}

impl ComponentResolver for CountingResolver {
    fn resolve(&mut self, component: &ComponentRef) -> Result<Rc<dyn Component>, ResolveError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.resolve(component)
    }
}

#[test]
fn state_is_unavailable_before_start() {
    let (mut root, _) = mount("Counter", counter_registry(), NoopSink);
    assert!(matches!(root.state(), Err(RootError::NotReady)));
    assert!(matches!(
        root.dispatch(Command::new("noop", |_| {})),
        Err(RootError::NotReady)
    ));
    assert_eq!(root.pending(), 0);
    assert!(!root.is_ready());
}

#[test]
fn start_signals_readiness_once() {
    let (mut root, _) = mount("Counter", counter_registry(), NoopSink);
    let events = root.subscribe();
    root.start(counter_state(0)).unwrap();
    assert!(root.is_ready());
    assert_eq!(root.version(), BatchVersion(1));
    assert!(matches!(
        root.start(counter_state(5)),
        Err(RootError::AlreadyInitialized)
    ));

    let received: Vec<RootEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            RootEvent::BatchApplied {
                root: RootHandle(1),
                version: BatchVersion(1),
                patches: 2,
            },
            RootEvent::Ready { root: RootHandle(1) },
        ]
    );
}

#[test]
fn events_route_to_listeners_and_run_commands() {
    let (mut root, container) = mount("Counter", counter_registry(), NoopSink);
    root.start(counter_state(0)).unwrap();
    let button = root.backend().query_tag(container, "button")[0];
    let span = root.backend().query_tag(container, "span")[0];

    let click = Event::new("click", Value::Null);
    assert!(root.handle_event(button, &click).unwrap());
    assert!(root.handle_event(button, &click).unwrap());
    assert_eq!(root.state().unwrap().get("count"), Some(&Value::Int(2)));
    assert_eq!(root.backend().text(span), Some("2"));
    assert_eq!(root.version(), BatchVersion(3));

    let input = Event::new("input", Value::Null);
    assert!(!root.handle_event(button, &input).unwrap());
    assert!(matches!(
        root.handle_event(TargetId(999), &click),
        Err(RootError::UnknownTarget(TargetId(999)))
    ));
}

#[test]
fn reinitialize_forces_init_root_on_equal_state() {
    let (mut root, _) = mount("Counter", counter_registry(), RecordingSink::new());
    root.start(counter_state(1)).unwrap();
    root.sink_mut().take_lines();

    root.reinitialize(counter_state(1)).unwrap();
    assert_eq!(
        root.sink().lines(),
        [
            "before init-root",
            "before update-node",
            "after update-node: updated Counter",
            "after init-root: updated root",
        ]
    );
}

#[test]
fn hook_failure_poisons_the_root() {
    let sink = RecordingSink::failing_at(HookPhase::After, 0);
    let (mut root, _) = mount("Counter", counter_registry(), sink);
    let events = root.subscribe();

    let err = root.start(counter_state(0)).unwrap_err();
    assert!(matches!(err, RootError::Apply(ApplyError::Hook(_))));
    assert!(root.is_poisoned());
    assert!(matches!(
        root.dispatch(Command::new("noop", |_| {})),
        Err(RootError::Poisoned)
    ));
    assert!(matches!(
        root.reinitialize(counter_state(0)),
        Err(RootError::Poisoned)
    ));
    assert!(matches!(
        events.try_recv(),
        Ok(RootEvent::Poisoned { root: RootHandle(1), .. })
    ));
}

#[test]
fn structural_errors_leave_the_root_usable() {
    let broken = Template::List(vec![Template::Scalar(Value::Int(1))]);
    let fine = Template::element("p", PropBag::new(), vec!["ok".into()]);
    let (mut root, container) =
        mount_steps(vec![fine.clone(), broken, fine], HashMap::new(), NoopSink);
    root.start(step_state(0)).unwrap();
    let before = root.backend().render_lines(container).unwrap();

    let err = root.dispatch(go_to(1)).unwrap_err();
    assert!(matches!(
        err,
        RootError::Diff(DiffError::Normalize(NormalizeError::UnrecognizedHead { .. }))
    ));
    assert!(!root.is_poisoned());
    assert_eq!(root.backend().render_lines(container).unwrap(), before);
    assert_eq!(root.version(), BatchVersion(1));

    root.dispatch(go_to(2)).unwrap();
    assert_eq!(root.version(), BatchVersion(2));
}

#[test]
fn failed_start_never_becomes_ready() {
    let sink = RecordingSink::failing_at(HookPhase::After, 0);
    let (mut root, _) = mount("Counter", counter_registry(), sink);

    assert!(root.start(counter_state(0)).is_err());
    assert!(!root.is_ready());
    assert!(matches!(root.state(), Err(RootError::NotReady)));
    assert!(matches!(
        root.start(counter_state(0)),
        Err(RootError::Poisoned)
    ));
}

#[test]
fn plain_resolver_is_consulted_once_per_component() {
    let calls = Rc::new(Cell::new(0));
    let resolver = CountingResolver {
        inner: list_registry(),
        calls: Rc::clone(&calls),
    };
    let (mut root, container) = mount("List", resolver, NoopSink);
    root.start(rows_state(3)).unwrap();
    root.dispatch(grow_to(4)).unwrap();

    assert_eq!(root.backend().query_tag(container, "li").len(), 4);
    assert_eq!(calls.get(), 2, "one lookup each for List and Row");
}

#[test]
fn shared_resolver_cache_resolves_each_component_once() {
    let cache = Rc::new(RefCell::new(ResolverCache::new(list_registry())));

    let (mut first, _) = mount("List", Rc::clone(&cache), NoopSink);
    let (mut second, _) = mount("List", Rc::clone(&cache), NoopSink);
    first.start(rows_state(3)).unwrap();
    second.start(rows_state(5)).unwrap();
    first.dispatch(grow_to(8)).unwrap();

    assert_eq!(cache.borrow().inner_calls(), 2);
    assert_eq!(cache.borrow().cached(), 2);
}
