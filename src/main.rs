use core_types::{RootHandle, TargetId};
use mimalloc::MiMalloc;
use runtime::{ComponentRegistry, MemoryBackend, RecordingSink, Root, RootError, RootEvent};
use std::error::Error;
use vdom::debug::outline_from_tree;
use vdom::{
    Command, ComponentRef, Event, Listener, PropBag, RenderContext, RenderError, State, Template,
    Value, value_map,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OUTLINE_CAP: usize = 64;

type DemoRoot = Root<MemoryBackend, RecordingSink>;

fn row(cx: &RenderContext<'_>) -> Result<Template, RenderError> {
    let id = cx.int("id").unwrap_or(0);
    let remove = Listener::new(format!("remove-{id}"), move |_: &Event| {
        Some(Command::new("remove", move |state: &mut State| {
            let rows = row_ids(state).into_iter().filter(|r| *r != id).collect();
            set_rows(state, rows);
        }))
    });
    Ok(Template::element(
        "li",
        PropBag::new()
            .with("class", "row")
            .with("dataset", value_map([("id", Value::Int(id))])),
        vec![
            Template::element("span", PropBag::new(), vec![Template::text(format!("row {id}"))]),
            Template::element("button", PropBag::new().on("click", remove), vec!["x".into()]),
        ],
    ))
}

fn rows(cx: &RenderContext<'_>) -> Result<Template, RenderError> {
    let ids = cx.value("rows").and_then(Value::as_list).unwrap_or_default();
    let items = ids
        .iter()
        .filter_map(Value::as_int)
        .map(|id| {
            Template::component(
                &ComponentRef::new("Row"),
                PropBag::new().with("key", id).with("id", id),
                Vec::new(),
            )
        })
        .collect();
    Ok(Template::element("ul", PropBag::new().with("class", "rows"), items))
}

fn row_ids(state: &State) -> Vec<i64> {
    state
        .get("rows")
        .and_then(Value::as_list)
        .map(|ids| ids.iter().filter_map(Value::as_int).collect())
        .unwrap_or_default()
}

fn set_rows(state: &mut State, ids: Vec<i64>) {
    let ids = ids.into_iter().map(Value::Int).collect::<Vec<_>>();
    state.insert("rows".into(), Value::from(ids));
}

fn rows_state(ids: &[i64]) -> State {
    let mut state = State::new();
    set_rows(&mut state, ids.to_vec());
    state
}

fn append(id: i64) -> Command {
    Command::new("append", move |state: &mut State| {
        let mut ids = row_ids(state);
        ids.push(id);
        set_rows(state, ids);
    })
}

fn rotate() -> Command {
    Command::new("rotate", |state: &mut State| {
        let mut ids = row_ids(state);
        ids.rotate_right(1);
        set_rows(state, ids);
    })
}

/// Mounts the row list into a fresh container. Nothing renders until `start`.
fn mount_rows() -> Result<(DemoRoot, TargetId), RootError> {
    let registry = ComponentRegistry::new().with("Row", row).with("Rows", rows);
    let mut backend = MemoryBackend::new();
    let container = backend.create_container();
    let root = Root::mount(
        RootHandle(1),
        backend,
        container,
        ComponentRef::new("Rows"),
        registry,
    )?
    .with_sink(RecordingSink::new());
    Ok((root, container))
}

/// Clicks the remove button of the `index`th rendered row.
fn click_remove(root: &mut DemoRoot, container: TargetId, index: usize) -> Result<bool, RootError> {
    let buttons = root.backend().query_tag(container, "button");
    match buttons.get(index) {
        Some(&button) => root.handle_event(button, &Event::new("click", Value::Null)),
        None => Ok(false),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let (mut root, container) = mount_rows()?;
    let events = root.subscribe();
    root.start(rows_state(&[1, 2, 3]))?;
    root.dispatch(append(4))?;
    root.dispatch(rotate())?;
    click_remove(&mut root, container, 1)?;

    for line in root.sink_mut().take_lines() {
        log::debug!(target: "arbor", "hook: {line}");
    }
    for event in events.try_iter() {
        if let RootEvent::BatchApplied { version, patches, .. } = event {
            log::info!(target: "arbor", "{version}: {patches} patches");
        }
    }
    for line in outline_from_tree(root.tree(), OUTLINE_CAP) {
        log::info!(target: "arbor", "tree {line}");
    }
    for line in root.backend().render_lines(container)? {
        log::info!(target: "arbor", "host {line}");
    }
    Ok(())
}
