//! Mounted roots: state, command queue and the render/apply loop.
//!
//! A root renders one top-level component with its state as props. Every
//! state change goes through a `Command`; commands run serially and each one
//! is followed by a full diff/apply cycle before the next starts.
//!
//! Error policy:
//! - Diff errors (normalization, reconciliation, resolution, render) are
//!   raised before anything is mutated; the root stays usable.
//! - Apply errors (backend, tree, hooks) may leave the tree half-updated;
//!   the root is poisoned and rejects every further command.
//!
//! Every entry point takes `&mut self` and neither the backend nor the hook
//! sink holds the root, so a command cannot start while a batch is applying.

use crate::apply::{ApplyError, BatchReport, apply_batch};
use crate::backend::Backend;
use crate::hooks::{LifecycleSink, NoopSink};
use crate::resolver::ResolverCache;
use core_types::{BatchVersion, RootHandle, TargetId};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use vdom::{
    Command, ComponentDesc, ComponentRef, ComponentResolver, Content, Description, DiffConfig,
    DiffError, DiffOptions, Event, Key, NormalizeConfig, Prop, PropBag, State, VTree, diff_root,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct RootConfig {
    pub diff: DiffConfig,
    pub normalize: NormalizeConfig,
}

/// Notifications published to subscribers of a root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootEvent {
    /// The initial state was installed and the first batch applied. Sent once.
    Ready { root: RootHandle },
    BatchApplied {
        root: RootHandle,
        version: BatchVersion,
        patches: usize,
    },
    Poisoned { root: RootHandle, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RootError {
    #[error("root has not received its initial state")]
    NotReady,
    #[error("root already received its initial state")]
    AlreadyInitialized,
    #[error("root is poisoned by an earlier failed batch")]
    Poisoned,
    #[error("no live node is backed by {0}")]
    UnknownTarget(TargetId),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

pub struct Root<B: Backend, S: LifecycleSink = NoopSink> {
    handle: RootHandle,
    component: ComponentRef,
    tree: VTree,
    backend: B,
    sink: S,
    resolver: Box<dyn ComponentResolver>,
    config: RootConfig,
    state: Option<State>,
    ready: bool,
    version: BatchVersion,
    poisoned: bool,
    queue: VecDeque<Command>,
    favored: Option<Key>,
    subscribers: Vec<Sender<RootEvent>>,
}

impl<B: Backend> Root<B, NoopSink> {
    /// Binds a root to `container`. The root's placeholder target is created
    /// and attached right away; nothing renders until `start`.
    ///
    /// `resolver` is wrapped in a `ResolverCache`, so each distinct component
    /// reference reaches it at most once for the lifetime of the root.
    pub fn mount(
        handle: RootHandle,
        mut backend: B,
        container: TargetId,
        component: ComponentRef,
        resolver: impl ComponentResolver + 'static,
    ) -> Result<Self, RootError> {
        let placeholder = backend.create_placeholder();
        backend
            .append_child(container, placeholder)
            .map_err(ApplyError::from)?;
        log::debug!(target: "runtime.root", "{handle}: mounted {component} in {container}");
        Ok(Self {
            handle,
            component,
            tree: VTree::new(container, placeholder),
            backend,
            sink: NoopSink,
            resolver: Box::new(ResolverCache::new(resolver)),
            config: RootConfig::default(),
            state: None,
            ready: false,
            version: BatchVersion::INITIAL,
            poisoned: false,
            queue: VecDeque::new(),
            favored: None,
            subscribers: Vec::new(),
        })
    }
}

impl<B: Backend, S: LifecycleSink> Root<B, S> {
    pub fn with_sink<T: LifecycleSink>(self, sink: T) -> Root<B, T> {
        Root {
            handle: self.handle,
            component: self.component,
            tree: self.tree,
            backend: self.backend,
            sink,
            resolver: self.resolver,
            config: self.config,
            state: self.state,
            ready: self.ready,
            version: self.version,
            poisoned: self.poisoned,
            queue: self.queue,
            favored: self.favored,
            subscribers: self.subscribers,
        }
    }

    pub fn with_config(mut self, config: RootConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handle(&self) -> RootHandle {
        self.handle
    }

    pub fn version(&self) -> BatchVersion {
        self.version
    }

    pub fn tree(&self) -> &VTree {
        &self.tree
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// True once the first batch has applied.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Commands waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Receiver for this root's notifications from now on.
    pub fn subscribe(&mut self) -> Receiver<RootEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Key whose position child-list reorders should keep stable.
    pub fn set_favored_key(&mut self, key: Option<Key>) {
        self.favored = key;
    }

    pub fn state(&self) -> Result<&State, RootError> {
        match &self.state {
            Some(state) if self.ready => Ok(state),
            _ => Err(RootError::NotReady),
        }
    }

    /// Installs the initial state and renders for the first time.
    pub fn start(&mut self, initial: State) -> Result<BatchReport, RootError> {
        self.check_usable()?;
        if self.ready {
            return Err(RootError::AlreadyInitialized);
        }
        self.state = Some(initial);
        let report = match self.render(false) {
            Ok(report) => report,
            Err(err) => {
                self.state = None;
                return Err(err);
            }
        };
        self.ready = true;
        log::info!(target: "runtime.root", "{}: ready", self.handle);
        self.publish(RootEvent::Ready { root: self.handle });
        Ok(report)
    }

    /// Replaces the state and re-renders with a forced `InitRoot`, even when
    /// the resulting description is unchanged.
    pub fn reinitialize(&mut self, state: State) -> Result<BatchReport, RootError> {
        self.check_usable()?;
        if !self.ready {
            return Err(RootError::NotReady);
        }
        self.state = Some(state);
        self.render(true)
    }

    /// Queues `command` and runs the queue to completion.
    pub fn dispatch(&mut self, command: Command) -> Result<(), RootError> {
        self.check_usable()?;
        if !self.ready {
            return Err(RootError::NotReady);
        }
        self.enqueue(command)?;
        self.flush()
    }

    /// Queues `command` without running it.
    pub fn enqueue(&mut self, command: Command) -> Result<(), RootError> {
        if self.poisoned {
            return Err(RootError::Poisoned);
        }
        self.queue.push_back(command);
        Ok(())
    }

    /// Runs queued commands one at a time, rendering after each. Stops at
    /// the first failure; commands queued behind it stay queued.
    pub fn flush(&mut self) -> Result<(), RootError> {
        self.check_usable()?;
        if !self.ready {
            return Err(RootError::NotReady);
        }
        while let Some(command) = self.queue.pop_front() {
            log::debug!(target: "runtime.root", "{}: run {}", self.handle, command.label());
            if let Some(state) = self.state.as_mut() {
                command.run(state);
            }
            self.render(false)?;
        }
        Ok(())
    }

    /// Routes a backend event to the listener bound on `target` and runs the
    /// command it produces. Returns whether a listener was found.
    pub fn handle_event(&mut self, target: TargetId, event: &Event) -> Result<bool, RootError> {
        self.check_usable()?;
        if !self.ready {
            return Err(RootError::NotReady);
        }
        let node = self
            .tree
            .node_for_target(target)
            .ok_or(RootError::UnknownTarget(target))?;
        let Some(Description::Element(desc)) = self.tree.description(node) else {
            return Ok(false);
        };
        let Some(listener) = desc.listener(&event.name) else {
            log::trace!(
                target: "runtime.root",
                "{}: no {} listener on {target}",
                self.handle,
                event.name
            );
            return Ok(false);
        };
        if let Some(command) = listener.invoke(event) {
            self.dispatch(command)?;
        }
        Ok(true)
    }

    fn check_usable(&self) -> Result<(), RootError> {
        if self.poisoned {
            return Err(RootError::Poisoned);
        }
        Ok(())
    }

    fn description(&self) -> Result<Description, RootError> {
        let state = self.state.as_ref().ok_or(RootError::NotReady)?;
        let props: PropBag = state
            .iter()
            .map(|(name, value)| (name.clone(), Prop::Value(value.clone())))
            .collect();
        Ok(Description::from(ComponentDesc {
            component: self.component.clone(),
            key: None,
            props,
            content: Content::Empty,
        }))
    }

    fn render(&mut self, force: bool) -> Result<BatchReport, RootError> {
        let next = self.description()?;
        let patches = diff_root(
            &self.tree,
            Some(&next),
            &mut self.resolver,
            &self.config.diff,
            &self.config.normalize,
            DiffOptions {
                force,
                favored: self.favored.as_ref(),
            },
        )
        .inspect_err(|err| {
            log::warn!(target: "runtime.root", "{}: diff failed: {err}", self.handle);
        })?;

        match apply_batch(&mut self.tree, &mut self.backend, &mut self.sink, &patches) {
            Ok(report) => {
                self.version = self.version.next();
                log::debug!(
                    target: "runtime.root",
                    "{}: {} applied {} patches",
                    self.handle,
                    self.version,
                    report.patches
                );
                self.publish(RootEvent::BatchApplied {
                    root: self.handle,
                    version: self.version,
                    patches: report.patches,
                });
                Ok(report)
            }
            Err(err) => {
                self.poisoned = true;
                self.queue.clear();
                log::error!(target: "runtime.root", "{}: poisoned: {err}", self.handle);
                self.publish(RootEvent::Poisoned {
                    root: self.handle,
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    fn publish(&mut self, event: RootEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
