pub mod apply;
pub mod backend;
pub mod hooks;
pub mod resolver;
pub mod root;

pub use crate::apply::{ApplyError, BatchReport, apply_batch};
pub use crate::backend::{Backend, BackendError, MemoryBackend};
pub use crate::hooks::{HookError, HookPhase, LifecycleSink, NodeEvent, NoopSink, RecordingSink};
pub use crate::resolver::{ComponentRegistry, ResolverCache};
pub use crate::root::{Root, RootConfig, RootError, RootEvent};
pub use vdom::{Component, ComponentResolver, ResolveError};
