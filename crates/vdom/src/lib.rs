pub mod allow_list;
pub mod component;
pub mod debug;
pub mod diff;
#[cfg(feature = "diff-guards")]
pub mod diff_guards;
pub mod patch;
pub mod reconcile;
#[cfg(any(test, feature = "tree-snapshot"))]
pub mod snapshot;
pub mod template;
pub mod tree;

mod types;

pub use crate::component::{
    Component, ComponentResolver, RenderContext, RenderError, ResolveError,
};
pub use crate::diff::{DiffConfig, DiffError, DiffOptions, build_blueprint, diff_root};
pub use crate::patch::{Blueprint, Patch, PatchFamily};
pub use crate::reconcile::{MoveOp, ReconcileError, ReconcileOptions, reconcile};
pub use crate::template::{NormalizeConfig, NormalizeError, Template, normalize, value_map};
pub use crate::tree::{Lifecycle, NodeId, TreeError, VTree};
pub use crate::types::{
    Command, ComponentDesc, ComponentRef, Content, CustomProps, Description, ElementDesc, Event,
    Handler, Key, Listener, ListenerId, Name, Prop, PropBag, State, Value,
};

#[cfg(feature = "internal-api")]
pub mod internal {
    pub use super::tree::{NodeKind, VNode};
}
