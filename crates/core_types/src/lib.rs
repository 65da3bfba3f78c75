//! Identifier types shared by the core and the runtime.

use std::fmt;

/// Identity of one mounted root. Roots are fully independent of each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootHandle(pub u64);

impl fmt::Display for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Opaque reference to a concrete instance owned by a backing-target adapter.
///
/// The core never interprets the value; it only hands it back to the adapter
/// that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl TargetId {
    /// Reserved sentinel for "no target". Adapters must never hand it out.
    pub const INVALID: TargetId = TargetId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Monotonic per-root batch counter.
///
/// `INITIAL` is the state before the first batch; every applied batch moves a
/// root from `v` to `v.next()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchVersion(pub u64);

impl BatchVersion {
    pub const INITIAL: BatchVersion = BatchVersion(0);

    pub fn next(self) -> Self {
        BatchVersion(self.0.saturating_add(1))
    }
}

impl fmt::Display for BatchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
