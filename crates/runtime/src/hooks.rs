//! Lifecycle hook sink.
//!
//! The applier calls `before_patch` for every patch of a batch in forward
//! order before touching anything, then applies the batch, then calls
//! `after_patch` in reverse order with the lifecycle events each patch
//! caused. Within one patch, events are ordered children before parents; a
//! replacement reports the new subtree before the teardown of the old one.

use std::fmt;
use vdom::{Lifecycle, NodeId, Patch};

/// One lifecycle transition observed while applying a patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: NodeId,
    pub kind: Lifecycle,
    /// Tag, component name, `root` or `placeholder`, plus `#key` when keyed.
    pub label: String,
}

impl fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("lifecycle hook failed: {message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait LifecycleSink {
    fn before_patch(&mut self, _index: usize, _patch: &Patch) -> Result<(), HookError> {
        Ok(())
    }

    fn after_patch(
        &mut self,
        _index: usize,
        _patch: &Patch,
        _events: &[NodeEvent],
    ) -> Result<(), HookError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl LifecycleSink for NoopSink {}

impl<S: LifecycleSink + ?Sized> LifecycleSink for Box<S> {
    fn before_patch(&mut self, index: usize, patch: &Patch) -> Result<(), HookError> {
        (**self).before_patch(index, patch)
    }

    fn after_patch(
        &mut self,
        index: usize,
        patch: &Patch,
        events: &[NodeEvent],
    ) -> Result<(), HookError> {
        (**self).after_patch(index, patch, events)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

/// Sink that records one line per hook call, e.g.
/// `after replace-child: attached span#row-1, detached div#row-1`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Vec<String>,
    fail_at: Option<(HookPhase, usize)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the hook call for patch `index` in `phase` fail.
    pub fn failing_at(phase: HookPhase, index: usize) -> Self {
        Self {
            lines: Vec::new(),
            fail_at: Some((phase, index)),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    fn check(&self, phase: HookPhase, index: usize, patch: &Patch) -> Result<(), HookError> {
        if self.fail_at == Some((phase, index)) {
            return Err(HookError::new(format!(
                "injected failure at {} #{index}",
                patch.kind()
            )));
        }
        Ok(())
    }
}

impl LifecycleSink for RecordingSink {
    fn before_patch(&mut self, index: usize, patch: &Patch) -> Result<(), HookError> {
        self.check(HookPhase::Before, index, patch)?;
        self.lines.push(format!("before {}", patch.kind()));
        Ok(())
    }

    fn after_patch(
        &mut self,
        index: usize,
        patch: &Patch,
        events: &[NodeEvent],
    ) -> Result<(), HookError> {
        self.check(HookPhase::After, index, patch)?;
        let mut line = format!("after {}", patch.kind());
        if !events.is_empty() {
            line.push_str(": ");
            let events: Vec<String> = events.iter().map(ToString::to_string).collect();
            line.push_str(&events.join(", "));
        }
        self.lines.push(line);
        Ok(())
    }
}
