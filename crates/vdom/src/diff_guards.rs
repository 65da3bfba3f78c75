use std::sync::atomic::{AtomicU64, Ordering};

static DIFF_CALLS: AtomicU64 = AtomicU64::new(0);
static RENDER_CALLS: AtomicU64 = AtomicU64::new(0);
static RESOLVE_CALLS: AtomicU64 = AtomicU64::new(0);
static NORMALIZE_CALLS: AtomicU64 = AtomicU64::new(0);
static PATCHES_EMITTED: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiffGuardCounts {
    pub diff_calls: u64,
    pub render_calls: u64,
    pub resolve_calls: u64,
    pub normalize_calls: u64,
    pub patches_emitted: u64,
}

pub fn reset() {
    DIFF_CALLS.store(0, Ordering::Relaxed);
    RENDER_CALLS.store(0, Ordering::Relaxed);
    RESOLVE_CALLS.store(0, Ordering::Relaxed);
    NORMALIZE_CALLS.store(0, Ordering::Relaxed);
    PATCHES_EMITTED.store(0, Ordering::Relaxed);
}

pub fn record_diff(patches: usize) {
    DIFF_CALLS.fetch_add(1, Ordering::Relaxed);
    PATCHES_EMITTED.fetch_add(patches as u64, Ordering::Relaxed);
}

pub fn record_render() {
    RENDER_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_resolve() {
    RESOLVE_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_normalize() {
    NORMALIZE_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn counts() -> DiffGuardCounts {
    DiffGuardCounts {
        diff_calls: DIFF_CALLS.load(Ordering::Relaxed),
        render_calls: RENDER_CALLS.load(Ordering::Relaxed),
        resolve_calls: RESOLVE_CALLS.load(Ordering::Relaxed),
        normalize_calls: NORMALIZE_CALLS.load(Ordering::Relaxed),
        patches_emitted: PATCHES_EMITTED.load(Ordering::Relaxed),
    }
}
