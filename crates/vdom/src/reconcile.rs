//! Keyed reconciliation of two ordered key sequences.
//!
//! Contract:
//! - Phase 1 reconciles the key sets: removals are emitted in descending
//!   source-index order, then insertions in ascending target-index order.
//! - Phase 2 reorders the surviving keys. Both a left-to-right and a
//!   right-to-left placement pass are computed; the forward list wins unless
//!   the reverse list is no longer and leaves the favored key in place.
//! - Every operation index is valid against the list as transformed by all
//!   preceding operations (see `MoveOp::apply_to`).
//! - No insertion is emitted for a key absent from the target, and no move is
//!   emitted once the order already matches.

use std::fmt::Debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOp<K> {
    Insert { key: K, index: usize },
    Move { key: K, from: usize, to: usize },
    Remove { key: K, index: usize },
}

impl<K: Clone + PartialEq> MoveOp<K> {
    pub fn key(&self) -> &K {
        match self {
            MoveOp::Insert { key, .. } | MoveOp::Move { key, .. } | MoveOp::Remove { key, .. } => {
                key
            }
        }
    }

    /// Pure transformation of a logical key-order list.
    ///
    /// Out-of-range indices leave the list unchanged and return `false`.
    pub fn apply_to(&self, list: &mut Vec<K>) -> bool {
        match self {
            MoveOp::Insert { key, index } => {
                if *index > list.len() {
                    return false;
                }
                list.insert(*index, key.clone());
            }
            MoveOp::Move { key, from, to } => {
                if *from >= list.len() || *to >= list.len() || list[*from] != *key {
                    return false;
                }
                let moved = list.remove(*from);
                list.insert(*to, moved);
            }
            MoveOp::Remove { key, index } => {
                if *index >= list.len() || list[*index] != *key {
                    return false;
                }
                list.remove(*index);
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReconcileOptions {
    /// Fail on a key repeated within either sequence.
    pub check_duplicates: bool,
    /// Replay the emitted operations against the source and compare.
    pub verify_moves: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            check_duplicates: cfg!(debug_assertions),
            verify_moves: cfg!(debug_assertions),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("duplicate key {key} in {side} sequence")]
    DuplicateKey { key: String, side: &'static str },
    #[error("move list does not transform source into target (stopped at op {at})")]
    Diverged { at: usize },
}

pub fn reconcile<K>(
    source: &[K],
    target: &[K],
    favored: Option<&K>,
    options: ReconcileOptions,
) -> Result<Vec<MoveOp<K>>, ReconcileError>
where
    K: Ord + Clone + Debug,
{
    let mut sorted_source: Vec<(&K, usize)> = source.iter().zip(0..).collect();
    let mut sorted_target: Vec<(&K, usize)> = target.iter().zip(0..).collect();
    sorted_source.sort();
    sorted_target.sort();
    if options.check_duplicates {
        check_duplicates(&sorted_source, "source")?;
        check_duplicates(&sorted_target, "target")?;
    }

    // Merge-walk the sorted sequences.
    let mut removed = Vec::new();
    let mut inserted = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < sorted_source.len() || j < sorted_target.len() {
        match (sorted_source.get(i), sorted_target.get(j)) {
            (Some(&(s, si)), Some(&(t, tj))) => match s.cmp(t) {
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    removed.push(si);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    inserted.push(tj);
                    j += 1;
                }
            },
            (Some(&(_, si)), None) => {
                removed.push(si);
                i += 1;
            }
            (None, Some(&(_, tj))) => {
                inserted.push(tj);
                j += 1;
            }
            (None, None) => break,
        }
    }
    removed.sort_unstable_by(|a, b| b.cmp(a));
    inserted.sort_unstable();

    let mut ops = Vec::with_capacity(removed.len() + inserted.len());
    let mut working = source.to_vec();
    for index in removed {
        let key = working.remove(index);
        ops.push(MoveOp::Remove { key, index });
    }
    for index in inserted {
        let index_in_working = index.min(working.len());
        let key = target[index].clone();
        working.insert(index_in_working, key.clone());
        ops.push(MoveOp::Insert {
            key,
            index: index_in_working,
        });
    }

    if working.as_slice() != target {
        let mut forward_list = working.clone();
        let forward = forward_moves(&mut forward_list, target);
        let mut reverse_list = working;
        let reverse = reverse_moves(&mut reverse_list, target);
        let reverse_moves_favored =
            favored.is_some_and(|fav| reverse.iter().any(|op| op.key() == fav));
        let use_reverse =
            forward.len() > 1 && reverse.len() <= forward.len() && !reverse_moves_favored;
        log::trace!(
            target: "vdom.reconcile",
            "reorder: forward={} reverse={} favored={favored:?} -> {}",
            forward.len(),
            reverse.len(),
            if use_reverse { "reverse" } else { "forward" }
        );
        ops.extend(if use_reverse { reverse } else { forward });
    }

    if options.verify_moves || cfg!(feature = "reconcile-invariants") {
        verify(source, target, &ops)?;
    }
    Ok(ops)
}

fn check_duplicates<K: Ord + Debug>(
    sorted: &[(&K, usize)],
    side: &'static str,
) -> Result<(), ReconcileError> {
    match sorted.windows(2).find(|w| w[0].0 == w[1].0) {
        Some(w) => Err(ReconcileError::DuplicateKey {
            key: format!("{:?}", w[0].0),
            side,
        }),
        None => Ok(()),
    }
}

/// Left to right: pull each out-of-place target item back into its slot.
fn forward_moves<K: PartialEq + Clone>(list: &mut Vec<K>, target: &[K]) -> Vec<MoveOp<K>> {
    let mut ops = Vec::new();
    for i in 0..target.len().min(list.len()) {
        if list[i] == target[i] {
            continue;
        }
        let Some(offset) = list[i + 1..].iter().position(|k| *k == target[i]) else {
            continue;
        };
        let from = i + 1 + offset;
        let key = list.remove(from);
        list.insert(i, key.clone());
        ops.push(MoveOp::Move { key, from, to: i });
    }
    ops
}

/// Right to left: push each out-of-place target item forward into its slot.
fn reverse_moves<K: PartialEq + Clone>(list: &mut Vec<K>, target: &[K]) -> Vec<MoveOp<K>> {
    let mut ops = Vec::new();
    for i in (0..target.len().min(list.len())).rev() {
        if list[i] == target[i] {
            continue;
        }
        let Some(from) = list[..i].iter().rposition(|k| *k == target[i]) else {
            continue;
        };
        let key = list.remove(from);
        list.insert(i, key.clone());
        ops.push(MoveOp::Move { key, from, to: i });
    }
    ops
}

fn verify<K: Clone + PartialEq + Debug>(
    source: &[K],
    target: &[K],
    ops: &[MoveOp<K>],
) -> Result<(), ReconcileError> {
    let mut list = source.to_vec();
    for (at, op) in ops.iter().enumerate() {
        if !op.apply_to(&mut list) {
            debug_assert!(false, "move op {op:?} invalid against {list:?}");
            return Err(ReconcileError::Diverged { at });
        }
    }
    if list.as_slice() != target {
        debug_assert!(false, "move list produced {list:?}, expected {target:?}");
        return Err(ReconcileError::Diverged { at: ops.len() });
    }
    Ok(())
}
