#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;
use vdom::{ReconcileOptions, reconcile};

fn unique(bytes: &[u8]) -> Vec<u8> {
    let mut seen = BTreeSet::new();
    bytes.iter().copied().filter(|b| seen.insert(*b)).collect()
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let source = unique(&rest[..split]);
    let target = unique(&rest[split..]);
    let favored = source.first().copied();

    let options = ReconcileOptions {
        check_duplicates: true,
        verify_moves: false,
    };
    let ops = reconcile(&source, &target, favored.as_ref(), options)
        .expect("unique keys must reconcile");

    let mut list = source.clone();
    for (i, op) in ops.iter().enumerate() {
        assert!(op.apply_to(&mut list), "op {i} out of range: {op:?}");
    }
    assert_eq!(list, target, "ops {ops:?}");
});
