#![cfg(test)]

// Property tests for Table kept inside the crate so they can lean on
// `debug_validate` after every step without a feature gate.

use crate::hooks::Hooks;
use crate::table::{EntryRef, Table};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use std::rc::Rc;

// Pool-indexed operations: indices shrink to earlier keys, the pool shrinks,
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Put(usize, i32),
    Delete(usize),
    RemoveKey(usize),
    Get(usize),
    Mutate(usize, i32),
    Rehash(usize),
    Forward,
    Backward,
    DeleteWhileTraversing(usize),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            8 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Put(i, v)),
            3 => idx.clone().prop_map(Op::Delete),
            2 => idx.clone().prop_map(Op::RemoveKey),
            3 => idx.clone().prop_map(Op::Get),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (1usize..24).prop_map(Op::Rehash),
            2 => Just(Op::Forward),
            2 => Just(Op::Backward),
            1 => (0usize..4).prop_map(Op::DeleteWhileTraversing),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn walk_forward<H: Hooks<String, i32>>(t: &Table<String, i32, H>) -> Vec<EntryRef> {
    let mut out = Vec::new();
    let mut cursor = t.first();
    while let Some(e) = cursor {
        out.push(e);
        cursor = t.next(e);
    }
    out
}

fn walk_backward<H: Hooks<String, i32>>(t: &Table<String, i32, H>) -> Vec<EntryRef> {
    let mut out = Vec::new();
    let mut cursor = t.last();
    while let Some(e) = cursor {
        out.push(e);
        cursor = t.prev(e);
    }
    out.reverse();
    out
}

// State-machine equivalence against std::collections::HashMap:
// - put returns the tracked handle for existing keys, a fresh one otherwise;
// - delete/remove invalidate exactly one handle and shrink len by one;
// - rehash (explicit, including shrinking, or automatic) never changes a
//   live handle;
// - traversal in both directions visits each live entry exactly once;
// - on_remove fires once per overwrite, delete and cleared entry;
// - the linked structure validates after every step.
fn run_scenario<H>(
    mut sut: Table<String, i32, H>,
    removals: &Cell<usize>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    H: Hooks<String, i32, Key = str>,
{
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, EntryRef> = HashMap::new();
    let mut stale: Vec<EntryRef> = Vec::new();
    let mut expected_removals = 0usize;

    for op in ops {
        match op {
            Op::Put(i, v) => {
                let k = pool[i].clone();
                let h = sut.put(k.clone(), v).expect("small tables always grow");
                if let Some(&prev) = live.get(&k) {
                    prop_assert_eq!(h, prev, "overwrite must keep the handle");
                    expected_removals += 1;
                } else {
                    live.insert(k.clone(), h);
                }
                model.insert(k, v);
            }
            Op::Delete(i) => {
                let k = &pool[i];
                if let Some(h) = live.remove(k) {
                    let before = sut.len();
                    prop_assert!(sut.delete(h));
                    prop_assert_eq!(sut.len(), before - 1);
                    prop_assert!(sut.get(k).is_none());
                    model.remove(k);
                    stale.push(h);
                    expected_removals += 1;
                } else {
                    prop_assert!(sut.get(k).is_none());
                }
            }
            Op::RemoveKey(i) => {
                let k = &pool[i];
                let had = model.remove(k).is_some();
                prop_assert_eq!(sut.remove(k), had);
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                    expected_removals += 1;
                }
            }
            Op::Get(i) => {
                let k = &pool[i];
                let found = sut.get(k);
                prop_assert_eq!(found, live.get(k).copied());
                if let Some(h) = found {
                    prop_assert_eq!(h.value(&sut), model.get(k));
                    prop_assert_eq!(h.key(&sut).map(String::as_str), Some(k.as_str()));
                }
            }
            Op::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    let vr = h.value_mut(&mut sut).expect("live handle resolves");
                    *vr = vr.wrapping_add(d);
                    let mv = model.get_mut(k).expect("present in model");
                    *mv = mv.wrapping_add(d);
                }
            }
            Op::Rehash(cap) => {
                sut.rehash(cap).expect("small rehash succeeds");
                prop_assert_eq!(sut.capacity(), cap);
            }
            Op::Forward => {
                let order = walk_forward(&sut);
                let set: BTreeSet<_> = order.iter().map(|h| h.key(&sut).cloned()).collect();
                prop_assert_eq!(order.len(), sut.len());
                prop_assert_eq!(set.len(), sut.len(), "duplicate visit");
                let via_iter: Vec<EntryRef> = sut.iter().map(|(h, _, _)| h).collect();
                prop_assert_eq!(&via_iter, &order);
            }
            Op::Backward => {
                prop_assert_eq!(walk_backward(&sut), walk_forward(&sut));
            }
            Op::DeleteWhileTraversing(every) => {
                // Delete every `every + 1`-th visited entry from inside the walk.
                let mut n = 0usize;
                let mut visited = 0usize;
                let mut deleted: Vec<EntryRef> = Vec::new();
                let flow: ControlFlow<()> = sut.traverse(|t, h| {
                    visited += 1;
                    if n % (every + 1) == 0 {
                        assert!(t.delete(h));
                        deleted.push(h);
                    }
                    n += 1;
                    ControlFlow::Continue(())
                });
                prop_assert_eq!(flow, ControlFlow::Continue(()));
                prop_assert_eq!(visited, model.len(), "traverse must visit every entry");
                for h in deleted {
                    let k = live
                        .iter()
                        .find(|(_, lh)| **lh == h)
                        .map(|(k, _)| k.clone())
                        .expect("deleted handle was live");
                    live.remove(&k);
                    model.remove(&k);
                    stale.push(h);
                    expected_removals += 1;
                }
            }
            Op::Clear => {
                expected_removals += model.len();
                stale.extend(live.drain().map(|(_, h)| h));
                model.clear();
                let cap = sut.capacity();
                sut.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
        }

        sut.debug_validate();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert_eq!(removals.get(), expected_removals);
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        for (k, &h) in &live {
            prop_assert_eq!(h.value(&sut), model.get(k));
        }
    }

    let remaining = sut.len();
    drop(sut);
    prop_assert_eq!(removals.get(), expected_removals + remaining);
    Ok(())
}

// Every key lands in one bucket: stresses chain linking and equality.
struct OneBucket {
    removals: Rc<Cell<usize>>,
}

impl Hooks<String, i32> for OneBucket {
    type Key = str;

    fn hash(&self, _key: &str) -> u64 {
        0
    }

    fn equals(&self, stored: &str, probe: &str) -> bool {
        stored == probe
    }

    fn on_remove(&mut self, _key: String, _value: i32) {
        self.removals.set(self.removals.get() + 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let removals = Rc::new(Cell::new(0usize));
        let sink = removals.clone();
        let sut = Table::with_str_keys(1, move |_k: String, _v: i32| sink.set(sink.get() + 1))
            .expect("capacity 1 is valid");
        run_scenario(sut, &removals, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_single_bucket((pool, ops) in arb_scenario()) {
        let removals = Rc::new(Cell::new(0usize));
        let sut = Table::new(2, OneBucket { removals: removals.clone() })
            .expect("capacity 2 is valid");
        run_scenario(sut, &removals, &pool, ops)?;
    }
}
