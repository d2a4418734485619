//! The subsumption order over resource trees.
//!
//! `general` subsumes `specific` when there is a label-preserving embedding
//! of `general` into `specific`: the root data unifies, and every branch of
//! `general` is matched by some branch of `specific` whose edge unifies and
//! whose child is itself subsumed. Branches of `general` may share a target
//! branch in `specific` (homomorphism, not bijection).

use crate::tree::ResourceTree;
use std::collections::HashMap;

/// Memoizing subsumption test over a fixed pair of tree families.
///
/// Results are cached by node address, so the checker borrows every tree it
/// has seen for `'a`. Create one checker per batch of related tests.
#[derive(Debug, Default)]
pub struct SubsumptionChecker<'a> {
    memo: HashMap<(usize, usize), bool>,
    _trees: std::marker::PhantomData<&'a ResourceTree>,
}

impl<'a> SubsumptionChecker<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subsumes(&mut self, general: &'a ResourceTree, specific: &'a ResourceTree) -> bool {
        let key = (
            general as *const ResourceTree as usize,
            specific as *const ResourceTree as usize,
        );
        if let Some(&cached) = self.memo.get(&key) {
            return cached;
        }
        let result = self.compute(general, specific);
        self.memo.insert(key, result);
        result
    }

    pub fn equivalent(&mut self, a: &'a ResourceTree, b: &'a ResourceTree) -> bool {
        self.subsumes(a, b) && self.subsumes(b, a)
    }

    pub fn cache_len(&self) -> usize {
        self.memo.len()
    }

    fn compute(&mut self, general: &'a ResourceTree, specific: &'a ResourceTree) -> bool {
        if !general.data().unifies_with(specific.data()) {
            return false;
        }
        for (g_edge, g_child) in general.branches() {
            let mut matched = false;
            for (s_edge, s_child) in specific.branches() {
                if g_edge.unifies_with(s_edge) && self.subsumes(g_child, s_child) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return false;
            }
        }
        true
    }
}

/// One-shot subsumption test.
pub fn subsumes(general: &ResourceTree, specific: &ResourceTree) -> bool {
    SubsumptionChecker::new().subsumes(general, specific)
}

/// Mutual subsumption: both trees describe the same set of resources.
pub fn equivalent(a: &ResourceTree, b: &ResourceTree) -> bool {
    let mut checker = SubsumptionChecker::new();
    checker.equivalent(a, b)
}
