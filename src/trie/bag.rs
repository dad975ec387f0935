//------------ Bag -----------------------------------------------------------
//
// Small branching node: up to MAX_BAG_SIZE children kept as two parallel
// arrays, `crit` sorted ascending. Small enough that a linear scan with an
// early exit beats binary search.

use std::sync::Arc;

use super::expanse::Expanse;
use super::leaf::Leaf;
use super::{Node, MAX_BAG_SIZE};

#[derive(Clone, Debug)]
pub(crate) struct Bag<V> {
    pub(crate) key: Box<[u8]>,
    pub(crate) val: Option<V>,
    pub(crate) count: usize,
    pub(crate) crit: Vec<u8>,
    pub(crate) sub: Vec<Arc<Node<V>>>,
}

impl<V> Bag<V> {
    // Position of `cb`, or the sorted insertion point for it.
    pub(crate) fn find(&self, cb: u8) -> (usize, bool) {
        for (i, &c) in self.crit.iter().enumerate() {
            if cb < c {
                return (i, false);
            }
            if cb == c {
                return (i, true);
            }
        }
        (self.crit.len(), false)
    }

    pub(crate) fn expanse(&self) -> Expanse {
        Expanse::new(self.crit[0], self.crit[self.crit.len() - 1])
    }

    pub(crate) fn expanse_without(&self, cb: u8) -> Expanse {
        debug_assert!(!self.sub.is_empty(), "bag cannot be empty");
        let last = self.crit.len() - 1;
        if last > 0 {
            if cb == self.crit[0] {
                return Expanse::new(self.crit[1], self.crit[last]);
            }
            if cb == self.crit[last] {
                return Expanse::new(self.crit[0], self.crit[last - 1]);
            }
        } else if cb == self.crit[0] {
            return Expanse::empty();
        }
        self.expanse()
    }

    pub(crate) fn child_at(&self, cb: u8) -> Option<&Node<V>> {
        let (i, found) = self.find(cb);
        if found {
            Some(&self.sub[i])
        } else {
            None
        }
    }

    pub(crate) fn child_at_or_after(&self, from: u16) -> Option<(u8, &Node<V>)> {
        self.crit
            .iter()
            .position(|&c| c as u16 >= from)
            .map(|i| (self.crit[i], &*self.sub[i]))
    }

    pub(crate) fn for_subs_in_range<F>(&self, start: u16, end: u16, f: &mut F)
    where
        F: FnMut(u8, &Arc<Node<V>>),
    {
        for (i, &c) in self.crit.iter().enumerate() {
            if (c as u16) < start {
                continue;
            }
            if c as u16 >= end {
                break;
            }
            f(c, &self.sub[i]);
        }
    }
}

impl<V: Clone> Bag<V> {
    // Single-child bag; always carries a value, otherwise it would have to
    // be collapsed into its child on the spot.
    pub(crate) fn new1(key: &[u8], val: V, cb: u8, sub: Node<V>) -> Self {
        let count = 1 + sub.count();
        Bag {
            key: key.into(),
            val: Some(val),
            count,
            crit: vec![cb],
            sub: vec![Arc::new(sub)],
        }
    }

    // Two-child bag produced by a prefix split; holds no value of its own.
    pub(crate) fn new2(key: &[u8], cb0: u8, sub0: Node<V>, cb1: u8, sub1: Node<V>) -> Self {
        debug_assert!(cb0 != cb1, "split children must diverge");
        let (cb0, sub0, cb1, sub1) = if cb1 < cb0 {
            (cb1, sub1, cb0, sub0)
        } else {
            (cb0, sub0, cb1, sub1)
        };
        let count = sub0.count() + sub1.count();
        Bag {
            key: key.into(),
            val: None,
            count,
            crit: vec![cb0, cb1],
            sub: vec![Arc::new(sub0), Arc::new(sub1)],
        }
    }

    // Rebuild from `t` plus one new sub-trie at `cb`. The caller guarantees
    // `t` has no child there and that the result still fits a bag.
    pub(crate) fn from_grown(t: &Node<V>, cb: u8, sub: Arc<Node<V>>) -> Self {
        let size = t.occupied() + 1;
        assert!(size <= MAX_BAG_SIZE, "bag overflow past {} children", MAX_BAG_SIZE);
        let mut crit = Vec::with_capacity(size);
        let mut subs = Vec::with_capacity(size);
        t.for_subs_in_range(0, cb as u16, &mut |c, s| {
            crit.push(c);
            subs.push(Arc::clone(s));
        });
        crit.push(cb);
        subs.push(sub);
        t.for_subs_in_range(cb as u16 + 1, 256, &mut |c, s| {
            crit.push(c);
            subs.push(Arc::clone(s));
        });
        Bag {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() + 1,
            crit,
            sub: subs,
        }
    }

    // Rebuild from `t` minus the sub-trie at `without`, which is known to
    // have been a single-entry leaf.
    pub(crate) fn from_shrunk(t: &Node<V>, e: Expanse, without: u8) -> Self {
        let size = t.occupied() - 1;
        let mut crit = Vec::with_capacity(size);
        let mut subs = Vec::with_capacity(size);
        t.for_subs_in_range(e.low as u16, without as u16, &mut |c, s| {
            crit.push(c);
            subs.push(Arc::clone(s));
        });
        t.for_subs_in_range(without as u16 + 1, e.high as u16 + 1, &mut |c, s| {
            crit.push(c);
            subs.push(Arc::clone(s));
        });
        Bag {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() - 1,
            crit,
            sub: subs,
        }
    }

    // Splice a new or rebuilt child in; everything else is shared.
    pub(crate) fn assoc_child(
        &self,
        i: usize,
        found: bool,
        cb: u8,
        rest: &[u8],
        val: V,
    ) -> (Node<V>, usize) {
        let mut crit = self.crit.clone();
        let mut sub = self.sub.clone();
        let added = if found {
            let (n, added) = sub[i].assoc(rest, val);
            sub[i] = Arc::new(n);
            added
        } else {
            assert!(sub.len() < MAX_BAG_SIZE, "bag overflow past {} children", MAX_BAG_SIZE);
            crit.insert(i, cb);
            sub.insert(i, Arc::new(Node::Leaf(Leaf::new(rest, val))));
            1
        };
        (
            Node::Bag(Bag {
                key: self.key.clone(),
                val: self.val.clone(),
                count: self.count + added,
                crit,
                sub,
            }),
            added,
        )
    }
}
