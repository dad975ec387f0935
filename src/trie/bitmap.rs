//------------ Bitmap --------------------------------------------------------
//
// Sparse branching node: a BitIndex records which critical bytes are
// occupied and the children sit in a compact array ordered by critical
// byte, addressed through the index's rank.

use std::sync::Arc;

use super::bit_index::{countbits, BitIndex};
use super::expanse::Expanse;
use super::leaf::Leaf;
use super::Node;

#[derive(Clone, Debug)]
pub(crate) struct Bitmap<V> {
    pub(crate) key: Box<[u8]>,
    pub(crate) val: Option<V>,
    pub(crate) count: usize,
    pub(crate) index: BitIndex,
    pub(crate) sub: Vec<Arc<Node<V>>>,
}

impl<V> Bitmap<V> {
    pub(crate) fn expanse(&self) -> Expanse {
        Expanse::new(self.index.min(), self.index.max())
    }

    pub(crate) fn expanse_without(&self, cb: u8) -> Expanse {
        let e = self.expanse();
        let mut low = e.low;
        let mut high = e.high;
        if cb == low {
            low = self
                .index
                .first_after(cb)
                .expect("bitmap must keep a bit past its low edge");
        }
        if cb == high {
            high = self
                .index
                .last_before(cb)
                .expect("bitmap must keep a bit before its high edge");
        }
        Expanse::new(low, high)
    }

    pub(crate) fn child_at(&self, cb: u8) -> Option<&Node<V>> {
        if self.index.is_set(cb) {
            Some(&self.sub[self.index.rank(cb)])
        } else {
            None
        }
    }

    pub(crate) fn child_at_or_after(&self, from: u16) -> Option<(u8, &Node<V>)> {
        let cb = self.index.first_at_or_after(from)?;
        Some((cb, &self.sub[self.index.rank(cb)]))
    }

    pub(crate) fn for_subs_in_range<F>(&self, start: u16, end: u16, f: &mut F)
    where
        F: FnMut(u8, &Arc<Node<V>>),
    {
        // The child array is rank-ordered, so walking every set bit keeps
        // the index in step even below `start`.
        let mut idx = 0;
        for w in 0..4usize {
            let mut bm = self.index.word(w);
            while bm != 0 {
                let bit = bm ^ (bm & (bm - 1));
                let cb = countbits(bit - 1) as u16 + 64 * w as u16;
                if cb >= end {
                    return;
                }
                if cb >= start {
                    f(cb as u8, &self.sub[idx]);
                }
                idx += 1;
                bm &= bm - 1;
            }
        }
    }
}

impl<V: Clone> Bitmap<V> {
    // Rebuild from `t` plus one new sub-trie at `cb`.
    pub(crate) fn from_grown(t: &Node<V>, cb: u8, sub: Arc<Node<V>>) -> Self {
        let mut index = BitIndex::default();
        let mut subs = Vec::with_capacity(t.occupied() + 1);
        t.for_subs_in_range(0, cb as u16, &mut |c, s| {
            index.set(c);
            subs.push(Arc::clone(s));
        });
        index.set(cb);
        subs.push(sub);
        t.for_subs_in_range(cb as u16 + 1, 256, &mut |c, s| {
            index.set(c);
            subs.push(Arc::clone(s));
        });
        Bitmap {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() + 1,
            index,
            sub: subs,
        }
    }

    // Rebuild from `t` minus the leaf at `without`.
    pub(crate) fn from_shrunk(t: &Node<V>, e: Expanse, without: u8) -> Self {
        let mut index = BitIndex::default();
        let mut subs = Vec::with_capacity(t.occupied() - 1);
        t.for_subs_in_range(e.low as u16, without as u16, &mut |c, s| {
            index.set(c);
            subs.push(Arc::clone(s));
        });
        t.for_subs_in_range(without as u16 + 1, e.high as u16 + 1, &mut |c, s| {
            index.set(c);
            subs.push(Arc::clone(s));
        });
        Bitmap {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() - 1,
            index,
            sub: subs,
        }
    }

    // Splice at rank: recurse into an existing child or insert a fresh
    // leaf and set its bit.
    pub(crate) fn assoc_child(&self, cb: u8, rest: &[u8], val: V) -> (Node<V>, usize) {
        let mut index = self.index;
        let mut sub = self.sub.clone();
        let i = self.index.rank(cb);
        let added = if self.index.is_set(cb) {
            let (n, added) = sub[i].assoc(rest, val);
            sub[i] = Arc::new(n);
            added
        } else {
            sub.insert(i, Arc::new(Node::Leaf(Leaf::new(rest, val))));
            index.set(cb);
            1
        };
        (
            Node::Bitmap(Bitmap {
                key: self.key.clone(),
                val: self.val.clone(),
                count: self.count + added,
                index,
                sub,
            }),
            added,
        )
    }
}
