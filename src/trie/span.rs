//------------ Span ----------------------------------------------------------
//
// Dense branching node: children live in an array covering the whole
// expanse, indexed by `cb - start`. Absent slots are holes; the density
// predicate keeps the hole count bounded, and the slots at both ends are
// always occupied so the expanse stays tight.

use std::sync::Arc;

use super::expanse::Expanse;
use super::leaf::Leaf;
use super::Node;

#[derive(Clone, Debug)]
pub(crate) struct Span<V> {
    pub(crate) key: Box<[u8]>,
    pub(crate) val: Option<V>,
    pub(crate) count: usize,
    pub(crate) start: u8,
    pub(crate) occupied: u16,
    pub(crate) sub: Vec<Option<Arc<Node<V>>>>,
}

impl<V> Span<V> {
    pub(crate) fn expanse(&self) -> Expanse {
        Expanse::new(self.start, self.start + (self.sub.len() - 1) as u8)
    }

    pub(crate) fn expanse_without(&self, cb: u8) -> Expanse {
        let len = self.sub.len();
        let mut low = self.start;
        let mut high = self.start + (len - 1) as u8;
        if cb == low {
            let i = self.sub[1..]
                .iter()
                .position(|s| s.is_some())
                .expect("span must keep an occupied slot past its low edge")
                + 1;
            low = self.start + i as u8;
        }
        if cb == high {
            let j = self.sub[..len - 1]
                .iter()
                .rposition(|s| s.is_some())
                .expect("span must keep an occupied slot before its high edge");
            high = self.start + j as u8;
        }
        Expanse::new(low, high)
    }

    pub(crate) fn child_at(&self, cb: u8) -> Option<&Node<V>> {
        if !self.expanse().contains(cb) {
            return None;
        }
        self.sub[(cb - self.start) as usize].as_deref()
    }

    pub(crate) fn child_at_or_after(&self, from: u16) -> Option<(u8, &Node<V>)> {
        let begin = from.saturating_sub(self.start as u16) as usize;
        for i in begin..self.sub.len() {
            if let Some(s) = &self.sub[i] {
                return Some((self.start + i as u8, s));
            }
        }
        None
    }

    pub(crate) fn first_child(&self) -> (u8, &Arc<Node<V>>) {
        for (i, s) in self.sub.iter().enumerate() {
            if let Some(s) = s {
                return (self.start + i as u8, s);
            }
        }
        panic!("span has no occupied slot");
    }

    // The surviving child when occupancy drops to one.
    pub(crate) fn lone_child_besides(&self, cb: u8) -> (u8, &Arc<Node<V>>) {
        for (i, s) in self.sub.iter().enumerate() {
            let c = self.start + i as u8;
            if c == cb {
                continue;
            }
            if let Some(s) = s {
                return (c, s);
            }
        }
        panic!("span lost its last occupied slot");
    }

    pub(crate) fn for_subs_in_range<F>(&self, start: u16, end: u16, f: &mut F)
    where
        F: FnMut(u8, &Arc<Node<V>>),
    {
        let len = self.sub.len() as u16;
        let lo = start.saturating_sub(self.start as u16).min(len) as usize;
        let hi = end.saturating_sub(self.start as u16).min(len) as usize;
        for i in lo..hi {
            if let Some(s) = &self.sub[i] {
                f(self.start + i as u8, s);
            }
        }
    }
}

impl<V: Clone> Span<V> {
    // Rebuild from `t` plus one new sub-trie at `cb`; `e` is the grown
    // expanse and covers every child of `t` as well as `cb`.
    pub(crate) fn from_grown(t: &Node<V>, e: Expanse, cb: u8, sub: Arc<Node<V>>) -> Self {
        let mut slots: Vec<Option<Arc<Node<V>>>> = vec![None; e.size as usize];
        t.for_subs_in_range(0, cb as u16, &mut |c, s| {
            slots[(c - e.low) as usize] = Some(Arc::clone(s));
        });
        slots[(cb - e.low) as usize] = Some(sub);
        t.for_subs_in_range(cb as u16 + 1, 256, &mut |c, s| {
            slots[(c - e.low) as usize] = Some(Arc::clone(s));
        });
        Span {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() + 1,
            start: e.low,
            occupied: t.occupied() as u16 + 1,
            sub: slots,
        }
    }

    // Rebuild from `t` minus the leaf at `without`; `e` is already
    // tightened past the removed boundary.
    pub(crate) fn from_shrunk(t: &Node<V>, e: Expanse, without: u8) -> Self {
        let mut slots: Vec<Option<Arc<Node<V>>>> = vec![None; e.size as usize];
        t.for_subs_in_range(e.low as u16, without as u16, &mut |c, s| {
            slots[(c - e.low) as usize] = Some(Arc::clone(s));
        });
        t.for_subs_in_range(without as u16 + 1, e.high as u16 + 1, &mut |c, s| {
            slots[(c - e.low) as usize] = Some(Arc::clone(s));
        });
        Span {
            key: t.key().into(),
            val: t.val().cloned(),
            count: t.count() - 1,
            start: e.low,
            occupied: t.occupied() as u16 - 1,
            sub: slots,
        }
    }

    // Splice at `cb` within the (possibly extended) expanse `e`: recurse
    // into an existing child, fill a hole, or grow the array at one end.
    pub(crate) fn assoc_child(&self, e: Expanse, cb: u8, rest: &[u8], val: V) -> (Node<V>, usize) {
        debug_assert!(e.low <= self.start, "a span expanse never shrinks on insert");
        debug_assert!(e.size as usize >= self.sub.len());
        let mut slots: Vec<Option<Arc<Node<V>>>> = vec![None; e.size as usize];
        let shift = (self.start - e.low) as usize;
        for (i, s) in self.sub.iter().enumerate() {
            slots[i + shift] = s.clone();
        }
        let i = (cb - e.low) as usize;
        let (added, occupied) = if let Some(child) = slots[i].take() {
            let (n, added) = child.assoc(rest, val);
            slots[i] = Some(Arc::new(n));
            (added, self.occupied)
        } else {
            slots[i] = Some(Arc::new(Node::Leaf(Leaf::new(rest, val))));
            (1, self.occupied + 1)
        };
        (
            Node::Span(Span {
                key: self.key.clone(),
                val: self.val.clone(),
                count: self.count + added,
                start: e.low,
                occupied,
                sub: slots,
            }),
            added,
        )
    }
}
