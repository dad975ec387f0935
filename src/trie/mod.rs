//------------ Trie core -----------------------------------------------------
//
// The trie node and its operation algebra. A node is one of four physical
// representations chosen by local population and density; every mutating
// operation rebuilds the spine from the touched point back up to the root
// and leaves everything else shared. Nodes are never mutated once built.
//
// Representation choice on growth: a bag is preferred while small, a span
// as soon as four or more children sit densely enough together, a bitmap
// otherwise. Shrinking mirrors the same predicates.

use std::sync::Arc;

use log::trace;

use self::bag::Bag;
use self::bitmap::Bitmap;
use self::expanse::Expanse;
use self::leaf::Leaf;
use self::span::Span;

pub(crate) mod bag;
pub(crate) mod bit_index;
pub(crate) mod bitmap;
pub(crate) mod expanse;
pub(crate) mod iterators;
pub(crate) mod leaf;
pub(crate) mod span;

#[cfg(test)]
mod tests;

pub(crate) const MAX_BAG_SIZE: usize = 7;
pub(crate) const MIN_SPAN_SIZE: usize = 4;
pub(crate) const MAX_SPAN_WASTE: u16 = 4;

// The density predicate governing span eligibility: the expanse may waste
// at most MAX_SPAN_WASTE empty slots.
pub(crate) fn span_ok(e: Expanse, count: usize) -> bool {
    e.size as usize <= count + MAX_SPAN_WASTE as usize
}

// Locate the critical byte of two keys: the position of the first byte at
// which they differ. The flag reports an exact match.
pub(crate) fn find_crit(a: &[u8], b: &[u8]) -> (usize, bool) {
    let l = a.len().min(b.len());
    for i in 0..l {
        if a[i] != b[i] {
            return (i, false);
        }
    }
    (l, a.len() == b.len())
}

// Split a key at the critical byte into (prefix, cb, rest). Past-the-end
// positions yield the whole key and an empty rest.
pub(crate) fn split_key(key: &[u8], crit: usize) -> (&[u8], u8, &[u8]) {
    if crit >= key.len() {
        return (key, 0, &[]);
    }
    (&key[..crit], key[crit], &key[crit + 1..])
}

// The fused key of a collapsed node: parent suffix, the child's critical
// byte, the child's suffix.
fn join_key(prefix: &[u8], cb: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix);
    key.push(cb);
    key.extend_from_slice(suffix);
    key
}

//------------ Node ----------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) enum Node<V> {
    Leaf(Leaf<V>),
    Bag(Bag<V>),
    Span(Span<V>),
    Bitmap(Bitmap<V>),
}

// Outcome of a removal below some node. Unchanged keeps the caller's
// existing child untouched (and shared), so a miss allocates nothing.
pub(crate) enum Removed<V> {
    Unchanged,
    Replaced(Node<V>),
    Gone,
}

impl<V> Node<V> {
    pub(crate) fn key(&self) -> &[u8] {
        match self {
            Node::Leaf(l) => &l.key,
            Node::Bag(b) => &b.key,
            Node::Span(s) => &s.key,
            Node::Bitmap(b) => &b.key,
        }
    }

    pub(crate) fn val(&self) -> Option<&V> {
        match self {
            Node::Leaf(l) => Some(&l.val),
            Node::Bag(b) => b.val.as_ref(),
            Node::Span(s) => s.val.as_ref(),
            Node::Bitmap(b) => b.val.as_ref(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Bag(b) => b.count,
            Node::Span(s) => s.count,
            Node::Bitmap(b) => b.count,
        }
    }

    pub(crate) fn occupied(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Bag(b) => b.sub.len(),
            Node::Span(s) => s.occupied as usize,
            Node::Bitmap(b) => b.sub.len(),
        }
    }

    pub(crate) fn expanse(&self) -> Expanse {
        match self {
            Node::Leaf(_) => Expanse::empty(),
            Node::Bag(b) => b.expanse(),
            Node::Span(s) => s.expanse(),
            Node::Bitmap(b) => b.expanse(),
        }
    }

    pub(crate) fn expanse_without(&self, cb: u8) -> Expanse {
        match self {
            Node::Leaf(_) => Expanse::empty(),
            Node::Bag(b) => b.expanse_without(cb),
            Node::Span(s) => s.expanse_without(cb),
            Node::Bitmap(b) => b.expanse_without(cb),
        }
    }

    fn child_at(&self, cb: u8) -> Option<&Node<V>> {
        match self {
            Node::Leaf(_) => None,
            Node::Bag(b) => b.child_at(cb),
            Node::Span(s) => s.child_at(cb),
            Node::Bitmap(b) => b.child_at(cb),
        }
    }

    pub(crate) fn child_at_or_after(&self, from: u16) -> Option<(u8, &Node<V>)> {
        match self {
            Node::Leaf(_) => None,
            Node::Bag(b) => b.child_at_or_after(from),
            Node::Span(s) => s.child_at_or_after(from),
            Node::Bitmap(b) => b.child_at_or_after(from),
        }
    }

    // Visit the children with critical bytes in `start..end`, ascending.
    // `end` is exclusive and may be 256.
    pub(crate) fn for_subs_in_range<F>(&self, start: u16, end: u16, f: &mut F)
    where
        F: FnMut(u8, &Arc<Node<V>>),
    {
        match self {
            Node::Leaf(_) => {}
            Node::Bag(b) => b.for_subs_in_range(start, end, f),
            Node::Span(s) => s.for_subs_in_range(start, end, f),
            Node::Bitmap(b) => b.for_subs_in_range(start, end, f),
        }
    }

    pub(crate) fn lookup(&self, key: &[u8]) -> Option<&V> {
        let (crit, matched) = find_crit(key, self.key());
        if matched {
            return self.val();
        }
        if crit < self.key().len() {
            // The key diverges inside (or ends short of) our suffix; a
            // child at the divergent byte belongs to a different prefix.
            return None;
        }
        self.child_at(key[crit])?.lookup(&key[crit + 1..])
    }

    // Emit every (key, value) pair below this node, own value first, then
    // the children in ascending critical-byte order.
    pub(crate) fn for_each<F>(&self, prefix: &mut Vec<u8>, f: &mut F)
    where
        F: FnMut(&[u8], &V),
    {
        let watermark = prefix.len();
        prefix.extend_from_slice(self.key());
        if let Some(v) = self.val() {
            f(prefix, v);
        }
        self.for_subs_in_range(0, 256, &mut |cb, sub| {
            prefix.push(cb);
            sub.for_each(prefix, f);
            prefix.pop();
        });
        prefix.truncate(watermark);
    }
}

impl<V: Clone> Node<V> {
    // Same node under a different key suffix; used when splitting a prefix
    // or fusing a collapsed node into its parent.
    pub(crate) fn clone_with_key(&self, key: Vec<u8>) -> Node<V> {
        let key = key.into_boxed_slice();
        match self {
            Node::Leaf(l) => Node::Leaf(Leaf {
                key,
                val: l.val.clone(),
            }),
            Node::Bag(b) => {
                let mut n = b.clone();
                n.key = key;
                Node::Bag(n)
            }
            Node::Span(s) => {
                let mut n = s.clone();
                n.key = key;
                Node::Span(n)
            }
            Node::Bitmap(b) => {
                let mut n = b.clone();
                n.key = key;
                Node::Bitmap(n)
            }
        }
    }

    pub(crate) fn assoc(&self, key: &[u8], val: V) -> (Node<V>, usize) {
        let (crit, matched) = find_crit(key, self.key());
        if matched {
            return self.with_value(key, val);
        }
        let (prefix, cb, rest) = split_key(key, crit);
        if crit == key.len() {
            // The new key is a strict prefix of our suffix: a one-child
            // bag at the shortened prefix carries the new value.
            let (_, own_cb, own_rest) = split_key(self.key(), crit);
            let child = self.clone_with_key(own_rest.to_vec());
            return (Node::Bag(Bag::new1(prefix, val, own_cb, child)), 1);
        }
        if crit < self.key().len() {
            // Keys diverge inside our suffix: split into a bag of two.
            let (_, own_cb, own_rest) = split_key(self.key(), crit);
            let child = self.clone_with_key(own_rest.to_vec());
            let new = Node::Leaf(Leaf::new(rest, val));
            return (Node::Bag(Bag::new2(prefix, cb, new, own_cb, child)), 1);
        }
        // Our whole suffix is consumed; branch at cb.
        self.grow(cb, rest, val)
    }

    // Replace or install the value carried by this node itself.
    fn with_value(&self, key: &[u8], val: V) -> (Node<V>, usize) {
        match self {
            Node::Leaf(_) => (Node::Leaf(Leaf::new(key, val)), 0),
            Node::Bag(b) => {
                let added = usize::from(b.val.is_none());
                let mut n = b.clone();
                n.val = Some(val);
                n.count += added;
                (Node::Bag(n), added)
            }
            Node::Span(s) => {
                let added = usize::from(s.val.is_none());
                let mut n = s.clone();
                n.val = Some(val);
                n.count += added;
                (Node::Span(n), added)
            }
            Node::Bitmap(b) => {
                let added = usize::from(b.val.is_none());
                let mut n = b.clone();
                n.val = Some(val);
                n.count += added;
                (Node::Bitmap(n), added)
            }
        }
    }

    // Insert below this node at critical byte `cb`, deciding the resulting
    // representation from the post-insert occupancy and expanse.
    fn grow(&self, cb: u8, rest: &[u8], val: V) -> (Node<V>, usize) {
        match self {
            Node::Leaf(l) => {
                // The key runs past the leaf: the leaf's entry moves up
                // into a one-child bag.
                let sub = Node::Leaf(Leaf::new(rest, val));
                (Node::Bag(Bag::new1(&l.key, l.val.clone(), cb, sub)), 1)
            }
            Node::Bag(b) => {
                let (i, found) = b.find(cb);
                if !found {
                    let size = b.sub.len() + 1;
                    if size >= MIN_SPAN_SIZE {
                        let e = self.expanse().with(cb);
                        if span_ok(e, size) {
                            trace!("promoting bag to span: {} children over {:?}", size, e);
                            let sub = Arc::new(Node::Leaf(Leaf::new(rest, val)));
                            return (Node::Span(Span::from_grown(self, e, cb, sub)), 1);
                        }
                    }
                    if size > MAX_BAG_SIZE {
                        trace!("promoting bag to bitmap: {} children", size);
                        let sub = Arc::new(Node::Leaf(Leaf::new(rest, val)));
                        return (Node::Bitmap(Bitmap::from_grown(self, cb, sub)), 1);
                    }
                }
                b.assoc_child(i, found, cb, rest, val)
            }
            Node::Span(s) => {
                let e0 = self.expanse();
                let e = e0.with(cb);
                if e.size > e0.size {
                    let count = s.occupied as usize + 1;
                    if !span_ok(e, count) {
                        let sub = Arc::new(Node::Leaf(Leaf::new(rest, val)));
                        if count <= MAX_BAG_SIZE {
                            trace!("demoting span to bag: {} children over {:?}", count, e);
                            return (Node::Bag(Bag::from_grown(self, cb, sub)), 1);
                        }
                        trace!("promoting span to bitmap: {} children over {:?}", count, e);
                        return (Node::Bitmap(Bitmap::from_grown(self, cb, sub)), 1);
                    }
                }
                s.assoc_child(e, cb, rest, val)
            }
            Node::Bitmap(b) => {
                if !b.index.is_set(cb) {
                    let e = self.expanse().with(cb);
                    if span_ok(e, b.sub.len() + 1) {
                        trace!("demoting bitmap to span: {} children over {:?}", b.sub.len() + 1, e);
                        let sub = Arc::new(Node::Leaf(Leaf::new(rest, val)));
                        return (Node::Span(Span::from_grown(self, e, cb, sub)), 1);
                    }
                }
                b.assoc_child(cb, rest, val)
            }
        }
    }

    pub(crate) fn without(&self, key: &[u8]) -> Removed<V> {
        let (crit, matched) = find_crit(key, self.key());
        if matched {
            return self.without_value();
        }
        if crit < self.key().len() {
            // The key diverges inside our suffix; nothing to remove.
            return Removed::Unchanged;
        }
        self.shrink(key[crit], &key[crit + 1..])
    }

    // Remove the value carried by this node itself.
    fn without_value(&self) -> Removed<V> {
        match self {
            Node::Leaf(_) => Removed::Gone,
            Node::Bag(b) => {
                if b.val.is_none() {
                    return Removed::Unchanged;
                }
                if b.sub.len() == 1 {
                    // Value gone and one child left: fuse into it.
                    let key = join_key(&b.key, b.crit[0], b.sub[0].key());
                    return Removed::Replaced(b.sub[0].clone_with_key(key));
                }
                let mut n = b.clone();
                n.val = None;
                n.count -= 1;
                Removed::Replaced(Node::Bag(n))
            }
            Node::Span(s) => {
                if s.val.is_none() {
                    return Removed::Unchanged;
                }
                if s.occupied == 1 {
                    let (cb, sub) = s.first_child();
                    let key = join_key(&s.key, cb, sub.key());
                    return Removed::Replaced(sub.clone_with_key(key));
                }
                let mut n = s.clone();
                n.val = None;
                n.count -= 1;
                Removed::Replaced(Node::Span(n))
            }
            Node::Bitmap(b) => {
                if b.val.is_none() {
                    return Removed::Unchanged;
                }
                // Bitmaps are never close to collapsing: they hold more
                // than MAX_BAG_SIZE children by construction.
                let mut n = b.clone();
                n.val = None;
                n.count -= 1;
                Removed::Replaced(Node::Bitmap(n))
            }
        }
    }

    // Remove below this node at critical byte `cb`, demoting the
    // representation when the removal empties a child out.
    fn shrink(&self, cb: u8, rest: &[u8]) -> Removed<V> {
        match self {
            Node::Leaf(_) => Removed::Unchanged,
            Node::Bag(b) => {
                let (i, found) = b.find(cb);
                if !found {
                    return Removed::Unchanged;
                }
                match b.sub[i].without(rest) {
                    Removed::Unchanged => Removed::Unchanged,
                    Removed::Replaced(n) => {
                        let mut nb = b.clone();
                        nb.sub[i] = Arc::new(n);
                        nb.count -= 1;
                        Removed::Replaced(Node::Bag(nb))
                    }
                    Removed::Gone => Removed::Replaced(self.bag_child_removed(b, i, cb)),
                }
            }
            Node::Span(s) => {
                let sub = match s.child_at(cb) {
                    Some(sub) => sub,
                    None => return Removed::Unchanged,
                };
                match sub.without(rest) {
                    Removed::Unchanged => Removed::Unchanged,
                    Removed::Replaced(n) => {
                        let mut ns = s.clone();
                        ns.sub[(cb - s.start) as usize] = Some(Arc::new(n));
                        ns.count -= 1;
                        Removed::Replaced(Node::Span(ns))
                    }
                    Removed::Gone => Removed::Replaced(self.span_child_removed(s, cb)),
                }
            }
            Node::Bitmap(b) => {
                if !b.index.is_set(cb) {
                    return Removed::Unchanged;
                }
                let i = b.index.rank(cb);
                match b.sub[i].without(rest) {
                    Removed::Unchanged => Removed::Unchanged,
                    Removed::Replaced(n) => {
                        // The child shrank but survives; its occupancy bit
                        // stays set and only the subtree count drops.
                        let mut nb = b.clone();
                        nb.sub[i] = Arc::new(n);
                        nb.count -= 1;
                        Removed::Replaced(Node::Bitmap(nb))
                    }
                    Removed::Gone => Removed::Replaced(self.bitmap_child_removed(b, cb)),
                }
            }
        }
    }

    fn bag_child_removed(&self, b: &Bag<V>, i: usize, cb: u8) -> Node<V> {
        let last = b.sub.len() - 1;
        if last == 0 {
            let val = b
                .val
                .clone()
                .expect("valueless node must keep at least one child");
            return Node::Leaf(Leaf::new(&b.key, val));
        }
        if last == 1 && b.val.is_none() {
            let o = 1 - i;
            let key = join_key(&b.key, b.crit[o], b.sub[o].key());
            trace!("collapsing bag into its last child at cb {}", b.crit[o]);
            return b.sub[o].clone_with_key(key);
        }
        let mut e = self.expanse();
        if last >= MIN_SPAN_SIZE {
            e = self.expanse_without(cb);
            if span_ok(e, last) {
                trace!("promoting bag to span on removal: {} children over {:?}", last, e);
                return Node::Span(Span::from_shrunk(self, e, cb));
            }
        }
        Node::Bag(Bag::from_shrunk(self, e, cb))
    }

    fn span_child_removed(&self, s: &Span<V>, cb: u8) -> Node<V> {
        let occupied = s.occupied as usize - 1;
        if occupied == 0 {
            let val = s
                .val
                .clone()
                .expect("valueless node must keep at least one child");
            return Node::Leaf(Leaf::new(&s.key, val));
        }
        if occupied == 1 && s.val.is_none() {
            let (ocb, sub) = s.lone_child_besides(cb);
            let key = join_key(&s.key, ocb, sub.key());
            return sub.clone_with_key(key);
        }
        let mut e = self.expanse();
        if occupied >= MIN_SPAN_SIZE {
            e = self.expanse_without(cb);
            if span_ok(e, occupied) {
                return Node::Span(Span::from_shrunk(self, e, cb));
            }
        }
        if occupied <= MAX_BAG_SIZE {
            trace!("demoting span to bag on removal: {} children", occupied);
            return Node::Bag(Bag::from_shrunk(self, e, cb));
        }
        trace!("demoting span to bitmap on removal: {} children over {:?}", occupied, e);
        Node::Bitmap(Bitmap::from_shrunk(self, e, cb))
    }

    fn bitmap_child_removed(&self, b: &Bitmap<V>, cb: u8) -> Node<V> {
        let occupied = b.sub.len() - 1;
        let e = self.expanse_without(cb);
        if span_ok(e, occupied) {
            trace!("promoting bitmap to span on removal: {} children over {:?}", occupied, e);
            return Node::Span(Span::from_shrunk(self, e, cb));
        }
        if occupied <= MAX_BAG_SIZE {
            trace!("demoting bitmap to bag on removal: {} children", occupied);
            return Node::Bag(Bag::from_shrunk(self, e, cb));
        }
        Node::Bitmap(Bitmap::from_shrunk(self, e, cb))
    }
}

//------------ Structural validation (test builds only) ----------------------

#[cfg(test)]
impl<V> Node<V> {
    // Walks the subtree asserting every structural invariant and returns
    // the number of entries found, which must equal the cached count.
    pub(crate) fn check_invariants(&self) -> usize {
        let entries = match self {
            Node::Leaf(_) => 1,
            Node::Bag(b) => {
                assert!(
                    !b.sub.is_empty() && b.sub.len() <= MAX_BAG_SIZE,
                    "bag occupancy {} out of range",
                    b.sub.len()
                );
                assert_eq!(b.crit.len(), b.sub.len());
                assert!(
                    b.crit.windows(2).all(|w| w[0] < w[1]),
                    "bag critical bytes must be strictly ascending"
                );
                if b.val.is_none() {
                    assert!(b.sub.len() >= 2, "valueless bag must branch");
                }
                usize::from(b.val.is_some())
                    + b.sub.iter().map(|s| s.check_invariants()).sum::<usize>()
            }
            Node::Span(s) => {
                let occupied = s.sub.iter().filter(|s| s.is_some()).count();
                assert_eq!(occupied, s.occupied as usize);
                assert!(occupied >= MIN_SPAN_SIZE, "span occupancy {} too low", occupied);
                assert!(
                    span_ok(s.expanse(), occupied),
                    "span wastes more than {} slots",
                    MAX_SPAN_WASTE
                );
                assert!(
                    s.sub.first().unwrap().is_some() && s.sub.last().unwrap().is_some(),
                    "span edges must be occupied"
                );
                usize::from(s.val.is_some())
                    + s.sub
                        .iter()
                        .flatten()
                        .map(|s| s.check_invariants())
                        .sum::<usize>()
            }
            Node::Bitmap(b) => {
                assert!(
                    b.sub.len() > MAX_BAG_SIZE,
                    "bitmap occupancy {} too low",
                    b.sub.len()
                );
                assert_eq!(b.index.ones(), b.sub.len());
                assert!(b.index.offsets_consistent(), "bitmap offset table is stale");
                assert!(
                    !span_ok(b.expanse(), b.sub.len()),
                    "bitmap dense enough to be a span"
                );
                usize::from(b.val.is_some())
                    + b.sub.iter().map(|s| s.check_invariants()).sum::<usize>()
            }
        };
        assert_eq!(entries, self.count(), "cached count is stale");
        entries
    }
}
