use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Dict;

use super::bag::Bag;
use super::bit_index::{countbits, maxbit, minbit, reverse, BitIndex};
use super::bitmap::Bitmap;
use super::expanse::Expanse;
use super::leaf::Leaf;
use super::span::Span;
use super::Node;

//------------ Bit twiddling -------------------------------------------------

fn slowcount(mut bits: u64) -> u8 {
    let mut count = 0;
    while bits != 0 {
        count += (bits & 1) as u8;
        bits >>= 1;
    }
    count
}

#[test]
fn countbits_matches_reference() {
    assert_eq!(countbits(0x0), 0);
    assert_eq!(countbits(u64::MAX), 64);
    assert_eq!(countbits(0x8000_0000_0000_0000), 1);
    assert_eq!(countbits(0x1), 1);

    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..10_000 {
        let x: u64 = rng.random();
        assert_eq!(countbits(x), slowcount(x), "countbits({:#x})", x);
    }
}

#[test]
fn reverse_bits() {
    assert_eq!(reverse(0x0), 0);
    assert_eq!(reverse(u64::MAX), u64::MAX);
    assert_eq!(reverse(0x1), 0x8000_0000_0000_0000);
    assert_eq!(reverse(0x8000_0000_0000_0000), 0x1);
    assert_eq!(reverse(0x0f0f_0000_0000_0000), 0x0000_0000_0000_f0f0);

    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..10_000 {
        let x: u64 = rng.random();
        assert_eq!(reverse(reverse(x)), x, "reverse({:#x})", x);
    }
}

#[test]
fn minbit_maxbit_match_linear_scan() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..10_000 {
        let x: u64 = rng.random();
        if x == 0 {
            continue;
        }
        let lo = (0..64).find(|i| x & (1 << i) != 0).unwrap();
        let hi = (0..64).rev().find(|i| x & (1 << i) != 0).unwrap();
        assert_eq!(minbit(x), lo as u8);
        assert_eq!(maxbit(x), hi as u8);
    }
}

#[test]
fn bit_index_min_max_across_words() {
    let mut bi = BitIndex::default();
    bi.set(0);
    assert_eq!(bi.min(), 0);
    assert_eq!(bi.max(), 0);
    bi.set(55);
    assert_eq!(bi.min(), 0);
    assert_eq!(bi.max(), 55);
    bi.set(128);
    bi.set(129);
    assert_eq!(bi.max(), 129);

    let mut hi = BitIndex::default();
    hi.set(200);
    hi.set(255);
    assert_eq!(hi.min(), 200);
    assert_eq!(hi.max(), 255);
}

#[test]
fn bit_index_rank_tracks_set_bits() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut bi = BitIndex::default();
    let mut set = Vec::new();
    for _ in 0..64 {
        let cb: u8 = rng.random();
        if set.contains(&cb) {
            continue;
        }
        bi.set(cb);
        set.push(cb);
        set.sort_unstable();
        assert!(bi.offsets_consistent());
        assert_eq!(bi.ones(), set.len());
        for (want, &c) in set.iter().enumerate() {
            assert!(bi.is_set(c));
            assert_eq!(bi.rank(c), want, "rank of {} in {:?}", c, set);
        }
    }
}

#[test]
fn bit_index_neighbors_cross_words() {
    let mut bi = BitIndex::default();
    bi.set(10);
    bi.set(200);
    assert_eq!(bi.first_after(10), Some(200));
    assert_eq!(bi.last_before(200), Some(10));
    assert_eq!(bi.first_after(200), None);
    assert_eq!(bi.last_before(10), None);

    let mut edge = BitIndex::default();
    edge.set(63);
    edge.set(64);
    assert_eq!(edge.first_after(63), Some(64));
    assert_eq!(edge.last_before(64), Some(63));
    assert_eq!(edge.first_at_or_after(64), Some(64));
    assert_eq!(edge.first_at_or_after(65), None);
}

//------------ Expanse -------------------------------------------------------

#[test]
fn expanse_normalizes_and_extends() {
    assert_eq!(Expanse::new(b'a', b'b'), Expanse::new(b'b', b'a'));
    assert_eq!(Expanse::new(0, 255).size, 256);
    assert_eq!(Expanse::new(b'a', b'b').size, 2);
    assert_eq!(Expanse::new(1, 10).with(9), Expanse::new(1, 10));
    assert_eq!(Expanse::new(10, 1).with(11), Expanse::new(1, 11));
    assert_eq!(Expanse::new(10, 1).with(11).size, 11);
    // An empty expanse covers exactly the new byte, even byte zero.
    assert_eq!(Expanse::empty().with(0), Expanse::new(0, 0));
    assert_eq!(Expanse::empty().with(b'q'), Expanse::new(b'q', b'q'));
    assert_eq!(Expanse::empty().with(255).size, 1);
    assert!(Expanse::new(3, 7).contains(3));
    assert!(Expanse::new(3, 7).contains(7));
    assert!(!Expanse::new(3, 7).contains(8));
    assert!(!Expanse::empty().contains(0));
}

//------------ Node construction walks ---------------------------------------

fn leaf(key: &[u8], val: i64) -> Node<i64> {
    Node::Leaf(Leaf::new(key, val))
}

fn check_shape(n: &Node<i64>, occupied: usize, e: Expanse) {
    assert_eq!(n.occupied(), occupied);
    assert_eq!(n.expanse(), e);
}

// A five-child bag over b, d, e and f plus a, valueless at the top.
fn test_bag() -> Node<i64> {
    let n = Node::Bag(Bag::new2(b"", b'f', leaf(b"oo", 1), b'b', leaf(b"ar", 2)));
    check_shape(&n, 2, Expanse::new(b'f', b'b'));
    let n = Node::Bag(Bag::from_grown(&n, b'e', Arc::new(leaf(b"at", 4))));
    check_shape(&n, 3, Expanse::new(b'f', b'b'));
    let n = Node::Bag(Bag::from_grown(&n, b'a', Arc::new(leaf(b"te", 5))));
    check_shape(&n, 4, Expanse::new(b'f', b'a'));
    let n = Node::Bag(Bag::from_grown(&n, b'd', Arc::new(leaf(b"og", 7))));
    check_shape(&n, 5, Expanse::new(b'f', b'a'));
    n
}

#[test]
fn bag_grows_and_shrinks() {
    let b = test_bag();
    let mut seen = 0;
    b.for_subs_in_range(0, 256, &mut |_, _| seen += 1);
    assert_eq!(seen, 5);

    let e1 = b.expanse_without(b'a');
    let b1 = Node::Bag(Bag::from_shrunk(&b, e1, b'a'));
    check_shape(&b1, 4, Expanse::new(b'f', b'b'));
    let e2 = b.expanse_without(b'e');
    let b2 = Node::Bag(Bag::from_shrunk(&b, e2, b'e'));
    check_shape(&b2, 4, Expanse::new(b'f', b'a'));
    let e3 = b1.expanse_without(b'f');
    let b3 = Node::Bag(Bag::from_shrunk(&b1, e3, b'f'));
    check_shape(&b3, 3, Expanse::new(b'e', b'b'));
}

#[test]
fn span_grows_and_shrinks() {
    let b = test_bag();
    let e = b.expanse().with(b'c');
    let s = Node::Span(Span::from_grown(&b, e, b'c', Arc::new(leaf(b"ar", 8))));
    check_shape(&s, 6, Expanse::new(b'a', b'f'));
    let e = e.with(b'g');
    let s = Node::Span(Span::from_grown(&s, e, b'g', Arc::new(leaf(b"irl", 9))));
    check_shape(&s, 7, Expanse::new(b'a', b'g'));

    let e1 = s.expanse_without(b'c');
    let s1 = Node::Span(Span::from_shrunk(&s, e1, b'c'));
    check_shape(&s1, 6, Expanse::new(b'a', b'g'));
    let e2 = s.expanse_without(b'a');
    let s2 = Node::Span(Span::from_shrunk(&s, e2, b'a'));
    check_shape(&s2, 6, Expanse::new(b'b', b'g'));
    let e3 = s2.expanse_without(b'g');
    let s3 = Node::Span(Span::from_shrunk(&s2, e3, b'g'));
    check_shape(&s3, 5, Expanse::new(b'b', b'f'));
}

#[test]
fn bitmap_grows_and_shrinks() {
    let b = test_bag();
    let bm = Node::Bitmap(Bitmap::from_grown(&b, b'c', Arc::new(leaf(b"ar", 8))));
    check_shape(&bm, 6, Expanse::new(b'a', b'f'));
    let bm = Node::Bitmap(Bitmap::from_grown(&bm, b'g', Arc::new(leaf(b"irl", 9))));
    check_shape(&bm, 7, Expanse::new(b'a', b'g'));

    let e1 = bm.expanse_without(b'c');
    let bm1 = Node::Bitmap(Bitmap::from_shrunk(&bm, e1, b'c'));
    check_shape(&bm1, 6, Expanse::new(b'a', b'g'));
    let e2 = bm.expanse_without(b'a');
    let bm2 = Node::Bitmap(Bitmap::from_shrunk(&bm, e2, b'a'));
    check_shape(&bm2, 6, Expanse::new(b'b', b'g'));
    let e3 = bm2.expanse_without(b'g');
    let bm3 = Node::Bitmap(Bitmap::from_shrunk(&bm2, e3, b'g'));
    check_shape(&bm3, 5, Expanse::new(b'b', b'f'));
}

//------------ Representation transitions ------------------------------------

fn root<V>(d: &Dict<V>) -> &Node<V> {
    d.root.as_deref().expect("dictionary is empty")
}

fn validate<V>(d: &Dict<V>) {
    if let Some(r) = d.root.as_deref() {
        assert_eq!(r.check_invariants(), d.len());
    }
}

#[test]
fn dense_fourth_child_promotes_to_span() {
    let d = Dict::new()
        .assoc("a", 1)
        .assoc("b", 2)
        .assoc("c", 3)
        .assoc("d", 4);
    assert!(matches!(root(&d), Node::Span(_)));
    validate(&d);
}

#[test]
fn sparse_fourth_child_stays_bag() {
    let d = Dict::new()
        .assoc([0x00u8], 1)
        .assoc([0x10u8], 2)
        .assoc([0x20u8], 3)
        .assoc([0x30u8], 4);
    match root(&d) {
        Node::Bag(b) => assert_eq!(b.sub.len(), 4),
        n => panic!("expected a bag, got {:?}", n),
    }
    validate(&d);
}

#[test]
fn sparse_eighth_child_promotes_to_bitmap() {
    let mut d = Dict::new();
    for i in 0..7u8 {
        d = d.assoc([i * 0x20], i as i64);
    }
    assert!(matches!(root(&d), Node::Bag(_)));
    d = d.assoc([0xf0u8], 8);
    assert!(matches!(root(&d), Node::Bitmap(_)));
    validate(&d);
}

#[test]
fn span_outgrows_into_bag_then_bitmap() {
    let mut d = Dict::new();
    for i in 0..6u8 {
        d = d.assoc([i], i as i64);
    }
    assert!(matches!(root(&d), Node::Span(_)));
    // A seventh child far outside the expanse still fits a bag.
    d = d.assoc([0x80u8], 7);
    assert!(matches!(root(&d), Node::Bag(_)));
    // The eighth sparse child does not.
    d = d.assoc([0x90u8], 8);
    assert!(matches!(root(&d), Node::Bitmap(_)));
    validate(&d);
}

#[test]
fn bitmap_demotes_on_removal() {
    let mut d = Dict::new();
    for i in 0..9u8 {
        d = d.assoc([i.wrapping_mul(30)], i as i64);
    }
    assert!(matches!(root(&d), Node::Bitmap(_)));
    d = d.without([30u8]);
    d = d.without([60u8]);
    match root(&d) {
        Node::Bag(b) => assert_eq!(b.sub.len(), 7),
        n => panic!("expected a bag, got {:?}", n),
    }
    validate(&d);
}

#[test]
fn span_demotes_to_bag_as_holes_open_up() {
    let mut d = Dict::new();
    for i in 0..10u8 {
        d = d.assoc([i], i as i64);
    }
    assert!(matches!(root(&d), Node::Span(_)));
    // Interior removals widen the waste until the span gives up.
    for i in [1u8, 2, 3, 4] {
        d = d.without([i]);
        validate(&d);
    }
    d = d.without([5u8]);
    match root(&d) {
        Node::Bag(b) => assert_eq!(b.sub.len(), 5),
        n => panic!("expected a bag, got {:?}", n),
    }
    validate(&d);
}

#[test]
fn removal_collapses_two_child_bag() {
    let d = Dict::new().assoc("apple", 1).assoc("apricot", 2);
    let d = d.without("apple");
    match root(&d) {
        Node::Leaf(l) => assert_eq!(&l.key[..], b"apricot"),
        n => panic!("expected a collapsed leaf, got {:?}", n),
    }
    assert_eq!(d.get("apricot"), Some(&2));
}

#[test]
fn strict_prefix_key_lands_on_inner_node() {
    let d = Dict::new().assoc("apple", 1).assoc("appro", 2);
    assert!(matches!(root(&d), Node::Bag(_)));
    let d = d.assoc("ap", 3);
    assert_eq!(d.len(), 3);
    assert_eq!(d.get("ap"), Some(&3));
    assert_eq!(d.get("apple"), Some(&1));
    assert_eq!(d.get("appro"), Some(&2));
    let keys: Vec<_> = d.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"ap".to_vec(), b"apple".to_vec(), b"appro".to_vec()]);
    validate(&d);

    // Removing the inner value collapses the chain back together.
    let d = d.without("ap").without("appro");
    match root(&d) {
        Node::Leaf(l) => assert_eq!(&l.key[..], b"apple"),
        n => panic!("expected a collapsed leaf, got {:?}", n),
    }
}

#[test]
fn lookup_rejects_keys_diverging_inside_a_suffix() {
    let d = Dict::new().assoc("abx1", 1).assoc("aby1", 2);
    // 'x' is a live critical byte below "ab", but "ax1" parted ways one
    // byte earlier.
    assert_eq!(d.get("ax1"), None);
    assert_eq!(d.get("ayx1"), None);
    assert_eq!(d.get("ab"), None);
    assert_eq!(d.get("abx1"), Some(&1));
}

#[test]
fn bitmap_keeps_bit_when_child_shrinks() {
    // Nine sparse branches, each a two-entry sub-trie.
    let mut d = Dict::new();
    for i in 0..9u8 {
        let b = i.wrapping_mul(30);
        d = d.assoc([b, 0], i as i64);
        d = d.assoc([b, 1], 100 + i as i64);
    }
    assert!(matches!(root(&d), Node::Bitmap(_)));
    validate(&d);

    // Shrink one branch without emptying it.
    d = d.without([60u8, 1]);
    assert!(matches!(root(&d), Node::Bitmap(_)));
    assert_eq!(d.get([60u8, 0]), Some(&2));
    assert_eq!(d.get([60u8, 1]), None);
    for i in [0u8, 1, 3, 4, 5, 6, 7, 8] {
        let b = i.wrapping_mul(30);
        assert_eq!(d.get([b, 0]), Some(&(i as i64)));
        assert_eq!(d.get([b, 1]), Some(&(100 + i as i64)));
    }
    validate(&d);
}

//------------ Structural sharing --------------------------------------------

fn children<V>(n: &Node<V>) -> Vec<(u8, *const Node<V>)> {
    let mut v = Vec::new();
    n.for_subs_in_range(0, 256, &mut |cb, s| v.push((cb, Arc::as_ptr(s))));
    v
}

#[test]
fn untouched_subtrees_are_shared() {
    let d1 = Dict::new().assoc("foo", 1).assoc("bar", 2);
    let d2 = d1.assoc("baz", 3);
    let c1 = children(root(&d1));
    let c2 = children(root(&d2));
    // The 'f' branch was not on the modified spine.
    let f1 = c1.iter().find(|(cb, _)| *cb == b'f').unwrap();
    let f2 = c2.iter().find(|(cb, _)| *cb == b'f').unwrap();
    assert_eq!(f1.1, f2.1);
}

#[test]
fn removing_an_absent_key_shares_the_whole_root() {
    let d1 = Dict::new().assoc("apple", 1).assoc("apricot", 2);
    let d2 = d1.without("ap");
    let d3 = d1.without("banana");
    let d4 = d1.without("apples");
    for d in [&d2, &d3, &d4] {
        assert!(Arc::ptr_eq(
            d1.root.as_ref().unwrap(),
            d.root.as_ref().unwrap()
        ));
    }
}

//------------ Randomized model check ----------------------------------------

#[test]
fn randomized_ops_match_btreemap() {
    let mut rng = StdRng::seed_from_u64(0xda7a);
    let mut model: BTreeMap<Vec<u8>, i64> = BTreeMap::new();
    let mut dict: Dict<i64> = Dict::new();

    for step in 0..4000 {
        // A narrow alphabet forces shared prefixes; the occasional wild
        // byte forces sparse branches.
        let len = rng.random_range(0..=6);
        let key: Vec<u8> = (0..len)
            .map(|_| {
                if rng.random_bool(0.7) {
                    rng.random_range(b'a'..=b'h')
                } else {
                    rng.random::<u8>()
                }
            })
            .collect();

        if rng.random_bool(0.6) {
            let val = step as i64;
            dict = dict.assoc(&key, val);
            model.insert(key, val);
        } else {
            dict = dict.without(&key);
            model.remove(&key);
        }

        assert_eq!(dict.len(), model.len());
        validate(&dict);
        if step % 64 == 0 {
            let got: Vec<_> = dict.iter().map(|(k, v)| (k, *v)).collect();
            let want: Vec<_> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
            assert_eq!(got, want);
        }
    }

    for (k, v) in &model {
        assert_eq!(dict.get(k), Some(v));
    }
}
