//------------ Types for Statistics -----------------------------------------

use std::fmt::{Display, Formatter};

use serde_derive::Serialize;

use crate::trie::Node;

/// Size and shape telemetry for a dictionary, gathered by a full walk of
/// its trie.
///
/// The slot counters expose how much array space the dense nodes waste:
/// `child_slots` counts every allocated child slot, `occupied_slots` the
/// ones actually holding a sub-trie.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DictStats {
    /// Number of (key, value) entries.
    pub entries: usize,
    /// Terminal nodes.
    pub leaves: usize,
    /// Small sorted-array nodes.
    pub bags: usize,
    /// Dense array nodes.
    pub spans: usize,
    /// Bitmap-indexed nodes.
    pub bitmaps: usize,
    /// Longest node path from the root.
    pub max_depth: usize,
    /// Total key-suffix bytes held in nodes.
    pub key_bytes: usize,
    /// Allocated child slots across all nodes.
    pub child_slots: usize,
    /// Child slots holding a sub-trie.
    pub occupied_slots: usize,
}

impl DictStats {
    pub fn node_count(&self) -> usize {
        self.leaves + self.bags + self.spans + self.bitmaps
    }

    pub(crate) fn gather<V>(&mut self, node: &Node<V>, depth: usize) {
        self.max_depth = self.max_depth.max(depth);
        self.key_bytes += node.key().len();
        if node.val().is_some() {
            self.entries += 1;
        }
        match node {
            Node::Leaf(_) => self.leaves += 1,
            Node::Bag(b) => {
                self.bags += 1;
                self.child_slots += b.sub.len();
                self.occupied_slots += b.sub.len();
            }
            Node::Span(s) => {
                self.spans += 1;
                self.child_slots += s.sub.len();
                self.occupied_slots += s.occupied as usize;
            }
            Node::Bitmap(b) => {
                self.bitmaps += 1;
                self.child_slots += b.sub.len();
                self.occupied_slots += b.sub.len();
            }
        }
        node.for_subs_in_range(0, 256, &mut |_, sub| {
            self.gather(sub, depth + 1);
        });
    }
}

impl Display for DictStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entries: {}, nodes: {} (leaf {}, bag {}, span {}, bitmap {}), \
             depth: {}, key bytes: {}, slots: {}/{}",
            self.entries,
            self.node_count(),
            self.leaves,
            self.bags,
            self.spans,
            self.bitmaps,
            self.max_depth,
            self.key_bytes,
            self.occupied_slots,
            self.child_slots,
        )
    }
}
