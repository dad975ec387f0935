//------------ Dict ----------------------------------------------------------

use std::fmt;
use std::sync::Arc;

use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::stats::DictStats;
use crate::trie::iterators::Iter;
use crate::trie::{leaf::Leaf, Node, Removed};

/// A persistent ordered dictionary from byte-string keys to values.
///
/// Every mutating operation returns a new dictionary and leaves the
/// receiver untouched; the two share all unchanged structure, so keeping
/// old versions around costs only the nodes along the modified paths.
/// Cloning a dictionary is a reference-count bump.
///
/// Keys are ordered lexicographically as byte strings, which is the order
/// [`iter`][Dict::iter] and [`for_each`][Dict::for_each] deliver them in.
///
/// ```
/// use radix_dict::Dict;
///
/// let d = Dict::new().assoc("foo", 1).assoc("bar", 2);
/// let d2 = d.without("foo");
/// assert_eq!(d.get("foo"), Some(&1));
/// assert_eq!(d2.get("foo"), None);
/// assert_eq!(d2.len(), 1);
/// ```
#[derive(Clone)]
pub struct Dict<V> {
    pub(crate) root: Option<Arc<Node<V>>>,
}

impl<V> Dict<V> {
    /// The empty dictionary.
    pub fn new() -> Self {
        Dict { root: None }
    }

    /// The value stored under `key`, if any.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&V> {
        self.root.as_ref()?.lookup(key.as_ref())
    }

    /// Whether `key` has a value.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.count())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Calls `f` exactly once per entry, keys in ascending lexicographic
    /// order.
    pub fn for_each<F: FnMut(&[u8], &V)>(&self, mut f: F) {
        if let Some(root) = &self.root {
            root.for_each(&mut Vec::new(), &mut f);
        }
    }

    /// Iterates the entries in ascending lexicographic key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self.root.as_deref())
    }

    /// Walks the trie and reports its shape.
    pub fn stats(&self) -> DictStats {
        let mut stats = DictStats::default();
        if let Some(root) = &self.root {
            stats.gather(root, 1);
        }
        stats
    }
}

impl<V: Clone> Dict<V> {
    /// Returns a dictionary that maps `key` to `val` and is otherwise
    /// identical to `self`. An existing value under `key` is replaced.
    pub fn assoc(&self, key: impl AsRef<[u8]>, val: V) -> Self {
        let root = match &self.root {
            Some(root) => root.assoc(key.as_ref(), val).0,
            None => Node::Leaf(Leaf::new(key.as_ref(), val)),
        };
        Dict {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a dictionary without an entry for `key`. If `key` is
    /// absent the result shares its entire trie with `self`.
    pub fn without(&self, key: impl AsRef<[u8]>) -> Self {
        let root = match &self.root {
            Some(root) => root,
            None => return self.clone(),
        };
        match root.without(key.as_ref()) {
            Removed::Unchanged => self.clone(),
            Removed::Replaced(n) => Dict {
                root: Some(Arc::new(n)),
            },
            Removed::Gone => Dict { root: None },
        }
    }
}

impl<V> Default for Dict<V> {
    fn default() -> Self {
        Dict::new()
    }
}

impl<'a, V> IntoIterator for &'a Dict<V> {
    type Item = (Vec<u8>, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: AsRef<[u8]>, V: Clone> FromIterator<(K, V)> for Dict<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Dict::new(), |d, (k, v)| d.assoc(k, v))
    }
}

impl<K: AsRef<[u8]>, V: Clone> Extend<(K, V)> for Dict<V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            *self = self.assoc(k, v);
        }
    }
}

// Observational equality: same entries in the same order.
impl<V: PartialEq> PartialEq for Dict<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl<V: Eq> Eq for Dict<V> {}

impl<V: fmt::Debug> fmt::Debug for Dict<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Key(Vec<u8>);

        impl fmt::Debug for Key {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "b\"{}\"", self.0.escape_ascii())
            }
        }

        f.debug_map()
            .entries(self.iter().map(|(k, v)| (Key(k), v)))
            .finish()
    }
}

// Serialized as a sequence of (key, value) pairs: byte keys cannot be map
// keys in formats that require strings there.
impl<V: Serialize> Serialize for Dict<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for (k, v) in self.iter() {
            seq.serialize_element(&(k, v))?;
        }
        seq.end()
    }
}

impl<'de, V: Deserialize<'de> + Clone> Deserialize<'de> for Dict<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DictVisitor<V>(std::marker::PhantomData<V>);

        impl<'de, V: Deserialize<'de> + Clone> Visitor<'de> for DictVisitor<V> {
            type Value = Dict<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a sequence of (key, value) pairs")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut dict = Dict::new();
                while let Some((k, v)) = seq.next_element::<(Vec<u8>, V)>()? {
                    dict = dict.assoc(k, v);
                }
                Ok(dict)
            }
        }

        deserializer.deserialize_seq(DictVisitor(std::marker::PhantomData))
    }
}
