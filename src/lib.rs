pub use dict::Dict;
pub use stats::DictStats;
pub use trie::iterators::Iter;

pub mod dict;
pub mod stats;

mod trie;
