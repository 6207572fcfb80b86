pub mod geometry;

use ahash::AHashMap;
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;

// Re-exports.
pub use approx;
pub use ilattice;
pub use ilattice::glam;
pub use static_assertions;
