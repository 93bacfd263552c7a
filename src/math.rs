//! Type aliases for the collections used throughout the crate.

/// Type alias for maps, we use this to hide which type of map we are actually using.
/// Insertion order is preserved, which keeps learning runs deterministic.
pub type Map<K, V> = indexmap::IndexMap<K, V>;

/// Type alias for sets that, like [`Map`], preserve insertion order.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for maps that are ordered by their keys.
pub type OrderedMap<K, V> = std::collections::BTreeMap<K, V>;
