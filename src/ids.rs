//! Internal identifier types shared across modules.

/// Dense integer assigned once per configured field name at construction.
pub type FieldId = u16;

/// Monotonically increasing internal document id, never reused.
pub type ShortId = u64;

/// `HashMap` keyed by the hot posting/scoring path (`ShortId` -> frequency,
/// document accumulators), using `ahash` instead of the default SipHash.
pub type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
