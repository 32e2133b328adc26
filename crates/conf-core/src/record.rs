//! Record contract shared by all feature handlers

/// The normalized, fully-defaulted configuration of one feature instance.
///
/// A record is built fresh by the extractor on every pipeline run and
/// consumed read-only by verify, generate and apply. When `deleted()`
/// returns true, downstream stages may only rely on `identifier()` to
/// locate artifacts to remove.
pub trait FeatureRecord: Send + Sync {
    /// Instance name this record belongs to (e.g. an interface name)
    fn identifier(&self) -> &str;

    /// True when the feature's root path was absent from the tree
    fn deleted(&self) -> bool;

    /// True when the instance is configured but administratively disabled
    fn disabled(&self) -> bool {
        false
    }
}
