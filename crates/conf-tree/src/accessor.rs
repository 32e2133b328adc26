//! Configuration accessor trait and level scoping

/// Read access to a path-addressed configuration tree.
///
/// Paths are sequences of string segments. The accessor is read-only from
/// the pipeline's perspective and safe to query repeatedly; extractors may
/// call it any number of times per run.
pub trait ConfigAccessor: Send + Sync {
    /// Whether a node exists at `path`
    fn exists(&self, path: &[&str]) -> bool;

    /// First value stored at `path`, if any
    fn value(&self, path: &[&str]) -> Option<String>;

    /// All values stored at `path`, in the tree's reported order
    fn values(&self, path: &[&str]) -> Vec<String>;
}

/// A level-scoped view over another accessor.
///
/// Replaces the mutable `set_level` of classic configuration back ends with
/// an explicit wrapper: queries against the scoped view are resolved with
/// the base path prepended, and the underlying accessor stays untouched.
pub struct Scoped<'a> {
    inner: &'a dyn ConfigAccessor,
    base: Vec<String>,
}

impl<'a> Scoped<'a> {
    /// Scope `inner` to `base`
    pub fn new(inner: &'a dyn ConfigAccessor, base: &[&str]) -> Self {
        Self {
            inner,
            base: base.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn full<'p>(&'p self, path: &[&'p str]) -> Vec<&'p str> {
        let mut segments: Vec<&str> = self.base.iter().map(String::as_str).collect();
        segments.extend_from_slice(path);
        segments
    }
}

impl ConfigAccessor for Scoped<'_> {
    fn exists(&self, path: &[&str]) -> bool {
        self.inner.exists(&self.full(path))
    }

    fn value(&self, path: &[&str]) -> Option<String> {
        self.inner.value(&self.full(path))
    }

    fn values(&self, path: &[&str]) -> Vec<String> {
        self.inner.values(&self.full(path))
    }
}
