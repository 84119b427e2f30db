pub type SiteId = u32;

/// Settings of one compiled site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Prefixed to every log line
    pub site_id: SiteId,
    /// Upper bound on the worker threads a concurrent block uses
    pub max_workers: usize,
    /// Deepest frame stack a request may build before it fails
    pub max_depth: usize,
    /// Unresolved names in expressions fail instead of evaluating to void
    pub strict_names: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig { site_id: 0, max_workers: 4, max_depth: 256, strict_names: false }
    }
}

impl SiteConfig {
    pub fn with_site_id(mut self, site_id: SiteId) -> Self {
        self.site_id = site_id;
        self
    }
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
    pub fn with_strict_names(mut self, strict_names: bool) -> Self {
        self.strict_names = strict_names;
        self
    }
}
