//! Context configuration.

/// Options fixed when a [`GraphicsContext`](crate::GraphicsContext) is created.
///
/// # Example
///
/// ```ignore
/// let config = ContextConfig::new()
///     .with_uniform_type_checks(true)
///     .with_texture_unit_limit(8)
///     .with_label("main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextConfig {
    /// Reject uniform writes whose type disagrees with the reflected type.
    pub uniform_type_checks: bool,
    /// Upload only the dirty range of uniform blocks, and skip clean blocks.
    ///
    /// When disabled every commit re-uploads every block in full.
    pub persistent_uniform_buffers: bool,
    /// Track every allocation in the [`ResourceRegistry`](crate::ResourceRegistry).
    pub leak_tracking: bool,
    /// Upper bound on texture units a single program may use.
    ///
    /// The effective pool size is the minimum of this and the device limit.
    pub texture_unit_limit: u32,
    /// Debug label for the context.
    pub label: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            uniform_type_checks: cfg!(debug_assertions),
            persistent_uniform_buffers: true,
            leak_tracking: cfg!(debug_assertions),
            texture_unit_limit: u32::MAX,
            label: None,
        }
    }
}

impl ContextConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable uniform type checking.
    pub fn with_uniform_type_checks(mut self, enabled: bool) -> Self {
        self.uniform_type_checks = enabled;
        self
    }

    /// Enable or disable persistent uniform buffers with partial uploads.
    pub fn with_persistent_uniform_buffers(mut self, enabled: bool) -> Self {
        self.persistent_uniform_buffers = enabled;
        self
    }

    /// Enable or disable the allocation registry.
    pub fn with_leak_tracking(mut self, enabled: bool) -> Self {
        self.leak_tracking = enabled;
        self
    }

    /// Cap the number of texture units a program may use.
    pub fn with_texture_unit_limit(mut self, limit: u32) -> Self {
        self.texture_unit_limit = limit;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::new();
        assert!(config.persistent_uniform_buffers);
        assert_eq!(config.uniform_type_checks, cfg!(debug_assertions));
        assert_eq!(config.texture_unit_limit, u32::MAX);
        assert!(config.label.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ContextConfig::new()
            .with_uniform_type_checks(false)
            .with_persistent_uniform_buffers(false)
            .with_texture_unit_limit(4)
            .with_label("offscreen");
        assert!(!config.uniform_type_checks);
        assert!(!config.persistent_uniform_buffers);
        assert_eq!(config.texture_unit_limit, 4);
        assert_eq!(config.label.as_deref(), Some("offscreen"));
    }
}
