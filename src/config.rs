//! Build configuration.

/// Options controlling a reference model build.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuildConfig {
    /// Publish informational markers on advice sources and advised targets.
    pub reference_markers: bool,
    /// Synthesize definitions for `<tx:annotation-driven/>`.
    pub transactional_advice: bool,
    /// Also check for cancellation between definitions of one artifact.
    pub cancellation_check_per_definition: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            reference_markers: true,
            transactional_advice: true,
            cancellation_check_per_definition: false,
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_markers(mut self, enabled: bool) -> Self {
        self.reference_markers = enabled;
        self
    }

    pub fn with_transactional_advice(mut self, enabled: bool) -> Self {
        self.transactional_advice = enabled;
        self
    }

    pub fn with_cancellation_check_per_definition(mut self, enabled: bool) -> Self {
        self.cancellation_check_per_definition = enabled;
        self
    }
}
