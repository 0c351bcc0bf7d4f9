/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Path or name used in diagnostic locations.
    pub label: String,
    /// Whether engine log entries carry `path:line:col` text.
    pub include_source_locations: bool,
    /// Whether [`crate::Generator::debug_tree`] zeroes rule spans.
    pub strip_locations_in_debug_output: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            label: "grammar".to_string(),
            include_source_locations: true,
            strip_locations_in_debug_output: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_source_locations(mut self, include: bool) -> Self {
        self.include_source_locations = include;
        self
    }

    pub fn with_stripped_locations(mut self, strip: bool) -> Self {
        self.strip_locations_in_debug_output = strip;
        self
    }
}
