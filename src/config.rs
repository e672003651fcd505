//! Compiler options

use clap::ValueEnum;

/// How diagnostics are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ErrorFormat {
    /// `file:line:col: message`
    #[default]
    Human,
    /// A serialized `CompilationFeedback`
    Json,
}

/// Options threaded through the driver and the code generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Function the program starts in; it exits instead of returning
    pub entry: String,
    /// Emit `#` comments marking functions and statements
    pub annotate: bool,
    pub error_format: ErrorFormat,
}

impl CompilerOptions {
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn with_error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            annotate: true,
            error_format: ErrorFormat::Human,
        }
    }
}
