//! Structured Feedback Module
//!
//! Machine-readable reports for `--error-format json`, and the plain one-line
//! rendering used otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::{Error, ErrorKind, Span};

// ==================== Structured Error Report ====================

/// One reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code (e.g., "E0201")
    pub code: String,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Location information
    pub location: Option<Location>,

    /// Suggested fixes
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Location {
    /// Convert a span into 1-based line and column within `source`
    pub fn from_span(span: Span, file: &str, source: &str) -> Self {
        let (line, column) = span.line_col(source);
        let end = Span::new(span.end, span.end, span.file_id);
        let (end_line, end_column) = end.line_col(source);
        Self {
            file: file.to_string(),
            line,
            column,
            end_line,
            end_column,
        }
    }
}

// ==================== Compilation Feedback ====================

/// Everything one compiler run has to say
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationFeedback {
    pub success: bool,

    /// Source file
    pub source_file: String,

    /// All errors and warnings
    pub diagnostics: Vec<ErrorReport>,

    pub stats: CompilationStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationStats {
    /// Number of functions, runtime library excluded
    pub function_count: usize,
    pub global_count: usize,
    pub struct_count: usize,
    /// Lines of source
    pub loc: usize,
    /// Lines of generated assembly
    pub asm_lines: usize,
}

// ==================== Error Conversion ====================

impl ErrorReport {
    /// Create an error report from a compiler error
    pub fn from_error(error: &Error, file: &str, source: &str) -> Self {
        Self {
            code: error_code(error).to_string(),
            severity: Severity::Error,
            message: error.to_string(),
            location: error.span().map(|s| Location::from_span(s, file, source)),
            suggestions: suggestions_for(error),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if let Some(loc) = &self.location {
            write!(f, "{}:{}:{}: ", loc.file, loc.line, loc.column)?;
        }
        write!(f, "{}[{}]: {}", severity, self.code, self.message)?;
        for suggestion in &self.suggestions {
            write!(f, "\n  help: {}", suggestion)?;
        }
        Ok(())
    }
}

fn error_code(error: &Error) -> &'static str {
    match error.kind() {
        ErrorKind::Syntax => "E0001",
        ErrorKind::DuplicateDeclaration => "E0101",
        ErrorKind::UnboundReference => "E0102",
        ErrorKind::TypeError => "E0201",
        ErrorKind::Backend => "E0301",
    }
}

fn suggestions_for(error: &Error) -> Vec<String> {
    match error {
        Error::DuplicateDeclaration { name, .. } => {
            vec![format!("rename one of the declarations of '{}'", name)]
        }
        Error::UnboundReference { name, .. } => {
            vec![format!("declare '{}' before this use", name)]
        }
        Error::RegisterExhaustion => {
            vec!["split the expression using local variables".to_string()]
        }
        _ => Vec::new(),
    }
}

impl CompilationFeedback {
    pub fn success(source_file: String, stats: CompilationStats) -> Self {
        Self {
            success: true,
            source_file,
            diagnostics: vec![],
            stats,
        }
    }

    pub fn failure(source_file: String, errors: Vec<ErrorReport>, stats: CompilationStats) -> Self {
        Self {
            success: false,
            source_file,
            diagnostics: errors,
            stats,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
