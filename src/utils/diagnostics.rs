//! Error accumulation for the semantic passes
//!
//! Name resolution and type checking keep going after an error so a single
//! run reports everything. Errors land here instead of being returned.

use std::collections::HashSet;

use log::debug;

use crate::utils::error::{Error, ErrorKind};
use crate::utils::Span;

/// Accumulated compiler errors
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Error>,
    /// Spans that already carry an error; repeats are dropped
    seen: HashSet<Span>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. A second error at the same span is suppressed.
    pub fn report(&mut self, error: Error) {
        if let Some(span) = error.span() {
            if !self.seen.insert(span) {
                debug!("suppressed repeated error at {:?}: {}", span, error);
                return;
            }
        }
        debug!("recorded error: {}", error);
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of recorded errors of the given kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}
