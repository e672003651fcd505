//! Code generation trait - backend abstraction

use std::fmt;

use crate::frontend::ast::Program;
use crate::frontend::resolve::Bindings;
use crate::frontend::typeck::TypeInfo;
use crate::utils::Result;

/// Generated assembly, kept as its two sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub data: String,
    pub text: String,
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)?;
        f.write_str(&self.text)
    }
}

/// Code generation backend trait
pub trait CodeGen {
    /// Generate assembly for a program that passed every semantic check
    fn generate(&mut self, program: &Program, bindings: &Bindings, types: &TypeInfo) -> Result<Assembly>;

    /// Target architecture name
    fn target(&self) -> &str;

    /// Backend name
    fn name(&self) -> &str;
}
