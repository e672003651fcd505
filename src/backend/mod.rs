//! Backend module - Code generation

pub mod codegen;

// MIPS Backend
pub mod mips;

pub use codegen::{Assembly, CodeGen};
pub use mips::MipsCodeGen;
