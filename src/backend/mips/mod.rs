//! MIPS backend targeting the SPIM simulator

pub mod frame;
pub mod mips_codegen;
pub mod registers;

pub use mips_codegen::MipsCodeGen;
