//! Runtime library available to every program

pub mod runtime;

pub use runtime::{RuntimeLibrary, Syscall};
