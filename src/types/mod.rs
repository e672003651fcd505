//! Type model

pub mod type_system;

pub use type_system::{Type, WORD};
