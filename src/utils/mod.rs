//! Utility module

mod span;
pub mod error;
pub mod diagnostics;

pub use span::Span;
pub use error::{Error, ErrorKind, Result};
pub use diagnostics::Diagnostics;
