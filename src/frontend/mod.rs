//! Frontend module - lexing, parsing and the two semantic passes

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod scope;
pub mod resolve;
pub mod typeck;
