//! Untyped, range-tagged syntax and the parser that produces it.

mod ast;
mod parser;

pub use ast::*;
pub use parser::{parse_program, ParseError};
