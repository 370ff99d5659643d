//! Newick text format: tokenizer, parser and writer.

mod lexer;
mod parser;
mod writer;

pub use parser::{parse, Parsed};
pub use writer::{to_newick, NewickStyle};
