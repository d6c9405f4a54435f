//! Aether Script front end: tokens, lexer, syntax tree, parser and printer

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod printer;

pub use parser::{parse_expression, parse_module};
pub use printer::{print_module, PrintOptions};
