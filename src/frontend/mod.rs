//! # Grammar frontend
//!
//! Lexing and parsing of EBNF source text. The lexer hands out one token at
//! a time with a single slot of pushback; the parser is a small recursive
//! descent over the grammar's own grammar and produces the AST in
//! [`crate::lang::node`].

pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;
