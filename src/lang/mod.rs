//! # Grammar AST
//!
//! The tree built by the parser and walked by the code generator. Rules sit
//! under a single `Grammar` node; each rule's right-hand side is a flat,
//! ordered term list with `Alternate` markers where `|` occurred.

pub mod node;
