//! # Bytecode backend
//!
//! Translation of the grammar AST into a flat byte program plus the
//! disassembler over it. The instruction set lives in [`op`], the program
//! container in [`ir`].

pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;

pub use self::ir::Program;
