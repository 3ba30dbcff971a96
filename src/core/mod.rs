//! Compiler pipeline and language model.

pub mod conformance;
pub mod diag;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod parse;
pub mod prelude;
pub mod resolve;
pub mod session;
pub mod tree;
pub mod typecheck;
pub mod types;
