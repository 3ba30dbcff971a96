//! Editor-facing services built on the compiler pipeline.

pub mod completion;
