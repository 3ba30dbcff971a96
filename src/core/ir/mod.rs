pub mod builder;
pub mod format;
pub mod model;
pub mod verify;

pub use builder::FunctionBuilder;
pub use format::{format_function, format_module, format_witness_table};
pub use model::*;
pub use verify::{VerifyError, VerifyErrorKind, verify_function, verify_module};
