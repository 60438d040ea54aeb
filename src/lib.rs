pub use crate::diagnostics::{to_error_source, ErrorContext, IndigoError, SourceArc};
pub use crate::engine::{Expansion, ExpansionEngine, ExpansionOutcome, PragmaOperator};

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod expand;
pub mod macros;
pub mod syntax;
