//! Macro definitions and the macro table.
//!
//! - [`types`]: `MacroDef`, `Arity`, `ReplItem`.
//! - [`definition`]: compiling `#define` text.
//! - [`registry`]: the `MacroTable` trait and `MacroRegistry`.

pub mod definition;
pub mod registry;
pub mod types;

pub use definition::parse_definition;
pub use registry::{MacroRegistry, MacroTable};
pub use types::{Arity, DynamicKind, MacroDef, ReplItem, VA_ARGS};
