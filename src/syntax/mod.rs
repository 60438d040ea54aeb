//! Tokens, the preprocessing-token lexer and the input stack.

pub mod input;
pub mod lexer;
pub mod token;

pub use input::{InputHandle, InputPosition, InputStack, TokenSource};
pub use lexer::tokenize;
pub use token::{CallId, LocationSpan, Marker, PpToken, Token, TokenKind};
