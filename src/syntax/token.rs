//! Token model shared by the lexer, the input stack and the expansion engine.
//!
//! A [`PpToken`] is a real preprocessing token. A [`Token`] is one element of
//! the stream the engine reads and writes: besides preprocessing tokens it
//! carries whitespace, separators that keep adjacent tokens from gluing, and the
//! tagged trace markers used by the call annotator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position range of a token or macro call.
///
/// Lines are 1-based, columns are 0-based byte offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationSpan {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl LocationSpan {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Span from the start of `self` to the end of `end`.
    pub fn to(self, end: LocationSpan) -> Self {
        Self {
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: end.end_line,
            end_col: end.end_col,
        }
    }
}

impl fmt::Display for LocationSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// Lexical class of a preprocessing token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Char,
    Punct,
    /// A single character that fits no other class (`@`, a stray `\`).
    Other,
    /// A string or character literal missing its closing quote.
    Unterminated,
}

/// A preprocessing token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpToken {
    pub kind: TokenKind,
    pub text: String,
    /// Permanently disabled for expansion ("painted blue").
    #[serde(default)]
    pub painted: bool,
    /// Name read from the source file while collecting macro arguments.
    #[serde(default)]
    pub from_source: bool,
    #[serde(default)]
    pub span: Option<LocationSpan>,
}

impl PpToken {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            painted: false,
            from_source: false,
            span: None,
        }
    }

    pub fn name(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Name, text)
    }

    pub fn punct(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Punct, text)
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Number, text)
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Str, text)
    }

    pub fn with_span(mut self, span: LocationSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    /// A copy with the paint and source marks removed, as produced by pasting
    /// or stringizing.
    pub fn unmarked(&self) -> Self {
        Self {
            painted: false,
            from_source: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for PpToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Index of a traced macro call within one top-level expansion.
pub type CallId = usize;

/// Trace annotation boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    CallStart(CallId),
    CallEnd(CallId),
    ArgStart { call: CallId, arg: usize },
    ArgEnd { call: CallId, arg: usize },
}

impl Marker {
    pub fn is_start(&self) -> bool {
        matches!(self, Marker::CallStart(_) | Marker::ArgStart { .. })
    }

    /// The marker closing (or opening) the same region.
    pub fn partner(&self) -> Marker {
        match *self {
            Marker::CallStart(id) => Marker::CallEnd(id),
            Marker::CallEnd(id) => Marker::CallStart(id),
            Marker::ArgStart { call, arg } => Marker::ArgEnd { call, arg },
            Marker::ArgEnd { call, arg } => Marker::ArgStart { call, arg },
        }
    }
}

/// One element of the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Pp(PpToken),
    /// Horizontal whitespace or a comment.
    Space,
    Newline,
    /// Zero-width boundary rendered as a space only when needed to keep the
    /// neighbouring tokens apart.
    Separator,
    /// Formal parameter reference left by the prescanner.
    Param(usize),
    Marker(Marker),
    /// Placeholder for a `_Pragma` operator, indexing the engine's pragma list.
    Pragma(usize),
    /// End of a stacked macro argument.
    RescanEnd,
    Eof,
}

impl Token {
    pub fn pp(&self) -> Option<&PpToken> {
        match self {
            Token::Pp(tok) => Some(tok),
            _ => None,
        }
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.pp().is_some_and(|tok| tok.is_punct(text))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Token::Marker(_))
    }

    /// Space, newline or separator.
    pub fn is_white(&self) -> bool {
        matches!(self, Token::Space | Token::Newline | Token::Separator)
    }

    /// Length of the token's text as it would be written out.
    pub fn text_len(&self) -> usize {
        match self {
            Token::Pp(tok) => tok.text.len(),
            Token::Space | Token::Newline | Token::Separator => 1,
            _ => 0,
        }
    }
}

impl From<PpToken> for Token {
    fn from(tok: PpToken) -> Self {
        Token::Pp(tok)
    }
}

/// Drops every trace marker from `tokens`.
pub fn strip_markers(tokens: &[Token]) -> Vec<Token> {
    tokens.iter().filter(|t| !t.is_marker()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_partners_round_trip() {
        let start = Marker::ArgStart { call: 3, arg: 1 };
        assert_eq!(start.partner(), Marker::ArgEnd { call: 3, arg: 1 });
        assert_eq!(start.partner().partner(), start);
        assert!(start.is_start());
        assert!(!Marker::CallEnd(0).is_start());
    }

    #[test]
    fn unmarked_clears_paint_and_source_flags() {
        let mut tok = PpToken::name("FOO");
        tok.painted = true;
        tok.from_source = true;
        let clean = tok.unmarked();
        assert!(!clean.painted && !clean.from_source);
        assert_eq!(clean.text, "FOO");
    }

    #[test]
    fn span_display_matches_trace_format() {
        let span = LocationSpan::new(3, 4, 3, 12);
        assert_eq!(span.to_string(), "3:4-3:12");
    }
}
