//! Preprocessing-token lexer.
//!
//! Splits text into [`Token`]s using the pest grammar in `syntax/grammar.pest`.
//! Comments and horizontal whitespace collapse into a single [`Token::Space`];
//! newlines are kept because they end directives.

use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use crate::err_msg;
use crate::syntax::token::{LocationSpan, PpToken, Token, TokenKind};
use crate::IndigoError;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct PpLexer;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Tokenizes `text`, attaching source spans to every preprocessing token.
pub fn tokenize(text: &str) -> Result<Vec<Token>, IndigoError> {
    let mut pairs = PpLexer::parse(Rule::file, text)
        .map_err(|e| err_msg!(Internal, "Failed to tokenize input: {}", e))?;
    let Some(file) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut cursor = LineCursor::default();
    let mut tokens = Vec::new();
    for pair in file.into_inner() {
        if pair.as_rule() == Rule::EOI {
            break;
        }
        let start = cursor.position(pair.as_span().start(), text);
        let end = cursor.position(pair.as_span().end(), text);
        match pair.as_rule() {
            Rule::newline => tokens.push(Token::Newline),
            Rule::space | Rule::comment => {
                if tokens.last() != Some(&Token::Space) {
                    tokens.push(Token::Space);
                }
            }
            _ => {
                let span = LocationSpan::new(start.0, start.1, end.0, end.1);
                tokens.push(Token::Pp(to_pp_token(pair).with_span(span)));
            }
        }
    }
    Ok(tokens)
}

/// Preprocessing tokens of `text`, without whitespace or spans.
pub fn pp_tokens(text: &str) -> Vec<PpToken> {
    tokenize(text)
        .map(|tokens| {
            tokens
                .into_iter()
                .filter_map(|t| match t {
                    Token::Pp(mut tok) => {
                        tok.span = None;
                        Some(tok)
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// True if `text` is exactly one well-formed preprocessing token.
pub fn is_single_token(text: &str) -> bool {
    match tokenize(text) {
        Ok(tokens) => matches!(
            tokens.as_slice(),
            [Token::Pp(tok)] if tok.kind != TokenKind::Unterminated
        ),
        Err(_) => false,
    }
}

/// True if `text` is exactly one string literal.
pub fn is_string_literal(text: &str) -> bool {
    match tokenize(text) {
        Ok(tokens) => matches!(tokens.as_slice(), [Token::Pp(tok)] if tok.kind == TokenKind::Str),
        Err(_) => false,
    }
}

/// True if writing `left` immediately followed by `right` would not read back
/// as the same two tokens.
pub fn tokens_would_merge(left: &str, right: &str) -> bool {
    if left.is_empty() || right.is_empty() {
        return false;
    }
    if left.ends_with('/') && (right.starts_with('*') || right.starts_with('/')) {
        return true;
    }
    let joined = format!("{left}{right}");
    let relexed = pp_tokens(&joined);
    !(relexed.len() == 2 && relexed[0].text == left && relexed[1].text == right)
}

// ============================================================================
// HELPERS
// ============================================================================

fn to_pp_token(pair: Pair<Rule>) -> PpToken {
    let kind = match pair.as_rule() {
        Rule::identifier => TokenKind::Name,
        Rule::pp_number => TokenKind::Number,
        Rule::string_literal => TokenKind::Str,
        Rule::char_literal => TokenKind::Char,
        Rule::punctuator => TokenKind::Punct,
        Rule::unterminated => TokenKind::Unterminated,
        _ => TokenKind::Other,
    };
    PpToken::new(kind, pair.as_str())
}

/// Converts byte offsets into (line, column) pairs. Offsets must be visited in
/// non-decreasing order.
#[derive(Debug)]
struct LineCursor {
    offset: usize,
    line: u32,
    line_start: usize,
}

impl Default for LineCursor {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            line_start: 0,
        }
    }
}

impl LineCursor {
    fn position(&mut self, offset: usize, text: &str) -> (u32, u32) {
        if offset > self.offset {
            for (i, b) in text.as_bytes()[self.offset..offset].iter().enumerate() {
                if *b == b'\n' {
                    self.line += 1;
                    self.line_start = self.offset + i + 1;
                }
            }
            self.offset = offset;
        }
        (self.line, (offset - self.line_start) as u32)
    }
}
