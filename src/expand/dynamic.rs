//! Built-in macros computed at expansion time: `__LINE__`, `__FILE__` and the
//! `_Pragma` operator.

use tracing::debug;

use crate::errors::DiagnosticKind;
use crate::expand::render::render;
use crate::expand::Expander;
use crate::macros::DynamicKind;
use crate::syntax::token::{strip_markers, PpToken, Token, TokenKind};

impl<'a> Expander<'a> {
    /// Current value of `__LINE__` or `__FILE__`.
    pub fn dynamic_value(&mut self, kind: DynamicKind) -> PpToken {
        match kind {
            DynamicKind::CurrentLine => {
                let line = self.input.current_line();
                if line == 0 || u64::from(line) > self.config.max_line_number {
                    self.diagnose(DiagnosticKind::LineOutOfRange {
                        line: i64::from(line),
                    });
                }
                PpToken::number(line.to_string())
            }
            DynamicKind::CurrentFile => PpToken::string(quote(self.input.current_filename())),
            DynamicKind::PragmaOperator => PpToken::name("_Pragma"),
        }
    }

    /// Turns the expanded operand of `_Pragma` into a pragma placeholder.
    /// An operand that is not a single string literal is reported and
    /// dropped.
    pub fn pragma_operator(&mut self, expanded: Vec<Token>) -> Vec<Token> {
        let operand = strip_markers(&expanded);
        let mut literals = operand.iter().filter_map(Token::pp);
        match (literals.next(), literals.next()) {
            (Some(tok), None) if tok.kind == TokenKind::Str => {
                let text = destringize(&tok.text);
                debug!(%text, "pragma operator");
                let index = self.state.pragmas.len();
                self.state.pragmas.push(text);
                vec![Token::Pragma(index)]
            }
            _ => {
                self.diagnose(DiagnosticKind::PragmaOperand {
                    text: render(&operand, &[]),
                });
                Vec::new()
            }
        }
    }
}

/// `name` as a string literal.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Body of a string literal with its encoding prefix and quotes removed and
/// `\"` and `\\` unescaped.
pub fn destringize(literal: &str) -> String {
    let body = literal
        .find('"')
        .map_or(literal, |start| &literal[start + 1..]);
    let body = body.strip_suffix('"').unwrap_or(body);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::testing::Harness;
    use crate::syntax::input::TokenSource;
    use crate::syntax::lexer::tokenize;

    #[test]
    fn quote_escapes_backslashes() {
        assert_eq!(quote(r"C:\src\a.c"), r#""C:\\src\\a.c""#);
    }

    #[test]
    fn destringize_drops_prefix_and_escapes() {
        assert_eq!(destringize(r#"L"once \"x\" \\ y""#), r#"once "x" \ y"#);
        assert_eq!(destringize(r#""STDC FP_CONTRACT ON""#), "STDC FP_CONTRACT ON");
    }

    #[test]
    fn line_and_file_follow_the_input() {
        let mut h = Harness::new(&[], "a\nb\nc");
        for _ in 0..3 {
            h.input.next_token();
        }
        let (line, file) = h.run(|exp| {
            (
                exp.dynamic_value(DynamicKind::CurrentLine),
                exp.dynamic_value(DynamicKind::CurrentFile),
            )
        });
        assert_eq!(line.text, "2");
        assert_eq!(file.text, "\"t.c\"");
    }

    #[test]
    fn pragma_needs_a_string_literal() {
        let mut h = Harness::new(&[], "");
        let out = h.run(|exp| exp.pragma_operator(tokenize("\"once\"").unwrap()));
        assert_eq!(out, vec![Token::Pragma(0)]);
        assert_eq!(h.state.pragmas, vec!["once".to_string()]);

        let out = h.run(|exp| exp.pragma_operator(tokenize("once").unwrap()));
        assert!(out.is_empty());
        assert_eq!(h.sink.count("pragma_operand"), 1);
    }
}
