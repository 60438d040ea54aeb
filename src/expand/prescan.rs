//! Prescan: `#` and `##` over the raw arguments.
//!
//! The replacement list is copied into a token buffer wrapped in separators.
//! Stringized parameters become string literals and pasted operands are joined
//! into single tokens, both from the unexpanded arguments. Parameters not
//! touched by either operator stay as [`Token::Param`] for substitution.

use tracing::debug;

use crate::errors::DiagnosticKind;
use crate::expand::Expander;
use crate::macros::{MacroDef, ReplItem};
use crate::syntax::lexer::{is_single_token, is_string_literal, pp_tokens};
use crate::syntax::token::{strip_markers, PpToken, Token, TokenKind};

/// One side of a `##`.
enum Operand {
    Empty,
    Token(PpToken),
}

impl<'a> Expander<'a> {
    pub fn prescan(&mut self, def: &MacroDef, args: &[Vec<Token>]) -> Vec<Token> {
        let mut out = vec![Token::Separator];
        let mut items = def.replacement.iter().peekable();

        while let Some(item) = items.next() {
            match item {
                ReplItem::Token(tok) => out.push(Token::Pp(tok.clone())),
                ReplItem::Space => {
                    if !matches!(out.last(), Some(Token::Space | Token::Separator)) {
                        out.push(Token::Space);
                    }
                }
                ReplItem::Param(n) => {
                    if self.elides_comma_before(def, *n, args) {
                        drop_trailing_comma(&mut out);
                    }
                    out.push(Token::Param(*n));
                }
                ReplItem::Stringize(n) => {
                    let tok = self.stringize(raw_arg(args, *n));
                    out.push(Token::Pp(tok));
                }
                ReplItem::Paste => {
                    let right_item = loop {
                        match items.next() {
                            Some(ReplItem::Space) => continue,
                            other => break other,
                        }
                    };
                    self.paste(def, args, &mut out, right_item);
                }
            }
        }
        out.push(Token::Separator);
        debug!(name = %def.name, tokens = out.len(), "prescan");
        out
    }

    /// Joins the last operand already in `out` with `right`, leaving the
    /// result followed by a separator.
    fn paste(
        &mut self,
        def: &MacroDef,
        args: &[Vec<Token>],
        out: &mut Vec<Token>,
        right: Option<&ReplItem>,
    ) {
        while out.len() > 1 && matches!(out.last(), Some(Token::Space | Token::Separator)) {
            out.pop();
        }

        let left = match out.last() {
            Some(Token::Param(n)) => {
                let n = *n;
                out.pop();
                let mut tokens = strip_markers(raw_arg(args, n));
                while matches!(tokens.last(), Some(Token::Space | Token::Separator)) {
                    tokens.pop();
                }
                match tokens.pop() {
                    Some(Token::Pp(tok)) => {
                        out.extend(tokens);
                        Operand::Token(tok.unmarked())
                    }
                    _ => Operand::Empty,
                }
            }
            Some(Token::Pp(_)) if out.len() > 1 => match out.pop() {
                Some(Token::Pp(tok)) => Operand::Token(tok.unmarked()),
                _ => Operand::Empty,
            },
            _ => Operand::Empty,
        };

        let mut rest = Vec::new();
        let right = match right {
            Some(ReplItem::Stringize(n)) => Operand::Token(self.stringize(raw_arg(args, *n))),
            Some(ReplItem::Param(n)) => {
                if self.elides_comma_before(def, *n, args)
                    && matches!(&left, Operand::Token(t) if t.is_punct(","))
                {
                    out.push(Token::Separator);
                    return;
                }
                let mut tokens = strip_markers(raw_arg(args, *n)).into_iter();
                let first = tokens.find(|t| !t.is_white());
                rest = tokens.filter(|t| *t != Token::Separator).collect();
                match first {
                    Some(Token::Pp(tok)) => Operand::Token(tok.unmarked()),
                    _ => Operand::Empty,
                }
            }
            Some(ReplItem::Token(tok)) => Operand::Token(tok.unmarked()),
            _ => Operand::Empty,
        };

        match (left, right) {
            (Operand::Empty, Operand::Empty) => {}
            (Operand::Token(tok), Operand::Empty) | (Operand::Empty, Operand::Token(tok)) => {
                out.push(Token::Pp(tok));
            }
            (Operand::Token(l), Operand::Token(r)) => {
                let joined = format!("{}{}", l.text, r.text);
                let tokens = pp_tokens(&joined);
                if !is_single_token(&joined) {
                    self.diagnose(DiagnosticKind::InvalidPastedToken {
                        text: joined.clone(),
                    });
                }
                if tokens.is_empty() {
                    out.push(Token::Pp(PpToken::new(TokenKind::Other, joined)));
                } else {
                    out.extend(tokens.into_iter().map(Token::Pp));
                }
            }
        }
        out.push(Token::Separator);
        out.extend(rest);
    }

    /// Makes a string literal from an unexpanded argument.
    pub fn stringize(&mut self, arg: &[Token]) -> PpToken {
        let mut text = String::from("\"");
        let mut stray_backslash = false;
        for token in strip_markers(arg) {
            match token {
                Token::Space | Token::Newline => {
                    if !text.ends_with(' ') && text.len() > 1 {
                        text.push(' ');
                    }
                }
                Token::Pp(tok) => match tok.kind {
                    TokenKind::Str | TokenKind::Char | TokenKind::Unterminated => {
                        for c in tok.text.chars() {
                            if c == '"' || c == '\\' {
                                text.push('\\');
                            }
                            text.push(c);
                        }
                    }
                    _ => {
                        if tok.text == "\\" {
                            stray_backslash = true;
                        }
                        text.push_str(&tok.text);
                    }
                },
                _ => {}
            }
        }
        if text.ends_with(' ') && text.len() > 1 {
            text.pop();
        }
        text.push('"');

        if stray_backslash {
            if !is_string_literal(&text) {
                self.diagnose(DiagnosticKind::InvalidStringLiteral { text: text.clone() });
            }
        } else if text.len() > self.config.max_string_len {
            self.diagnose(DiagnosticKind::StringTooLong {
                limit: self.config.max_string_len,
                text: text.clone(),
            });
        }
        PpToken::string(text)
    }

    /// True if `slot` is an empty `__VA_ARGS__` whose preceding comma should go.
    fn elides_comma_before(&self, def: &MacroDef, slot: usize, args: &[Vec<Token>]) -> bool {
        self.config.elide_empty_variadic_comma
            && def.is_variadic()
            && slot + 1 == def.slots()
            && !raw_arg(args, slot).iter().any(|t| t.pp().is_some())
    }
}

fn raw_arg(args: &[Vec<Token>], slot: usize) -> &[Token] {
    args.get(slot).map_or(&[], Vec::as_slice)
}

fn drop_trailing_comma(out: &mut Vec<Token>) {
    let Some(pos) = out.iter().rposition(|t| !t.is_white()) else {
        return;
    };
    if out[pos].is_punct(",") {
        out.truncate(pos);
    }
}
