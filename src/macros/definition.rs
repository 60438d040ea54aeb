//! Compiles `#define` text into a [`MacroDef`].
//!
//! Input is everything after the `define` keyword: the macro name, an optional
//! parameter list that must touch the name, and the replacement list.

use miette::SourceSpan;

use crate::diagnostics::{to_error_source, RelatedLabel, SourceArc};
use crate::err_ctx;
use crate::macros::types::{Arity, MacroDef, ReplItem, VA_ARGS};
use crate::syntax::lexer::tokenize;
use crate::syntax::token::{LocationSpan, PpToken, Token};
use crate::{ErrorContext, IndigoError};

/// Parses a definition such as `SQ(x) ((x)*(x))` or `FIVE 5`.
///
/// # Example
/// ```rust
/// use indigo::macros::parse_definition;
/// let def = parse_definition("CAT(a, b) a ## b").unwrap();
/// assert_eq!(def.name, "CAT");
/// assert_eq!(def.slots(), 2);
/// ```
pub fn parse_definition(text: &str) -> Result<MacroDef, IndigoError> {
    let src = to_error_source("<define>", text);
    let tokens: Vec<Token> = tokenize(text)?
        .into_iter()
        .filter(|t| *t != Token::Newline)
        .collect();
    let mut cursor = DefCursor {
        tokens: &tokens,
        pos: 0,
        text,
        src: &src,
    };

    cursor.skip_space();
    let name = match cursor.next() {
        Some(Token::Pp(tok)) if tok.is_name() => tok.clone(),
        Some(Token::Pp(tok)) => {
            return Err(err_ctx!(
                Definition,
                format!("Not an identifier \"{}\"", tok.text),
                &src,
                cursor.byte_span(tok)
            ))
        }
        _ => {
            return Err(err_ctx!(
                Definition,
                "No macro name",
                &src,
                SourceSpan::from(0..text.len())
            ))
        }
    };
    if name.text == "defined" {
        return Err(err_ctx!(
            Definition,
            "\"defined\" shouldn't be defined",
            &src,
            cursor.byte_span(&name)
        ));
    }

    let (arity, params) = if cursor.peek().is_some_and(|t| t.is_punct("(")) {
        cursor.next();
        cursor.parameter_list()?
    } else {
        if cursor.peek().is_some_and(|t| !t.is_white()) {
            // C99 requires white space after an object-like macro name.
            tracing::warn!(macro_name = %name.text, "no space between macro name and replacement list");
        }
        (Arity::ObjectLike, Vec::new())
    };

    let replacement = cursor.replacement_list(&arity, &params)?;
    MacroDef::new(name.text, arity, params, replacement).map_err(|e| {
        IndigoError::Definition {
            message: e.message().to_string(),
            ctx: ErrorContext::with_source_and_span(
                SourceArc::clone(&src),
                SourceSpan::from(0..text.len()),
            ),
            source: None,
        }
    })
}

struct DefCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    text: &'a str,
    src: &'a SourceArc,
}

impl<'a> DefCursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(Token::is_white) {
            self.pos += 1;
        }
    }

    /// Byte range of a token within the definition text.
    fn byte_span(&self, tok: &PpToken) -> SourceSpan {
        let Some(LocationSpan {
            start_line,
            start_col,
            ..
        }) = tok.span
        else {
            return SourceSpan::from(0..self.text.len());
        };
        let line_offset: usize = self
            .text
            .split_inclusive('\n')
            .take(start_line.saturating_sub(1) as usize)
            .map(str::len)
            .sum();
        let start = line_offset + start_col as usize;
        SourceSpan::from(start..start + tok.text.len())
    }

    fn error_at(&self, message: impl Into<String>, tok: Option<&PpToken>) -> IndigoError {
        let span = tok.map_or(SourceSpan::from(self.text.len()..self.text.len()), |t| {
            self.byte_span(t)
        });
        err_ctx!(Definition, message.into(), self.src, span)
    }

    /// Reads `a, b, ...)` after the opening parenthesis.
    fn parameter_list(&mut self) -> Result<(Arity, Vec<String>), IndigoError> {
        let mut params: Vec<String> = Vec::new();
        let mut first_seen: Vec<PpToken> = Vec::new();
        let mut variadic = false;

        self.skip_space();
        if self.peek().is_some_and(|t| t.is_punct(")")) {
            self.next();
            return Ok((Arity::FunctionLike { params: 0, variadic: false }, params));
        }

        loop {
            self.skip_space();
            let tok = match self.next() {
                Some(Token::Pp(tok)) => tok,
                _ => return Err(self.error_at("Missing \")\" in parameter list", None)),
            };
            if tok.is_punct("...") {
                variadic = true;
            } else if tok.is_name() {
                if tok.text == VA_ARGS {
                    return Err(self.error_at(
                        "\"__VA_ARGS__\" cannot be used as a parameter name",
                        Some(tok),
                    ));
                }
                if let Some(prev) = first_seen.iter().find(|p| p.text == tok.text) {
                    let mut err =
                        self.error_at(format!("Duplicate parameter names \"{}\"", tok.text), Some(tok));
                    if let IndigoError::Definition { ctx, .. } = &mut err {
                        ctx.related.push(RelatedLabel {
                            span: self.byte_span(prev),
                            label: "first declared here".to_string(),
                        });
                    }
                    return Err(err);
                }
                first_seen.push(tok.clone());
                params.push(tok.text.clone());
            } else {
                return Err(self.error_at(format!("Illegal parameter \"{}\"", tok.text), Some(tok)));
            }

            self.skip_space();
            match self.next() {
                Some(Token::Pp(sep)) if sep.is_punct(")") => break,
                Some(Token::Pp(sep)) if sep.is_punct(",") && !variadic => continue,
                Some(Token::Pp(sep)) => {
                    return Err(self.error_at(
                        format!("Illegal token \"{}\" in parameter list", sep.text),
                        Some(sep),
                    ))
                }
                _ => return Err(self.error_at("Missing \")\" in parameter list", None)),
            }
        }

        let named = params.len();
        if variadic {
            params.push(VA_ARGS.to_string());
        }
        Ok((Arity::FunctionLike { params: named, variadic }, params))
    }

    fn replacement_list(&mut self, arity: &Arity, params: &[String]) -> Result<Vec<ReplItem>, IndigoError> {
        let function_like = matches!(arity, Arity::FunctionLike { .. });
        let variadic = matches!(arity, Arity::FunctionLike { variadic: true, .. });
        let mut items: Vec<ReplItem> = Vec::new();

        self.skip_space();
        while let Some(tok) = self.next() {
            match tok {
                Token::Pp(pp) if pp.is_punct("##") || pp.is_punct("%:%:") => {
                    while items.last() == Some(&ReplItem::Space) {
                        items.pop();
                    }
                    if items.is_empty() {
                        return Err(self.error_at(
                            "'##' cannot appear at either end of a macro expansion",
                            Some(pp),
                        ));
                    }
                    self.skip_space();
                    if self.peek().is_none() {
                        return Err(self.error_at(
                            "'##' cannot appear at either end of a macro expansion",
                            Some(pp),
                        ));
                    }
                    items.push(ReplItem::Paste);
                }
                Token::Pp(pp) if function_like && (pp.is_punct("#") || pp.is_punct("%:")) => {
                    self.skip_space();
                    match self.next() {
                        Some(Token::Pp(operand)) if operand.is_name() => {
                            match param_slot(params, &operand.text, variadic) {
                                Some(slot) => items.push(ReplItem::Stringize(slot)),
                                None => {
                                    return Err(self.error_at(
                                        "'#' is not followed by a macro parameter",
                                        Some(operand),
                                    ))
                                }
                            }
                        }
                        _ => {
                            return Err(self.error_at(
                                "'#' is not followed by a macro parameter",
                                Some(pp),
                            ))
                        }
                    }
                }
                Token::Pp(pp) if pp.is_name() => {
                    if pp.text == VA_ARGS && !variadic {
                        return Err(self.error_at(
                            "\"__VA_ARGS__\" can only appear in a variadic macro",
                            Some(pp),
                        ));
                    }
                    match param_slot(params, &pp.text, variadic) {
                        Some(slot) if function_like => items.push(ReplItem::Param(slot)),
                        _ => items.push(ReplItem::Token(definition_token(pp))),
                    }
                }
                Token::Pp(pp) => items.push(ReplItem::Token(definition_token(pp))),
                _ => {
                    if !matches!(items.last(), Some(ReplItem::Space) | Some(ReplItem::Paste)) {
                        items.push(ReplItem::Space);
                    }
                }
            }
        }
        while items.last() == Some(&ReplItem::Space) {
            items.pop();
        }
        Ok(items)
    }
}

fn param_slot(params: &[String], name: &str, variadic: bool) -> Option<usize> {
    if name == VA_ARGS && !variadic {
        return None;
    }
    params.iter().position(|p| p == name)
}

/// Replacement tokens carry no source position of their own.
fn definition_token(tok: &PpToken) -> PpToken {
    PpToken {
        span: None,
        ..tok.unmarked()
    }
}
