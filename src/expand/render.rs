//! Rendering token buffers back to text.

use std::fmt::Write as _;

use crate::expand::trace::CallRecord;
use crate::syntax::lexer::tokens_would_merge;
use crate::syntax::token::{Marker, Token};

/// Renders `tokens` as source text. Trace markers become comments described
/// by `calls`; a separator becomes a space only where the neighbouring tokens
/// would otherwise run together.
pub fn render(tokens: &[Token], calls: &[CallRecord]) -> String {
    let mut out = String::new();
    let mut last_pp: Option<&str> = None;
    let mut pending_space = false;
    let mut pending_sep = false;

    for token in tokens {
        match token {
            Token::Pp(tok) => {
                if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ']) {
                    out.push(' ');
                } else if pending_sep
                    && last_pp.is_some_and(|prev| tokens_would_merge(prev, &tok.text))
                {
                    out.push(' ');
                }
                out.push_str(&tok.text);
                last_pp = Some(&tok.text);
                pending_space = false;
                pending_sep = false;
            }
            Token::Space => pending_space = true,
            Token::Separator => pending_sep = true,
            Token::Newline => {
                out.push('\n');
                last_pp = None;
                pending_space = false;
                pending_sep = false;
            }
            Token::Marker(marker) => {
                if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ']) {
                    out.push(' ');
                } else if out.ends_with('/') && !out.ends_with("*/") {
                    out.push(' ');
                }
                write_marker(&mut out, *marker, calls);
                last_pp = None;
                pending_space = false;
                pending_sep = false;
            }
            Token::Param(_) | Token::Pragma(_) | Token::RescanEnd | Token::Eof => {}
        }
    }
    out
}

fn write_marker(out: &mut String, marker: Marker, calls: &[CallRecord]) {
    let record = |id| calls.get(id);
    match marker {
        Marker::CallStart(id) => {
            let Some(call) = record(id) else {
                out.push_str("/*<?*/");
                return;
            };
            let _ = write!(out, "/*<{}", call.name);
            if let Some(span) = call.span {
                let _ = write!(out, " {span}");
            }
            out.push_str("*/");
            for (n, span) in call.args.iter().enumerate() {
                let _ = write!(out, "/*!{}:{}-{}", call.name, call.recursion, n);
                if let Some(span) = span {
                    let _ = write!(out, " {span}");
                }
                out.push_str("*/");
            }
        }
        Marker::ArgStart { call, arg } => match record(call) {
            Some(call) => {
                let _ = write!(out, "/*<{}:{}-{}*/", call.name, call.recursion, arg);
            }
            None => out.push_str("/*<?*/"),
        },
        Marker::CallEnd(_) | Marker::ArgEnd { .. } => out.push_str("/*>*/"),
    }
}
