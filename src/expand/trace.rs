//! Call-trace annotator.
//!
//! When tracing is on, every macro call except `_Pragma` gets a [`CallRecord`]
//! and its output is wrapped in `Marker::CallStart` / `Marker::CallEnd`. Each
//! collected argument is wrapped the same way with `ArgStart` / `ArgEnd`.

use serde::Serialize;
use tracing::trace;

use crate::expand::Expander;
use crate::macros::{DynamicKind, MacroDef};
use crate::syntax::token::{CallId, LocationSpan, Marker, PpToken, Token};

/// What the annotator knows about one traced call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub id: CallId,
    pub name: String,
    /// Earlier calls of the same macro within this top-level expansion.
    pub recursion: usize,
    /// Source span of the whole call, when the call was read from source.
    pub span: Option<LocationSpan>,
    /// Source span of each collected argument.
    pub args: Vec<Option<LocationSpan>>,
}

impl<'a> Expander<'a> {
    /// Opens a record for a call to `def` named by `name`, or returns `None`
    /// when the call is not traced.
    pub fn open_call(&mut self, def: &MacroDef, name: &PpToken) -> Option<CallId> {
        if !self.state.tracing || def.dynamic_kind() == Some(DynamicKind::PragmaOperator) {
            return None;
        }
        let id = self.state.calls.len();
        let recursion = self
            .state
            .calls
            .iter()
            .filter(|c| c.name == def.name)
            .count();
        trace!(id, name = %def.name, recursion, "open traced call");
        self.state.calls.push(CallRecord {
            id,
            name: def.name.clone(),
            recursion,
            span: name.span,
            args: Vec::new(),
        });
        Some(id)
    }

    /// Extends the call's span to `end`, the last token of the call.
    pub fn close_call(&mut self, id: CallId, end: Option<LocationSpan>) {
        let Some(record) = self.state.calls.get_mut(id) else {
            return;
        };
        if let (Some(start), Some(end)) = (record.span, end) {
            record.span = Some(start.to(end));
        }
    }

    pub fn record_arg_span(&mut self, id: CallId, span: Option<LocationSpan>) {
        if let Some(record) = self.state.calls.get_mut(id) {
            record.args.push(span);
        }
    }

    /// Pads or truncates the recorded argument spans to the macro's slots.
    pub fn fit_arg_spans(&mut self, id: CallId, slots: usize) {
        if let Some(record) = self.state.calls.get_mut(id) {
            record.args.resize(slots, None);
        }
    }

    /// Drops a marker that cannot keep its place, together with its partner.
    pub fn displace_marker(&mut self, marker: Marker) {
        trace!(?marker, "displaced marker");
        self.state.cancelled.insert(marker);
        self.state.cancelled.insert(marker.partner());
    }
}

/// True if every start marker in `tokens` is closed by its partner at the
/// same nesting depth.
pub fn check_balance(tokens: &[Token]) -> bool {
    let mut open = Vec::new();
    for token in tokens {
        let Token::Marker(marker) = token else {
            continue;
        };
        if marker.is_start() {
            open.push(*marker);
        } else if open.pop() != Some(marker.partner()) {
            return false;
        }
    }
    open.is_empty()
}

/// Removes markers whose partner is missing or out of order, keeping every
/// properly nested pair.
pub fn drop_unbalanced(tokens: &mut Vec<Token>) {
    let mut keep = vec![true; tokens.len()];
    let mut open: Vec<(usize, Marker)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Token::Marker(marker) = token else {
            continue;
        };
        if marker.is_start() {
            open.push((i, *marker));
            continue;
        }
        match open.iter().rposition(|(_, m)| *m == marker.partner()) {
            Some(pos) => {
                // Starts left open inside this region cannot be closed later.
                for (j, _) in open.drain(pos + 1..) {
                    keep[j] = false;
                }
                open.pop();
            }
            None => keep[i] = false,
        }
    }
    for (j, _) in open {
        keep[j] = false;
    }
    let mut flags = keep.into_iter();
    tokens.retain(|_| flags.next().unwrap_or(true));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(id: CallId) -> Token {
        Token::Marker(Marker::CallStart(id))
    }

    fn end(id: CallId) -> Token {
        Token::Marker(Marker::CallEnd(id))
    }

    #[test]
    fn nested_pairs_balance() {
        let tokens = vec![start(0), start(1), end(1), Token::Space, end(0)];
        assert!(check_balance(&tokens));
    }

    #[test]
    fn crossed_pairs_do_not_balance() {
        let tokens = vec![start(0), start(1), end(0), end(1)];
        assert!(!check_balance(&tokens));
        assert!(!check_balance(&[start(0)]));
        assert!(!check_balance(&[end(0)]));
    }

    #[test]
    fn drop_unbalanced_keeps_good_pairs() {
        let x = Token::Pp(PpToken::name("x"));
        let mut tokens = vec![start(0), start(1), x.clone(), end(0), end(2)];
        drop_unbalanced(&mut tokens);
        assert_eq!(tokens, vec![start(0), x, end(0)]);
        assert!(check_balance(&tokens));
    }
}
