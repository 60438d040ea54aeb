//! Call recognizer.
//!
//! An object-like macro name is always a call. A function-like name is a call
//! only when the next token, past whitespace and trace markers, is `(`. The
//! lookahead may run off the end of the current input into its parent; tokens
//! read there are returned to the parent untouched.

use tracing::debug;

use crate::expand::Expander;
use crate::macros::MacroDef;
use crate::syntax::token::Token;

/// Result of looking for a call's `(`.
#[derive(Debug, Default)]
pub struct Recognition {
    pub is_call: bool,
    /// Whitespace and markers read from the input the name came from, before
    /// the lookahead crossed into a parent input. A caller that does not
    /// expand the name writes them after it; one that does passes them to
    /// [`Expander::displace_skipped`].
    pub skipped: Vec<Token>,
}

impl<'a> Expander<'a> {
    pub fn recognize(&mut self, def: &MacroDef) -> Recognition {
        if !def.is_function_like() {
            return Recognition {
                is_call: true,
                skipped: Vec::new(),
            };
        }

        let start = self.input.current_input();
        let mut skipped = Vec::new();
        let mut crossed = Vec::new();
        let lookahead = loop {
            let token = self.input.next_token();
            let here = if self.input.current_input() == start {
                &mut skipped
            } else {
                &mut crossed
            };
            match token {
                Token::Space | Token::Separator | Token::Marker(_) => here.push(token),
                Token::Newline if !self.input.in_directive() => here.push(token),
                other => break other,
            }
        };
        let is_call = lookahead.is_punct("(");

        self.input.push_back(lookahead);
        for token in crossed.into_iter().rev() {
            self.input.push_back(token);
        }

        debug!(name = %def.name, is_call, "recognize");
        Recognition { is_call, skipped }
    }

    /// Called once a recognized call is going to expand: trace markers the
    /// recognizer looked past cannot keep their place before the `(`.
    pub fn displace_skipped(&mut self, skipped: Vec<Token>) {
        for token in skipped {
            if let Token::Marker(marker) = token {
                self.displace_marker(marker);
            }
        }
    }

    /// Consumes whitespace and markers up to and including the `(` the
    /// recognizer found.
    pub fn skip_to_paren(&mut self) {
        loop {
            match self.input.next_token() {
                Token::Marker(marker) => self.displace_marker(marker),
                Token::Space | Token::Separator | Token::Newline => {}
                token if token.is_punct("(") => return,
                other => {
                    // Unreachable after a positive recognition; leave the input as found.
                    self.input.push_back(other);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::testing::Harness;
    use crate::syntax::input::TokenSource;

    #[test]
    fn object_like_is_always_a_call() {
        let mut h = Harness::new(&["X 1"], " y");
        let def = h.def("X");
        assert!(h.run(|exp| exp.recognize(&def)).is_call);
    }

    #[test]
    fn function_like_needs_paren() {
        let mut h = Harness::new(&["F(a) a"], "  (1)");
        let def = h.def("F");
        assert!(h.run(|exp| exp.recognize(&def)).is_call);
        assert!(h.input.next_token().is_punct("("));

        let mut h = Harness::new(&["F(a) a"], " + 1");
        let rec = h.run(|exp| exp.recognize(&def));
        assert!(!rec.is_call);
        assert_eq!(rec.skipped, vec![Token::Space]);
        assert!(h.input.next_token().is_punct("+"));
    }

    #[test]
    fn lookahead_across_inputs_is_returned_to_the_parent() {
        let mut h = Harness::new(&["F(a) a"], " ;");
        let def = h.def("F");
        let rec = h.run(|exp| {
            exp.input.stack_input(vec![Token::Space], Some("G"));
            exp.recognize(&def)
        });
        assert!(!rec.is_call);
        assert_eq!(rec.skipped, vec![Token::Space]);
        assert_eq!(h.input.next_token(), Token::Space);
        assert!(h.input.next_token().is_punct(";"));
    }

    #[test]
    fn markers_before_the_paren_are_displaced() {
        let mut h = Harness::new(&["F(a) a"], "(x)");
        let def = h.def("F");
        let marker = crate::syntax::token::Marker::CallEnd(4);
        h.run(|exp| {
            exp.input.stack_input(vec![Token::Marker(marker)], None);
            let rec = exp.recognize(&def);
            assert!(rec.is_call);
            assert!(exp.state.cancelled.is_empty());
            exp.displace_skipped(rec.skipped);
        });
        assert!(h.state.cancelled.contains(&marker));
        assert!(h.state.cancelled.contains(&marker.partner()));
    }

    #[test]
    fn skipped_whitespace_is_kept_until_the_call_commits() {
        let mut h = Harness::new(&["F(a) a"], "  (1)");
        let def = h.def("F");
        let rec = h.run(|exp| exp.recognize(&def));
        assert!(rec.is_call);
        assert_eq!(rec.skipped, vec![Token::Space]);
    }
}
