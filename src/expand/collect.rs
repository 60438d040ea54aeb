//! Argument collector.
//!
//! Reads a call's arguments from just after its `(` up to the matching `)`.
//! Arguments are split at commas outside nested parentheses; the variadic slot
//! takes everything that remains, commas included. Whitespace inside an
//! argument is squeezed to single spaces and trimmed at both ends. Separators
//! left by an earlier expansion are kept as they are: they take no room in a
//! stringized argument.

use tracing::debug;

use crate::errors::DiagnosticKind;
use crate::expand::render::render;
use crate::expand::{Abort, Expander, FailureKind, Step};
use crate::macros::MacroDef;
use crate::syntax::token::{CallId, LocationSpan, Marker, PpToken, Token};

/// The arguments of one call, padded or truncated to the macro's slot count.
#[derive(Debug, Clone, Default)]
pub struct CollectedArgs {
    pub args: Vec<Vec<Token>>,
    /// Arguments actually present in the call.
    pub found: usize,
    /// Span of the closing parenthesis, when read from source.
    pub close: Option<LocationSpan>,
}

/// What ended one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Comma,
    Close(Option<LocationSpan>),
    /// A newline ending a directive, or the end of a rescanned argument.
    Unterminated,
    Eof,
}

impl<'a> Expander<'a> {
    /// Collects the arguments of a call to `def`. The input must be positioned
    /// just after the `(`.
    ///
    /// A count mismatch is reported but the call still expands, with missing
    /// arguments empty and excess ones dropped. Only an unterminated call is
    /// fatal.
    pub fn collect_args(
        &mut self,
        def: &MacroDef,
        call: Option<CallId>,
        name: &PpToken,
    ) -> Step<CollectedArgs> {
        let expected = def.slots();
        let variadic = def.is_variadic();
        let mut text = vec![Token::Pp(name.unmarked()), Token::Pp(PpToken::punct("("))];
        let mut args: Vec<Vec<Token>> = Vec::new();
        let mut more_to_come = false;
        let close;

        loop {
            let mut prefix = Vec::new();
            let first = self.skip_white(&mut prefix, &mut text);
            let is_close = first.is_punct(")");
            let variadic_slot = variadic && args.len() + 1 == expected;

            let delim = if is_close && !more_to_come {
                close = first.pp().and_then(|t| t.span);
                text.push(first);
                break;
            } else if is_close || first.is_punct(",") {
                self.diagnose(DiagnosticKind::EmptyArgument {
                    call: render(&text, &[]),
                });
                if variadic_slot {
                    let (arg, delim) =
                        self.get_an_arg(first, true, call, args.len(), prefix, &mut text);
                    args.push(arg);
                    delim
                } else {
                    let delim = if is_close {
                        Delim::Close(first.pp().and_then(|t| t.span))
                    } else {
                        Delim::Comma
                    };
                    text.push(first);
                    if let Some(id) = call {
                        self.record_arg_span(id, None);
                    }
                    args.push(prefix);
                    delim
                }
            } else {
                match first {
                    Token::Newline => {
                        self.input.push_back(Token::Newline);
                        Delim::Unterminated
                    }
                    Token::RescanEnd => {
                        self.input.push_back(Token::RescanEnd);
                        Delim::Unterminated
                    }
                    Token::Eof => Delim::Eof,
                    first => {
                        let (arg, delim) =
                            self.get_an_arg(first, variadic_slot, call, args.len(), prefix, &mut text);
                        args.push(arg);
                        delim
                    }
                }
            };

            match delim {
                Delim::Comma => more_to_come = true,
                Delim::Close(span) => {
                    close = span;
                    break;
                }
                Delim::Unterminated | Delim::Eof => {
                    self.diagnose(DiagnosticKind::UnterminatedCall {
                        call: render(&text, &[]),
                    });
                    return Err(Abort(FailureKind::MalformedCall));
                }
            }
        }

        let found = args.len();
        let call_text = render(&text, &[]);
        if found == 0 && expected == 1 {
            self.diagnose(DiagnosticKind::EmptyArgument { call: call_text });
        } else if found != expected {
            let kind = if variadic && found + 1 == expected {
                DiagnosticKind::MissingVariadic {
                    expected,
                    call: call_text,
                }
            } else if found < expected {
                DiagnosticKind::TooFewArguments {
                    expected,
                    call: call_text,
                }
            } else {
                DiagnosticKind::TooManyArguments {
                    expected,
                    call: call_text,
                }
            };
            self.diagnose(kind);
        }
        args.truncate(expected);
        args.resize_with(expected, Vec::new);
        if let Some(id) = call {
            self.fit_arg_spans(id, expected);
        }

        debug!(name = %def.name, found, expected, "collected arguments");
        Ok(CollectedArgs { args, found, close })
    }

    /// Skips whitespace before an argument, keeping separators and trace
    /// markers in `prefix`.
    fn skip_white(&mut self, prefix: &mut Vec<Token>, text: &mut Vec<Token>) -> Token {
        loop {
            let token = self.input.next_token();
            match token {
                Token::Space => push_space(text),
                Token::Newline if !self.input.in_directive() => push_space(text),
                Token::Separator => push_separator(prefix),
                Token::Marker(_) => prefix.push(token),
                other => return other,
            }
        }
    }

    /// Reads one argument starting with `first`. The variadic slot starts one
    /// parenthesis deep so that commas never end it.
    fn get_an_arg(
        &mut self,
        first: Token,
        variadic_slot: bool,
        call: Option<CallId>,
        index: usize,
        prefix: Vec<Token>,
        text: &mut Vec<Token>,
    ) -> (Vec<Token>, Delim) {
        let base = usize::from(variadic_slot);
        let mut depth = base;
        let mut arg = Vec::new();
        if let Some(id) = call {
            arg.push(Token::Marker(Marker::ArgStart { call: id, arg: index }));
        }
        arg.extend(prefix);
        let mut span: Option<LocationSpan> = None;

        let mut token = first;
        let delim = loop {
            match token {
                Token::Newline if self.input.in_directive() => {
                    self.input.push_back(Token::Newline);
                    break Delim::Unterminated;
                }
                Token::RescanEnd => {
                    self.input.push_back(Token::RescanEnd);
                    break Delim::Unterminated;
                }
                Token::Eof => break Delim::Eof,
                Token::Space | Token::Newline => {
                    push_space(&mut arg);
                    push_space(text);
                }
                Token::Separator => push_separator(&mut arg),
                Token::Pp(mut tok) => {
                    text.push(Token::Pp(tok.unmarked()));
                    if tok.is_punct("(") {
                        depth += 1;
                    } else if tok.is_punct(")") {
                        if depth == base {
                            break Delim::Close(tok.span);
                        }
                        depth -= 1;
                    } else if tok.is_punct(",") && depth == 0 {
                        break Delim::Comma;
                    }
                    if tok.is_name() && !tok.painted && self.input.current_input_is_source() {
                        tok.from_source = true;
                    }
                    if let Some(s) = tok.span {
                        span = Some(span.map_or(s, |start: LocationSpan| start.to(s)));
                    }
                    arg.push(Token::Pp(tok));
                }
                other => arg.push(other),
            }
            token = self.input.next_token();
        };

        let tail = arg.iter().rposition(|t| t.pp().is_some()).map_or(0, |i| i + 1);
        let trailing = arg.split_off(tail);
        arg.extend(trailing.into_iter().filter(|t| *t != Token::Space));
        if let Some(id) = call {
            arg.push(Token::Marker(Marker::ArgEnd { call: id, arg: index }));
            self.record_arg_span(id, span);
        }
        (arg, delim)
    }
}

fn push_space(tokens: &mut Vec<Token>) {
    if tokens.last() != Some(&Token::Space) {
        tokens.push(Token::Space);
    }
}

fn push_separator(tokens: &mut Vec<Token>) {
    if !matches!(tokens.last(), Some(Token::Space | Token::Separator)) {
        tokens.push(Token::Separator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::testing::Harness;
    use crate::syntax::token::strip_markers;

    fn texts(arg: &[Token]) -> String {
        render(&strip_markers(arg), &[])
    }

    fn collect(h: &mut Harness, name: &str) -> Step<CollectedArgs> {
        let def = h.def(name);
        h.run(|exp| exp.collect_args(&def, None, &PpToken::name(name)))
    }

    #[test]
    fn splits_at_top_level_commas() {
        let mut h = Harness::new(&["F(a, b) a b"], "f(1, 2),  3 )");
        let got = collect(&mut h, "F").unwrap();
        assert_eq!(got.found, 2);
        assert_eq!(texts(&got.args[0]), "f(1, 2)");
        assert_eq!(texts(&got.args[1]), "3");
        assert!(h.sink.diagnostics.is_empty());
    }

    #[test]
    fn variadic_slot_keeps_commas() {
        let mut h = Harness::new(&["LOG(fmt, ...) fmt __VA_ARGS__"], "\"x\", 1,  2)");
        let got = collect(&mut h, "LOG").unwrap();
        assert_eq!(texts(&got.args[0]), "\"x\"");
        assert_eq!(texts(&got.args[1]), "1, 2");
    }

    #[test]
    fn missing_variadic_is_only_a_warning() {
        let mut h = Harness::new(&["LOG(fmt, ...) fmt __VA_ARGS__"], "\"x\")");
        let got = collect(&mut h, "LOG").unwrap();
        assert_eq!(got.found, 1);
        assert_eq!(got.args.len(), 2);
        assert!(got.args[1].is_empty());
        assert_eq!(h.sink.count("missing_variadic"), 1);
        assert!(!h.sink.has_errors());
    }

    #[test]
    fn count_mismatch_pads_and_truncates() {
        let mut h = Harness::new(&["F(a, b) a b"], "1)");
        let got = collect(&mut h, "F").unwrap();
        assert_eq!(got.args.len(), 2);
        assert_eq!(h.sink.count("too_few_arguments"), 1);

        let mut h = Harness::new(&["F(a, b) a b"], "1, 2, 3)");
        let got = collect(&mut h, "F").unwrap();
        assert_eq!(got.found, 3);
        assert_eq!(got.args.len(), 2);
        assert_eq!(h.sink.count("too_many_arguments"), 1);
    }

    #[test]
    fn empty_arguments_warn() {
        let mut h = Harness::new(&["F(a, b) a b"], ", x)");
        let got = collect(&mut h, "F").unwrap();
        assert!(got.args[0].is_empty());
        assert_eq!(texts(&got.args[1]), "x");
        assert_eq!(h.sink.count("empty_argument"), 1);

        let mut h = Harness::new(&["G(a) a"], ")");
        let got = collect(&mut h, "G").unwrap();
        assert_eq!(got.found, 0);
        assert_eq!(got.args, vec![Vec::<Token>::new()]);
        assert_eq!(h.sink.count("empty_argument"), 1);
    }

    #[test]
    fn separators_are_not_turned_into_spaces() {
        let mut h = Harness::new(&["F(a) a"], ")");
        let def = h.def("F");
        let got = h
            .run(|exp| {
                exp.input.stack_input(
                    vec![
                        Token::Separator,
                        Token::Pp(PpToken::name("vers2")),
                        Token::Separator,
                        Token::Pp(PpToken::punct(".")),
                        Token::Pp(PpToken::name("h")),
                    ],
                    None,
                );
                exp.collect_args(&def, None, &PpToken::name("F"))
            })
            .unwrap();
        assert!(!got.args[0].contains(&Token::Space));
        let string = h.run(|exp| exp.stringize(&got.args[0]));
        assert_eq!(string.text, "\"vers2.h\"");
    }

    #[test]
    fn unterminated_call_is_fatal() {
        let mut h = Harness::new(&["F(a) a"], "1, (2)");
        let err = collect(&mut h, "F").unwrap_err();
        assert_eq!(err, Abort(FailureKind::MalformedCall));
        assert_eq!(h.sink.count("unterminated_call"), 1);
    }

    #[test]
    fn names_read_from_source_are_marked() {
        let mut h = Harness::new(&["F(a) a"], "x y)");
        let got = collect(&mut h, "F").unwrap();
        assert!(got.args[0]
            .iter()
            .filter_map(Token::pp)
            .all(|t| t.from_source));
    }

    #[test]
    fn traced_arguments_are_wrapped() {
        let mut h = Harness::new(&["F(a) a"], "x)");
        let def = h.def("F");
        h.state.tracing = true;
        let got = h
            .run(|exp| {
                let id = exp.open_call(&def, &PpToken::name("F"));
                exp.collect_args(&def, id, &PpToken::name("F"))
            })
            .unwrap();
        assert_eq!(
            got.args[0].first(),
            Some(&Token::Marker(Marker::ArgStart { call: 0, arg: 0 }))
        );
        assert_eq!(
            got.args[0].last(),
            Some(&Token::Marker(Marker::ArgEnd { call: 0, arg: 0 }))
        );
        assert_eq!(h.state.calls[0].args.len(), 1);
        assert!(h.state.calls[0].args[0].is_some());
    }
}
