//! The expansion engine's public surface.
//!
//! A driver owns one [`ExpansionEngine`] per translation unit and calls
//! [`ExpansionEngine::try_expand`] for every identifier it reads. The engine
//! keeps no state between calls beyond its configuration and reusable
//! scratch buffers.

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::{DiagnosticKind, DiagnosticSink};
use crate::expand::trace::drop_unbalanced;
use crate::expand::{check_balance, render, Abort, CallRecord, EngineState, Expander, FailureKind};
use crate::macros::MacroTable;
use crate::syntax::input::TokenSource;
use crate::syntax::token::{strip_markers, PpToken, Token};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A `_Pragma` operator found during expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PragmaOperator {
    /// The destringized operand.
    pub text: String,
    /// Index of its placeholder in [`Expansion::tokens`].
    pub position: usize,
}

/// A successful top-level expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub tokens: Vec<Token>,
    pub pragmas: Vec<PragmaOperator>,
    /// Traced calls, indexed by the ids in the trace markers.
    pub calls: Vec<CallRecord>,
}

impl Expansion {
    /// True if the expansion produced at least one `_Pragma` operator.
    pub fn has_pragma(&self) -> bool {
        !self.pragmas.is_empty()
    }

    /// The expansion as text, trace markers included. Pragma placeholders
    /// render as nothing.
    pub fn render(&self) -> String {
        render(&self.tokens, &self.calls)
    }
}

/// A top-level expansion abandoned on a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionFailure {
    pub kind: FailureKind,
    /// Output produced before an overflow, cut to the limit. Empty for other
    /// failures.
    pub partial: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    NotAMacroCall,
    Expanded(Expansion),
    Fatal(ExpansionFailure),
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Default)]
pub struct ExpansionEngine {
    config: EngineConfig,
    state: EngineState,
}

impl ExpansionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: EngineState::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Expands the macro named by `name`, which the caller has just read from
    /// `input`.
    ///
    /// Returns [`ExpansionOutcome::NotAMacroCall`] with the input untouched
    /// when `name` is not a macro, is painted, or names a function-like macro
    /// without a following `(`. On a fatal error every synthetic input is
    /// discarded, leaving `input` just past what the failed call consumed.
    pub fn try_expand(
        &mut self,
        name: &PpToken,
        input: &mut dyn TokenSource,
        table: &dyn MacroTable,
        sink: &mut dyn DiagnosticSink,
    ) -> ExpansionOutcome {
        if name.painted || !name.is_name() {
            return ExpansionOutcome::NotAMacroCall;
        }
        let Some(def) = table.lookup(&name.text) else {
            return ExpansionOutcome::NotAMacroCall;
        };
        let tracing = self.config.trace_calls_enabled && !input.in_directive();
        self.state.reset(tracing);

        let mut exp = Expander {
            config: &self.config,
            state: &mut self.state,
            input,
            table,
            sink,
        };

        let recognition = exp.recognize(&def);
        if !recognition.is_call {
            for token in recognition.skipped.into_iter().rev() {
                exp.input.push_back(token);
            }
            return ExpansionOutcome::NotAMacroCall;
        }
        exp.displace_skipped(recognition.skipped);

        let handle = exp.input.current_input();
        let tokens = match exp.replace(&def, name, None, handle) {
            Ok(tokens) => tokens,
            Err(Abort(kind)) => {
                exp.input.unwind_stacked();
                debug!(name = %name.text, ?kind, "expansion failed");
                let partial = strip_markers(&exp.state.partial);
                return ExpansionOutcome::Fatal(ExpansionFailure { kind, partial });
            }
        };
        exp.finish(&name.text, tokens)
    }
}

impl<'a> Expander<'a> {
    /// Final clean-up of a top-level expansion.
    fn finish(&mut self, name: &str, mut tokens: Vec<Token>) -> ExpansionOutcome {
        if !self.state.cancelled.is_empty() {
            let cancelled = &self.state.cancelled;
            tokens.retain(|t| !matches!(t, Token::Marker(m) if cancelled.contains(m)));
        }
        if self.state.tracing && !check_balance(&tokens) {
            if self.config.check_trace_balance {
                self.diagnose(DiagnosticKind::TraceImbalance {
                    macro_name: name.to_string(),
                });
            }
            drop_unbalanced(&mut tokens);
        }

        let size: usize = tokens.iter().map(Token::text_len).sum();
        if size > self.config.max_output_len {
            self.diagnose(DiagnosticKind::OutputOverflow {
                macro_name: name.to_string(),
            });
            let mut used = 0;
            let keep = tokens
                .iter()
                .take_while(|t| {
                    used += t.text_len();
                    used <= self.config.max_output_len
                })
                .count();
            tokens.truncate(keep);
            return ExpansionOutcome::Fatal(ExpansionFailure {
                kind: FailureKind::OutputOverflow,
                partial: strip_markers(&tokens),
            });
        }

        let pragmas = tokens
            .iter()
            .enumerate()
            .filter_map(|(position, t)| match t {
                Token::Pragma(index) => self.state.pragmas.get(*index).map(|text| PragmaOperator {
                    text: text.clone(),
                    position,
                }),
                _ => None,
            })
            .collect();
        debug!(name, tokens = tokens.len(), "expanded");
        ExpansionOutcome::Expanded(Expansion {
            tokens,
            pragmas,
            calls: std::mem::take(&mut self.state.calls),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectingSink;
    use crate::macros::MacroRegistry;
    use crate::syntax::input::InputStack;
    use crate::syntax::lexer::tokenize;

    fn first_name(input: &mut InputStack) -> PpToken {
        match input.next_token() {
            Token::Pp(tok) => tok,
            other => panic!("expected a name, got {other:?}"),
        }
    }

    fn setup(defs: &[&str], source: &str) -> (MacroRegistry, InputStack) {
        let mut registry = MacroRegistry::with_builtins();
        for def in defs {
            registry.define_str(def).unwrap();
        }
        (registry, InputStack::new("t.c", tokenize(source).unwrap()))
    }

    #[test]
    fn non_macro_and_bare_function_name_are_not_calls() {
        let (registry, mut input) = setup(&["F(x) x"], "y F ;");
        let mut engine = ExpansionEngine::default();
        let mut sink = CollectingSink::new();

        let y = first_name(&mut input);
        assert_eq!(
            engine.try_expand(&y, &mut input, &registry, &mut sink),
            ExpansionOutcome::NotAMacroCall
        );
        input.next_token();
        let f = first_name(&mut input);
        assert_eq!(
            engine.try_expand(&f, &mut input, &registry, &mut sink),
            ExpansionOutcome::NotAMacroCall
        );
        // The whitespace the recognizer looked past is still there.
        assert_eq!(input.next_token(), Token::Space);
    }

    #[test]
    fn expanded_outcome_renders() {
        let (registry, mut input) = setup(&["SQ(x) x*x", "FIVE 5"], "SQ(FIVE)");
        let mut engine = ExpansionEngine::default();
        let mut sink = CollectingSink::new();
        let name = first_name(&mut input);
        let ExpansionOutcome::Expanded(exp) = engine.try_expand(&name, &mut input, &registry, &mut sink)
        else {
            panic!("expected an expansion");
        };
        assert_eq!(exp.render(), "5*5");
        assert!(!exp.has_pragma());
    }

    #[test]
    fn pragma_flag_is_raised() {
        let (registry, mut input) = setup(&[], "_Pragma(\"once\")");
        let mut engine = ExpansionEngine::default();
        let mut sink = CollectingSink::new();
        let name = first_name(&mut input);
        let ExpansionOutcome::Expanded(exp) = engine.try_expand(&name, &mut input, &registry, &mut sink)
        else {
            panic!("expected an expansion");
        };
        assert!(exp.has_pragma());
        assert_eq!(exp.pragmas[0].text, "once");
        assert_eq!(exp.tokens[exp.pragmas[0].position], Token::Pragma(0));
    }

    #[test]
    fn fatal_error_unwinds_synthetic_inputs() {
        let (registry, mut input) = setup(&["F(x) x"], "F(1");
        let mut engine = ExpansionEngine::default();
        let mut sink = CollectingSink::new();
        let name = first_name(&mut input);
        let outcome = engine.try_expand(&name, &mut input, &registry, &mut sink);
        assert!(matches!(
            outcome,
            ExpansionOutcome::Fatal(ExpansionFailure {
                kind: FailureKind::MalformedCall,
                ..
            })
        ));
        assert_eq!(input.depth(), 1);
        assert_eq!(sink.count("unterminated_call"), 1);
    }

    #[test]
    fn newline_ends_a_call_inside_a_directive() {
        let (registry, mut input) = setup(&["F(x) x"], "F(1\n G");
        input.set_in_directive(true);
        let mut engine = ExpansionEngine::default();
        let mut sink = CollectingSink::new();
        let name = first_name(&mut input);
        let outcome = engine.try_expand(&name, &mut input, &registry, &mut sink);
        assert_eq!(
            outcome,
            ExpansionOutcome::Fatal(ExpansionFailure {
                kind: FailureKind::MalformedCall,
                partial: Vec::new(),
            })
        );
        assert_eq!(input.next_token(), Token::Newline);
        let messages: Vec<_> = sink.diagnostics.iter().map(|d| d.kind.to_string()).collect();
        assert_eq!(messages, vec!["Unterminated macro call \"F(1\""]);
    }

    #[test]
    fn calls_in_directives_are_not_traced() {
        let (registry, mut input) = setup(&["ONE 1"], "ONE");
        input.set_in_directive(true);
        let mut engine = ExpansionEngine::new(EngineConfig {
            trace_calls_enabled: true,
            ..EngineConfig::default()
        });
        let mut sink = CollectingSink::new();
        let name = first_name(&mut input);
        let ExpansionOutcome::Expanded(exp) = engine.try_expand(&name, &mut input, &registry, &mut sink)
        else {
            panic!("expected an expansion");
        };
        assert_eq!(exp.render(), "1");
        assert!(exp.calls.is_empty());
    }
}
