//! A minimal line driver around [`ExpansionEngine`].
//!
//! The driver reads a source file token by token, installs `#define` and
//! `#undef` directives, copies every other directive line through untouched
//! and offers each identifier outside directives to the engine. It keeps the
//! output line count equal to the input's by re-emitting the newlines a
//! multi-line macro call consumed at the end of the line it finished on.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{Expansion, ExpansionEngine, ExpansionOutcome};
use crate::errors::DiagnosticSink;
use crate::expand::{render, CallRecord, FailureKind};
use crate::macros::{parse_definition, MacroRegistry};
use crate::syntax::input::{InputStack, TokenSource};
use crate::syntax::lexer::tokenize;
use crate::syntax::token::{Marker, PpToken, Token};
use crate::IndigoError;

/// One top-level macro call the driver expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionRecord {
    pub name: String,
    pub line: u32,
    /// Rendered result, trace markers included.
    pub text: String,
    pub calls: Vec<CallRecord>,
    pub pragmas: Vec<String>,
    /// Set when the expansion was abandoned.
    pub failure: Option<FailureKind>,
}

/// Result of preprocessing one file.
#[derive(Debug, Default)]
pub struct Processed {
    pub text: String,
    pub expansions: Vec<ExpansionRecord>,
    /// Rejected `#define` / `#undef` directives. Processing continues past
    /// them.
    pub definition_errors: Vec<IndigoError>,
}

#[derive(Debug)]
pub struct Preprocessor {
    engine: ExpansionEngine,
    registry: MacroRegistry,
}

impl Preprocessor {
    /// A preprocessor with the built-in macros installed.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: ExpansionEngine::new(config),
            registry: MacroRegistry::with_builtins(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MacroRegistry {
        &mut self.registry
    }

    /// Installs a command-line style definition, `NAME` or `NAME=VALUE`.
    /// A bare name is defined as `1`.
    pub fn define_option(&mut self, option: &str) -> Result<(), IndigoError> {
        let text = match option.split_once('=') {
            Some((name, value)) => format!("{name} {value}"),
            None => format!("{option} 1"),
        };
        self.registry.define_str(&text)
    }

    /// Preprocesses `source`, reporting expansion diagnostics to `sink`.
    ///
    /// Only a source that cannot be tokenized is an `Err`; bad definitions
    /// are collected in [`Processed::definition_errors`].
    pub fn process(
        &mut self,
        filename: &str,
        source: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Processed, IndigoError> {
        let mut input = InputStack::new(filename, tokenize(source)?);
        let mut processed = Processed::default();
        let mut line = LineBuffer::default();
        let mut at_line_start = true;
        let mut owed_newlines = 0;
        info!(filename, "preprocessing");

        loop {
            match input.next_token() {
                Token::Eof => {
                    processed.text.push_str(&line.take_rendered());
                    break;
                }
                Token::Newline => {
                    processed.text.push_str(&line.take_rendered());
                    for _ in 0..=owed_newlines {
                        processed.text.push('\n');
                    }
                    owed_newlines = 0;
                    at_line_start = true;
                }
                Token::Space => line.tokens.push(Token::Space),
                Token::Pp(tok) if at_line_start && tok.is_punct("#") => {
                    at_line_start = false;
                    self.directive(tok, &mut input, &mut line, &mut processed);
                }
                Token::Pp(tok) if tok.is_name() => {
                    at_line_start = false;
                    let before = input.current_line();
                    self.expand_name(tok, &mut input, &mut line, &mut processed, sink);
                    owed_newlines += input.current_line().saturating_sub(before);
                }
                Token::Pp(tok) => {
                    at_line_start = false;
                    line.tokens.push(Token::Pp(tok));
                }
                other => line.tokens.push(other),
            }
        }
        debug!(
            filename,
            expansions = processed.expansions.len(),
            "preprocessed"
        );
        Ok(processed)
    }

    fn expand_name(
        &mut self,
        tok: PpToken,
        input: &mut InputStack,
        line: &mut LineBuffer,
        processed: &mut Processed,
        sink: &mut dyn DiagnosticSink,
    ) {
        let at_line = tok.span.map_or(input.current_line(), |s| s.start_line);
        match self.engine.try_expand(&tok, input, &self.registry, sink) {
            ExpansionOutcome::NotAMacroCall => line.tokens.push(Token::Pp(tok)),
            ExpansionOutcome::Expanded(expansion) => {
                processed.expansions.push(ExpansionRecord {
                    name: tok.text,
                    line: at_line,
                    text: expansion.render(),
                    calls: expansion.calls.clone(),
                    pragmas: expansion.pragmas.iter().map(|p| p.text.clone()).collect(),
                    failure: None,
                });
                line.push_expansion(expansion);
            }
            ExpansionOutcome::Fatal(failure) => {
                processed.expansions.push(ExpansionRecord {
                    name: tok.text,
                    line: at_line,
                    text: render(&failure.partial, &[]),
                    calls: Vec::new(),
                    pragmas: Vec::new(),
                    failure: Some(failure.kind),
                });
                line.tokens.push(Token::Separator);
                line.tokens.extend(failure.partial);
                line.tokens.push(Token::Separator);
            }
        }
    }

    /// Handles a line starting with `#`. The terminating newline is left in
    /// the input.
    fn directive(
        &mut self,
        hash: PpToken,
        input: &mut InputStack,
        line: &mut LineBuffer,
        processed: &mut Processed,
    ) {
        let mut leading = vec![Token::Pp(hash)];
        let keyword = loop {
            match input.next_token() {
                Token::Space => leading.push(Token::Space),
                Token::Pp(tok) => break Some(tok),
                other => {
                    input.push_back(other);
                    break None;
                }
            }
        };
        let rest = rest_of_line(input);

        let result = match keyword.as_ref().map(|k| k.text.as_str()) {
            Some("define") => {
                let text = render(&rest, &[]);
                parse_definition(text.trim()).and_then(|def| {
                    debug!(name = %def.name, "define");
                    self.registry.define_or_error(def)
                })
            }
            Some("undef") => {
                let text = render(&rest, &[]);
                let name = text.trim();
                debug!(name, "undef");
                self.registry.undefine(name).map(|_| ())
            }
            _ => {
                line.tokens.extend(leading);
                line.tokens.extend(keyword.map(Token::Pp));
                line.tokens.extend(rest);
                return;
            }
        };
        if let Err(e) = result {
            processed.definition_errors.push(e);
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Tokens up to, not including, the next newline.
fn rest_of_line(input: &mut InputStack) -> Vec<Token> {
    let mut tokens = Vec::new();
    loop {
        match input.next_token() {
            Token::Eof => break,
            Token::Newline => {
                input.push_back(Token::Newline);
                break;
            }
            other => tokens.push(other),
        }
    }
    tokens
}

/// Output of the current line, with the trace records and pragma texts of
/// the expansions in it. Marker and pragma indices are renumbered as
/// expansions are appended so that they index this buffer's own lists.
#[derive(Debug, Default)]
struct LineBuffer {
    tokens: Vec<Token>,
    calls: Vec<CallRecord>,
    pragmas: Vec<String>,
}

impl LineBuffer {
    fn push_expansion(&mut self, expansion: Expansion) {
        let call_base = self.calls.len();
        let Expansion {
            mut tokens,
            pragmas,
            calls,
        } = expansion;

        for pragma in pragmas {
            if let Some(slot) = tokens.get_mut(pragma.position) {
                *slot = Token::Pragma(self.pragmas.len());
            }
            self.pragmas.push(pragma.text);
        }
        self.tokens.extend(tokens.into_iter().map(|t| match t {
            Token::Marker(marker) => Token::Marker(shift_marker(marker, call_base)),
            other => other,
        }));
        self.calls.extend(calls.into_iter().map(|mut call| {
            call.id += call_base;
            call
        }));
    }

    /// Renders the buffered line and clears it. Each pragma placeholder
    /// becomes a `#pragma` line of its own.
    fn take_rendered(&mut self) -> String {
        let mut out = String::new();
        let mut start = 0;
        for (i, token) in self.tokens.iter().enumerate() {
            let Token::Pragma(index) = token else {
                continue;
            };
            out.push_str(&render(&self.tokens[start..i], &self.calls));
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("#pragma ");
            out.push_str(self.pragmas.get(*index).map_or("", String::as_str));
            out.push('\n');
            start = i + 1;
        }
        out.push_str(&render(&self.tokens[start..], &self.calls));
        self.tokens.clear();
        self.calls.clear();
        self.pragmas.clear();
        out
    }
}

fn shift_marker(marker: Marker, base: usize) -> Marker {
    match marker {
        Marker::CallStart(id) => Marker::CallStart(id + base),
        Marker::CallEnd(id) => Marker::CallEnd(id + base),
        Marker::ArgStart { call, arg } => Marker::ArgStart {
            call: call + base,
            arg,
        },
        Marker::ArgEnd { call, arg } => Marker::ArgEnd {
            call: call + base,
            arg,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectingSink;

    fn run(config: EngineConfig, source: &str) -> (Processed, CollectingSink) {
        let mut pp = Preprocessor::new(config);
        let mut sink = CollectingSink::new();
        let processed = pp.process("t.c", source, &mut sink).unwrap();
        (processed, sink)
    }

    #[test]
    fn definitions_are_installed_and_lines_kept() {
        let (out, sink) = run(
            EngineConfig::default(),
            "#define SQ(x) x*x\n#define FIVE 5\nint a = SQ(FIVE);\n",
        );
        assert_eq!(out.text, "\n\nint a = 5*5;\n");
        assert_eq!(out.expansions.len(), 1);
        assert_eq!(out.expansions[0].line, 3);
        assert!(sink.diagnostics.is_empty());
    }

    #[test]
    fn undef_removes_a_macro() {
        let (out, _) = run(
            EngineConfig::default(),
            "#define X 1\nX\n#undef X\nX\n",
        );
        assert_eq!(out.text, "\n1\n\nX\n");
    }

    #[test]
    fn other_directives_pass_through_unexpanded() {
        let (out, _) = run(
            EngineConfig::default(),
            "#define X 1\n#if X\nX\n#endif\n",
        );
        assert_eq!(out.text, "\n#if X\n1\n#endif\n");
    }

    #[test]
    fn multi_line_call_keeps_line_count() {
        let (out, _) = run(
            EngineConfig::default(),
            "#define F(a, b) a+b\nF(1,\n  2) x\ny\n",
        );
        assert_eq!(out.text, "\n1+2 x\n\ny\n");
    }

    #[test]
    fn pragma_operator_becomes_a_line() {
        let (out, _) = run(
            EngineConfig::default(),
            "#define P _Pragma(\"pack(1)\")\na P b\n",
        );
        assert_eq!(out.text, "a\n#pragma pack(1)\nb\n");
        assert_eq!(out.expansions[0].pragmas, vec!["pack(1)".to_string()]);
    }

    #[test]
    fn bad_definition_is_collected() {
        let (out, _) = run(
            EngineConfig::default(),
            "#define __LINE__ 3\n#define OK 1\nOK\n",
        );
        assert_eq!(out.definition_errors.len(), 1);
        assert_eq!(out.text, "\n\n1\n");
    }

    #[test]
    fn command_line_definitions() {
        let mut pp = Preprocessor::new(EngineConfig::default());
        pp.define_option("DEBUG").unwrap();
        pp.define_option("LEVEL=3").unwrap();
        let mut sink = CollectingSink::new();
        let out = pp.process("t.c", "DEBUG LEVEL", &mut sink).unwrap();
        assert_eq!(out.text, "1 3");
    }

    #[test]
    fn trace_ids_are_local_to_the_line() {
        let config = EngineConfig {
            trace_calls_enabled: true,
            ..EngineConfig::default()
        };
        let (out, _) = run(config, "#define A 1\n#define B 2\nA B\n");
        assert_eq!(out.text, "\n\n/*<A 3:0-3:1*/1/*>*/ /*<B 3:2-3:3*/2/*>*/\n");
    }
}
