//! Rescanning and macro replacement.
//!
//! [`Expander::replace`] expands one recognized call; [`Expander::rescan`]
//! reads the result back looking for further calls, and the two recurse into
//! each other. A macro being rescanned sits in the Replacing Set, so its own
//! name found in its output is painted rather than expanded.
//!
//! A function-like call found near the end of a replacement list may take its
//! arguments from the text that follows the list. The enclosing macro's entry
//! is then marked read-over: its name may expand once more, but only where it
//! was read from the source file (or anywhere, in compat mode).

use tracing::{debug, trace};

use crate::errors::DiagnosticKind;
use crate::expand::collect::CollectedArgs;
use crate::expand::{
    Abort, Expander, FailureKind, Replaceable, ReplacingEntry, ScopeKind, Scoped, Step,
};
use crate::macros::{DynamicKind, MacroDef};
use crate::syntax::input::InputHandle;
use crate::syntax::token::{Marker, PpToken, Token};

impl<'a> Expander<'a> {
    /// Expands one call of `def`, whose name `name` has just been read and
    /// recognized. `outer` is the macro whose rescan found the call, reading
    /// from input `rt_handle`; `None` at top level and inside arguments.
    pub fn replace(
        &mut self,
        def: &MacroDef,
        name: &PpToken,
        outer: Option<&MacroDef>,
        rt_handle: InputHandle,
    ) -> Step<Vec<Token>> {
        let mut exp = self.enter_macro(&def.name);
        let call = exp.open_call(def, name);
        debug!(name = %def.name, ?call, outer = ?outer.map(|d| &d.name), "replace");

        let mut out = Vec::new();
        if let Some(id) = call {
            out.push(Token::Marker(Marker::CallStart(id)));
        }

        let mut end = name.span;
        match def.dynamic_kind() {
            Some(kind @ (DynamicKind::CurrentLine | DynamicKind::CurrentFile)) => {
                let value = exp.dynamic_value(kind);
                out.extend([Token::Separator, Token::Pp(value), Token::Separator]);
            }
            kind => {
                let mut collected = CollectedArgs::default();
                if def.is_function_like() {
                    exp.skip_to_paren();
                    collected = exp.collect_args(def, call, name)?;
                    end = collected.close;
                    if outer.is_some() && exp.input.current_input() != rt_handle {
                        exp.mark_read_over();
                    }
                }
                let prescanned = exp.prescan(def, &collected.args);
                let substituted = exp.substitute(def, prescanned, &collected.args)?;
                let expanded = exp.rescan(Some(def), substituted)?;
                if kind == Some(DynamicKind::PragmaOperator) {
                    out.extend(exp.pragma_operator(expanded));
                } else {
                    out.extend(expanded);
                }
            }
        }

        if let Some(id) = call {
            exp.close_call(id, end);
            out.push(Token::Marker(Marker::CallEnd(id)));
        }
        Ok(out)
    }

    /// Rescans `tokens` for macro calls. With `outer` set, `tokens` is the
    /// substituted replacement list of `outer` and may be followed by the
    /// text after the call; without it, `tokens` is one macro argument and
    /// the rescan stops at its end.
    pub fn rescan(&mut self, outer: Option<&MacroDef>, mut tokens: Vec<Token>) -> Step<Vec<Token>> {
        if self.state.nesting >= self.config.max_rescan_depth {
            let macro_name = match outer {
                Some(def) => def.name.clone(),
                None => self.state.chain.last().cloned().unwrap_or_default(),
            };
            self.diagnose(DiagnosticKind::RescanLimit {
                macro_name,
                limit: self.config.max_rescan_depth,
            });
            return Err(Abort(FailureKind::RescanLimit));
        }
        if let Some(def) = outer {
            self.state.replacing.push(ReplacingEntry {
                name: Some(def.name.clone()),
                read_over: false,
            });
        }
        self.state.nesting += 1;
        let replacing = outer.is_some();
        let mut exp = Scoped::new(self, Some(ScopeKind::Rescan { replacing }));
        let depth = exp.state.nesting;
        trace!(depth, outer = ?outer.map(|d| &d.name), "rescan entry");

        // Drop inputs that are already exhausted so that reading past the
        // rescanned tokens shows up as a change of position.
        let token = exp.input.next_token();
        exp.input.push_back(token);
        let before = exp.input.position();

        if outer.is_none() {
            tokens.push(Token::RescanEnd);
        }
        let handle = exp.input.stack_input(tokens, outer.map(|d| d.name.as_str()));
        let compat = exp.config.gnu_compatible_recursion;
        let mut out: Vec<Token> = Vec::new();
        let mut size = 0;
        let mut counted = 0;
        let mut last_painted = false;
        let mut ended = false;

        loop {
            let token = exp.input.next_token();
            if exp.input.current_input() != handle {
                exp.input.push_back(token);
                break;
            }
            match token {
                Token::RescanEnd => {
                    exp.input.finish_input(handle);
                    ended = true;
                    break;
                }
                Token::Eof => break,
                Token::Pp(tok) if tok.is_name() && !tok.painted => {
                    last_painted = false;
                    let Some(def) = exp.table.lookup(&tok.text) else {
                        out.push(Token::Pp(tok));
                        continue;
                    };
                    let able = exp.replaceable(&def.name);
                    let recognition = exp.recognize(&def);
                    let allowed = match able {
                        Replaceable::Yes => true,
                        Replaceable::ReadOver => tok.from_source || compat,
                        Replaceable::No => false,
                    };
                    if recognition.is_call && allowed {
                        trace!(name = %tok.text, ?able, "expand");
                        exp.displace_skipped(recognition.skipped);
                        let expanded = exp.replace(&def, &tok, outer, handle)?;
                        out.extend(expanded);
                    } else {
                        let mut tok = tok;
                        if able == Replaceable::No
                            || (able == Replaceable::ReadOver && !tok.from_source && !compat)
                        {
                            trace!(name = %tok.text, ?able, "painted");
                            tok.painted = true;
                            last_painted = true;
                        }
                        out.push(Token::Pp(tok));
                        out.extend(recognition.skipped);
                    }
                }
                Token::Pp(tok) => {
                    last_painted = tok.painted;
                    out.push(Token::Pp(tok));
                }
                Token::Marker(marker) if exp.state.cancelled.contains(&marker) => {}
                other => out.push(other),
            }

            size += out[counted..].iter().map(Token::text_len).sum::<usize>();
            counted = out.len();
            if size > exp.config.max_output_len {
                let macro_name = outer
                    .map(|d| d.name.clone())
                    .or_else(|| exp.state.chain.last().cloned())
                    .unwrap_or_default();
                exp.diagnose(DiagnosticKind::OutputOverflow { macro_name });
                exp.state.partial = fit_to(out, exp.config.max_output_len);
                return Err(Abort(FailureKind::OutputOverflow));
            }
        }

        if let Some(def) = outer {
            if !ended && !last_painted && exp.input.position() != before {
                exp.diagnose(DiagnosticKind::SubsequentTextInvolved {
                    macro_name: def.name.clone(),
                });
            }
        }
        trace!(depth, tokens = out.len(), "rescan exit");
        Ok(out)
    }

    /// Whether `name` may be expanded, given the Replacing Set.
    pub fn replaceable(&self, name: &str) -> Replaceable {
        match self
            .state
            .replacing
            .iter()
            .rev()
            .find(|entry| entry.name.as_deref() == Some(name))
        {
            None => Replaceable::Yes,
            Some(entry) if entry.read_over => Replaceable::ReadOver,
            Some(_) => Replaceable::No,
        }
    }

    /// The innermost macro's call read past its replacement list.
    fn mark_read_over(&mut self) {
        let compat = self.config.gnu_compatible_recursion;
        let Some(entry) = self.state.replacing.last_mut() else {
            return;
        };
        trace!(name = ?entry.name, compat, "read over replacement list");
        if compat {
            entry.name = None;
        } else {
            entry.read_over = true;
        }
    }
}

/// Leading tokens of `out` whose text fits in `limit` bytes.
fn fit_to(mut out: Vec<Token>, limit: usize) -> Vec<Token> {
    let mut size = 0;
    let keep = out
        .iter()
        .take_while(|t| {
            size += t.text_len();
            size <= limit
        })
        .count();
    out.truncate(keep);
    out
}
