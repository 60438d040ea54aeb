//! The macro-expansion pipeline.
//!
//! One top-level call runs: recognizer → argument collector → prescan
//! (`#`/`##`) → argument substitution (each argument rescanned on its own) →
//! rescan of the result, which re-enters the pipeline for every macro call it
//! finds. All of it works through an [`Expander`], a short-lived view that
//! borrows the engine state, the input, the macro table and the diagnostic
//! sink for the duration of one [`ExpansionEngine::try_expand`] call.
//!
//! [`ExpansionEngine::try_expand`]: crate::engine::ExpansionEngine::try_expand

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use crate::config::{EngineConfig, WARN_COMPAT};
use crate::errors::{DiagnosticKind, DiagnosticSink, MacroDiagnostic, SourceLocation};
use crate::macros::MacroTable;
use crate::syntax::input::TokenSource;
use crate::syntax::token::{Marker, Token};

pub mod collect;
pub mod dynamic;
pub mod prescan;
pub mod recognize;
pub mod render;
pub mod rescan;
pub mod substitute;
pub mod trace;

pub use render::render;
pub use trace::{check_balance, CallRecord};

/// Why a top-level expansion was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FailureKind {
    /// Unterminated argument list.
    MalformedCall,
    RescanLimit,
    OutputOverflow,
}

/// Fatal-error signal unwinding every open expansion frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort(pub FailureKind);

pub type Step<T> = Result<T, Abort>;

/// One entry of the Replacing Set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacingEntry {
    /// `None` once compat mode has released the entry.
    pub name: Option<String>,
    pub read_over: bool,
}

/// Whether a macro may be expanded at this point of a rescan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaceable {
    Yes,
    No,
    /// In the Replacing Set, but its call has read past the replacement list.
    ReadOver,
}

/// Per-top-level-expansion state, reset by every `try_expand`.
#[derive(Debug, Default)]
pub struct EngineState {
    pub replacing: Vec<ReplacingEntry>,
    /// Open rescans, argument rescans included.
    pub nesting: usize,
    /// Names of the macros being replaced, outermost first.
    pub chain: Vec<String>,
    pub calls: Vec<CallRecord>,
    pub pragmas: Vec<String>,
    /// Markers dropped because their partner could not stay in place.
    pub cancelled: HashSet<Marker>,
    pub tracing: bool,
    /// Output kept from a rescan that overflowed.
    pub partial: Vec<Token>,
}

impl EngineState {
    pub fn reset(&mut self, tracing: bool) {
        self.replacing.clear();
        self.nesting = 0;
        self.chain.clear();
        self.calls.clear();
        self.pragmas.clear();
        self.cancelled.clear();
        self.partial.clear();
        self.tracing = tracing;
    }
}

/// Working view over everything one expansion touches.
pub struct Expander<'a> {
    pub config: &'a EngineConfig,
    pub state: &'a mut EngineState,
    pub input: &'a mut dyn TokenSource,
    pub table: &'a dyn MacroTable,
    pub sink: &'a mut dyn DiagnosticSink,
}

impl<'a> Expander<'a> {
    /// Reports `kind` unless its warning class is masked off.
    pub fn diagnose(&mut self, kind: DiagnosticKind) {
        if let Some(class) = kind.warning_class() {
            let class = match kind {
                DiagnosticKind::SubsequentTextInvolved { .. }
                    if self.config.gnu_compatible_recursion =>
                {
                    WARN_COMPAT
                }
                _ => class,
            };
            if !self.config.warns(class) {
                return;
            }
        }
        let location = SourceLocation {
            file: self.input.current_filename().to_string(),
            line: self.input.current_line(),
        };
        let chain = self.state.chain.iter().rev().cloned().collect();
        self.sink.report(MacroDiagnostic::new(kind, location, chain));
    }

    /// Pushes `name` onto the macro chain until the returned scope drops.
    pub fn enter_macro(&mut self, name: &str) -> Scoped<'_, 'a> {
        self.state.chain.push(name.to_string());
        Scoped {
            exp: self,
            kind: Some(ScopeKind::Chain),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// One level of rescan nesting, plus a Replacing Set entry when
    /// `replacing` is set.
    Rescan { replacing: bool },
    Chain,
}

/// Guard undoing one push onto the Replacing Set, the rescan nesting or the
/// macro chain when it goes out of scope, on error paths included.
pub struct Scoped<'g, 'a> {
    exp: &'g mut Expander<'a>,
    kind: Option<ScopeKind>,
}

impl<'g, 'a> Scoped<'g, 'a> {
    pub(crate) fn new(exp: &'g mut Expander<'a>, kind: Option<ScopeKind>) -> Self {
        Self { exp, kind }
    }
}

impl<'a> Deref for Scoped<'_, 'a> {
    type Target = Expander<'a>;

    fn deref(&self) -> &Self::Target {
        self.exp
    }
}

impl DerefMut for Scoped<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.exp
    }
}

impl Drop for Scoped<'_, '_> {
    fn drop(&mut self) {
        match self.kind {
            Some(ScopeKind::Rescan { replacing }) => {
                if replacing {
                    self.exp.state.replacing.pop();
                }
                self.exp.state.nesting -= 1;
            }
            Some(ScopeKind::Chain) => {
                self.exp.state.chain.pop();
            }
            None => {}
        }
    }
}
