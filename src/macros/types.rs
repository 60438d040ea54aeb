//! Macro definition types.
//!
//! This module defines the fundamental types used throughout the macro system.
//! It has no dependencies on other macro modules, making it the foundation layer.
//!
//! A [`MacroDef`] is immutable once built: the engine only ever reads it through
//! an `Arc` handed out by a [`MacroTable`](crate::macros::MacroTable).

use serde::{Deserialize, Serialize};

use crate::err_msg;
use crate::syntax::token::PpToken;
use crate::IndigoError;

/// Name of the synthetic parameter holding the variable arguments.
pub const VA_ARGS: &str = "__VA_ARGS__";

/// Built-in macros whose value is computed at expansion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicKind {
    /// `__LINE__`
    CurrentLine,
    /// `__FILE__`
    CurrentFile,
    /// `_Pragma`, a one-argument operator.
    PragmaOperator,
}

/// How a macro is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    ObjectLike,
    /// `params` counts the named parameters; a variadic macro has one more
    /// argument slot for `__VA_ARGS__`.
    FunctionLike { params: usize, variadic: bool },
    Dynamic(DynamicKind),
}

/// One item of a compiled replacement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplItem {
    Token(PpToken),
    Space,
    /// Reference to argument slot `n`.
    Param(usize),
    /// `#` applied to argument slot `n`.
    Stringize(usize),
    /// `##` between the neighbouring items.
    Paste,
}

/// A macro definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    pub arity: Arity,
    /// Parameter names by slot, `__VA_ARGS__` last for variadic macros.
    pub params: Vec<String>,
    pub replacement: Vec<ReplItem>,
}

impl MacroDef {
    /// Builds a definition, checking that every parameter reference fits the
    /// arity and that `##` has an operand on both sides.
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        params: Vec<String>,
        replacement: Vec<ReplItem>,
    ) -> Result<Self, IndigoError> {
        let def = Self {
            name: name.into(),
            arity,
            params,
            replacement,
        };
        def.check()?;
        Ok(def)
    }

    pub fn object_like(name: impl Into<String>, replacement: Vec<ReplItem>) -> Result<Self, IndigoError> {
        Self::new(name, Arity::ObjectLike, Vec::new(), replacement)
    }

    pub fn dynamic(name: impl Into<String>, kind: DynamicKind) -> Self {
        let (params, replacement) = match kind {
            DynamicKind::PragmaOperator => (vec!["operand".to_string()], vec![ReplItem::Param(0)]),
            DynamicKind::CurrentLine | DynamicKind::CurrentFile => (Vec::new(), Vec::new()),
        };
        Self {
            name: name.into(),
            arity: Arity::Dynamic(kind),
            params,
            replacement,
        }
    }

    /// True if a call needs a parenthesized argument list.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self.arity,
            Arity::FunctionLike { .. } | Arity::Dynamic(DynamicKind::PragmaOperator)
        )
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.arity, Arity::FunctionLike { variadic: true, .. })
    }

    pub fn dynamic_kind(&self) -> Option<DynamicKind> {
        match self.arity {
            Arity::Dynamic(kind) => Some(kind),
            _ => None,
        }
    }

    /// Number of argument slots a call fills.
    pub fn slots(&self) -> usize {
        match self.arity {
            Arity::ObjectLike => 0,
            Arity::FunctionLike { params, variadic } => params + usize::from(variadic),
            Arity::Dynamic(DynamicKind::PragmaOperator) => 1,
            Arity::Dynamic(_) => 0,
        }
    }

    /// Human-readable replacement list, parameters shown by name.
    pub fn replacement_text(&self) -> String {
        let mut out = String::new();
        for item in &self.replacement {
            match item {
                ReplItem::Token(tok) => out.push_str(&tok.text),
                ReplItem::Space => out.push(' '),
                ReplItem::Param(n) => out.push_str(self.param_name(*n)),
                ReplItem::Stringize(n) => {
                    out.push('#');
                    out.push_str(self.param_name(*n));
                }
                ReplItem::Paste => out.push_str(" ## "),
            }
        }
        out
    }

    /// The definition as it would appear after `#define`.
    pub fn signature(&self) -> String {
        match self.arity {
            Arity::FunctionLike { params, variadic } => {
                let mut names: Vec<&str> =
                    self.params.iter().take(params).map(String::as_str).collect();
                if variadic {
                    names.push("...");
                }
                format!("{}({})", self.name, names.join(", "))
            }
            _ => self.name.clone(),
        }
    }

    fn param_name(&self, slot: usize) -> &str {
        self.params.get(slot).map_or("?", String::as_str)
    }

    fn check(&self) -> Result<(), IndigoError> {
        let slots = self.slots();
        if self.params.len() != slots && self.dynamic_kind().is_none() {
            return Err(err_msg!(
                Internal,
                "Macro \"{}\" has {} parameter names for {} argument slots",
                self.name,
                self.params.len(),
                slots
            ));
        }
        for item in &self.replacement {
            if let ReplItem::Param(n) | ReplItem::Stringize(n) = item {
                if *n >= slots {
                    return Err(err_msg!(
                        Internal,
                        "Macro \"{}\" refers to parameter {} but takes {} argument(s)",
                        self.name,
                        n + 1,
                        slots
                    ));
                }
            }
        }
        let first = self.replacement.iter().find(|i| **i != ReplItem::Space);
        let last = self.replacement.iter().rev().find(|i| **i != ReplItem::Space);
        if first == Some(&ReplItem::Paste) || last == Some(&ReplItem::Paste) {
            return Err(err_msg!(
                Definition,
                "'##' cannot appear at either end of the replacement list of \"{}\"",
                self.name
            ));
        }
        Ok(())
    }
}
