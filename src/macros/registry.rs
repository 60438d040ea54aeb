//! Macro table: storage and lookup of macro definitions.
//!
//! The engine sees the table only through [`MacroTable::lookup`]; installing
//! and removing definitions is the driver's business.
//!
//! # Features
//! - Define, undefine, and look up macros by name (case-sensitive).
//! - `define` overwrites silently; `define_or_error` rejects an incompatible
//!   redefinition the way a conforming preprocessor must.
//! - Built-in dynamic macros (`__LINE__`, `__FILE__`, `_Pragma`) are installed
//!   by [`MacroRegistry::with_builtins`] and cannot be redefined or undefined
//!   through the `*_or_error` methods.
//! - Cloning is cheap (persistent map), so a driver can snapshot the table per
//!   translation unit.
//!
//! # Summary Table
//! | Method            | Overwrites | Error on conflict | Notes                    |
//! |-------------------|------------|-------------------|--------------------------|
//! | define            | Yes        | No                |                          |
//! | define_or_error   | No         | Yes               | identical redefinition ok |
//! | undefine          | N/A        | N/A               | Removes by name          |
//! | lookup/contains   | N/A        | N/A               | Case-sensitive           |

use std::sync::Arc;

use im::HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::err_msg;
use crate::macros::definition::parse_definition;
use crate::macros::types::{DynamicKind, MacroDef};
use crate::IndigoError;

/// Read access to macro definitions, as the engine needs it.
pub trait MacroTable {
    fn lookup(&self, name: &str) -> Option<Arc<MacroDef>>;
}

static BUILTINS: Lazy<Vec<Arc<MacroDef>>> = Lazy::new(|| {
    vec![
        Arc::new(MacroDef::dynamic("__LINE__", DynamicKind::CurrentLine)),
        Arc::new(MacroDef::dynamic("__FILE__", DynamicKind::CurrentFile)),
        Arc::new(MacroDef::dynamic("_Pragma", DynamicKind::PragmaOperator)),
    ]
});

/// Persistent map from macro name to definition.
///
/// # Example
/// ```rust
/// use indigo::macros::{MacroRegistry, MacroTable};
/// let mut reg = MacroRegistry::with_builtins();
/// reg.define_str("FIVE 5").unwrap();
/// assert!(reg.lookup("FIVE").is_some());
/// assert!(reg.lookup("__LINE__").is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<MacroDef>>,
}

impl MacroRegistry {
    /// Creates an empty registry, without even the built-in macros.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `__LINE__`, `__FILE__` and `_Pragma`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for def in BUILTINS.iter() {
            reg.macros.insert(def.name.clone(), Arc::clone(def));
        }
        reg
    }

    /// Installs `def`, returning the definition it replaced.
    pub fn define(&mut self, def: MacroDef) -> Option<Arc<MacroDef>> {
        self.macros.insert(def.name.clone(), Arc::new(def))
    }

    /// Installs `def` unless it conflicts with an existing definition.
    ///
    /// Redefining a macro with an identical definition is allowed.
    pub fn define_or_error(&mut self, def: MacroDef) -> Result<(), IndigoError> {
        if let Some(old) = self.macros.get(&def.name) {
            if old.dynamic_kind().is_some() {
                return Err(err_msg!(
                    Definition,
                    "\"{}\" is a built-in macro and cannot be redefined",
                    def.name
                ));
            }
            if **old != def {
                return Err(err_msg!(
                    Definition,
                    "The macro \"{}\" is redefined differently (was \"{} {}\")",
                    def.name,
                    old.signature(),
                    old.replacement_text()
                ));
            }
            return Ok(());
        }
        self.define(def);
        Ok(())
    }

    /// Parses and installs a definition written as after `#define`.
    pub fn define_str(&mut self, text: &str) -> Result<(), IndigoError> {
        self.define_or_error(parse_definition(text)?)
    }

    /// Removes a macro. Built-ins are protected.
    pub fn undefine(&mut self, name: &str) -> Result<Option<Arc<MacroDef>>, IndigoError> {
        if self.macros.get(name).is_some_and(|d| d.dynamic_kind().is_some()) {
            return Err(err_msg!(
                Definition,
                "\"{}\" is a built-in macro and cannot be undefined",
                name
            ));
        }
        Ok(self.macros.remove(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Macro names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.macros.keys().cloned().collect();
        names.sort();
        names
    }
}

impl MacroTable for MacroRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<MacroDef>> {
        self.macros.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_installed_and_protected() {
        let mut reg = MacroRegistry::with_builtins();
        assert_eq!(reg.len(), 3);
        assert!(reg.undefine("__FILE__").is_err());
        assert!(reg.define_str("__LINE__ 7").is_err());
        assert!(MacroRegistry::new().is_empty());
    }

    #[test]
    fn identical_redefinition_is_allowed() {
        let mut reg = MacroRegistry::new();
        reg.define_str("SQ(x) ((x)*(x))").unwrap();
        reg.define_str("SQ(x)   ((x)*(x))").unwrap();
        let err = reg.define_str("SQ(y) ((y)*(y))").unwrap_err();
        assert!(err.to_string().contains("redefined"));
    }

    #[test]
    fn undefine_and_snapshot() {
        let mut reg = MacroRegistry::new();
        reg.define_str("A 1").unwrap();
        let snapshot = reg.clone();
        assert!(reg.undefine("A").unwrap().is_some());
        assert!(!reg.contains("A"));
        assert!(snapshot.contains("A"));
        assert_eq!(snapshot.names(), vec!["A".to_string()]);
    }

    #[test]
    fn registry_serializes_definitions() {
        let mut reg = MacroRegistry::new();
        reg.define_str("CAT(a,b) a##b").unwrap();
        let json = serde_json::to_string(&reg).unwrap();
        let back: MacroRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lookup("CAT"), reg.lookup("CAT"));
    }
}
