//! # Indigo Test Harness
//!
//! Shared helpers for the integration tests: run the line driver over a
//! snippet with a set of predefined macros and collect what it reported.

#![allow(dead_code)]

use indigo::config::EngineConfig;
use indigo::driver::{Preprocessor, Processed};
use indigo::errors::CollectingSink;

/// Output and diagnostics of one run.
pub struct Run {
    pub processed: Processed,
    pub sink: CollectingSink,
}

impl Run {
    pub fn text(&self) -> &str {
        &self.processed.text
    }
}

/// Preprocesses `source` with `defs` (written as after `#define`) installed.
pub fn preprocess_with(config: EngineConfig, defs: &[&str], source: &str) -> Run {
    let mut pp = Preprocessor::new(config);
    for def in defs {
        pp.registry_mut()
            .define_str(def)
            .unwrap_or_else(|e| panic!("bad test definition {def:?}: {e}"));
    }
    let mut sink = CollectingSink::new();
    let processed = pp
        .process("test.c", source, &mut sink)
        .unwrap_or_else(|e| panic!("failed to preprocess {source:?}: {e}"));
    Run { processed, sink }
}

pub fn preprocess(defs: &[&str], source: &str) -> Run {
    preprocess_with(EngineConfig::default(), defs, source)
}

/// Expanded text of `source` under the default configuration.
pub fn expand(defs: &[&str], source: &str) -> String {
    preprocess(defs, source).processed.text
}

pub fn traced() -> EngineConfig {
    EngineConfig {
        trace_calls_enabled: true,
        ..EngineConfig::default()
    }
}
