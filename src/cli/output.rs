//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for colorizing output, printing diagnostics and
//! generating JSON. By centralizing output logic here, we ensure a consistent
//! user experience across all commands.

use std::io::Write;

use difference::{Changeset, Difference};
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::driver::{ExpansionRecord, Processed};
use crate::errors::{print_diagnostic, MacroDiagnostic};
use crate::macros::MacroDef;

// ============================================================================
// JSON REPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    output: &'a str,
    expansions: &'a [ExpansionRecord],
    diagnostics: &'a [MacroDiagnostic],
    definition_errors: Vec<String>,
}

/// Renders the result of a run as pretty-printed JSON.
pub fn json_report(
    file: &str,
    processed: &Processed,
    diagnostics: &[MacroDiagnostic],
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        file,
        output: &processed.text,
        expansions: &processed.expansions,
        diagnostics,
        definition_errors: processed
            .definition_errors
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Prints every diagnostic to stderr through miette.
pub fn print_diagnostics(diagnostics: &[MacroDiagnostic]) {
    for diagnostic in diagnostics {
        print_diagnostic(diagnostic);
    }
}

/// Prints one colored entry per traced expansion, then a line diff of the
/// source against the expanded text.
pub fn print_trace(source: &str, processed: &Processed) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    for (i, record) in processed.expansions.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(stdout, "--- Expansion {}: {} (line {}) ---", i, record.name, record.line);
        let _ = stdout.reset();

        if let Some(kind) = record.failure {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = writeln!(stdout, "failed: {kind:?}");
            let _ = stdout.reset();
        }
        for call in &record.calls {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
            let _ = write!(stdout, "  {}#{}", call.name, call.recursion);
            let _ = stdout.reset();
            match call.span {
                Some(span) => {
                    let _ = writeln!(stdout, " at {span}, {} argument(s)", call.args.len());
                }
                None => {
                    let _ = writeln!(stdout, ", {} argument(s)", call.args.len());
                }
            }
        }
        for pragma in &record.pragmas {
            let _ = writeln!(stdout, "  #pragma {pragma}");
        }
        let _ = writeln!(stdout, "{}", record.text);
        let _ = writeln!(stdout);
    }

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stdout, "--- Source vs. output ---");
    let _ = stdout.reset();
    let changeset = Changeset::new(source, &processed.text, "\n");
    print_diff(&mut stdout, &changeset.diffs);
}

/// Prints a compiled definition.
pub fn print_definition(def: &MacroDef) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = write!(stdout, "{}", def.signature());
    let _ = stdout.reset();
    let _ = writeln!(stdout, " {}", def.replacement_text());
    let _ = writeln!(stdout, "{:?}", def.replacement);
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                let _ = stdout.reset();
                for line in x.lines() {
                    let _ = writeln!(stdout, " {}", line);
                }
            }
            Difference::Add(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "+{}", line);
                }
            }
            Difference::Rem(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "-{}", line);
                }
            }
        }
    }
    let _ = stdout.reset();
}
