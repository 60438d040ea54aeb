//! Diagnostics raised while expanding: kinds, severities, warning classes,
//! macro chains and their miette rendering.

mod common;

use common::{preprocess, preprocess_with};
use indigo::config::{EngineConfig, WARN_ARGUMENTS};
use indigo::errors::{DiagnosticKind, Severity};
use pretty_assertions::assert_eq;

#[test]
fn too_many_arguments_is_an_error_but_expands() {
    let run = preprocess(&["F(x) [x]"], "F(1, 2)");
    assert_eq!(run.text(), "[1]");
    let errors: Vec<_> = run.sink.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind.to_string(),
        "More than necessary 1 argument(s) in macro call \"F(1, 2)\""
    );
}

#[test]
fn too_few_arguments_pads_with_empty() {
    let run = preprocess(&["ADD(a, b, c) a+b+c"], "ADD(1)");
    assert_eq!(run.text(), "1++");
    assert_eq!(run.sink.count("too_few_arguments"), 1);
}

#[test]
fn empty_argument_is_a_class_two_warning() {
    let run = preprocess(&["F(x) [x]"], "F()");
    assert_eq!(run.text(), "[]");
    let warnings: Vec<_> = run.sink.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind.warning_class(), Some(2));
    assert!(!run.sink.has_errors());
}

#[test]
fn warn_level_masks_warning_classes() {
    let config = EngineConfig {
        warn_level: WARN_ARGUMENTS,
        ..EngineConfig::default()
    };
    let run = preprocess_with(config, &["F(x) [x]"], "F()");
    assert!(run.sink.diagnostics.is_empty());

    let silent = EngineConfig {
        warn_level: 0,
        ..EngineConfig::default()
    };
    let run = preprocess_with(silent, &["ID(x) x", "G ID"], "G(7)");
    assert_eq!(run.text(), "7");
    assert!(run.sink.diagnostics.is_empty());
}

#[test]
fn errors_are_not_masked() {
    let silent = EngineConfig {
        warn_level: 0,
        ..EngineConfig::default()
    };
    let run = preprocess_with(silent, &["F(x) x"], "F(1, 2)");
    assert_eq!(run.sink.count("too_many_arguments"), 1);
}

#[test]
fn chain_lists_macros_inner_to_outer() {
    let run = preprocess(&["F(x) x", "G F(1, 2)", "H G"], "H");
    let diagnostic = &run.sink.diagnostics[0];
    assert_eq!(diagnostic.chain, vec!["F", "G", "H"]);
    assert_eq!(diagnostic.location.file, "test.c");
    assert_eq!(diagnostic.location.line, 1);
}

#[test]
fn invalid_paste_is_reported_and_kept() {
    let run = preprocess(&["CAT(a,b) a##b"], "CAT(+,/)");
    assert_eq!(run.sink.count("invalid_pasted_token"), 1);
    assert!(run.text().contains('+'));
    assert!(run.text().contains('/'));
}

#[test]
fn stringize_of_a_stray_backslash_is_invalid() {
    let run = preprocess(&["STR(x) #x"], "STR(\\)");
    assert_eq!(run.sink.count("invalid_string_literal"), 1);
}

#[test]
fn long_string_literal_warns() {
    let config = EngineConfig {
        max_string_len: 4,
        ..EngineConfig::default()
    };
    let run = preprocess_with(config, &["STR(x) #x"], "STR(abcdef)");
    assert_eq!(run.text(), "\"abcdef\"");
    assert_eq!(run.sink.count("string_too_long"), 1);
}

#[test]
fn pragma_operand_must_be_a_string() {
    let run = preprocess(&[], "_Pragma(once) x");
    assert_eq!(run.sink.count("pragma_operand"), 1);
    assert_eq!(run.text(), "x");
}

#[test]
fn output_overflow_is_fatal() {
    let config = EngineConfig {
        max_output_len: 16,
        ..EngineConfig::default()
    };
    let defs = ["TWICE(x) x x", "BIG TWICE(TWICE(TWICE(abcd)))"];
    let run = preprocess_with(config, &defs, "BIG end");
    assert_eq!(run.sink.count("output_overflow"), 1);
    let record = &run.processed.expansions[0];
    assert!(record.failure.is_some());
    assert!(run.text().ends_with("end"));
}

#[test]
fn line_out_of_range_warns() {
    let config = EngineConfig {
        max_line_number: 1,
        ..EngineConfig::default()
    };
    let run = preprocess_with(config, &[], "__LINE__\n__LINE__");
    assert_eq!(run.text(), "1\n2");
    assert_eq!(run.sink.count("line_out_of_range"), 1);
}

#[test]
fn severities_match_the_kind() {
    let kind = DiagnosticKind::UnterminatedCall { call: "F(".into() };
    assert_eq!(kind.severity(), Severity::Error);
    let kind = DiagnosticKind::TraceImbalance {
        macro_name: "F".into(),
    };
    assert_eq!(kind.severity(), Severity::Internal);
}

#[test]
fn miette_report_carries_code_and_chain() {
    let run = preprocess(&["F(x) x", "G F(1, 2)"], "G");
    let diagnostic = run.sink.diagnostics[0].clone();
    let rendered = format!("{:?}", miette::Report::new(diagnostic));
    assert!(rendered.contains("indigo::expand::too_many_arguments"));
    assert!(rendered.contains("in expansion of macro \"G\""));
}

#[test]
fn bad_definitions_are_collected_not_fatal() {
    let run = preprocess(&[], "#define F(x, x) x\n#define OK 1\nOK\n");
    assert_eq!(run.processed.definition_errors.len(), 1);
    assert_eq!(run.text(), "\n\n1\n");
}
