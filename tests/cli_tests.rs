// Requires: assert_cmd, predicates and tempfile in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

fn write_source(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn indigo() -> Command {
    Command::cargo_bin("indigo").unwrap()
}

#[test]
fn expand_prints_the_expanded_file() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "sq.c", "#define SQ(x) x*x\nint a = SQ(5);\n");
    indigo()
        .arg("expand")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("int a = 5*5;"));
}

#[test]
fn command_line_definitions_apply() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "level.c", "LEVEL DEBUG\n");
    indigo()
        .args(["expand", "-D", "LEVEL=3", "-D", "DEBUG"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("3 1"));
}

#[test]
fn trace_flag_adds_comments() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "one.c", "#define ONE 1\nONE\n");
    indigo()
        .args(["expand", "--trace"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("/*<ONE 2:0-2:3*/1/*>*/"));
}

#[test]
fn config_file_is_honoured() {
    let dir = TempDir::new().unwrap();
    let config = write_source(&dir, "indigo.yaml", "traceCallsEnabled: true\n");
    let file = write_source(&dir, "one.c", "#define ONE 1\nONE\n");
    indigo()
        .arg("expand")
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("/*<ONE"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_source(&dir, "bad.yaml", "maxRescanDepth: 0\n");
    let file = write_source(&dir, "one.c", "x\n");
    indigo()
        .arg("expand")
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("maxRescanDepth"));
}

#[test]
fn json_lists_expansions_and_diagnostics() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "f.c", "#define F(x) x\nF()\n");
    indigo()
        .args(["expand", "--json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("\"expansions\"").and(contains("EmptyArgument")));
}

#[test]
fn errors_set_the_exit_status() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "bad.c", "#define F(x) x\nF(1\n");
    indigo()
        .arg("expand")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("indigo::expand::unterminated_call").or(contains("Unterminated macro call")));
}

#[test]
fn trace_command_summarizes_calls() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "id.c", "#define ID(x) x\nID(2)\n");
    indigo()
        .arg("trace")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("--- Expansion 0: ID (line 2) ---").and(contains("ID#0")));
}

#[test]
fn define_command_prints_the_compiled_form() {
    indigo()
        .args(["define", "STR(x) #x"])
        .assert()
        .success()
        .stdout(contains("STR(x)").and(contains("Stringize(0)")));
}

#[test]
fn define_command_rejects_bad_definitions() {
    indigo()
        .args(["define", "F(x, x) x"])
        .assert()
        .failure()
        .stderr(contains("Definition error"));
}

#[test]
fn bad_definition_in_a_file_is_reported_with_its_code() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "dup.c", "#define F(x, x) x\nok\n");
    indigo()
        .arg("expand")
        .arg(&file)
        .assert()
        .failure()
        .stdout(contains("ok"))
        .stderr(contains("indigo::definition"));
}

#[test]
fn missing_file_fails() {
    indigo()
        .args(["expand", "does/not/exist.c"])
        .assert()
        .failure()
        .stderr(contains("Failed to read"));
}
