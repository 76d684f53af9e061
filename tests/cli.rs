//! Escenarios de extremo a extremo contra el binario compilado.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn source_file(program: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(program.as_bytes()).expect("write source");
    file
}

fn minic() -> Command {
    Command::cargo_bin("minic").expect("minic binary")
}

#[test]
fn arithmetic_program_prints_its_result() {
    let file = source_file("int x = 2 + 3 * 4; print(to_string(x));");

    minic().arg(file.path()).assert().success().stdout("14");
}

#[test]
fn countdown_prints_with_trailing_space() {
    let file =
        source_file("int x = 10; while (x > 0) { print(to_string(x) + \" \"); x = x - 1; }");

    minic()
        .arg(file.path())
        .assert()
        .success()
        .stdout("10 9 8 7 6 5 4 3 2 1 ");
}

#[test]
fn identifier_divisor_fails_at_runtime_not_statically() {
    let file = source_file("int a = 5; int b = 0; int c = a / b;");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(255)
        .stderr(predicate::str::contains("Division by zero"));
}

#[test]
fn literal_zero_divisor_is_a_static_error() {
    let file = source_file("int a = 5; int c = a / 0;");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Division by zero."))
        .stderr(predicate::str::contains("line 1 col 24"));
}

#[test]
fn shadowed_declarations_print_inner_then_outer() {
    let file = source_file(
        "int x = 1; { int x = 2; print(to_string(x)); } print(to_string(x));",
    );

    minic().arg(file.path()).assert().success().stdout("21");
}

#[test]
fn scan_reads_a_line_from_stdin() {
    let file = source_file("string s = scan(); print(\"hi \" + s);");

    minic()
        .arg(file.path())
        .write_stdin("world\n")
        .assert()
        .success()
        .stdout("hi world");
}

#[test]
fn double_declaration_reports_the_second_position() {
    let file = source_file("int x; int x;");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Double declaration of variable x"))
        .stderr(predicate::str::contains("line 1 col 12"));
}

#[test]
fn lexical_errors_carry_their_column() {
    let file = source_file("int x = 5 $;");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown character"))
        .stderr(predicate::str::contains("line 1 col 11"));
}

#[test]
fn using_before_declaration_is_reported() {
    let file = source_file("x = 1;");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("using before declaration"));
}

#[test]
fn exit_sets_the_process_status() {
    let file = source_file("print(\"bye\"); exit(7); print(\"no\");");

    minic()
        .arg(file.path())
        .assert()
        .failure()
        .code(7)
        .stdout("bye");
}

#[test]
fn bad_stoi_input_exits_with_minus_one() {
    let file = source_file("int x = stoi(scan()); print(to_string(x));");

    minic()
        .arg(file.path())
        .write_stdin("not a number\n")
        .assert()
        .failure()
        .code(255)
        .stderr(predicate::str::contains("stoi"));
}

#[test]
fn missing_source_file_is_a_driver_error() {
    minic().arg("no-such-file.mc").assert().failure();
}
