use assert_cmd::Command;
use libfaultscope::fixtures;
use predicates::prelude::*;

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("faultscope "));
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lines").and(predicate::str::contains("capture")));
}

#[test]
fn test_lines_on_missing_binary() {
    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.args(["lines", "/nonexistent/faultscope/a.out", "test.c", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open binary"));
}

#[test]
fn test_lines_on_non_object_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"plain text, not an object").unwrap();

    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("lines")
        .arg(file.path())
        .args(["test.c", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a recognised object file"));
}

#[test]
fn test_lines_prints_matching_rows() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), fixtures::dwarf_elf(&[fixtures::sample_unit(4)])).unwrap();

    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("lines")
        .arg(file.path())
        .args(["test.c", "10"])
        .assert()
        .success()
        .stdout("/src/test.c:10:5 at 0x1000\n/src/test.c:10:0 at 0x100c\n");
}

#[test]
fn test_lines_without_matches_prints_nothing() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), fixtures::dwarf_elf(&[fixtures::sample_unit(5)])).unwrap();

    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("lines")
        .arg(file.path())
        .args(["util.h", "11"])
        .assert()
        .success()
        .stdout("");
}

#[cfg(unix)]
#[test]
fn test_capture_prints_locals_and_globals() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let debugger = dir.path().join("fake-gdb");
    std::fs::write(
        &debugger,
        "#!/bin/sh\n\
         cat <<'EOF'\n\
         faultscope:Locals\n\
         i = 3\n\
         faultscope:Globals\n\
         All defined variables:\n\
         \n\
         File test.c:\n\
         2:\tint counter;\n\
         \n\
         Non-debugging symbols:\n\
         0x0000000000001000  _init\n\
         EOF\n",
    )
    .unwrap();
    std::fs::set_permissions(&debugger, std::fs::Permissions::from_mode(0o755)).unwrap();
    let binary = dir.path().join("a.out");
    std::fs::write(&binary, b"\x7fELF").unwrap();

    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("capture")
        .arg(&binary)
        .arg("test.c:10")
        .arg("--debugger")
        .arg(&debugger)
        .assert()
        .success()
        .stdout("i = 3\nglobal int counter; (test.c:2)\n");
}

#[test]
fn test_capture_rejects_bad_location() {
    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.args(["capture", "./a.out", "test.c"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected <file>:<line>"));
}

#[test]
fn test_capture_with_missing_debugger() {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("a.out");
    std::fs::write(&binary, b"\x7fELF").unwrap();

    let mut cmd = Command::cargo_bin("faultscope").unwrap();
    cmd.arg("capture")
        .arg(&binary)
        .arg("test.c:10")
        .arg("--debugger")
        .arg(dir.path().join("no-such-gdb"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to launch debugger"));
}
