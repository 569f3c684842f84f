mod common;

mod binary;
mod breakpoints;
mod interrupt;
#[cfg(feature = "int_test")]
mod native;
mod session;
mod signals;

use crate::common::{Buffer, MiSession};
use bugstalker_mi::engine::scripted::ScriptedEngine;
use bugstalker_mi::ui::mi::output::Output;
use bugstalker_mi::ui::mi::MiApplication;
use std::io::Cursor;

#[test]
fn test_run_to_breakpoint_then_interrupt_stopped() {
    let mut session = MiSession::new();
    session.run_to_main();

    session.send("4-exec-interrupt");
    session.expect_line(r#"4^error,msg="not running""#);
}

#[test]
fn test_running_record_follows_result() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert main");
    session.send("3-exec-run");

    let lines = session.lines();
    let result = lines.iter().position(|l| l == "3^running").unwrap();
    session.expect_line("3^running");
    session.expect_line(r#"*running,thread-id="all""#);
    session.expect(r#"^\*stopped,reason="breakpoint-hit""#);
    assert!(!lines[..result].iter().any(|l| l.starts_with('*')));
}

#[test]
fn test_unknown_command() {
    let mut session = MiSession::new();
    session.send("12-foo-bar baz");
    session.expect_line(r#"12^error,msg="Undefined MI command: foo-bar",code="undefined-command""#);
}

#[test]
fn test_malformed_command_keeps_token() {
    let mut session = MiSession::new();
    session.send(r#"7-break-insert "main"#);
    session.expect(r#"^7\^error,msg="malformed command: .*"$"#);
}

#[test]
fn test_evaluate_and_assign() {
    let mut session = MiSession::new();
    session.run_to_main();

    session.send("5-data-evaluate-expression do_loop");
    session.expect_line(r#"5^done,value="0""#);
    session.send(r#"6-data-evaluate-expression "do_loop = 3""#);
    session.expect_line(r#"6^done,value="3""#);
    session.send("7-data-evaluate-expression missing");
    session.expect(r#"^7\^error,msg=".*missing.*"$"#);
}

#[test]
fn test_program_exit() {
    let mut session = MiSession::new();
    session.run_to_main();

    session.send("5-data-evaluate-expression exit_code=3");
    session.expect_line(r#"5^done,value="3""#);
    session.send("6-exec-continue");
    session.expect_line("6^running");
    session.expect_line(r#"@"bye\n""#);
    session.expect_line(r#"*stopped,reason="exited",exit-code="3""#);

    // target stays loaded, program can be run again
    session.send("7-exec-run");
    session.expect_line("7^running");
    session.expect(r#"^\*stopped,reason="breakpoint-hit""#);
}

#[test]
fn test_console_commands() {
    let mut session = MiSession::new();
    session.send("1-interpreter-exec console \"target create a.out\"");
    session.expect_line(r#"~"Current executable set to 'a.out'.\n""#);
    session.expect_line("1^done");

    session.send("2version");
    session.expect_line(r#"~"scripted engine 1.0\n""#);
    session.expect_line("2^done");

    session.send("3-interpreter-exec console \"frobnicate now\"");
    session.expect(r#"^3\^error,msg="unknown command .*frobnicate now.*"$"#);

    session.send("4-interpreter-exec console \"process launch -s\"");
    session.expect_line("4^done");
    session.expect_line(r#"*stopped,reason="end-stepping-range",thread-id="1",stopped-threads="all""#);

    session.send("5-interpreter-exec console \"expression do_loop\"");
    session.expect_line(r#"~"do_loop = 0\n""#);
    session.expect_line("5^done");
}

#[test]
fn test_thread_info() {
    let mut session = MiSession::new();
    session.send("1-thread-info");
    session.expect_line(r#"1^done,threads=[]"#);

    session.run_to_main();
    session.send("4-thread-info");
    session.expect_line(
        r#"4^done,threads=[{id="1",target-id="Thread 4242",frame={addr="0x0000000000401000",func="main",args=[]},state="stopped"}],current-thread-id="1""#,
    );
}

#[test]
fn test_run_over_input_with_prompt() {
    let out = Buffer::default();
    let app = MiApplication::new(
        Box::new(ScriptedEngine::default()),
        Output::new(out.clone(), true),
        false,
    )
    .unwrap();

    let input = "1-file-exec-and-symbols a.out\n\n2-gdb-exit\n3-exec-run\n";
    app.run(Cursor::new(input)).unwrap();

    assert_eq!(out.lines(), vec!["1^done", "(gdb)", "2^exit", "(gdb)"]);
}
