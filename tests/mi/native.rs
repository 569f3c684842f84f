//! Tests against a real process, the `looper` program.

use assert_cmd::cargo::CommandCargoExt;
use rexpect::session::PtySession;
use serial_test::serial;
use std::process::Command;

fn spawn_mi() -> PtySession {
    let looper = Command::cargo_bin("looper").unwrap();
    let mi = Command::cargo_bin("bs-mi").unwrap();
    let program = format!(
        "{} --no-prompt {}",
        mi.get_program().to_string_lossy(),
        looper.get_program().to_string_lossy()
    );
    rexpect::spawn(&program, Some(5000)).unwrap()
}

fn run_to_main(session: &mut PtySession) {
    session.send_line("1-break-insert main").unwrap();
    session.exp_string(r#"1^done,bkpt={number="1"}"#).unwrap();
    session.send_line("2-exec-run").unwrap();
    session.exp_string("2^running").unwrap();
    session
        .exp_string(r#"*stopped,reason="breakpoint-hit",thread-id=""#)
        .unwrap();
}

#[test]
#[serial]
fn test_interrupt_loop() {
    let mut session = spawn_mi();
    run_to_main(&mut session);

    session
        .send_line("3-data-evaluate-expression do_loop=1")
        .unwrap();
    session.exp_string(r#"3^done,value="1""#).unwrap();

    for token in [4, 6, 8] {
        session.send_line(&format!("{token}-exec-continue")).unwrap();
        session.exp_string(&format!("{token}^running")).unwrap();
        session
            .send_line(&format!("{}-exec-interrupt", token + 1))
            .unwrap();
        session.exp_string(&format!("{}^done", token + 1)).unwrap();
        session
            .exp_string(r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt""#)
            .unwrap();
    }

    session.send_line("10-gdb-exit").unwrap();
    session.exp_string("10^exit").unwrap();
    session.exp_eof().unwrap();
}

#[test]
#[serial]
fn test_segfault() {
    let mut session = spawn_mi();
    run_to_main(&mut session);

    session
        .send_line("3-data-evaluate-expression do_segfault=1")
        .unwrap();
    session.exp_string(r#"3^done,value="1""#).unwrap();
    session.send_line("4-exec-continue").unwrap();
    session
        .exp_string(r#"*stopped,reason="exception-received",exception="invalid address (fault address: 0x10)""#)
        .unwrap();

    session.send_line("5-exec-continue").unwrap();
    session
        .exp_string(r#"*stopped,reason="exited-signalled",signal-name="SIGSEGV",signal-meaning="Segmentation fault""#)
        .unwrap();
    session.send_line("6-exec-interrupt").unwrap();
    session.exp_string(r#"6^error,msg="not running""#).unwrap();
}

#[test]
#[serial]
fn test_exit_code_and_output() {
    let mut session = spawn_mi();
    run_to_main(&mut session);

    session
        .send_line("3-data-evaluate-expression exit_code=3")
        .unwrap();
    session.exp_string(r#"3^done,value="3""#).unwrap();
    session.send_line("4-exec-continue").unwrap();
    session.exp_string(r#"@"bye\n""#).unwrap();
    session
        .exp_string(r#"*stopped,reason="exited",exit-code="3""#)
        .unwrap();
}

#[test]
#[serial]
fn test_console_commands() {
    let mut session = spawn_mi();
    session.send_line("1version").unwrap();
    session.exp_string("1^done").unwrap();
    session
        .send_line(r#"2-interpreter-exec console "platform select remote-linux""#)
        .unwrap();
    session.exp_string("2^error").unwrap();
    session.send_line("3-target-select remote localhost:1234").unwrap();
    session
        .exp_string(r#"3^error,msg="remote connection is not supported by this engine""#)
        .unwrap();
}
