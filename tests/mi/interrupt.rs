use crate::common::MiSession;
use bugstalker_mi::engine::scripted::FaultStyle;

const SIGINT_STOP: &str = r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",thread-id="1",stopped-threads="all""#;

fn run_endless_loop(session: &mut MiSession) {
    session.run_to_main();
    session.send("4-data-evaluate-expression do_loop=1");
    session.expect_line(r#"4^done,value="1""#);
    session.send("5-exec-continue");
    session.expect_line("5^running");
    session.expect_line(r#"*running,thread-id="all""#);
}

#[test]
fn test_interrupt_endless_loop() {
    let mut session = MiSession::new();
    run_endless_loop(&mut session);

    session.send("6-exec-interrupt");
    session.expect_line("6^done");
    session.expect_line(SIGINT_STOP);

    // loop again and again
    for i in 0..3 {
        let token = 10 + i * 2;
        session.send(&format!("{token}-exec-continue"));
        session.expect_line(&format!("{token}^running"));
        session.send(&format!("{}-exec-interrupt", token + 1));
        session.expect_line(&format!("{}^done", token + 1));
        session.expect_line(SIGINT_STOP);
    }
    assert_eq!(session.control.calls("interrupt"), 4);
}

#[test]
fn test_interrupt_without_process() {
    let mut session = MiSession::new();
    session.send("1-exec-interrupt");
    session.expect_line(r#"1^error,msg="not running""#);

    session.send("2-file-exec-and-symbols a.out");
    session.expect_line("2^done");
    session.send("3-exec-interrupt");
    session.expect_line(r#"3^error,msg="not running""#);
    assert_eq!(session.control.calls("interrupt"), 0);
}

#[test]
fn test_interrupt_at_entry_stop() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-exec-run --start");
    session.expect_line("2^running");
    session.expect_line(
        r#"*stopped,reason="end-stepping-range",thread-id="1",stopped-threads="all""#,
    );

    session.send("3-exec-interrupt");
    session.expect_line(r#"3^error,msg="not running""#);
}

#[test]
fn test_interrupt_after_exit() {
    let mut session = MiSession::new();
    run_endless_loop(&mut session);

    assert!(session.control.exit(0));
    session.expect_line(r#"*stopped,reason="exited-normally""#);

    session.send("6-exec-interrupt");
    session.expect_line(r#"6^error,msg="not running""#);
    session.expect_none(r#"reason="signal-received""#);
}

#[test]
fn test_console_interrupt() {
    let mut session = MiSession::new();
    run_endless_loop(&mut session);

    session.send("6process interrupt");
    session.expect_line("6^done");
    session.expect_line(SIGINT_STOP);

    session.send("7-interpreter-exec console continue");
    session.expect_line("7^done");
    session.expect_line(r#"*running,thread-id="all""#);
    session.send("8-exec-interrupt --thread-group i1");
    session.expect_line("8^done");
    session.expect_line(SIGINT_STOP);
}

fn segfault_then_continue(style: FaultStyle, exception: &str) {
    let mut session = MiSession::with_engine(style, false);
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-data-evaluate-expression do_segfault=1");
    session.expect_line(r#"2^done,value="1""#);

    session.send("3-exec-run");
    session.expect_line("3^running");
    session.expect_line(&format!(
        r#"*stopped,reason="exception-received",exception="{exception}",thread-id="1",stopped-threads="all""#
    ));

    session.send("4-exec-continue");
    session.expect_line("4^running");
    session.expect_line(
        r#"*stopped,reason="exited-signalled",signal-name="SIGSEGV",signal-meaning="Segmentation fault""#,
    );

    session.send("5-exec-interrupt");
    session.expect_line(r#"5^error,msg="not running""#);
}

#[test]
fn test_segfault_linux() {
    segfault_then_continue(FaultStyle::Linux, "invalid address (fault address: 0x0)");
}

#[test]
fn test_segfault_darwin() {
    segfault_then_continue(FaultStyle::Darwin, "EXC_BAD_ACCESS (code=1, address=0x0)");
}
