use crate::common::MiSession;
use nix::sys::signal::{raise, Signal};
use serial_test::serial;

fn run_endless_loop(session: &mut MiSession) {
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-data-evaluate-expression do_loop=1");
    session.send("3-exec-run");
    session.expect_line("3^running");
    session.expect_line(r#"*running,thread-id="all""#);
}

#[test]
fn test_program_receives_signal() {
    let mut session = MiSession::new();
    run_endless_loop(&mut session);

    assert!(session.control.raise("SIGUSR1"));
    session.expect_line(
        r#"*stopped,reason="signal-received",signal-name="SIGUSR1",signal-meaning="User defined signal 1",thread-id="1",stopped-threads="all""#,
    );

    session.send("4-exec-continue");
    session.expect_line("4^running");
    assert!(session.control.raise("SIGKILL"));
    session.expect_line(
        r#"*stopped,reason="exited-signalled",signal-name="SIGKILL",signal-meaning="Killed""#,
    );
}

#[test]
fn test_interrupter() {
    let mut session = MiSession::new();
    let interrupter = session.interrupter();

    interrupter.interrupt();
    session.expect_line(r#"&"The program is not being run.\n""#);

    run_endless_loop(&mut session);
    interrupter.interrupt();
    interrupter.interrupt();
    session.expect_line(
        r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",thread-id="1",stopped-threads="all""#,
    );
    session.expect_none(r#"^\*stopped"#);
    assert_eq!(session.control.calls("interrupt"), 1);
}

#[test]
#[serial]
fn test_sigint_interrupts_running_program() {
    let mut session = MiSession::new();
    session.app.install_ctrlc().unwrap();
    run_endless_loop(&mut session);

    raise(Signal::SIGINT).unwrap();
    session.expect_line(
        r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",thread-id="1",stopped-threads="all""#,
    );
}
