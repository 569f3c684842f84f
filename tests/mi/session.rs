use crate::common::MiSession;

#[test]
fn test_remote_connect() {
    let mut session = MiSession::new();
    session.send(r#"1-interpreter-exec console "platform select remote-linux""#);
    session.expect_line(r#"~"  Platform: remote-linux\n""#);
    session.expect_line("1^done");

    session.send("2-target-select remote localhost:1234");
    session.expect_line("2^connected");
    session.send("3-file-exec-and-symbols a.out");
    session.expect_line("3^done");
    session.send("4-break-insert main");
    session.send("5-exec-run");
    session.expect_line("5^running");
    session.expect(r#"^\*stopped,reason="breakpoint-hit""#);
}

#[test]
fn test_remote_connect_failures() {
    let mut session = MiSession::new();
    session.send(r#"1-interpreter-exec console "platform select nowhere""#);
    session.expect_line(r#"1^error,msg="platform is not supported by this engine""#);

    session.control.set_remote_reachable(false);
    session.send("2-target-select remote localhost:1234");
    session.expect_line(
        r#"2^error,msg="failed to connect to localhost:1234: connection refused""#,
    );
    session.send("3-target-select remote localhost");
    session.expect(r#"^3\^error,msg="-target-select: invalid address 'localhost'"$"#);
    session.send("4-target-select native");
    session.expect(r#"^4\^error,msg="-target-select: unsupported target type 'native'"$"#);

    session.control.set_remote_reachable(true);
    session.send(r#"5-interpreter-exec console "process connect connect://localhost:1234""#);
    session.expect_line("5^done");
}

#[test]
fn test_transport_loss() {
    let mut session = MiSession::new();
    session.send("1-target-select remote :1234");
    session.expect_line("1^connected");
    session.send("2-file-exec-and-symbols a.out");
    session.send("3-data-evaluate-expression do_loop=1");
    session.send("4-exec-run");
    session.expect_line(r#"*running,thread-id="all""#);

    session.control.drop_connection("remote closed connection");
    session.expect_line(r#"&"connection lost: remote closed connection\n""#);

    session.send("5-thread-info");
    session.expect_line(r#"5^error,msg="connection lost: remote closed connection""#);
    session.send("6-exec-interrupt");
    session.expect_line(r#"6^error,msg="session closed""#);
    assert_eq!(session.control.calls("interrupt"), 0);
}

#[test]
fn test_command_interpreter_alias() {
    let mut session = MiSession::new();
    session.send(r#"1-interpreter-exec command "platform select remote-linux --sysroot /""#);
    session.expect_line(r#"~"  Platform: remote-linux\n""#);
    session.expect_line("1^done");
    session.send(r#"2-interpreter-exec command "process connect connect://localhost:1234""#);
    session.expect_line("2^done");
    session.send("3-file-exec-and-symbols a.out");
    session.expect_line("3^done");

    session.send(r#"4-interpreter-exec command "process launch -s""#);
    session.expect_line("4^done");
    session.expect_line(
        r#"*stopped,reason="end-stepping-range",thread-id="1",stopped-threads="all""#,
    );
}

#[test]
fn test_gdb_exit_after_transport_loss() {
    let mut session = MiSession::new();
    session.send("1-target-select remote :1234");
    session.send("2-file-exec-and-symbols a.out");
    session.send("3-data-evaluate-expression do_loop=1");
    session.send("4-exec-run");
    session.expect_line(r#"*running,thread-id="all""#);
    session.control.drop_connection("eof");
    session.expect_line(r#"&"connection lost: eof\n""#);

    assert!(session.send("5-gdb-exit").is_break());
    session.expect_line("5^exit");
    assert!(session.control.calls("shutdown") >= 1);

    // exit in a closed session still stops the interpreter
    assert!(session.send("6-gdb-exit").is_break());
    session.expect_line("6^exit");
}

#[test]
fn test_sigint_after_transport_loss() {
    let mut session = MiSession::new();
    session.send("1-target-select remote :1234");
    session.send("2-file-exec-and-symbols a.out");
    session.send("3-data-evaluate-expression do_loop=1");
    session.send("4-exec-run");
    session.expect_line(r#"*running,thread-id="all""#);
    session.control.drop_connection("eof");
    session.expect_line(r#"&"connection lost: eof\n""#);

    session.interrupter().interrupt();
    session.expect_line(r#"&"The program is not being run.\n""#);
    session.expect_none("failed to interrupt");
    assert_eq!(session.control.calls("interrupt"), 0);
}

#[test]
fn test_gdb_exit_closes_session() {
    let mut session = MiSession::new();
    session.run_to_main();

    assert!(session.send("4-gdb-exit").is_break());
    session.expect_line("4^exit");
    assert_eq!(session.control.calls("shutdown"), 1);

    session.send("5-exec-run");
    session.expect_line(r#"5^error,msg="session closed""#);
    session.send("6-file-exec-and-symbols a.out");
    session.expect_line(r#"6^error,msg="session closed""#);
}

#[test]
fn test_run_preconditions() {
    let mut session = MiSession::new();
    session.send("1-exec-run");
    session.expect_line(r#"1^error,msg="no executable file specified""#);
    session.send("2-exec-continue");
    session.expect_line(r#"2^error,msg="the program is not being run""#);

    session.run_to_main();
    session.send("4-exec-run");
    session.expect_line(r#"4^error,msg="the program is already running""#);
    session.send("5-file-exec-and-symbols b.out");
    session.expect_line(r#"5^error,msg="the program is being debugged already""#);
    session.send("6-target-select remote localhost:1234");
    session.expect_line(r#"6^error,msg="the program is being debugged already""#);
}

#[test]
fn test_environment() {
    let mut session = MiSession::new();
    session.send("1-environment-cd /nonexistent/dir");
    session.expect_line(r#"1^error,msg="/nonexistent/dir: No such file or directory.""#);
    session.send("2-environment-cd /tmp");
    session.expect_line("2^done");
    session.send("3-exec-arguments --verbose 1 2");
    session.expect_line("3^done");
    session.send("4-exec-arguments");
    session.expect_line("4^done");
}
