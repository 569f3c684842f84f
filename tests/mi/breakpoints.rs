use crate::common::MiSession;
use bugstalker_mi::engine::scripted::FaultStyle;

#[test]
fn test_pending_breakpoint_resolved() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert -f lib_func");
    session.expect_line(r#"2^done,bkpt={number="1"}"#);

    session.control.load_library(&[("lib_func", 0x7f0000001000)]);
    session.expect_line(
        r#"=breakpoint-modified,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x00007f0000001000",func="lib_func",times="0",original-location="lib_func"}"#,
    );
}

#[test]
fn test_unresolved_breakpoint_does_not_take_number() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert nope");
    session.expect_line(r#"2^error,msg="could not resolve breakpoint location \"nope\"""#);
    session.send("3-break-insert main");
    session.expect_line(r#"3^done,bkpt={number="1"}"#);
    session.send("4-break-insert -f");
    session.expect_line(r#"4^error,msg="-break-insert: missing location""#);
}

#[test]
fn test_detailed_records() {
    let mut session = MiSession::with_engine(FaultStyle::Linux, true);
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert main");
    session.expect_line(
        r#"2^done,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x0000000000401000",func="main",times="0",original-location="main"}"#,
    );
    session.send("3-break-insert -f nowhere");
    session.expect_line(
        r#"3^done,bkpt={number="2",type="breakpoint",disp="keep",enabled="y",addr="<PENDING>",times="0",original-location="nowhere"}"#,
    );

    session.send("4-exec-run");
    session.expect_line("4^running");
    session.expect_line(
        r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={addr="0x0000000000401000",func="main",args=[]},thread-id="1",stopped-threads="all""#,
    );
}

#[test]
fn test_ignore_count() {
    let mut session = MiSession::with_engine(FaultStyle::Linux, true);
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-data-evaluate-expression do_loop=1");
    session.send("3-break-insert -i 2 loop_body");
    session.expect_line(
        r#"3^done,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x0000000000401040",func="loop_body",ignore="2",times="0",original-location="loop_body"}"#,
    );

    session.send("4-exec-run");
    session.expect_line("4^running");
    session.expect_line(r#"*running,thread-id="all""#);
    session.expect(r#"^\*stopped,reason="breakpoint-hit",disp="keep",bkptno="1","#);
    let running = session
        .lines()
        .iter()
        .filter(|l| l.starts_with("*running"))
        .count();
    assert_eq!(running, 1);
    // two hits skipped
    assert_eq!(session.control.calls("resume"), 2);
}

#[test]
fn test_temporary_breakpoint() {
    let mut session = MiSession::with_engine(FaultStyle::Linux, true);
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-data-evaluate-expression do_loop=1");
    session.send("3-break-insert -t loop_body");
    session.expect(r#"^3\^done,bkpt=\{number="1",type="breakpoint",disp="del","#);

    session.send("4-exec-run");
    session.expect(r#"^\*stopped,reason="breakpoint-hit",disp="del",bkptno="1","#);
    assert_eq!(session.control.calls("remove_breakpoint"), 1);

    // breakpoint is gone, program loops until interrupted
    session.send("5-exec-continue");
    session.expect_line("5^running");
    session.send("6-exec-interrupt");
    session.expect_line("6^done");
    session.expect(r#"^\*stopped,reason="signal-received",signal-name="SIGINT""#);
}

#[test]
fn test_condition() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send(r#"2-break-insert -c "do_loop == 1" main"#);
    session.expect_line(r#"2^done,bkpt={number="1"}"#);

    // condition is false, program runs to its end
    session.send("3-exec-run");
    session.expect_line("3^running");
    session.expect_line(r#"@"bye\n""#);
    session.expect_line(r#"*stopped,reason="exited-normally""#);

    session.send("4-data-evaluate-expression do_loop=1");
    session.send("5-exec-run");
    session.expect_line("5^running");
    session.expect_line(r#"*stopped,reason="breakpoint-hit",thread-id="1",stopped-threads="all""#);
}

#[test]
fn test_condition_error_stops() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send(r#"2-break-insert -c "nope == 1" main"#);
    session.send("3-exec-run");
    session.expect_line(
        r#"&"Error in testing condition for breakpoint 1: use of undeclared identifier 'nope'\n""#,
    );
    session.expect_line(r#"*stopped,reason="breakpoint-hit",thread-id="1",stopped-threads="all""#);
}

#[test]
fn test_thread_filter() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert -p 2 main");
    session.expect_line(r#"2^done,bkpt={number="1"}"#);
    session.send("3-exec-run");
    session.expect_line(r#"*stopped,reason="exited-normally""#);
}

#[test]
fn test_disabled_breakpoint() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert -d main");
    session.send("3-exec-run");
    session.expect_line(r#"*stopped,reason="exited-normally""#);
}

#[test]
fn test_enable_disabled_breakpoint() {
    let mut session = MiSession::new();
    session.send("1-file-exec-and-symbols a.out");
    session.send("2-break-insert -d main");
    session.expect_line(r#"2^done,bkpt={number="1"}"#);
    session.send("3-break-enable 1");
    session.expect_line("3^done");
    session.send("4-exec-run");
    session.expect_line(r#"*stopped,reason="breakpoint-hit",thread-id="1",stopped-threads="all""#);

    session.send("5-break-disable 1");
    session.expect_line("5^done");
    session.send("6-break-enable 1 2");
    session.expect_line(r#"6^error,msg="Bad breakpoint number '2'""#);
    session.send("7-exec-continue");
    session.expect_line(r#"*stopped,reason="exited-normally""#);

    session.send("8-exec-run");
    session.expect_line("8^running");
    session.expect_line(r#"*stopped,reason="exited-normally""#);
}
