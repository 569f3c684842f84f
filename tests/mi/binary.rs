//! Tests of the `bs-mi` binary over pipes, with a scripted engine.

use assert_cmd::Command;

fn run_scripted(input: &str) -> Vec<String> {
    let output = Command::cargo_bin("bs-mi")
        .unwrap()
        .args(["--engine", "scripted", "--no-prompt"])
        .env_remove("BS_MI_CONFIG")
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_scripted_engine_dry_run() {
    let lines = run_scripted(
        "1-file-exec-and-symbols a.out\n\
         2-break-insert -f main\n\
         3-data-evaluate-expression exit_code=3\n\
         4-interpreter-exec command \"platform select remote-linux\"\n\
         5-gdb-exit\n",
    );
    assert_eq!(
        lines,
        vec![
            "1^done",
            r#"2^done,bkpt={number="1"}"#,
            r#"3^done,value="3""#,
            r#"~"  Platform: remote-linux\n""#,
            "4^done",
            "5^exit",
        ]
    );
}

#[test]
fn test_scripted_engine_end_of_input() {
    let lines = run_scripted("1-exec-interrupt\n");
    assert_eq!(lines, vec![r#"1^error,msg="not running""#]);
}
