use crate::ui::command::cli::host_port;
use crate::ui::command::{CommandError, CommandResult};
use crate::ui::mi::dispatch::Core;
use chumsky::prelude::end;
use chumsky::Parser;
use log::info;

pub enum Command {
    PlatformSelect {
        name: String,
        sysroot: Option<String>,
    },
    Connect {
        host: String,
        port: u16,
    },
}

/// Parse `-target-select remote <host>:<port>` arguments.
pub fn parse_target_select(args: &[String]) -> CommandResult<(String, u16)> {
    let invalid = |msg: &str| CommandError::InvalidArguments(format!("-target-select: {msg}"));
    match args {
        [kind, address] if kind == "remote" || kind == "extended-remote" => host_port()
            .then_ignore(end())
            .parse(address.as_str())
            .into_result()
            .map_err(|_| invalid(&format!("invalid address '{address}'"))),
        [kind, ..] if kind != "remote" && kind != "extended-remote" => {
            Err(invalid(&format!("unsupported target type '{kind}'")))
        }
        _ => Err(invalid("usage: -target-select remote <host>:<port>")),
    }
}

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    pub fn handle(&mut self, cmd: Command) -> CommandResult<()> {
        match cmd {
            Command::PlatformSelect { name, sysroot } => {
                self.core
                    .engine
                    .select_platform(&name, sysroot.as_deref())?;
                self.core.session.platform_selected(&name);
                info!(target: "mi", "platform selected: {name}");
            }
            Command::Connect { host, port } => {
                self.core.session.check_no_process()?;
                self.core.engine.connect_remote(&host, port)?;
                self.core.session.remote_connected()?;
                info!(target: "mi", "connected to {host}:{port}");
            }
        }
        Ok(())
    }
}

#[test]
fn test_parse_target_select() {
    let args = |a: &[&str]| a.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    assert_eq!(
        parse_target_select(&args(&["remote", "127.0.0.1:2345"])).unwrap(),
        ("127.0.0.1".to_string(), 2345)
    );
    assert_eq!(
        parse_target_select(&args(&["extended-remote", ":2345"])).unwrap(),
        ("localhost".to_string(), 2345)
    );
    assert!(parse_target_select(&args(&["remote", "host"])).is_err());
    assert!(parse_target_select(&args(&["native"])).is_err());
    assert!(parse_target_select(&args(&[])).is_err());
}
