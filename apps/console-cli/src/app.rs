//! Terminal front end: wires the panel token source and console session to
//! stdin/stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use pteroconsole_connection::{ConsoleSession, SessionConfig, SessionError, SessionEvent, WsConnector};
use pteroconsole_panel_api::{Client, PanelTokenSource};
use pteroconsole_protocol::{PowerAction, ResourceSnapshot};

use crate::config::Config;

const MIB: f64 = 1024.0 * 1024.0;

/// Runs the console until `:quit`, end of input, or Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let client = Arc::new(Client::new(&config.panel_url, &config.client_key)?);
    let source = PanelTokenSource::new(client, config.server_id.clone());
    let session = ConsoleSession::new(SessionConfig::new(&config.panel_url), source, WsConnector)?;

    let mut events = session
        .take_events()
        .await
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
    session.connect()?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => println!("{}", render(&event)),
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("end of input");
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::Power(action) => {
                        report(action.as_str(), session.set_power_state(action).await);
                    }
                    Input::Command(command) => {
                        report("command", session.send_command(&command).await);
                    }
                    Input::Unknown(directive) => {
                        eprintln!("unknown directive :{directive} (try :start, :stop, :restart, :kill, :quit)");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
        }
    }

    session.disconnect().await;
    while let Ok(event) = events.try_recv() {
        println!("{}", render(&event));
    }
    Ok(())
}

fn report(what: &str, result: Result<bool, SessionError>) {
    match result {
        Ok(true) => {}
        Ok(false) => eprintln!("not connected, {what} dropped"),
        Err(e) => tracing::warn!(error = %e, "failed to send {what}"),
    }
}

/// One line typed by the user.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Power(PowerAction),
    Command(String),
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }
    let Some(directive) = line.strip_prefix(':') else {
        return Input::Command(line.to_string());
    };
    let directive = directive.trim();
    if directive.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    match directive.parse::<PowerAction>() {
        Ok(action) => Input::Power(action),
        Err(_) => Input::Unknown(directive.to_string()),
    }
}

fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::ConnectionChanged(state) => format!("STATUS: {state}"),
        SessionEvent::LifecycleChanged(state) => format!("SERVER: {state}"),
        SessionEvent::ResourcesChanged(snapshot) => format!("STATS: {}", render_stats(snapshot)),
        SessionEvent::Output(line) => format!("OUTPUT: {line}"),
        SessionEvent::Diagnostic(message) => format!("DEBUG: {message}"),
    }
}

fn render_stats(s: &ResourceSnapshot) -> String {
    format!(
        "cpu {:.1}% | mem {:.1}/{:.1} MiB | disk {:.1} MiB | net rx {} B tx {} B | up {}s",
        s.cpu_absolute,
        s.memory_bytes as f64 / MIB,
        s.memory_limit_bytes as f64 / MIB,
        s.disk_bytes as f64 / MIB,
        s.network.rx_bytes,
        s.network.tx_bytes,
        s.uptime / 1000,
    )
}
