//! pomoctl - command line client for pomod
//!
//! Each subcommand maps onto one protocol command; `watch` subscribes and
//! prints events until the daemon goes away.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pomo_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, ResponsePayload, SessionEndReason,
    SessionSnapshot,
};
use pomo_ipc::{IpcClient, IpcError};
use pomo_util::{default_socket_path, format_countdown, format_datetime_full};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// pomoctl - control the pomod pomodoro service
#[derive(Parser, Debug)]
#[command(name = "pomoctl")]
#[command(about = "Command line client for pomod", long_about = None)]
struct Args {
    /// Socket path for pomod connection (or set POMO_SOCKET env var)
    #[arg(short, long, env = "POMO_SOCKET")]
    socket: Option<PathBuf>,

    /// Print raw JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Start a new session
    Start,
    /// Show the current session
    Status,
    /// Pause or resume the current session
    Toggle,
    /// Cancel the current session
    Stop,
    /// Follow session events
    Watch,
}

impl Action {
    fn command(self) -> Command {
        match self {
            Action::Start => Command::CreateSession,
            Action::Status => Command::GetSession,
            Action::Toggle => Command::ToggleSession,
            Action::Stop => Command::DeleteSession,
            Action::Watch => Command::SubscribeEvents,
        }
    }
}

fn describe_session(snap: &SessionSnapshot) -> String {
    let state = if snap.finished {
        "finished"
    } else if snap.is_paused() {
        "paused"
    } else {
        "running"
    };

    let mut out = format!(
        "{} [{}] {} elapsed, {} remaining\nwork {}/{}, breaks {}/{}",
        snap.phase_label(),
        state,
        format_countdown(snap.elapsed),
        format_countdown(snap.remaining),
        snap.work_count,
        snap.rules.work.rounds,
        snap.break_count,
        snap.rules.breaks.rounds,
    );

    if let Some(started_at) = &snap.started_at {
        out.push_str(&format!("\nstarted {}", format_datetime_full(started_at)));
    }
    if let Some(finished_at) = &snap.finished_at {
        out.push_str(&format!("\nfinished {}", format_datetime_full(finished_at)));
    }

    out
}

fn describe_payload(payload: &ResponsePayload) -> String {
    match payload {
        ResponsePayload::Session(snap) => describe_session(snap),
        ResponsePayload::Deleted => "Session stopped".into(),
        ResponsePayload::Subscribed { client_id } => format!("Subscribed as {}", client_id),
        ResponsePayload::Unsubscribed => "Unsubscribed".into(),
        ResponsePayload::Pong => "pong".into(),
    }
}

fn describe_error(error: &ErrorInfo) -> String {
    match error.code {
        ErrorCode::NotFound => "No session is running (try `pomoctl start`)".into(),
        ErrorCode::Conflict => "A session is already running".into(),
        ErrorCode::InvalidRequest => format!("pomod rejected the request: {}", error.message),
    }
}

fn describe_event(event: &Event) -> String {
    let time = event.timestamp.format("%H:%M:%S");
    let text = match &event.payload {
        EventPayload::SessionStarted { session_id, .. } => {
            format!("session {} started", session_id.short())
        }
        EventPayload::RunStateChanged { running: true, .. } => "resumed".into(),
        EventPayload::RunStateChanged { running: false, .. } => "paused".into(),
        EventPayload::PhaseChanged {
            is_long_break: true,
            ..
        } => "long break".into(),
        EventPayload::PhaseChanged {
            phase,
            work_count,
            break_count,
            ..
        } => format!(
            "phase {} (work {}, breaks {})",
            phase, work_count, break_count
        ),
        EventPayload::SessionEnded {
            reason: SessionEndReason::Completed,
            ..
        } => "session completed".into(),
        EventPayload::SessionEnded {
            reason: SessionEndReason::Cancelled,
            ..
        } => "session cancelled".into(),
        EventPayload::Shutdown => "pomod shutting down".into(),
    };

    format!("{} {}", time, text)
}

async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut events = client
        .subscribe()
        .await
        .context("Failed to subscribe to events")?;

    loop {
        let event = match events.next().await {
            Ok(event) => event,
            Err(IpcError::ConnectionClosed) => {
                debug!("pomod closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{}", describe_event(&event));
        }

        if matches!(event.payload, EventPayload::Shutdown) {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let socket_path = args.socket.unwrap_or_else(default_socket_path);
    debug!(path = %socket_path.display(), "Connecting to pomod");

    let mut client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to pomod at {}", socket_path.display()))?;

    if args.action == Action::Watch {
        return watch(client, args.json).await;
    }

    let payload = match client.call(args.action.command()).await {
        Ok(payload) => payload,
        Err(IpcError::Rejected(e)) => bail!(describe_error(&e)),
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", describe_payload(&payload));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_api::Phase;
    use pomo_config::RuleSet;
    use pomo_util::SessionId;
    use std::time::Duration;

    fn make_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId::new(),
            elapsed: Duration::from_secs(65),
            remaining: Duration::from_secs(25 * 60),
            started_at: None,
            finished_at: None,
            running: true,
            started: true,
            finished: false,
            phase: Phase::Working,
            work_count: 1,
            break_count: 1,
            is_long_break: false,
            rules: RuleSet::classic(),
        }
    }

    #[test]
    fn args_parse_subcommands() {
        let args = Args::parse_from(["pomoctl", "--socket", "/tmp/p.sock", "status"]);
        assert_eq!(args.action, Action::Status);
        assert_eq!(args.socket, Some(PathBuf::from("/tmp/p.sock")));
        assert!(!args.json);

        let args = Args::parse_from(["pomoctl", "--json", "watch"]);
        assert_eq!(args.action, Action::Watch);
        assert!(args.json);

        assert!(Args::try_parse_from(["pomoctl"]).is_err());
    }

    #[test]
    fn actions_map_to_commands() {
        assert!(matches!(Action::Start.command(), Command::CreateSession));
        assert!(matches!(Action::Status.command(), Command::GetSession));
        assert!(matches!(Action::Toggle.command(), Command::ToggleSession));
        assert!(matches!(Action::Stop.command(), Command::DeleteSession));
        assert!(matches!(Action::Watch.command(), Command::SubscribeEvents));
    }

    #[test]
    fn session_summary() {
        let text = describe_session(&make_snapshot());
        assert!(text.starts_with("work [running] 01:05 elapsed, 25:00 remaining"));
        assert!(text.contains("work 1/4, breaks 1/3"));

        let mut paused = make_snapshot();
        paused.running = false;
        paused.phase = Phase::Break;
        paused.is_long_break = true;
        assert!(describe_session(&paused).starts_with("long break [paused]"));
    }

    #[test]
    fn error_messages_by_code() {
        let not_found = ErrorInfo::new(ErrorCode::NotFound, "No session started");
        assert!(describe_error(&not_found).contains("pomoctl start"));

        let invalid = ErrorInfo::new(ErrorCode::InvalidRequest, "Unsupported API version 2");
        assert!(describe_error(&invalid).ends_with("Unsupported API version 2"));
    }

    #[test]
    fn event_lines() {
        let event = Event::new(EventPayload::SessionEnded {
            session_id: SessionId::new(),
            reason: SessionEndReason::Cancelled,
        });
        assert!(describe_event(&event).ends_with("session cancelled"));

        let event = Event::new(EventPayload::PhaseChanged {
            session_id: SessionId::new(),
            phase: Phase::Break,
            work_count: 1,
            break_count: 0,
            is_long_break: false,
        });
        assert!(describe_event(&event).ends_with("phase B (work 1, breaks 0)"));
    }
}
