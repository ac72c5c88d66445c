//! Daemon service loop and command dispatch

use anyhow::{Context, Result, bail};
use pomo_api::{
    API_VERSION, Command, ErrorCode, ErrorInfo, Event, EventPayload, Response, ResponsePayload,
};
use pomo_config::{RulePreset, validate_rules};
use pomo_core::{CoreEvent, SessionRegistry};
use pomo_ipc::{IpcServer, ServerMessage};
use pomo_util::{ClientId, PomoError};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Main service state
pub struct Service {
    registry: Arc<SessionRegistry>,
    core_events: mpsc::UnboundedReceiver<CoreEvent>,
    ipc: Arc<IpcServer>,
}

impl Service {
    /// Validate the preset's rules and start listening on `socket_path`
    pub async fn new(socket_path: &Path, preset: RulePreset) -> Result<Self> {
        let rules = preset.rules();

        let errors = validate_rules(&rules);
        if !errors.is_empty() {
            for e in &errors {
                error!(error = %e, "Invalid rule set");
            }
            bail!("Rule preset '{}' is invalid", preset);
        }

        info!(preset = %preset, "Rules loaded");

        let (core_tx, core_events) = mpsc::unbounded_channel();
        let registry = Arc::new(SessionRegistry::new(rules, core_tx));

        let mut ipc = IpcServer::new(socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to start IPC server on {:?}", socket_path))?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        Ok(Self {
            registry,
            core_events,
            ipc: Arc::new(ipc),
        })
    }

    /// Serve until `shutdown` resolves, then cancel the session and say goodbye
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Service {
            registry,
            mut core_events,
            ipc,
        } = self;

        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = ipc.clone();
        let accept_task = tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        tokio::pin!(shutdown);

        info!("Service running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                Some(event) = core_events.recv() => {
                    handle_core_event(&ipc, event);
                }

                Some(msg) = ipc_messages.recv() => {
                    handle_ipc_message(&registry, &ipc, msg).await;
                }
            }
        }

        info!("Shutting down pomod");

        // Subscribers see the session end before the daemon goes away
        registry.shutdown().await;
        while let Ok(event) = core_events.try_recv() {
            handle_core_event(&ipc, event);
        }
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        accept_task.abort();
        ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

fn handle_core_event(ipc: &IpcServer, event: CoreEvent) {
    debug!(session_id = %event.session_id(), event = ?event, "Broadcasting core event");
    ipc.broadcast_event(Event::new(event.into()));
}

async fn handle_ipc_message(registry: &SessionRegistry, ipc: &IpcServer, msg: ServerMessage) {
    match msg {
        ServerMessage::Request { client_id, request } => {
            let response = handle_command(
                registry,
                &client_id,
                request.request_id,
                request.api_version,
                request.command,
            )
            .await;

            if let Err(e) = ipc.send_response(&client_id, response).await {
                warn!(client_id = %client_id, error = %e, "Failed to send response");
            }
        }

        ServerMessage::ClientConnected { client_id, info } => {
            let clients = ipc.client_count().await;
            info!(
                client_id = %client_id,
                uid = ?info.uid,
                clients = clients,
                "Client connected"
            );
        }

        ServerMessage::ClientDisconnected { client_id } => {
            debug!(client_id = %client_id, "Client disconnected");
        }
    }
}

/// Run one protocol command against the registry
pub async fn handle_command(
    registry: &SessionRegistry,
    client_id: &ClientId,
    request_id: u64,
    api_version: u32,
    command: Command,
) -> Response {
    if api_version != API_VERSION {
        return error_response(
            request_id,
            PomoError::validation(format!(
                "Unsupported API version {} (expected {})",
                api_version, API_VERSION
            )),
        );
    }

    let result = match command {
        Command::CreateSession => registry.create().await.map(ResponsePayload::Session),
        Command::GetSession => registry.read().await.map(ResponsePayload::Session),
        Command::ToggleSession => registry.toggle().await.map(ResponsePayload::Session),
        Command::DeleteSession => registry.delete().await.map(|()| ResponsePayload::Deleted),
        Command::SubscribeEvents => Ok(ResponsePayload::Subscribed {
            client_id: client_id.clone(),
        }),
        Command::UnsubscribeEvents => Ok(ResponsePayload::Unsubscribed),
        Command::Ping => Ok(ResponsePayload::Pong),
    };

    match result {
        Ok(payload) => Response::success(request_id, payload),
        Err(e) => {
            if e.is_precondition() {
                debug!(client_id = %client_id, request_id, error = %e, "Request declined");
            } else {
                warn!(client_id = %client_id, request_id, error = %e, "Request failed");
            }
            error_response(request_id, e)
        }
    }
}

fn error_response(request_id: u64, err: PomoError) -> Response {
    let code = match err {
        PomoError::NoActiveSession => ErrorCode::NotFound,
        PomoError::SessionAlreadyActive => ErrorCode::Conflict,
        PomoError::ValidationError(_) => ErrorCode::InvalidRequest,
    };

    Response::error(request_id, ErrorInfo::new(code, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_api::ResponseResult;
    use pomo_config::RuleSet;

    fn make_registry() -> SessionRegistry {
        let (tx, _rx) = mpsc::unbounded_channel();
        SessionRegistry::new(RuleSet::test(), tx)
    }

    async fn call(registry: &SessionRegistry, command: Command) -> ResponseResult {
        handle_command(registry, &ClientId::new(), 1, API_VERSION, command)
            .await
            .result
    }

    fn error_code(result: ResponseResult) -> ErrorCode {
        match result {
            ResponseResult::Err(e) => e.code,
            ResponseResult::Ok(payload) => panic!("Expected error, got {:?}", payload),
        }
    }

    #[tokio::test]
    async fn test_not_found_without_session() {
        let registry = make_registry();

        for command in [Command::GetSession, Command::ToggleSession, Command::DeleteSession] {
            assert_eq!(error_code(call(&registry, command).await), ErrorCode::NotFound);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_then_conflict() {
        let registry = make_registry();

        assert!(matches!(
            call(&registry, Command::CreateSession).await,
            ResponseResult::Ok(ResponsePayload::Session(ref snap)) if snap.started
        ));
        assert_eq!(
            error_code(call(&registry, Command::CreateSession).await),
            ErrorCode::Conflict
        );

        assert!(matches!(
            call(&registry, Command::DeleteSession).await,
            ResponseResult::Ok(ResponsePayload::Deleted)
        ));
        assert_eq!(
            error_code(call(&registry, Command::GetSession).await),
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_rejects_other_api_version() {
        let registry = make_registry();

        let response =
            handle_command(&registry, &ClientId::new(), 9, API_VERSION + 1, Command::Ping).await;
        assert_eq!(response.request_id, 9);
        assert_eq!(error_code(response.result), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_ping_and_subscribe() {
        let registry = make_registry();
        let client_id = ClientId::new();

        let response =
            handle_command(&registry, &client_id, 2, API_VERSION, Command::SubscribeEvents).await;
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::Subscribed { client_id: ref id }) if *id == client_id
        ));

        assert!(matches!(
            call(&registry, Command::Ping).await,
            ResponseResult::Ok(ResponsePayload::Pong)
        ));
    }
}
