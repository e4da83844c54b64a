// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! WebSocket terminal endpoint.
//!
//! Flow: authenticate from the query token, ensure the container runs
//! (status frame while it starts), create a [`TerminalSession`], then pump
//! bytes both ways until either side closes. Teardown closes the attached
//! exec but leaves the in-container screen session alive.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::application::terminal::TerminalSession;
use crate::domain::runtime::ContainerRuntime;
use crate::domain::user::User;
use crate::presentation::api::AppState;

const READY_POLL_ATTEMPTS: u32 = 20;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const READY_SETTLE: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
pub struct TerminalQuery {
    token: Option<String>,
}

/// JSON control frames sent as text messages. Anything that fails to
/// parse as JSON is treated as raw UTF-8 user input.
#[derive(Deserialize)]
struct ControlFrame {
    #[serde(rename = "type")]
    kind: String,
    rows: Option<u16>,
    cols: Option<u16>,
}

pub async fn terminal_ws(
    State(state): State<AppState>,
    Query(query): Query<TerminalQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, query.token, socket))
}

async fn handle_socket(state: AppState, token: Option<String>, mut socket: WebSocket) {
    let Some(user) = authenticate(&state, token.as_deref()).await else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "authentication failed".into(),
            })))
            .await;
        return;
    };

    let container_name = user.container_name();
    if send_json(
        &mut socket,
        json!({ "type": "status", "status": "starting-container" }),
    )
    .await
    .is_err()
    {
        return;
    }

    let action = match state
        .container_manager()
        .start(user.id, user.cpu, user.disk)
        .await
    {
        Ok(action) => action,
        Err(err) => {
            debug!(user = %user.id, "container start failed: {err}");
            let _ = send_json(
                &mut socket,
                json!({ "type": "error", "message": "Container failed to start" }),
            )
            .await;
            return;
        }
    };
    if action.status != "running" {
        let _ = send_json(
            &mut socket,
            json!({ "type": "error", "message": "Container failed to start" }),
        )
        .await;
        return;
    }

    // A freshly (re)provisioned container needs a moment before screen can
    // attach to it.
    if action.provisioned() {
        wait_for_ready(state.runtime.as_ref(), &container_name).await;
    }

    let session = Arc::new(TerminalSession::new(
        Arc::clone(&state.runtime),
        &container_name,
    ));
    if let Err(err) = session.start().await {
        debug!(user = %user.id, "terminal session start failed: {err}");
        let _ = send_json(
            &mut socket,
            json!({ "type": "error", "message": "Failed to create terminal session" }),
        )
        .await;
        return;
    }

    if send_json(
        &mut socket,
        json!({ "type": "ready", "sessionId": session.session_id() }),
    )
    .await
    .is_err()
    {
        session.close();
        return;
    }

    let Some((mut reader, mut writer)) = session.split() else {
        session.close();
        return;
    };
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Container → transport. On EOF, attribute it: a stopped container is
    // reported with its last log lines.
    let container_to_transport = async {
        loop {
            match reader.read().await {
                Ok(data) if data.is_empty() => {
                    let reason = attribute_eof(state.runtime.as_ref(), &container_name).await;
                    let _ = send_error(&mut ws_tx, &reason).await;
                    break;
                }
                Ok(data) => {
                    if ws_tx.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!("terminal read failed: {err}");
                    break;
                }
            }
        }
    };

    // Transport → container. Binary frames are bytes; text frames are
    // either JSON control or raw input.
    let session_for_resize = Arc::clone(&session);
    let transport_to_container = async {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Binary(data) => {
                    if writer.write(&data).await.is_err() {
                        break;
                    }
                }
                Message::Text(text) => match serde_json::from_str::<ControlFrame>(&text) {
                    Ok(frame) if frame.kind == "resize" => {
                        let _ = session_for_resize
                            .resize(frame.rows.unwrap_or(24), frame.cols.unwrap_or(80))
                            .await;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        if writer.write(text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    // First pump to finish wins; the other is cancelled by drop.
    tokio::select! {
        _ = container_to_transport => debug!("container->transport pump finished"),
        _ = transport_to_container => debug!("transport->container pump finished"),
    }

    session.close();
}

async fn authenticate(state: &AppState, token: Option<&str>) -> Option<User> {
    let token = token?;
    let user = state.auth_service().current_user(token).await.ok()?;
    if !user.is_active {
        return None;
    }
    Some(user)
}

async fn wait_for_ready(runtime: &dyn ContainerRuntime, container_name: &str) {
    for _ in 0..READY_POLL_ATTEMPTS {
        if runtime
            .inspect(container_name)
            .await
            .map(|state| state.status.is_running())
            .unwrap_or(false)
        {
            break;
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
    tokio::time::sleep(READY_SETTLE).await;
}

async fn attribute_eof(runtime: &dyn ContainerRuntime, container_name: &str) -> String {
    match runtime.inspect(container_name).await {
        Ok(state) if !state.status.is_running() => {
            let logs = runtime
                .logs_tail(container_name, 3)
                .await
                .unwrap_or_default();
            format!("Container stopped ({}): {}", state.status.as_str(), logs)
        }
        _ => "Terminal channel closed".to_string(),
    }
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string().into())).await
}

async fn send_error(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: &str,
) -> Result<(), axum::Error> {
    ws_tx
        .send(Message::Text(
            json!({ "type": "error", "message": message }).to_string().into(),
        ))
        .await
}
