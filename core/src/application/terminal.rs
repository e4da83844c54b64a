// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! One terminal session = one detached GNU screen session inside the
//! container plus an ephemeral attached exec.
//!
//! The screen session survives transport disconnects; only the attached
//! exec dies with the WebSocket. screen is used rather than tmux so users
//! can freely run tmux themselves (nested tmux refuses to start; screen
//! and tmux don't interfere).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::application::container_fs::EXEC_USER;
use crate::domain::error::CoreError;
use crate::domain::runtime::{ContainerRuntime, ExecReader, ExecWriter};

const SCREENRC_PATH: &str = "/tmp/.aisu_screenrc";
// Keeps screen invisible: no escape key (the browser terminal owns every
// keystroke), no bells, sane scrollback, 256-color terminal.
const SCREENRC_CONTENT: &str = concat!(
    "escape \"\"\n",
    "vbell off\n",
    "autodetach on\n",
    "startup_message off\n",
    "defscrollback 10000\n",
    "term xterm-256color\n",
);

fn term_env() -> Vec<(String, String)> {
    vec![("TERM".to_string(), "xterm-256color".to_string())]
}

pub struct TerminalSession {
    runtime: Arc<dyn ContainerRuntime>,
    container_name: String,
    session_id: Uuid,
    screen_session: String,
    exec_id: Mutex<Option<String>>,
    channel: Mutex<Option<(Box<dyn ExecReader>, Box<dyn ExecWriter>)>>,
    closed: AtomicBool,
}

impl TerminalSession {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container_name: impl Into<String>) -> Self {
        let session_id = Uuid::new_v4();
        let screen_session = format!("term_{}", &session_id.to_string()[..8]);
        Self {
            runtime,
            container_name: container_name.into(),
            session_id,
            screen_session,
            exec_id: Mutex::new(None),
            channel: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn screen_session(&self) -> &str {
        &self.screen_session
    }

    /// Create the detached screen session and attach a duplex exec to it.
    pub async fn start(&self) -> Result<(), CoreError> {
        // The rc file content is a fixed constant; only it goes through the
        // shell here. User input never does.
        let write_rc = format!("cat > {SCREENRC_PATH} << 'SCREENRC'\n{SCREENRC_CONTENT}SCREENRC");
        self.runtime
            .exec_unary(
                &self.container_name,
                &["bash".to_string(), "-c".to_string(), write_rc],
                EXEC_USER,
                &[],
            )
            .await
            .map_err(CoreError::from)?;

        let create = self
            .runtime
            .exec_unary(
                &self.container_name,
                &[
                    "screen".to_string(),
                    "-c".to_string(),
                    SCREENRC_PATH.to_string(),
                    "-dmS".to_string(),
                    self.screen_session.clone(),
                ],
                EXEC_USER,
                &term_env(),
            )
            .await
            .map_err(CoreError::from)?;
        if create.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to create terminal session: exit={} {}",
                create.exit_code, create.stderr
            )));
        }

        let channel = self
            .runtime
            .exec_stream(
                &self.container_name,
                &[
                    "screen".to_string(),
                    "-c".to_string(),
                    SCREENRC_PATH.to_string(),
                    "-r".to_string(),
                    self.screen_session.clone(),
                ],
                EXEC_USER,
                &term_env(),
                true,
                true,
            )
            .await
            .map_err(CoreError::from)?;

        *self.exec_id.lock().unwrap() = Some(channel.exec_id);
        *self.channel.lock().unwrap() = Some((channel.reader, channel.writer));
        Ok(())
    }

    /// Hand the duplex halves to the transport pumps. Can only be taken
    /// once per `start`.
    pub fn split(&self) -> Option<(Box<dyn ExecReader>, Box<dyn ExecWriter>)> {
        self.channel.lock().unwrap().take()
    }

    /// Resize the attached exec's PTY; screen adapts to it on its own.
    pub async fn resize(&self, rows: u16, cols: u16) -> Result<(), CoreError> {
        let exec_id = self.exec_id.lock().unwrap().clone();
        if let Some(exec_id) = exec_id {
            self.runtime
                .resize_exec(&exec_id, rows, cols)
                .await
                .map_err(CoreError::from)?;
        }
        Ok(())
    }

    /// Close the attached exec. The screen session is left alive for the
    /// next attach. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the halves closes the exec socket.
        self.channel.lock().unwrap().take();
        debug!(session = %self.screen_session, "terminal session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down the screen session itself. Only for a deliberate window
    /// close, never on transport disconnect.
    pub async fn kill_multiplexer_session(&self) {
        if let Err(err) = self
            .runtime
            .exec_unary(
                &self.container_name,
                &[
                    "screen".to_string(),
                    "-S".to_string(),
                    self.screen_session.clone(),
                    "-X".to_string(),
                    "quit".to_string(),
                ],
                EXEC_USER,
                &[],
            )
            .await
        {
            debug!(session = %self.screen_session, "screen quit failed: {err}");
        }
    }
}
