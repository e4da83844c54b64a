// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Terminal session tests: the detached screen session must outlive the
//! attached exec.

mod support;

use std::sync::Arc;

use aisu_core::application::terminal::TerminalSession;
use aisu_core::domain::runtime::ContainerRuntime;
use support::RecordingRuntime;

fn session(runtime: &Arc<RecordingRuntime>) -> TerminalSession {
    TerminalSession::new(
        Arc::clone(runtime) as Arc<dyn ContainerRuntime>,
        "aisu_term",
    )
}

#[tokio::test]
async fn start_creates_a_detached_screen_and_attaches() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);

    term.start().await.unwrap();

    let screen = term.screen_session().to_string();
    assert!(screen.starts_with("term_"));
    assert_eq!(screen.len(), "term_".len() + 8);

    assert!(runtime.called("bash -c"), "screenrc must be written first");
    assert!(runtime.called(&format!("-dmS {screen}")));
    assert!(runtime.called(&format!("exec_stream aisu_term: screen -c /tmp/.aisu_screenrc -r {screen}")));
}

#[tokio::test]
async fn close_preserves_the_multiplexer_session() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);
    term.start().await.unwrap();

    term.close();
    term.close(); // idempotent

    assert!(term.is_closed());
    assert!(
        !runtime.called("-X quit"),
        "close must never kill the screen session"
    );

    // A later session can create a fresh multiplexer while the old one is
    // still alive in the container.
    let next = session(&runtime);
    next.start().await.unwrap();
    assert_ne!(next.screen_session(), term.screen_session());
    assert!(!runtime.called("-X quit"));
}

#[tokio::test]
async fn deliberate_kill_quits_the_screen_session() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);
    term.start().await.unwrap();

    term.kill_multiplexer_session().await;

    assert!(runtime.called(&format!("screen -S {} -X quit", term.screen_session())));
}

#[tokio::test]
async fn resize_goes_through_the_attached_exec() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);
    term.start().await.unwrap();

    term.resize(50, 120).await.unwrap();

    assert!(runtime.called("resize exec-aisu_term 50x120"));
}

#[tokio::test]
async fn resize_before_start_is_a_no_op() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);

    term.resize(24, 80).await.unwrap();

    assert!(!runtime.called("resize"));
}

#[tokio::test]
async fn split_hands_out_the_duplex_halves_once() {
    let runtime = Arc::new(RecordingRuntime::new());
    let term = session(&runtime);
    term.start().await.unwrap();

    let (mut reader, mut writer) = term.split().expect("channel available after start");
    assert!(term.split().is_none(), "the channel can only be taken once");

    writer.write(b"ls -la\n").await.unwrap();
    assert_eq!(&*runtime.written.lock().unwrap(), b"ls -la\n");

    // The fake exec is at EOF from the start: reads yield empty bytes.
    let chunk = reader.read().await.unwrap();
    assert!(chunk.is_empty());
}

#[tokio::test]
async fn failed_screen_creation_is_fatal() {
    struct FailingScreen {
        inner: RecordingRuntime,
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for FailingScreen {
        async fn create(
            &self,
            spec: &aisu_core::domain::runtime::ContainerSpec,
        ) -> Result<String, aisu_core::domain::runtime::RuntimeError> {
            self.inner.create(spec).await
        }
        async fn start(&self, name: &str) -> Result<(), aisu_core::domain::runtime::RuntimeError> {
            self.inner.start(name).await
        }
        async fn stop(
            &self,
            name: &str,
            grace: i64,
        ) -> Result<(), aisu_core::domain::runtime::RuntimeError> {
            self.inner.stop(name, grace).await
        }
        async fn inspect(
            &self,
            name: &str,
        ) -> Result<aisu_core::domain::runtime::ContainerState, aisu_core::domain::runtime::RuntimeError>
        {
            self.inner.inspect(name).await
        }
        async fn remove(&self, name: &str) -> Result<(), aisu_core::domain::runtime::RuntimeError> {
            self.inner.remove(name).await
        }
        async fn logs_tail(
            &self,
            name: &str,
            lines: usize,
        ) -> Result<String, aisu_core::domain::runtime::RuntimeError> {
            self.inner.logs_tail(name, lines).await
        }
        async fn exec_unary(
            &self,
            name: &str,
            argv: &[String],
            user: &str,
            env: &[(String, String)],
        ) -> Result<aisu_core::domain::runtime::ExecOutput, aisu_core::domain::runtime::RuntimeError>
        {
            let out = self.inner.exec_unary(name, argv, user, env).await?;
            if argv.iter().any(|a| a == "-dmS") {
                return Ok(aisu_core::domain::runtime::ExecOutput {
                    exit_code: 1,
                    stderr: "screen: command not found".to_string(),
                    ..out
                });
            }
            Ok(out)
        }
        async fn exec_stream(
            &self,
            name: &str,
            argv: &[String],
            user: &str,
            env: &[(String, String)],
            tty: bool,
            stdin: bool,
        ) -> Result<aisu_core::domain::runtime::ExecChannel, aisu_core::domain::runtime::RuntimeError>
        {
            self.inner.exec_stream(name, argv, user, env, tty, stdin).await
        }
        async fn resize_exec(
            &self,
            exec_id: &str,
            rows: u16,
            cols: u16,
        ) -> Result<(), aisu_core::domain::runtime::RuntimeError> {
            self.inner.resize_exec(exec_id, rows, cols).await
        }
    }

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(FailingScreen {
        inner: RecordingRuntime::new(),
    });
    let term = TerminalSession::new(runtime, "aisu_term");

    let result = term.start().await;
    assert!(result.is_err(), "non-zero screen exit must be fatal");
    assert!(term.split().is_none(), "no channel on failed start");
}
