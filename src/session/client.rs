// Client handle and session actor
//
// The actor task owns the LiveSession and is the only place its state is
// touched. Commands from handles and events from the running session are
// multiplexed in one loop, so capture, transport and playback completions
// never race on the reconciler or scheduler.

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use super::session::LiveSession;
use super::stats::SessionStats;
use super::status::{SessionState, StatusUpdate};
use crate::error::{SessionError, SessionResult};
use crate::transcript::Transcript;

/// Point-in-time view of the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub status: String,
    pub stats: SessionStats,
    pub transcript: Transcript,
}

enum Command {
    Start(oneshot::Sender<SessionResult<()>>),
    Stop(oneshot::Sender<SessionStats>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable handle to a session actor
#[derive(Clone)]
pub struct LiveClient {
    commands: mpsc::Sender<Command>,
    status: broadcast::Sender<StatusUpdate>,
    state: watch::Receiver<SessionState>,
}

impl LiveClient {
    /// Spawn the actor that owns `session`. Must be called within a Tokio runtime.
    pub fn spawn(session: LiveSession) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let status = session.status_sender();
        let state = session.watch_state();

        tokio::spawn(run_actor(session, commands_rx));

        Self {
            commands: commands_tx,
            status,
            state,
        }
    }

    /// Begin a session. Returns once the stream is connecting.
    pub async fn start(&self) -> SessionResult<()> {
        self.request(Command::Start).await?
    }

    /// Stop the running session (no-op when idle)
    pub async fn stop(&self) -> SessionResult<SessionStats> {
        self.request(Command::Stop).await
    }

    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`
    pub async fn wait_for_state(&self, target: SessionState) -> SessionResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::ClientGone)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SessionResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SessionError::ClientGone)?;
        rx.await.map_err(|_| SessionError::ClientGone)
    }
}

async fn run_actor(mut session: LiveSession, mut commands: mpsc::Receiver<Command>) {
    info!("Session actor started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Start(reply)) => {
                    let _ = reply.send(session.start().await);
                }
                Some(Command::Stop(reply)) => {
                    let _ = reply.send(session.stop().await);
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(SessionSnapshot {
                        state: session.state(),
                        status: session.last_status().to_string(),
                        stats: session.stats(),
                        transcript: session.transcript().clone(),
                    });
                }
                None => {
                    if session.is_running() {
                        warn!("All client handles dropped, stopping session");
                        session.stop().await;
                    }
                    break;
                }
            },
            Some(event) = session.next_event(), if session.is_running() => {
                session.dispatch(event).await;
            }
        }
    }

    info!("Session actor stopped");
}
