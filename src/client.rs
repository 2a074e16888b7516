//! Subprocess lifecycle and request/response exchange

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::pending::PendingRequests;
use crate::protocol::{ClientInfo, Request, RequestId, Response};
use crate::session::SessionState;
use crate::transport::LineTransport;
use serde_json::Value;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long shutdown waits for the last stderr lines to be logged.
const STDERR_GRACE: Duration = Duration::from_millis(200);

/// A running MCP server and the pipes to talk to it.
///
/// The subprocess is killed if the client is dropped without calling
/// [`Client::shutdown`].
pub struct Client {
    child: Child,
    transport: LineTransport<ChildStdout, ChildStdin>,
    pending: PendingRequests,
    next_id: RequestId,
    state: SessionState,
    response_timeout: Option<Duration>,
    shutdown_grace: Duration,
    stderr_task: JoinHandle<()>,
}

impl Client {
    /// Spawn the server with piped stdin, stdout and stderr.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        tracing::info!(server = %config.server_path.display(), "Starting MCP server");

        let mut child = Command::new(&config.server_path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClientError::Spawn {
                path: config.server_path.clone(),
                source,
            })?;

        tracing::debug!(pid = ?child.id(), "MCP server spawned");

        let stdin = child.stdin.take().ok_or(ClientError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(ClientError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ClientError::MissingPipe("stderr"))?;

        Ok(Self {
            child,
            transport: LineTransport::new(stdout, stdin),
            pending: PendingRequests::new(),
            next_id: RequestId::new(1),
            state: SessionState::Started,
            response_timeout: config.response_timeout,
            shutdown_grace: config.shutdown_grace,
            stderr_task: drain_stderr(stderr),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Hand out the next unused request id.
    pub fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        self.transport.send(request).await
    }

    pub async fn receive(&mut self) -> Result<Option<Response>> {
        self.transport.receive().await
    }

    /// Send a request under a fresh id and return that id.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<RequestId> {
        let id = self.allocate_id();
        self.send(&Request::new(id, method, params)).await?;
        Ok(id)
    }

    /// Read lines until the response to `id` arrives.
    ///
    /// Everything else is discarded. Returns `None` if the server closes
    /// its output first, and [`ClientError::Timeout`] once the configured
    /// deadline passes.
    pub async fn await_response(&mut self, id: RequestId) -> Result<Option<Response>> {
        let slot = self.pending.register(id);
        let timeout = self.response_timeout;

        let outcome = match timeout {
            Some(after) => tokio::time::timeout(after, self.read_until(id, slot))
                .await
                .unwrap_or(Err(ClientError::Timeout { id, after })),
            None => self.read_until(id, slot).await,
        };

        self.pending.cancel(id);
        outcome
    }

    async fn read_until(
        &mut self,
        id: RequestId,
        mut slot: oneshot::Receiver<Response>,
    ) -> Result<Option<Response>> {
        loop {
            let Some(message) = self.transport.receive().await? else {
                tracing::warn!(%id, "Server closed its output before responding");
                return Ok(None);
            };

            let message_id = message.id.clone();
            let method = message.method.clone();
            if !self.pending.complete(message) {
                tracing::debug!(?message_id, ?method, "Discarding unrelated message");
                continue;
            }

            if let Ok(response) = slot.try_recv() {
                tracing::debug!(%id, "Received response");
                return Ok(Some(response));
            }
        }
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&mut self, client_info: &ClientInfo) -> Result<Option<Response>> {
        let id = self.allocate_id();
        self.send(&Request::initialize(id, client_info)).await?;
        let response = self.await_response(id).await?;
        self.state = SessionState::Initialized;
        Ok(response)
    }

    /// Invoke a tool through `tools/call`.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Option<Response>> {
        let id = self.allocate_id();
        self.send(&Request::call_tool(id, name, arguments)).await?;
        let response = self.await_response(id).await?;
        self.state = SessionState::ToolInvoked;
        Ok(response)
    }

    /// Signal the server to terminate and wait until it has exited.
    ///
    /// On Unix the server gets SIGTERM and `shutdown_grace` to exit before
    /// it is killed.
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        tracing::debug!(pid = ?self.child.id(), state = ?self.state, "Terminating MCP server");

        #[cfg(unix)]
        if let Some(status) = self.terminate().await? {
            return Ok(self.finish(status).await);
        }

        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Kill signal not delivered: {}", e);
        }
        let status = self.child.wait().await.map_err(ClientError::Shutdown)?;
        Ok(self.finish(status).await)
    }

    /// Send SIGTERM and wait out the grace period. `None` means the server
    /// is still running, or could not be signalled.
    #[cfg(unix)]
    async fn terminate(&mut self) -> Result<Option<ExitStatus>> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(None);
        };
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!(pid, error = ?e, "SIGTERM failed");
            return Ok(None);
        }

        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(status)) => Ok(Some(status)),
            Ok(Err(e)) => Err(ClientError::Shutdown(e)),
            Err(_) => {
                tracing::warn!(pid, grace = ?self.shutdown_grace, "Server ignored SIGTERM, killing");
                Ok(None)
            }
        }
    }

    async fn finish(mut self, status: ExitStatus) -> ExitStatus {
        tracing::info!(%status, "MCP server exited");

        if tokio::time::timeout(STDERR_GRACE, &mut self.stderr_task)
            .await
            .is_err()
        {
            self.stderr_task.abort();
        }
        status
    }
}

/// Forward the server's stderr to the log so the pipe never fills up.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    tracing::debug!(target: "server_stderr", "{}", line.trim_end());
                }
                Err(e) => {
                    tracing::debug!("Error reading server stderr: {}", e);
                    break;
                }
            }
        }
    })
}
