//! Interactive shell sessions.
//!
//! [`SessionEngine`] dials the target, authenticates, negotiates a PTY when
//! the local input is a terminal, starts the remote shell and shuttles bytes
//! between local streams and the channel until the remote side closes.
//!
//! The channel, the transport and the local terminal mode are released on
//! every exit path, including cancellation and timeout.
//!
//! # Example
//!
//! ```ignore
//! use vaultsh::session::{SessionOptions, open_shell};
//!
//! let outcome = open_shell(&target, SessionOptions::default()).await?;
//! println!("remote exit status: {:?}", outcome.exit_status);
//! ```

mod cancel;
mod pty;
mod state;
mod transport;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use russh::client::Msg;
use russh::{ChannelMsg, ChannelReadHalf};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub use cancel::{CancelSignal, Canceller, cancellation};
pub use pty::{DEFAULT_TERM, LINE_SPEED, PtyRequest};
pub use state::{SessionState, StateTracker};

use crate::auth::AuthStrategy;
use crate::error::{AuthConfigError, Error, Result, SessionError, TransportError};
use crate::hostkey::{HostKeyVerifier, KnownHosts};
use crate::target::{ConnectionTarget, split_host_port};
use crate::terminal::{LocalTerminal, ProcessTerminal, RawModeGuard, TerminalSize};

/// Default limit for dialing and key exchange.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status reported when the remote shell died from a signal.
pub const SIGNAL_EXIT_STATUS: u32 = 255;

type Channel = russh::Channel<Msg>;

/// How a non-zero remote exit status is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatusPolicy {
    /// Log it and report success.
    #[default]
    Suppress,
    /// Return [`SessionError::RemoteExit`].
    Propagate,
}

impl std::str::FromStr for ExitStatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "suppress" => Ok(Self::Suppress),
            "propagate" => Ok(Self::Propagate),
            other => Err(format!("unknown exit status policy '{other}' (expected suppress or propagate)")),
        }
    }
}

impl std::fmt::Display for ExitStatusPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suppress => f.write_str("suppress"),
            Self::Propagate => f.write_str("propagate"),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Host key verifier consulted during the handshake.
    pub verifier: Arc<dyn HostKeyVerifier>,
    /// Non-zero exit status handling.
    pub exit_status: ExitStatusPolicy,
    /// Limit for dialing and key exchange.
    pub connect_timeout: Duration,
    /// Limit for the whole session after login. `None` waits forever.
    pub session_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verifier: Arc::new(KnownHosts::default()),
            exit_status: ExitStatusPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session_timeout: None,
        }
    }
}

impl SessionOptions {
    /// Set the host key verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn HostKeyVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Set the exit status policy.
    #[must_use]
    pub const fn with_exit_status(mut self, policy: ExitStatusPolicy) -> Self {
        self.exit_status = policy;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the session timeout.
    #[must_use]
    pub const fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout = timeout;
        self
    }
}

/// How a session ended.
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    /// Exit status reported by the remote shell, if any.
    pub exit_status: Option<u32>,
    /// Signal that killed the remote shell, if any.
    pub exit_signal: Option<String>,
    /// The PTY that was granted, if one was requested.
    pub pty: Option<PtyRequest>,
}

impl SessionOutcome {
    /// Effective status: the exit status, or [`SIGNAL_EXIT_STATUS`] after a signal.
    #[must_use]
    pub fn status(&self) -> Option<u32> {
        self.exit_status
            .or_else(|| self.exit_signal.as_ref().map(|_| SIGNAL_EXIT_STATUS))
    }

    /// Whether the remote shell finished unsuccessfully.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status().is_some_and(|status| status != 0)
    }
}

/// Local byte streams attached to the remote shell.
pub struct LocalStreams {
    /// Forwarded to the remote shell.
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    /// Receives remote standard output.
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    /// Receives remote standard error.
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl std::fmt::Debug for LocalStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStreams").finish_non_exhaustive()
    }
}

impl LocalStreams {
    /// Bind arbitrary streams.
    pub fn new(
        stdin: impl AsyncRead + Send + Unpin + 'static,
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Bind the process's standard streams.
    #[must_use]
    pub fn process() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

/// Drives one interactive session through its lifecycle.
pub struct SessionEngine {
    options: SessionOptions,
    terminal: Arc<dyn LocalTerminal>,
    state: StateTracker,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Create an engine attached to the process terminal.
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            terminal: Arc::new(ProcessTerminal),
            state: StateTracker::new(),
        }
    }

    /// Use a different local terminal.
    #[must_use]
    pub fn with_terminal(mut self, terminal: Arc<dyn LocalTerminal>) -> Self {
        self.terminal = terminal;
        self
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Every state visited so far.
    #[must_use]
    pub fn history(&self) -> &[SessionState] {
        self.state.history()
    }

    /// Run a session to completion.
    ///
    /// `strategies` are offered in order and must not be empty. The session
    /// ends when the remote shell finishes, when `cancel` fires or when the
    /// session timeout elapses.
    pub async fn run(
        &mut self,
        address: &str,
        user: &str,
        strategies: &[AuthStrategy],
        streams: LocalStreams,
        cancel: CancelSignal,
    ) -> Result<SessionOutcome> {
        let result = self.run_inner(address, user, strategies, streams, cancel).await;
        match &result {
            Ok(_) => {
                self.state.advance(SessionState::Closed);
            }
            Err(Error::Session(SessionError::RemoteExit { .. })) => {
                self.state.advance(SessionState::Closed);
            }
            Err(e) => {
                tracing::debug!(error = %e, state = %self.state.current(), "session failed");
                self.state.fail();
            }
        }
        result
    }

    async fn run_inner(
        &mut self,
        address: &str,
        user: &str,
        strategies: &[AuthStrategy],
        streams: LocalStreams,
        cancel: CancelSignal,
    ) -> Result<SessionOutcome> {
        if strategies.is_empty() {
            return Err(AuthConfigError::NoMethods.into());
        }
        let (host, port) = split_host_port(address).ok_or_else(|| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: "expected host:port".to_string(),
        })?;

        self.state.advance(SessionState::Dialing);
        let mut handle = transport::dial(
            address,
            host,
            port,
            Arc::clone(&self.options.verifier),
            self.options.connect_timeout,
        )
        .await?;

        let result = self
            .attach(&mut handle, address, user, strategies, streams, &cancel)
            .await;

        if let Err(e) = handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!(error = %e, "disconnect failed");
        }
        result
    }

    async fn attach(
        &mut self,
        handle: &mut transport::Handle,
        address: &str,
        user: &str,
        strategies: &[AuthStrategy],
        streams: LocalStreams,
        cancel: &CancelSignal,
    ) -> Result<SessionOutcome> {
        transport::authenticate(handle, address, user, strategies).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|source| TransportError::SessionOpen {
                address: address.to_string(),
                source,
            })?;
        self.state.advance(SessionState::Authenticated);

        let timeout = self.options.session_timeout;
        let expired = async {
            match timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            result = self.drive(channel, streams) => result?,
            () = cancel.cancelled() => {
                tracing::info!(address = %address, "session cancelled");
                return Err(SessionError::Cancelled.into());
            }
            () = expired => {
                let after = timeout.unwrap_or_default();
                tracing::warn!(address = %address, ?after, "session timed out");
                return Err(SessionError::TimedOut { after }.into());
            }
        };

        match outcome.status() {
            Some(status) if status != 0 => match self.options.exit_status {
                ExitStatusPolicy::Suppress => {
                    tracing::info!(address = %address, status, "remote shell exited with non-zero status");
                    Ok(outcome)
                }
                ExitStatusPolicy::Propagate => Err(SessionError::RemoteExit { status }.into()),
            },
            _ => Ok(outcome),
        }
    }

    async fn drive(&mut self, mut channel: Channel, streams: LocalStreams) -> Result<SessionOutcome> {
        let LocalStreams {
            stdin,
            mut stdout,
            mut stderr,
        } = streams;
        let mut pending = VecDeque::new();
        let mut outcome = SessionOutcome::default();

        let mut raw_mode = None;
        if self.terminal.is_interactive() {
            let (guard, result) = RawModeGuard::acquire(Arc::clone(&self.terminal));
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to set terminal to raw mode");
            }
            raw_mode = Some(guard);

            let size = self.terminal.size().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to get terminal size, using default 80x24");
                TerminalSize::default()
            });
            let request = PtyRequest::new(size);
            channel
                .request_pty(true, &request.term, request.cols(), request.rows(), 0, 0, &request.modes)
                .await
                .map_err(|e| SessionError::PtyRequest { reason: e.to_string() })?;
            await_reply(&mut channel, &mut pending)
                .await
                .map_err(|reason| SessionError::PtyRequest { reason })?;
            tracing::debug!(cols = size.cols, rows = size.rows, "PTY granted");
            outcome.pty = Some(request);
            self.state.advance(SessionState::TerminalNegotiated);
        } else {
            tracing::debug!("standard input is not a terminal, skipping PTY");
        }

        channel
            .request_shell(true)
            .await
            .map_err(|e| SessionError::ShellStart { reason: e.to_string() })?;
        await_reply(&mut channel, &mut pending)
            .await
            .map_err(|reason| SessionError::ShellStart { reason })?;
        self.state.advance(SessionState::ShellRunning);

        let (mut reader, writer) = channel.split();
        let pump = InputPump(tokio::spawn(pump_stdin(stdin, writer.make_writer())));

        let result = forward(&mut reader, pending, &mut *stdout, &mut *stderr, &mut outcome).await;

        drop(pump);
        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "channel close failed");
        }
        drop(raw_mode);
        result.map(|()| outcome)
    }
}

/// Stops the input task when the session loop ends or is dropped.
struct InputPump(tokio::task::JoinHandle<()>);

impl Drop for InputPump {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Wait for the reply to a `want_reply` request, queueing anything else.
async fn await_reply(
    channel: &mut Channel,
    pending: &mut VecDeque<ChannelMsg>,
) -> std::result::Result<(), String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err("request refused by server".to_string()),
            Some(ChannelMsg::Close) | None => {
                return Err("channel closed before the server replied".to_string());
            }
            Some(other) => pending.push_back(other),
        }
    }
}

/// Copy local input to the remote shell, then send EOF.
///
/// Runs on its own task so a stalled local writer never holds back input.
async fn pump_stdin<W>(mut stdin: Box<dyn AsyncRead + Send + Unpin>, mut remote: W)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    match tokio::io::copy(&mut stdin, &mut remote).await {
        Ok(bytes) => tracing::debug!(bytes, "local input finished"),
        Err(e) => tracing::debug!(error = %e, "stopped forwarding local input"),
    }
    if let Err(e) = remote.shutdown().await {
        tracing::debug!(error = %e, "failed to send EOF");
    }
}

/// Copy remote output to the local streams until the channel ends.
///
/// The channel ends normally with `Close`, or when its queue drains after the
/// remote has sent EOF or an exit report. Ending before either is a lost
/// connection.
async fn forward(
    reader: &mut ChannelReadHalf,
    mut pending: VecDeque<ChannelMsg>,
    stdout: &mut (dyn AsyncWrite + Send + Unpin),
    stderr: &mut (dyn AsyncWrite + Send + Unpin),
    outcome: &mut SessionOutcome,
) -> Result<()> {
    let mut remote_done = false;
    loop {
        let msg = match pending.pop_front() {
            Some(msg) => Some(msg),
            None => reader.wait().await,
        };

        match msg {
            Some(ChannelMsg::Data { data }) => write_local(stdout, &data, "failed to write to local stdout").await?,
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext != 1 {
                    tracing::debug!(ext, "extended data of unknown type written to stderr");
                }
                write_local(stderr, &data, "failed to write to local stderr").await?;
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                tracing::debug!(exit_status, "remote exit status");
                outcome.exit_status = Some(exit_status);
                remote_done = true;
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                let signal = format!("{signal_name:?}");
                tracing::debug!(signal = %signal, "remote shell killed by signal");
                outcome.exit_signal = Some(signal);
                remote_done = true;
            }
            Some(ChannelMsg::Eof) => {
                tracing::debug!("remote EOF");
                remote_done = true;
            }
            Some(ChannelMsg::Close) => return Ok(()),
            Some(_) => {}
            None if remote_done => return Ok(()),
            None => {
                return Err(SessionError::Disconnected {
                    reason: "connection lost before the remote shell finished".to_string(),
                }
                .into());
            }
        }
    }
}

async fn write_local(
    out: &mut (dyn AsyncWrite + Send + Unpin),
    data: &[u8],
    context: &str,
) -> Result<()> {
    let io = |source| SessionError::Io {
        context: context.to_string(),
        source,
    };
    out.write_all(data).await.map_err(io)?;
    out.flush().await.map_err(io)?;
    Ok(())
}

/// Resolve strategies for `target` and run a shell on the process terminal.
pub async fn open_shell(target: &ConnectionTarget, options: SessionOptions) -> Result<SessionOutcome> {
    let strategies = target.auth_strategies()?;
    SessionEngine::new(options)
        .run(
            target.address(),
            target.user(),
            &strategies,
            LocalStreams::process(),
            CancelSignal::never(),
        )
        .await
}
