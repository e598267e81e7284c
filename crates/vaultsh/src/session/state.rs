//! Session lifecycle states.

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing attempted yet.
    #[default]
    Disconnected,
    /// Transport configured, dialing the remote host.
    Dialing,
    /// Logged in and a session channel is open.
    Authenticated,
    /// PTY granted. Non-interactive sessions skip this state.
    TerminalNegotiated,
    /// Remote shell started and streams attached.
    ShellRunning,
    /// Finished normally.
    Closed,
    /// Finished with an error.
    Failed,
}

impl SessionState {
    const fn rank(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Dialing => 1,
            Self::Authenticated => 2,
            Self::TerminalNegotiated => 3,
            Self::ShellRunning => 4,
            Self::Closed | Self::Failed => 5,
        }
    }

    /// Whether the session has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Whether moving to `next` goes strictly forward.
    ///
    /// Any live state may fail. Finished states never change.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(next, Self::Failed) || next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Dialing => "dialing",
            Self::Authenticated => "authenticated",
            Self::TerminalNegotiated => "terminal-negotiated",
            Self::ShellRunning => "shell-running",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current state plus every state visited.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: SessionState,
    history: Vec<SessionState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    /// Start in [`SessionState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SessionState::Disconnected,
            history: vec![SessionState::Disconnected],
        }
    }

    /// The current state.
    #[must_use]
    pub const fn current(&self) -> SessionState {
        self.current
    }

    /// Every state visited, oldest first.
    #[must_use]
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Move to `next`. Backward moves are ignored and reported as `false`.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.current.can_advance_to(next) {
            tracing::warn!(from = %self.current, to = %next, "ignoring backward session state change");
            return false;
        }
        tracing::debug!(from = %self.current, to = %next, "session state");
        self.current = next;
        self.history.push(next);
        true
    }

    /// Move to [`SessionState::Failed`] unless already finished.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.advance(SessionState::Failed);
        }
    }
}
