//! Pseudo-terminal requests.

use russh::Pty;

use crate::terminal::TerminalSize;

/// Terminal type requested for the remote PTY.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Terminal line speed, in baud, for both directions.
pub const LINE_SPEED: u32 = 14_400;

/// A PTY request as sent to the remote host.
#[derive(Debug, Clone)]
pub struct PtyRequest {
    /// Terminal type.
    pub term: String,
    /// Viewport size.
    pub size: TerminalSize,
    /// Terminal modes.
    pub modes: Vec<(Pty, u32)>,
}

impl PtyRequest {
    /// Request an `xterm-256color` terminal of `size` with echo on.
    #[must_use]
    pub fn new(size: TerminalSize) -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            size,
            modes: vec![
                (Pty::ECHO, 1),
                (Pty::TTY_OP_ISPEED, LINE_SPEED),
                (Pty::TTY_OP_OSPEED, LINE_SPEED),
            ],
        }
    }

    /// Columns, as the protocol wants them.
    #[must_use]
    pub fn cols(&self) -> u32 {
        u32::from(self.size.cols)
    }

    /// Rows, as the protocol wants them.
    #[must_use]
    pub fn rows(&self) -> u32 {
        u32::from(self.size.rows)
    }
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self::new(TerminalSize::default())
    }
}
