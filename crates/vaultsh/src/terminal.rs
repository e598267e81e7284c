//! Local terminal control.

use std::io;
use std::sync::Arc;

use crossterm::tty::IsTty;

/// Terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl TerminalSize {
    /// Create a new terminal size.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// The local terminal a session is attached to.
pub trait LocalTerminal: Send + Sync {
    /// Whether standard input is an interactive terminal.
    fn is_interactive(&self) -> bool;

    /// Switch to raw mode. Returns `false` if it was already on.
    fn enable_raw_mode(&self) -> io::Result<bool>;

    /// Leave raw mode.
    fn disable_raw_mode(&self) -> io::Result<()>;

    /// Current viewport size.
    fn size(&self) -> io::Result<TerminalSize>;
}

/// The terminal of the current process, driven through crossterm.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminal;

impl LocalTerminal for ProcessTerminal {
    fn is_interactive(&self) -> bool {
        io::stdin().is_tty()
    }

    fn enable_raw_mode(&self) -> io::Result<bool> {
        if crossterm::terminal::is_raw_mode_enabled()? {
            return Ok(false);
        }
        crossterm::terminal::enable_raw_mode()?;
        Ok(true)
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    fn size(&self) -> io::Result<TerminalSize> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(TerminalSize::new(cols, rows))
    }
}

/// Holds the terminal in raw mode and restores it on drop.
///
/// If raw mode was already on, or enabling it failed, dropping the guard
/// leaves the terminal alone.
pub struct RawModeGuard {
    terminal: Arc<dyn LocalTerminal>,
    restore: bool,
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("restore", &self.restore)
            .finish_non_exhaustive()
    }
}

impl RawModeGuard {
    /// Enable raw mode on `terminal`.
    ///
    /// Failure is returned alongside an inert guard so callers can log it
    /// and carry on.
    pub fn acquire(terminal: Arc<dyn LocalTerminal>) -> (Self, io::Result<()>) {
        match terminal.enable_raw_mode() {
            Ok(changed) => (
                Self {
                    terminal,
                    restore: changed,
                },
                Ok(()),
            ),
            Err(e) => (
                Self {
                    terminal,
                    restore: false,
                },
                Err(e),
            ),
        }
    }

    /// Whether dropping the guard will restore the terminal.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.restore
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if std::mem::take(&mut self.restore) {
            if let Err(e) = self.terminal.disable_raw_mode() {
                tracing::warn!(error = %e, "failed to restore terminal mode");
            }
        }
    }
}
