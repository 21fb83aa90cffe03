//! Raw-mode terminal setup and its guaranteed teardown.

use std::io;

use crossterm::{
    cursor::Show,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};

type Step = fn() -> io::Result<()>;

/// Restores the terminal when dropped, unless [`restore`](Self::restore)
/// already ran.
///
/// The guard exists before setup starts, so a setup step that fails
/// halfway still leaves raw mode.
pub struct TerminalGuard {
    leave: Option<Step>,
}

impl TerminalGuard {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from crossterm; the terminal has already been
    /// restored by then.
    pub fn enter() -> io::Result<Self> {
        Self::enter_with(enter_terminal, leave_terminal)
    }

    fn enter_with(enter: Step, leave: Step) -> io::Result<Self> {
        let guard = Self { leave: Some(leave) };
        enter()?;
        Ok(guard)
    }

    /// Restore the terminal now, reporting any error.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from crossterm.
    pub fn restore(&mut self) -> io::Result<()> {
        self.leave.take().map_or(Ok(()), |leave| leave())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(err = %e, "failed to restore terminal");
        }
    }
}

fn enter_terminal() -> io::Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)
}

fn leave_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}
