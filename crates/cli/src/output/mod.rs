//! Human-readable and JSON output, plus transfer progress

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::TransferProgress;

/// Output settings from the global flags and the config defaults
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub no_color: bool,
    pub no_progress: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}

impl OutputConfig {
    /// Whether progress bars may be drawn
    pub fn progress_enabled(&self) -> bool {
        !(self.quiet || self.json || self.no_progress)
    }
}
