//! Upload and download progress bars

use indicatif::{ProgressBar, ProgressStyle};
use osc_core::ProgressObserver;

use super::OutputConfig;

const BAR_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({bytes_per_sec})";

/// Progress display fed by the upload coordinator or a download loop.
///
/// Hidden in quiet, JSON and `--no-progress` modes.
#[derive(Debug)]
pub struct TransferProgress {
    bar: Option<ProgressBar>,
}

impl TransferProgress {
    pub fn new(config: &OutputConfig) -> Self {
        let bar = config.progress_enabled().then(ProgressBar::hidden);
        Self { bar }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Switch to a bar of `total` bytes, or a spinner when the size is unknown
    pub fn start(&self, name: &str, total: Option<u64>) {
        let Some(bar) = &self.bar else {
            return;
        };
        let style = match total {
            Some(total) => {
                bar.set_length(total);
                ProgressStyle::with_template(BAR_TEMPLATE).map(|s| s.progress_chars("#>-"))
            }
            None => ProgressStyle::with_template(SPINNER_TEMPLATE),
        };
        if let Ok(style) = style {
            bar.set_style(style);
        }
        bar.set_message(name.to_string());
        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressObserver for TransferProgress {
    fn set_meta(&self, object_name: &str, total_length: Option<u64>) {
        self.start(object_name, total_length);
    }

    fn update(&self, bytes: u64) {
        self.inc(bytes);
    }
}
