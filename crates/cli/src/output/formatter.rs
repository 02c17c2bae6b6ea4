//! Formatter for command output
//!
//! In JSON mode every result is one pretty-printed document on stdout and
//! errors are `{"error": ..., "code": ...}` documents on stderr.

use osc_core::Error;
use serde::Serialize;

use super::OutputConfig;

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Print `value` as JSON, or its human form via `human`
    pub fn output<T: Serialize>(&self, value: &T, human: impl FnOnce(&T) -> String) {
        if self.config.quiet {
            return;
        }
        if self.config.json {
            self.json(value);
        } else {
            println!("{}", human(value));
        }
    }

    /// Human-only confirmation; JSON callers report through `output`
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            println!("\x1b[32m✓\x1b[0m {message}");
        } else {
            println!("✓ {message}");
        }
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, message: &str) {
        if self.config.json {
            eprintln!("{}", serde_json::json!({ "error": message }));
        } else if self.colors_enabled() {
            eprintln!("\x1b[31m✗\x1b[0m {message}");
        } else {
            eprintln!("✗ {message}");
        }
    }

    /// Print a library error with its S3 code when there is one
    pub fn failure(&self, context: &str, err: &Error) {
        if self.config.json {
            let mut doc = serde_json::json!({ "error": format!("{context}: {err}") });
            if let Some(code) = err.code() {
                doc["code"] = code.into();
            }
            eprintln!("{doc}");
        } else {
            self.error(&format!("{context}: {err}"));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            eprintln!("\x1b[33m⚠\x1b[0m {message}");
        } else {
            eprintln!("⚠ {message}");
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }
}
