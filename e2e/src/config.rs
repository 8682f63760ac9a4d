use crate::{wait::Poller, BrowserType};
use clap::{ArgAction, Parser};
use std::{path::PathBuf, time::Duration};

/// Command line of the functional test binary.
///
/// Mirrors the subset of the default test harness flags that `cargo test`
/// users reach for, plus settings for the browsers and the live server.
#[derive(Debug, Parser)]
#[command(name = "functional_tests", about = "Browser-driven functional tests for the to-do app")]
pub struct Config {
    /// Only run tests whose name contains this string
    pub filter: Option<String>,

    /// Run the browser tests (they need installed browsers and are skipped otherwise)
    #[arg(long)]
    pub ignored: bool,

    /// Same as --ignored
    #[arg(long)]
    pub include_ignored: bool,

    /// List tests and exit
    #[arg(long)]
    pub list: bool,

    /// Match the filter against whole test names only
    #[arg(long)]
    pub exact: bool,

    /// Skip tests whose name contains this string (repeatable)
    #[arg(long)]
    pub skip: Vec<String>,

    /// Accepted for compatibility, output is never captured
    #[arg(long, hide = true)]
    pub nocapture: bool,

    /// Accepted for compatibility, output is never captured
    #[arg(long, hide = true)]
    pub show_output: bool,

    /// Accepted for compatibility, tests always run one at a time
    #[arg(long, hide = true)]
    pub test_threads: Option<usize>,

    /// Accepted for compatibility, results are always printed one per line
    #[arg(long, hide = true)]
    pub format: Option<String>,

    /// Accepted for compatibility
    #[arg(short, long, hide = true)]
    pub quiet: bool,

    /// Accepted for compatibility
    #[arg(long, hide = true)]
    pub color: Option<String>,

    /// Test an already running server instead of starting one
    #[arg(long, env = "TODO_E2E_BASE_URL")]
    pub base_url: Option<String>,

    /// Browsers to run every test in
    #[arg(
        long,
        env = "TODO_E2E_BROWSERS",
        value_enum,
        value_delimiter = ',',
        default_values_t = [BrowserType::Chromium, BrowserType::Firefox, BrowserType::Webkit]
    )]
    pub browsers: Vec<BrowserType>,

    #[arg(long, env = "TODO_E2E_HEADLESS", default_value_t = true, action = ArgAction::Set)]
    pub headless: bool,

    /// Longest time to wait for the page to reach an expected state
    #[arg(long, env = "TODO_E2E_MAX_WAIT_MS", default_value_t = 10_000)]
    pub max_wait_ms: u64,

    /// Pause between two checks of the page state
    #[arg(long, env = "TODO_E2E_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Write a JSON report of the run to this file
    #[arg(long, env = "TODO_E2E_REPORT")]
    pub report: Option<PathBuf>,
}

impl Config {
    pub fn runs_browser_tests(&self) -> bool {
        self.ignored || self.include_ignored
    }

    pub fn selects(&self, test_name: &str) -> bool {
        let matches = |pattern: &str| {
            if self.exact {
                test_name == pattern
            } else {
                test_name.contains(pattern)
            }
        };
        self.filter.as_deref().map_or(true, matches)
            && !self.skip.iter().any(|skip| matches(skip))
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.max_wait_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}
