pub mod config;
pub mod live_server;
pub mod report;
pub mod session;
pub mod wait;

pub use config::Config;
pub use session::{by_id, keys, Session};
pub use wait::{Poller, WaitTimeout};

use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use futures::{stream, FutureExt, StreamExt};
use live_server::LiveServer;
use playwright::{api::Browser, Playwright};
use serde::Serialize;
use session::Sessions;
use std::{
    any::{type_name, Any},
    error::Error,
    fmt::{Debug, Display, Formatter},
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
};
use todo_common::{check_sequential, LIST_TABLE_ID};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Entry point of a `harness = false` test target: runs every selected test
/// in every configured browser against a live server, then exits.
pub fn e2e_test_runner(tests: &[&dyn Testable]) {
    init_logging();
    let config = Config::parse();

    let tests: Vec<&dyn Testable> = tests
        .iter()
        .copied()
        .filter(|test| config.selects(test.name()))
        .collect();

    if config.list {
        for test in &tests {
            println!("{}: test", test.name());
        }
        return;
    }

    if !config.runs_browser_tests() {
        for test in &tests {
            println!("{} ... ignored, needs a browser", test.name());
        }
        println!("\n{} tests ignored, run with --include-ignored", tests.len());
        return;
    }

    let exit_code = match Runtime::new() {
        Ok(runtime) => match runtime.block_on(run_tests(&config, &tests)) {
            Ok(test_results) => {
                println!("\nSummary:");

                for test_result in &test_results {
                    println!("{}", test_result);
                }

                let summary = report::Summary::of(&test_results);
                println!("{}", summary);

                if let Some(path) = &config.report {
                    if let Err(err) = report::write(path, &test_results) {
                        warn!(path = %path.display(), error = %err, "could not write report");
                    }
                }

                if summary.failed == 0 {
                    0
                } else {
                    1
                }
            }
            Err(error) => {
                println!("{:#?}", error);
                1
            }
        },
        Err(error) => {
            println!("Failed to start the async runtime: {}", error);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,todo_e2e=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_tests(config: &Config, tests: &[&dyn Testable]) -> Result<Vec<TestResult>> {
    let poller = config.poller();

    let (live_server, base_url) = match &config.base_url {
        Some(url) => (None, url.trim_end_matches('/').to_owned()),
        None => {
            let server = LiveServer::start(&poller).await?;
            let url = server.url().to_owned();
            (Some(server), url)
        }
    };

    let results = run_in_browsers(config, tests, &base_url, poller).await;

    if let Some(server) = live_server {
        if let Err(err) = server.stop().await {
            warn!(error = %err, "live server did not stop cleanly");
        }
    }

    results
}

async fn run_in_browsers(
    config: &Config,
    tests: &[&dyn Testable],
    base_url: &str,
    poller: Poller,
) -> Result<Vec<TestResult>> {
    let playwright = Playwright::initialize().await?;
    playwright.prepare()?; // Install browsers

    let mut browsers = Vec::new();
    let mut initialization_errors: Option<ErrorList<FailedToInitialize>> = None;
    for &browser_type in &config.browsers {
        let engine = match browser_type {
            BrowserType::Chromium => playwright.chromium(),
            BrowserType::Firefox => playwright.firefox(),
            BrowserType::Webkit => playwright.webkit(),
        };
        match engine.launcher().headless(config.headless).launch().await {
            Ok(browser) => {
                info!(browser = %browser_type, "browser launched");
                browsers.push((browser_type, Arc::new(browser)));
            }
            Err(err) => ErrorList::record(
                &mut initialization_errors,
                FailedToInitialize(browser_type),
                err,
            ),
        }
    }

    if let Some(errors) = initialization_errors {
        close_browsers(&browsers).await;
        return Err(errors.into());
    }

    let (results, error_list) = stream::iter(tests)
        .flat_map(|test| {
            stream::iter(browsers.iter()).map(move |(browser_type, browser)| async move {
                let browser_type = *browser_type;
                let test_name = test.name();
                let sessions = Sessions::new(Arc::clone(browser));
                let session = sessions.open().await.map_err(|err| {
                    (
                        FailedToOpenPage {
                            browser_type,
                            test_name,
                        },
                        err,
                    )
                })?;

                let ctx = Context {
                    session,
                    sessions: sessions.clone(),
                    live_server_url: base_url.to_owned(),
                    poller,
                };
                let result = test.run(ctx).await;
                sessions.close_all().await;

                let test_result = TestResult {
                    test_name,
                    browser_type,
                    outcome: result.into(),
                };
                println!("{}", test_result);
                Ok::<_, (FailedToOpenPage, anyhow::Error)>(test_result)
            })
        })
        .fold(
            (Vec::new(), None),
            |(mut test_results, errors), result| async {
                match (result.await, errors) {
                    (Ok(test_result), errors) => {
                        test_results.push(test_result);
                        (test_results, errors)
                    }
                    (Err((context, err)), mut errors) => {
                        ErrorList::record(&mut errors, context, err);
                        (test_results, errors)
                    }
                }
            },
        )
        .await;

    close_browsers(&browsers).await;

    if let Some(error_list) = error_list {
        return Err(error_list.into());
    }

    Ok(results)
}

async fn close_browsers(browsers: &[(BrowserType, Arc<Browser>)]) {
    for (browser_type, browser) in browsers {
        if let Err(err) = browser.close().await {
            warn!(browser = %browser_type, error = %err, "browser did not close cleanly");
        }
    }
}

pub struct TestResult {
    pub test_name: &'static str,
    pub browser_type: BrowserType,
    pub outcome: Outcome,
}

impl Display for TestResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Outcome::Passed => write!(f, "{} in {}...\t[OK]", self.test_name, self.browser_type),
            Outcome::Pending(reason) => write!(
                f,
                "{} in {}...\t[PENDING] {}",
                self.test_name, self.browser_type, reason
            ),
            Outcome::Failed(err) => write!(
                f,
                "{} in {}...\t[FAILED]\n{:#?}",
                self.test_name, self.browser_type, err
            ),
        }
    }
}

pub enum Outcome {
    Passed,
    Failed(anyhow::Error),
    /// The test stopped at a step nobody has written yet.
    Pending(String),
}

impl From<Result<()>> for Outcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(err) => match err.downcast::<Pending>() {
                Ok(Pending(reason)) => Outcome::Pending(reason),
                Err(err) => Outcome::Failed(err),
            },
        }
    }
}

/// Marks the rest of a test as not written yet. See [`pending!`].
#[derive(Debug, thiserror::Error)]
#[error("pending: {0}")]
pub struct Pending(pub String);

/// Ends the current test as pending rather than failed.
///
/// ```ignore
/// pending!("Finish the test!");
/// ```
#[macro_export]
macro_rules! pending {
    ($($arg:tt)*) => {
        return ::core::result::Result::Err($crate::Pending(::std::format!($($arg)*)).into())
    };
}

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Chromium,
    Firefox,
    Webkit,
}

impl Display for BrowserType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BrowserType::Chromium => "Chromium",
                BrowserType::Firefox => "Firefox",
                BrowserType::Webkit => "Webkit",
            }
        )
    }
}

/// What a test gets to work with: its browser session, the server under
/// test and the run's poller.
pub struct Context {
    pub session: Session,
    sessions: Sessions,
    live_server_url: String,
    poller: Poller,
}

impl Context {
    /// Base URL of the server under test, without a trailing slash.
    pub fn live_server_url(&self) -> &str {
        &self.live_server_url
    }

    /// Closes the current session and continues in a fresh one that shares
    /// no cookies or storage with it, as a different user would.
    pub async fn new_session(&mut self) -> Result<()> {
        self.session.close().await?;
        self.session = self.sessions.open().await?;
        Ok(())
    }

    /// Polls `check` with the run's poller. See [`Poller::until`].
    pub async fn wait_for<T, F, Fut>(&self, check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.poller.until(check).await
    }

    /// Waits until the list table has a row reading exactly `row_text` and
    /// all its rows are numbered from 1 without gaps.
    pub async fn wait_for_row_in_list_table(&self, row_text: &str) -> Result<()> {
        let session = &self.session;
        let selector = format!("{} tr", by_id(LIST_TABLE_ID));
        let selector = selector.as_str();

        self.wait_for(move || async move {
            let rows = session.texts(selector).await?;
            check_rows(&rows, row_text)
        })
        .await
    }
}

/// Succeeds when `rows` contains `row_text` exactly and is numbered from 1
/// without gaps.
fn check_rows(rows: &[String], row_text: &str) -> Result<()> {
    ensure!(
        rows.iter().any(|row| row == row_text),
        "{:?} not found in list table rows {:?}",
        row_text,
        rows
    );
    if let Err((position, row)) = check_sequential(rows) {
        bail!("list table row {} is out of sequence: {:?}", position + 1, row);
    }
    Ok(())
}

#[async_trait]
pub trait Testable {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: Context) -> Result<()>;
}

#[async_trait]
impl<F, FF> Testable for F
where
    F: Fn(Context) -> FF + Sync,
    FF: Send,
    AssertUnwindSafe<FF>: Future<Output = Result<()>>,
{
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    async fn run(&self, ctx: Context) -> Result<()> {
        let result = AssertUnwindSafe(self(ctx)).catch_unwind().await;
        match result {
            Ok(future) => future,
            Err(err) => Err(CaughtPanic::new(err).into()),
        }
    }
}

struct ErrorList<C> {
    vec: Vec<(C, anyhow::Error)>,
}

impl<C> ErrorList<C> {
    fn new<E: Into<anyhow::Error>>(context: C, error: E) -> Self {
        ErrorList {
            vec: vec![(context, error.into())],
        }
    }

    fn push<E: Into<anyhow::Error>>(&mut self, context: C, error: E) {
        self.vec.push((context, error.into()));
    }

    /// Adds to the list in `slot`, starting one if there is none yet.
    fn record<E: Into<anyhow::Error>>(slot: &mut Option<Self>, context: C, error: E) {
        match slot {
            Some(errors) => errors.push(context, error),
            None => *slot = Some(ErrorList::new(context, error)),
        }
    }
}

impl<C: Display> Debug for ErrorList<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ErrorList:")?;
        for (context, error) in &self.vec {
            writeln!(f, "\t- {}: {:#?}", context, error)?;
        }
        Ok(())
    }
}

impl<C: Display> Display for ErrorList<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ErrorList:")?;
        for (context, error) in &self.vec {
            writeln!(f, "\t- {}: {}", context, error)?;
        }
        Ok(())
    }
}

impl<C: Display> Error for ErrorList<C> {}

struct FailedToInitialize(BrowserType);

impl Display for FailedToInitialize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to initialize {}", self.0)
    }
}

struct FailedToOpenPage {
    test_name: &'static str,
    browser_type: BrowserType,
}

impl Display for FailedToOpenPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to open page in {} of {}",
            self.browser_type, self.test_name
        )
    }
}

struct CaughtPanic(Option<Box<str>>);

impl CaughtPanic {
    fn new(err: Box<dyn Any + Send + 'static>) -> Self {
        match err.downcast::<String>() {
            Ok(str) => CaughtPanic(Some(str.into_boxed_str())),
            Err(err) => match err.downcast::<&str>() {
                Ok(str) => CaughtPanic(Some(str.to_string().into_boxed_str())),
                Err(_) => CaughtPanic(None),
            },
        }
    }
}

impl Debug for CaughtPanic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for CaughtPanic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(str_err) => write!(f, "{}", str_err),
            None => write!(f, "Unknown error"),
        }
    }
}

impl Error for CaughtPanic {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn unfinished() -> Result<()> {
        pending!("Finish the test! ({} steps left)", 3)
    }

    #[test]
    fn pending_is_not_a_failure() {
        match Outcome::from(unfinished()) {
            Outcome::Pending(reason) => assert_eq!(reason, "Finish the test! (3 steps left)"),
            _ => panic!("expected a pending outcome"),
        }
    }

    #[test]
    fn errors_are_failures() {
        assert!(matches!(Outcome::from(Ok(())), Outcome::Passed));
        match Outcome::from(Err(anyhow!("\"1: Buy milk\" not found"))) {
            Outcome::Failed(err) => assert_eq!(err.to_string(), "\"1: Buy milk\" not found"),
            _ => panic!("expected a failed outcome"),
        }
    }

    #[test]
    fn result_lines() {
        let passed = TestResult {
            test_name: "functional_tests::can_start_a_list_for_one_user",
            browser_type: BrowserType::Firefox,
            outcome: Outcome::Passed,
        };
        assert_eq!(
            passed.to_string(),
            "functional_tests::can_start_a_list_for_one_user in Firefox...\t[OK]"
        );

        let pending = TestResult {
            outcome: Outcome::Pending("Finish the test!".to_owned()),
            ..passed
        };
        assert!(pending.to_string().ends_with("[PENDING] Finish the test!"));
    }

    fn rows(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[test]
    fn row_check_accepts_exact_row() {
        assert!(check_rows(&rows(&["1: Buy milk"]), "1: Buy milk").is_ok());
        assert!(check_rows(
            &rows(&["1: Buy new swingline stapler", "2: Burn down office"]),
            "2: Burn down office"
        )
        .is_ok());
    }

    #[test]
    fn row_check_rejects_missing_row() {
        let err = check_rows(&rows(&["1: Buy peacock feathers"]), "1: Buy milk").unwrap_err();
        assert!(err.to_string().contains("\"1: Buy milk\" not found"));

        // Near misses do not count
        assert!(check_rows(&rows(&["1: Buy milk now"]), "1: Buy milk").is_err());
        assert!(check_rows(&rows(&["2: Buy milk"]), "1: Buy milk").is_err());
    }

    #[test]
    fn row_check_rejects_empty_table() {
        assert!(check_rows(&[], "1: Buy milk").is_err());
    }

    #[test]
    fn row_check_rejects_gap_in_numbering() {
        let err = check_rows(&rows(&["1: Buy milk", "3: Buy eggs"]), "1: Buy milk").unwrap_err();
        assert_eq!(
            err.to_string(),
            "list table row 2 is out of sequence: \"3: Buy eggs\""
        );
    }

    fn assert_clone<T: Clone>() {}
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn sessions_can_be_shared_with_tests() {
        assert_clone::<Session>();
        assert_clone::<Sessions>();
        assert_send_sync::<Context>();
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("assertion failed"));
        assert_eq!(CaughtPanic::new(owned).to_string(), "assertion failed");

        let borrowed: Box<dyn Any + Send> = Box::new("explicit panic");
        assert_eq!(CaughtPanic::new(borrowed).to_string(), "explicit panic");

        let other: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(CaughtPanic::new(other).to_string(), "Unknown error");
    }

    #[test]
    fn error_list_collects_every_context() {
        let mut errors = None;
        ErrorList::record(
            &mut errors,
            FailedToInitialize(BrowserType::Webkit),
            anyhow!("missing libs"),
        );
        ErrorList::record(
            &mut errors,
            FailedToInitialize(BrowserType::Firefox),
            anyhow!("timeout"),
        );

        let errors = errors.unwrap();
        assert_eq!(
            errors.to_string(),
            "ErrorList:\n\t- Failed to initialize Webkit: missing libs\n\t- Failed to initialize Firefox: timeout\n"
        );
    }
}
