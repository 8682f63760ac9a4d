//! Run summary and the optional JSON report.

use crate::{BrowserType, Outcome, TestResult};
use anyhow::Result;
use serde::Serialize;
use std::{
    fmt::{Display, Formatter},
    fs::File,
    io::BufWriter,
    path::Path,
};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl Summary {
    pub fn of(results: &[TestResult]) -> Self {
        results
            .iter()
            .fold(Summary::default(), |mut summary, result| {
                match result.outcome {
                    Outcome::Passed => summary.passed += 1,
                    Outcome::Failed(_) => summary.failed += 1,
                    Outcome::Pending(_) => summary.pending += 1,
                }
                summary
            })
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed; {} failed; {} pending",
            self.passed, self.failed, self.pending
        )
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    summary: Summary,
    results: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    test: &'a str,
    browser: BrowserType,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<'a> From<&'a TestResult> for Entry<'a> {
    fn from(result: &'a TestResult) -> Self {
        let (outcome, message) = match &result.outcome {
            Outcome::Passed => ("passed", None),
            Outcome::Failed(err) => ("failed", Some(format!("{:#}", err))),
            Outcome::Pending(reason) => ("pending", Some(reason.clone())),
        };
        Entry {
            test: result.test_name,
            browser: result.browser_type,
            outcome,
            message,
        }
    }
}

fn report(results: &[TestResult]) -> Report<'_> {
    Report {
        summary: Summary::of(results),
        results: results.iter().map(Entry::from).collect(),
    }
}

pub fn write(path: &Path, results: &[TestResult]) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report(results))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn results() -> Vec<TestResult> {
        vec![
            TestResult {
                test_name: "functional_tests::can_start_a_list_for_one_user",
                browser_type: BrowserType::Chromium,
                outcome: Outcome::Passed,
            },
            TestResult {
                test_name: "functional_tests::can_start_a_list_and_retrieve_it_later",
                browser_type: BrowserType::Chromium,
                outcome: Outcome::Pending("Finish the test!".to_owned()),
            },
            TestResult {
                test_name: "functional_tests::multiple_users_can_start_lists_at_different_urls",
                browser_type: BrowserType::Webkit,
                outcome: Outcome::Failed(anyhow!("\"1: Buy milk\" not found").context("waiting")),
            },
        ]
    }

    #[test]
    fn summary_counts_each_outcome() {
        let summary = Summary::of(&results());
        assert_eq!(
            summary,
            Summary {
                passed: 1,
                failed: 1,
                pending: 1
            }
        );
        assert_eq!(summary.to_string(), "1 passed; 1 failed; 1 pending");
    }

    #[test]
    fn report_lists_every_run() {
        let results = results();
        let value = serde_json::to_value(report(&results)).unwrap();
        assert_eq!(
            value,
            json!({
                "passed": 1,
                "failed": 1,
                "pending": 1,
                "results": [
                    {
                        "test": "functional_tests::can_start_a_list_for_one_user",
                        "browser": "chromium",
                        "outcome": "passed"
                    },
                    {
                        "test": "functional_tests::can_start_a_list_and_retrieve_it_later",
                        "browser": "chromium",
                        "outcome": "pending",
                        "message": "Finish the test!"
                    },
                    {
                        "test": "functional_tests::multiple_users_can_start_lists_at_different_urls",
                        "browser": "webkit",
                        "outcome": "failed",
                        "message": "waiting: \"1: Buy milk\" not found"
                    }
                ]
            })
        );
    }
}
