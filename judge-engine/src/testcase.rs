use judge_protocol::common::TestCaseData;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// One test case with its 1-based position in the request.
#[derive(Debug, Clone, Copy)]
pub struct TestCase<'a> {
    pub ordinal: usize,
    pub stdin: &'a str,
    pub expected_stdout: &'a str,
}

#[derive(Debug, Clone)]
pub struct TestCasePaths {
    pub input: PathBuf,
    pub expected: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

pub fn enumerate(data: &[TestCaseData]) -> Vec<TestCase<'_>> {
    data.iter()
        .enumerate()
        .map(|(i, case)| TestCase {
            ordinal: i + 1,
            stdin: &case.stdin,
            expected_stdout: &case.expected_stdout,
        })
        .collect()
}

impl TestCasePaths {
    pub fn new(dir: &Path, ordinal: usize) -> Self {
        Self {
            input: dir.join(format!("{}.in", ordinal)),
            expected: dir.join(format!("{}.out", ordinal)),
            stdout: dir.join(format!("{}.stdout", ordinal)),
            stderr: dir.join(format!("{}.stderr", ordinal)),
        }
    }
}

/// Writes the input and expected output of every case into `dir`,
/// replacing whatever the directory held before.
pub fn materialize(dir: &Path, cases: &[TestCase<'_>]) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("failed to clear test case directory: {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create test case directory: {}", dir.display()))?;

    for case in cases {
        let paths = TestCasePaths::new(dir, case.ordinal);
        fs::write(&paths.input, case.stdin)
            .with_context(|| format!("failed to write {}", paths.input.display()))?;
        fs::write(&paths.expected, case.expected_stdout)
            .with_context(|| format!("failed to write {}", paths.expected.display()))?;
    }

    debug!(count = cases.len(), dir = %dir.display(), "test cases materialized");
    Ok(())
}
