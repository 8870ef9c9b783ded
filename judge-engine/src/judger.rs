use crate::aggregate::aggregate;
use crate::compile::{compile, CompileOutcome};
use crate::exec::{run_case, RunLimits};
use crate::lang::{self, LanguageSpec};
use crate::testcase::{self, TestCasePaths};
use crate::workspace::Workspace;
use crate::Config;

use judge_protocol::common::{JudgeRequest, JudgeVerdict, Problem};
use judge_protocol::error::RequestError;

use std::fs;

use anyhow::{Context, Result};
use nix::unistd::{Gid, Uid};
use tracing::{debug, error, info};
use validator::Validate;

/// Judges one submission at a time on the calling thread.
pub struct Judger {
    config: Config,
}

impl Judger {
    pub fn new(config: Config) -> Result<Self> {
        Workspace::ensure_root(&config.executor.workspace_root)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks a request and resolves its language without touching the disk.
    pub fn prepare(request: &JudgeRequest) -> Result<&'static LanguageSpec, RequestError> {
        request.validate()?;
        lang::lookup(&request.language_id)
    }

    /// Runs the whole pipeline for a request.
    ///
    /// Bad requests are rejected with an error. Every accepted request yields
    /// a verdict, including failures of the engine itself.
    pub fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, RequestError> {
        let lang = Self::prepare(request)?;
        Ok(self.judge_with(lang, &request.source_code, &request.problem))
    }

    #[tracing::instrument(skip_all, fields(lang = lang.id, tests = problem.test_cases.len()))]
    pub fn judge_with(
        &self,
        lang: &LanguageSpec,
        source_code: &str,
        problem: &Problem,
    ) -> JudgeVerdict {
        match self.try_judge(lang, source_code, problem) {
            Ok(verdict) => {
                info!(status = %verdict.status, score = verdict.score, "judged");
                verdict
            }
            Err(err) => {
                error!(?err, "internal error");
                JudgeVerdict::internal_error(format!("{:#}", err))
            }
        }
    }

    fn try_judge(
        &self,
        lang: &LanguageSpec,
        source_code: &str,
        problem: &Problem,
    ) -> Result<JudgeVerdict> {
        let executor = &self.config.executor;
        let owner = match (executor.uid, executor.gid) {
            (Some(uid), Some(gid)) => Some((Uid::from_raw(uid), Gid::from_raw(gid))),
            _ => None,
        };

        // directory structure:
        //
        // - $workspace
        //      - $(source file)
        //      - $(build artifacts)
        //      - testcase
        //          - {n}.in
        //          - {n}.out
        //          - {n}.stdout
        //          - {n}.stderr
        let workspace = Workspace::create(&executor.workspace_root, owner)?;

        let src_path = workspace.path().join(lang.source_file_name);
        fs::write(&src_path, source_code)
            .with_context(|| format!("failed to write source: {}", src_path.display()))?;

        let cases = testcase::enumerate(&problem.test_cases);
        let testcase_dir = workspace.testcase_dir();
        testcase::materialize(&testcase_dir, &cases)?;

        if let CompileOutcome::Failed { log } = compile(&self.config, lang, workspace.path())? {
            return Ok(JudgeVerdict::compile_error(log));
        }

        let limits = RunLimits {
            time_limit_ms: problem.time_limit_ms(),
            memory_limit_kb: problem.memory_limit_kb(),
        };

        let mut outcomes = Vec::with_capacity(cases.len());
        for case in &cases {
            debug!(ordinal = case.ordinal, ?limits, "running test case");
            let paths = TestCasePaths::new(&testcase_dir, case.ordinal);
            let outcome = run_case(&self.config, lang, workspace.path(), case, &paths, limits)?;
            outcomes.push(outcome);
        }

        let summary = aggregate(&outcomes, problem.max_point);
        Ok(JudgeVerdict {
            status: summary.status.into(),
            total_cpu_time_ms: summary.total_cpu_time_ms,
            peak_memory_kb: summary.peak_memory_kb,
            score: summary.score,
            per_test_outcomes: outcomes,
            diagnostics: Default::default(),
        })
    }
}
