use crate::checker;
use crate::lang::LanguageSpec;
use crate::testcase::{TestCase, TestCasePaths};
use crate::Config;

use judge_protocol::common::{CaseStatus, ExecutionOutcome};
use judge_sandbox::{LimitBreach, SandboxArgs, SandboxOutput};
use judge_utils::os_cmd::OsCmd;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use tracing::debug;

/// RLIMIT_AS is set to this multiple of the memory ceiling. A program that
/// outgrows the ceiling gradually is still running when it crosses it, and the
/// measured peak reports the breach.
const ADDRESS_SPACE_HEADROOM: u64 = 2;

/// A crash under RLIMIT_AS with a peak this close to the ceiling is taken as a
/// failed allocation.
const NEAR_CEILING: f64 = 0.9;

pub struct Limit {
    pub cpu_time: u64, // milliseconds
    pub memory: u64,   // bytes
    pub address_space: bool,
}

impl Limit {
    /// Whether the ceiling is enforced as an address space limit for this run.
    pub fn limits_address_space(&self, config: &Config) -> bool {
        let executor = &config.executor;
        executor.cgroup_root.is_none() && executor.limit_address_space && self.address_space
    }
}

/// Per-request limits for the judged program.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub time_limit_ms: u64,
    pub memory_limit_kb: u64,
}

/// What the sandbox result means before any output is looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunClass {
    /// Exited normally within its limits; the output decides.
    Completed,
    Exceeded(CaseStatus),
    Crashed,
}

pub fn sandbox_exec(
    config: &Config,
    workdir: &Path,
    cmd: OsCmd,
    stdio: [&Path; 3],
    limit: &Limit,
) -> Result<SandboxOutput> {
    let executor = &config.executor;
    let [stdin, stdout, stderr] = stdio;

    let mut args = SandboxArgs::new(cmd, workdir);
    args.stdio(stdin, stdout, stderr);

    args.uid = executor.uid;
    args.gid = executor.gid;

    args.real_time_limit = Some(executor.wall_time_limit(limit.cpu_time));
    args.cpu_time_limit = Some(limit.cpu_time);

    args.rlimit_stack = Some(limit.memory);
    args.rlimit_fsize = Some(executor.output_limit.as_u64());

    if let Some(ref root) = executor.cgroup_root {
        args.cgroup_root = Some(root.clone());
        args.cg_limit_memory = Some(limit.memory);
        args.cg_limit_max_pids = Some(executor.max_pids);
    }
    if limit.limits_address_space(config) {
        args.rlimit_as = Some(limit.memory.saturating_mul(ADDRESS_SPACE_HEADROOM));
    }
    args.memory_limit = Some(limit.memory / 1024);

    judge_sandbox::run(&args)
}

/// Decides what a finished run means from its limit evidence.
///
/// `address_space` tells whether the run was under RLIMIT_AS, where an
/// oversized allocation fails inside the program instead of getting it killed.
pub fn classify(output: &SandboxOutput, memory_limit_kb: u64, address_space: bool) -> RunClass {
    match output.breach {
        Some(LimitBreach::Memory) => {
            return RunClass::Exceeded(CaseStatus::MemoryLimitExceeded);
        }
        Some(LimitBreach::CpuTime | LimitBreach::WallTime) => {
            return RunClass::Exceeded(CaseStatus::TimeLimitExceeded);
        }
        None => {}
    }

    if output.termination.is_success() {
        return RunClass::Completed;
    }

    // a bare SIGKILL is the same signal for both ceilings
    if output.termination.signal() == Some(Signal::SIGKILL) {
        return if output.memory >= memory_limit_kb {
            RunClass::Exceeded(CaseStatus::MemoryLimitExceeded)
        } else {
            RunClass::Exceeded(CaseStatus::TimeLimitExceeded)
        };
    }

    if address_space && output.memory as f64 >= memory_limit_kb as f64 * NEAR_CEILING {
        return RunClass::Exceeded(CaseStatus::MemoryLimitExceeded);
    }

    RunClass::Crashed
}

/// Reads at most `limit` bytes from the start of a file.
pub fn read_head(path: &Path, limit: u64) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut buf = Vec::new();
    file.take(limit)
        .read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn run_case(
    config: &Config,
    lang: &LanguageSpec,
    workdir: &Path,
    case: &TestCase<'_>,
    paths: &TestCasePaths,
    limits: RunLimits,
) -> Result<ExecutionOutcome> {
    let cmd = lang.run_cmd()?;
    let limit = Limit {
        cpu_time: limits.time_limit_ms,
        memory: limits.memory_limit_kb.saturating_mul(1024),
        address_space: lang.limit_address_space,
    };
    let address_space = limit.limits_address_space(config);

    let output = sandbox_exec(
        config,
        workdir,
        cmd,
        [
            paths.input.as_path(),
            paths.stdout.as_path(),
            paths.stderr.as_path(),
        ],
        &limit,
    )
    .with_context(|| format!("failed to run test case {}", case.ordinal))?;

    let status = match classify(&output, limits.memory_limit_kb, address_space) {
        RunClass::Completed => {
            if checker::compare_files(&paths.stdout, &paths.expected)? {
                CaseStatus::Accepted
            } else {
                CaseStatus::WrongAnswer
            }
        }
        RunClass::Exceeded(status) => status,
        RunClass::Crashed => CaseStatus::RuntimeError,
    };

    let stderr_excerpt = if status == CaseStatus::RuntimeError {
        let excerpt = read_head(&paths.stderr, config.executor.stderr_excerpt.as_u64())?;
        let excerpt = excerpt.trim();
        Some(if excerpt.is_empty() {
            output.termination.to_string()
        } else {
            excerpt.to_owned()
        })
    } else {
        None
    };

    debug!(
        ordinal = case.ordinal,
        %status,
        cpu_time = output.cpu_time,
        memory = output.memory,
        "test case finished"
    );

    Ok(ExecutionOutcome {
        ordinal: case.ordinal,
        status,
        cpu_time_ms: output.cpu_time,
        memory_kb: output.memory,
        stderr_excerpt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use judge_sandbox::Termination;

    fn output(
        termination: Termination,
        breach: Option<LimitBreach>,
        memory: u64,
    ) -> SandboxOutput {
        SandboxOutput {
            termination,
            breach,
            real_time: 0,
            sys_time: 0,
            user_time: 0,
            cpu_time: 0,
            memory,
        }
    }

    const LIMIT_KB: u64 = 64 * 1024;
    const SIGKILL: i32 = Signal::SIGKILL as i32;
    const SIGXCPU: i32 = Signal::SIGXCPU as i32;
    const SIGSEGV: i32 = Signal::SIGSEGV as i32;

    const TLE: RunClass = RunClass::Exceeded(CaseStatus::TimeLimitExceeded);
    const MLE: RunClass = RunClass::Exceeded(CaseStatus::MemoryLimitExceeded);

    #[test]
    fn completed() {
        let out = output(Termination::Exited(0), None, 1024);
        assert_eq!(classify(&out, LIMIT_KB, false), RunClass::Completed);
    }

    #[test]
    fn direct_breaches() {
        let wall = Some(LimitBreach::WallTime);
        let out = output(Termination::Signaled(SIGKILL), wall, LIMIT_KB * 2);
        assert_eq!(classify(&out, LIMIT_KB, false), TLE);

        let cpu = Some(LimitBreach::CpuTime);
        let out = output(Termination::Signaled(SIGXCPU), cpu, 0);
        assert_eq!(classify(&out, LIMIT_KB, false), TLE);

        // finished successfully, but too slowly
        let out = output(Termination::Exited(0), cpu, 0);
        assert_eq!(classify(&out, LIMIT_KB, false), TLE);

        let oom = Some(LimitBreach::Memory);
        let out = output(Termination::Signaled(SIGKILL), oom, 10);
        assert_eq!(classify(&out, LIMIT_KB, false), MLE);
    }

    #[test]
    fn killed_without_breach() {
        let out = output(Termination::Signaled(SIGKILL), None, LIMIT_KB);
        assert_eq!(classify(&out, LIMIT_KB, false), MLE);

        let out = output(Termination::Signaled(SIGKILL), None, LIMIT_KB - 1);
        assert_eq!(classify(&out, LIMIT_KB, false), TLE);

        // 300000 KB measured against a 256000 KB ceiling
        let out = output(Termination::Signaled(SIGKILL), None, 300_000);
        assert_eq!(classify(&out, 256_000, false), MLE);
    }

    #[test]
    fn crashed() {
        let out = output(Termination::Exited(1), None, 1024);
        assert_eq!(classify(&out, LIMIT_KB, false), RunClass::Crashed);

        let out = output(Termination::Signaled(SIGSEGV), None, LIMIT_KB * 2);
        assert_eq!(classify(&out, LIMIT_KB, false), RunClass::Crashed);
    }

    #[test]
    fn failed_allocation() {
        // MemoryError or bad_alloc near the ceiling
        let out = output(Termination::Exited(1), None, LIMIT_KB - 1024);
        assert_eq!(classify(&out, LIMIT_KB, true), MLE);
        assert_eq!(classify(&out, LIMIT_KB, false), RunClass::Crashed);

        let sigabrt = Signal::SIGABRT as i32;
        let out = output(Termination::Signaled(sigabrt), None, LIMIT_KB * 95 / 100);
        assert_eq!(classify(&out, LIMIT_KB, true), MLE);

        // an ordinary crash far below the ceiling
        let out = output(Termination::Signaled(SIGSEGV), None, LIMIT_KB / 2);
        assert_eq!(classify(&out, LIMIT_KB, true), RunClass::Crashed);

        let out = output(Termination::Exited(0), None, LIMIT_KB - 1);
        assert_eq!(classify(&out, LIMIT_KB, true), RunClass::Completed);
    }

    #[test]
    fn address_space_only_without_cgroup() {
        let limit = Limit {
            cpu_time: 1000,
            memory: 64 << 20,
            address_space: true,
        };
        let mut config = Config::default();
        assert!(limit.limits_address_space(&config));

        config.executor.cgroup_root = Some("/sys/fs/cgroup/judge".into());
        assert!(!limit.limits_address_space(&config));

        config.executor.cgroup_root = None;
        config.executor.limit_address_space = false;
        assert!(!limit.limits_address_space(&config));

        let managed = Limit {
            address_space: false,
            ..limit
        };
        assert!(!managed.limits_address_space(&Config::default()));
    }

    #[test]
    fn read_head_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.stderr");
        std::fs::write(&path, "0123456789").unwrap();
        assert_eq!(read_head(&path, 4).unwrap(), "0123");
        assert_eq!(read_head(&path, 100).unwrap(), "0123456789");
        assert!(read_head(&dir.path().join("missing"), 4).is_err());
    }
}
