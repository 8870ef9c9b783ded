#![deny(clippy::all)]

mod cgroup;
mod child;
mod parent;
mod signal;

use judge_utils::os_cmd::OsCmd;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SandboxArgs {
    pub cmd: OsCmd,
    pub workdir: PathBuf,

    pub stdin: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,

    pub uid: Option<u32>,
    pub gid: Option<u32>,

    pub real_time_limit: Option<u64>, // milliseconds
    pub cpu_time_limit: Option<u64>,  // milliseconds

    pub rlimit_as: Option<u64>,    // bytes
    pub rlimit_stack: Option<u64>, // bytes
    pub rlimit_fsize: Option<u64>, // bytes

    pub cgroup_root: Option<PathBuf>,
    pub cg_limit_memory: Option<u64>, // bytes
    pub cg_limit_max_pids: Option<u32>,

    pub memory_limit: Option<u64>, // KiB, checked against the measured peak
}

/// How the process ended, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

/// A limit the launcher knows for certain was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitBreach {
    CpuTime,
    WallTime,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxOutput {
    pub termination: Termination,
    pub breach: Option<LimitBreach>,

    pub real_time: u64, // milliseconds
    pub sys_time: u64,  // milliseconds
    pub user_time: u64, // milliseconds
    pub cpu_time: u64,  // milliseconds
    pub memory: u64,    // KiB
}

impl SandboxArgs {
    pub fn new(cmd: OsCmd, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmd,
            workdir: workdir.into(),
            stdin: "/dev/null".into(),
            stdout: "/dev/null".into(),
            stderr: "/dev/null".into(),
            uid: None,
            gid: None,
            real_time_limit: None,
            cpu_time_limit: None,
            rlimit_as: None,
            rlimit_stack: None,
            rlimit_fsize: None,
            cgroup_root: None,
            cg_limit_memory: None,
            cg_limit_max_pids: None,
            memory_limit: None,
        }
    }

    pub fn stdio(
        &mut self,
        stdin: impl Into<PathBuf>,
        stdout: impl Into<PathBuf>,
        stderr: impl Into<PathBuf>,
    ) -> &mut Self {
        self.stdin = stdin.into();
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }
}

impl Termination {
    pub fn from_wait_status(status: i32) -> Self {
        if libc::WIFSIGNALED(status) {
            Termination::Signaled(libc::WTERMSIG(status))
        } else {
            Termination::Exited(libc::WEXITSTATUS(status))
        }
    }

    pub fn is_success(self) -> bool {
        self == Termination::Exited(0)
    }

    pub fn signal(self) -> Option<Signal> {
        match self {
            Termination::Signaled(sig) => Signal::try_from(sig).ok(),
            Termination::Exited(_) => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Termination::Exited(code) => write!(f, "exit code {}", code),
            Termination::Signaled(sig) => match self.signal() {
                Some(signal) => write!(f, "killed by signal {}", signal.as_str()),
                None => write!(f, "killed by signal {}", sig),
            },
        }
    }
}

impl SandboxOutput {
    pub fn is_success(&self) -> bool {
        self.termination.is_success() && self.breach.is_none()
    }
}

/// Runs `args.cmd` to completion under the requested limits.
///
/// The call blocks until the process exits or is killed. An `Err` means the
/// launcher itself failed (the program never ran or could not be accounted for).
pub fn run(args: &SandboxArgs) -> Result<SandboxOutput> {
    parent::run_parent(args)
}
