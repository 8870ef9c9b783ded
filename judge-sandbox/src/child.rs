use crate::cgroup;
use crate::SandboxArgs;

use std::ffi::CString;
use std::io;

use judge_utils::math::roundup_div;

use nix::unistd::{self, Gid, Pid, Uid};
use rlimit::Resource;

/// Everything the child needs after fork, computed before fork.
///
/// `setup` runs between fork and exec, so it must not allocate.
pub struct ChildSetup {
    rlimit_cpu: Option<u64>, // seconds
    rlimit_as: Option<u64>,
    rlimit_stack: Option<u64>,
    rlimit_fsize: Option<u64>,
    cgroup_procs: Option<CString>,
    uid: Option<Uid>,
    gid: Option<Gid>,
}

impl ChildSetup {
    pub fn new(args: &SandboxArgs, cgroup_procs: Option<CString>) -> Self {
        Self {
            rlimit_cpu: args.cpu_time_limit.map(|ms| roundup_div(ms.max(1), 1000)),
            rlimit_as: args.rlimit_as,
            rlimit_stack: args.rlimit_stack,
            rlimit_fsize: args.rlimit_fsize,
            cgroup_procs,
            uid: args.uid.map(Uid::from_raw),
            gid: args.gid.map(Gid::from_raw),
        }
    }

    pub fn setup(&self) -> io::Result<()> {
        let ret = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        // own process group, so the watchdog can take down every descendant
        unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))?;

        if let Some(ref procs) = self.cgroup_procs {
            cgroup::join_self(procs)?;
        }

        // the soft limit raises SIGXCPU, the hard limit one second later is SIGKILL
        if let Some(secs) = self.rlimit_cpu {
            lower_limit(Resource::CPU, secs, secs.saturating_add(1))?;
        }

        if let Some(bytes) = self.rlimit_as {
            lower_limit(Resource::AS, bytes, bytes)?;
        }

        if let Some(bytes) = self.rlimit_stack {
            lower_limit(Resource::STACK, bytes, bytes)?;
        }

        if let Some(bytes) = self.rlimit_fsize {
            lower_limit(Resource::FSIZE, bytes, bytes)?;
        }

        lower_limit(Resource::CORE, 0, 0)?;

        if let Some(gid) = self.gid {
            unistd::setgroups(&[gid])?;
            unistd::setgid(gid)?;
        }

        if let Some(uid) = self.uid {
            unistd::setuid(uid)?;
        }

        Ok(())
    }
}

/// Limits are only ever lowered; an unprivileged process cannot raise a hard limit.
fn lower_limit(resource: Resource, soft: u64, hard: u64) -> io::Result<()> {
    let (_, current_hard) = resource.get()?;
    resource.set(soft.min(current_hard), hard.min(current_hard))
}
