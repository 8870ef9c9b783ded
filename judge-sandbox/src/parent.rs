use crate::cgroup::Cgroup;
use crate::child::ChildSetup;
use crate::signal::{send_group_signal, Watchdog};
use crate::{LimitBreach, SandboxArgs, SandboxOutput, Termination};

use std::env;
use std::fs::File;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use scopeguard::ScopeGuard;
use tracing::debug;

pub fn run_parent(args: &SandboxArgs) -> Result<SandboxOutput> {
    let cgroup = match args.cgroup_root {
        Some(ref root) => {
            let cgroup = Cgroup::new(root, rand::random()).context("failed to create cgroup")?;
            cgroup.set_limits(args.cg_limit_memory, args.cg_limit_max_pids)?;
            Some(cgroup)
        }
        None => None,
    };

    let procs = cgroup.as_ref().map(Cgroup::procs_path).transpose()?;
    let setup = ChildSetup::new(args, procs);

    let mut cmd = build_command(args)?;
    unsafe { cmd.pre_exec(move || setup.setup()) };

    let t0 = Instant::now();
    let child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {:?}", args.cmd))?;
    let pid = Pid::from_raw(child.id() as i32);
    debug!(%pid, cmd = ?args.cmd, "child spawned");

    let watchdog = args
        .real_time_limit
        .map(|real_time_limit| Watchdog::spawn(pid, real_time_limit));

    // on any early return, take the whole group down and reap it
    let guard = scopeguard::guard(watchdog, |watchdog| {
        let _ = send_group_signal(pid, Signal::SIGKILL);
        if let Some(watchdog) = watchdog {
            watchdog.stop();
        }
        let _ = wait4(pid);
    });

    wait_exited(pid).context("failed to wait for child")?;
    let real_time = t0.elapsed().as_millis() as u64;

    // the child is a zombie now: its pid cannot be reused until wait4
    let fired = match ScopeGuard::into_inner(guard) {
        Some(watchdog) => watchdog.stop(),
        None => false,
    };
    let _ = send_group_signal(pid, Signal::SIGKILL);

    let (status, rusage) = wait4(pid).context("failed to wait4")?;
    let termination = Termination::from_wait_status(status);

    let user_time = timeval_ms(&rusage.ru_utime);
    let sys_time = timeval_ms(&rusage.ru_stime);
    let mut cpu_time = user_time + sys_time;
    let mut memory = rusage.ru_maxrss as u64; // KiB on linux
    let mut oom_killed = false;

    if let Some(ref cgroup) = cgroup {
        let s = cgroup
            .collect_statistics()
            .context("failed to collect statistics from cgroup")?;
        cpu_time = cpu_time.max(s.cpu_time);
        memory = s.memory.unwrap_or(memory).max(memory);
        oom_killed = s.oom_killed;
    }

    let breach = detect_breach(args, termination, fired, oom_killed, cpu_time, memory);

    debug!(
        ?termination,
        ?breach,
        real_time,
        cpu_time,
        memory,
        "child finished"
    );

    Ok(SandboxOutput {
        termination,
        breach,
        real_time,
        sys_time,
        user_time,
        cpu_time,
        memory,
    })
}

fn build_command(args: &SandboxArgs) -> Result<Command> {
    let stdin = File::open(&args.stdin)
        .with_context(|| format!("failed to open stdin: {}", args.stdin.display()))?;
    let stdout = File::create(&args.stdout)
        .with_context(|| format!("failed to create stdout: {}", args.stdout.display()))?;
    let stderr = File::create(&args.stderr)
        .with_context(|| format!("failed to create stderr: {}", args.stderr.display()))?;

    let mut cmd = Command::new(&args.cmd.bin);
    cmd.args(&args.cmd.args);
    cmd.current_dir(&args.workdir);

    cmd.env_clear();
    for (key, value) in args.cmd.env_pairs() {
        match value {
            Some(value) => {
                cmd.env(key, value);
            }
            None => {
                if let Some(value) = env::var_os(key) {
                    cmd.env(key, value);
                }
            }
        }
    }

    cmd.stdin(Stdio::from(stdin));
    cmd.stdout(Stdio::from(stdout));
    cmd.stderr(Stdio::from(stderr));

    Ok(cmd)
}

fn detect_breach(
    args: &SandboxArgs,
    termination: Termination,
    watchdog_fired: bool,
    oom_killed: bool,
    cpu_time: u64,
    memory: u64,
) -> Option<LimitBreach> {
    if oom_killed && !termination.is_success() {
        return Some(LimitBreach::Memory);
    }
    if termination.signal() == Some(Signal::SIGXCPU) {
        return Some(LimitBreach::CpuTime);
    }
    if watchdog_fired {
        return Some(LimitBreach::WallTime);
    }
    // RLIMIT_CPU only has second granularity
    if matches!(args.cpu_time_limit, Some(limit) if cpu_time > limit) {
        return Some(LimitBreach::CpuTime);
    }
    match args.memory_limit {
        Some(limit) if memory > limit => Some(LimitBreach::Memory),
        _ => None,
    }
}

fn timeval_ms(tv: &libc::timeval) -> u64 {
    (tv.tv_sec as u64) * 1000 + (tv.tv_usec as u64) / 1000
}

fn libc_call(mut f: impl FnMut() -> i32) -> io::Result<i32> {
    loop {
        let ret = f();
        if ret >= 0 {
            return Ok(ret);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Blocks until the child exits, leaving it unreaped.
fn wait_exited(child_pid: Pid) -> io::Result<()> {
    let mut info: MaybeUninit<libc::siginfo_t> = MaybeUninit::zeroed();
    libc_call(|| unsafe {
        libc::waitid(
            libc::P_PID,
            child_pid.as_raw() as libc::id_t,
            info.as_mut_ptr(),
            libc::WEXITED | libc::WNOWAIT,
        )
    })?;
    Ok(())
}

fn wait4(child_pid: Pid) -> io::Result<(i32, libc::rusage)> {
    let pid = child_pid.as_raw();
    let mut status: i32 = 0;
    let mut rusage: MaybeUninit<libc::rusage> = MaybeUninit::zeroed();

    libc_call(|| unsafe { libc::wait4(pid, &mut status, 0, rusage.as_mut_ptr()) })?;

    unsafe { Ok((status, rusage.assume_init())) }
}
