mod common;

use judge_sandbox::{LimitBreach, SandboxArgs, Termination};
use judge_utils::os_cmd::OsCmd;

use std::fs;
use std::path::Path;

use anyhow::Result;
use nix::sys::signal::Signal;

fn shell(script: &str, workdir: &Path) -> SandboxArgs {
    let mut cmd = OsCmd::new("/bin/sh");
    cmd.arg("-c").arg(script).inherit_env("PATH");
    let mut args = SandboxArgs::new(cmd, workdir);
    args.stdio(
        "/dev/null",
        workdir.join("stdout"),
        workdir.join("stderr"),
    );
    args.real_time_limit = Some(10_000);
    args.cpu_time_limit = Some(5_000);
    args
}

#[test]
fn exit_code() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let output = common::run(&shell("exit 3", dir.path()))?;
    assert_eq!(output.termination, Termination::Exited(3));
    assert_eq!(output.breach, None);
    assert!(!output.is_success());
    assert_eq!(output.termination.to_string(), "exit code 3");
    Ok(())
}

#[test]
fn redirect_stdio() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;
    let stdin = dir.path().join("stdin");
    fs::write(&stdin, "21\n")?;

    let mut args = shell("read x; echo $((x * 2)); echo oops >&2", dir.path());
    args.stdin = stdin;

    let output = common::run(&args)?;
    assert!(output.is_success());
    assert_eq!(fs::read_to_string(dir.path().join("stdout"))?, "42\n");
    assert_eq!(fs::read_to_string(dir.path().join("stderr"))?, "oops\n");
    Ok(())
}

#[test]
fn environment_is_cleared() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let mut args = shell("echo \"[$JUDGE_FLAG] [$HOME]\"", dir.path());
    args.cmd.add_env("JUDGE_FLAG", "on");

    let output = common::run(&args)?;
    assert!(output.is_success());
    assert_eq!(fs::read_to_string(dir.path().join("stdout"))?, "[on] []\n");
    Ok(())
}

#[test]
fn killed_by_signal() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let output = common::run(&shell("kill -s SEGV $$", dir.path()))?;
    assert_eq!(output.termination.signal(), Some(Signal::SIGSEGV));
    assert_eq!(output.breach, None);
    assert_eq!(output.termination.to_string(), "killed by signal SIGSEGV");
    Ok(())
}

#[test]
fn cpu_time_limit() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let mut args = shell("while :; do :; done", dir.path());
    args.cpu_time_limit = Some(500);

    let output = common::run(&args)?;
    assert_eq!(output.breach, Some(LimitBreach::CpuTime));
    assert!(output.cpu_time >= 500);
    Ok(())
}

#[test]
fn wall_time_limit() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let mut args = shell("exec sleep 30", dir.path());
    args.real_time_limit = Some(300);

    let output = common::run(&args)?;
    assert_eq!(output.breach, Some(LimitBreach::WallTime));
    assert_eq!(output.termination.signal(), Some(Signal::SIGKILL));
    assert!(output.real_time < 10_000);
    Ok(())
}

#[test]
fn memory_limit() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    // holds a 16 MiB string
    let script = "s=$(head -c 16777216 /dev/zero | tr '\\0' x); echo ${#s}";

    let mut args = shell(script, dir.path());
    args.memory_limit = Some(8 * 1024);
    let output = common::run(&args)?;
    assert!(output.is_success());
    assert!(output.memory > 8 * 1024);
    assert_eq!(output.breach, Some(LimitBreach::Memory));
    assert_eq!(fs::read_to_string(dir.path().join("stdout"))?, "16777216\n");

    args.memory_limit = Some(1024 * 1024);
    let output = common::run(&args)?;
    assert_eq!(output.breach, None);
    Ok(())
}

#[test]
fn missing_binary() -> Result<()> {
    common::init();
    let dir = tempfile::tempdir()?;

    let args = SandboxArgs::new(OsCmd::new("/nonexistent/judge/bin"), dir.path());
    assert!(judge_sandbox::run(&args).is_err());
    Ok(())
}
