use std::ffi::{CStr, CString};
use std::fs;
use std::io::{self, Write as _};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{fmt, thread, time::Duration};

use anyhow::{Context, Result};
use tracing::{debug, warn};

const CONTROLLERS: &str = "+cpu +memory +pids";

fn write_cgroup(cg_dir: &Path, file: &str, content: impl fmt::Display) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).open(cg_dir.join(file))?;
    write!(file, "{}", content)?;
    Ok(())
}

fn read_cgroup<T>(cg_dir: &Path, file: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let content = fs::read_to_string(cg_dir.join(file))?;
    Ok(content.trim_end().parse::<T>()?)
}

/// Finds `key value` in a flat-keyed cgroup file such as `cpu.stat`.
fn read_keyed(cg_dir: &Path, file: &str, key: &str) -> Result<u64> {
    let content = fs::read_to_string(cg_dir.join(file))?;
    content
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(' '))
        .with_context(|| format!("missing key {} in {}", key, file))?
        .trim()
        .parse::<u64>()
        .map_err(Into::into)
}

/// Moves the calling process into the cgroup. Async-signal-safe.
pub fn join_self(procs: &CStr) -> io::Result<()> {
    let fd = unsafe { libc::open(procs.as_ptr(), libc::O_WRONLY | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::write(fd, b"0".as_ptr().cast(), 1) };
    let err = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(err);
    }
    Ok(())
}

/// A throwaway cgroup v2 node holding exactly one judged process tree.
pub struct Cgroup {
    dir: PathBuf,
}

#[derive(Debug)]
pub struct Statistics {
    pub cpu_time: u64,       // milliseconds
    pub memory: Option<u64>, // KiB
    pub oom_killed: bool,
}

impl Cgroup {
    pub fn new(root: &Path, nonce: u32) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(root)
                .with_context(|| format!("failed to create cgroup root: {}", root.display()))?;
        }
        if let Err(err) = write_cgroup(root, "cgroup.subtree_control", CONTROLLERS) {
            warn!(%err, root = %root.display(), "failed to enable cgroup controllers");
        }

        let dir = root.join(format!("run-{:08x}", nonce));
        fs::create_dir(&dir)
            .with_context(|| format!("failed to create cgroup: {}", dir.display()))?;
        debug!(dir = %dir.display(), "cgroup created");
        Ok(Self { dir })
    }

    pub fn set_limits(&self, memory: Option<u64>, max_pids: Option<u32>) -> Result<()> {
        if let Some(memory) = memory {
            write_cgroup(&self.dir, "memory.max", memory).context("failed to set memory limit")?;
            // absent when swap accounting is off
            let _ = write_cgroup(&self.dir, "memory.swap.max", 0);
        }
        if let Some(max_pids) = max_pids {
            write_cgroup(&self.dir, "pids.max", max_pids).context("failed to set pids limit")?;
        }
        Ok(())
    }

    pub fn procs_path(&self) -> Result<CString> {
        let path = self.dir.join("cgroup.procs");
        Ok(CString::new(path.as_os_str().as_bytes())?)
    }

    pub fn collect_statistics(&self) -> Result<Statistics> {
        let usage_usec = read_keyed(&self.dir, "cpu.stat", "usage_usec")?;
        let oom_kill = read_keyed(&self.dir, "memory.events", "oom_kill")?;
        // memory.peak only exists on newer kernels
        let peak = read_cgroup::<u64>(&self.dir, "memory.peak").ok();

        debug!(usage_usec, oom_kill, ?peak, "cgroup statistics");

        Ok(Statistics {
            cpu_time: usage_usec / 1000,    // us => ms
            memory: peak.map(|b| b / 1024), // bytes => KiB
            oom_killed: oom_kill > 0,
        })
    }

    fn cleanup(&self) {
        let _ = write_cgroup(&self.dir, "cgroup.kill", 1);
        for _ in 0..10 {
            match fs::remove_dir(&self.dir) {
                Ok(()) => return,
                Err(err) if err.raw_os_error() == Some(libc::EBUSY) => {
                    thread::sleep(Duration::from_millis(10))
                }
                Err(err) => {
                    warn!(%err, path = %self.dir.display(), "failed to remove cgroup");
                    return;
                }
            }
        }
        warn!(path = %self.dir.display(), "cgroup is still busy, leaving it behind");
    }
}

impl Drop for Cgroup {
    fn drop(&mut self) {
        self.cleanup()
    }
}
