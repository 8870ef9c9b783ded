use crate::exec::{read_head, sandbox_exec, Limit};
use crate::lang::LanguageSpec;
use crate::Config;

use judge_sandbox::LimitBreach;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

const COMPILE_STDOUT: &str = "compile.stdout";
const COMPILE_STDERR: &str = "compile.stderr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Nothing to build, or the build produced a runnable artifact.
    Ready,
    Failed { log: String },
}

/// Builds the source file in `workdir` with the language's compiler.
///
/// A compiler that rejects the source is a `Failed` outcome. An `Err` means
/// the compiler could not be run at all.
pub fn compile(config: &Config, lang: &LanguageSpec, workdir: &Path) -> Result<CompileOutcome> {
    let cmd = match lang.compile_cmd()? {
        Some(cmd) => cmd,
        None => return Ok(CompileOutcome::Ready),
    };

    let stdout = workdir.join(COMPILE_STDOUT);
    let stderr = workdir.join(COMPILE_STDERR);
    let limit = Limit {
        cpu_time: config.compiler.cpu_time,
        memory: config.compiler.memory.as_u64(),
        address_space: false,
    };

    let output = sandbox_exec(
        config,
        workdir,
        cmd,
        [Path::new("/dev/null"), stdout.as_path(), stderr.as_path()],
        &limit,
    )
    .with_context(|| format!("failed to run compiler for {}", lang.id))?;

    debug!(?output, "compiler finished");

    if output.is_success() {
        return Ok(CompileOutcome::Ready);
    }

    let log_limit = config.compiler.log_limit.as_u64();
    let mut log = read_head(&stderr, log_limit)?;
    if (log.len() as u64) < log_limit {
        let rest = read_head(&stdout, log_limit - log.len() as u64)?;
        log.push_str(&rest);
    }
    let mut log = log.trim_end().to_owned();

    if let Some(breach) = output.breach {
        if !log.is_empty() {
            log.push('\n');
        }
        let what = match breach {
            LimitBreach::CpuTime | LimitBreach::WallTime => "time",
            LimitBreach::Memory => "memory",
        };
        log.push_str(&format!("compilation exceeded the {} limit", what));
    } else if log.is_empty() {
        log = format!("compiler failed with {}", output.termination);
    }

    info!(lang = lang.id, termination = %output.termination, "compile error");
    Ok(CompileOutcome::Failed { log })
}
