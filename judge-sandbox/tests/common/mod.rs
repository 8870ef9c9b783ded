use std::sync::Once;

use judge_sandbox::{SandboxArgs, SandboxOutput};

use anyhow::Result;
use tracing::{debug, error};

pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn run(args: &SandboxArgs) -> Result<SandboxOutput> {
    debug!("sandbox args = {:?}", args);
    match judge_sandbox::run(args) {
        Ok(output) => {
            debug!("sandbox output = {:?}", output);
            Ok(output)
        }
        Err(err) => {
            error!("sandbox error:\n{:?}", err);
            Err(err)
        }
    }
}
