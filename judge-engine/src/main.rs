use judge_engine::{Config, JudgeService, Judger};
use judge_protocol::common::{JudgeRequest, JudgeVerdict};
use judge_protocol::error::{ErrorInfo, RequestError};
use judge_utils::tracing::setup_tracing;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use dotenv::dotenv;
use futures::future::join_all;
use serde::Serialize;
use structopt::StructOpt;
use tracing::{info, warn};

#[derive(Debug, StructOpt)]
#[structopt(name = "judge-engine", about = "Compiles, runs and grades submissions")]
struct Opt {
    /// Path to the TOML config file
    #[structopt(long, default_value = "judge-engine.toml", parse(from_os_str))]
    config: PathBuf,

    /// A JSON request or an array of requests, read from stdin when absent
    #[structopt(parse(from_os_str))]
    requests: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Reply {
    Verdict(JudgeVerdict),
    Error { error: ErrorInfo },
}

#[tracing::instrument(err)]
fn load_config(path: &Path) -> Result<Config> {
    info!("loading config from {}", path.display());
    let config = if path.exists() {
        Config::from_file(path)?
    } else {
        warn!("config file is not found, using defaults");
        Config::default()
    };
    info!("config is loaded:\n{:#?}", config);
    Ok(config)
}

fn read_requests(path: Option<&Path>) -> Result<Vec<Result<JudgeRequest, RequestError>>> {
    let text = match path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    Ok(parse_requests(&text))
}

/// Splits the input into requests. Input that is not JSON at all yields a
/// single malformed request.
fn parse_requests(text: &str) -> Vec<Result<JudgeRequest, RequestError>> {
    let values = match serde_json::from_str(text) {
        Ok(serde_json::Value::Array(values)) => values,
        Ok(value) => vec![value],
        Err(err) => return vec![Err(err.into())],
    };
    values.into_iter().map(JudgeRequest::from_value).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_tracing();

    let opt = Opt::from_args();
    let config = load_config(&opt.config)?;
    let service = JudgeService::new(Judger::new(config)?);

    let requests = read_requests(opt.requests.as_deref())?;
    info!(count = requests.len(), "judging requests");

    let replies = join_all(requests.into_iter().map(|request| {
        let service = service.clone();
        async move {
            match request {
                Ok(request) => service.judge(request).await,
                Err(err) => Err(err),
            }
        }
    }))
    .await;

    for reply in replies {
        let reply = match reply {
            Ok(verdict) => Reply::Verdict(verdict),
            Err(err) => {
                warn!(%err, "request rejected");
                Reply::Error { error: err.to_info() }
            }
        };
        println!("{}", serde_json::to_string(&reply)?);
    }

    Ok(())
}
