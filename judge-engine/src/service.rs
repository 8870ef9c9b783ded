use crate::judger::Judger;
use crate::lang::LanguageSpec;

use judge_protocol::common::{JudgeRequest, JudgeVerdict, Problem};
use judge_protocol::error::RequestError;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task;
use tracing::error;

/// Runs judging requests concurrently, at most `max_workers` at a time.
///
/// Each request gets its own workspace, so requests never observe each other.
#[derive(Clone)]
pub struct JudgeService {
    judger: Arc<Judger>,
    permits: Arc<Semaphore>,
}

impl JudgeService {
    pub fn new(judger: Judger) -> Self {
        let max_workers = judger.config().executor.max_workers;
        Self {
            judger: Arc::new(judger),
            permits: Arc::new(Semaphore::new(max_workers)),
        }
    }

    pub async fn judge(&self, request: JudgeRequest) -> Result<JudgeVerdict, RequestError> {
        let lang = Judger::prepare(&request)?;
        let JudgeRequest {
            source_code,
            problem,
            ..
        } = request;
        Ok(self.judge_with(lang, source_code, problem).await)
    }

    pub async fn judge_with(
        &self,
        lang: &'static LanguageSpec,
        source_code: String,
        problem: Problem,
    ) -> JudgeVerdict {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => return JudgeVerdict::internal_error(err.to_string()),
        };

        let judger = Arc::clone(&self.judger);
        let task = task::spawn_blocking(move || {
            let _permit = permit;
            judger.judge_with(lang, &source_code, &problem)
        });

        match task.await {
            Ok(verdict) => verdict,
            Err(err) => {
                error!(%err, "judging task failed");
                JudgeVerdict::internal_error(format!("judging task failed: {}", err))
            }
        }
    }
}
