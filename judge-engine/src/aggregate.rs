use judge_protocol::common::{CaseStatus, ExecutionOutcome, UNMEASURED};
use judge_utils::math::round_to;

/// Failure statuses from most to least severe. A verdict takes the first one
/// present among its outcomes, and is accepted when none is.
const PRECEDENCE: [CaseStatus; 4] = [
    CaseStatus::WrongAnswer,
    CaseStatus::RuntimeError,
    CaseStatus::TimeLimitExceeded,
    CaseStatus::MemoryLimitExceeded,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub status: CaseStatus,
    pub score: f64,
    pub total_cpu_time_ms: i64,
    pub peak_memory_kb: i64,
}

pub fn aggregate(outcomes: &[ExecutionOutcome], max_point: f64) -> Summary {
    let has = |status: CaseStatus| outcomes.iter().any(|o| o.status == status);

    let status = PRECEDENCE
        .iter()
        .copied()
        .find(|&status| has(status))
        .unwrap_or(CaseStatus::Accepted);

    let accepted = outcomes
        .iter()
        .filter(|o| o.status == CaseStatus::Accepted)
        .count();
    let score = if outcomes.is_empty() {
        0.0
    } else {
        round_to(max_point / outcomes.len() as f64 * accepted as f64, 2)
    };

    let total_cpu_time_ms = if has(CaseStatus::TimeLimitExceeded) {
        UNMEASURED
    } else {
        outcomes.iter().map(|o| o.cpu_time_ms as i64).sum()
    };

    let peak_memory_kb = if has(CaseStatus::MemoryLimitExceeded) {
        UNMEASURED
    } else {
        outcomes.iter().map(|o| o.memory_kb as i64).max().unwrap_or(0)
    };

    Summary {
        status,
        score,
        total_cpu_time_ms,
        peak_memory_kb,
    }
}
