use crate::module::{Failure, InvocationError};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// 调用包装里没有内层原因时使用的占位文本
pub const NO_INNER_EXCEPTION: &str = "no inner exception exists";

/// 失败原因没有位置信息时使用的占位文本
pub const UNKNOWN_LOCATION: &str = "an unknown location";

/// setup / teardown 阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Setup,
    Teardown,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Setup => write!(f, "setup"),
            LifecyclePhase::Teardown => write!(f, "teardown"),
        }
    }
}

/// setup / teardown 失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePolicy {
    /// 失败直接向上抛出，中止整个运行
    #[default]
    Propagate,
    /// 失败记为当前测试失败，继续运行
    Record,
}

/// 报告给用户的失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub trace: String,
    /// 失败发生在 setup/teardown 时为 Some
    pub phase: Option<LifecyclePhase>,
}

impl FailureReport {
    /// 剥掉一层调用包装，取真正的失败原因
    pub fn from_invocation(err: &InvocationError, phase: Option<LifecyclePhase>) -> Self {
        match err.inner() {
            Some(cause) => Self::from_failure(cause, phase),
            None => Self {
                message: NO_INNER_EXCEPTION.to_string(),
                trace: NO_INNER_EXCEPTION.to_string(),
                phase,
            },
        }
    }

    pub fn from_failure(cause: &Failure, phase: Option<LifecyclePhase>) -> Self {
        Self {
            message: cause.message.clone(),
            trace: cause
                .trace
                .clone()
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            phase,
        }
    }
}

/// 单个测试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail(FailureReport),
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }
}

/// 单个测试的执行记录
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub fixture: String,
    pub method: String,
    pub outcome: TestOutcome,
    pub duration: Duration,
}

/// 构造失败的 fixture
#[derive(Debug, Clone)]
pub struct FixtureError {
    pub fixture: String,
    /// 因此未能执行的测试数
    pub tests: usize,
    pub report: FailureReport,
}

/// 一个 runner 独占的运行状态；计数只增不减
#[derive(Debug, Default)]
pub struct RunState {
    pub total_tests_run: usize,
    pub total_tests_failed: usize,
    pub records: Vec<TestRecord>,
    pub fixture_errors: Vec<FixtureError>,
}

/// 运行摘要
#[derive(Debug, Clone)]
pub struct TestSummary {
    pub library: String,
    pub started_at: Option<DateTime<Local>>,
    pub total: usize,
    pub failed: usize,
    pub passed: usize,
    pub elapsed_run_time: String,
    pub percent_success: f64,
}

/// 成功率，保留两位小数（四舍六入五成双）
///
/// 没有运行任何测试时为 0，没有失败时为 100。
pub fn percent_success(run: usize, failed: usize) -> f64 {
    if run == 0 {
        return 0.0;
    }
    if failed == 0 {
        return 100.0;
    }

    // 以万分之一为单位做整数运算，避免浮点误差
    let run = run as u128;
    let numerator = (run - (failed as u128).min(run)) * 10_000;
    let mut hundredths = numerator / run;
    let twice_remainder = (numerator % run) * 2;
    if twice_remainder > run || (twice_remainder == run && hundredths % 2 == 1) {
        hundredths += 1;
    }

    hundredths as f64 / 100.0
}
