use crate::Result;
use crate::config::RunnerConfig;
use crate::discovery::discover_fixtures;
use crate::module::Module;
use crate::runner::executor::TestExecutor;
use crate::runner::reporter::TestReporter;
use crate::runner::types::{self, FixtureError, RunState, TestRecord, TestSummary};
use crate::utils::format_elapsed;
use chrono::{DateTime, Local};
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};
use tracing::info;

/// 针对一个代码单元的测试运行器
///
/// 计数器在多次 `run` 之间不会重置，重复运行会累加。
pub struct TestRunner<W: Write = Stdout> {
    module: Module,
    config: RunnerConfig,
    reporter: TestReporter<W>,
    state: RunState,
    elapsed: Duration,
    elapsed_run_time: Option<String>,
    started_at: Option<DateTime<Local>>,
}

impl TestRunner<Stdout> {
    pub fn new(module: Module) -> Self {
        Self::with_config(module, RunnerConfig::default())
    }

    pub fn with_config(module: Module, config: RunnerConfig) -> Self {
        Self::with_output(module, config, io::stdout())
    }
}

impl<W: Write> TestRunner<W> {
    /// 报告写入 `out` 而不是 stdout
    pub fn with_output(module: Module, config: RunnerConfig, out: W) -> Self {
        let reporter = TestReporter::new(out, config.color, config.divider_width);
        Self {
            module,
            config,
            reporter,
            state: RunState::default(),
            elapsed: Duration::ZERO,
            elapsed_run_time: None,
            started_at: None,
        }
    }

    /// 发现并执行模块中的全部测试
    ///
    /// 即使因 setup/teardown 失败而中止，耗时也会被记录。
    pub fn run(&mut self) -> Result<()> {
        let timer = Instant::now();
        self.started_at.get_or_insert_with(Local::now);

        let result = self.run_fixtures();

        self.elapsed += timer.elapsed();
        self.elapsed_run_time = Some(format_elapsed(self.elapsed));
        info!(
            library = self.module.name(),
            run = self.state.total_tests_run,
            failed = self.state.total_tests_failed,
            elapsed = ?self.elapsed,
            "test run finished"
        );

        result
    }

    fn run_fixtures(&mut self) -> Result<()> {
        let fixtures = discover_fixtures(&self.module);
        info!(
            library = self.module.name(),
            fixtures = fixtures.len(),
            "discovered fixtures"
        );

        let mut executor = TestExecutor::new(
            self.config.lifecycle_failures,
            &mut self.state,
            &mut self.reporter,
        );
        for fixture in &fixtures {
            executor.run_fixture(fixture)?;
        }
        Ok(())
    }

    pub fn library_name(&self) -> &str {
        self.module.name()
    }

    pub fn total_tests_run(&self) -> usize {
        self.state.total_tests_run
    }

    pub fn total_tests_failed(&self) -> usize {
        self.state.total_tests_failed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// `HH:MM:SS.hh`，尚未运行时为 None
    pub fn elapsed_run_time(&self) -> Option<&str> {
        self.elapsed_run_time.as_deref()
    }

    pub fn percent_success(&self) -> f64 {
        types::percent_success(self.state.total_tests_run, self.state.total_tests_failed)
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.state.records
    }

    pub fn fixture_errors(&self) -> &[FixtureError] {
        &self.state.fixture_errors
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            library: self.library_name().to_string(),
            started_at: self.started_at,
            total: self.state.total_tests_run,
            failed: self.state.total_tests_failed,
            passed: self
                .state
                .total_tests_run
                .saturating_sub(self.state.total_tests_failed),
            elapsed_run_time: self
                .elapsed_run_time
                .clone()
                .unwrap_or_else(|| format_elapsed(Duration::ZERO)),
            percent_success: self.percent_success(),
        }
    }

    /// 打印运行摘要
    pub fn print_summary(&mut self) -> Result<()> {
        let summary = self.summary();
        self.reporter.print_summary(&summary)?;
        Ok(())
    }

    pub fn output(&self) -> &W {
        self.reporter.writer()
    }

    pub fn into_output(self) -> W {
        self.reporter.into_writer()
    }
}
