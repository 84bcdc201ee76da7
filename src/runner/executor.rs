use crate::Result;
use crate::discovery::{Fixture, MethodRef};
use crate::error::MarkrunError;
use crate::module::InvocationError;
use crate::runner::reporter::TestReporter;
use crate::runner::types::{
    FailureReport, FixtureError, LifecyclePhase, LifecyclePolicy, RunState, TestOutcome,
    TestRecord,
};
use std::any::Any;
use std::io::Write;
use std::time::Instant;
use tracing::{error, info, warn};

/// 逐个 fixture、逐个测试地顺序执行
pub struct TestExecutor<'a, W: Write> {
    policy: LifecyclePolicy,
    state: &'a mut RunState,
    reporter: &'a mut TestReporter<W>,
}

impl<'a, W: Write> TestExecutor<'a, W> {
    pub fn new(
        policy: LifecyclePolicy,
        state: &'a mut RunState,
        reporter: &'a mut TestReporter<W>,
    ) -> Self {
        Self {
            policy,
            state,
            reporter,
        }
    }

    /// 执行一个 fixture 的全部测试
    ///
    /// 构造失败只影响当前 fixture：它的测试全部记为失败，运行继续。
    pub fn run_fixture(&mut self, fixture: &Fixture) -> Result<()> {
        let count = fixture.test_count();
        self.state.total_tests_run += count;

        info!(fixture = %fixture.name, tests = count, "running fixture");
        self.reporter.print_fixture_header(&fixture.name, count)?;

        let mut instance = match fixture.instantiate() {
            Ok(instance) => instance,
            Err(failure) => {
                let report = FailureReport::from_failure(&failure, None);
                error!(fixture = %fixture.name, error = %failure, "fixture construction failed");

                self.state.total_tests_failed += count;
                self.reporter.print_fixture_error(&fixture.name, &report)?;
                self.state.fixture_errors.push(FixtureError {
                    fixture: fixture.name.clone(),
                    tests: count,
                    report,
                });
                self.reporter.print_fixture_footer(&fixture.name)?;
                return Ok(());
            }
        };

        for test in &fixture.tests {
            self.run_one_test(
                &fixture.name,
                instance.as_mut(),
                fixture.setup.as_ref(),
                test,
                fixture.teardown.as_ref(),
            )?;
        }

        self.reporter.print_fixture_footer(&fixture.name)?;
        Ok(())
    }

    /// 执行单个测试：setup → 测试 → teardown（总会执行）
    pub fn run_one_test(
        &mut self,
        fixture: &str,
        instance: &mut dyn Any,
        setup: Option<&MethodRef>,
        test: &MethodRef,
        teardown: Option<&MethodRef>,
    ) -> Result<TestOutcome> {
        let start = Instant::now();
        let mut failure = None;

        if let Some(setup) = setup
            && let Err(err) = setup.invoke(instance)
        {
            let report = self.lifecycle_failure(fixture, setup, LifecyclePhase::Setup, err)?;
            self.reporter.print_fail(test.name(), &report)?;
            failure = Some(report);
        }

        if failure.is_none() {
            if let Err(err) = test.invoke(instance) {
                let report = FailureReport::from_invocation(&err, None);
                self.reporter.print_fail(test.name(), &report)?;
                failure = Some(report);
            }
        }

        let mut pending = None;
        if let Some(teardown) = teardown
            && let Err(err) = teardown.invoke(instance)
        {
            match self.lifecycle_failure(fixture, teardown, LifecyclePhase::Teardown, err) {
                Ok(report) if failure.is_none() => {
                    self.reporter.print_fail(test.name(), &report)?;
                    failure = Some(report);
                }
                // 测试已经失败，保留第一个原因
                Ok(_) => {}
                Err(err) => pending = Some(err),
            }
        }

        // PASS 要等 teardown 结束才能确定
        if failure.is_none() {
            self.reporter.print_pass(test.name())?;
        }

        let outcome = match failure {
            None => TestOutcome::Pass,
            Some(report) => {
                self.state.total_tests_failed += 1;
                warn!(fixture, test = test.name(), error = %report.message, "test failed");
                TestOutcome::Fail(report)
            }
        };

        self.state.records.push(TestRecord {
            fixture: fixture.to_string(),
            method: test.name().to_string(),
            outcome: outcome.clone(),
            duration: start.elapsed(),
        });

        match pending {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    /// 按策略处理 setup/teardown 失败：Record 转成报告，Propagate 转成错误
    fn lifecycle_failure(
        &self,
        fixture: &str,
        method: &MethodRef,
        phase: LifecyclePhase,
        err: InvocationError,
    ) -> Result<FailureReport> {
        match self.policy {
            LifecyclePolicy::Record => {
                warn!(fixture, method = method.name(), %phase, error = %err, "lifecycle method failed");
                Ok(FailureReport::from_invocation(&err, Some(phase)))
            }
            LifecyclePolicy::Propagate => {
                error!(fixture, method = method.name(), %phase, error = %err, "lifecycle method failed, aborting run");
                Err(MarkrunError::Lifecycle {
                    fixture: fixture.to_string(),
                    method: method.name().to_string(),
                    phase,
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover_fixtures;
    use crate::module::{ModuleBuilder, TypeBuilder};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Tracer {
        log: Log,
    }

    fn traced_fixture(log: &Log, failing_setup: bool) -> Fixture {
        let log = Rc::clone(log);
        let def = TypeBuilder::<Tracer>::fixture("Tracer")
            .constructor(move || {
                Ok::<_, anyhow::Error>(Tracer {
                    log: Rc::clone(&log),
                })
            })
            .setup("init", move |p: &mut Tracer| -> anyhow::Result<()> {
                p.log.borrow_mut().push("setup".to_string());
                anyhow::ensure!(!failing_setup, "setup exploded");
                Ok(())
            })
            .teardown("cleanup", |p: &mut Tracer| {
                p.log.borrow_mut().push("teardown".to_string())
            })
            .test("works", |p: &mut Tracer| p.log.borrow_mut().push("works".to_string()))
            .test("breaks", |p: &mut Tracer| {
                p.log.borrow_mut().push("breaks".to_string());
                assert_eq!(1, 2, "one is not two");
            })
            .build();

        let module = ModuleBuilder::new("traced").with_type(def).build();
        discover_fixtures(&module).remove(0)
    }

    fn capture() -> TestReporter<Vec<u8>> {
        TestReporter::new(Vec::new(), false, 20)
    }

    #[test]
    fn test_setup_and_teardown_wrap_every_test() {
        let log: Log = Rc::default();
        let fixture = traced_fixture(&log, false);
        let mut state = RunState::default();
        let mut reporter = capture();

        TestExecutor::new(LifecyclePolicy::Propagate, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["setup", "works", "teardown", "setup", "breaks", "teardown"]
        );
        assert_eq!(state.total_tests_run, 2);
        assert_eq!(state.total_tests_failed, 1);
        assert!(state.records[0].outcome.is_pass());
        assert!(!state.records[1].outcome.is_pass());
    }

    #[test]
    fn test_setup_failure_propagates_by_default() {
        let log: Log = Rc::default();
        let fixture = traced_fixture(&log, true);
        let mut state = RunState::default();
        let mut reporter = capture();

        let err = TestExecutor::new(LifecyclePolicy::Propagate, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap_err();

        match err {
            MarkrunError::Lifecycle { method, phase, .. } => {
                assert_eq!(method, "init");
                assert_eq!(phase, LifecyclePhase::Setup);
            }
            other => panic!("Expected Lifecycle error, got {other:?}"),
        }
        // 测试体和 teardown 都没有执行
        assert_eq!(*log.borrow(), vec!["setup"]);
        assert_eq!(state.total_tests_run, 2);
        assert_eq!(state.total_tests_failed, 0);
    }

    #[test]
    fn test_setup_failure_recorded_when_requested() {
        let log: Log = Rc::default();
        let fixture = traced_fixture(&log, true);
        let mut state = RunState::default();
        let mut reporter = capture();

        TestExecutor::new(LifecyclePolicy::Record, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["setup", "teardown", "setup", "teardown"]
        );
        assert_eq!(state.total_tests_failed, 2);
        match &state.records[0].outcome {
            TestOutcome::Fail(report) => {
                assert_eq!(report.message, "setup exploded");
                assert_eq!(report.phase, Some(LifecyclePhase::Setup));
            }
            TestOutcome::Pass => panic!("Expected failure"),
        }
    }

    #[test]
    fn test_teardown_failure_after_pass() {
        let def = TypeBuilder::<Tracer>::fixture("Leaky")
            .constructor(|| Ok::<_, anyhow::Error>(Tracer { log: Rc::default() }))
            .teardown("cleanup", |_: &mut Tracer| -> anyhow::Result<()> {
                panic!("handle leaked")
            })
            .test("works", |_: &mut Tracer| {})
            .build();
        let module = ModuleBuilder::new("leaky").with_type(def).build();
        let fixture = discover_fixtures(&module).remove(0);

        // Propagate: 结果已记录为通过，错误随后抛出
        let mut state = RunState::default();
        let mut reporter = capture();
        let err = TestExecutor::new(LifecyclePolicy::Propagate, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap_err();
        assert!(matches!(
            err,
            MarkrunError::Lifecycle {
                phase: LifecyclePhase::Teardown,
                ..
            }
        ));
        assert_eq!(state.records.len(), 1);
        assert!(state.records[0].outcome.is_pass());
        assert_eq!(state.total_tests_failed, 0);

        // Record: 通过的测试被改记为失败
        let mut state = RunState::default();
        let mut reporter = capture();
        TestExecutor::new(LifecyclePolicy::Record, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap();
        assert_eq!(state.total_tests_failed, 1);
        let text = String::from_utf8(reporter.into_writer()).unwrap();
        assert!(!text.contains("Ran works ... PASS"));
        assert_eq!(text.matches("Ran works ...").count(), 1);
        assert!(text.contains("Ran works ... FAILED"));
        assert!(text.contains("during teardown. The exception was handle leaked"));
    }

    #[test]
    fn test_teardown_failure_after_failing_test_propagates() {
        let def = TypeBuilder::<Tracer>::fixture("Leaky")
            .constructor(|| Ok::<_, anyhow::Error>(Tracer { log: Rc::default() }))
            .teardown("cleanup", |_: &mut Tracer| -> anyhow::Result<()> {
                panic!("handle leaked")
            })
            .test("breaks", |_: &mut Tracer| -> anyhow::Result<()> {
                anyhow::bail!("wrong answer")
            })
            .build();
        let module = ModuleBuilder::new("leaky").with_type(def).build();
        let fixture = discover_fixtures(&module).remove(0);

        let mut state = RunState::default();
        let mut reporter = capture();
        let err = TestExecutor::new(LifecyclePolicy::Propagate, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap_err();
        assert!(matches!(
            err,
            MarkrunError::Lifecycle {
                phase: LifecyclePhase::Teardown,
                ..
            }
        ));

        // 测试本身的失败先记录下来
        assert_eq!(state.total_tests_failed, 1);
        assert_eq!(state.records.len(), 1);
        match &state.records[0].outcome {
            TestOutcome::Fail(report) => {
                assert_eq!(report.message, "wrong answer");
                assert_eq!(report.phase, None);
            }
            TestOutcome::Pass => panic!("Expected failure"),
        }
        let text = String::from_utf8(reporter.into_writer()).unwrap();
        assert!(text.contains("Ran breaks ... FAILED"));
    }

    #[test]
    fn test_construction_failure_skips_fixture() {
        let def = TypeBuilder::<Tracer>::fixture("Broken")
            .constructor(|| -> anyhow::Result<Tracer> { anyhow::bail!("no config") })
            .test("a", |_: &mut Tracer| {})
            .test("b", |_: &mut Tracer| {})
            .build();
        let module = ModuleBuilder::new("broken").with_type(def).build();
        let fixture = discover_fixtures(&module).remove(0);

        let mut state = RunState::default();
        let mut reporter = capture();
        TestExecutor::new(LifecyclePolicy::Propagate, &mut state, &mut reporter)
            .run_fixture(&fixture)
            .unwrap();

        assert_eq!(state.total_tests_run, 2);
        assert_eq!(state.total_tests_failed, 2);
        assert!(state.records.is_empty());
        assert_eq!(state.fixture_errors.len(), 1);
        assert_eq!(state.fixture_errors[0].report.message, "no config");
    }
}
