pub mod executor;
pub mod reporter;
pub mod test_runner;
pub mod types;

pub use executor::TestExecutor;
pub use reporter::TestReporter;
pub use test_runner::TestRunner;
pub use types::{
    FailureReport, LifecyclePhase, LifecyclePolicy, TestOutcome, TestRecord, TestSummary,
};
