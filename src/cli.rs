use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Table};

use markrun::config::{ConfigLoader, RunnerConfig};
use markrun::discovery::discover_fixtures;
use markrun::module::Module;
use markrun::runner::{LifecyclePolicy, TestRunner};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 发现并运行全部测试（默认）
    Run(RunArgs),
    /// 列出发现的 fixture 与测试，不执行
    List {
        /// 配置文件路径，默认自动查找 markrun.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// 配置文件路径，默认自动查找 markrun.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 关闭彩色输出
    #[arg(long)]
    pub no_color: bool,

    /// setup/teardown 失败记为测试失败，而不是中止运行
    #[arg(long)]
    pub record_lifecycle_failures: bool,

    /// 有测试失败时以非零码退出
    #[arg(long)]
    pub strict: bool,
}

/// 加载配置：显式路径优先，否则自动查找，最后用默认值
pub fn load_config(path: Option<&PathBuf>) -> Result<RunnerConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::find_and_load()?.unwrap_or_default(),
    };
    Ok(config)
}

fn apply_overrides(mut config: RunnerConfig, args: &RunArgs) -> RunnerConfig {
    if args.no_color {
        config.color = false;
    }
    if args.record_lifecycle_failures {
        config.lifecycle_failures = LifecyclePolicy::Record;
    }
    if args.strict {
        config.fail_on_test_failure = true;
    }
    config
}

pub fn run(module: Module, args: RunArgs) -> Result<ExitCode> {
    let config = apply_overrides(load_config(args.config.as_ref())?, &args);
    markrun::logger::init_logger(&config.log_level);

    let fail_on_test_failure = config.fail_on_test_failure;
    let mut runner = TestRunner::with_config(module, config);

    if let Err(e) = runner.run() {
        tracing::error!(error = %e, "test run aborted");
        eprintln!("Test run aborted: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    runner.print_summary()?;

    if fail_on_test_failure && runner.total_tests_failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

pub fn list(module: Module, config: Option<PathBuf>) -> Result<ExitCode> {
    let config = load_config(config.as_ref())?;
    markrun::logger::init_logger(&config.log_level);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Fixture", "Setup", "Teardown", "Tests"]);

    for fixture in discover_fixtures(&module) {
        let tests: Vec<&str> = fixture.tests.iter().map(|t| t.name()).collect();
        let optional = |m: Option<&markrun::discovery::MethodRef>| match m {
            Some(m) => Cell::new(m.name()),
            None => Cell::new("-").add_attribute(Attribute::Dim),
        };

        table.add_row(vec![
            Cell::new(&fixture.name).add_attribute(Attribute::Bold),
            optional(fixture.setup.as_ref()),
            optional(fixture.teardown.as_ref()),
            Cell::new(tests.join("\n")),
        ]);
    }

    println!("{}", table);
    Ok(ExitCode::SUCCESS)
}
