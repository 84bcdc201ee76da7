use tracing_subscriber::{EnvFilter, fmt};

/// 初始化日志系统
///
/// 支持通过 RUST_LOG 环境变量控制日志级别，未设置时使用 `default_level`。
/// 日志写到 stderr，测试报告独占 stdout。
///
/// 示例:
/// - RUST_LOG=debug markrun
/// - RUST_LOG=markrun::discovery=trace markrun list
pub fn init_logger(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: 测试中可能被重复调用
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    tracing::debug!("Logger initialized");
}
