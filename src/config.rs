use crate::Result;
use crate::error::MarkrunError;
use crate::runner::types::LifecyclePolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 运行配置，所有字段都有默认值
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 控制台输出是否着色
    pub color: bool,

    /// fixture 之间分隔线的宽度
    pub divider_width: usize,

    /// setup/teardown 失败的处理方式
    pub lifecycle_failures: LifecyclePolicy,

    /// 有测试失败时进程以非零码退出
    pub fail_on_test_failure: bool,

    /// RUST_LOG 未设置时的日志级别
    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            color: true,
            divider_width: 119,
            lifecycle_failures: LifecyclePolicy::default(),
            fail_on_test_failure: false,
            log_level: "warn".to_string(),
        }
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "markrun.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<RunnerConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MarkrunError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<RunnerConfig> {
        Ok(toml::from_str(content)?)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/markrun/
    ///
    /// 找不到时返回 Ok(None)；找到但解析失败时返回错误。
    pub fn find_and_load() -> Result<Option<RunnerConfig>> {
        if let Ok(current) = std::env::current_dir()
            && let Some(config) = Self::search_upwards(&current)?
        {
            return Ok(Some(config));
        }

        Self::try_load_from_user_dir()
    }

    /// 从 `start` 开始向上逐级查找
    pub fn search_upwards(start: &Path) -> Result<Option<RunnerConfig>> {
        let mut current = start.to_path_buf();

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.is_file() {
                tracing::debug!(path = %config_path.display(), "loading config");
                return Self::load_from_path(&config_path).map(Some);
            }

            // 尝试父目录
            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// 尝试从用户配置目录加载
    fn try_load_from_user_dir() -> Result<Option<RunnerConfig>> {
        let Some(home) = dirs::home_dir() else {
            return Ok(None);
        };
        let config_path = home.join(".config").join("markrun").join(Self::CONFIG_FILE);

        if config_path.is_file() {
            Self::load_from_path(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }
}
