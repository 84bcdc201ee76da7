use std::time::Duration;

/// 格式化运行耗时为 `HH:MM:SS.hh`（百分之一秒）
///
/// 小时数超过 99 时按实际位数输出。
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let hundredths = elapsed.subsec_millis() / 10;

    format!(
        "{:02}:{:02}:{:02}.{:02}",
        hours, minutes, seconds, hundredths
    )
}

/// 成功率，固定两位小数
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}", percent)
}
