//! 倒计时显示格式
//!
//! 显示为 `HH:MM:SS`，小时为 0 时显示 `MM:SS`。

use std::sync::LazyLock;

use regex::Regex;

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+):(\d{1,2})(?::(\d{1,2}))?\s*$").expect("clock pattern is valid")
});

/// 把秒数格式化为倒计时文本，负数按 0 处理
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours == 0 {
        format!("{:02}:{:02}", minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

/// 解析剩余时间文本
///
/// 接受 `HH:MM:SS`、`MM:SS` 或纯秒数（忽略非数字字符）。
/// 无法解析或数值溢出时返回 `None`。
pub fn parse_clock(text: &str) -> Option<i64> {
    if let Some(caps) = CLOCK_RE.captures(text) {
        let first: i64 = caps[1].parse().ok()?;
        let second: i64 = caps[2].parse().ok()?;
        return match caps.get(3) {
            Some(third) => {
                let third: i64 = third.as_str().parse().ok()?;
                first
                    .checked_mul(3600)?
                    .checked_add(second * 60)?
                    .checked_add(third)
            }
            None => first.checked_mul(60)?.checked_add(second),
        };
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
