//! 考试页面解析
//!
//! 考试页面把剩余时间写在 `#time` 元素里，把之前保存的答案写进脚本全局变量
//! `answers`（模板转义过的 JSON 字符串，或直接是对象字面量）。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bid\s*=\s*["']time["'][^>]*>\s*([^<]*?)\s*<"#)
        .expect("time pattern is valid")
});

static ANSWERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\banswers\s*=\s*(?:"([^"]*)"|'([^']*)'|(\{[^;\n]*\}))"#)
        .expect("answers pattern is valid")
});

/// 从考试页面读出的会话状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamPage {
    /// `#time` 元素的文本（秒数或 `HH:MM:SS`）
    pub time_left: Option<String>,
    /// 之前保存的答案
    pub answers: Option<Value>,
}

/// 解析考试页面 HTML
///
/// 找不到或无法解析的字段为 `None`。
pub fn parse_exam_page(html: &str) -> ExamPage {
    let time_left = TIME_RE
        .captures(html)
        .map(|caps| unescape_html(caps[1].trim()))
        .filter(|text| !text.is_empty());

    let answers = ANSWERS_RE.captures(html).and_then(|caps| {
        let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
        let text = unescape_html(raw.as_str());
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("页面中的答案无法解析，忽略: {}", e);
                None
            }
        }
    });

    ExamPage { time_left, answers }
}

/// 还原模板转义的字符，`&amp;` 最后处理
fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
