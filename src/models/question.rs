use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 后端下发的题目 ID（不透明）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单选题选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

    /// 提交给后端的取值
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::A => "a",
            OptionKey::B => "b",
            OptionKey::C => "c",
            OptionKey::D => "d",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(OptionKey::A),
            "b" => Ok(OptionKey::B),
            "c" => Ok(OptionKey::C),
            "d" => Ok(OptionKey::D),
            other => Err(ValidationError::UnknownOption(other.to_string())),
        }
    }
}

/// 作答状态
///
/// 已提交（`Submitted*`）后只能切换书签位，不会回退到未作答/已选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerStatus {
    NotMarked,
    /// 已选择但未提交
    Marked,
    Bookmarked,
    MarkedBookmarked,
    Submitted,
    SubmittedBookmarked,
}

impl AnswerStatus {
    pub fn is_submitted(self) -> bool {
        matches!(self, AnswerStatus::Submitted | AnswerStatus::SubmittedBookmarked)
    }

    pub fn is_bookmarked(self) -> bool {
        matches!(
            self,
            AnswerStatus::Bookmarked
                | AnswerStatus::MarkedBookmarked
                | AnswerStatus::SubmittedBookmarked
        )
    }

    /// 切换书签位
    pub fn toggled_bookmark(self) -> Self {
        match self {
            AnswerStatus::Marked => AnswerStatus::MarkedBookmarked,
            AnswerStatus::MarkedBookmarked => AnswerStatus::Marked,
            AnswerStatus::Submitted => AnswerStatus::SubmittedBookmarked,
            AnswerStatus::SubmittedBookmarked => AnswerStatus::Submitted,
            AnswerStatus::Bookmarked => AnswerStatus::NotMarked,
            AnswerStatus::NotMarked => AnswerStatus::Bookmarked,
        }
    }

    /// 题号面板上的显示分类
    pub fn grid_mark(self) -> GridMark {
        match self {
            AnswerStatus::NotMarked => GridMark::Unvisited,
            AnswerStatus::Submitted => GridMark::Answered,
            AnswerStatus::Bookmarked | AnswerStatus::SubmittedBookmarked => GridMark::Bookmarked,
            AnswerStatus::Marked | AnswerStatus::MarkedBookmarked => GridMark::Pending,
        }
    }
}

/// 题号面板分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMark {
    /// 未作答
    Unvisited,
    /// 已提交
    Answered,
    /// 带书签
    Bookmarked,
    /// 已选择未提交
    Pending,
}

impl GridMark {
    /// 终端显示用的单字符标记
    pub fn symbol(self) -> char {
        match self {
            GridMark::Unvisited => '·',
            GridMark::Answered => '✓',
            GridMark::Bookmarked => '★',
            GridMark::Pending => '!',
        }
    }
}

/// 单题作答状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerState {
    pub selected: Option<OptionKey>,
    pub status: AnswerStatus,
    /// 后端最近一次确认保存的选项
    pub synced: Option<OptionKey>,
}

impl AnswerState {
    /// 当前选择尚未被后端保存
    pub fn is_unsynced(&self) -> bool {
        self.selected.is_some() && self.selected != self.synced
    }
}

impl Default for AnswerState {
    fn default() -> Self {
        Self {
            selected: None,
            status: AnswerStatus::NotMarked,
            synced: None,
        }
    }
}

/// 题目内容（由后端渲染所需的原始数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    /// 题干
    #[serde(rename = "q")]
    pub prompt: String,
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
    /// 满分
    #[serde(rename = "marks", default)]
    pub max_marks: serde_json::Value,
}

impl QuestionContent {
    /// 按顺序返回四个选项
    pub fn options(&self) -> [(OptionKey, &str); 4] {
        [
            (OptionKey::A, self.a.as_str()),
            (OptionKey::B, self.b.as_str()),
            (OptionKey::C, self.c.as_str()),
            (OptionKey::D, self.d.as_str()),
        ]
    }

    /// 满分文本（后端可能返回数字或字符串）
    pub fn max_marks_text(&self) -> String {
        match &self.max_marks {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        }
    }
}
