use serde::{Deserialize, Serialize};

use crate::models::question::QuestionId;
use crate::utils::clock::parse_clock;

/// 会话启动时从后端获取的数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionBootstrap {
    /// 有序题目列表
    pub question_ids: Vec<QuestionId>,
    /// 之前保存的答案（原始 JSON，key 为 0-based 题目下标）
    pub prior_answers: Option<serde_json::Value>,
    /// 剩余时间（秒数或 `HH:MM:SS` 文本）
    pub time_left: Option<serde_json::Value>,
}

impl SessionBootstrap {
    /// 解析剩余秒数，无法解析时为 0
    pub fn remaining_seconds(&self) -> i64 {
        match &self.time_left {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(serde_json::Value::String(s)) => parse_clock(s).unwrap_or(0),
            _ => 0,
        }
    }
}

/// 一帧摄像头画面
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// base64 编码的 JPEG
    pub encoded: String,
    /// 麦克风音量（可选）
    pub audio_level: Option<f64>,
}

/// 页面上的违规操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProhibitedAction {
    Copy,
    Cut,
    Paste,
    ContextMenu,
    PrintScreen,
    FocusLost,
}

impl ProhibitedAction {
    /// 上报给后端的描述
    pub fn details(self) -> &'static str {
        match self {
            ProhibitedAction::Copy => "Prohibited Action: COPY",
            ProhibitedAction::Cut => "Prohibited Action: CUT",
            ProhibitedAction::Paste => "Prohibited Action: PASTE",
            ProhibitedAction::ContextMenu => "Prohibited Action: Right Click (Context Menu)",
            ProhibitedAction::PrintScreen => "Prohibited Action: Screenshot (PrintScreen)",
            ProhibitedAction::FocusLost => "Tab Switch / Window Focus Lost",
        }
    }
}
