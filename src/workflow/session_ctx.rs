//! 考试会话上下文
//!
//! 封装"我正在进行哪一场考试"这一信息

use std::fmt::Display;

/// 考试会话上下文
#[derive(Debug, Clone)]
pub struct SessionCtx {
    /// 考试ID（后端的 test id）
    pub session_id: String,
}

impl SessionCtx {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

impl Display for SessionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[考试 {}]", self.session_id)
    }
}
