//! 考试后端契约
//!
//! 传输方式不在这里约定；会话认证信息由具体实现自行携带。

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{
    CapturedFrame, FrameAnalysis, OptionKey, ProhibitedAction, QuestionContent, QuestionId,
    SessionBootstrap,
};

/// 考试后端
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// 获取题目顺序、已保存答案与剩余时间
    async fn fetch_question_sequence(
        &self,
        session_id: &str,
    ) -> Result<SessionBootstrap, TransportError>;

    /// 获取单题内容
    async fn fetch_question_content(
        &self,
        session_id: &str,
        question_id: &QuestionId,
    ) -> Result<QuestionContent, TransportError>;

    /// 保存一道题的答案
    async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &QuestionId,
        option: OptionKey,
    ) -> Result<(), TransportError>;

    /// 同步剩余时间
    async fn push_remaining_time(&self, session_id: &str, seconds: i64)
        -> Result<(), TransportError>;

    /// 发送一帧画面做违规检测
    async fn analyze_frame(
        &self,
        session_id: &str,
        frame: &CapturedFrame,
    ) -> Result<FrameAnalysis, TransportError>;

    /// 标记考试完成；重复调用是安全的
    async fn complete_session(&self, session_id: &str) -> Result<(), TransportError>;

    /// 上报页面违规操作
    async fn report_prohibited_action(
        &self,
        session_id: &str,
        action: ProhibitedAction,
    ) -> Result<(), TransportError>;
}
