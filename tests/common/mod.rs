//! 集成测试共用的 mock 后端与 mock 摄像头
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use exam_proctor::error::{CaptureError, TransportError};
use exam_proctor::models::{
    CapturedFrame, FrameAnalysis, OptionKey, ProhibitedAction, QuestionContent, QuestionId,
    SessionBootstrap,
};
use exam_proctor::services::FrameSource;
use exam_proctor::ExamBackend;

/// 后端收到的调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchSequence,
    FetchContent(String),
    Submit(String, OptionKey),
    PushTime(i64),
    Analyze,
    Complete,
    Report(ProhibitedAction),
}

/// 可编排的 mock 后端
pub struct MockBackend {
    question_ids: Vec<QuestionId>,
    prior_answers: Option<Value>,
    time_left: Option<Value>,
    analyze_script: Mutex<VecDeque<Option<FrameAnalysis>>>,
    analyze_delay: Duration,
    failing_submits: Mutex<HashSet<String>>,
    fail_time_push: AtomicBool,
    fail_complete: AtomicBool,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBackend {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            question_ids: ids.iter().map(|id| QuestionId::new(*id)).collect(),
            prior_answers: None,
            time_left: Some(Value::from(600)),
            analyze_script: Mutex::new(VecDeque::new()),
            analyze_delay: Duration::ZERO,
            failing_submits: Mutex::new(HashSet::new()),
            fail_time_push: AtomicBool::new(false),
            fail_complete: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_prior_answers(mut self, answers: Value) -> Self {
        self.prior_answers = Some(answers);
        self
    }

    pub fn with_time_left(mut self, time_left: Value) -> Self {
        self.time_left = Some(time_left);
        self
    }

    /// 按顺序返回的分析结果，`None` 表示这一次传输失败；用完后一律返回无违规
    pub fn with_analyses(self, script: Vec<Option<FrameAnalysis>>) -> Self {
        *self.analyze_script.lock().unwrap() = script.into();
        self
    }

    pub fn with_analyze_delay(mut self, delay: Duration) -> Self {
        self.analyze_delay = delay;
        self
    }

    pub fn fail_submit_for(&self, question_id: &str) {
        self.failing_submits
            .lock()
            .unwrap()
            .insert(question_id.to_string());
    }

    pub fn allow_submit_for(&self, question_id: &str) {
        self.failing_submits.lock().unwrap().remove(question_id);
    }

    pub fn fail_time_push(&self) {
        self.fail_time_push.store(true, Ordering::SeqCst);
    }

    pub fn fail_complete(&self) {
        self.fail_complete.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExamBackend for MockBackend {
    async fn fetch_question_sequence(
        &self,
        _session_id: &str,
    ) -> Result<SessionBootstrap, TransportError> {
        self.record(Call::FetchSequence);
        Ok(SessionBootstrap {
            question_ids: self.question_ids.clone(),
            prior_answers: self.prior_answers.clone(),
            time_left: self.time_left.clone(),
        })
    }

    async fn fetch_question_content(
        &self,
        _session_id: &str,
        question_id: &QuestionId,
    ) -> Result<QuestionContent, TransportError> {
        self.record(Call::FetchContent(question_id.to_string()));
        Ok(QuestionContent {
            prompt: format!("题目 {}", question_id),
            a: "选项一".to_string(),
            b: "选项二".to_string(),
            c: "选项三".to_string(),
            d: "选项四".to_string(),
            max_marks: Value::from(4),
        })
    }

    async fn submit_answer(
        &self,
        _session_id: &str,
        question_id: &QuestionId,
        option: OptionKey,
    ) -> Result<(), TransportError> {
        self.record(Call::Submit(question_id.to_string(), option));
        if self
            .failing_submits
            .lock()
            .unwrap()
            .contains(question_id.as_str())
        {
            return Err(TransportError::rejected("mark", "mock submit failure"));
        }
        Ok(())
    }

    async fn push_remaining_time(
        &self,
        _session_id: &str,
        seconds: i64,
    ) -> Result<(), TransportError> {
        self.record(Call::PushTime(seconds));
        if self.fail_time_push.load(Ordering::SeqCst) {
            return Err(TransportError::rejected("time", "mock time failure"));
        }
        Ok(())
    }

    async fn analyze_frame(
        &self,
        _session_id: &str,
        _frame: &CapturedFrame,
    ) -> Result<FrameAnalysis, TransportError> {
        self.record(Call::Analyze);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.analyze_delay.is_zero() {
            tokio::time::sleep(self.analyze_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.analyze_script.lock().unwrap().pop_front() {
            Some(Some(analysis)) => Ok(analysis),
            Some(None) => Err(TransportError::rejected("video_feed", "mock analyze failure")),
            None => Ok(FrameAnalysis::default()),
        }
    }

    async fn complete_session(&self, _session_id: &str) -> Result<(), TransportError> {
        self.record(Call::Complete);
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(TransportError::rejected("completed", "mock complete failure"));
        }
        Ok(())
    }

    async fn report_prohibited_action(
        &self,
        _session_id: &str,
        action: ProhibitedAction,
    ) -> Result<(), TransportError> {
        self.record(Call::Report(action));
        Ok(())
    }
}

/// 分析结果：违规警告
pub fn warning(violations: &[&str]) -> Option<FrameAnalysis> {
    Some(FrameAnalysis {
        status: Some("warning_popup".to_string()),
        alerts: Some(violations.iter().map(|v| v.to_string()).collect()),
        ..FrameAnalysis::default()
    })
}

/// 分析结果：立即终止
pub fn terminate(reason: Option<&str>) -> Option<FrameAnalysis> {
    Some(FrameAnalysis {
        status: Some("terminate".to_string()),
        message: reason.map(|r| r.to_string()),
        ..FrameAnalysis::default()
    })
}

/// 记录采集与释放次数的 mock 摄像头
#[derive(Default)]
pub struct MockFrameSource {
    captures: AtomicUsize,
    releases: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceUnavailable("mock camera off".to_string()));
        }
        Ok(CapturedFrame {
            encoded: "aGVsbG8=".to_string(),
            audio_level: Some(12.5),
        })
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
