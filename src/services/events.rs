//! 后台任务与会话控制器之间的消息
//!
//! 计时器和监考循环只通过这里的事件向控制器汇报，不共享可变状态。

use tokio::sync::mpsc;

/// 计时器事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// 每秒一次，携带新的剩余秒数与显示文本
    Tick { remaining_seconds: i64, display: String },
    /// 倒计时结束（每次启动最多一次）
    Expired,
}

/// 监考事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// 一批违规（计数按批次累加）
    Violation {
        violations: Vec<String>,
        count: u32,
        threshold: u32,
    },
    /// 强制终止考试
    Terminated { reason: String },
}

/// 控制器消费的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Timer(TimerEvent),
    Monitor(MonitorEvent),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// 创建事件通道
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
