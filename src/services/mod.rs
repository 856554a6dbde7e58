pub mod events;
pub mod frame_source;
pub mod monitoring_loop;
pub mod question_store;
pub mod timer_engine;
pub mod violation_journal;

pub use events::{EventReceiver, EventSender, MonitorEvent, SessionEvent, TimerEvent};
pub use frame_source::{BrowserFrameSource, FrameSource};
pub use monitoring_loop::{MonitorPhase, MonitorSettings, MonitoringLoop, ViolationState};
pub use question_store::{Counters, PendingAnswer, QuestionStore, SubmitTicket};
pub use timer_engine::{TimerEngine, TimerPhase, TimerSettings, TimerState};
pub use violation_journal::ViolationJournal;
