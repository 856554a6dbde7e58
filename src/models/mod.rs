pub mod detection;
pub mod question;
pub mod session;

pub use detection::{AnalysisVerdict, FrameAnalysis};
pub use question::{AnswerState, AnswerStatus, GridMark, OptionKey, QuestionContent, QuestionId};
pub use session::{CapturedFrame, ProhibitedAction, SessionBootstrap};
