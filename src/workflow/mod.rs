pub mod session_controller;
pub mod session_ctx;

pub use session_controller::{
    ControllerSettings, EventOutcome, FinishReport, FinishTrigger, QuestionView,
    SessionController, TeardownReport,
};
pub use session_ctx::SessionCtx;
