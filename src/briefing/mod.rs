//! Briefing sessions: a guided interview that ends in a structured press
//! briefing, reviewed and then sent to the newsroom spreadsheet.

pub mod controller;
pub mod export;
pub mod interviewer;
pub mod model;
pub mod prompts;
pub mod routes;
pub mod state;

pub use controller::{Notice, NoticeKind, Outcome, Rejection, SessionController, SessionSnapshot};
pub use interviewer::{Interviewer, LlmInterviewer};
pub use model::{BriefingRecord, SessionId, Speaker, Transcript, Turn};
pub use routes::{
    BriefingRouteState, ControllerFactory, SessionRegistry, briefing_routes, spawn_sweep_task,
};
pub use state::SessionPhase;
