//! Briefing Assist: interview a staff member and turn the conversation
//! into a structured press briefing.

pub mod briefing;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod sink;
