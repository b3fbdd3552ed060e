//! The briefing session state machine.
//!
//! Owns the phase, transcript and extracted record of one session and
//! sequences the calls to the interviewer and the spreadsheet sink.
//! Collaborator failures never escape: they become scripted turns,
//! rollbacks, or notices on the snapshot.
//!
//! Every collaborator call is issued under the session generation current
//! at the time. `start` and `reset` bump the generation, so a result that
//! comes back afterwards is dropped instead of being applied to the new
//! session.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ExtractionError, SinkError};
use crate::sink::SpreadsheetSink;

use super::export;
use super::interviewer::Interviewer;
use super::model::{BriefingRecord, SessionId, Speaker, Transcript, Turn};
use super::prompts::{FALLBACK_APOLOGY, FALLBACK_GREETING};
use super::state::SessionPhase;

/// Why an event was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The respondent text was blank.
    EmptyText,
    /// A collaborator call for this session is still outstanding.
    CallPending,
    /// The event does not apply in the current phase.
    InvalidPhase { phase: SessionPhase },
    /// There is nothing to extract from.
    EmptyTranscript,
    /// The record was already dispatched.
    AlreadySubmitted,
}

/// Result of a controller event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The event ran and the collaborator answered.
    Applied,
    /// The collaborator failed and a scripted turn stood in for its reply.
    Degraded,
    /// Extraction failed; the session went back to interviewing.
    RolledBack,
    /// Submission failed; the record is kept for a retry.
    Failed,
    /// The session was reset or restarted while the call was in flight.
    Superseded,
    /// The event was ignored without side effects.
    Rejected(Rejection),
}

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    ExtractionFailed,
    SubmitFailed,
    Submitted,
}

/// User-facing message produced by the last event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn extraction_failed() -> Self {
        Self {
            kind: NoticeKind::ExtractionFailed,
            message: "Erro ao gerar o relatório. Por favor, tente novamente.".to_string(),
        }
    }

    fn submit_failed(err: &SinkError) -> Self {
        let message = match err {
            SinkError::NotConfigured => {
                "Erro de configuração: URL da planilha não definida.".to_string()
            }
            _ => "Houve um problema ao tentar enviar. Verifique a conexão ou a configuração da planilha."
                .to_string(),
        };
        Self {
            kind: NoticeKind::SubmitFailed,
            message,
        }
    }

    fn submitted() -> Self {
        Self {
            kind: NoticeKind::Submitted,
            message: "Pauta enviada para a ASCOM.".to_string(),
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub transcript: Vec<Turn>,
    pub record: Option<BriefingRecord>,
    pub pending_call: bool,
    pub submitted: bool,
    pub notice: Option<Notice>,
}

/// Generation a collaborator call was issued under.
#[derive(Debug, Clone, Copy)]
struct CallTicket {
    session: SessionId,
    generation: u64,
}

struct SessionState {
    session: SessionId,
    generation: u64,
    phase: SessionPhase,
    transcript: Transcript,
    record: Option<BriefingRecord>,
    pending: bool,
    notice: Option<Notice>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            session: Uuid::new_v4(),
            generation: 0,
            phase: SessionPhase::Idle,
            transcript: Transcript::new(),
            record: None,
            pending: false,
            notice: None,
        }
    }

    /// Discard everything and invalidate outstanding calls.
    fn reset(&mut self) {
        self.generation += 1;
        self.session = Uuid::new_v4();
        self.phase = SessionPhase::Idle;
        self.transcript.clear();
        self.record = None;
        self.pending = false;
        self.notice = None;
    }

    fn issue_call(&mut self) -> CallTicket {
        self.pending = true;
        CallTicket {
            session: self.session,
            generation: self.generation,
        }
    }

    /// Clear the pending flag if `ticket` is still current.
    fn settle(&mut self, ticket: CallTicket) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                session_id = %ticket.session,
                stale_generation = ticket.generation,
                generation = self.generation,
                "Discarding result from a superseded call"
            );
            return false;
        }
        self.pending = false;
        true
    }

    fn transition(&mut self, target: SessionPhase) {
        debug_assert!(
            self.phase.can_transition_to(target),
            "invalid transition {} -> {}",
            self.phase,
            target
        );
        debug_assert_eq!(
            self.record.is_some(),
            target.holds_record(),
            "record presence does not match phase {}",
            target
        );
        tracing::info!(
            session_id = %self.session,
            from = %self.phase,
            to = %target,
            turns = self.transcript.len(),
            "Session phase changed"
        );
        self.phase = target;
    }
}

/// Drives one briefing session.
pub struct SessionController {
    interviewer: Arc<dyn Interviewer>,
    sink: Arc<dyn SpreadsheetSink>,
    state: RwLock<SessionState>,
}

impl SessionController {
    pub fn new(interviewer: Arc<dyn Interviewer>, sink: Arc<dyn SpreadsheetSink>) -> Self {
        Self {
            interviewer,
            sink,
            state: RwLock::new(SessionState::new()),
        }
    }

    pub async fn session_id(&self) -> SessionId {
        self.state.read().await.session
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            session_id: state.session,
            phase: state.phase,
            transcript: state.transcript.turns().to_vec(),
            record: state.record.clone(),
            pending_call: state.pending,
            submitted: state.phase == SessionPhase::Submitted,
            notice: state.notice.clone(),
        }
    }

    /// CSV rendering of the record, if one has been extracted.
    pub async fn export_csv(&self) -> Option<String> {
        self.state.read().await.record.as_ref().map(export::to_csv)
    }

    /// Start a fresh interview. Any previous session state is discarded.
    ///
    /// Always ends in `Interviewing` with one interviewer turn: the model's
    /// opening line, or the scripted greeting if the model fails.
    pub async fn start(&self) -> Outcome {
        let ticket = {
            let mut state = self.state.write().await;
            state.reset();
            state.transition(SessionPhase::Interviewing);
            state.issue_call()
        };

        let result = self.interviewer.begin_conversation(ticket.session).await;

        let mut state = self.state.write().await;
        if !state.settle(ticket) {
            return Outcome::Superseded;
        }

        let opened = match result {
            Ok(opening) => state.transcript.push(Speaker::Interviewer, opening),
            Err(e) => {
                tracing::warn!(session_id = %ticket.session, "Opening the interview failed: {}", e);
                false
            }
        };
        if opened {
            Outcome::Applied
        } else {
            state.transcript.push(Speaker::Interviewer, FALLBACK_GREETING);
            Outcome::Degraded
        }
    }

    /// Record the respondent's answer and fetch the interviewer's reply.
    ///
    /// Ignored for blank text, outside `Interviewing`, or while another call
    /// is outstanding. Otherwise appends exactly one respondent turn followed
    /// by exactly one interviewer turn (the scripted apology on failure).
    pub async fn submit_user_turn(&self, text: &str) -> Outcome {
        let text = text.trim();
        let ticket = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::Interviewing {
                return Outcome::Rejected(Rejection::InvalidPhase { phase: state.phase });
            }
            if text.is_empty() {
                return Outcome::Rejected(Rejection::EmptyText);
            }
            if state.pending {
                return Outcome::Rejected(Rejection::CallPending);
            }
            state.notice = None;
            state.transcript.push(Speaker::Respondent, text);
            state.issue_call()
        };

        let result = self
            .interviewer
            .continue_conversation(ticket.session, text)
            .await;

        let mut state = self.state.write().await;
        if !state.settle(ticket) {
            return Outcome::Superseded;
        }

        let replied = match result {
            Ok(reply) => state.transcript.push(Speaker::Interviewer, reply),
            Err(e) => {
                tracing::warn!(session_id = %ticket.session, "Interviewer reply failed: {}", e);
                false
            }
        };
        if replied {
            Outcome::Applied
        } else {
            state.transcript.push(Speaker::Interviewer, FALLBACK_APOLOGY);
            Outcome::Degraded
        }
    }

    /// End the interview and extract the structured record.
    ///
    /// On success the session moves to `Reviewing`; on any failure it rolls
    /// back to `Interviewing` with the transcript untouched and a notice set.
    pub async fn finish(&self) -> Outcome {
        let (ticket, transcript_text) = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::Interviewing {
                return Outcome::Rejected(Rejection::InvalidPhase { phase: state.phase });
            }
            if state.pending {
                return Outcome::Rejected(Rejection::CallPending);
            }
            if state.transcript.is_empty() {
                return Outcome::Rejected(Rejection::EmptyTranscript);
            }
            state.notice = None;
            state.transition(SessionPhase::Extracting);
            (state.issue_call(), state.transcript.linearize())
        };

        let result = self
            .interviewer
            .extract(&transcript_text)
            .await
            .and_then(|record| {
                if record.is_complete() {
                    Ok(record)
                } else {
                    Err(ExtractionError::MissingFields(record.missing_required_fields()))
                }
            });

        let mut state = self.state.write().await;
        if !state.settle(ticket) {
            return Outcome::Superseded;
        }

        match result {
            Ok(record) => {
                state.record = Some(record);
                state.transition(SessionPhase::Reviewing);
                Outcome::Applied
            }
            Err(e) => {
                tracing::warn!(session_id = %ticket.session, "Briefing extraction failed: {}", e);
                state.notice = Some(Notice::extraction_failed());
                state.transition(SessionPhase::Interviewing);
                Outcome::RolledBack
            }
        }
    }

    /// Send the record to the spreadsheet sink.
    ///
    /// Dispatches at most once per successful submission; later calls are
    /// rejected. A failed dispatch keeps the record so it can be retried.
    pub async fn submit(&self) -> Outcome {
        let (ticket, record) = {
            let mut state = self.state.write().await;
            match state.phase {
                SessionPhase::Reviewing => {}
                SessionPhase::Submitted => {
                    return Outcome::Rejected(Rejection::AlreadySubmitted);
                }
                phase => return Outcome::Rejected(Rejection::InvalidPhase { phase }),
            }
            if state.pending {
                return Outcome::Rejected(Rejection::CallPending);
            }
            let Some(record) = state.record.clone() else {
                return Outcome::Rejected(Rejection::InvalidPhase { phase: state.phase });
            };
            state.notice = None;
            (state.issue_call(), record)
        };

        let result = self.sink.persist(&record).await;

        let mut state = self.state.write().await;
        if !state.settle(ticket) {
            return Outcome::Superseded;
        }

        match result {
            Ok(dispatched) => {
                tracing::debug!(session_id = %ticket.session, status = ?dispatched.status, "Record dispatched");
                state.notice = Some(Notice::submitted());
                state.transition(SessionPhase::Submitted);
                Outcome::Applied
            }
            Err(e) => {
                tracing::warn!(session_id = %ticket.session, "Submitting the briefing failed: {}", e);
                state.notice = Some(Notice::submit_failed(&e));
                Outcome::Failed
            }
        }
    }

    /// Discard the session and return to `Idle`. Valid from every phase.
    pub async fn reset(&self) -> Outcome {
        let mut state = self.state.write().await;
        let previous = state.phase;
        state.reset();
        tracing::info!(session_id = %state.session, from = %previous, "Session reset");
        Outcome::Applied
    }
}
