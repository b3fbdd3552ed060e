//! Transcript and structured-record data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one briefing session. Regenerated on every start and reset.
pub type SessionId = Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Interviewer,
    Respondent,
}

impl Speaker {
    /// Label used when the transcript is linearized for extraction.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Interviewer => "INTERVIEWER",
            Self::Respondent => "RESPONDENT",
        }
    }
}

/// One utterance in the interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn. Returns `None` for blank text.
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            speaker,
            text,
            created_at: Utc::now(),
        })
    }
}

/// Ordered, append-only history of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn; blank text is dropped. Returns whether a turn was added.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> bool {
        match Turn::new(speaker, text) {
            Some(turn) => {
                self.turns.push(turn);
                true
            }
            None => false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render as `"<LABEL>: <text>"` lines in order, for the extraction prompt.
    pub fn linearize(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The structured briefing extracted from an interview.
///
/// Serialized keys are the spreadsheet column names the sink expects.
/// Every field is a plain string; absent values deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefingRecord {
    // Contact
    #[serde(rename = "servidor_nome")]
    pub respondent_name: String,
    #[serde(rename = "servidor_cargo")]
    pub respondent_role: String,
    #[serde(rename = "servidor_telefone")]
    pub respondent_phone: String,

    // Quote
    /// "Sim" or "Não".
    #[serde(rename = "aspas_sim_nao")]
    pub has_quote: String,
    /// Name and role of whoever gives the statement.
    #[serde(rename = "aspas_quem_fala")]
    pub quote_speaker: String,

    // 5W2H
    #[serde(rename = "o_que")]
    pub what: String,
    #[serde(rename = "quem")]
    pub who: String,
    #[serde(rename = "como")]
    pub how: String,
    #[serde(rename = "quando")]
    pub when: String,
    #[serde(rename = "por_que")]
    pub why: String,
    #[serde(rename = "para_quem")]
    pub for_whom: String,
    #[serde(rename = "objetivos_esperados")]
    pub expected_outcomes: String,
    #[serde(rename = "riscos_nao_execucao")]
    pub risks_if_not_done: String,
    #[serde(rename = "observacoes_adicionais")]
    pub additional_notes: String,

    /// Newsroom-only article draft written by the extraction call.
    #[serde(rename = "sugestao_materia")]
    pub draft_article: String,
}

impl BriefingRecord {
    /// Wire keys of the fields that must be non-blank.
    pub const REQUIRED_FIELDS: [&'static str; 5] =
        ["servidor_nome", "o_que", "quem", "quando", "como"];

    /// Wire keys of required fields that are blank.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let values = [
            &self.respondent_name,
            &self.what,
            &self.who,
            &self.when,
            &self.how,
        ];
        Self::REQUIRED_FIELDS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record() -> BriefingRecord {
        BriefingRecord {
            respondent_name: "João Silva".to_string(),
            what: "Mutirão de atendimento".to_string(),
            who: "Cartório da 1ª Zona".to_string(),
            how: "Atendimento presencial".to_string(),
            when: "10/03, das 8h às 18h".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_turns_are_rejected() {
        assert!(Turn::new(Speaker::Respondent, "   ").is_none());
        assert!(Turn::new(Speaker::Respondent, "").is_none());
        let turn = Turn::new(Speaker::Interviewer, "Olá").unwrap();
        assert_eq!(turn.speaker, Speaker::Interviewer);
        assert_eq!(turn.text, "Olá");
    }

    #[test]
    fn turn_ids_are_unique() {
        let a = Turn::new(Speaker::Respondent, "a").unwrap();
        let b = Turn::new(Speaker::Respondent, "a").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn transcript_linearizes_in_order() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::Interviewer, "Qual o seu nome?");
        transcript.push(Speaker::Respondent, "Maria");
        assert!(!transcript.push(Speaker::Respondent, " "));

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.linearize(),
            "INTERVIEWER: Qual o seu nome?\nRESPONDENT: Maria"
        );
    }

    #[test]
    fn six_turns_linearize_to_six_alternating_lines() {
        let mut transcript = Transcript::new();
        for i in 0..6 {
            let speaker = if i % 2 == 0 {
                Speaker::Interviewer
            } else {
                Speaker::Respondent
            };
            transcript.push(speaker, format!("fala {i}"));
        }

        let text = transcript.linearize();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        for (i, line) in lines.iter().enumerate() {
            let prefix = if i % 2 == 0 { "INTERVIEWER: " } else { "RESPONDENT: " };
            assert_eq!(*line, format!("{prefix}fala {i}"));
        }
    }

    #[test]
    fn empty_transcript_linearizes_to_empty_string() {
        assert_eq!(Transcript::new().linearize(), "");
    }

    #[test]
    fn record_uses_sheet_keys() {
        let json = serde_json::to_value(complete_record()).unwrap();
        assert_eq!(json["servidor_nome"], "João Silva");
        assert_eq!(json["o_que"], "Mutirão de atendimento");
        assert_eq!(json["sugestao_materia"], "");
        assert!(json.get("respondent_name").is_none());
    }

    #[test]
    fn record_tolerates_missing_optional_keys() {
        let record: BriefingRecord = serde_json::from_str(
            r#"{"servidor_nome": "Ana", "o_que": "Palestra", "quem": "EJE", "como": "Online", "quando": "Sexta"}"#,
        )
        .unwrap();
        assert!(record.is_complete());
        assert!(record.respondent_phone.is_empty());
    }

    #[test]
    fn missing_required_fields_are_reported_by_wire_key() {
        let record = BriefingRecord {
            when: "  ".to_string(),
            respondent_name: String::new(),
            ..complete_record()
        };
        assert_eq!(
            record.missing_required_fields(),
            vec!["servidor_nome", "quando"]
        );
        assert!(!record.is_complete());
        assert!(complete_record().is_complete());
    }
}
