//! Stdin/stdout REPL driving one briefing session.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::briefing::controller::{Outcome, Rejection, SessionController, SessionSnapshot};
use crate::briefing::export;
use crate::briefing::model::{BriefingRecord, Speaker};

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Start,
    Finish,
    Submit,
    Export,
    Reset,
    Status,
    Help,
    Quit,
    /// A slash command we don't know. Never sent to the interviewer.
    Unknown(String),
    /// Anything else is the respondent's answer.
    Answer(String),
}

/// Why the REPL stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliExit {
    /// The user typed /quit.
    Quit,
    /// Input ended or could not be read.
    Eof,
}

impl CliCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "/start" | "/new" => Self::Start,
            "/finish" | "/done" => Self::Finish,
            "/submit" | "/send" => Self::Submit,
            "/export" | "/csv" => Self::Export,
            "/reset" | "/clear" => Self::Reset,
            "/status" => Self::Status,
            "/help" | "/?" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ if trimmed.starts_with('/') => Self::Unknown(trimmed.to_string()),
            _ => Self::Answer(trimmed.to_string()),
        }
    }
}

const HELP: &str = "\
Comandos:
  /finish   encerra a entrevista e gera a pauta
  /submit   envia a pauta para a planilha
  /export   salva a pauta em CSV
  /reset    descarta a sessão
  /start    inicia uma nova entrevista
  /status   mostra a fase atual
  /quit     sai
Qualquer outro texto é a sua resposta ao entrevistador.";

/// Printable summary of an extracted record.
pub fn render_record(record: &BriefingRecord) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: &str| {
        let value = if value.trim().is_empty() { "-" } else { value };
        out.push_str(&format!("  {label}: {value}\n"));
    };
    line("Servidor", &record.respondent_name);
    line("Cargo", &record.respondent_role);
    line("Telefone", &record.respondent_phone);
    line("Aspas", &record.has_quote);
    line("Quem fala", &record.quote_speaker);
    line("O que", &record.what);
    line("Quem", &record.who);
    line("Como", &record.how);
    line("Quando", &record.when);
    line("Por que", &record.why);
    line("Para quem", &record.for_whom);
    line("Objetivos", &record.expected_outcomes);
    line("Riscos", &record.risks_if_not_done);
    line("Observações", &record.additional_notes);
    if !record.draft_article.trim().is_empty() {
        out.push_str("\n--- Sugestão de matéria ---\n");
        out.push_str(record.draft_article.trim());
        out.push('\n');
    }
    out
}

fn describe_rejection(rejection: Rejection) -> String {
    match rejection {
        Rejection::EmptyText => "Digite uma resposta.".to_string(),
        Rejection::CallPending => "Aguarde a resposta anterior.".to_string(),
        Rejection::InvalidPhase { phase } => {
            format!("Comando indisponível na fase atual ({phase}).")
        }
        Rejection::EmptyTranscript => "A entrevista ainda não começou.".to_string(),
        Rejection::AlreadySubmitted => "A pauta já foi enviada.".to_string(),
    }
}

/// REPL state: the session plus how much of its transcript is on screen.
pub struct CliSession {
    controller: Arc<SessionController>,
    export_dir: PathBuf,
    shown_turns: usize,
}

impl CliSession {
    pub fn new(controller: Arc<SessionController>, export_dir: PathBuf) -> Self {
        Self {
            controller,
            export_dir,
            shown_turns: 0,
        }
    }

    /// Print turns not shown yet, then the notice and record if relevant.
    fn render(&mut self, snapshot: &SessionSnapshot, show_record: bool) {
        if snapshot.transcript.len() < self.shown_turns {
            self.shown_turns = 0;
        }
        for turn in &snapshot.transcript[self.shown_turns..] {
            match turn.speaker {
                Speaker::Interviewer => println!("\n{}\n", turn.text),
                Speaker::Respondent => {}
            }
        }
        self.shown_turns = snapshot.transcript.len();

        if let Some(notice) = &snapshot.notice {
            eprintln!("ℹ️  {}", notice.message);
        }
        if show_record && let Some(record) = &snapshot.record {
            println!("\n=== Pauta ===\n{}", render_record(record));
            eprintln!("   /submit para enviar, /export para salvar em CSV, /reset para descartar");
        }
    }

    async fn report(&mut self, outcome: Outcome, show_record: bool) {
        if let Outcome::Rejected(rejection) = outcome {
            eprintln!("⚠️  {}", describe_rejection(rejection));
            return;
        }
        let snapshot = self.controller.snapshot().await;
        self.render(&snapshot, show_record);
    }

    /// Handle one command. Returns `false` when the REPL should stop.
    pub async fn handle(&mut self, command: CliCommand) -> bool {
        match command {
            CliCommand::Quit => return false,
            CliCommand::Help => eprintln!("{HELP}"),
            CliCommand::Unknown(command) => {
                eprintln!("⚠️  Comando desconhecido: {command}");
                eprintln!("{HELP}");
            }
            CliCommand::Status => {
                let snapshot = self.controller.snapshot().await;
                eprintln!(
                    "   Fase: {} | turnos: {} | enviada: {}",
                    snapshot.phase,
                    snapshot.transcript.len(),
                    if snapshot.submitted { "sim" } else { "não" }
                );
            }
            CliCommand::Start => {
                self.shown_turns = 0;
                let outcome = self.controller.start().await;
                self.report(outcome, false).await;
            }
            CliCommand::Answer(text) => {
                let outcome = self.controller.submit_user_turn(&text).await;
                self.report(outcome, false).await;
            }
            CliCommand::Finish => {
                eprintln!("⏳ Gerando a pauta...");
                let outcome = self.controller.finish().await;
                self.report(outcome, true).await;
            }
            CliCommand::Submit => {
                let outcome = self.controller.submit().await;
                self.report(outcome, false).await;
            }
            CliCommand::Reset => {
                let outcome = self.controller.reset().await;
                self.shown_turns = 0;
                self.report(outcome, false).await;
                eprintln!("   Sessão descartada. /start para recomeçar.");
            }
            CliCommand::Export => self.export().await,
        }
        true
    }

    async fn export(&self) {
        let Some(record) = self.controller.snapshot().await.record else {
            eprintln!("⚠️  Nenhuma pauta para exportar. Use /finish primeiro.");
            return;
        };
        match export::write_csv(&record, &self.export_dir).await {
            Ok(path) => eprintln!("✅ Pauta salva em {}", path.display()),
            Err(e) => {
                tracing::error!("CSV export failed: {}", e);
                eprintln!("❌ Não foi possível salvar o CSV: {e}");
            }
        }
    }

    /// Start the interview and read commands from stdin until EOF or /quit.
    pub async fn run(self) -> CliExit {
        self.run_from(tokio::io::stdin()).await
    }

    /// Start the interview and read commands from `input` until it ends
    /// or the user quits.
    pub async fn run_from<R: AsyncRead + Unpin>(mut self, input: R) -> CliExit {
        eprintln!("   Digite /help para ver os comandos.\n");
        self.handle(CliCommand::Start).await;

        let mut lines = BufReader::new(input).lines();
        loop {
            eprint!("> ");
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if !self.handle(CliCommand::parse(&line)).await {
                        return CliExit::Quit;
                    }
                }
                Ok(None) => {
                    tracing::info!("CLI input closed");
                    return CliExit::Eof;
                }
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    return CliExit::Eof;
                }
            }
        }
    }
}
