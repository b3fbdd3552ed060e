//! CSV export of a briefing record, laid out for the newsroom spreadsheet.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::model::BriefingRecord;
use crate::error::Result;

/// Byte-order mark so spreadsheet apps detect UTF-8.
const UTF8_BOM: &str = "\u{FEFF}";

fn rows(record: &BriefingRecord) -> Vec<[&str; 2]> {
    let quote_speaker = if record.quote_speaker.trim().is_empty() {
        "-"
    } else {
        record.quote_speaker.as_str()
    };

    vec![
        ["Campo", "Conteúdo"],
        ["-- DADOS DE CONTATO --", ""],
        ["Nome do Servidor", record.respondent_name.as_str()],
        ["Cargo", record.respondent_role.as_str()],
        ["Telefone", record.respondent_phone.as_str()],
        ["-- ASPAS / FONTE --", ""],
        ["Terá Aspas?", record.has_quote.as_str()],
        ["Quem fala (Nome/Cargo)", quote_speaker],
        ["-- DADOS DA PAUTA --", ""],
        ["1. O que? (Fato/Ação)", record.what.as_str()],
        ["2. Quem? (Responsáveis)", record.who.as_str()],
        ["3. Como? (Formato/Detalhes)", record.how.as_str()],
        ["4. Quando? (Data/Hora)", record.when.as_str()],
        ["5. Por que? (Motivo)", record.why.as_str()],
        ["6. Para quem? (Público-Alvo)", record.for_whom.as_str()],
        ["7. Objetivos Esperados", record.expected_outcomes.as_str()],
        ["8. Riscos (Se não executar)", record.risks_if_not_done.as_str()],
        ["Observações Adicionais", record.additional_notes.as_str()],
    ]
}

/// Quote a cell: wrap in double quotes and double any inner quotes.
fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Render the record as CSV text, BOM included.
pub fn to_csv(record: &BriefingRecord) -> String {
    let body = rows(record)
        .iter()
        .map(|row| row.iter().map(|cell| quote(cell)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{UTF8_BOM}{body}")
}

/// Download name for an export taken at `at`.
pub fn file_name(at: DateTime<Utc>) -> String {
    format!("pauta_ascom_tremt_{}.csv", at.format("%Y-%m-%dT%H-%M-%S"))
}

/// Write the CSV into `dir` and return the file path.
pub async fn write_csv(record: &BriefingRecord, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name(Utc::now()));
    tokio::fs::write(&path, to_csv(record)).await?;
    tracing::info!(path = %path.display(), "Briefing exported to CSV");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record() -> BriefingRecord {
        BriefingRecord {
            respondent_name: "João Silva".to_string(),
            respondent_role: "Chefe de Cartório".to_string(),
            respondent_phone: "9999-0000".to_string(),
            has_quote: "Não".to_string(),
            what: "Mutirão, com \"atendimento\" extra".to_string(),
            who: "Cartório".to_string(),
            how: "Presencial\ncom senha".to_string(),
            when: "Sábado".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn starts_with_bom_and_header() {
        let csv = to_csv(&record());
        assert!(csv.starts_with("\u{FEFF}\"Campo\",\"Conteúdo\"\n"));
    }

    #[test]
    fn has_one_line_per_row_when_cells_have_no_newlines() {
        let record = BriefingRecord {
            how: "Presencial".to_string(),
            ..record()
        };
        assert_eq!(to_csv(&record).lines().count(), 18);
    }

    #[test]
    fn escapes_quotes_and_keeps_commas_inside_cells() {
        let csv = to_csv(&record());
        assert!(csv.contains(r#""1. O que? (Fato/Ação)","Mutirão, com ""atendimento"" extra""#));
        assert!(csv.contains("\"3. Como? (Formato/Detalhes)\",\"Presencial\ncom senha\""));
    }

    #[test]
    fn empty_quote_speaker_renders_dash() {
        let csv = to_csv(&record());
        assert!(csv.contains(r#""Quem fala (Nome/Cargo)","-""#));
        assert!(csv.contains(r#""Observações Adicionais","""#));
    }

    #[test]
    fn file_name_is_timestamped() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(file_name(at), "pauta_ascom_tremt_2026-03-09T14-05-07.csv");
    }

    #[tokio::test]
    async fn write_csv_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&record(), &dir.path().join("exports")).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, to_csv(&record()));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("pauta_ascom_tremt_"));
    }
}
