//! Spreadsheet sink: forwards one briefing record to the spreadsheet
//! web app.
//!
//! A successful `persist` means the request was dispatched and answered
//! without an error status. It does not prove the row was stored.

use async_trait::async_trait;

use crate::briefing::model::BriefingRecord;
use crate::error::SinkError;

/// Acknowledgement that a record was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    /// Final HTTP status seen, if the transport reports one.
    pub status: Option<u16>,
}

/// Destination for finished briefing records.
#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn persist(&self, record: &BriefingRecord) -> Result<Dispatched, SinkError>;
}

/// Posts records as JSON to a spreadsheet web-app endpoint (e.g. an Apps
/// Script `doPost` that appends a row).
pub struct AppsScriptSink {
    client: reqwest::Client,
    url: String,
}

impl AppsScriptSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl SpreadsheetSink for AppsScriptSink {
    async fn persist(&self, record: &BriefingRecord) -> Result<Dispatched, SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .map_err(|e| SinkError::Dispatch(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::info!(status = status.as_u16(), "Briefing record dispatched to spreadsheet");
        Ok(Dispatched {
            status: Some(status.as_u16()),
        })
    }
}

/// Stand-in used when no spreadsheet URL is configured.
pub struct UnconfiguredSink;

#[async_trait]
impl SpreadsheetSink for UnconfiguredSink {
    async fn persist(&self, _record: &BriefingRecord) -> Result<Dispatched, SinkError> {
        tracing::warn!("Submission attempted but BRIEFING_SHEET_URL is not set");
        Err(SinkError::NotConfigured)
    }
}
