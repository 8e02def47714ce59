use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use tenderdeck_core::config::SheetsConfig;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("sheet request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sheet request returned HTTP {status}")]
    Http { status: u16 },
    #[error("sheet response body was not the expected shape: {0}")]
    MalformedBody(String),
}

/// Source of the raw spreadsheet grid. The production implementation talks to
/// the Sheets API; tests substitute a canned grid.
#[async_trait]
pub trait GridSource: Send + Sync {
    async fn fetch_grid(&self) -> Result<Vec<Vec<String>>, IngestError>;
}

#[async_trait]
impl GridSource for Box<dyn GridSource> {
    async fn fetch_grid(&self) -> Result<Vec<Vec<String>>, IngestError> {
        (**self).fetch_grid().await
    }
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    api_key: Option<String>,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: "https://sheets.googleapis.com/v4/spreadsheets".to_owned(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
            api_key: config.api_key.as_ref().map(|key| key.expose_secret().to_owned()),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn values_url(&self) -> String {
        let mut url = format!("{}/{}/values/{}", self.base_url, self.spreadsheet_id, self.range);
        if let Some(key) = &self.api_key {
            url.push_str("?key=");
            url.push_str(key);
        }
        url
    }
}

#[async_trait]
impl GridSource for SheetsClient {
    async fn fetch_grid(&self) -> Result<Vec<Vec<String>>, IngestError> {
        let response = self.http.get(self.values_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Http { status: status.as_u16() });
        }

        let body: ValuesResponse = response
            .json()
            .await
            .map_err(|err| IngestError::MalformedBody(err.to_string()))?;

        // Cells arrive as mixed JSON scalars; the normalizer wants strings.
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{cell_to_string, SheetsClient};
    use tenderdeck_core::config::SheetsConfig;

    fn config() -> SheetsConfig {
        SheetsConfig {
            spreadsheet_id: "sheet-1".to_owned(),
            api_key: Some("key-9".to_owned().into()),
            range: "A:Z".to_owned(),
            timeout_secs: 5,
            refresh_interval_secs: 300,
        }
    }

    #[test]
    fn values_url_includes_range_and_key() {
        let client = SheetsClient::new(&config()).unwrap().with_base_url("http://host/v");
        assert_eq!(client.values_url(), "http://host/v/sheet-1/values/A:Z?key=key-9");
    }

    #[test]
    fn cells_of_any_scalar_type_become_strings() {
        assert_eq!(cell_to_string(json!("6-May")), "6-May");
        assert_eq!(cell_to_string(json!(120.5)), "120.5");
        assert_eq!(cell_to_string(json!(null)), "");
    }
}
