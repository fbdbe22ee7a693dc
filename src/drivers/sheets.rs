//! Spreadsheet values API driver for the remote store

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::traits::RemoteDriver;
use crate::types::*;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Credentials file written by whatever tool performed the OAuth exchange
#[derive(Debug, Deserialize)]
struct Credentials {
    access_token: String,
}

/// Body of a values read or append
#[derive(Debug, Default, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// [`RemoteDriver`] speaking the spreadsheet values REST API
/// (`values.get` and `values.append`) with a bearer token
pub struct SheetsDriver {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    credentials: PathBuf,
    token: RwLock<Option<String>>,
}

impl SheetsDriver {
    /// Create a driver; no network traffic happens until the first call
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        credentials: impl AsRef<Path>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials: credentials.as_ref().to_path_buf(),
            token: RwLock::new(None),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }

    fn bearer(&self) -> ExpenseResult<String> {
        self.token
            .read()
            .map_err(|_| ExpenseError::Driver("token lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| ExpenseError::AuthFailure("driver is not authorized".to_string()))
    }

    /// Map a response status onto the driver's errors
    ///
    /// A rejected token is dropped, so the store reports itself unavailable
    /// until it reconnects.
    fn check_status(&self, status: StatusCode) -> ExpenseResult<()> {
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            *self
                .token
                .write()
                .map_err(|_| ExpenseError::Driver("token lock poisoned".to_string()))? = None;
            warn!(%status, "spreadsheet rejected the access token");
            return Err(ExpenseError::AuthFailure(format!("token rejected: {}", status)));
        }
        Err(ExpenseError::Driver(format!("spreadsheet request failed: {}", status)))
    }
}

#[async_trait]
impl RemoteDriver for SheetsDriver {
    async fn authorize(&self) -> ExpenseResult<()> {
        let contents = tokio::fs::read_to_string(&self.credentials)
            .await
            .map_err(|e| {
                ExpenseError::AuthFailure(format!(
                    "cannot read credentials {}: {}",
                    self.credentials.display(),
                    e
                ))
            })?;
        let credentials: Credentials = serde_json::from_str(&contents).map_err(|e| {
            ExpenseError::AuthFailure(format!(
                "malformed credentials {}: {}",
                self.credentials.display(),
                e
            ))
        })?;
        if credentials.access_token.trim().is_empty() {
            return Err(ExpenseError::AuthFailure(
                "credentials hold an empty access token".to_string(),
            ));
        }

        *self
            .token
            .write()
            .map_err(|_| ExpenseError::Driver("token lock poisoned".to_string()))? =
            Some(credentials.access_token);

        debug!(credentials = %self.credentials.display(), "remote driver authorized");
        Ok(())
    }

    fn is_authorized(&self) -> bool {
        self.token
            .read()
            .map(|token| token.is_some())
            .unwrap_or(false)
    }

    async fn fetch_range(&self, range: &str) -> ExpenseResult<Vec<Vec<Value>>> {
        let token = self.bearer()?;
        debug!(range, "loading values from spreadsheet");

        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ExpenseError::Driver(e.to_string()))?;
        self.check_status(response.status())?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| ExpenseError::Driver(e.to_string()))?;

        Ok(body.values)
    }

    async fn append_row(&self, range: &str, row: Vec<Value>) -> ExpenseResult<()> {
        let token = self.bearer()?;
        debug!(range, "appending value to spreadsheet");

        let body = ValueRange {
            range: Some(range.to_string()),
            values: vec![row],
        };
        let response = self
            .client
            .post(format!("{}:append", self.values_url(range)))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExpenseError::Driver(e.to_string()))?;
        self.check_status(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn credentials_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_values_url() {
        let driver = SheetsDriver::new("https://example.test/", "sheet-1", "creds.json");
        assert_eq!(
            driver.values_url("A2:C"),
            "https://example.test/v4/spreadsheets/sheet-1/values/A2:C"
        );
    }

    #[tokio::test]
    async fn test_authorize_loads_token() {
        let file = credentials_file(r#"{"access_token": "abc", "refresh_token": "r"}"#);
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", file.path());

        assert!(!driver.is_authorized());
        driver.authorize().await.unwrap();
        assert!(driver.is_authorized());
        assert_eq!(driver.bearer().unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_authorize_failures() {
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", "/nonexistent/creds.json");
        assert!(matches!(
            driver.authorize().await,
            Err(ExpenseError::AuthFailure(_))
        ));

        let file = credentials_file(r#"{"access_token": "  "}"#);
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", file.path());
        assert!(matches!(
            driver.authorize().await,
            Err(ExpenseError::AuthFailure(_))
        ));
        assert!(!driver.is_authorized());
    }

    #[tokio::test]
    async fn test_rejected_token_is_dropped() {
        let file = credentials_file(r#"{"access_token": "abc"}"#);
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", file.path());
        driver.authorize().await.unwrap();

        assert!(driver.check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            driver.check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(ExpenseError::Driver(_))
        ));
        assert!(driver.is_authorized());

        assert!(matches!(
            driver.check_status(StatusCode::UNAUTHORIZED),
            Err(ExpenseError::AuthFailure(_))
        ));
        assert!(!driver.is_authorized());
        assert!(matches!(
            driver.append_row("A2:C2", vec![]).await,
            Err(ExpenseError::AuthFailure(_))
        ));

        driver.authorize().await.unwrap();
        assert!(driver.check_status(StatusCode::FORBIDDEN).is_err());
        assert!(!driver.is_authorized());
    }

    #[tokio::test]
    async fn test_expired_token_makes_sync_skip_remote() {
        use crate::reconciliation::ReconciliationEngine;
        use crate::stores::{RemoteOptions, RemoteStore};
        use crate::traits::RecordStore;
        use crate::utils::MemoryStore;

        let file = credentials_file(r#"{"access_token": "abc"}"#);
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", file.path());
        let remote = RemoteStore::connect(driver, RemoteOptions::default())
            .await
            .unwrap();
        assert!(remote.is_available());

        let _ = remote.driver().check_status(StatusCode::UNAUTHORIZED);
        assert!(!remote.is_available());

        let local = MemoryStore::new("local");
        let result = ReconciliationEngine::new(&local, &remote).sync().await.unwrap();
        assert_eq!(result, SyncResult::skipped(StoreSide::Remote));
    }

    #[tokio::test]
    async fn test_calls_require_authorization() {
        let driver = SheetsDriver::new(DEFAULT_BASE_URL, "sheet", "creds.json");
        assert!(matches!(
            driver.fetch_range("A2:C").await,
            Err(ExpenseError::AuthFailure(_))
        ));
    }
}
