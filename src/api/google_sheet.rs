//! Implements the `Sheet` trait against Google Sheets.
//!
//! Cell values go through the `sheets::Client`. Document metadata and adding or deleting sheets
//! are plain REST calls to the Sheets v4 API, made with `reqwest`.

use crate::api::{Credentials, Sheet};
use crate::error::Res;
use crate::model::{Row, SheetRange, SheetRef, SpreadsheetMeta};
use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Only the fields the rollover reads.
const METADATA_FIELDS: &str = "properties.locale,sheets.properties(sheetId,title,index)";

/// Implements the `Sheet` trait for one Google spreadsheet. It takes `Credentials`, which it asks
/// for a fresh token before every call.
pub(crate) struct GoogleSheet {
    spreadsheet_id: String,
    credentials: Credentials,
    client: sheets::Client,
    http: reqwest::Client,
}

impl GoogleSheet {
    pub(crate) async fn new(
        spreadsheet_id: impl Into<String>,
        mut credentials: Credentials,
    ) -> Res<Self> {
        let client = create_sheets_client(&mut credentials).await?;
        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Refreshes the sheets client with a new access token if needed.
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(&mut self.credentials).await?;
        Ok(())
    }

    async fn batch_update<T>(&mut self, request: serde_json::Value) -> Res<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{SHEETS_API}/{}:batchUpdate", self.spreadsheet_id);
        let token = self.credentials.token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "requests": [request] }))
            .send()
            .await
            .context("Failed to send the batchUpdate request to the Sheets API")?;
        read_json(response, "batchUpdate").await
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn metadata(&mut self) -> Res<SpreadsheetMeta> {
        trace!("metadata for {}", self.spreadsheet_id);
        let url = format!("{SHEETS_API}/{}", self.spreadsheet_id);
        let token = self.credentials.token().await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", METADATA_FIELDS)])
            .send()
            .await
            .context("Failed to send the spreadsheet metadata request")?;
        let body: SpreadsheetResponse = read_json(response, "metadata").await?;
        Ok(body.into())
    }

    async fn get_values(&mut self, range: &SheetRange) -> Res<Vec<Row>> {
        trace!("get_values for {range}");
        self.refresh_client().await?;
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &range.to_string(),
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch the values of {range}"))?;
        Ok(response.body.values)
    }

    async fn update_values(&mut self, range: &SheetRange, rows: &[Row]) -> Res<()> {
        trace!("update_values for {range}, {} rows", rows.len());
        self.refresh_client().await?;
        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: range.to_string(),
                values: rows.to_vec(),
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };
        self.client
            .spreadsheets()
            .values_batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write the values of {range}"))?;
        Ok(())
    }

    async fn add_sheet(&mut self, title: &str) -> Res<SheetRef> {
        trace!("add_sheet {title}");
        let reply: BatchUpdateResponse = self
            .batch_update(serde_json::json!({
                "addSheet": { "properties": { "title": title } }
            }))
            .await
            .with_context(|| format!("Failed to add the sheet '{title}'"))?;
        let properties = reply
            .replies
            .into_iter()
            .find_map(|r| r.add_sheet)
            .map(|a| a.properties)
            .context("The addSheet reply did not include the new sheet")?;
        Ok(SheetRef::new(properties.title, properties.sheet_id))
    }

    async fn delete_sheet(&mut self, sheet_id: i64) -> Res<()> {
        trace!("delete_sheet {sheet_id}");
        let _: BatchUpdateResponse = self
            .batch_update(serde_json::json!({
                "deleteSheet": { "sheetId": sheet_id }
            }))
            .await
            .with_context(|| format!("Failed to delete the sheet with id {sheet_id}"))?;
        Ok(())
    }
}

async fn read_json<T>(response: reqwest::Response, call: &str) -> Res<T>
where
    T: DeserializeOwned,
{
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("Sheets API {call} failed with status {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse the Sheets API {call} response"))
}

// The API omits fields that hold their default value, e.g. `sheetId` 0 or `index` 0.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResponse {
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetProperties {
    #[serde(default)]
    locale: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    index: i64,
}

impl From<SpreadsheetResponse> for SpreadsheetMeta {
    fn from(response: SpreadsheetResponse) -> Self {
        let mut sheets: Vec<SheetProperties> =
            response.sheets.into_iter().map(|s| s.properties).collect();
        sheets.sort_by_key(|p| p.index);
        SpreadsheetMeta {
            locale: response.properties.locale,
            sheets: sheets
                .into_iter()
                .map(|p| SheetRef::new(p.title, p.sheet_id))
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Reply>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    add_sheet: Option<AddSheetReply>,
}

#[derive(Debug, Deserialize)]
struct AddSheetReply {
    properties: SheetProperties,
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(credentials: &mut Credentials) -> Res<sheets::Client> {
    let access_token = credentials.token().await?;

    // The sheets crate wants client_id, client_secret, redirect_uri and refresh_token as well, but
    // API calls only need the access token. Refresh is handled by `Credentials`.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token,
        String::new(),
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
