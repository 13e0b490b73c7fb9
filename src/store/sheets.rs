use super::{StoreError, Table, TableRef, TableStore};
use crate::google_auth::GoogleAuth;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";

/// Google Sheets (v4 REST) backed table store.
pub struct SheetsStore {
    client: reqwest::Client,
    auth: GoogleAuth,
    api_base: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsStore {
    pub fn new(auth: GoogleAuth, api_base: Option<&str>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("client-mail-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            auth,
            api_base: api_base
                .unwrap_or(DEFAULT_SHEETS_API)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::NetworkError(format!("bad API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::NetworkError("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        table: &TableRef,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(table.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Properties of the addressed tab (first tab when none is named).
    async fn sheet_properties(&self, table: &TableRef) -> Result<SheetProperties, StoreError> {
        let mut url = self.url(&[&table.id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");

        let response = self.send(table, self.client.get(url)).await?;
        let metadata: SpreadsheetMetadata = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError {
                status: 200,
                message: format!("unreadable spreadsheet metadata: {e}"),
            })?;

        let mut sheets = metadata.sheets.into_iter().map(|s| s.properties);
        let found = match &table.tab {
            Some(tab) => sheets.find(|p| &p.title == tab),
            None => sheets.next(),
        };
        found.ok_or_else(|| StoreError::NotFound(table.to_string()))
    }

    async fn tab_title(&self, table: &TableRef) -> Result<String, StoreError> {
        match &table.tab {
            Some(tab) => Ok(tab.clone()),
            None => Ok(self.sheet_properties(table).await?.title),
        }
    }

    async fn put_values(
        &self,
        table: &TableRef,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        let mut url = self.url(&[&table.id, "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range, "values": values });
        self.send(table, self.client.put(url).json(&body)).await?;
        Ok(())
    }
}

/// Quote a tab title for use in an A1 range.
fn quoted(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// A1 column letters for a zero-based column index.
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for SheetsStore {
    async fn read_all(&self, table: &TableRef) -> Result<Table, StoreError> {
        let title = self.tab_title(table).await?;
        let url = self.url(&[&table.id, "values", &quoted(&title)])?;

        let response = self.send(table, self.client.get(url)).await?;
        let range: ValueRange = response.json().await.map_err(|e| StoreError::ApiError {
            status: 200,
            message: format!("unreadable values: {e}"),
        })?;

        let rows = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Ok(Table::new(rows))
    }

    async fn append_row(&self, table: &TableRef, row: Vec<String>) -> Result<(), StoreError> {
        let title = self.tab_title(table).await?;
        let range = format!("{}!A1", quoted(&title));
        let mut url = self.url(&[&table.id, "values", &format!("{range}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({ "values": [row] });
        self.send(table, self.client.post(url).json(&body)).await?;
        log::debug!("Appended row to {}", table);
        Ok(())
    }

    async fn write_header(&self, table: &TableRef, header: Vec<String>) -> Result<(), StoreError> {
        let title = self.tab_title(table).await?;
        self.put_values(table, &format!("{}!A1", quoted(&title)), vec![header])
            .await
    }

    async fn delete_row(&self, table: &TableRef, index: usize) -> Result<(), StoreError> {
        let properties = self.sheet_properties(table).await?;
        let url = self.url(&[&format!("{}:batchUpdate", table.id)])?;
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": properties.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": index,
                        "endIndex": index + 1,
                    }
                }
            }]
        });
        self.send(table, self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn update_cell(
        &self,
        table: &TableRef,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), StoreError> {
        let title = self.tab_title(table).await?;
        let range = format!("{}!{}{}", quoted(&title), column_letter(col), row + 1);
        self.put_values(table, &range, vec![vec![value]]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_auth::GoogleAuthConfig;
    use mockito::Matcher;

    fn store(base: &str) -> SheetsStore {
        let auth = GoogleAuth::new(GoogleAuthConfig {
            access_token: Some("test-token".to_string()),
            ..Default::default()
        })
        .unwrap();
        SheetsStore::new(auth, Some(base)).unwrap()
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted("Email Logger"), "'Email Logger'");
        assert_eq!(quoted("Bob's"), "'Bob''s'");
    }

    #[tokio::test]
    async fn test_read_all_converts_cells() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v4/spreadsheets/sheet1/values/".to_string()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"range":"Log!A1:C3","values":[["From","To","Count"],["a@x.com","b@y.com",3]]}"#)
            .create_async()
            .await;

        let table = TableRef::new("sheet1", Some("Log"));
        let snapshot = store(&server.url()).read_all(&table).await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.headers(), &["From", "To", "Count"]);
        assert_eq!(snapshot.cell(1, 2), "3");
    }

    #[tokio::test]
    async fn test_read_all_missing_sheet_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let table = TableRef::new("gone", Some("Log"));
        let result = store(&server.url()).read_all(&table).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_row_uses_sheet_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v4/spreadsheets/sheet1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sheets":[{"properties":{"sheetId":0,"title":"Info"}},{"properties":{"sheetId":77,"title":"Email Logger"}}]}"#)
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/v4/spreadsheets/sheet1:batchUpdate")
            .match_body(Matcher::PartialJson(json!({
                "requests": [{
                    "deleteDimension": {
                        "range": { "sheetId": 77, "dimension": "ROWS", "startIndex": 4, "endIndex": 5 }
                    }
                }]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let table = TableRef::new("sheet1", Some("Email Logger"));
        store(&server.url()).delete_row(&table, 4).await.unwrap();
        delete.assert_async().await;
    }
}
