//! REST client for the hosted record store.
//!
//! Wire format:
//! - `GET  {base}/k/v1/records.json?app=..&query=..&fields[0]=..&totalCount=true`
//!   returns `{ "records": [...], "totalCount": "123" | null }`
//! - `PUT  {base}/k/v1/records.json` with
//!   `{ "app": .., "records": [{ "updateKey": { "field", "value" }, "record": {..} }] }`
//!   returns `{ "records": [{ "id", "revision" }] }`
//! - failures return `{ "code", "id", "message", "errors": { field: { "messages": [..] } } }`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockrecon_core::{FieldValue, Record, RemoteError, StoreId};

use super::r#trait::{QueryPage, QueryRequest, RecordStore, UpsertInstruction};
use crate::config::HttpStoreConfig;

const RECORDS_PATH: &str = "/k/v1/records.json";
const API_TOKEN_HEADER: &str = "X-Cybozu-API-Token";

/// [`RecordStore`] backed by the platform's REST API.
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: reqwest::Client,
    records_url: String,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(rename = "totalCount", default)]
    total_count: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    app: &'a str,
    records: Vec<UpsertRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct UpsertRecord<'a> {
    #[serde(rename = "updateKey")]
    update_key: UpdateKey<'a>,
    record: &'a BTreeMap<String, FieldValue>,
}

#[derive(Debug, Serialize)]
struct UpdateKey<'a> {
    field: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(default)]
    records: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    id: Option<String>,
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, FieldMessages>,
}

#[derive(Debug, Deserialize)]
struct FieldMessages {
    #[serde(default)]
    messages: Vec<String>,
}

impl HttpRecordStore {
    pub fn new(config: &HttpStoreConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            records_url: format!("{}{}", config.base_url.trim_end_matches('/'), RECORDS_PATH),
            api_token: config.api_token.clone(),
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.header(API_TOKEN_HEADER, token),
            None => req,
        }
    }

    /// Turn a non-2xx response into a structured error.
    async fn error_from(resp: reqwest::Response) -> RemoteError {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => RemoteError {
                status: Some(status),
                code: body.code,
                id: body.id,
                message: body.message.unwrap_or_else(|| text.clone()),
                field_errors: body
                    .errors
                    .into_iter()
                    .map(|(field, m)| (field, m.messages))
                    .collect(),
            },
            Err(_) => RemoteError::new(text).with_status(status),
        }
    }
}

fn parse_total_count(value: Option<JsonValue>) -> Option<u64> {
    match value? {
        JsonValue::String(s) => s.parse().ok(),
        JsonValue::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[async_trait::async_trait]
impl RecordStore for HttpRecordStore {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, RemoteError> {
        let mut params: Vec<(String, String)> = vec![
            ("app".to_string(), request.store.to_string()),
            ("query".to_string(), request.render()),
        ];
        for (i, field) in request.fields.iter().enumerate() {
            params.push((format!("fields[{i}]"), field.clone()));
        }
        if request.total_count {
            params.push(("totalCount".to_string(), "true".to_string()));
        }

        let req = self.authorize(self.client.get(&self.records_url).query(&params));
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::transport(format!("network error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let body: RecordsResponse = resp.json().await.map_err(|e| {
            RemoteError::new(format!("failed to parse records response: {e}"))
        })?;

        Ok(QueryPage {
            records: body.records,
            total_count: parse_total_count(body.total_count),
        })
    }

    async fn batch_upsert(
        &self,
        store: &StoreId,
        instructions: &[UpsertInstruction],
    ) -> Result<usize, RemoteError> {
        let body = UpsertBody {
            app: store.as_str(),
            records: instructions
                .iter()
                .map(|ins| UpsertRecord {
                    update_key: UpdateKey {
                        field: &ins.match_field,
                        value: &ins.match_value,
                    },
                    record: &ins.patch,
                })
                .collect(),
        };

        let req = self.authorize(self.client.put(&self.records_url).json(&body));
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::transport(format!("network error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let body: UpsertResponse = resp.json().await.map_err(|e| {
            RemoteError::new(format!("failed to parse update response: {e}"))
        })?;

        Ok(body.records.len())
    }
}
