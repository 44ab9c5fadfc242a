/// XRPC agent over reqwest
use crate::{
    agent::{AgentFactory, RawRecord, RecordPage, RepoAgent},
    error::{ReaderError, ReaderResult},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// XRPC error body
#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Agent for `com.atproto.repo.*` read methods on one service
#[derive(Clone)]
pub struct XrpcAgent {
    http_client: Client,
    service: String,
}

impl XrpcAgent {
    pub fn new(http_client: Client, service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            http_client,
            service: service.trim_end_matches('/').to_string(),
        }
    }

    fn method_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }
}

/// Turn a non-success response into an XRPC error
async fn xrpc_error(response: Response) -> ReaderError {
    let status = response.status().as_u16();
    let body: XrpcErrorBody = response.json().await.unwrap_or_default();

    ReaderError::Xrpc {
        status,
        error: if body.error.is_empty() {
            "UnknownError".to_string()
        } else {
            body.error
        },
        message: body.message,
    }
}

#[async_trait]
impl RepoAgent for XrpcAgent {
    fn service(&self) -> &str {
        &self.service
    }

    async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> ReaderResult<Option<RawRecord>> {
        let url = self.method_url("com.atproto.repo.getRecord");
        debug!("XRPC getRecord {} {}/{}", self.service, collection, rkey);

        let response = self
            .http_client
            .get(&url)
            .query(&[("repo", repo), ("collection", collection), ("rkey", rkey)])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = xrpc_error(response).await;
            let not_found = matches!(
                &err,
                ReaderError::Xrpc { status, error, .. }
                    if *status == StatusCode::BAD_REQUEST.as_u16() && error == "RecordNotFound"
            );
            return if not_found { Ok(None) } else { Err(err) };
        }

        let record: RawRecord = response.json().await?;
        Ok(Some(record))
    }

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ReaderResult<RecordPage> {
        let url = self.method_url("com.atproto.repo.listRecords");
        debug!(
            "XRPC listRecords {} {} (cursor: {:?})",
            self.service, collection, cursor
        );

        let limit = limit.to_string();
        let mut query = vec![
            ("repo", repo),
            ("collection", collection),
            ("limit", limit.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self.http_client.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(xrpc_error(response).await);
        }

        Ok(response.json().await?)
    }
}

/// Builds `XrpcAgent`s sharing one HTTP client
#[derive(Clone)]
pub struct XrpcAgentFactory {
    http_client: Client,
}

impl XrpcAgentFactory {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

impl AgentFactory for XrpcAgentFactory {
    fn agent(&self, service: &str) -> Arc<dyn RepoAgent> {
        Arc::new(XrpcAgent::new(self.http_client.clone(), service))
    }
}
