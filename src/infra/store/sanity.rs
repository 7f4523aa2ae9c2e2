//! HTTP adapter for the hosted content store.
//!
//! Reads go to `GET /v{api}/data/query/{dataset}` with the GROQ text in
//! `query` and every bound parameter as `$name=<json literal>`. Writes go to
//! `POST /v{api}/data/mutate/{dataset}` with a bearer token. Reads may use the
//! CDN host; writes never do.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::application::store::{ContentStore, DocumentId, GroqQuery, NewDocument, StoreError};
use crate::infra::error::InfraError;

const SOURCE: &str = "infra::store::sanity";
const MAX_ERROR_BODY: usize = 512;

/// Base URLs for the live API and the read-only CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityEndpoints {
    pub api: Url,
    pub cdn: Url,
}

impl SanityEndpoints {
    pub fn hosted(project_id: &str) -> Result<Self, InfraError> {
        if project_id.is_empty()
            || !project_id
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(InfraError::configuration(format!(
                "store.project_id `{project_id}` is not a valid project id"
            )));
        }

        let parse = |host: String| {
            Url::parse(&host).map_err(|err| {
                InfraError::configuration(format!("invalid store url `{host}`: {err}"))
            })
        };

        Ok(Self {
            api: parse(format!("https://{project_id}.api.sanity.io"))?,
            cdn: parse(format!("https://{project_id}.apicdn.sanity.io"))?,
        })
    }

    /// Use one base URL for both reads and writes.
    pub fn single(base: Url) -> Self {
        Self {
            api: base.clone(),
            cdn: base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SanityStore {
    client: Client,
    endpoints: SanityEndpoints,
    dataset: String,
    api_version: String,
    token: Option<String>,
    use_cdn: bool,
}

impl SanityStore {
    pub fn new(
        endpoints: SanityEndpoints,
        dataset: impl Into<String>,
        api_version: impl Into<String>,
        token: Option<String>,
        use_cdn: bool,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("pressroom/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        let api_version = api_version.into();
        let api_version = api_version
            .strip_prefix('v')
            .unwrap_or(&api_version)
            .to_string();

        Ok(Self {
            client,
            endpoints,
            dataset: dataset.into(),
            api_version,
            token: token.filter(|token| !token.trim().is_empty()),
            use_cdn,
        })
    }

    fn endpoint(&self, base: &Url, action: &str) -> Result<Url, StoreError> {
        let path = format!("v{}/data/{action}/{}", self.api_version, self.dataset);
        base.join(&path)
            .map_err(|err| StoreError::Unavailable(format!("invalid store url: {err}")))
    }

    fn query_url(&self, query: &GroqQuery) -> Result<Url, StoreError> {
        // An authenticated read must hit the live API to see private documents.
        let base = if self.use_cdn && self.token.is_none() {
            &self.endpoints.cdn
        } else {
            &self.endpoints.api
        };

        let mut url = self.endpoint(base, "query")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query.groq());
            for (name, value) in query.params() {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        Ok(url)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutationResult>,
}

#[derive(Deserialize)]
struct MutationResult {
    id: String,
}

#[async_trait]
impl ContentStore for SanityStore {
    async fn fetch(&self, query: &GroqQuery) -> Result<Value, StoreError> {
        let url = self.query_url(query)?;
        debug!(
            target = SOURCE,
            template = query.template().name,
            "querying content store"
        );

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(StoreError::unavailable)?;
        let body: QueryResponse = read_json(response).await?;
        Ok(body.result)
    }

    async fn create(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        let Some(token) = &self.token else {
            return Err(StoreError::Unauthorized { operation: "create" });
        };

        let mut url = self.endpoint(&self.endpoints.api, "mutate")?;
        url.query_pairs_mut().append_pair("returnIds", "true");

        let payload = json!({ "mutations": [{ "create": document.to_value() }] });
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&payload)
            .send()
            .await
            .map_err(StoreError::unavailable)?;

        let body: MutateResponse = read_json(response).await?;
        body.results
            .into_iter()
            .next()
            .map(|result| DocumentId(result.id))
            .ok_or_else(|| StoreError::Rejected("mutation returned no document id".to_string()))
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(StoreError::unavailable)?;

    if !status.is_success() {
        let message = error_message(&bytes);
        warn!(
            target = SOURCE,
            status = status.as_u16(),
            message = %message,
            "content store request failed"
        );
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Rejected(message),
            _ => StoreError::Status {
                status: status.as_u16(),
                message,
            },
        });
    }

    serde_json::from_slice(&bytes).map_err(StoreError::decode)
}

/// Prefer the store's `error.description`, fall back to the raw body.
fn error_message(bytes: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes)
        && let Some(description) = value
            .pointer("/error/description")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
    {
        return description.to_string();
    }

    let text = String::from_utf8_lossy(bytes);
    text.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::{POST_BY_SLUG, POST_SLUGS};

    fn store(token: Option<&str>, use_cdn: bool) -> SanityStore {
        let endpoints = SanityEndpoints {
            api: Url::parse("https://abc123.api.sanity.io").expect("url"),
            cdn: Url::parse("https://abc123.apicdn.sanity.io").expect("url"),
        };
        SanityStore::new(
            endpoints,
            "production",
            "v2021-10-21",
            token.map(str::to_string),
            use_cdn,
            Duration::from_secs(5),
        )
        .expect("store builds")
    }

    #[test]
    fn query_url_carries_params_as_json_literals() {
        let url = store(None, false)
            .query_url(&GroqQuery::new(POST_BY_SLUG).bind("slug", "hello-world"))
            .expect("url");

        assert_eq!(url.host_str(), Some("abc123.api.sanity.io"));
        assert_eq!(url.path(), "/v2021-10-21/data/query/production");
        let slug = url
            .query_pairs()
            .find(|(name, _)| name == "$slug")
            .map(|(_, value)| value.into_owned());
        assert_eq!(slug.as_deref(), Some("\"hello-world\""));
    }

    #[test]
    fn anonymous_reads_use_the_cdn_when_enabled() {
        let url = store(None, true)
            .query_url(&GroqQuery::new(POST_SLUGS))
            .expect("url");
        assert_eq!(url.host_str(), Some("abc123.apicdn.sanity.io"));

        let url = store(Some("secret"), true)
            .query_url(&GroqQuery::new(POST_SLUGS))
            .expect("url");
        assert_eq!(url.host_str(), Some("abc123.api.sanity.io"));
    }

    #[test]
    fn hosted_endpoints_reject_odd_project_ids() {
        assert!(SanityEndpoints::hosted("abc123").is_ok());
        assert!(SanityEndpoints::hosted("").is_err());
        assert!(SanityEndpoints::hosted("evil.com/x").is_err());
    }

    #[test]
    fn error_message_prefers_description() {
        let body = br#"{"error":{"description":"param $slug referenced, but not provided"}}"#;
        assert_eq!(error_message(body), "param $slug referenced, but not provided");
        assert_eq!(error_message(b"gateway timeout"), "gateway timeout");
    }

    #[tokio::test]
    async fn create_without_token_is_unauthorized() {
        let err = store(None, false)
            .create(NewDocument::new("comment"))
            .await
            .expect_err("token required");
        assert!(matches!(err, StoreError::Unauthorized { operation: "create" }));
    }
}
