//! Extraction of user and post records from the source JSON API.
//!
//! The API is JSONPlaceholder-shaped: `GET /users` and `GET /posts` each
//! return a JSON array of flat-ish records. One [`ApiClient`] serves both
//! endpoints; requests are issued one at a time.

use apietl_shared::{EtlError, RawPost, RawUser, Result, SourceOptions};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("apietl/", env!("CARGO_PKG_VERSION"));

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

const USERS_ENDPOINT: &str = "users";
const POSTS_ENDPOINT: &str = "posts";

/// HTTP client for the source API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client from validated source options.
    pub fn new(opts: &SourceOptions) -> Result<Self> {
        if !opts.verify_tls {
            warn!(
                base_url = %opts.base_url,
                "TLS certificate verification is disabled for the source API"
            );
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(opts.timeout)
            .danger_accept_invalid_certs(!opts.verify_tls)
            .build()
            .map_err(|e| EtlError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: opts.base_url.clone(),
        })
    }

    /// The base URL requests are made against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch all user records.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn fetch_users(&self) -> Result<Vec<RawUser>> {
        info!("fetching user data");
        let users: Vec<RawUser> = self.fetch_records(USERS_ENDPOINT).await?;
        info!(count = users.len(), "extracted users");
        Ok(users)
    }

    /// Fetch all post records.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn fetch_posts(&self) -> Result<Vec<RawPost>> {
        info!("fetching post data");
        let posts: Vec<RawPost> = self.fetch_records(POSTS_ENDPOINT).await?;
        info!(count = posts.len(), "extracted posts");
        Ok(posts)
    }

    /// GET `<base_url>/<endpoint>` and decode the body as a JSON array of `T`.
    async fn fetch_records<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let url = endpoint_url(&self.base_url, endpoint);
        debug!(%url, "sending request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EtlError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(EtlError::validation(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EtlError::Network(format!("{url}: failed to read body: {e}")))?;

        debug!(%url, bytes = body.len(), "response received");

        serde_json::from_slice(&body).map_err(|e| EtlError::parse(format!("{url}: {e}")))
    }
}

/// Join an endpoint name onto the base URL, tolerating trailing slashes.
fn endpoint_url(base: &Url, endpoint: &str) -> String {
    format!("{}/{endpoint}", base.as_str().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn opts_for(uri: &str) -> SourceOptions {
        SourceOptions {
            base_url: Url::parse(uri).unwrap(),
            timeout: Duration::from_secs(5),
            verify_tls: false,
        }
    }

    #[test]
    fn test_endpoint_url_root() {
        let base = Url::parse("https://jsonplaceholder.typicode.com").unwrap();
        assert_eq!(
            endpoint_url(&base, "users"),
            "https://jsonplaceholder.typicode.com/users"
        );
    }

    #[test]
    fn test_endpoint_url_with_path() {
        let base = Url::parse("http://localhost:3000/api/v1/").unwrap();
        assert_eq!(endpoint_url(&base, "posts"), "http://localhost:3000/api/v1/posts");
    }

    #[tokio::test]
    async fn test_fetch_users_from_mock_server() {
        let server = wiremock::MockServer::start().await;

        let users = std::fs::read_to_string("../../../fixtures/api/users.json")
            .expect("read users fixture");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/users"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(&users))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&opts_for(&server.uri())).unwrap();
        let fetched = client.fetch_users().await.unwrap();

        assert_eq!(fetched.len(), 4);
        assert_eq!(fetched[1].name, "Ervin Howell");
        assert!(fetched[3].company.is_none());
    }

    #[tokio::test]
    async fn test_fetch_posts_from_mock_server() {
        let server = wiremock::MockServer::start().await;

        let posts = std::fs::read_to_string("../../../fixtures/api/posts.json")
            .expect("read posts fixture");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/posts"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(&posts))
            .mount(&server)
            .await;

        let client = ApiClient::new(&opts_for(&server.uri())).unwrap();
        let fetched = client.fetch_posts().await.unwrap();

        assert_eq!(fetched.len(), 6);
        assert_eq!(fetched[5].user_id, 99);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/users"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(&opts_for(&server.uri())).unwrap();
        let err = client.fetch_users().await.unwrap_err();

        assert!(matches!(err, EtlError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/posts"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(r#"{"error": "not a list"}"#),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&opts_for(&server.uri())).unwrap();
        let err = client.fetch_posts().await.unwrap_err();

        assert!(matches!(err, EtlError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_empty_array() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/posts"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&opts_for(&format!("{}/", server.uri()))).unwrap();
        let fetched = client.fetch_posts().await.unwrap();

        assert!(fetched.is_empty());
    }
}
