use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::MAX_RESULTS_LIMIT;
use crate::credentials::Credentials;
use crate::model::UpdateInstruction;
use crate::youtube::model::{
    ChannelItem, ListResponse, PlaylistItem, TokenResponse, VideoItem, VideoUpdateBody,
};

pub mod model;

/// Fetch and apply operations against the video host.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Identifier of the authenticated channel's uploads playlist.
    async fn uploads_playlist_id(&self) -> Result<String>;

    /// Up to `max_results` most recent video ids from the playlist.
    async fn recent_video_ids(&self, playlist_id: &str, max_results: u32) -> Result<Vec<String>>;

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoItem>>;

    /// Overwrite title, description and category of one video.
    async fn update_video(&self, instruction: &UpdateInstruction) -> Result<()>;
}

/// `None` when `expires_in` is out of range; such a token is treated as
/// non-expiring for the rest of the run.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|d| now.checked_add_signed(d))
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

pub struct YouTubeClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    pub fn new(credentials: Credentials, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("yt-retitler/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_http(http, credentials, base_url))
    }

    pub fn with_http(http: Client, credentials: Credentials, base_url: Url) -> Self {
        let token = credentials
            .usable_token(Utc::now())
            .map(|value| AccessToken {
                value: value.to_string(),
                expires_at: credentials.expiry,
            });
        Self {
            http,
            base_url,
            credentials,
            token: Mutex::new(token),
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .context("invalid YouTube base URL")?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        bearer: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build YouTube request")
    }

    /// Return a usable bearer token, refreshing through the OAuth token
    /// endpoint when the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let slack = Duration::seconds(60);
        if let Some(tok) = guard.as_ref() {
            let fresh = tok
                .expires_at
                .map(|at| at - slack > Utc::now())
                .unwrap_or(true);
            if fresh {
                return Ok(tok.value.clone());
            }
        }

        debug!(token_uri = %self.credentials.token_uri, "refreshing access token");
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let res = self
            .http
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .context("failed to reach OAuth token endpoint")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("token refresh failed {}: {}", status, body));
        }
        let payload: TokenResponse = res.json().await.context("invalid token response JSON")?;
        let fetched = AccessToken {
            value: payload.access_token,
            expires_at: payload
                .expires_in
                .and_then(|secs| expiry_after(Utc::now(), secs)),
        };
        let value = fetched.value.clone();
        *guard = Some(fetched);
        info!("access token refreshed");
        Ok(value)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let bearer = self.access_token().await?;
        let request = self.build_request(method, url, &bearer, body)?;
        debug!(method = %request.method(), url = %request.url(), "youtube request");

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach YouTube")?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "YouTube refused the request (quota or scope): {}", body);
            return Err(anyhow!("youtube error {}: {}", status, body));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "YouTube API error: {}", body);
            return Err(anyhow!("youtube error {}: {}", status, body));
        }

        let text = res.text().await.context("failed to read YouTube response")?;
        serde_json::from_str(&text).context("invalid YouTube response JSON")
    }
}

#[async_trait]
impl VideoService for YouTubeClient {
    async fn uploads_playlist_id(&self) -> Result<String> {
        let url = self.endpoint("channels", &[("part", "contentDetails"), ("mine", "true")])?;
        let res: ListResponse<ChannelItem> = self.send(Method::GET, url, None).await?;
        res.items
            .into_iter()
            .next()
            .and_then(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| anyhow!("could not retrieve channel details; check API permissions"))
    }

    async fn recent_video_ids(&self, playlist_id: &str, max_results: u32) -> Result<Vec<String>> {
        let max = max_results.clamp(1, MAX_RESULTS_LIMIT).to_string();
        let url = self.endpoint(
            "playlistItems",
            &[
                ("part", "contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", max.as_str()),
            ],
        )?;
        let res: ListResponse<PlaylistItem> = self.send(Method::GET, url, None).await?;
        Ok(res
            .items
            .into_iter()
            .map(|i| i.content_details.video_id)
            .collect())
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let url = self.endpoint("videos", &[("part", "snippet,status"), ("id", joined.as_str())])?;
        let res: ListResponse<VideoItem> = self.send(Method::GET, url, None).await?;
        Ok(res.items)
    }

    async fn update_video(&self, instruction: &UpdateInstruction) -> Result<()> {
        let url = self.endpoint("videos", &[("part", "snippet")])?;
        let body = serde_json::to_value(VideoUpdateBody::from(instruction))
            .context("failed to encode update body")?;
        let _: serde_json::Value = self.send(Method::PUT, url, Some(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn creds() -> Credentials {
        Credentials {
            token: Some("cached".into()),
            refresh_token: "r".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
            expiry: Some(Utc::now() + Duration::hours(1)),
            scopes: vec![],
        }
    }

    fn client() -> YouTubeClient {
        let base = Url::parse("https://www.googleapis.com/youtube/v3/").unwrap();
        YouTubeClient::new(creds(), base).unwrap()
    }

    #[test]
    fn endpoint_joins_base_and_encodes_query() {
        let url = client()
            .endpoint("videos", &[("part", "snippet,status"), ("id", "a,b")])
            .unwrap();
        assert_eq!(url.path(), "/youtube/v3/videos");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("part".to_string(), "snippet,status".to_string()),
                ("id".to_string(), "a,b".to_string()),
            ]
        );
    }

    #[test]
    fn build_request_sets_headers_and_body() {
        let c = client();
        let url = c.endpoint("videos", &[("part", "snippet")]).unwrap();
        let body = json!({ "id": "v" });
        let request = c
            .build_request(Method::PUT, url, "tok", Some(&body))
            .unwrap();
        assert_eq!(request.method(), Method::PUT);
        let headers = request.headers();
        assert_eq!(
            headers.get("Authorization").and_then(|h| h.to_str().ok()),
            Some("Bearer tok")
        );
        assert_eq!(
            headers.get("Content-Type").and_then(|h| h.to_str().ok()),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn cached_token_is_used_without_refresh() {
        let c = client();
        assert_eq!(c.access_token().await.unwrap(), "cached");
    }

    #[test]
    fn debug_hides_credentials() {
        let out = format!("{:?}", client());
        assert!(out.contains("googleapis"));
        assert!(!out.contains("cached"));
    }

    #[test]
    fn expiry_after_rejects_out_of_range_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 3600), Some(now + Duration::hours(1)));
        assert_eq!(expiry_after(now, i64::MAX), None);
        assert_eq!(expiry_after(now, i64::MIN), None);
    }

    /// Serves `responses` in order, one request per connection, and records
    /// every raw request it receives.
    async fn canned_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let raw = read_request(&mut sock).await;
                log.lock().await.push(raw);
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                sock.write_all(reply.as_bytes()).await.unwrap();
                sock.shutdown().await.ok();
            }
        });
        (format!("http://{addr}"), seen)
    }

    async fn read_request(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn loopback_client(base: &str) -> YouTubeClient {
        let creds = Credentials {
            token: None,
            refresh_token: "r-token".into(),
            token_uri: format!("{base}/token"),
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            expiry: None,
            scopes: vec![],
        };
        let api = Url::parse(&format!("{base}/youtube/v3/")).unwrap();
        let http = Client::builder().no_proxy().build().unwrap();
        YouTubeClient::with_http(http, creds, api)
    }

    #[tokio::test]
    async fn refreshes_once_and_reuses_token_then_surfaces_quota_error() {
        let (base, seen) = canned_server(vec![
            (200, r#"{"access_token":"fresh","expires_in":3600}"#),
            (200, r#"{"items":[{"contentDetails":{"relatedPlaylists":{"uploads":"UUx"}}}]}"#),
            (200, r#"{"items":[{"contentDetails":{"videoId":"v1"}}]}"#),
            (403, r#"{"error":"quotaExceeded"}"#),
        ])
        .await;
        let c = loopback_client(&base);

        assert_eq!(c.uploads_playlist_id().await.unwrap(), "UUx");
        assert_eq!(c.recent_video_ids("UUx", 20).await.unwrap(), vec!["v1".to_string()]);
        let err = c.videos(&["v1".to_string()]).await.unwrap_err().to_string();
        assert!(err.contains("403"), "{err}");
        assert!(err.contains("quotaExceeded"), "{err}");

        let requests: Vec<String> = seen.lock().await.iter().map(|r| r.to_lowercase()).collect();
        assert_eq!(requests.len(), 4);
        assert!(requests[0].starts_with("post /token"));
        assert!(requests[0].contains("grant_type=refresh_token"));
        assert!(requests[0].contains("refresh_token=r-token"));
        assert!(requests[0].contains("client_id=client-1"));
        assert!(requests[0].contains("application/x-www-form-urlencoded"));
        assert!(requests[1].starts_with("get /youtube/v3/channels?"));
        for later in &requests[1..] {
            assert!(later.contains("authorization: bearer fresh"), "{later}");
            assert!(!later.starts_with("post /token"));
        }
    }

    #[tokio::test]
    async fn server_error_on_update_carries_status_and_body() {
        let (base, seen) = canned_server(vec![
            (200, r#"{"access_token":"fresh"}"#),
            (500, r#"{"error":"backendError"}"#),
        ])
        .await;
        let c = loopback_client(&base);
        let ins = UpdateInstruction {
            video_id: "v1".into(),
            title: "New".into(),
            description: "body\n\n[updated-by-bot]".into(),
            category_id: "22".into(),
        };

        let err = c.update_video(&ins).await.unwrap_err().to_string();
        assert!(err.contains("500"), "{err}");
        assert!(err.contains("backendError"), "{err}");

        let requests = seen.lock().await.clone();
        assert!(requests[1].starts_with("PUT /youtube/v3/videos?part=snippet"));
        assert!(requests[1].contains(r#""categoryId":"22""#));
    }

    #[tokio::test]
    async fn failed_refresh_is_an_error() {
        let (base, _seen) = canned_server(vec![(400, r#"{"error":"invalid_grant"}"#)]).await;
        let c = loopback_client(&base);
        let err = c.uploads_playlist_id().await.unwrap_err().to_string();
        assert!(err.contains("token refresh failed 400"), "{err}");
        assert!(err.contains("invalid_grant"), "{err}");
    }
}
