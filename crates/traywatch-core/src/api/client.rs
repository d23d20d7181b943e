use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{Conversation, Membership, Team, User};
use crate::store::SnapshotProvider;

/// Minimal client for the server's REST API (v4).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// Who we are watching for. Looked up once at startup.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub teams: Vec<Team>,
}

impl ApiClient {
    pub fn new(host: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(format!("https://{}/api/v4", host), token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("traywatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(http, base_url, token))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.get("/users/me").await
    }

    pub async fn get_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, ApiError> {
        self.get(&teams_path(user_id)).await
    }

    pub async fn get_channels_for_team_and_user(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ApiError> {
        self.get(&channels_path(team_id, user_id)).await
    }

    pub async fn get_channel_members_for_user(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> Result<Vec<Membership>, ApiError> {
        self.get(&members_path(user_id, team_id)).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn teams_path(user_id: &str) -> String {
    format!("/users/{}/teams", user_id)
}

fn channels_path(team_id: &str, user_id: &str) -> String {
    format!(
        "/users/{}/teams/{}/channels?include_deleted=false&last_delete_at=0",
        user_id, team_id
    )
}

fn members_path(user_id: &str, team_id: &str) -> String {
    format!("/users/{}/teams/{}/channels/members", user_id, team_id)
}

#[async_trait]
impl SnapshotProvider for ApiClient {
    async fn list_conversations(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ApiError> {
        self.get_channels_for_team_and_user(team_id, user_id).await
    }

    async fn list_memberships(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> Result<Vec<Membership>, ApiError> {
        self.get_channel_members_for_user(user_id, team_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_host() {
        let client = ApiClient::new("chat.example.com", "tok").unwrap();
        assert_eq!(client.base_url(), "https://chat.example.com/api/v4");
        assert_eq!(client.url("/users/me"), "https://chat.example.com/api/v4/users/me");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ApiClient::with_base_url("http://localhost:8065/api/v4/", "tok").unwrap();
        assert_eq!(client.url("/users/me"), "http://localhost:8065/api/v4/users/me");
    }

    #[test]
    fn test_paths() {
        assert_eq!(teams_path("u1"), "/users/u1/teams");
        assert_eq!(
            channels_path("t1", "u1"),
            "/users/u1/teams/t1/channels?include_deleted=false&last_delete_at=0"
        );
        assert_eq!(members_path("u1", "t1"), "/users/u1/teams/t1/channels/members");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = ApiClient::new("chat.example.com", "secret-token").unwrap();
        assert!(!format!("{:?}", client).contains("secret-token"));
    }

    /// Serve one canned HTTP response on a local port and return the request
    /// line and headers that were received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        (format!("http://{}/api/v4", addr), handle)
    }

    fn local_client(base_url: &str) -> ApiClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        ApiClient::with_http_client(http, base_url, "tok")
    }

    #[tokio::test]
    async fn test_get_me_sends_bearer_token() {
        let (base_url, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"id":"u1","username":"alice","roles":"system_user"}"#)
                .await;
        let user = local_client(&base_url).get_me().await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.username, "alice");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/v4/users/me "));
        assert!(request.contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (base_url, server) =
            serve_once("HTTP/1.1 401 Unauthorized", r#"{"message":"invalid token"}"#).await;
        let err = local_client(&base_url)
            .get_teams_for_user("u1")
            .await
            .unwrap_err();
        server.await.unwrap();

        match err {
            ApiError::Status { status, path, body } => {
                assert_eq!(status, 401);
                assert_eq!(path, "/users/u1/teams");
                assert!(body.contains("invalid token"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_members_decode_through_provider() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"[{"channel_id":"c1","msg_count":5,"msg_count_root":4,"mention_count":1}]"#,
        )
        .await;
        let members = local_client(&base_url)
            .list_memberships("u1", "t1")
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].conversation_id, "c1");
        assert_eq!(members[0].mention_count, 1);
    }
}
