use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DingTalkConfig;
use crate::core::notify::Notifier;

/// DingTalk enterprise-robot client (v1.0 API). Access tokens are valid for
/// 7200 seconds; the client caches one and refreshes on an
/// `InvalidAuthentication` reply.
pub struct DingTalkClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    robot_code: String,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SendResponse {
    #[serde(rename = "processQueryKey")]
    process_query_key: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl DingTalkClient {
    pub fn new(base_url: &str, config: &DingTalkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("seabrief/1.0")
            .build()?;

        Ok(DingTalkClient {
            base_url: base_url.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            robot_code: config.robot_code().to_string(),
            http,
            token: Mutex::new(None),
        })
    }

    pub fn from_config(config: &DingTalkConfig) -> Result<Self> {
        Self::new(&config.base_url, config)
    }

    async fn fetch_token(&self) -> Result<String> {
        let url = format!("{}/v1.0/oauth2/accessToken", self.base_url);
        let body = json!({
            "appKey": self.client_id,
            "appSecret": self.client_secret,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Access token request failed")?;

        let data = response.json::<TokenResponse>().await?;
        let token = data
            .access_token
            .ok_or_else(|| anyhow!("DingTalk did not return an access token"))?;
        debug!("Obtained DingTalk access token");
        Ok(token)
    }

    async fn access_token(&self, force_refresh: bool) -> Result<String> {
        let mut cached = self.token.lock().await;
        if !force_refresh {
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
        }
        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Verifies the configured credentials by forcing a fresh token fetch.
    pub async fn check_auth(&self) -> Result<()> {
        self.access_token(true).await.map(|_| ())
    }

    async fn post_message(&self, token: &str, payload: &serde_json::Value) -> Result<SendResponse> {
        let url = format!("{}/v1.0/robot/groupMessages/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-acs-dingtalk-access-token", token)
            .json(payload)
            .send()
            .await
            .context("Group message request failed")?;

        Ok(response.json::<SendResponse>().await?)
    }
}

#[async_trait]
impl Notifier for DingTalkClient {
    async fn send_markdown(&self, conversation_id: &str, title: &str, text: &str) -> Result<()> {
        let msg_param = serde_json::to_string(&json!({
            "title": title,
            "text": text,
            "single_title": "View more",
            "single_url": "https://www.dingtalk.com",
        }))?;
        let payload = json!({
            "robotCode": self.robot_code,
            "openConversationId": conversation_id,
            "msgKey": "sampleMarkdown",
            "msgParam": msg_param,
        });

        let token = self.access_token(false).await?;
        let mut result = self.post_message(&token, &payload).await?;

        // A stale token gets one refresh-and-retry
        if result.process_query_key.is_none() && result.code.as_deref() == Some("InvalidAuthentication")
        {
            warn!("DingTalk token rejected, refreshing and retrying once");
            let token = self.access_token(true).await?;
            result = self.post_message(&token, &payload).await?;
        }

        match result.process_query_key {
            Some(query_key) => {
                info!("Message sent, query key: {query_key}");
                Ok(())
            }
            None => Err(anyhow!(
                "Failed to send message: {} - {}",
                result.code.unwrap_or_else(|| "unknown".to_string()),
                result.message.unwrap_or_else(|| "unknown error".to_string())
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> DingTalkConfig {
        DingTalkConfig {
            base_url: String::new(),
            client_id: "test-app-key".to_string(),
            client_secret: "test-app-secret".to_string(),
            robot_code: None,
        }
    }

    async fn mount_token(mock_server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/v1.0/oauth2/accessToken"))
            .and(body_string_contains("test-app-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(r#"{{"accessToken": "{token}", "expireIn": 7200}}"#)),
            )
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_send_markdown_success() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server, "tok-1").await;

        Mock::given(method("POST"))
            .and(path("/v1.0/robot/groupMessages/send"))
            .and(header("x-acs-dingtalk-access-token", "tok-1"))
            .and(body_string_contains("sampleMarkdown"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"processQueryKey": "qk-1"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        client
            .send_markdown("cidAAA=", "Daily briefing", "## hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_is_cached_across_sends() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1.0/oauth2/accessToken"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"accessToken": "tok-1", "expireIn": 7200}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1.0/robot/groupMessages/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"processQueryKey": "qk"}"#),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        client.send_markdown("cidAAA=", "t", "a").await.unwrap();
        client.send_markdown("cidAAA=", "t", "b").await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_on_invalid_authentication() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server, "tok-fresh").await;

        // First send rejected, second accepted
        Mock::given(method("POST"))
            .and(path("/v1.0/robot/groupMessages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"code": "InvalidAuthentication", "message": "token expired"}"#,
            ))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1.0/robot/groupMessages/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"processQueryKey": "qk-2"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        client.send_markdown("cidAAA=", "t", "text").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_reports_code_and_message() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server, "tok-1").await;

        Mock::given(method("POST"))
            .and(path("/v1.0/robot/groupMessages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"code": "robotNotInConversation", "message": "robot is not in the group"}"#,
            ))
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        let result = client.send_markdown("cidAAA=", "t", "text").await;
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("robotNotInConversation"));
        assert!(message.contains("robot is not in the group"));
    }

    #[tokio::test]
    async fn test_check_auth_fetches_a_token() {
        let mock_server = MockServer::start().await;
        mount_token(&mock_server, "tok-1").await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        client.check_auth().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_auth_reports_bad_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1.0/oauth2/accessToken"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"code": "invalidAppKey"}"#),
            )
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        assert!(client.check_auth().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_token_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1.0/oauth2/accessToken"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"code": "invalidAppKey"}"#),
            )
            .mount(&mock_server)
            .await;

        let client = DingTalkClient::new(&mock_server.uri(), &test_config()).unwrap();
        let result = client.send_markdown("cidAAA=", "t", "text").await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("did not return an access token")
        );
    }
}
