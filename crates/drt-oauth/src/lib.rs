//! Token exchange adapters (authorization code -> access token).
//!
//! Both strategies ask the host application for consent over RPC first, then
//! trade the returned code at an HTTP endpoint. Which one runs is a config choice.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use drt_core::{
    auth::Authorizer,
    config::{AuthorizerKind, Config},
    errors::Error,
    rpc::client::RpcClient,
    Result,
};

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::External(format!("http client build failed: {e}")))
}

/// Send a prepared token request and pull `access_token` out of the JSON reply.
async fn read_token(req: reqwest::RequestBuilder) -> Result<String> {
    let resp = req
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token endpoint unreachable: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Exchange {
            status: status.as_u16(),
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        });
    }

    let body: TokenResponse = resp
        .json()
        .await
        .map_err(|e| Error::Auth(format!("token endpoint returned invalid json: {e}")))?;

    body.access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Auth("token endpoint response had no access_token".to_string()))
}

/// StreamKit overlay exchange: `POST {"code": ...}` as JSON.
#[derive(Clone, Debug)]
pub struct StreamKitAuthorizer {
    http: reqwest::Client,
    token_url: String,
}

impl StreamKitAuthorizer {
    pub fn new(token_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            token_url: token_url.into(),
        })
    }

    pub async fn exchange(&self, code: &str) -> Result<String> {
        debug!(url = %self.token_url, "exchanging code via streamkit");
        read_token(
            self.http
                .post(&self.token_url)
                .json(&serde_json::json!({ "code": code })),
        )
        .await
    }
}

#[async_trait]
impl Authorizer for StreamKitAuthorizer {
    async fn authorize(&self, rpc: &mut RpcClient, scopes: &[String]) -> Result<String> {
        let code = rpc.authorize(scopes).await?;
        self.exchange(&code).await
    }
}

/// OAuth2 authorization-code grant using the application's own secret.
#[derive(Clone, Debug)]
pub struct OAuthAuthorizer {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthAuthorizer {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        })
    }

    pub async fn exchange(&self, code: &str) -> Result<String> {
        debug!(url = %self.token_url, "exchanging code via oauth2");
        read_token(self.http.post(&self.token_url).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ]))
        .await
    }
}

#[async_trait]
impl Authorizer for OAuthAuthorizer {
    async fn authorize(&self, rpc: &mut RpcClient, scopes: &[String]) -> Result<String> {
        let code = rpc.authorize(scopes).await?;
        self.exchange(&code).await
    }
}

/// Build the strategy the config selects.
pub fn authorizer_from_config(cfg: &Config) -> Result<Arc<dyn Authorizer>> {
    match cfg.authorizer {
        AuthorizerKind::StreamKit => Ok(Arc::new(StreamKitAuthorizer::new(cfg.token_url.clone())?)),
        AuthorizerKind::OAuth => {
            let secret = cfg.client_secret.clone().ok_or_else(|| {
                Error::Config("DRT_CLIENT_SECRET is required for the oauth authorizer".to_string())
            })?;
            Ok(Arc::new(OAuthAuthorizer::new(
                cfg.token_url.clone(),
                cfg.client_id.clone(),
                secret,
                cfg.redirect_uri.clone(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn streamkit_posts_code_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/overlay/token")
            .match_body(Matcher::Json(serde_json::json!({ "code": "abc" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-1"}"#)
            .create_async()
            .await;

        let auth = StreamKitAuthorizer::new(format!("{}/overlay/token", server.url())).unwrap();
        assert_eq!(auth.exchange("abc").await.unwrap(), "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_exchange_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/overlay/token")
            .with_status(401)
            .with_body(r#"{"message":"401: Unauthorized"}"#)
            .create_async()
            .await;

        let auth = StreamKitAuthorizer::new(format!("{}/overlay/token", server.url())).unwrap();
        match auth.exchange("abc").await {
            Err(Error::Exchange { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_access_token_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let auth = StreamKitAuthorizer::new(format!("{}/token", server.url())).unwrap();
        let err = auth.exchange("abc").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn oauth_posts_form_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "123".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://localhost/cb".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-2","token_type":"Bearer","expires_in":604800}"#)
            .create_async()
            .await;

        let auth = OAuthAuthorizer::new(
            format!("{}/api/oauth2/token", server.url()),
            "123",
            "s3cret",
            "http://localhost/cb",
        )
        .unwrap();
        assert_eq!(auth.exchange("abc").await.unwrap(), "tok-2");
        mock.assert_async().await;
    }

    #[test]
    fn builds_strategy_from_config() {
        let cfg = Config::from_lookup(|k| match k {
            "DRT_CLIENT_ID" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(authorizer_from_config(&cfg).is_ok());

        let mut cfg = cfg;
        cfg.authorizer = AuthorizerKind::OAuth;
        cfg.client_secret = None;
        assert!(matches!(
            authorizer_from_config(&cfg).err().unwrap(),
            Error::Config(_)
        ));
    }
}
