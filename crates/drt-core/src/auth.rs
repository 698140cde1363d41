use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    domain::Authenticated, errors::Error, rpc::client::RpcClient, store::TokenStore, Result,
};

/// Strategy that obtains a fresh access token for `scopes`.
///
/// Implementations typically ask the host application for consent (`AUTHORIZE`)
/// and trade the returned code for a token at some HTTP endpoint.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, rpc: &mut RpcClient, scopes: &[String]) -> Result<String>;
}

/// Where a login attempt currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    HaveToken(String),
    NoToken,
    Authenticated,
}

/// Cached-token-then-consent login against one connected client.
pub struct AuthFlow {
    store: TokenStore,
    authorizer: Arc<dyn Authorizer>,
    scopes: Vec<String>,
}

impl AuthFlow {
    pub fn new(store: TokenStore, authorizer: Arc<dyn Authorizer>, scopes: Vec<String>) -> Self {
        Self {
            store,
            authorizer,
            scopes,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Log in on `rpc`, reusing the cached token when the host accepts it.
    ///
    /// A rejected cached token falls back to interactive authorization exactly
    /// once; a failure there is `Error::Auth` (fatal), as is an unusable token
    /// store (`Error::Store`). Transport errors are returned unchanged so the
    /// prober can try the next endpoint.
    pub async fn login(&self, rpc: &mut RpcClient) -> Result<Authenticated> {
        let mut state = match self.store.get()? {
            Some(token) => AuthState::HaveToken(token),
            None => AuthState::NoToken,
        };

        loop {
            state = match state {
                AuthState::HaveToken(token) => match rpc.authenticate(&token).await {
                    Ok(_) => AuthState::Authenticated,
                    Err(e) if e.is_rpc_rejection() => {
                        warn!(
                            error = %e,
                            "cached access token rejected, falling back to authorization"
                        );
                        AuthState::NoToken
                    }
                    Err(e) => return Err(e),
                },
                AuthState::NoToken => {
                    info!("requesting authorization from the host application");
                    let token = self
                        .authorizer
                        .authorize(rpc, &self.scopes)
                        .await
                        .map_err(into_auth_failure)?;
                    rpc.authenticate(&token).await.map_err(into_auth_failure)?;
                    self.store.set(&token)?;
                    AuthState::Authenticated
                }
                AuthState::Authenticated => break,
            };
        }

        let session = rpc
            .session()
            .cloned()
            .ok_or_else(|| Error::Auth("no session after login".to_string()))?;
        info!(application = %session.application.name, "logged in");
        info!(user = %session.user.username, "authorized for user");
        Ok(session)
    }
}

fn into_auth_failure(e: Error) -> Error {
    match e {
        Error::Rpc { code, message } => Error::Auth(format!("{message} ({code})")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::tmp_dir;
    use crate::testing::{CountingAuthorizer, FakeHost, FRESH_TOKEN};
    use std::time::Duration;

    async fn connect(host: &FakeHost) -> RpcClient {
        RpcClient::start(Box::new(host.transport()), "123", Duration::from_secs(1))
            .await
            .unwrap()
    }

    fn flow(prefix: &str) -> (AuthFlow, Arc<CountingAuthorizer>) {
        let authorizer = Arc::new(CountingAuthorizer::default());
        let flow = AuthFlow::new(
            TokenStore::in_dir(&tmp_dir(prefix)),
            authorizer.clone(),
            vec!["rpc".into(), "messages.read".into()],
        );
        (flow, authorizer)
    }

    #[tokio::test]
    async fn valid_cached_token_skips_authorization() {
        let (flow, authorizer) = flow("drt-auth-cached");
        flow.store().set("cached").unwrap();
        let host = FakeHost::with_tokens(&["cached"]);
        let mut rpc = connect(&host).await;

        let session = flow.login(&mut rpc).await.unwrap();
        assert_eq!(session.user.username, "tester");
        assert_eq!(authorizer.calls(), 0);
        assert!(!host.sent_commands().contains(&"AUTHORIZE".to_string()));
        assert_eq!(flow.store().get().unwrap().as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn invalid_cached_token_falls_back_once() {
        let (flow, authorizer) = flow("drt-auth-stale");
        flow.store().set("stale").unwrap();
        let host = FakeHost::with_tokens(&[FRESH_TOKEN]);
        let mut rpc = connect(&host).await;

        flow.login(&mut rpc).await.unwrap();
        assert_eq!(authorizer.calls(), 1);
        assert_eq!(
            host.sent_commands(),
            vec!["AUTHENTICATE", "AUTHORIZE", "AUTHENTICATE"]
        );
        assert_eq!(flow.store().get().unwrap().as_deref(), Some(FRESH_TOKEN));
    }

    #[tokio::test]
    async fn no_token_goes_straight_to_authorization() {
        let (flow, authorizer) = flow("drt-auth-empty");
        let host = FakeHost::with_tokens(&[FRESH_TOKEN]);
        let mut rpc = connect(&host).await;

        flow.login(&mut rpc).await.unwrap();
        assert_eq!(authorizer.calls(), 1);
        assert_eq!(host.sent_commands(), vec!["AUTHORIZE", "AUTHENTICATE"]);
    }

    #[tokio::test]
    async fn denied_consent_is_fatal_and_caches_nothing() {
        let (flow, authorizer) = flow("drt-auth-denied");
        let mut host = FakeHost::with_tokens(&[FRESH_TOKEN]);
        host.deny_authorize = true;
        let mut rpc = connect(&host).await;

        let err = flow.login(&mut rpc).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.is_fatal());
        assert_eq!(authorizer.calls(), 1);
        assert_eq!(flow.store().get().unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_fresh_token_is_fatal() {
        let (flow, _authorizer) = flow("drt-auth-rejected");
        // Host accepts nothing, not even the freshly exchanged token.
        let host = FakeHost::default();
        let mut rpc = connect(&host).await;

        let err = flow.login(&mut rpc).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(flow.store().get().unwrap(), None);
    }
}
