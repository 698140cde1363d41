use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    auth::AuthFlow,
    config::Config,
    domain::{Authenticated, Channel},
    errors::Error,
    rpc::{
        client::RpcClient,
        port::{Connector, Endpoint},
    },
    Result,
};

/// Precondition an endpoint must meet after login for the prober to stop there.
#[async_trait]
pub trait Probe: Send {
    type Output: Send;

    /// `Ok(None)` is a soft miss: log it and move on to the next endpoint.
    async fn check(&mut self, rpc: &mut RpcClient) -> Result<Option<Self::Output>>;

    fn miss_reason(&self) -> &'static str {
        "endpoint did not satisfy the probe"
    }
}

/// Any endpoint that logs in is good enough.
pub struct AnyInstance;

#[async_trait]
impl Probe for AnyInstance {
    type Output = ();

    async fn check(&mut self, _rpc: &mut RpcClient) -> Result<Option<()>> {
        Ok(Some(()))
    }
}

/// Stop at the first instance whose user sits in a voice channel.
pub struct InVoiceChannel;

#[async_trait]
impl Probe for InVoiceChannel {
    type Output = Channel;

    async fn check(&mut self, rpc: &mut RpcClient) -> Result<Option<Channel>> {
        rpc.get_selected_voice_channel().await
    }

    fn miss_reason(&self) -> &'static str {
        "connected client is not in a voice channel"
    }
}

/// A logged-in connection found by the prober.
pub struct Session<T> {
    pub rpc: RpcClient,
    pub endpoint: Endpoint,
    pub auth: Authenticated,
    pub output: T,
}

/// Walks the candidate endpoints with a bounded number of attempts.
pub struct Prober {
    connector: Arc<dyn Connector>,
    candidates: Vec<Endpoint>,
    max_attempts: u32,
    client_id: String,
    rpc_timeout: Duration,
}

impl Prober {
    pub fn new(
        connector: Arc<dyn Connector>,
        candidates: Vec<Endpoint>,
        max_attempts: u32,
        client_id: impl Into<String>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            candidates,
            max_attempts: max_attempts.max(1),
            client_id: client_id.into(),
            rpc_timeout,
        }
    }

    pub fn from_config(connector: Arc<dyn Connector>, cfg: &Config) -> Self {
        Self::new(
            connector,
            Endpoint::candidates(cfg.transport),
            cfg.max_attempts,
            cfg.client_id.clone(),
            cfg.rpc_timeout,
        )
    }

    /// Connect, log in and run `probe`, one candidate per attempt.
    ///
    /// Attempt `n` targets `candidates[n % len]`. Fatal errors stop immediately;
    /// after `max_attempts` failures the result is `Error::Exhausted`.
    pub async fn run<P: Probe>(
        &self,
        auth: &AuthFlow,
        probe: &mut P,
    ) -> Result<Session<P::Output>> {
        if self.candidates.is_empty() {
            return Err(Error::Config("no candidate endpoints to probe".to_string()));
        }

        let mut last = String::new();
        for attempt in 0..self.max_attempts {
            let endpoint = &self.candidates[attempt as usize % self.candidates.len()];
            info!(%endpoint, attempt = attempt + 1, "connecting");

            match self.attempt(endpoint, auth, probe).await {
                Ok(Some(session)) => return Ok(session),
                Ok(None) => {
                    warn!(%endpoint, "{}", probe.miss_reason());
                    last = format!("{endpoint}: {}", probe.miss_reason());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%endpoint, error = %e, "attempt failed");
                    last = format!("{endpoint}: {e}");
                }
            }

            if attempt + 1 < self.max_attempts {
                info!("trying next endpoint ({} of {})", attempt + 2, self.max_attempts);
            }
        }

        Err(Error::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }

    async fn attempt<P: Probe>(
        &self,
        endpoint: &Endpoint,
        auth: &AuthFlow,
        probe: &mut P,
    ) -> Result<Option<Session<P::Output>>> {
        let transport = self.connector.connect(endpoint).await?;
        let mut rpc = RpcClient::start(transport, self.client_id.clone(), self.rpc_timeout).await?;

        match login_and_check(&mut rpc, auth, probe).await {
            Ok((auth, Some(output))) => Ok(Some(Session {
                rpc,
                endpoint: endpoint.clone(),
                auth,
                output,
            })),
            Ok((_, None)) => {
                let _ = rpc.close().await;
                Ok(None)
            }
            Err(e) => {
                let _ = rpc.close().await;
                Err(e)
            }
        }
    }
}

async fn login_and_check<P: Probe>(
    rpc: &mut RpcClient,
    auth: &AuthFlow,
    probe: &mut P,
) -> Result<(Authenticated, Option<P::Output>)> {
    let session = auth.login(rpc).await?;
    let output = probe.check(rpc).await?;
    Ok((session, output))
}
