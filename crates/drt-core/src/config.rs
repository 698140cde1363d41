use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_SCOPES: &[&str] = &["rpc", "messages.read"];
pub const DEFAULT_ORIGIN: &str = "https://streamkit.discord.com";
pub const DEFAULT_REDIRECT_URI: &str = "https://streamkit.discord.com/";
pub const STREAMKIT_TOKEN_URL: &str = "https://streamkit.discord.com/overlay/token";
pub const OAUTH_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Which local transport the prober walks through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Ipc,
    WebSocket,
}

impl TransportKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ipc" => Some(Self::Ipc),
            "ws" | "websocket" => Some(Self::WebSocket),
            _ => None,
        }
    }
}

/// How an authorization code is turned into an access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizerKind {
    /// StreamKit overlay endpoint: JSON `{code}` in, `access_token` out.
    StreamKit,
    /// Standard OAuth2 authorization-code grant (needs the client secret).
    OAuth,
}

impl AuthorizerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "streamkit" => Some(Self::StreamKit),
            "oauth" | "oauth2" => Some(Self::OAuth),
            _ => None,
        }
    }

    pub fn default_token_url(self) -> &'static str {
        match self {
            Self::StreamKit => STREAMKIT_TOKEN_URL,
            Self::OAuth => OAUTH_TOKEN_URL,
        }
    }
}

/// Typed configuration, read from the environment (and `./.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Application
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,

    // Token exchange
    pub authorizer: AuthorizerKind,
    pub token_url: String,
    pub redirect_uri: String,

    // Transport
    pub transport: TransportKind,
    pub origin: String,
    pub max_attempts: u32,
    pub rpc_timeout: Duration,

    // Files
    pub store_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |k: &str| lookup(k).and_then(non_empty);

        let client_id = get("DRT_CLIENT_ID").ok_or_else(|| {
            Error::Config("DRT_CLIENT_ID environment variable is required".to_string())
        })?;
        let client_secret = get("DRT_CLIENT_SECRET");

        let scopes = get("DRT_SCOPES")
            .map(|s| parse_csv(&s))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        let authorizer = match get("DRT_AUTHORIZER") {
            Some(raw) => AuthorizerKind::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "DRT_AUTHORIZER must be `streamkit` or `oauth`, got `{raw}`"
                ))
            })?,
            None if client_secret.is_some() => AuthorizerKind::OAuth,
            None => AuthorizerKind::StreamKit,
        };
        if authorizer == AuthorizerKind::OAuth && client_secret.is_none() {
            return Err(Error::Config(
                "DRT_CLIENT_SECRET is required for the oauth authorizer".to_string(),
            ));
        }
        let token_url =
            get("DRT_TOKEN_URL").unwrap_or_else(|| authorizer.default_token_url().to_string());
        let redirect_uri =
            get("DRT_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        let transport = match get("DRT_TRANSPORT") {
            Some(raw) => TransportKind::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "DRT_TRANSPORT must be `ipc` or `websocket`, got `{raw}`"
                ))
            })?,
            None => TransportKind::Ipc,
        };
        let origin = get("DRT_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let max_attempts = parse_u64(&get, "DRT_MAX_ATTEMPTS")?
            .map(|n| n.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let rpc_timeout =
            Duration::from_millis(parse_u64(&get, "DRT_RPC_TIMEOUT_MS")?.unwrap_or(10_000));

        let store_dir = get("DRT_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./saves"));
        let export_dir = get("DRT_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            client_id,
            client_secret,
            scopes,
            authorizer,
            token_url,
            redirect_uri,
            transport,
            origin,
            max_attempts,
            rpc_timeout,
            store_dir,
            export_dir,
        })
    }
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{raw}`")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
