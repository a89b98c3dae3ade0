//! Signed-in user resolution against the Firebase identity toolkit.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const REJECTED_TOKEN_CODES: [&str; 4] = [
    "INVALID_ID_TOKEN",
    "TOKEN_EXPIRED",
    "USER_NOT_FOUND",
    "USER_DISABLED",
];

/// Public web config handed to the browser's Firebase Auth client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebAuthConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
}

impl WebAuthConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("FIREBASE_API_KEY").context("FIREBASE_API_KEY not set")?;
        let project_id = env::var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID not set")?;
        let auth_domain = env::var("FIREBASE_AUTH_DOMAIN")
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("{project_id}.firebaseapp.com"));
        Ok(Self {
            api_key,
            auth_domain,
            project_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    /// Token the user presented; forwarded to the document store so its
    /// access rules see the same identity.
    pub id_token: String,
}

/// Per-request context: who, if anyone, is signed in.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<AuthUser>,
}

impl Session {
    pub fn signed_out() -> Self {
        Self { user: None }
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// `Ok(None)` when the provider does not recognise the token.
    async fn lookup(&self, id_token: &str) -> Result<Option<AuthUser>>;
}

#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build identity HTTP client")?;
        Ok(Self {
            client,
            base_url: IDENTITY_BASE.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("FIREBASE_API_KEY").context("FIREBASE_API_KEY not set")?;
        Self::new(api_key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl IdentityApi for FirebaseIdentity {
    async fn lookup(&self, id_token: &str) -> Result<Option<AuthUser>> {
        #[derive(Deserialize)]
        struct LookupResponse {
            #[serde(default)]
            users: Vec<LookupUser>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LookupUser {
            local_id: String,
        }

        let url = format!(
            "{}/accounts:lookup?key={}",
            self.base_url,
            urlencoding::encode(&self.api_key)
        );
        let res = self
            .client
            .post(&url)
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .context("identity lookup request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if status == reqwest::StatusCode::BAD_REQUEST && is_rejected_token(&text) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("identity lookup -> {} {}", status, text));
        }
        let parsed: LookupResponse =
            serde_json::from_str(&text).context("Failed to parse identity lookup JSON")?;
        Ok(parsed.users.into_iter().next().map(|u| AuthUser {
            uid: u.local_id,
            id_token: id_token.to_string(),
        }))
    }
}

/// A 400 whose error names the token itself, as opposed to the request
/// (e.g. a bad API key).
fn is_rejected_token(body: &str) -> bool {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return false;
    };
    REJECTED_TOKEN_CODES
        .iter()
        .any(|code| parsed.error.message.starts_with(code))
}

/// Turn an optional bearer token into a session. Lookup failures count as
/// signed out.
pub async fn resolve_session(identity: &dyn IdentityApi, bearer: Option<&str>) -> Session {
    let session = match bearer.filter(|t| !t.is_empty()) {
        None => Session::signed_out(),
        Some(token) => match identity.lookup(token).await {
            Ok(Some(user)) => Session::signed_in(user),
            Ok(None) => Session::signed_out(),
            Err(e) => {
                warn!("Identity lookup failed: {:#}", e);
                Session::signed_out()
            }
        },
    };
    log_auth_state(&session);
    session
}

pub fn log_auth_state(session: &Session) {
    match &session.user {
        Some(user) => info!("User is signed in: {}", user.uid),
        None => info!("No user is signed in."),
    }
}
