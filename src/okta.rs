use crate::config::OktaConfig;
use crate::db::{Db, DbError};
use crate::models::User;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine as _;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use rand::RngCore;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// CSRF states are single-use and die after five minutes.
pub const STATE_TTL_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum OktaError {
    #[error("invalid or expired state")]
    BadState,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("id token rejected: {0}")]
    BadIdToken(String),
    #[error("okta request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

// --- CSRF state ---

/// Process-local table of outstanding login states. Single-instance by
/// design; a horizontally scaled deployment needs a shared TTL store here.
pub struct CsrfStateStore {
    states: Mutex<HashMap<String, i64>>,
}

impl Default for CsrfStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfStateStore {
    pub fn new() -> Self {
        CsrfStateStore {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a fresh state: 256 bits from the OS RNG, URL-safe encoding.
    pub fn mint(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let state = BASE64_URL.encode(bytes);
        let expires = chrono::Utc::now().timestamp() + STATE_TTL_SECS;
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(state.clone(), expires);
        state
    }

    /// Single-use check: the state is removed whether or not it was valid.
    pub fn consume(&self, state: &str) -> bool {
        let now = chrono::Utc::now().timestamp();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        match states.remove(state) {
            Some(expires) => expires > now,
            None => false,
        }
    }

    /// Drop expired states. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let before = states.len();
        states.retain(|_, expires| *expires > now);
        before - states.len()
    }

    pub fn len(&self) -> usize {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- Relying-party client ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

/// Claims we pull out of a verified ID token.
#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub struct OktaClient {
    http: reqwest::Client,
    config: OktaConfig,
}

impl OktaClient {
    pub fn new(config: OktaConfig) -> Self {
        OktaClient {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            config,
        }
    }

    fn issuer(&self) -> String {
        format!("https://{}", self.config.domain)
    }

    /// Provider authorize URL carrying the minted state.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/oauth2/v1/authorize?client_id={}&response_type=code&scope=openid%20profile%20email&redirect_uri={}&state={}",
            self.issuer(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Swap the authorization code for tokens and return the verified
    /// identity out of the ID token.
    pub async fn exchange_and_verify(&self, code: &str) -> Result<IdTokenClaims, OktaError> {
        let resp = self
            .http
            .post(format!("{}/oauth2/v1/token", self.issuer()))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(OktaError::Exchange(format!("token endpoint returned {status}")));
        }
        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| OktaError::Exchange(e.to_string()))?;

        self.verify_id_token(&tokens.id_token).await
    }

    /// Validate signature (via the provider's JWKS), issuer, audience and
    /// expiry, then extract {email, name}.
    async fn verify_id_token(&self, id_token: &str) -> Result<IdTokenClaims, OktaError> {
        let header =
            decode_header(id_token).map_err(|e| OktaError::BadIdToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OktaError::BadIdToken("missing kid".to_string()))?;

        let jwks: Jwks = self
            .http
            .get(format!("{}/oauth2/v1/keys", self.issuer()))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| OktaError::BadIdToken(e.to_string()))?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| OktaError::BadIdToken(format!("no JWKS key for kid {kid}")))?;

        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| OktaError::BadIdToken(e.to_string()))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_issuer(&[self.issuer()]);

        decode::<IdTokenClaims>(id_token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| OktaError::BadIdToken(e.to_string()))
    }
}

/// Map a verified OIDC identity onto a local account. First-time logins get
/// an account with an empty password hash (SSO-only).
pub fn login_or_create(db: &Db, email: &str, name: Option<&str>) -> Result<User, OktaError> {
    match db.find_user_by_email(email) {
        Ok(user) => Ok(user),
        Err(DbError::NotFound) => {
            let display_name = name.unwrap_or(email);
            Ok(db.create_user(email, display_name, "", false)?)
        }
        Err(e) => Err(e.into()),
    }
}
