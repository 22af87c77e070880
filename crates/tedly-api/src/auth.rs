// Bearer token cache
//
// The tedee cloud authenticates through an OAuth2 password grant against a
// B2C token endpoint. The resulting access token is cached and reused until
// shortly before it expires; every API call asks the cache for a token first.

use std::sync::RwLock;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::TokenResponse;
use crate::retry::RetryPolicy;

/// Public client id of the tedee mobile app, also used as OAuth scope.
pub const CLIENT_ID: &str = "02106b82-0524-4fd3-ac57-af774f340979";

/// Default B2C token endpoint (resource-owner password flow).
pub const DEFAULT_TOKEN_URL: &str =
    "https://tedee.b2clogin.com/tedee.onmicrosoft.com/oauth2/v2.0/token?p=B2C_1_SignIn_Ropc";

/// A token is discarded this long before its nominal expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(120);

/// Account credentials for the password grant.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password: SecretString,
}

/// A cached bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
struct Credential {
    token: SecretString,
    expires_at: Instant,
}

impl Credential {
    /// `true` while `now` is before `expires_at - EXPIRY_MARGIN`.
    fn is_fresh_at(&self, now: Instant) -> bool {
        self.expires_at
            .checked_sub(EXPIRY_MARGIN)
            .is_some_and(|deadline| now < deadline)
    }
}

/// Owns the current access token and refreshes it on demand.
///
/// Concurrent callers may both see an expired token and both
/// re-authenticate; the last successful response wins. That race is
/// harmless because any fresh token is as good as another.
pub struct CredentialCache {
    http: reqwest::Client,
    token_url: Url,
    account: Account,
    retry: RetryPolicy,
    current: RwLock<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(http: reqwest::Client, token_url: Url, account: Account, retry: RetryPolicy) -> Self {
        Self {
            http,
            token_url,
            account,
            retry,
            current: RwLock::new(None),
        }
    }

    /// Return a valid access token, authenticating if the cached one is
    /// missing or about to expire.
    ///
    /// Fails with [`Error::Authentication`] once the token retry budget
    /// is exhausted.
    pub async fn token(&self) -> Result<SecretString, Error> {
        if let Some(token) = self.cached(Instant::now()) {
            debug!("access token cached");
            return Ok(token);
        }

        let credential = self
            .retry
            .run("token request", move || self.request_token())
            .await
            .map_err(|e| match e {
                Error::Authentication { .. } => e,
                other => Error::Authentication {
                    message: other.to_string(),
                },
            })?;

        let token = credential.token.clone();
        *self.current.write().expect("credential lock poisoned") = Some(credential);
        debug!("access token received from server");
        Ok(token)
    }

    /// Forget the cached token so the next call re-authenticates.
    ///
    /// Called when the API answers 401 to a token the cache still
    /// considered fresh (e.g. revoked server-side).
    pub fn invalidate(&self) {
        if self
            .current
            .write()
            .expect("credential lock poisoned")
            .take()
            .is_some()
        {
            debug!("access token invalidated");
        }
    }

    /// The cached token if it is still fresh at `now`; a stale one is dropped.
    fn cached(&self, now: Instant) -> Option<SecretString> {
        let mut guard = self.current.write().expect("credential lock poisoned");
        match guard.as_ref() {
            Some(credential) if credential.is_fresh_at(now) => Some(credential.token.clone()),
            Some(_) => {
                debug!("access token expired");
                *guard = None;
                None
            }
            None => None,
        }
    }

    async fn request_token(&self) -> Result<Credential, Error> {
        debug!("requesting access token from {}", self.token_url);

        let scope = format!("openid {CLIENT_ID}");
        let form = [
            ("grant_type", "password"),
            ("username", self.account.username.as_str()),
            ("password", self.account.password.expose_secret()),
            ("scope", scope.as_str()),
            ("client_id", CLIENT_ID),
            ("response_type", "token id_token"),
        ];

        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "token endpoint rejected the request");
            return Err(Error::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        Ok(Credential {
            token: SecretString::from(parsed.access_token),
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}
