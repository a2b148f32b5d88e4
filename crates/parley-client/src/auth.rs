//! Session and credential lifecycle.
//!
//! [`SessionManager`] is the only writer of the credential. Its state is
//! published on a `watch` channel so other components (the realtime
//! connection lifecycle, the CLI) can follow login, refresh and logout.
//!
//! ```text
//! Unauthenticated --login--> Authenticated --expired--> Refreshing
//!        ^                        ^    |                    |
//!        |                        |    +----logout----------+---> Unauthenticated
//!        |                        +------- refreshed -------+
//!        +------ login ------ Invalid <---- refresh failed -+
//! ```
//!
//! Concurrent callers needing a fresh token serialize on one async mutex and
//! re-check the credential after acquiring it, so a single refresh serves
//! them all.

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use parley_net::ApiClient;
use parley_shared::models::{SignUpRequest, SignUpResult, User};
use parley_shared::types::UserId;
use parley_shared::Credential;

use crate::error::{AuthError, ClientError, ClientResult};

const MSG_LOGIN_FIELDS: &str = "Please enter your login id and password.";
const MSG_SIGN_UP_FIELDS: &str = "Please fill in every required field.";
const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated(Credential),
    Refreshing,
    /// Refresh failed; only a new login leaves this state.
    Invalid,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Sign-up input as collected from the user.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub phone_number: String,
    pub login_id: String,
    pub password: String,
    pub password_confirm: String,
    pub description: String,
}

impl SignUpForm {
    fn validate(&self) -> ClientResult<SignUpRequest> {
        let required = [
            &self.phone_number,
            &self.login_id,
            &self.password,
            &self.password_confirm,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(ClientError::validation(MSG_SIGN_UP_FIELDS));
        }
        if self.password != self.password_confirm {
            return Err(ClientError::validation(MSG_PASSWORD_MISMATCH));
        }
        Ok(SignUpRequest {
            phone_number: self.phone_number.trim().to_string(),
            login_id: self.login_id.trim().to_string(),
            password: self.password.clone(),
            description: self.description.trim().to_string(),
        })
    }
}

pub struct SessionManager {
    api: ApiClient,
    token_buffer: chrono::Duration,
    /// Held across a refresh so concurrent callers wait for its outcome.
    credential: Mutex<Option<Credential>>,
    status: watch::Sender<AuthStatus>,
}

impl SessionManager {
    pub fn new(api: ApiClient, token_buffer: chrono::Duration) -> Self {
        let (status, _) = watch::channel(AuthStatus::Unauthenticated);
        Self {
            api,
            token_buffer,
            credential: Mutex::new(None),
            status,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub async fn login(&self, login_id: &str, password: &str) -> ClientResult<Credential> {
        let login_id = login_id.trim();
        if login_id.is_empty() || password.is_empty() {
            return Err(ClientError::validation(MSG_LOGIN_FIELDS));
        }

        let pair = self.api.login(login_id, password).await?;
        let credential = Credential::new(pair.access_token, pair.refresh_token);
        let Some(user_id) = credential.user_id() else {
            warn!(login_id, "Login succeeded but the access token has no subject");
            return Err(AuthError::MissingSubject.into());
        };

        let mut guard = self.credential.lock().await;
        *guard = Some(credential.clone());
        self.status
            .send_replace(AuthStatus::Authenticated(credential.clone()));
        info!(user = %user_id, "Logged in");
        Ok(credential)
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> ClientResult<SignUpResult> {
        let request = form.validate()?;
        let result = self.api.sign_up(&request).await?;
        info!(user = %result.user_id, login_id = %result.login_id, "Signed up");
        Ok(result)
    }

    /// A credential whose access token is usable now, refreshing first if
    /// it is within the expiry buffer.
    pub async fn credential(&self) -> ClientResult<Credential> {
        let mut guard = self.credential.lock().await;

        let Some(current) = guard.clone() else {
            return Err(match *self.status.borrow() {
                AuthStatus::Invalid => AuthError::SessionInvalid,
                _ => AuthError::NotAuthenticated,
            }
            .into());
        };
        if !current.is_expired(self.token_buffer) {
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("Access token expired and no refresh token is held");
            self.invalidate(&mut guard);
            return Err(AuthError::SessionInvalid.into());
        };

        debug!("Access token near expiry, refreshing");
        self.status.send_replace(AuthStatus::Refreshing);
        match self.api.refresh(&refresh_token).await {
            Ok(pair) => {
                let refreshed = Credential::new(
                    pair.access_token,
                    pair.refresh_token.or(Some(refresh_token)),
                );
                *guard = Some(refreshed.clone());
                self.status
                    .send_replace(AuthStatus::Authenticated(refreshed.clone()));
                info!("Access token refreshed");
                Ok(refreshed)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.invalidate(&mut guard);
                Err(AuthError::SessionInvalid.into())
            }
        }
    }

    /// Usable access token, see [`Self::credential`].
    pub async fn access_token(&self) -> ClientResult<String> {
        Ok(self.credential().await?.access_token)
    }

    /// The logged-in user's id as carried by the access token.
    pub async fn user_id(&self) -> ClientResult<UserId> {
        let credential = self.credential().await?;
        credential
            .user_id()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| AuthError::MissingSubject.into())
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        let credential = self.credential().await?;
        let user_id = credential.user_id().ok_or(AuthError::MissingSubject)?;
        Ok(self
            .api
            .find_user(&user_id, &credential.access_token)
            .await?)
    }

    /// Tell the backend, then drop the local session whatever it answered.
    pub async fn logout(&self) {
        let mut guard = self.credential.lock().await;
        if let Some(credential) = guard.take() {
            if let Some(user_id) = credential.user_id() {
                if let Err(e) = self.api.logout(&user_id, &credential.access_token).await {
                    warn!(error = %e, "Logout request failed, clearing session anyway");
                }
            }
        }
        self.status.send_replace(AuthStatus::Unauthenticated);
        info!("Logged out");
    }

    fn invalidate(&self, guard: &mut Option<Credential>) {
        *guard = None;
        self.status.send_replace(AuthStatus::Invalid);
    }
}
