use crate::application::session::IdentityProvider;
use crate::domain::clock::NowProvider;
use crate::domain::models::{AuthSession, UserIdentity};
use crate::infrastructure::auth_client::{
    AuthHttpClient, AuthTokenResponse, PasswordCredentialsRequest, RefreshSessionRequest,
    SignOutRequest, SignUpResponse,
};
use crate::infrastructure::config::AuthSettings;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

const SESSION_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureSessionResult {
    Existing(AuthSession),
    Refreshed(AuthSession),
    SignInRequired,
}

impl EnsureSessionResult {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::Existing(session) | Self::Refreshed(session) => Some(session),
            Self::SignInRequired => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired(UserIdentity),
}

/// Password-based sessions against the hosted auth service, persisted
/// through a [`CredentialStore`].
pub struct AuthManager<S, C>
where
    S: CredentialStore,
    C: AuthHttpClient,
{
    settings: AuthSettings,
    credential_store: Arc<S>,
    auth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> AuthManager<S, C>
where
    S: CredentialStore,
    C: AuthHttpClient,
{
    pub fn new(settings: AuthSettings, credential_store: Arc<S>, auth_client: Arc<C>) -> Self {
        Self {
            settings,
            credential_store,
            auth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_session_valid(&self, session: &AuthSession) -> bool {
        session.is_valid_at((self.now_provider)(), SESSION_LEEWAY_SECONDS)
    }

    fn credentials(&self, email: &str, password: &str) -> Result<PasswordCredentialsRequest, InfraError> {
        if !self.settings.is_configured() {
            return Err(InfraError::Auth(
                "auth project url and api key must be configured".to_string(),
            ));
        }
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(InfraError::Auth("email must be a valid address".to_string()));
        }
        if password.is_empty() {
            return Err(InfraError::Auth("password must not be empty".to_string()));
        }
        Ok(PasswordCredentialsRequest {
            project_url: self.settings.project_url.clone(),
            api_key: self.settings.api_key.clone(),
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, InfraError> {
        let request = self.credentials(email, password)?;
        let response = self.auth_client.sign_in_with_password(request).await?;
        let session = self.session_from_response(response, None);
        self.credential_store.save_session(&session)?;
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, InfraError> {
        let request = self.credentials(email, password)?;
        match self.auth_client.sign_up(request).await? {
            SignUpResponse::SignedIn(response) => {
                let session = self.session_from_response(response, None);
                self.credential_store.save_session(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::ConfirmationRequired(user) => Ok(SignUpOutcome::ConfirmationRequired(user)),
        }
    }

    pub async fn ensure_session(&self) -> Result<EnsureSessionResult, InfraError> {
        let Some(stored) = self.credential_store.load_session()? else {
            return Ok(EnsureSessionResult::SignInRequired);
        };

        if self.is_session_valid(&stored) {
            return Ok(EnsureSessionResult::Existing(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            return Ok(EnsureSessionResult::SignInRequired);
        };
        if !self.settings.is_configured() {
            return Ok(EnsureSessionResult::SignInRequired);
        }

        let refreshed = self
            .auth_client
            .refresh_session(RefreshSessionRequest {
                project_url: self.settings.project_url.clone(),
                api_key: self.settings.api_key.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let session = self.session_from_response(response, stored.refresh_token);
                self.credential_store.save_session(&session)?;
                Ok(EnsureSessionResult::Refreshed(session))
            }
            Err(InfraError::Auth(message)) => {
                tracing::warn!(reason = %message, "session refresh rejected");
                Ok(EnsureSessionResult::SignInRequired)
            }
            Err(error) => Err(error),
        }
    }

    /// Drops the local session even when the remote logout fails.
    pub async fn sign_out(&self) -> Result<(), InfraError> {
        let stored = self.credential_store.load_session()?;
        self.credential_store.delete_session()?;

        let Some(session) = stored else {
            return Ok(());
        };
        if !self.settings.is_configured() {
            return Ok(());
        }
        if let Err(error) = self
            .auth_client
            .sign_out(SignOutRequest {
                project_url: self.settings.project_url.clone(),
                api_key: self.settings.api_key.clone(),
                access_token: session.access_token,
            })
            .await
        {
            tracing::warn!(error = %error, "remote sign-out failed");
        }
        Ok(())
    }

    fn session_from_response(
        &self,
        response: AuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> AuthSession {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        AuthSession {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: response.user,
        }
    }
}

#[async_trait]
impl<S, C> IdentityProvider for AuthManager<S, C>
where
    S: CredentialStore,
    C: AuthHttpClient,
{
    async fn current_user(&self) -> Result<Option<UserIdentity>, InfraError> {
        Ok(self
            .ensure_session()
            .await?
            .session()
            .map(|session| session.user.clone()))
    }

    async fn sign_out(&self) -> Result<(), InfraError> {
        AuthManager::sign_out(self).await
    }
}
