use crate::domain::models::UserIdentity;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use url::Url;

#[derive(Debug, Clone)]
pub struct PasswordCredentialsRequest {
    pub project_url: String,
    pub api_key: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RefreshSessionRequest {
    pub project_url: String,
    pub api_key: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct SignOutRequest {
    pub project_url: String,
    pub api_key: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResponse {
    SignedIn(AuthTokenResponse),
    ConfirmationRequired(UserIdentity),
}

#[async_trait]
pub trait AuthHttpClient: Send + Sync {
    async fn sign_in_with_password(
        &self,
        request: PasswordCredentialsRequest,
    ) -> Result<AuthTokenResponse, InfraError>;

    async fn sign_up(&self, request: PasswordCredentialsRequest) -> Result<SignUpResponse, InfraError>;

    async fn refresh_session(
        &self,
        request: RefreshSessionRequest,
    ) -> Result<AuthTokenResponse, InfraError>;

    async fn sign_out(&self, request: SignOutRequest) -> Result<(), InfraError>;
}

/// Client for a GoTrue-compatible auth REST API (`/auth/v1/...`).
#[derive(Debug, Clone, Default)]
pub struct ReqwestAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct SessionPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    user: Option<UserPayload>,
    // Sign-up without auto-confirm answers with the bare user object.
    id: Option<String>,
    email: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

impl From<UserPayload> for UserIdentity {
    fn from(payload: UserPayload) -> Self {
        UserIdentity {
            id: payload.id,
            email: payload.email,
        }
    }
}

pub fn auth_endpoint(project_url: &str, path: &str) -> Result<Url, InfraError> {
    let base = project_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(InfraError::Auth("auth project url is not configured".to_string()));
    }
    Url::parse(&format!("{base}/auth/v1/{path}"))
        .map_err(|error| InfraError::Auth(format!("invalid auth endpoint: {error}")))
}

fn token_endpoint(project_url: &str, grant_type: &str) -> Result<Url, InfraError> {
    let mut url = auth_endpoint(project_url, "token")?;
    url.query_pairs_mut().append_pair("grant_type", grant_type);
    Ok(url)
}

impl ReqwestAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn send_for_session(&self, request: RequestBuilder) -> Result<SessionPayload, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Auth(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Auth(format!("failed reading auth response: {error}")))?;

        let parsed = serde_json::from_str::<SessionPayload>(&body).map_err(|error| {
            InfraError::Auth(format!("invalid auth response payload: {error}; body={body}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed
                .error
                .clone()
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed
                .error_description
                .clone()
                .or_else(|| parsed.msg.clone())
                .unwrap_or_else(|| body.clone());
            return Err(InfraError::Auth(format!("auth endpoint error: {code}; {detail}")));
        }
        Ok(parsed)
    }

    fn token_response(parsed: SessionPayload) -> Result<AuthTokenResponse, InfraError> {
        let access_token = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| InfraError::Auth("auth response has no access_token".to_string()))?;
        let user = parsed
            .user
            .ok_or_else(|| InfraError::Auth("auth response has no user".to_string()))?;
        Ok(AuthTokenResponse {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in.unwrap_or(0).max(0),
            token_type: parsed.token_type,
            user: user.into(),
        })
    }
}

#[async_trait]
impl AuthHttpClient for ReqwestAuthClient {
    async fn sign_in_with_password(
        &self,
        request: PasswordCredentialsRequest,
    ) -> Result<AuthTokenResponse, InfraError> {
        let url = token_endpoint(&request.project_url, "password")?;
        let parsed = self
            .send_for_session(
                self.client
                    .post(url)
                    .header("apikey", &request.api_key)
                    .json(&serde_json::json!({
                        "email": request.email,
                        "password": request.password,
                    })),
            )
            .await?;
        Self::token_response(parsed)
    }

    async fn sign_up(&self, request: PasswordCredentialsRequest) -> Result<SignUpResponse, InfraError> {
        let url = auth_endpoint(&request.project_url, "signup")?;
        let parsed = self
            .send_for_session(
                self.client
                    .post(url)
                    .header("apikey", &request.api_key)
                    .json(&serde_json::json!({
                        "email": request.email,
                        "password": request.password,
                    })),
            )
            .await?;

        if parsed.access_token.is_some() {
            return Self::token_response(parsed).map(SignUpResponse::SignedIn);
        }
        let user = match (parsed.user, parsed.id) {
            (Some(user), _) => user.into(),
            (None, Some(id)) => UserIdentity {
                id,
                email: parsed.email,
            },
            (None, None) => {
                return Err(InfraError::Auth("sign-up response has no user".to_string()));
            }
        };
        Ok(SignUpResponse::ConfirmationRequired(user))
    }

    async fn refresh_session(
        &self,
        request: RefreshSessionRequest,
    ) -> Result<AuthTokenResponse, InfraError> {
        let url = token_endpoint(&request.project_url, "refresh_token")?;
        let parsed = self
            .send_for_session(
                self.client
                    .post(url)
                    .header("apikey", &request.api_key)
                    .json(&serde_json::json!({ "refresh_token": request.refresh_token })),
            )
            .await?;
        Self::token_response(parsed)
    }

    async fn sign_out(&self, request: SignOutRequest) -> Result<(), InfraError> {
        let url = auth_endpoint(&request.project_url, "logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &request.api_key)
            .bearer_auth(&request.access_token)
            .send()
            .await
            .map_err(|error| InfraError::Auth(format!("request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InfraError::Auth(format!(
                "logout failed: http_{}; {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
