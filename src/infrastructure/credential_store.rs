use crate::domain::models::AuthSession;
use crate::infrastructure::error::InfraError;
use std::sync::{Mutex, MutexGuard};

pub trait CredentialStore: Send + Sync {
    fn save_session(&self, session: &AuthSession) -> Result<(), InfraError>;
    fn load_session(&self) -> Result<Option<AuthSession>, InfraError>;
    fn delete_session(&self) -> Result<(), InfraError>;
}

/// Persists the signed-in session in the operating system keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name).map_err(credential_error)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("questlog.auth.session", "default")
    }
}

fn credential_error(error: impl std::fmt::Display) -> InfraError {
    InfraError::Credential(error.to_string())
}

impl CredentialStore for KeyringCredentialStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), InfraError> {
        let payload = serde_json::to_string(session).map_err(credential_error)?;
        self.entry()?.set_password(&payload).map_err(credential_error)
    }

    fn load_session(&self) -> Result<Option<AuthSession>, InfraError> {
        match self.entry()?.get_password() {
            Ok(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(credential_error),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(credential_error(error)),
        }
    }

    fn delete_session(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(credential_error(error)),
        }
    }
}

/// Process-local store for tests and keyring-less hosts.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: Mutex<Option<AuthSession>>,
}

impl InMemoryCredentialStore {
    fn slot(&self) -> Result<MutexGuard<'_, Option<AuthSession>>, InfraError> {
        self.session
            .lock()
            .map_err(|error| credential_error(format!("session slot poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), InfraError> {
        *self.slot()? = Some(session.clone());
        Ok(())
    }

    fn load_session(&self) -> Result<Option<AuthSession>, InfraError> {
        Ok(self.slot()?.clone())
    }

    fn delete_session(&self) -> Result<(), InfraError> {
        self.slot()?.take();
        Ok(())
    }
}
