use crate::domain::models::UserIdentity;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;

/// Anything able to say who is signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<UserIdentity>, InfraError>;
    async fn sign_out(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionGate {
    #[default]
    SignedOut,
    SignedIn(UserIdentity),
}

impl SessionGate {
    pub async fn resolve(provider: &dyn IdentityProvider) -> Result<Self, InfraError> {
        Ok(match provider.current_user().await? {
            Some(user) => Self::SignedIn(user),
            None => Self::SignedOut,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|user| user.id.as_str())
    }

    pub fn greeting_name<'a>(&'a self, default_name: &'a str) -> &'a str {
        self.user()
            .and_then(UserIdentity::greeting_name)
            .unwrap_or(default_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FixedIdentity {
        user: Mutex<Option<UserIdentity>>,
    }

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn current_user(&self) -> Result<Option<UserIdentity>, InfraError> {
            Ok(self.user.lock().expect("identity mutex poisoned").clone())
        }

        async fn sign_out(&self) -> Result<(), InfraError> {
            *self.user.lock().expect("identity mutex poisoned") = None;
            Ok(())
        }
    }

    fn arthur() -> UserIdentity {
        UserIdentity {
            id: "usr-1".to_string(),
            email: Some("arthur@camelot.io".to_string()),
        }
    }

    #[tokio::test]
    async fn resolves_signed_in_user_and_greeting() {
        let provider = FixedIdentity {
            user: Mutex::new(Some(arthur())),
        };
        let gate = SessionGate::resolve(&provider).await.expect("resolve");
        assert!(gate.is_authenticated());
        assert_eq!(gate.user_id(), Some("usr-1"));
        assert_eq!(gate.greeting_name("King Lawrence of Arya"), "arthur");

        provider.sign_out().await.expect("sign out");
        let gate = SessionGate::resolve(&provider).await.expect("resolve");
        assert_eq!(gate, SessionGate::SignedOut);
    }

    #[test]
    fn greeting_falls_back_to_default_name() {
        assert_eq!(
            SessionGate::SignedOut.greeting_name("King Lawrence of Arya"),
            "King Lawrence of Arya"
        );
        let without_email = SessionGate::SignedIn(UserIdentity {
            id: "usr-2".to_string(),
            email: None,
        });
        assert_eq!(without_email.greeting_name("Sir"), "Sir");
    }
}
