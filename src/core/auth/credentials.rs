use async_trait::async_trait;

/// Who a verified login belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Checks a username/password pair.
///
/// The web layer only sees this trait, so a real user directory can replace
/// the single configured operator without touching handlers.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Option<Identity>;
}

/// One operator account taken from configuration.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> Option<Identity> {
        // Both comparisons always run.
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());

        if user_ok & pass_ok {
            Some(Identity {
                username: self.username.clone(),
            })
        } else {
            tracing::warn!(%username, "Rejected login");
            None
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accepts_configured_pair_only() {
        let creds = StaticCredentials::new("admin", "password123");

        assert_eq!(
            creds.verify("admin", "password123").await,
            Some(Identity {
                username: "admin".to_string()
            })
        );
        assert!(creds.verify("admin", "password").await.is_none());
        assert!(creds.verify("Admin", "password123").await.is_none());
        assert!(creds.verify("", "").await.is_none());
    }
}
