//! Session user identity.

use serde::{Deserialize, Serialize};

/// Display identity of the current user, immutable for the session.
///
/// Supplied externally at startup and stamped onto every outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    name: String,
    avatar: String,
}

impl UserIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: avatar.into(),
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the avatar reference.
    #[must_use]
    pub fn avatar(&self) -> &str {
        &self.avatar
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accessors() {
        let identity = UserIdentity::new("bob", "a.png");
        assert_eq!(identity.name(), "bob");
        assert_eq!(identity.avatar(), "a.png");
        assert_eq!(identity.to_string(), "bob");
    }
}
