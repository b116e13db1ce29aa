use crate::error::{Error, Result};

/// The signed-in user on whose behalf reads and writes happen.
///
/// Every store operation takes one explicitly; there is no ambient login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: String,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Result<Session> {
        let user = user.into().trim().to_string();
        if user.is_empty() {
            return Err(Error::Unauthenticated);
        }
        Ok(Session { user })
    }

    /// Builds a session from an optional identity, as handed over by the CLI.
    pub fn from_user(user: Option<String>) -> Result<Session> {
        user.map(Session::new).unwrap_or(Err(Error::Unauthenticated))
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}
