use std::fmt;

use uuid::Uuid;

/// Opaque attribution token handed to a connection when it is accepted.
///
/// Identities carry no meaning beyond authorship of published messages and
/// live exactly as long as the connection they were assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Issues a fresh identity for every accepted connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityAssigner;

impl IdentityAssigner {
    const PREFIX: &'static str = "client";

    /// Returns `client-<uuid v4>`. Never contains the `:` frame delimiter.
    pub fn assign(&self) -> Identity {
        Identity(format!("{}-{}", Self::PREFIX, Uuid::new_v4()))
    }
}
