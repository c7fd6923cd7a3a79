pub mod session;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(CurrentUser),
}

impl Identity {
    pub fn user(&self) -> Option<&CurrentUser> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }
}

/// Guard for mutating operations: anonymous callers are turned away.
pub fn require_authenticated(identity: Identity) -> AppResult<CurrentUser> {
    match identity {
        Identity::User(user) => Ok(user),
        Identity::Anonymous => Err(AppError::Unauthorized),
    }
}
