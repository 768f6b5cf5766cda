use mongodb::error::ErrorKind;
use thiserror::Error;

/// Server code for `NamespaceExists`, returned when creating a collection that already exists.
pub const NAMESPACE_EXISTS_CODE: i32 = 48;

/// Server code for `NamespaceNotFound`.
pub const NAMESPACE_NOT_FOUND_CODE: i32 = 26;

/// Server code for `CommandNotSupportedOnView`, returned by `listIndexes` on a view.
pub const COMMAND_NOT_SUPPORTED_ON_VIEW_CODE: i32 = 166;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Mongo error: {0}")]
    MongoError(mongodb::error::Error),

    #[error("Command failed with code {code} ({code_name}): {message}")]
    CommandFailed { code: i32, code_name: String, message: String },

    #[error("Index {0} already exists")]
    IndexAlreadyExists(String),

    #[error("Invalid connection url: {0}")]
    InvalidConnectionUrl(String),

    #[error("Unexpected reply from server: {0}")]
    UnexpectedReply(String),
}

impl DatabaseError {
    /// Server error code, when the failure came from a command reply.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => Some(*code),
            Self::MongoError(err) => match err.kind.as_ref() {
                ErrorKind::Command(command) => Some(command.code),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_namespace_exists(&self) -> bool {
        self.code() == Some(NAMESPACE_EXISTS_CODE)
    }

    /// The namespace is missing or is a view rather than a collection.
    pub fn is_not_a_collection(&self) -> bool {
        matches!(self.code(), Some(NAMESPACE_NOT_FOUND_CODE | COMMAND_NOT_SUPPORTED_ON_VIEW_CODE))
    }
}

impl From<mongodb::error::Error> for DatabaseError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Command(command) => Self::CommandFailed {
                code: command.code,
                code_name: command.code_name.clone(),
                message: command.message.clone(),
            },
            _ => Self::MongoError(err),
        }
    }
}
