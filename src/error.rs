//! Error types for the memo service.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Authentication and session errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Missing or malformed Authorization header")]
    MissingToken,

    #[error("Session expired or unknown")]
    SessionInvalid,

    #[error("Role {role} required")]
    RoleRequired { role: String },

    #[error("{0}")]
    WeakPassword(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Workflow-rule violations raised by the approval state machine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Memo {id} not found")]
    MemoNotFound { id: Uuid },

    #[error("Approval step {id} not found on memo {memo_id}")]
    StepNotFound { id: Uuid, memo_id: Uuid },

    #[error("Approval step {id} is not the memo's current step")]
    NotCurrentStep { id: Uuid },

    #[error("Approval step {id} was already decided ({status})")]
    StepAlreadyDecided { id: Uuid, status: String },

    #[error("User {user_id} is not the approver for step {id}")]
    NotYourTurn { id: Uuid, user_id: Uuid },

    #[error("User {user_id} is not a recipient of memo {memo_id}")]
    NotARecipient { memo_id: Uuid, user_id: Uuid },

    #[error("Memo {id} is not in a state that allows this action ({status})")]
    InvalidState { id: Uuid, status: String },

    #[error("Invalid memo field {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Notification dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP send failed: {0}")]
    Smtp(String),

    #[error("Invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
