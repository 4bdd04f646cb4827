use thiserror::Error;

/// Broad classification of a [`ClientError`].
///
/// Advisory halts (insufficient credits, manual stop) are not errors and are
/// reported on the execution report instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected locally, never sent over the wire.
    Validation,
    /// The server answered with `success = false`.
    RemoteRejection,
    /// The caller broke a state-machine precondition.
    Usage,
    /// Network, decoding or configuration failure.
    Transport,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid variable name '{0}': expected 'x' followed by a positive integer")]
    InvalidVariableName(String),

    #[error("Variable '{0}' already exists")]
    DuplicateVariable(String),

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Unknown architecture '{0}' (expected one of I, II, III, IV)")]
    UnknownArchitecture(String),

    #[error("Expansion level {level} is out of range (maximum is {max})")]
    ExpansionLevelOutOfRange { level: u32, max: u32 },

    #[error("Run #{0} does not record which program it executed")]
    UnnamedRun(u32),

    #[error("Server rejected the request ({code}): {message}")]
    Remote { message: String, code: i32 },

    #[error("Failed to select '{name}' ({code}): {message}")]
    ProgramBindingFailed {
        name: String,
        message: String,
        code: i32,
    },

    #[error("Program is not runnable ({code}): {reason}")]
    NotRunnable { reason: String, code: i32 },

    #[error("Failed to start debugging ({code}): {message}")]
    DebugStartFailed { message: String, code: i32 },

    #[error("A debug session is already active")]
    SessionAlreadyActive,

    #[error("No debug session is currently active")]
    NoActiveSession,

    #[error("The debugged program has already finished; stop the session first")]
    SessionFinished,

    #[error("Nothing to step back: no instruction has run yet")]
    NothingToStepBack,

    #[error("A refresh is already in flight")]
    RefreshInFlight,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode server response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidVariableName(_)
            | ClientError::DuplicateVariable(_)
            | ClientError::UnknownVariable(_)
            | ClientError::UnknownArchitecture(_)
            | ClientError::ExpansionLevelOutOfRange { .. }
            | ClientError::UnnamedRun(_) => ErrorKind::Validation,
            ClientError::Remote { .. }
            | ClientError::ProgramBindingFailed { .. }
            | ClientError::NotRunnable { .. }
            | ClientError::DebugStartFailed { .. } => ErrorKind::RemoteRejection,
            ClientError::SessionAlreadyActive
            | ClientError::NoActiveSession
            | ClientError::SessionFinished
            | ClientError::NothingToStepBack
            | ClientError::RefreshInFlight => ErrorKind::Usage,
            ClientError::Transport(_) | ClientError::Decode(_) | ClientError::Config(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// Server-supplied `(message, code)` for remote rejections.
    pub fn remote_details(&self) -> Option<(&str, i32)> {
        match self {
            ClientError::Remote { message, code }
            | ClientError::ProgramBindingFailed { message, code, .. }
            | ClientError::DebugStartFailed { message, code } => Some((message, *code)),
            ClientError::NotRunnable { reason, code } => Some((reason, *code)),
            _ => None,
        }
    }

    pub(crate) fn into_binding_failure(self, name: &str) -> Self {
        match self {
            ClientError::Remote { message, code } => ClientError::ProgramBindingFailed {
                name: name.to_string(),
                message,
                code,
            },
            other => other,
        }
    }

    pub(crate) fn into_not_runnable(self) -> Self {
        match self {
            ClientError::Remote { message, code } => ClientError::NotRunnable {
                reason: message,
                code,
            },
            other => other,
        }
    }

    pub(crate) fn into_debug_start_failure(self) -> Self {
        match self {
            ClientError::Remote { message, code } => {
                ClientError::DebugStartFailed { message, code }
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}
