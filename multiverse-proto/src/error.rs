use serde::{Deserialize, Serialize};

/// The error taxonomy surfaced on the wire as `error` envelopes.
///
/// Every variant here is a *recoverable* error: the connection that
/// triggered it survives and receives an `error` envelope carrying this
/// kind plus a human `message`. `Overrun` and `Overloaded` are the two
/// exceptions that are fatal for the connection they name, but they are
/// still reported through this same enum before the socket closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    SchemaError,
    DuplicateGameId,
    UnknownGameId,
    UnknownSource,
    UnknownTarget,
    InvalidCoordinate,
    Overrun,
    Overloaded,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaError => "SchemaError",
            ErrorKind::DuplicateGameId => "DuplicateGameId",
            ErrorKind::UnknownGameId => "UnknownGameId",
            ErrorKind::UnknownSource => "UnknownSource",
            ErrorKind::UnknownTarget => "UnknownTarget",
            ErrorKind::InvalidCoordinate => "InvalidCoordinate",
            ErrorKind::Overrun => "Overrun",
            ErrorKind::Overloaded => "Overloaded",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable protocol or orchestrator error, carrying enough context to
/// become an `error` envelope on the originating connection. Never written
/// to the event log.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProtocolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProtocolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaError, message)
    }

    pub fn duplicate_game_id(game_id: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateGameId,
            format!("game_id '{game_id}' is already registered"),
        )
    }

    pub fn unknown_game_id(game_id: &str) -> Self {
        Self::new(
            ErrorKind::UnknownGameId,
            format!("game_id '{game_id}' is not registered"),
        )
    }

    pub fn unknown_source(game_id: &str) -> Self {
        Self::new(
            ErrorKind::UnknownSource,
            format!("source_game_id '{game_id}' is not registered"),
        )
    }

    pub fn unknown_target(game_id: &str) -> Self {
        Self::new(
            ErrorKind::UnknownTarget,
            format!("target_game_id '{game_id}' is not registered"),
        )
    }

    pub fn invalid_coordinate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCoordinate, message)
    }

    pub fn overrun() -> Self {
        Self::new(
            ErrorKind::Overrun,
            "subscriber outbound queue exceeded PER_SUBSCRIBER_QUEUE_MAX",
        )
    }

    pub fn overloaded() -> Self {
        Self::new(
            ErrorKind::Overloaded,
            "connection count limit reached",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Renders this error's fields as the `data` object of an `error`
    /// envelope.
    pub fn to_data(&self) -> serde_json::Value {
        serde_json::json!({ "kind": self.kind.as_str(), "message": self.message })
    }
}

impl From<multiverse_stat7::Stat7Error> for ProtocolError {
    fn from(err: multiverse_stat7::Stat7Error) -> Self {
        match err {
            multiverse_stat7::Stat7Error::InvalidCoordinate(msg) => {
                ProtocolError::invalid_coordinate(msg)
            }
            multiverse_stat7::Stat7Error::DuplicateIdentity => {
                ProtocolError::new(ErrorKind::InvalidCoordinate, err.to_string())
            }
        }
    }
}
