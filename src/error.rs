use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid login path {login:?}: {reason}")]
    ConfigurationInvalid { login: String, reason: InvalidLogin },
    #[error("unable to write {}", path.display())]
    FileUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("marker {marker} has no matching BEGIN/END pair")]
    MarkerCorrupt { marker: String },
    #[error("state file {}", path.display())]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid state file format")]
    StateFormat(#[from] serde_json::Error),
}

/// Why a configured login path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidLogin {
    Empty,
    Exists,
    Separator,
    Whitespace,
}

impl std::fmt::Display for InvalidLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Empty => "value is empty",
            Self::Exists => "a file or directory with that name exists",
            Self::Separator => "value contains a path separator",
            Self::Whitespace => "value contains whitespace or control characters",
        };
        f.write_str(reason)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_invalid_message() {
        let err = Error::ConfigurationInvalid {
            login: "wp-admin/x".to_string(),
            reason: InvalidLogin::Separator,
        };
        assert_eq!(
            err.to_string(),
            "invalid login path \"wp-admin/x\": value contains a path separator"
        );
    }
}
