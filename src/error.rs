//! Error types for the network session and iperf runs.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised while driving nodes of the emulated network.
#[derive(Debug, Error)]
pub enum NetError {
    /// The command could not be started at all.
    #[error("failed to run `{command}` on {node}: {source}")]
    Spawn {
        node: String,
        command: String,
        #[source]
        source: io::Error,
    },

    /// A setup command exited unsuccessfully.
    #[error("`{command}` on {node} exited with {status}: {output}")]
    CommandFailed {
        node: String,
        command: String,
        status: ExitStatus,
        output: String,
    },

    #[error("Unable to find {0}")]
    UnknownNode(String),

    #[error("network is not running")]
    NotRunning,
}

/// Errors raised while running an iperf measurement.
#[derive(Debug, Error)]
pub enum IperfError {
    #[error("All parameters must be selected.")]
    MissingParameters,

    #[error("Invalid protocol.")]
    InvalidProtocol(String),

    /// iperf ran but could not reach the server; holds its raw output.
    #[error("Iperf failed: {0}")]
    ConnectFailed(String),

    #[error("iperf did not finish within {0}s")]
    Timeout(u64),

    #[error("iperf task aborted: {0}")]
    Join(String),

    #[error(transparent)]
    Network(#[from] NetError),
}

impl From<tokio::task::JoinError> for IperfError {
    fn from(err: tokio::task::JoinError) -> Self {
        IperfError::Join(err.to_string())
    }
}
