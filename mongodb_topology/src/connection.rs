use std::{fmt::Debug, future::Future, pin::Pin, time::Duration};

use dyn_clone::DynClone;
use serde_json::Value;

use crate::{error_chain_fmt, EndPoint};

/// An owned, sendable future. Trait methods return these so the traits stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single established connection to a server, able to run one command at a time.
pub trait Connection: Send + Debug {
    /// Runs `command` against the `admin` database and returns the raw reply document.
    fn run_command(
        &mut self,
        command: Value,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Value, ConnectionError>>;
}

/// Opens connections for the server monitors.
///
/// Implementations must be cheap to clone; every monitor owns a clone.
pub trait ConnectionFactory: DynClone + Send + Sync + Debug {
    fn connect<'a>(
        &'a self,
        end_point: &'a EndPoint,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, ConnectionError>>;
}

dyn_clone::clone_trait_object!(ConnectionFactory);

#[derive(thiserror::Error)]
pub enum ConnectionError {
    #[error("Operation on {end_point} timed out after {after:?}.")]
    Timeout { end_point: EndPoint, after: Duration },
    #[error("Network error talking to {end_point}: {message}")]
    Network { end_point: EndPoint, message: String },
    #[error("Command failed on {end_point}: {message}")]
    CommandFailed { end_point: EndPoint, message: String },
    #[error("{end_point} sent a reply that could not be understood.")]
    InvalidReply {
        end_point: EndPoint,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}
impl std::fmt::Debug for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
