//! Errors reported by the binary.

use std::io;

use hushcat_core::{ConfigConflict, ContactStoreError, SessionError};
use hushcat_crypto::{KeyError, NoiseError};
use thiserror::Error;

/// Anything that ends the process with status 1.
#[derive(Error, Debug)]
pub enum CliError {
    /// Private key could not be generated, loaded or saved
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Crypto engine could not be created
    #[error(transparent)]
    Noise(#[from] NoiseError),

    /// Contacts file could not be read or written
    #[error(transparent)]
    Contacts(#[from] ContactStoreError),

    /// Inconsistent authorization flags
    #[error(transparent)]
    Config(#[from] ConfigConflict),

    /// Conversation failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// No home directory to put the default hushcat directory in
    #[error("cannot find the home directory; use --dir")]
    NoHome,

    /// `listen` was given a host
    #[error("can't listen on a remote address ({0}); specify a local port with ':port'")]
    RemoteListen(String),

    /// Dialing, binding or accepting failed
    #[error("{context} {address}: {source}")]
    Network {
        /// What was being attempted
        context: &'static str,
        /// Address involved
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// `proxy` was given no command
    #[error("'proxy' needs a command to run")]
    MissingProxyCommand,

    /// Proxy command could not be started
    #[error("starting '{command}': {source}")]
    Proxy {
        /// Program that failed to start
        command: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Writing to stdout failed
    #[error("writing output: {0}")]
    Output(#[source] io::Error),
}
