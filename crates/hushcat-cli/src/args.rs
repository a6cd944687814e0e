//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hushcat_core::AuthFlags;

use crate::error::CliError;

const DEFAULT_DIR: &str = ".hushcat";
const KEY_FILE: &str = "id.priv";
const CONTACTS_FILE: &str = "contacts";

/// Encrypted, deniable netcat
#[derive(Parser, Debug)]
#[command(name = "hushcat")]
#[command(about = "Encrypted, authenticated and deniable pipes between two peers")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Where keys and contacts live.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Where keys and contacts are stored [default: $HOME/.hushcat]
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Private key file [default: DIR/id.priv]
    #[arg(long, global = true, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Contacts file [default: DIR/contacts]
    #[arg(long, global = true, value_name = "FILE")]
    pub contacts: Option<PathBuf>,
}

/// Resolved file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub dir: PathBuf,
    pub key: PathBuf,
    pub contacts: PathBuf,
}

impl PathArgs {
    /// Fill in defaults relative to the hushcat directory.
    pub fn resolve(&self) -> Result<Paths, CliError> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().ok_or(CliError::NoHome)?.join(DEFAULT_DIR),
        };

        Ok(Paths {
            key: self.key.clone().unwrap_or_else(|| dir.join(KEY_FILE)),
            contacts: self.contacts.clone().unwrap_or_else(|| dir.join(CONTACTS_FILE)),
            dir,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a conversation with a listening peer
    Connect {
        #[command(flatten)]
        conversation: ConversationArgs,

        /// Address to dial, [host][:port]
        address: Option<String>,
    },

    /// Wait for someone to start a conversation
    Listen {
        #[command(flatten)]
        conversation: ConversationArgs,

        /// Local port to listen on, [:port]
        address: Option<String>,
    },

    /// Converse over the stdin and stdout of a proxy command
    Proxy {
        #[command(flatten)]
        conversation: ConversationArgs,

        /// Command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show contacts' fingerprints, including your own
    Fingerprints,

    /// Create a new private key
    Genkey,
}

/// Options shared by every conversation.
#[derive(Args, Debug, Clone, Default)]
pub struct ConversationArgs {
    /// Converse with anyone, not just known contacts
    #[arg(long)]
    pub anyone: bool,

    /// Name to remember the contact by; implies --anyone
    #[arg(long, value_name = "NAME")]
    pub remember: Option<String>,

    /// Contact to expect; abort if it's someone else
    #[arg(long, value_name = "NAME")]
    pub expect: Option<String>,

    /// Run COMMAND with /bin/sh and connect it to the conversation instead of
    /// stdin and stdout
    #[arg(long, value_name = "COMMAND")]
    pub exec: Option<String>,
}

impl ConversationArgs {
    pub fn auth_flags(&self) -> AuthFlags {
        AuthFlags {
            anyone: self.anyone,
            expect: self.expect.clone(),
            remember: self.remember.clone(),
        }
    }
}
