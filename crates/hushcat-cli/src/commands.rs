//! Subcommand implementations.

use std::io::{self, Write};

use hushcat_app::{
    ExecEndpoint, Interrupt, LocalEndpoint, Runtime, RuntimeConfig, StdioEndpoint, Transport,
};
use hushcat_core::{AuthMode, ContactBook, FileContactStore, Session};
use hushcat_crypto::{KeyError, NoiseEngine, StaticKeypair, create_private_dir};
use tracing::{debug, info};

use crate::{
    args::{Cli, Command, ConversationArgs, Paths},
    error::CliError,
    signal::watch_interrupt,
    transport::{self, ProxyCommand},
};

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let paths = cli.paths.resolve()?;

    match cli.command {
        Command::Genkey => genkey(&paths),
        Command::Fingerprints => fingerprints(&paths, &mut io::stdout().lock()),
        Command::Connect { conversation, address } => {
            let prepared = Prepared::load(&paths, &conversation)?;
            let transport = transport::connect(&transport::connect_address(address.as_deref())).await?;
            prepared.converse(transport, watch_interrupt()).await
        },
        Command::Listen { conversation, address } => {
            let prepared = Prepared::load(&paths, &conversation)?;
            let transport = transport::listen(&transport::listen_address(address.as_deref())?).await?;
            prepared.converse(transport, watch_interrupt()).await
        },
        Command::Proxy { conversation, command } => {
            let prepared = Prepared::load(&paths, &conversation)?;
            let (proxy, transport) = ProxyCommand::spawn(&command)?;
            let result = prepared.converse(transport, watch_interrupt()).await;
            proxy.close();
            result
        },
    }
}

/// Create a new private key. Refuses to overwrite an existing one.
pub fn genkey(paths: &Paths) -> Result<(), CliError> {
    if paths.key.exists() {
        return Err(KeyError::Exists(paths.key.clone()).into());
    }
    create_private_dir(&paths.dir)?;

    info!("generating a new private key ({})", paths.key.display());
    let key = StaticKeypair::generate()?;
    key.save_new(&paths.key)?;

    info!("your fingerprint is {}", key.fingerprint());
    Ok(())
}

/// List every contact, including this identity as `self`.
pub fn fingerprints(paths: &Paths, out: &mut impl Write) -> Result<(), CliError> {
    let key = StaticKeypair::load(&paths.key)?;
    let book = load_contacts(&mut FileContactStore::new(&paths.contacts), &key)?;

    for (name, fingerprint) in book.iter() {
        writeln!(out, "{name:<20} {fingerprint}").map_err(CliError::Output)?;
    }
    Ok(())
}

fn load_contacts(store: &mut FileContactStore, key: &StaticKeypair) -> Result<ContactBook, CliError> {
    let mut book = store.load()?;
    book.set_self(key.fingerprint());
    Ok(book)
}

/// Everything a conversation needs, checked before any network I/O.
struct Prepared {
    session: Session<NoiseEngine>,
    store: FileContactStore,
    exec: Option<String>,
}

impl Prepared {
    fn load(paths: &Paths, args: &ConversationArgs) -> Result<Self, CliError> {
        let key = StaticKeypair::load(&paths.key)?;
        let mut store = FileContactStore::new(&paths.contacts);
        let contacts = load_contacts(&mut store, &key)?;
        let mode = AuthMode::resolve(&args.auth_flags(), &contacts)?;
        debug!(?mode, contacts = contacts.len(), "conversation configured");

        let engine = NoiseEngine::new(key)?;
        Ok(Self { session: Session::new(engine, contacts, mode), store, exec: args.exec.clone() })
    }

    async fn converse(self, transport: Transport, interrupt: Interrupt) -> Result<(), CliError> {
        let Self { session, store, exec } = self;

        match exec {
            Some(command) => {
                drive(session, store, ExecEndpoint::new(command), transport, interrupt).await
            },
            None => drive(session, store, StdioEndpoint, transport, interrupt).await,
        }
    }
}

async fn drive<L: LocalEndpoint>(
    session: Session<NoiseEngine>,
    store: FileContactStore,
    local: L,
    transport: Transport,
    interrupt: Interrupt,
) -> Result<(), CliError> {
    let mut runtime = Runtime::new(session, store, local, RuntimeConfig::default());
    let outcome = runtime.run(transport, interrupt).await?;
    debug!(?outcome, "conversation ended");
    Ok(())
}
