// Command-line front end. Parses arguments, wires core services to their infra
// implementations, and hands off to the per-feature command handlers.

pub mod auth_commands;
pub mod chat_commands;
pub mod notes_commands;
pub mod thread_commands;

use crate::config::AppConfig;
use crate::core::ai::{AiConfig, AiService};
use crate::core::auth::{AuthService, CacheSession, DeviceFlow};
use crate::core::documents::{CatalogService, DocumentService};
use crate::core::threads::{ThreadService, ThreadStore};
use crate::infra::ai::PerplexityClient;
use crate::infra::auth::{FileCredentialStore, MicrosoftIdentityProvider};
use crate::infra::documents::{GraphDocumentStore, JsonCatalogStore};
use crate::infra::threads::{InMemoryThreadStore, SqliteThreadStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

pub type AppAuth = AuthService<MicrosoftIdentityProvider, FileCredentialStore>;
pub type AppDocuments = DocumentService<GraphDocumentStore, Arc<AppAuth>>;

#[derive(Parser)]
#[command(
    name = "notes-assistant",
    about = "Search, summarize and chat about your OneDrive notes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(flatten)]
    Remote(RemoteCommand),

    /// Talk to the ELIZA chatbot.
    Eliza {
        /// Persist the conversation as a thread.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved conversation threads.
    Threads {
        #[command(subcommand)]
        action: ThreadAction,
    },
}

/// Commands that go through the Microsoft account.
#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Sign in with a device code.
    Login,
    /// Print the authorization status as JSON. Never waits for sign-in.
    Status,
    /// List cached accounts.
    Accounts,
    /// Remove a cached account.
    Logout {
        /// Home account id (see `accounts`).
        account: String,
    },
    /// Search your Word documents.
    Search {
        query: String,
        /// Add the results to the local notes catalog.
        #[arg(long)]
        save: bool,
    },
    /// Replace the local notes catalog with the results of a search.
    ExportNotes {
        #[arg(long, default_value = "notes")]
        query: String,
    },
    /// Show the local notes catalog.
    Notes,
    /// Summarize one or more documents.
    Summarize {
        /// Document ids.
        ids: Vec<String>,
    },
    /// Chat with the assistant, optionally attaching documents.
    Chat {
        /// Document id to attach to every message. Repeatable.
        #[arg(long = "note")]
        notes: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ThreadAction {
    /// List saved threads, most recent first.
    List,
    /// Print one thread.
    Show { id: String },
    /// Delete a thread.
    Delete { id: String },
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Remote(command) => {
            let session = AuthSession::open(&config)?;
            let result = run_remote(command, &config, &session).await;
            let closed = session.close().await;
            result.and(closed)
        }
        Command::Eliza { save } => chat_commands::eliza(&config, save).await,
        Command::Threads { action } => thread_commands::handle(&config, action).await,
    }
}

async fn run_remote(
    command: RemoteCommand,
    config: &AppConfig,
    session: &AuthSession,
) -> Result<()> {
    match command {
        RemoteCommand::Login => auth_commands::login(session).await,
        RemoteCommand::Status => auth_commands::status(session.auth()).await,
        RemoteCommand::Accounts => auth_commands::accounts(session.auth()).await,
        RemoteCommand::Logout { account } => {
            auth_commands::logout(session.auth(), &account).await
        }
        RemoteCommand::Search { query, save } => {
            notes_commands::search(config, session, &query, save).await
        }
        RemoteCommand::ExportNotes { query } => {
            notes_commands::export_notes(config, session, &query).await
        }
        RemoteCommand::Notes => notes_commands::list_catalog(config).await,
        RemoteCommand::Summarize { ids } => {
            notes_commands::summarize(config, session, &ids).await
        }
        RemoteCommand::Chat { notes } => chat_commands::chat(config, session, &notes).await,
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// The auth service for one CLI invocation. The credential cache is opened
/// here and flushed by `close`.
pub struct AuthSession {
    auth: Arc<AppAuth>,
}

impl AuthSession {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let provider = MicrosoftIdentityProvider::new(
            config.client_id()?.to_string(),
            config.authority.clone(),
            config.http_timeout,
        )
        .context("Failed to build identity provider client")?;

        let store = FileCredentialStore::new(&config.token_cache_path);
        let cache = CacheSession::open(store).with_context(|| {
            format!(
                "Failed to load credential cache from {}",
                config.token_cache_path.display()
            )
        })?;

        Ok(Self {
            auth: Arc::new(AuthService::new(provider, cache, config.scopes.clone())),
        })
    }

    pub fn auth(&self) -> &AppAuth {
        &self.auth
    }

    /// Makes sure a token is available, running the device-code sign-in if needed.
    pub async fn sign_in(&self) -> Result<()> {
        self.auth
            .get_access_token(print_device_flow)
            .await
            .context("Sign-in failed")?;
        Ok(())
    }

    pub fn documents(&self, config: &AppConfig) -> Result<AppDocuments> {
        let store = GraphDocumentStore::new(
            config.graph_base_url.clone(),
            config.drive_id.clone(),
            config.http_timeout,
        )
        .context("Failed to build Graph client")?;
        Ok(DocumentService::new(store, Arc::clone(&self.auth)))
    }

    /// Saves the credential cache and releases the service. If a document
    /// service built from this session is still alive, the cache is only flushed.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.auth) {
            Ok(auth) => {
                let written = auth.close().context("Failed to save credential cache")?;
                debug!(written, "Credential cache closed");
            }
            Err(shared) => {
                warn!("Auth service still in use at exit; flushing credential cache");
                let written = shared
                    .flush()
                    .await
                    .context("Failed to save credential cache")?;
                debug!(written, "Credential cache flushed");
            }
        }
        Ok(())
    }
}

pub fn assistant(config: &AppConfig) -> Result<AiService<PerplexityClient>> {
    let client = PerplexityClient::new(
        config.perplexity_api_key()?.to_string(),
        config.perplexity_base_url.clone(),
        config.http_timeout,
    )
    .context("Failed to build Perplexity client")?;

    let ai_config = AiConfig {
        model: config.perplexity_model.clone(),
        temperature: None,
        max_tokens: None,
    };
    Ok(AiService::new(client, config.system_prompt.clone(), ai_config))
}

pub fn catalog(config: &AppConfig) -> CatalogService<JsonCatalogStore> {
    CatalogService::new(JsonCatalogStore::new(&config.notes_metadata_path))
}

/// Thread storage. `THREADS_DB_PATH=:memory:` keeps threads for this run only.
pub async fn threads(config: &AppConfig) -> Result<ThreadService<Box<dyn ThreadStore>>> {
    let store: Box<dyn ThreadStore> = if config.threads_db_path == ":memory:" {
        Box::new(InMemoryThreadStore::new())
    } else {
        let sqlite = SqliteThreadStore::new(&config.threads_db_path)
            .await
            .context("Failed to open threads database")?;
        Box::new(sqlite)
    };
    Ok(ThreadService::new(store))
}

fn print_device_flow(flow: &DeviceFlow) {
    match &flow.message {
        Some(message) => println!("{}", message),
        None => println!(
            "To sign in, open {} and enter the code {}",
            flow.verification_uri, flow.user_code
        ),
    }
    println!("Waiting for you to finish signing in...");
}

/// Prints a prompt without a trailing newline.
pub fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(())
}
