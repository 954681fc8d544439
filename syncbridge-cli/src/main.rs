use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use syncbridge_core::config::Config;
use syncbridge_core::core_bridge::{
    BridgeError, ChangeProcessor, EntityData, EntityMetadata, MetadataBatch, MetadataChangeList,
    NaturalKey, PrimaryKey, Record, RecordSpecifics, RecordStore, SqliteRecordStore, StorageKey,
    SyncBridge,
};
use syncbridge_core::core_bridge::{client_tag, client_tag_hash};
use syncbridge_core::logging::{init_logging_with_config, LogConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "syncbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database holding records and sync metadata
    #[arg(long)]
    db: Option<String>,

    /// TOML configuration file (defaults come from SYNCBRIDGE_* variables)
    #[arg(long)]
    config: Option<String>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Have the processor track metadata, so local writes are forwarded
    #[arg(long)]
    track: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(ClapArgs, Debug, Clone)]
struct CredentialArgs {
    /// Page the credential belongs to
    #[arg(long)]
    origin: String,

    #[arg(long)]
    username: String,

    /// Signon realm (defaults to the origin)
    #[arg(long)]
    realm: Option<String>,

    #[arg(long, default_value = "username")]
    username_element: String,

    #[arg(long, default_value = "password")]
    password_element: String,
}

impl CredentialArgs {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            origin: self.origin.clone(),
            username_element: self.username_element.clone(),
            username_value: self.username.clone(),
            password_element: self.password_element.clone(),
            signon_realm: self.realm.clone().unwrap_or_else(|| self.origin.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a new credential
    Add {
        #[command(flatten)]
        credential: CredentialArgs,
        #[arg(long)]
        password: String,
    },
    /// Change the password of an existing credential
    Update {
        #[command(flatten)]
        credential: CredentialArgs,
        #[arg(long)]
        password: String,
    },
    /// Delete a credential by id
    Remove { id: i64 },
    /// List stored credentials (passwords are not shown)
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the client tag and its hash for a credential
    Tag {
        #[command(flatten)]
        credential: CredentialArgs,
    },
    /// Dump everything the bridge would hand to the processor
    Dump,
    /// Show sync state
    Status,
}

/// Processor that logs what it would send upstream
struct LoggingProcessor {
    tracking: bool,
    forwarded: AtomicUsize,
    loaded: Mutex<Option<MetadataBatch>>,
}

impl LoggingProcessor {
    fn new(tracking: bool) -> Self {
        LoggingProcessor { tracking, forwarded: AtomicUsize::new(0), loaded: Mutex::new(None) }
    }

    fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::Relaxed)
    }

    fn loaded(&self) -> Option<MetadataBatch> {
        self.loaded.lock().ok().and_then(|batch| batch.clone())
    }
}

impl ChangeProcessor for LoggingProcessor {
    fn is_tracking_metadata(&self) -> bool {
        self.tracking
    }

    fn put(&self, storage_key: &StorageKey, data: EntityData, metadata: &mut dyn MetadataChangeList) {
        info!(storage_key = %storage_key, realm = %data.specifics.signon_realm, "put");
        let entry = EntityMetadata {
            client_tag_hash: data.client_tag_hash.clone(),
            sequence_number: 1,
            creation_time: data.creation_time,
            ..Default::default()
        };
        metadata.update_metadata(storage_key, &entry);
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn delete(&self, storage_key: &StorageKey, metadata: &mut dyn MetadataChangeList) {
        info!(storage_key = %storage_key, "delete");
        metadata.clear_metadata(storage_key);
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn update_storage_key(
        &self,
        data: &EntityData,
        storage_key: &StorageKey,
        metadata: &mut dyn MetadataChangeList,
    ) {
        metadata.update_metadata(storage_key, &EntityMetadata::from_remote(data));
    }

    fn model_ready_to_sync(&self, batch: MetadataBatch) {
        info!(entities = batch.len(), "model ready to sync");
        if let Ok(mut loaded) = self.loaded.lock() {
            *loaded = Some(batch);
        }
    }

    fn report_error(&self, error: &BridgeError) {
        warn!(error = %error, "bridge reported an error");
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(shellexpand::tilde(path).as_ref())
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env()?,
    };
    if let Some(db) = &args.db {
        config.store.db_path = PathBuf::from(shellexpand::tilde(db).as_ref());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.to_lowercase();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    // Initialize logging
    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    syncbridge_core::metrics::init_metrics();

    let Some(command) = args.command.as_ref() else {
        info!("No command specified. Use --help for usage information.");
        return Ok(());
    };
    let sqlite = Arc::new(
        SqliteRecordStore::open(&config.store.db_path, &config.store)?
            .with_broadcast_capacity(config.bridge.broadcast_capacity),
    );
    let mut committed = sqlite.subscribe();
    let processor = Arc::new(LoggingProcessor::new(args.track));
    let bridge = SyncBridge::new(processor.clone(), sqlite.clone(), config.bridge.clone());

    match command {
        Command::Add { credential, password } => {
            let record = Record::new(credential.natural_key()).with_password(password.clone());
            let outcome = bridge.write_local(|scope| scope.add(&record))?;
            for change in &outcome.changes {
                println!("{:?} {}", change.kind, change.primary_key);
            }
        }
        Command::Update { credential, password } => {
            let key = credential.natural_key();
            let Some(primary) = sqlite.find_by_natural_key(&key)? else {
                anyhow::bail!("no credential matches {} / {}", key.origin, key.username_value);
            };
            let mut record = sqlite.get_record(primary)?.context("credential vanished")?;
            record.password_value = password.clone();
            bridge.write_local(|scope| scope.update(&record))?;
            println!("Update {}", primary);
        }
        Command::Remove { id } => {
            let outcome = bridge.write_local(|scope| scope.remove(PrimaryKey(*id)))?;
            if outcome.changes.is_empty() {
                anyhow::bail!("no credential with id {}", id);
            }
            println!("Remove {}", id);
        }
        Command::List { json } => {
            let records = sqlite.read_all()?;
            if *json {
                let listing: Vec<_> = records
                    .iter()
                    .map(|(key, record)| {
                        serde_json::json!({
                            "id": key.value(),
                            "origin": record.origin,
                            "username": record.username_value,
                            "realm": record.signon_realm,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for (key, record) in &records {
                    println!("{:>6}  {}  {}  {}", key, record.origin, record.username_value, record.signon_realm);
                }
            }
        }
        Command::Tag { credential } => {
            let specifics = RecordSpecifics::from(&Record::new(credential.natural_key()));
            let tag = client_tag(&specifics);
            println!("tag:  {}", tag);
            println!("hash: {}", client_tag_hash(&tag));
        }
        Command::Dump => {
            let dump = bridge.get_all_data_for_debugging()?;
            let entries: Vec<_> = dump
                .iter()
                .map(|(key, data)| serde_json::json!({ "storage_key": key.as_str(), "entity": data }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Status => {
            let persisted = sqlite.metadata_store().get_all_sync_metadata()?;
            let loaded = processor.loaded().unwrap_or_default();
            println!("records:           {}", sqlite.record_count()?);
            println!("tracked entities:  {}", persisted.len());
            println!("initial sync done: {}", persisted.model_state.initial_sync_done);
            println!("loaded at start:   {}", loaded.len());
        }
    }

    while let Ok(batch) = committed.try_recv() {
        info!(origin = ?batch.origin, changes = batch.len(), "batch committed");
    }
    let stats = bridge.stats();
    info!(
        forwarded = processor.forwarded(),
        committed = stats.batches_committed,
        relayed = stats.local_changes_relayed,
        "syncbridge finished"
    );

    Ok(())
}
