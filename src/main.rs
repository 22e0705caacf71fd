// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use headless_cms::app_config::{self, Config, TranslationProvider};
use headless_cms::content::{ContentSchema, Entity, EntityRef};
use headless_cms::database::{EntityData, Repository};
use headless_cms::publication::{PublicationService, PublishedReader};
use headless_cms::translation::{self, TranslationPipeline};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Passthrough,
    OpenAI,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Passthrough => TranslationProvider::Passthrough,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Entity addressed by content type and id
#[derive(Args, Debug)]
struct EntityArgs {
    /// Content type name (e.g., 'post')
    kind: String,

    /// Entity id
    id: i64,
}

impl EntityArgs {
    fn reference(&self) -> EntityRef {
        EntityRef::new(self.kind.clone(), self.id)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an unpublished entity
    Create {
        /// Content type name
        kind: String,

        /// Field values as JSON, localized fields as {"lang": "text"} objects
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// Edit the live fields of an entity and record a revision
    Update {
        #[command(flatten)]
        entity: EntityArgs,

        /// Field values as JSON, merged into the current ones
        #[arg(short, long)]
        data: String,
    },

    /// Link (or unlink) a related entity
    Relate {
        #[command(flatten)]
        entity: EntityArgs,

        /// Relation name declared on the content type
        relation: String,

        /// Id of the related entity
        target_id: i64,

        /// Position inside an ordered collection
        #[arg(long)]
        position: Option<i64>,

        /// Remove the link instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Publish the current state of an entity
    Publish {
        #[command(flatten)]
        entity: EntityArgs,

        /// Also publish every related entity
        #[arg(short, long)]
        recursive: bool,
    },

    /// Withdraw an entity from publication
    Unpublish {
        #[command(flatten)]
        entity: EntityArgs,
    },

    /// Translate the missing languages of an entity
    Translate {
        #[command(flatten)]
        entity: EntityArgs,

        /// Translate every target language again
        #[arg(short, long)]
        force: bool,

        /// Also translate every related entity
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show the publication state of an entity
    State {
        #[command(flatten)]
        entity: EntityArgs,
    },

    /// Print published content as JSON
    Published {
        /// Content type name
        kind: String,

        /// Only this entity
        id: Option<i64>,

        /// Nest published related entities
        #[arg(short, long, requires = "id")]
        tree: bool,
    },

    /// List the revisions of an entity
    Revisions {
        #[command(flatten)]
        entity: EntityArgs,
    },

    /// Delete snapshots older than the published ones
    CleanOutdated {
        /// Only revisions older than this many days (defaults to the configured value)
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Generate shell completions for hcms
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// hcms - publication and versioning core of a headless CMS
///
/// Manages localized content with revisions, a publish/unpublish workflow
/// and automatic translation through LLM providers (OpenAI, Anthropic).
#[derive(Parser, Debug)]
#[command(name = "hcms")]
#[command(version = "0.1.0")]
#[command(about = "Versioned, translatable headless CMS content")]
#[command(long_about = "hcms stores localized content with a revision history, publishes snapshots of it and translates missing languages using AI providers.

EXAMPLES:
    hcms create post -d '{\"title\": {\"en\": \"Hello\"}}'   # Create a post
    hcms update post 1 -d '{\"title\": {\"en\": \"Hi\"}}'    # Edit it (records a revision)
    hcms relate post 1 tags 3                              # Add tag 3 to the post
    hcms publish -r post 1                                 # Publish the post and its relations
    hcms translate -f post 1                               # Translate every language again
    hcms published --tree post 1                           # Print the published post
    hcms clean-outdated --days 30                          # Drop old snapshots
    hcms completions bash > hcms.bash                      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    passthrough - Copies the base language text (default)
    openai      - OpenAI API (requires API key)
    anthropic   - Anthropic Claude API (requires API key)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// User recorded on revisions
    #[arg(short, long, global = true)]
    user: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Max level is lowered or raised once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "hcms", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    let schema = Arc::new(config.schema()?);
    let repository = match &config.storage.database_path {
        Some(path) => Repository::new(
            headless_cms::database::DatabaseConnection::new(path)
                .with_context(|| format!("Failed to open database: {:?}", path))?,
        ),
        None => Repository::new_default().context("Failed to open default database")?,
    };

    let engine = translation::build_engine(&config.translation);
    let pipeline = TranslationPipeline::from_config(engine, &config.languages);
    let service = PublicationService::new(repository, schema, pipeline);

    run_command(cli.command, &service, &config, cli.user.as_deref()).await
}

/// Load the configuration file (creating it with defaults when missing) and apply CLI overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let config_path = &cli.config_path;

    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Parse a JSON object argument into the live data of an entity of `kind`
fn parse_entity_data(schema: &ContentSchema, kind: &str, data: &str) -> Result<Map<String, Value>> {
    schema.require(kind)?;
    match serde_json::from_str::<Value>(data).context("Invalid --data JSON")? {
        Value::Object(object) => Ok(object),
        other => Err(anyhow!("--data must be a JSON object, got: {}", other)),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(
    command: Commands,
    service: &PublicationService,
    config: &Config,
    user: Option<&str>,
) -> Result<()> {
    let schema = service.schema();

    match command {
        Commands::Create { kind, data } => {
            let fields = parse_entity_data(schema, &kind, &data)?;
            let mut draft = Entity::new(EntityRef::new(kind.clone(), 0));
            draft.apply_field_dict(schema.localized_fields(&kind), &fields);

            let entity = service
                .create(&kind, EntityData::from_entity(&draft))
                .await
                .with_context(|| format!("Failed to create {}", kind))?;
            println!("{}", entity.reference);
        }
        Commands::Update { entity, data } => {
            let reference = entity.reference();
            let fields = parse_entity_data(schema, &reference.kind, &data)?;

            let mut current = service
                .repository()
                .get_entity(&reference)
                .await
                .with_context(|| format!("Failed to load {}", reference))?;
            current.apply_field_dict(schema.localized_fields(&reference.kind), &fields);

            match service
                .save(&current, user)
                .await
                .with_context(|| format!("Failed to update {}", reference))?
            {
                Some(revision) => info!("Saved {} (revision {})", reference, revision),
                None => info!("Saved {}, no changes recorded", reference),
            }
        }
        Commands::Relate {
            entity,
            relation,
            target_id,
            position,
            remove,
        } => {
            let reference = entity.reference();
            let definition = schema
                .require(&reference.kind)?
                .find_relation(&relation)
                .ok_or_else(|| anyhow!("'{}' has no relation named '{}'", reference.kind, relation))?;
            if definition.is_reverse() {
                return Err(anyhow!(
                    "'{}' is the reverse of '{}.{}', link from the other side",
                    relation,
                    definition.target,
                    definition.reverse_of.as_deref().unwrap_or_default()
                ));
            }
            let target = EntityRef::new(definition.target.clone(), target_id);
            let repository = service.repository();

            let result = match (definition.kind.is_to_many(), remove) {
                (true, false) => repository.add_relation(&reference, &relation, &target, position).await,
                (true, true) => repository.remove_relation(&reference, &relation, &target).await.map(|_| ()),
                (false, false) => repository.set_relation(&reference, &relation, Some(&target)).await,
                (false, true) => repository.set_relation(&reference, &relation, None).await,
            };
            result.with_context(|| format!("Failed to relate {} to {} via '{}'", reference, target, relation))?;
            info!("{} {} {} via '{}'", if remove { "Unlinked" } else { "Linked" }, reference, target, relation);
        }
        Commands::Publish { entity, recursive } => {
            let reference = entity.reference();
            if recursive {
                service
                    .recursively_publish(&reference, user)
                    .await
                    .with_context(|| format!("Failed to recursively publish {}", reference))?;
            } else {
                service
                    .publish(&reference, user)
                    .await
                    .with_context(|| format!("Failed to publish {}", reference))?;
            }
        }
        Commands::Unpublish { entity } => {
            let reference = entity.reference();
            service
                .unpublish(&reference, user)
                .await
                .with_context(|| format!("Failed to unpublish {}", reference))?;
        }
        Commands::Translate {
            entity,
            force,
            recursive,
        } => {
            let reference = entity.reference();
            service
                .pipeline()
                .engine()
                .check_connection()
                .await
                .context("Translation provider is not reachable")?;
            if recursive {
                service
                    .recursively_translate(&reference, user, force)
                    .await
                    .with_context(|| format!("Failed to recursively translate {}", reference))?;
            } else {
                service
                    .translate(&reference, user, force)
                    .await
                    .with_context(|| format!("Failed to translate {}", reference))?;
            }
        }
        Commands::State { entity } => {
            let reference = entity.reference();
            let state = service
                .publication_state(&reference)
                .await
                .with_context(|| format!("Failed to read the state of {}", reference))?;
            println!("{}", state);
        }
        Commands::Published { kind, id, tree } => {
            let reader = PublishedReader::new(service.repository(), schema);
            match id {
                None => print_json(&reader.serialize(&kind).await?)?,
                Some(id) => {
                    let reference = EntityRef::new(kind, id);
                    let value = if tree {
                        reader.published_tree(&reference).await?
                    } else {
                        reader.published_data(&reference).await?.map(Value::Object)
                    };
                    let value = value.ok_or_else(|| anyhow!("{} is not published", reference))?;
                    print_json(&value)?;
                }
            }
        }
        Commands::Revisions { entity } => {
            let reference = entity.reference();
            for entry in service.history(&reference).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.revision.id,
                    entry.snapshot_id,
                    entry.revision.date_created,
                    entry.revision.user_id.as_deref().unwrap_or("-"),
                    entry.revision.comment
                );
            }
        }
        Commands::CleanOutdated { days } => {
            let days = days.unwrap_or(config.retention.outdated_snapshot_days);
            let deleted = service
                .delete_outdated_snapshots(days)
                .await
                .context("Failed to delete outdated snapshots")?;
            info!("Deleted {} outdated snapshot(s)", deleted);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
