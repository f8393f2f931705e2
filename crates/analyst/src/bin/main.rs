// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use data_analyst::{AnalystConfig, DataAnalyst, Envelope, LlmConfig, ValidationPolicy};
use data_analyst_adapter::{ConnectionConfig, EngineKind, SamplingPolicy};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Ask questions about a database in plain language
#[derive(Debug, Parser)]
#[command(name = "data-analyst", version, about)]
struct Cli {
    /// YAML configuration file; replaces the connection and LLM flags
    #[arg(long, short, env = "DATA_ANALYST_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    llm: LlmArgs,

    /// Directory for persisted schema units
    #[arg(long, env = "SCHEMA_DIR", default_value = "./schema")]
    schema_dir: PathBuf,

    /// Only accept statements that literally start with the retrieval keyword
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    /// mysql, postgresql, mssql, sqlite, mongodb, elasticsearch, influxdb or ssas
    #[arg(long = "db-type", env = "DB_TYPE", default_value = "mysql")]
    engine: EngineKind,

    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    host: String,

    /// Defaults to the engine's standard port
    #[arg(long = "db-port", env = "DB_PORT")]
    port: Option<u16>,

    #[arg(long = "db-user", env = "DB_USER", default_value = "")]
    user: String,

    #[arg(long = "db-password", env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    #[arg(long = "db-name", env = "DB_NAME", default_value = "")]
    database: String,

    /// http or https, for Elasticsearch and InfluxDB
    #[arg(long = "db-scheme", env = "DB_SCHEME", default_value = "http")]
    scheme: String,

    /// Database file, for SQLite
    #[arg(long = "db-path", env = "DB_PATH")]
    path: Option<PathBuf>,

    /// Schema searched by PostgreSQL introspection
    #[arg(long = "db-schema", env = "DB_SCHEMA", default_value = "public")]
    schema: String,

    /// Documents sampled per MongoDB collection
    #[arg(long = "sample-size", env = "DB_SAMPLE_SIZE", default_value_t = 100)]
    sample_size: u32,
}

#[derive(Debug, Args)]
struct LlmArgs {
    #[arg(long = "llm-api-key", env = "LLM_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    #[arg(long = "llm-model", env = "LLM_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    #[arg(long = "llm-api-url", env = "LLM_API_URL", default_value = "https://api.openai.com/v1")]
    api_url: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read prompts from standard input until `exit` (default)
    Interactive,
    /// Generate and run a query for one prompt
    Query {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Run a statement directly, through the same read-only gate
    Execute { statement: String },
    /// Print the cached schema
    Schema,
    /// Rebuild the schema and print the report
    Rebuild,
}

impl Cli {
    fn analyst_config(&self) -> anyhow::Result<AnalystConfig> {
        let mut config = match &self.config {
            Some(path) => AnalystConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AnalystConfig::new(self.database.connection_config())
                .with_llm(self.llm.llm_config())
                .with_schema_dir(self.schema_dir.clone()),
        };
        if self.strict {
            config.validation = ValidationPolicy::strict();
        }
        Ok(config)
    }
}

impl DatabaseArgs {
    fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.engine)
            .with_host(self.host.clone())
            .with_credentials(self.user.clone(), self.password.clone())
            .with_database(self.database.clone())
            .with_sampling(SamplingPolicy {
                sample_size: self.sample_size,
                ..SamplingPolicy::default()
            });
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(path) = &self.path {
            config = config.with_path(path.clone());
        }
        config.scheme = self.scheme.clone();
        config.schema = self.schema.clone();
        config
    }
}

impl LlmArgs {
    fn llm_config(&self) -> LlmConfig {
        LlmConfig::default()
            .with_api_key(self.api_key.clone())
            .with_model(self.model.clone())
            .with_api_url(self.api_url.clone())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Data analyst failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.analyst_config()?;
    config.validate().context("invalid configuration")?;

    let analyst = DataAnalyst::new(&config)?;
    tracing::info!(
        engine = %config.connection.engine,
        database = %config.connection.database,
        model = %config.llm.model,
        "Starting data analyst"
    );

    let rebuilt = analyst.rebuild_schema().await;
    let is_rebuild = matches!(cli.command, Some(Command::Rebuild));
    if !rebuilt.success || is_rebuild {
        print_envelope(&rebuilt);
        return Ok(finish(&analyst, rebuilt.success).await);
    }

    let success = match cli.command.unwrap_or(Command::Interactive) {
        Command::Interactive => {
            interactive(&analyst, &config).await?;
            true
        }
        Command::Query { prompt } => report(analyst.query_with_prompt(&prompt.join(" ")).await),
        Command::Execute { statement } => report(analyst.execute_query(&statement).await),
        Command::Schema => report(analyst.schema().await),
        Command::Rebuild => true,
    };

    Ok(finish(&analyst, success).await)
}

async fn interactive(analyst: &DataAnalyst, config: &AnalystConfig) -> anyhow::Result<()> {
    println!("\nData Analyst - interactive mode");
    println!(
        "Database: {} ({})",
        config.connection.engine, config.connection.database
    );
    println!("{}", "=".repeat(60));
    println!("Enter your prompt (or 'exit' to quit)");
    println!("{}", "=".repeat(60));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Your prompt> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt.to_ascii_lowercase().as_str(), "exit" | "quit" | "q") {
            println!("Goodbye!");
            break;
        }

        let envelope = match analyst.generate_query(prompt).await {
            Ok(query) => {
                println!("\nGenerated query:\n{query}\n");
                analyst.execute_query(&query).await
            }
            Err(error) => Envelope::from_error(&error),
        };

        match (&envelope.data, &envelope.error) {
            (Some(serde_json::Value::Array(rows)), _) => {
                println!("Query returned {} row(s)", rows.len());
            }
            (_, Some(error)) => println!("Error: {error}"),
            _ => println!("Query executed"),
        }
        print_envelope(&envelope);
    }
    Ok(())
}

fn report(envelope: Envelope) -> bool {
    print_envelope(&envelope);
    envelope.success
}

fn print_envelope(envelope: &Envelope) {
    println!("{}", envelope.to_json_pretty());
}

async fn finish(analyst: &DataAnalyst, success: bool) -> ExitCode {
    if let Err(error) = analyst.shutdown().await {
        tracing::warn!(%error, "Shutdown failed");
    }
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
