use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the docasm binary.
#[derive(Debug, Parser)]
#[command(name = "docasm", version, about = "Document store with cached template resolution")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "DOCASM_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Create a document.
    Create(CreateArgs),
    /// Resolve documents through the cache, fetching their templates.
    Get(GetArgs),
    /// List stored documents without templates.
    List(ListArgs),
    /// Change fields of an existing document.
    Update(UpdateArgs),
    /// Delete a document by id or name.
    Delete(DeleteArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Override the maximum number of cached documents.
    #[arg(long = "cache-capacity", value_name = "COUNT", global = true)]
    pub cache_capacity: Option<usize>,

    /// Override the per-load deadline of the document cache.
    #[arg(long = "cache-load-timeout-ms", value_name = "MILLIS", global = true)]
    pub cache_load_timeout_ms: Option<u64>,

    /// Override the template request timeout.
    #[arg(long = "templates-timeout-ms", value_name = "MILLIS", global = true)]
    pub templates_timeout_ms: Option<u64>,

    /// Override the largest accepted template body.
    #[arg(long = "templates-max-bytes", value_name = "BYTES", global = true)]
    pub templates_max_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    /// Unique document name.
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Template location (http, https or file URL).
    #[arg(long = "template-uri", value_name = "URI")]
    pub template_uri: Option<String>,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("keys").required(true).multiple(true).args(["ids", "names"])))]
pub struct GetArgs {
    /// Document id; repeatable.
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<i64>,

    /// Document name; repeatable.
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Omit template content from the output.
    #[arg(long = "no-template", action = clap::ArgAction::SetTrue)]
    pub no_template: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    #[arg(long, default_value_t = 0)]
    pub offset: u64,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[arg(long)]
    pub id: i64,

    /// New unique name.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long = "clear-description", action = clap::ArgAction::SetTrue)]
    pub clear_description: bool,

    #[arg(long = "template-uri", value_name = "URI", conflicts_with = "clear_template_uri")]
    pub template_uri: Option<String>,

    #[arg(long = "clear-template-uri", action = clap::ArgAction::SetTrue)]
    pub clear_template_uri: bool,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("key").required(true).args(["id", "name"])))]
pub struct DeleteArgs {
    #[arg(long)]
    pub id: Option<i64>,

    #[arg(long)]
    pub name: Option<String>,
}
