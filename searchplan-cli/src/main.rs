use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchplan_core::logging::{self, LogLevel};
use searchplan_core::{
    ConditionSet, ListDirective, MemoryTable, ModelRegistry, ModelSchema, Projection, QueryPlan,
    RecordingCursor, SearchConfig, SearchOptions, SearchRequest, Searcher,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "searchplan")]
#[command(about = "searchplan CLI - compile search requests into query operations and run them")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RequestArgs {
    /// Request JSON file (a search request, or raw input when --template is set)
    #[arg(long)]
    request: PathBuf,
    /// List directive JSON file: {"field", "type", "model", "args"}
    #[arg(long)]
    template: Option<PathBuf>,
    /// Model to search; defaults to the directive's model
    #[arg(long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the query-builder operations a request compiles to
    Compile {
        #[command(flatten)]
        args: RequestArgs,
        /// Data file whose rows provide the model's columns
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Run a request against JSON data
    Run {
        #[command(flatten)]
        args: RequestArgs,
        /// Data file: { "Model": [rows...], ... }
        #[arg(long)]
        data: PathBuf,
        /// Result fields to produce, e.g. items,total
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Count matching rows, ignoring paging
    Count {
        #[command(flatten)]
        args: RequestArgs,
        #[arg(long)]
        data: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.log_level.as_deref())?;

    match cli.command {
        Commands::Compile { args, data } => compile(&config, &args, data.as_deref()),
        Commands::Run { args, data, fields } => run(&config, &args, &data, &fields),
        Commands::Count { args, data } => count(&config, &args, &data),
    }
}

fn load_config(path: Option<&Path>, log_level: Option<&str>) -> Result<SearchConfig> {
    let config = match path {
        Some(path) => SearchConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => SearchConfig::default(),
    }
    .with_env_overrides()
    .with_context(|| "Invalid environment override")?;

    logging::init_from_env();
    if let Some(level) = config.log_level() {
        logging::set_log_level(level);
    }
    if let Some(raw) = log_level {
        let level = LogLevel::parse(raw).ok_or_else(|| anyhow::anyhow!("Unknown log level: {}", raw))?;
        logging::set_log_level(level);
    }
    Ok(config)
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in file: {}", path.display()))
}

/// Bound request plus the model it targets, if known
fn load_request(config: &SearchConfig, args: &RequestArgs) -> Result<(SearchRequest, Option<String>)> {
    let input = read_json(&args.request)?;

    match &args.template {
        Some(path) => {
            let directive = ListDirective::from_json(&read_json(path)?)
                .with_context(|| format!("Invalid directive in: {}", path.display()))?;
            let model = match &args.model {
                Some(model) => model.clone(),
                None => directive.model_name()?,
            };
            let request = directive
                .bind(config, &input)
                .with_context(|| format!("Failed to bind input to '{}'", directive.field_name()))?;
            Ok((request, Some(model)))
        }
        None => {
            let request = SearchRequest::from_json(&input)
                .with_context(|| format!("Invalid request in: {}", args.request.display()))?;
            Ok((request, args.model.clone()))
        }
    }
}

/// Data format: { "Model": [rows...], ... }
fn load_tables(path: &Path) -> Result<Vec<MemoryTable>> {
    let data: Map<String, Value> = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Data file must be an object of models: {}", path.display()))?;

    data.into_iter()
        .map(|(model, rows)| match rows {
            Value::Array(rows) => Ok(MemoryTable::from_rows(&model, rows)),
            _ => anyhow::bail!("Model '{}' must be an array of rows", model),
        })
        .collect()
}

fn pick_table(tables: Vec<MemoryTable>, model: Option<&str>) -> Result<(MemoryTable, ModelRegistry)> {
    let mut registry = ModelRegistry::new();
    for table in &tables {
        registry.register(table.schema().clone());
    }

    let table = match model {
        Some(model) => tables
            .into_iter()
            .find(|t| t.schema().name() == model)
            .with_context(|| format!("Model '{}' not found in data file", model))?,
        None if tables.len() == 1 => tables
            .into_iter()
            .next()
            .with_context(|| "Data file has no models")?,
        None => anyhow::bail!("--model required when the data file holds several models"),
    };
    Ok((table, registry))
}

fn compile(config: &SearchConfig, args: &RequestArgs, data: Option<&Path>) -> Result<()> {
    let (request, model) = load_request(config, args)?;
    let model = model.unwrap_or_else(|| "Model".to_string());

    let (schema, registry) = match data {
        Some(path) => {
            let (table, registry) = pick_table(load_tables(path)?, Some(model.as_str()))?;
            (table.schema().clone(), registry)
        }
        None => (ModelSchema::new(model), ModelRegistry::new()),
    };

    let set = ConditionSet::compile(&request).with_context(|| "Failed to normalize request")?;
    let plan = QueryPlan::build(&set, &schema, &registry).with_context(|| "Failed to plan request")?;
    let mut cursor = RecordingCursor::new();
    plan.apply(&mut cursor)?;

    let json = serde_json::to_string_pretty(cursor.ops()).with_context(|| "Failed to serialize operations")?;
    println!("{}", json);
    Ok(())
}

fn run(config: &SearchConfig, args: &RequestArgs, data: &Path, fields: &[String]) -> Result<()> {
    let (request, model) = load_request(config, args)?;
    let (table, registry) = pick_table(load_tables(data)?, model.as_deref())?;

    let projection = if fields.is_empty() {
        Projection::all()
    } else {
        Projection::from_fields(fields)
    };
    let options = SearchOptions::new().with_projection(projection);

    let result = Searcher::new(config, &registry)
        .search(&table, &request, &options)
        .with_context(|| format!("Search on '{}' failed", table.schema().name()))?;

    let json = serde_json::to_string_pretty(&result).with_context(|| "Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

fn count(config: &SearchConfig, args: &RequestArgs, data: &Path) -> Result<()> {
    let (request, model) = load_request(config, args)?;
    let (table, registry) = pick_table(load_tables(data)?, model.as_deref())?;

    let total = Searcher::new(config, &registry)
        .count(&table, &request)
        .with_context(|| format!("Count on '{}' failed", table.schema().name()))?;
    println!("{}", total);
    Ok(())
}
