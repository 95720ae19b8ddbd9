//! The `ptx` binary: command dispatch for querying logs as typed events.

mod config;
mod error;
mod output;
mod source;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use regex::RegexBuilder;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ptx_engine::{
    Detector, EvalTransform, Event, Execution, LineParser, TransformChain, UserRegexParser,
};
use ptx_query::{parse_duration, parse_query, parse_transform};

use config::Config;
use error::{CliError, Result};
use output::OutputFormat;
use source::SourceLines;

#[derive(Parser)]
#[command(name = "ptx")]
#[command(about = "Query logs from heterogeneous sources as typed events")]
#[command(version)]
struct Cli {
    /// Verbose diagnostics on stderr (dropped-line counts, detection)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over log files (or stdin when none are given)
    Query {
        /// Query string, or `@name` for a config alias
        query: String,

        /// Input files; stdin when empty
        files: Vec<PathBuf>,

        /// Only events newer than this (e.g. 30m, 2h, 7d)
        #[arg(long)]
        since: Option<String>,

        /// Only events older than this
        #[arg(long)]
        until: Option<String>,

        /// Force a parser instead of auto-detection (see `ptx formats`)
        #[arg(long)]
        format: Option<String>,

        /// Output format
        #[arg(long, value_enum)]
        output: Option<OutputFormat>,

        /// Cap the number of output items (query `limit` wins)
        #[arg(long)]
        limit: Option<usize>,

        /// Per-event transform `field = expr`; repeatable, applied in order
        #[arg(long = "eval")]
        eval: Vec<String>,
    },

    /// Case-insensitive regex search over raw lines and field values
    Find {
        pattern: String,

        /// Input files; stdin when empty
        files: Vec<PathBuf>,

        #[arg(long)]
        format: Option<String>,

        #[arg(long, value_enum)]
        output: Option<OutputFormat>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Project events down to the named fields
    Extract {
        /// Comma-separated field names to keep
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Input files; stdin when empty
        files: Vec<PathBuf>,

        #[arg(long)]
        format: Option<String>,

        #[arg(long, value_enum)]
        output: Option<OutputFormat>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List registered parser names
    Formats,

    /// List registered source kinds
    Sources,
}

fn main() -> ExitCode {
    // Flag and command mistakes are user errors: exit 1, not clap's 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ptx: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Query {
            query,
            files,
            since,
            until,
            format,
            output,
            limit,
            eval,
        } => cmd_query(
            &config, &query, &files, since, until, format, output, limit, &eval,
        ),
        Commands::Find {
            pattern,
            files,
            format,
            output,
            limit,
        } => cmd_find(&config, &pattern, &files, format, output, limit),
        Commands::Extract {
            fields,
            files,
            format,
            output,
            limit,
        } => cmd_extract(&config, &fields, &files, format, output, limit),
        Commands::Formats => cmd_formats(&config),
        Commands::Sources => cmd_sources(),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    config: &Config,
    query: &str,
    files: &[PathBuf],
    since: Option<String>,
    until: Option<String>,
    format: Option<String>,
    output: Option<OutputFormat>,
    limit: Option<usize>,
    eval: &[String],
) -> Result<()> {
    let query_text = config.resolve_alias(query)?;
    let mut query = parse_query(query_text)?;

    let events = load_events(config, files, format.as_deref())?;
    let events = clip_by_time(events, since, until)?;
    let events = apply_transforms(events, eval)?;

    // The query's own limit clause wins over the flag and the config default.
    if query.limit.is_none() {
        query.limit = limit.or(config.defaults.limit);
    }

    let result = ptx_engine::execute(&query, events);
    print_result(&result, pick_output(config, output))
}

fn cmd_find(
    config: &Config,
    pattern: &str,
    files: &[PathBuf],
    format: Option<String>,
    output: Option<OutputFormat>,
    limit: Option<usize>,
) -> Result<()> {
    if pattern.is_empty() {
        return Err(CliError::MissingArgument("pattern".to_string()));
    }
    let needle = RegexBuilder::new(pattern).case_insensitive(true).build()?;

    let events = load_events(config, files, format.as_deref())?;
    let mut hits: Vec<Event> = events
        .into_iter()
        .filter(|event| {
            event.raw.as_deref().is_some_and(|raw| needle.is_match(raw))
                || event
                    .fields
                    .values()
                    .any(|value| needle.is_match(&value.render()))
        })
        .collect();

    if let Some(limit) = limit.or(config.defaults.limit) {
        hits.truncate(limit);
    }
    print_result(&Execution::Events(hits), pick_output(config, output))
}

fn cmd_extract(
    config: &Config,
    fields: &[String],
    files: &[PathBuf],
    format: Option<String>,
    output: Option<OutputFormat>,
    limit: Option<usize>,
) -> Result<()> {
    if fields.is_empty() {
        return Err(CliError::MissingArgument("--fields".to_string()));
    }

    let events = load_events(config, files, format.as_deref())?;
    let mut projected: Vec<Event> = events
        .into_iter()
        .map(|mut event| {
            event.fields.retain(|name, _| fields.iter().any(|f| f == name));
            event
        })
        .collect();

    if let Some(limit) = limit.or(config.defaults.limit) {
        projected.truncate(limit);
    }
    print_result(&Execution::Events(projected), pick_output(config, output))
}

fn cmd_formats(config: &Config) -> Result<()> {
    for name in build_detector(config)?.format_names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_sources() -> Result<()> {
    for kind in source::SOURCE_KINDS {
        println!("{kind}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline plumbing
// ---------------------------------------------------------------------------

/// Build the parser registry: built-ins in priority order, plus the
/// config-defined regex format at the lowest priority.
fn build_detector(config: &Config) -> Result<Detector> {
    let mut detector = Detector::new();
    if let Some(regex_format) = &config.regex {
        let parser = UserRegexParser::new(
            &regex_format.pattern,
            regex_format.timestamp_field.clone(),
            regex_format.timestamp_format.clone(),
            &regex_format.types,
        )?;
        detector.register(Box::new(parser));
    }
    Ok(detector)
}

/// Read all sources and parse them into one event batch, preserving
/// per-source line order. `forced` selects a parser by name and skips
/// detection.
fn load_events(config: &Config, files: &[PathBuf], forced: Option<&str>) -> Result<Vec<Event>> {
    let detector = build_detector(config)?;
    let sources = source::collect(files)?;

    let mut events = Vec::new();
    let mut undetected: Option<String> = None;
    let mut total_lines = 0usize;

    for SourceLines { label, lines } in &sources {
        total_lines += lines.len();
        let parser: &dyn LineParser = match forced {
            Some(name) => detector
                .by_name(name)
                .ok_or_else(|| CliError::UnknownFormat(name.to_string()))?,
            None => match detector.detect(lines) {
                Some(parser) => parser,
                None => {
                    if !lines.iter().all(|l| l.trim().is_empty()) {
                        undetected.get_or_insert_with(|| label.clone());
                    }
                    continue;
                }
            },
        };

        let parsed = parser.parse_many(lines, label);
        debug!(
            source = %label,
            format = parser.format_name(),
            lines = lines.len(),
            events = parsed.len(),
            dropped = lines.len() - parsed.len(),
            "parsed source"
        );
        events.extend(parsed);
    }

    // Detection failure only surfaces when it cost us the whole input.
    if events.is_empty()
        && total_lines > 0
        && let Some(label) = undetected
    {
        return Err(CliError::NoFormatDetected(label));
    }
    Ok(events)
}

/// Apply `--since` / `--until` cutoffs, both expressed as durations back
/// from now.
fn clip_by_time(
    events: Vec<Event>,
    since: Option<String>,
    until: Option<String>,
) -> Result<Vec<Event>> {
    let now = ptx_engine::timestamp::now_epoch();
    let newest_floor = since.map(|d| parse_duration(&d)).transpose()?.map(|d| now - d);
    let oldest_ceiling = until.map(|d| parse_duration(&d)).transpose()?.map(|d| now - d);

    Ok(events
        .into_iter()
        .filter(|event| {
            newest_floor.is_none_or(|floor| event.timestamp >= floor)
                && oldest_ceiling.is_none_or(|ceiling| event.timestamp <= ceiling)
        })
        .collect())
}

fn apply_transforms(events: Vec<Event>, eval: &[String]) -> Result<Vec<Event>> {
    if eval.is_empty() {
        return Ok(events);
    }
    let mut chain = TransformChain::new();
    for expr in eval {
        chain.push(Box::new(EvalTransform::new(parse_transform(expr)?)));
    }
    Ok(chain.apply_all(events))
}

fn pick_output(config: &Config, flag: Option<OutputFormat>) -> OutputFormat {
    flag.or_else(|| {
        config
            .defaults
            .output
            .as_deref()
            .and_then(OutputFormat::from_config)
    })
    .unwrap_or_default()
}

fn print_result(result: &Execution, format: OutputFormat) -> Result<()> {
    let color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
    print!("{}", output::render(result, format, color)?);
    Ok(())
}
