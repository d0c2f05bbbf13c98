//! logscope - command line front end
//!
//! Runs analysis requests over log files and prints highlighted matches,
//! extracted sequence and plot items, or JSON lines.

use clap::{Parser, Subcommand};
use crossterm::style::{Color, Stylize};
use logscope_core::{
    config::AnalyzerConfig,
    error::{AnalyzerError, Result},
    scripting::{ParseOptions, ScriptingMetadata},
    AnalysisCoordinator, AnalysisRequest, CompiledPattern, FileSource, PatternEngine, Record,
    RecordResult, RecordSource, RegexEngine, RequestState, ResultSet, Rgb,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logscope")]
#[command(about = "Pattern-driven log analysis with scripted capture groups", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Configuration file (overrides LOGSCOPE_CONFIG and the default location)
    #[arg(long, global = true, env = "LOGSCOPE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a log file with a pattern
    Analyze {
        /// Log file, one record per line
        file: PathBuf,

        /// Pattern with (optionally scripted) named capture groups
        #[arg(short, long)]
        pattern: String,

        /// First line to scan
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Number of lines to scan (defaults to the rest of the file)
        #[arg(long)]
        count: Option<u64>,

        /// Worker count (defaults to the configured value)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Keep scanning as the file grows, until Ctrl-C
        #[arg(short, long)]
        follow: bool,

        /// Print one JSON object per matching record
        #[arg(long)]
        json: bool,

        /// Regex splitting each line into named fields
        #[arg(long)]
        columns: Option<String>,
    },

    /// Show how a pattern's group names are interpreted
    Check {
        /// Pattern to inspect
        pattern: String,
    },

    /// Print the palette resolved from the configuration
    Palette,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::new(format!(
        "logscope={level},logscope_core={level}",
        level = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("logscope v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(AnalyzerConfig::default_path);

    match cli.command {
        Commands::Analyze {
            file,
            pattern,
            from,
            count,
            workers,
            follow,
            json,
            columns,
        } => {
            let config = AnalyzerConfig::load(&config_path)?;
            let options = AnalyzeOptions {
                file,
                pattern,
                from,
                count,
                workers,
                follow,
                json,
                columns,
            };
            run_analyze(&config, options).await
        }
        Commands::Check { pattern } => run_check(&pattern),
        Commands::Palette => {
            let config = AnalyzerConfig::load(&config_path)?;
            for (index, color) in config.palette().colors().iter().enumerate() {
                println!("{:>3}  {}  {}", index, swatch(*color), color);
            }
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    return Err(AnalyzerError::Config(format!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    )));
                }
                AnalyzerConfig::default().save(&config_path)?;
                println!("Wrote default configuration to {}", config_path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let config = AnalyzerConfig::load(&config_path)?;
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

struct AnalyzeOptions {
    file: PathBuf,
    pattern: String,
    from: u64,
    count: Option<u64>,
    workers: Option<usize>,
    follow: bool,
    json: bool,
    columns: Option<String>,
}

async fn run_analyze(config: &AnalyzerConfig, options: AnalyzeOptions) -> Result<()> {
    let mut source = FileSource::open(&options.file, config.source.cache_capacity)?;
    if let Some(columns) = &options.columns {
        source = source.with_columns(columns)?;
    }
    let source = Arc::new(source);

    let size = source.size()?;
    let from = options.from.min(size);
    let count = options.count.unwrap_or(size - from).min(size - from);

    let (coordinator, mut notifications) = AnalysisCoordinator::new(
        Arc::new(RegexEngine::new()),
        config.analysis.max_workers,
    );

    let request = AnalysisRequest {
        source: source.clone(),
        from,
        count,
        pattern: options.pattern,
        worker_count: config.effective_workers(options.workers),
        continuous: options.follow,
        settings: config.to_request_settings(),
    };
    let id = coordinator.submit(request)?;
    info!("Analyzing {} lines of {:?}", count, options.file);

    let printer = Printer {
        source: source.clone(),
        json: options.json,
        separator: config.source.field_separator.clone(),
    };
    let mut results = ResultSet::for_request(id);

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                let terminal = notification.is_terminal();

                if options.follow {
                    let mut batch = notification.batch.clone();
                    batch.sort_by_key(|r| r.record_id);
                    for result in &batch {
                        printer.print(result)?;
                    }
                    let mut counted = notification;
                    counted.batch.clear();
                    results.apply(counted);
                    results.extend(batch);
                } else {
                    results.apply(notification);
                }

                if terminal {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                coordinator.cancel(id);
                eprintln!("Interrupted");
                break;
            }
        }
    }

    if !options.follow {
        for result in results.iter() {
            printer.print(result)?;
        }
    }

    if let Some(error) = results.error() {
        return Err(AnalyzerError::Other(format!("Analysis failed: {}", error)));
    }

    if !options.json {
        eprintln!(
            "{} matching records in {} scanned lines{}",
            results.len(),
            count,
            if results.duplicate_role_found() {
                " (some records carry more than one request/response/event role)"
            } else {
                ""
            }
        );
    }
    if results.state() == Some(RequestState::Successful) {
        debug!("Request {} finished", id);
    }
    Ok(())
}

fn swatch(color: Rgb) -> String {
    format!(
        "{}",
        "      ".on(Color::Rgb {
            r: color.r,
            g: color.g,
            b: color.b
        })
    )
}

#[derive(Serialize)]
struct JsonLine<'a> {
    text: &'a str,
    #[serde(flatten)]
    result: &'a RecordResult,
}

struct Printer {
    source: Arc<FileSource>,
    json: bool,
    separator: String,
}

impl Printer {
    fn print(&self, result: &RecordResult) -> Result<()> {
        let record = self.source.get(result.record_id)?;
        let mut stdout = std::io::stdout().lock();

        if self.json {
            let line = JsonLine {
                text: &record.text,
                result,
            };
            writeln!(stdout, "{}", serde_json::to_string(&line)?)?;
            return Ok(());
        }

        writeln!(stdout, "{:>8}: {}", record.id, highlighted(&record, result))?;

        if let Some(item) = result.sequence.as_ref().and_then(|s| s.item.as_ref()) {
            let parts: Vec<String> = item
                .values
                .iter()
                .map(|(role, values)| {
                    let rendered: Vec<String> = values
                        .iter()
                        .map(|v| v.render(&record.text, &record.fields, &self.separator))
                        .collect();
                    format!("{}={}", role, rendered.join("|"))
                })
                .collect();
            writeln!(stdout, "          sequence: {}", parts.join(" "))?;
        }

        if let Some(plot) = &result.plot {
            let parts: Vec<String> = plot
                .entries
                .iter()
                .map(|entry| match entry.numeric {
                    Some(value) => format!("{}={}", entry.role, value),
                    None => format!(
                        "{}={}",
                        entry.role,
                        entry
                            .value
                            .render(&record.text, &record.fields, &self.separator)
                    ),
                })
                .collect();
            writeln!(stdout, "          plot: {}", parts.join(" "))?;
        }
        Ok(())
    }
}

/// Record text with every highlighted segment painted as a background color
fn highlighted(record: &Record, result: &RecordResult) -> String {
    let text = record.text.as_str();
    let mut out = String::with_capacity(text.len() * 2);
    let mut cursor = 0;

    for (index, segments) in &result.highlighting {
        let Some(field) = record.fields.get(*index) else {
            continue;
        };
        let start = field.range.from;
        if start < cursor {
            continue;
        }
        out.push_str(text.get(cursor..start).unwrap_or_default());

        for segment in segments {
            let range = (start + segment.from)..(start + segment.to + 1);
            let part = text.get(range).unwrap_or_default();
            match segment.color {
                Some(color) => out.push_str(&format!(
                    "{}",
                    part.with(Color::Black).on(Color::Rgb {
                        r: color.r,
                        g: color.g,
                        b: color.b
                    })
                )),
                None => out.push_str(part),
            }
        }
        cursor = field.range.to + 1;
    }

    out.push_str(text.get(cursor..).unwrap_or_default());
    out
}

fn run_check(pattern: &str) -> Result<()> {
    let compiled = RegexEngine::new().compile(pattern)?;
    let names = compiled.group_names();
    let metadata = ScriptingMetadata::parse(
        names.iter().map(|name| name.as_deref()),
        ParseOptions::default(),
    );

    println!("Pattern: {}", compiled.as_str());
    for (index, (name, item)) in names.iter().zip(metadata.items()).enumerate().skip(1) {
        let mut facts = Vec::new();
        if let Some(color) = item.color {
            facts.push(format!("color {} {}", swatch(color), color));
        }
        if let Some(var) = &item.var_name {
            facts.push(format!("var {}", var));
        }
        for (role, literal) in &item.sequence_roles {
            match literal {
                Some(value) => facts.push(format!("sequence {}='{}'", role, value)),
                None => facts.push(format!("sequence {}", role)),
            }
        }
        for (role, params) in &item.plot_roles {
            facts.push(format!("plot {}[{}]", role, params.params.join(", ")));
        }
        if let Some(ordering) = metadata.ordering_index(index) {
            facts.push(format!("order {}", ordering));
        }
        if facts.is_empty() {
            facts.push("palette color".to_string());
        }
        println!(
            "  group {:>2} {:<24} {}",
            index,
            name.as_deref().unwrap_or("-"),
            facts.join(", ")
        );
    }

    if metadata.has_any_sequence_role() {
        println!(
            "Sequence diagram: {}",
            metadata.sequence_consistency().describe()
        );
    } else {
        println!("Sequence diagram: no roles declared");
    }

    if metadata.has_any_plot_role() {
        println!("Plot: {}", metadata.plot_consistency().describe());
        for (axis, axis_type) in metadata.plot_axis_types() {
            println!("  axis {} is {:?}", axis, axis_type);
        }
    } else {
        println!("Plot: no roles declared");
    }
    Ok(())
}
