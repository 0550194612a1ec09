use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use amendment_core::{Amendment, AmendmentSession, Email, EmailSource, Resolution};
use amendment_extract::{
    AmendmentFactory, DirectorySource, ExtractConfig, Extraction, ResolutionMatcher,
    TextNormalizer, tracing_sink,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Direction {
    Next,
    Prev,
    First,
    Last,
}

#[derive(Debug, Parser)]
#[command(name = "amendment-desk")]
#[command(about = "Extract amendments from delegate email and manage amendment sessions")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract one amendment from an email file or stdin.
    Extract(ExtractArgs),
    /// Create an empty session file.
    New(NewArgs),
    /// Extract every new message in an inbox directory into a session.
    Ingest(IngestArgs),
    /// Link session amendments to resolutions.
    Infer(InferArgs),
    /// Show the current amendment (or all of them).
    Show(ShowArgs),
    /// Move the session cursor.
    Nav(NavArgs),
    /// Toggle the friendly flag on the current amendment.
    ToggleFriendly(SessionArg),
    /// Delete the current amendment, or one by id.
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
struct ExtractOptions {
    /// Extraction config YAML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the configured AI provider first.
    #[arg(long)]
    prefer_ai: bool,
    /// Override normalizer.max_body_chars.
    #[arg(long)]
    max_body_chars: Option<usize>,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Raw message (.eml) or plain body file; stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    #[command(flatten)]
    options: ExtractOptions,
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct SessionArg {
    /// Session JSON file.
    #[arg(long)]
    session: PathBuf,
}

#[derive(Debug, Args)]
struct NewArgs {
    #[arg(long)]
    session: PathBuf,
    #[arg(long)]
    name: String,
    #[arg(long)]
    committee: String,
    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct IngestArgs {
    #[arg(long)]
    session: PathBuf,
    /// Directory of .eml and .txt messages.
    #[arg(long)]
    inbox: PathBuf,
    #[command(flatten)]
    options: ExtractOptions,
    /// Parallel extraction jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct InferArgs {
    #[arg(long)]
    session: PathBuf,
    /// JSON array of resolutions.
    #[arg(long)]
    resolutions: PathBuf,
    /// Extraction config YAML (for matching.similarity_threshold).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override matching.similarity_threshold.
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[arg(long)]
    session: PathBuf,
    /// Show every amendment.
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct NavArgs {
    #[arg(long)]
    session: PathBuf,
    #[arg(value_enum)]
    direction: Direction,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    session: PathBuf,
    /// Amendment id; the current amendment when omitted.
    #[arg(long)]
    id: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::New(args) => run_new(args),
        Command::Ingest(args) => run_ingest(args),
        Command::Infer(args) => run_infer(args),
        Command::Show(args) => run_show(args),
        Command::Nav(args) => run_nav(args),
        Command::ToggleFriendly(args) => run_toggle_friendly(args),
        Command::Delete(args) => run_delete(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ExtractConfig, String> {
    match path {
        Some(path) => ExtractConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display())),
        None => Ok(ExtractConfig::default()),
    }
}

fn build_factory(options: &ExtractOptions) -> Result<(AmendmentFactory, bool), String> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(max) = options.max_body_chars {
        config.normalizer.max_body_chars = max;
    }
    config.prefer_ai |= options.prefer_ai;
    config.validate().map_err(|err| err.to_string())?;
    let factory = AmendmentFactory::from_config(&config, tracing_sink())
        .map_err(|err| format!("Failed to set up extraction: {err}"))?;
    Ok((factory, config.prefer_ai))
}

fn load_session(path: &Path) -> Result<AmendmentSession, String> {
    AmendmentSession::load(path)
        .map_err(|err| format!("Failed to load session '{}': {err}", path.display()))
}

fn save_session(session: &AmendmentSession, path: &Path) -> Result<(), String> {
    session
        .save(path)
        .map_err(|err| format!("Failed to save session '{}': {err}", path.display()))
}

fn read_email(input: Option<&Path>, normalizer: &TextNormalizer) -> Result<Email, String> {
    let (bytes, is_raw) = match input {
        Some(path) => {
            let bytes = fs::read(path)
                .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
            let is_raw = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
            (bytes, is_raw)
        }
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|err| format!("Failed to read stdin: {err}"))?;
            (bytes, false)
        }
    };
    if is_raw {
        normalizer
            .email_from_raw(&bytes)
            .map_err(|err| format!("Failed to parse message: {err}"))
    } else {
        Ok(Email::new("", "", String::from_utf8_lossy(&bytes)))
    }
}

fn format_amendment(amendment: &Amendment, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(amendment)
            .map_err(|err| format!("Failed to serialize amendment: {err}")),
        CliOutputFormat::Yaml => serde_yaml::to_string(amendment)
            .map_err(|err| format!("Failed to serialize amendment: {err}")),
        CliOutputFormat::Text => Ok(amendment.to_string()),
    }
}

fn run_extract(args: ExtractArgs) -> Result<(), String> {
    let (factory, prefer_ai) = build_factory(&args.options)?;
    let email = read_email(args.input.as_deref(), factory.normalizer())?;
    match factory.extract(&email, prefer_ai) {
        Ok(Extraction::Amendment(amendment)) => {
            println!("{}", format_amendment(&amendment, args.format)?);
            Ok(())
        }
        Ok(Extraction::Miss(miss)) => Err(format!("No amendment found: {miss}")),
        Err(err) => Err(format!("Invalid amendment: {err}")),
    }
}

fn run_new(args: NewArgs) -> Result<(), String> {
    if args.session.exists() && !args.force {
        return Err(format!(
            "Session '{}' already exists (use --force to replace it)",
            args.session.display()
        ));
    }
    let session = AmendmentSession::new(args.name, args.committee);
    save_session(&session, &args.session)?;
    let ledger = ingested_ledger_path(&args.session);
    if ledger.exists() {
        fs::remove_file(&ledger)
            .map_err(|err| format!("Failed to remove '{}': {err}", ledger.display()))?;
    }
    println!("Created session {}", args.session.display());
    Ok(())
}

fn run_ingest(args: IngestArgs) -> Result<(), String> {
    let mut session = load_session(&args.session)?;
    let (factory, prefer_ai) = build_factory(&args.options)?;

    let ledger = ingested_ledger_path(&args.session);
    let mut source = DirectorySource::new(&args.inbox, factory.normalizer().clone(), tracing_sink())
        .with_seen(read_ingested(&ledger)?);
    let emails = source.pull();
    let outcomes = factory.extract_batch(&emails, prefer_ai, args.jobs.unwrap_or(0));

    let mut added = 0;
    let mut missed = 0;
    let mut rejected = 0;
    for outcome in outcomes {
        match outcome {
            Ok(Extraction::Amendment(amendment)) => {
                session.add_amendment(amendment);
                added += 1;
            }
            Ok(Extraction::Miss(_)) => missed += 1,
            Err(_) => rejected += 1,
        }
    }
    save_session(&session, &args.session)?;
    write_ingested(&ledger, &source)?;

    println!("Messages: {}", emails.len());
    println!("Added: {added}");
    println!("No amendment: {missed}");
    println!("Rejected: {rejected}");
    Ok(())
}

/// File names already ingested into a session live next to it, one per line.
fn ingested_ledger_path(session: &Path) -> PathBuf {
    let mut name = session.as_os_str().to_owned();
    name.push(".ingested");
    PathBuf::from(name)
}

fn read_ingested(ledger: &Path) -> Result<Vec<String>, String> {
    if !ledger.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(ledger)
        .map_err(|err| format!("Failed to read '{}': {err}", ledger.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_ingested(ledger: &Path, source: &DirectorySource) -> Result<(), String> {
    let mut contents = source.seen_names().collect::<Vec<_>>().join("\n");
    contents.push('\n');
    fs::write(ledger, contents)
        .map_err(|err| format!("Failed to write '{}': {err}", ledger.display()))
}

fn run_infer(args: InferArgs) -> Result<(), String> {
    let mut session = load_session(&args.session)?;
    let raw = fs::read_to_string(&args.resolutions)
        .map_err(|err| format!("Failed to read '{}': {err}", args.resolutions.display()))?;
    let resolutions: Vec<Resolution> = serde_json::from_str(&raw)
        .map_err(|err| format!("Failed to parse resolutions: {err}"))?;

    let config = load_config(args.config.as_deref())?;
    let threshold = args
        .threshold
        .unwrap_or(config.matching.similarity_threshold);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(format!("Threshold must be between 0 and 100, got {threshold}"));
    }
    let matcher = ResolutionMatcher::new(threshold, tracing_sink());
    let linked = matcher.backfill(session.amendments_mut(), &resolutions);
    save_session(&session, &args.session)?;

    let unlinked = session
        .amendments()
        .iter()
        .filter(|a| a.address_resolution().is_none())
        .count();
    println!("Linked: {linked}");
    println!("Unlinked: {unlinked}");
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<(), String> {
    let session = load_session(&args.session)?;
    if session.is_empty() {
        println!("(no amendments)");
    } else if args.all {
        for (index, amendment) in session.amendments().iter().enumerate() {
            let marker = if index == session.current_index() { ">" } else { " " };
            println!("{marker} [{}]", index + 1);
            println!("{amendment}");
            println!();
        }
    } else {
        let current = session.current().map_err(|err| err.to_string())?;
        println!("{current}");
    }
    println!("{}", session.render_footer());
    Ok(())
}

fn run_nav(args: NavArgs) -> Result<(), String> {
    let mut session = load_session(&args.session)?;
    match args.direction {
        Direction::Next => session.next(),
        Direction::Prev => session.previous(),
        Direction::First => session.first(),
        Direction::Last => session.last(),
    }
    save_session(&session, &args.session)?;
    println!("{}", session.render_footer());
    Ok(())
}

fn run_toggle_friendly(args: SessionArg) -> Result<(), String> {
    let mut session = load_session(&args.session)?;
    let friendly = session.toggle_friendly().map_err(|err| err.to_string())?;
    save_session(&session, &args.session)?;
    println!("Friendly: {friendly}");
    Ok(())
}

fn run_delete(args: DeleteArgs) -> Result<(), String> {
    let mut session = load_session(&args.session)?;
    let removed = match &args.id {
        Some(id) => session
            .delete_by_id(id)
            .ok_or_else(|| format!("No amendment with id '{id}'"))?,
        None => session.delete_current().map_err(|err| err.to_string())?,
    };
    save_session(&session, &args.session)?;
    println!("Deleted {}", removed.id());
    println!("{}", session.render_footer());
    Ok(())
}
