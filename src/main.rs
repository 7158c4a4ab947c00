use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sheet_reconcile::config::{RuleRecord, RunConfig, TemplateDefinition, parse_header_row};
use sheet_reconcile::dictionary::Dictionary;
use sheet_reconcile::geocode::{Geocoder, LocalGeocoder, PostFunction};
use sheet_reconcile::model::reference::column_letters;
use sheet_reconcile::progress::{LogProgress, RunContext};
use sheet_reconcile::run::{Dictionaries, WorkbookPaths, reconcile_workbooks};
use sheet_reconcile::{ReconcileError, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ReconcileError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Dictionary(args) => execute_dictionary(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    for input in [&args.source, &args.template] {
        if !input.exists() {
            return Err(ReconcileError::MissingInput(input.clone()));
        }
    }

    let config = args.build_config()?;
    let synonyms = load_dictionary(args.synonyms.as_deref());
    let values = load_dictionary(args.values.as_deref());
    let dictionaries = Dictionaries::new(&synonyms, &values);

    let geocoder = args
        .geobase
        .as_deref()
        .map(LocalGeocoder::from_path)
        .transpose()?;

    let sink = LogProgress;
    let context = RunContext::new(&sink);
    let paths = WorkbookPaths {
        source: &args.source,
        template: &args.template,
        output: &args.output,
    };
    let report = reconcile_workbooks(
        &context,
        paths,
        &config,
        &dictionaries,
        geocoder.as_ref().map(|geocoder| geocoder as &dyn Geocoder),
    )?;

    for mapping in &report.mappings {
        info!(
            source = %column_letters(mapping.source),
            template = %column_letters(mapping.template),
            stage = %mapping.stage,
            "mapped column"
        );
    }
    info!(
        run_id = %report.run_id,
        rows = report.copy.rows,
        replacements = report.replacements,
        geocoded = report.geocode.filled,
        output = %args.output.display(),
        "output written"
    );
    Ok(())
}

fn execute_dictionary(args: DictionaryArgs) -> Result<()> {
    let mut dictionary = Dictionary::load(&args.file);
    match args.action {
        DictionaryAction::List => {
            for (canonical, variants) in dictionary.iter() {
                println!("{canonical}: {}", variants.join(", "));
            }
            Ok(())
        }
        DictionaryAction::Add {
            canonical,
            variants,
        } => {
            dictionary.upsert(&canonical, &variants);
            dictionary.save(&args.file)
        }
        DictionaryAction::Remove { canonical } => {
            if !dictionary.remove(&canonical) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "no dictionary entry named '{canonical}'"
                )));
            }
            dictionary.save(&args.file)
        }
    }
}

fn load_dictionary(path: Option<&Path>) -> Dictionary {
    path.map(Dictionary::load).unwrap_or_default()
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Copy spreadsheet data into a template's column layout."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile a source workbook into a template workbook.
    Run(RunArgs),
    /// Inspect or edit a synonym or value dictionary file.
    Dictionary(DictionaryArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Source workbook.
    #[arg(long)]
    source: PathBuf,

    /// Template workbook.
    #[arg(long)]
    template: PathBuf,

    /// Output workbook path.
    #[arg(long)]
    output: PathBuf,

    /// JSON run configuration record.
    #[arg(long, conflicts_with = "definition")]
    config: Option<PathBuf>,

    /// Saved template definition (JSON).
    #[arg(long)]
    definition: Option<PathBuf>,

    /// Source header row, as a number or a cell such as `A3`.
    #[arg(long)]
    source_header: Option<String>,

    /// Template header row, as a number or a cell such as `A1`.
    #[arg(long)]
    template_header: Option<String>,

    /// Private rule `SOURCE=TEMPLATE`, e.g. `C=F` or `C4=F`. Repeatable.
    #[arg(long = "rule", value_parser = parse_rule)]
    rules: Vec<RuleRecord>,

    /// Synonym dictionary (JSON).
    #[arg(long)]
    synonyms: Option<PathBuf>,

    /// Value substitution dictionary (JSON).
    #[arg(long)]
    values: Option<PathBuf>,

    /// Geocoding post-processing.
    #[arg(long, value_enum)]
    post_function: Option<PostFunctionArg>,

    /// Local geobase CSV with `address,latitude,longitude` columns.
    #[arg(long)]
    geobase: Option<PathBuf>,
}

impl RunArgs {
    fn build_config(&self) -> Result<RunConfig> {
        let source_row = self
            .source_header
            .as_deref()
            .map(parse_header_row)
            .transpose()?;
        let template_row = self
            .template_header
            .as_deref()
            .map(parse_header_row)
            .transpose()?;

        let mut config = if let Some(path) = &self.config {
            RunConfig::load(path)?
        } else if let Some(path) = &self.definition {
            TemplateDefinition::load(path)?.to_run_config(source_row, template_row)?
        } else {
            RunConfig::new(source_row.unwrap_or(1), template_row.unwrap_or(1))
        };

        if let Some(row) = source_row {
            config.s_start_row = row;
        }
        if let Some(row) = template_row {
            config.t_start_row = row;
        }
        // Command-line rules take precedence over stored private rules.
        let stored = std::mem::take(&mut config.private_rules);
        config.private_rules = self.rules.iter().cloned().chain(stored).collect();
        if let Some(mode) = self.post_function {
            config.post_function = mode.into();
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_rule(raw: &str) -> std::result::Result<RuleRecord, String> {
    let (source, template) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=TEMPLATE, got '{raw}'"))?;
    let source = source.trim().to_uppercase();
    let template = template.trim().to_uppercase();
    if source.chars().any(|ch| ch.is_ascii_digit()) {
        Ok(RuleRecord::cell(&source, &template))
    } else {
        Ok(RuleRecord::columns(&source, &template))
    }
}

#[derive(clap::Args)]
struct DictionaryArgs {
    /// Dictionary JSON file.
    #[arg(long)]
    file: PathBuf,

    #[command(subcommand)]
    action: DictionaryAction,
}

#[derive(Subcommand)]
enum DictionaryAction {
    /// Print every entry.
    List,
    /// Add an entry, replacing the variants of an existing one.
    Add {
        canonical: String,
        #[arg(required = true)]
        variants: Vec<String>,
    },
    /// Delete an entry.
    Remove { canonical: String },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PostFunctionArg {
    None,
    CoordsToAddress,
    AddressToCoords,
}

impl From<PostFunctionArg> for PostFunction {
    fn from(kind: PostFunctionArg) -> Self {
        match kind {
            PostFunctionArg::None => PostFunction::None,
            PostFunctionArg::CoordsToAddress => PostFunction::CoordsToAddress,
            PostFunctionArg::AddressToCoords => PostFunction::AddressToCoords,
        }
    }
}
