//! Command-line interface for sit-curator.
//!
//! Provides commands for highlighting detections, composing and saving SIT
//! rules from scan candidates, suggesting drafts, and exporting rule packs.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapters::{
    AnalyzeOptions, AnalyzerClient, DetectionService, EntityTypesClient, MemoryStore,
    SitServiceClient, SitStore,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    compose_version, group_keywords, suggest_drafts, CandidatePool, EntityTypeCache,
    FileCandidates, KeywordGrouping, RulepackArtifact, RulepackExporter, SitBuilder, SitSelection,
};
use crate::domain::{NewRulepack, Rulepack};
use crate::highlight::{discard_malformed, entity_color, highlight, DetectionSpan, HighlightChunk};

/// sit-curator - Detection highlighting and SIT rule pack curation
#[derive(Parser, Debug)]
#[command(name = "sit-curator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render text with detection spans highlighted
    Highlight {
        /// Text file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON file with detection spans
        #[arg(short, long)]
        spans: PathBuf,

        /// Drop malformed spans instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Detect entities with the analyzer and highlight them
    Analyze {
        /// Text file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Detection language (config default if not specified)
        #[arg(short, long)]
        language: Option<String>,

        /// Restrict to these entity types (comma-separated)
        #[arg(short, long)]
        entities: Option<String>,

        /// Minimum detection score
        #[arg(long)]
        threshold: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Merge per-file scan candidates
    Candidates {
        /// JSON files with candidates for one scanned file each
        files: Vec<PathBuf>,
    },

    /// Show how keywords would be bundled into keyword lists
    GroupKeywords {
        /// Keywords, in order
        keywords: Vec<String>,

        /// One list per keyword
        #[arg(long)]
        split: bool,
    },

    /// Compose a SIT draft from a selection file without saving it
    Compose {
        /// JSON file with the curated selection
        selection: PathBuf,

        /// Ids of already persisted keyword lists to reference
        #[arg(short, long)]
        keyword_list: Vec<String>,
    },

    /// Save a selection as a new SIT
    Save {
        /// JSON file with the curated selection
        selection: PathBuf,

        /// Use an in-memory store instead of the SIT service
        #[arg(long)]
        offline: bool,
    },

    /// Suggest SIT drafts from detections
    Suggest {
        /// Text file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON file with detection spans (runs the analyzer if not provided)
        #[arg(short, long)]
        spans: Option<PathBuf>,

        /// Provenance recorded on the drafts, e.g. "scan:42"
        #[arg(long)]
        source: Option<String>,
    },

    /// Create a rule pack from SIT versions and export it
    Export {
        /// Rule pack name
        #[arg(short, long, required_unless_present = "rulepack")]
        name: Option<String>,

        /// Existing rule pack id; its selection is replaced instead of
        /// creating a new pack
        #[arg(long, conflicts_with = "name")]
        rulepack: Option<String>,

        /// Rule pack version
        #[arg(short = 'V', long, default_value = "1.0.0")]
        version: String,

        /// SIT version ids to include (comma-separated)
        #[arg(long)]
        versions: String,

        #[arg(long)]
        publisher: Option<String>,

        #[arg(long)]
        locale: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Output file (defaults to the rule pack's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List entity types
    Entities {
        /// Ask the analyzer which types it supports for a language instead
        #[arg(long)]
        supported: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// How highlighted text is printed
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Inline markers: [text](ENTITY)
    Text,
    /// Chunk list as JSON
    Json,
    /// HTML with coloured <mark> elements
    Html,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Highlight {
                input,
                spans,
                lenient,
                format,
            } => highlight_file(input, &spans, lenient, format).await,
            Commands::Analyze {
                input,
                language,
                entities,
                threshold,
                format,
            } => analyze_text(input, language, entities, threshold, format).await,
            Commands::Candidates { files } => merge_candidates(&files).await,
            Commands::GroupKeywords { keywords, split } => {
                show_keyword_groups(&keywords, split).await
            }
            Commands::Compose {
                selection,
                keyword_list,
            } => compose_selection(&selection, &keyword_list).await,
            Commands::Save { selection, offline } => save_selection(&selection, offline).await,
            Commands::Suggest {
                input,
                spans,
                source,
            } => suggest(input, spans, source).await,
            Commands::Export {
                name,
                rulepack,
                version,
                versions,
                publisher,
                locale,
                description,
                output,
            } => {
                if let Some(id) = rulepack {
                    return export_existing(&id, &versions, output).await;
                }
                let name = name.context("A rule pack name is required")?;
                let rulepack = new_rulepack(name, version, publisher, locale, description);
                export_rulepack(&rulepack, &versions, output).await
            }
            Commands::Entities { supported } => list_entities(supported).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Read input text from a file, or from stdin when it is piped
fn read_input(input_file: Option<PathBuf>) -> Result<String> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    if input.is_empty() {
        anyhow::bail!("Input is empty");
    }

    Ok(input)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render chunks in the requested format
fn render_chunks(chunks: &[HighlightChunk<'_>], format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(chunks).context("Failed to serialize chunks")?
        }
        OutputFormat::Text => chunks
            .iter()
            .map(|chunk| match &chunk.span {
                Some(span) => format!("[{}]({})", chunk.text, span.entity_type),
                None => chunk.text.to_string(),
            })
            .collect(),
        OutputFormat::Html => chunks
            .iter()
            .map(|chunk| match &chunk.span {
                Some(span) => format!(
                    "<mark style=\"background-color: {}\" title=\"{} ({:.2})\">{}</mark>",
                    entity_color(&span.entity_type),
                    escape_html(&span.entity_type),
                    span.score,
                    escape_html(chunk.text)
                ),
                None => escape_html(chunk.text),
            })
            .collect(),
    };
    Ok(rendered)
}

fn print_highlighted(
    text: &str,
    spans: Vec<DetectionSpan>,
    lenient: bool,
    format: OutputFormat,
) -> Result<()> {
    let spans = if lenient {
        discard_malformed(spans)
    } else {
        spans
    };

    let chunks = highlight(text, &spans).context("Failed to reconcile detection spans")?;
    println!("{}", render_chunks(&chunks, format)?);
    Ok(())
}

fn analyzer(cfg: &ResolvedConfig) -> Result<AnalyzerClient> {
    AnalyzerClient::new(&cfg.services.analyzer_url, cfg.services.timeout)
        .context("Failed to create analyzer client")
}

fn sit_service(cfg: &ResolvedConfig) -> Result<SitServiceClient> {
    SitServiceClient::new(&cfg.services.sit_url, cfg.services.timeout)
        .context("Failed to create SIT service client")
}

/// Highlight a text file with spans from a JSON file
async fn highlight_file(
    input: Option<PathBuf>,
    spans_file: &Path,
    lenient: bool,
    format: OutputFormat,
) -> Result<()> {
    let text = read_input(input)?;
    let spans: Vec<DetectionSpan> = read_json(spans_file)?;
    print_highlighted(&text, spans, lenient, format)
}

/// Run detection and highlight the results
async fn analyze_text(
    input: Option<PathBuf>,
    language: Option<String>,
    entities: Option<String>,
    threshold: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let cfg = config::config()?;
    let text = read_input(input)?;

    let options = AnalyzeOptions {
        language: language.unwrap_or_else(|| cfg.builder.language.clone()),
        entities: entities.as_deref().map(split_list).unwrap_or_default(),
        score_threshold: threshold,
    };

    let spans = analyzer(cfg)?
        .analyze(&text, &options)
        .await
        .context("Analysis failed")?;

    eprintln!("[{} detections]", spans.len());
    // Detector output is not guaranteed to be well formed
    print_highlighted(&text, spans, true, format)
}

/// Merge candidate files into one pool
async fn merge_candidates(files: &[PathBuf]) -> Result<()> {
    let mut per_file: Vec<FileCandidates> = Vec::with_capacity(files.len());
    for path in files {
        per_file.push(read_json(path)?);
    }

    let pool = CandidatePool::collect(&per_file);
    print_json(&pool)
}

async fn show_keyword_groups(keywords: &[String], split: bool) -> Result<()> {
    let mode = if split {
        KeywordGrouping::Split
    } else {
        KeywordGrouping::Single
    };
    print_json(&group_keywords(keywords, mode))
}

/// Read a selection, filling unset builder settings from config
fn load_selection(path: &Path) -> Result<SitSelection> {
    let cfg = config::config()?;
    let value: serde_json::Value = read_json(path)?;

    let mut selection: SitSelection = serde_json::from_value(value.clone())
        .with_context(|| format!("Invalid selection: {}", path.display()))?;

    if value.get("group_name").is_none() {
        selection.group_name = cfg.builder.group_name.clone();
    }
    if value.get("keyword_grouping").is_none() {
        selection.keyword_grouping = cfg.builder.keyword_grouping;
    }

    Ok(selection)
}

async fn compose_selection(path: &Path, keyword_list_ids: &[String]) -> Result<()> {
    let selection = load_selection(path)?;
    let draft = compose_version(&selection, keyword_list_ids)?;
    print_json(&draft)
}

async fn save_selection(path: &Path, offline: bool) -> Result<()> {
    let selection = load_selection(path)?;

    let store: Box<dyn SitStore> = if offline {
        Box::new(MemoryStore::new())
    } else {
        Box::new(sit_service(config::config()?)?)
    };

    let sit = SitBuilder::new(store.as_ref())
        .save(&selection)
        .await
        .with_context(|| format!("Failed to save SIT: {}", selection.name))?;

    if let Some(version) = sit.latest_version() {
        eprintln!(
            "[Saved {} ({}), version {} ({})]",
            sit.name, sit.id, version.version_number, version.id
        );
    }
    print_json(&sit)
}

async fn suggest(
    input: Option<PathBuf>,
    spans_file: Option<PathBuf>,
    source: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;
    let text = read_input(input)?;

    let spans: Vec<DetectionSpan> = match spans_file {
        Some(path) => read_json(&path)?,
        None => {
            let options = AnalyzeOptions {
                language: cfg.builder.language.clone(),
                ..AnalyzeOptions::default()
            };
            analyzer(cfg)?
                .analyze(&text, &options)
                .await
                .context("Analysis failed")?
        }
    };

    let spans = discard_malformed(spans);
    let drafts = suggest_drafts(
        &text,
        &spans,
        source.as_deref(),
        cfg.builder.context_window,
    );
    print_json(&drafts)
}

fn new_rulepack(
    name: String,
    version: String,
    publisher: Option<String>,
    locale: Option<String>,
    description: Option<String>,
) -> NewRulepack {
    let mut rulepack = NewRulepack::new(name, version);
    if let Some(publisher) = publisher {
        rulepack = rulepack.with_publisher(publisher);
    }
    if let Some(locale) = locale {
        rulepack = rulepack.with_locale(locale);
    }
    if let Some(description) = description {
        rulepack = rulepack.with_description(description);
    }
    rulepack
}

async fn export_rulepack(
    rulepack: &NewRulepack,
    versions: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let cfg = config::config()?;
    let store = sit_service(cfg)?;
    let exporter = RulepackExporter::new(&store);

    let (created, artifact) = exporter
        .publish(rulepack, split_list(versions))
        .await
        .with_context(|| format!("Failed to export rule pack: {}", rulepack.name))?;

    write_artifact(&created, &artifact, output)
}

async fn export_existing(rulepack_id: &str, versions: &str, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let store = sit_service(cfg)?;
    let exporter = RulepackExporter::new(&store);

    let (rulepack, artifact) = exporter
        .export_existing(rulepack_id, split_list(versions))
        .await
        .with_context(|| format!("Failed to export rule pack: {}", rulepack_id))?;

    write_artifact(&rulepack, &artifact, output)
}

fn write_artifact(
    rulepack: &Rulepack,
    artifact: &RulepackArtifact,
    output: Option<PathBuf>,
) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
    std::fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write rule pack: {}", path.display()))?;

    println!(
        "Exported rule pack {} ({} versions) to {}",
        rulepack.id,
        rulepack.selections.len(),
        path.display()
    );
    Ok(())
}

async fn list_entities(supported: Option<String>) -> Result<()> {
    let cfg = config::config()?;

    let types = match supported {
        Some(language) => analyzer(cfg)?
            .supported_entities(&language)
            .await
            .context("Failed to fetch supported entities")?,
        None => {
            let source = EntityTypesClient::new(&cfg.services.entities_url, cfg.services.timeout)
                .context("Failed to create entity types client")?;
            EntityTypeCache::new(source)
                .get(false)
                .await
                .context("Failed to fetch entity types")?
        }
    };

    for entity_type in types {
        println!("{}", entity_type);
    }
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("sit-curator configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Services:");
    println!("  Analyzer:     {}", cfg.services.analyzer_url);
    println!("  SIT service:  {}", cfg.services.sit_url);
    println!("  Entities:     {}", cfg.services.entities_url);
    println!("  Timeout:      {}s", cfg.services.timeout.as_secs());
    println!();
    println!("Builder:");
    println!("  Group name:       {}", cfg.builder.group_name);
    println!("  Keyword grouping: {:?}", cfg.builder.keyword_grouping);
    println!("  Language:         {}", cfg.builder.language);
    println!("  Context window:   {}", cfg.builder.context_window);

    Ok(())
}
