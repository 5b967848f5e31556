//! Wayang CLI - Command-line interface
//!
//! Usage:
//!   wayang extract
//!   wayang evaluate [--json]
//!   wayang relations
//!   wayang import
//!   wayang ask <question>

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wayang_core::{
    read_records, write_records, AppConfig, EmbeddingClient, EntityRecord, LlmClient,
    LoggingConfig, RelationRecord,
};
use wayang_extractor::{
    valid_entity_names, CorpusReader, Evaluator, GoldStandard, HttpSpanLabeler, IntervalGate,
    NerPipeline, RelationExtractor,
};
use wayang_graph::{GraphImporter, GraphStore, Neo4jStore};
use wayang_rag::{create_embedding_client, create_llm_client, HybridAnswerer, SemanticIndex};

#[derive(Parser)]
#[command(name = "wayang")]
#[command(about = "Wayang folklore knowledge graph builder")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities from the corpus
    Extract {
        /// Corpus CSV
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Entity JSON output
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score extracted entities against the gold reference
    Evaluate {
        /// Entity JSON input
        #[arg(long)]
        entities: Option<PathBuf>,
        /// Gold reference JSON; the built-in list when omitted
        #[arg(long)]
        gold: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract relationships between known entities
    Relations {
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(long)]
        entities: Option<PathBuf>,
        /// Relation JSON output
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load entities and relationships into Neo4j
    Import {
        #[arg(long)]
        entities: Option<PathBuf>,
        #[arg(long)]
        relations: Option<PathBuf>,
    },
    /// Answer a question from the graph and the corpus
    Ask {
        /// Question to ask
        question: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Extract { corpus, output } => {
            let corpus = corpus.unwrap_or_else(|| config.paths.corpus_path.clone());
            let output = output.unwrap_or_else(|| config.paths.entities_path.clone());
            extract(&config, corpus, output).await
        }
        Commands::Evaluate {
            entities,
            gold,
            json,
        } => {
            let entities = entities.unwrap_or_else(|| config.paths.entities_path.clone());
            let gold = gold.or_else(|| config.paths.gold_path.clone());
            evaluate(entities, gold, json)
        }
        Commands::Relations {
            corpus,
            entities,
            output,
        } => {
            let corpus = corpus.unwrap_or_else(|| config.paths.corpus_path.clone());
            let entities = entities.unwrap_or_else(|| config.paths.entities_path.clone());
            let output = output.unwrap_or_else(|| config.paths.relations_path.clone());
            relations(&config, corpus, entities, output).await
        }
        Commands::Import {
            entities,
            relations,
        } => {
            let entities = entities.unwrap_or_else(|| config.paths.entities_path.clone());
            let relations = relations.unwrap_or_else(|| config.paths.relations_path.clone());
            import(&config, entities, relations).await
        }
        Commands::Ask { question } => ask(&config, &question).await,
    }
}

async fn extract(config: &AppConfig, corpus: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let rows = CorpusReader::new(config.corpus.clone()).read_path(&corpus)?;
    let labeler = HttpSpanLabeler::from_config(&config.ner)?;

    let run = NerPipeline::new(labeler, &config.ner).run(rows).await?;
    let records = run.records();
    write_records(&output, &records)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let stats = &run.stats;
    println!("Rows processed : {}/{}", stats.rows_processed, stats.rows_seen);
    println!("Rows skipped   : {} short, {} failed", stats.rows_too_short, stats.rows_failed);
    println!("Spans accepted : {}/{}", stats.spans_accepted, stats.spans_seen);
    for (reason, count) in &stats.rejections {
        println!("  rejected {reason}: {count}");
    }
    println!("Saved {} entities to {}", records.len(), output.display());
    Ok(())
}

fn evaluate(entities: PathBuf, gold: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let predicted: Vec<EntityRecord> = read_records(&entities)?;
    let gold = GoldStandard::load(gold.as_deref())?;

    let report = Evaluator::new(gold).evaluate(&predicted);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

async fn relations(
    config: &AppConfig,
    corpus: PathBuf,
    entities: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    let records: Vec<EntityRecord> = read_records(&entities)?;
    let rows = CorpusReader::new(config.corpus.clone()).read_path(&corpus)?;

    let names = valid_entity_names(&records, config.relations.min_entity_confidence);
    tracing::info!(entities = names.len(), "loaded valid entities");

    let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
    let gate = Arc::new(IntervalGate::from_millis(config.relations.request_interval_ms));
    let extractor = RelationExtractor::new(llm, gate, names, &config.relations);

    let run = extractor.run(rows).await;
    write_records(&output, &run.relations)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rows: {} extracted, {} short, {} failed",
        run.stats.rows_extracted, run.stats.rows_too_short, run.stats.rows_failed
    );
    println!("Saved {} relationships to {}", run.relations.len(), output.display());
    Ok(())
}

async fn import(config: &AppConfig, entities: PathBuf, relations: PathBuf) -> anyhow::Result<()> {
    let entities: Vec<EntityRecord> = read_records(&entities)?;
    let relations: Vec<RelationRecord> = read_records(&relations)?;

    let store = Neo4jStore::connect(&config.graph).await?;
    let importer = GraphImporter::new(&store, &config.graph);
    importer.wait_for_connectivity().await?;

    let summary = importer.import(&entities, &relations).await?;
    println!(
        "Imported {} nodes and {} relationships ({} skipped)",
        summary.entities_merged, summary.relations_merged, summary.relations_skipped
    );
    Ok(())
}

async fn ask(config: &AppConfig, question: &str) -> anyhow::Result<()> {
    let rows = CorpusReader::new(config.corpus.clone()).read_path(&config.paths.corpus_path)?;

    let embedder: Arc<dyn EmbeddingClient> = Arc::from(create_embedding_client(&config.llm)?);
    let index = SemanticIndex::build_or_empty(rows, embedder).await;

    let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
    let graph: Arc<dyn GraphStore> = Arc::new(Neo4jStore::connect(&config.graph).await?);

    let answerer = HybridAnswerer::new(llm, graph, index, &config.rag);
    let result = answerer.answer(question).await?;

    tracing::debug!(cypher = %result.cypher, facts = result.graph_rows.len(), "answer evidence");
    println!("{}", result.answer);
    Ok(())
}
