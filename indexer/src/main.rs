use anyhow::{anyhow, Context, Result};
use blogsearch_core::document::load_posts_from_path;
use blogsearch_core::persist::{export_json, load_index, load_with_meta, save_index, IndexPaths};
use blogsearch_core::{search_page, FieldWeights, IdfMode, IndexBuilder, IndexConfig, SearchOptions, TokenizerConfig};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "blogsearch-indexer")]
#[command(about = "Build and query a full-text index of blog posts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a store file (.js, .json, .jsonl) or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        config: BuildArgs,
        /// Also write index.json for clients that cannot read bincode
        #[arg(long, default_value_t = false)]
        export_json: bool,
    },
    /// Run a query against a built index
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Free-text query
        query: String,
        /// Maximum number of results
        #[arg(short, default_value_t = 10)]
        k: usize,
        /// Inverse document frequency: off, standard or smoothed
        #[arg(long, default_value_t = IdfMode::Smoothed)]
        idf: IdfMode,
        /// Fail when the query has no searchable terms
        #[arg(long, default_value_t = false)]
        require_terms: bool,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print index metadata
    Inspect {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
    },
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long, default_value_t = 3.0, value_parser = parse_weight)]
    title_weight: f32,
    #[arg(long, default_value_t = 1.0, value_parser = parse_weight)]
    excerpt_weight: f32,
    #[arg(long, default_value_t = 1.0, value_parser = parse_weight)]
    categories_weight: f32,
    #[arg(long, default_value_t = 1.0, value_parser = parse_weight)]
    tags_weight: f32,
    /// Discard tokens shorter than this many characters
    #[arg(long, default_value_t = 2)]
    min_token_len: usize,
    /// Apply English stemming to indexed and query terms
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Extra stop words (comma-separated)
    #[arg(long, value_delimiter = ',')]
    stopwords: Vec<String>,
}

fn parse_weight(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("weight must be finite and non-negative, got {value}"))
    }
}

impl From<BuildArgs> for IndexConfig {
    fn from(args: BuildArgs) -> Self {
        IndexConfig {
            tokenizer: TokenizerConfig {
                min_token_len: args.min_token_len,
                stem: args.stem,
                extra_stopwords: args.stopwords,
                ..TokenizerConfig::default()
            },
            weights: FieldWeights {
                title: args.title_weight,
                excerpt: args.excerpt_weight,
                categories: args.categories_weight,
                tags: args.tags_weight,
            },
        }
    }
}

#[derive(Serialize)]
struct QueryRow<'a> {
    doc_id: u32,
    score: f32,
    title: &'a str,
    url: &'a str,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, export_json } => build_index(&input, &output, config.into(), export_json),
        Commands::Query { index, query, k, idf, require_terms, json } => {
            let opts = SearchOptions { limit: k, require_terms, idf, ..SearchOptions::default() };
            run_query(&index, &query, &opts, json)
        }
        Commands::Inspect { index } => inspect(&index),
    }
}

fn build_index(input: &Path, output: &Path, config: IndexConfig, export: bool) -> Result<()> {
    let posts = load_posts_from_path(input).with_context(|| format!("reading records from {}", input.display()))?;
    tracing::info!(records = posts.len(), input = %input.display(), "loaded records");

    let out = IndexBuilder::new(config)?.build(posts);
    for warning in &out.warnings {
        eprintln!("warning: {warning}");
    }

    let paths = IndexPaths::new(output);
    let meta = save_index(&paths, &out.index).with_context(|| format!("writing index to {}", output.display()))?;
    if export {
        let path = export_json(&paths, &out.index)?;
        tracing::info!(path = %path.display(), "exported JSON index");
    }
    println!(
        "indexed {} documents ({} terms, {} skipped) -> {}",
        meta.num_docs,
        meta.num_terms,
        out.warnings.len(),
        output.display()
    );
    Ok(())
}

fn run_query(dir: &Path, query: &str, opts: &SearchOptions, json: bool) -> Result<()> {
    let index = load_index(&IndexPaths::new(dir)).with_context(|| format!("loading index from {}", dir.display()))?;
    let page = search_page(&index, query, opts)?;

    let rows: Vec<QueryRow> = page
        .hits
        .iter()
        .map(|hit| -> Result<QueryRow<'_>> {
            let doc = index
                .document(hit.doc_id)
                .ok_or_else(|| anyhow!("corrupt index in {}: no document {}", dir.display(), hit.doc_id))?;
            Ok(QueryRow { doc_id: hit.doc_id, score: hit.score, title: &doc.title, url: &doc.url })
        })
        .collect::<Result<_>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{} of {} matching documents for {:?}", rows.len(), page.total_hits, query);
    for (rank, row) in rows.iter().enumerate() {
        println!("{:>3}. [{:.4}] {}\n     {}", rank + 1, row.score, row.title, row.url);
    }
    Ok(())
}

fn inspect(dir: &Path) -> Result<()> {
    let (index, meta) =
        load_with_meta(&IndexPaths::new(dir)).with_context(|| format!("reading index from {}", dir.display()))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    println!("config: {}", serde_json::to_string(index.config())?);

    let mut common: Vec<(&str, usize)> = index.terms().map(|(t, p)| (t, p.len())).collect();
    common.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    println!("most common terms:");
    for (term, df) in common.into_iter().take(10) {
        println!("  {term:<24} {df}");
    }
    Ok(())
}
