use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reelsearch_core::minhash::{candidate_pairs, duplicate_groups};
use reelsearch_core::persist::{load_text, save_text, IndexPaths};
use reelsearch_core::tokenizer::preprocess;
use reelsearch_core::{
    Corpus, Engine, IndexConfig, InvertedIndex, LshParams, Method, MinHashLsh, SnippetExtractor, SpellCorrector,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, deduplicate and query the movie search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct LshArgs {
    /// Number of MinHash functions
    #[arg(long, default_value_t = 100)]
    num_hashes: usize,
    /// Number of LSH bands
    #[arg(long, default_value_t = 10)]
    bands: usize,
    /// Signature rows per band
    #[arg(long, default_value_t = 10)]
    rows_per_band: usize,
    /// Character shingle size
    #[arg(long, default_value_t = 2)]
    shingle_size: usize,
    /// Seed for the hash permutations
    #[arg(long, default_value_t = LshParams::default().seed)]
    seed: u64,
}

impl From<&LshArgs> for LshParams {
    fn from(a: &LshArgs) -> Self {
        LshParams {
            num_hashes: a.num_hashes,
            bands: a.bands,
            rows_per_band: a.rows_per_band,
            shingle_size: a.shingle_size,
            seed: a.seed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from crawled JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Fields to index
        #[arg(long, value_delimiter = ',', default_values_t = IndexConfig::default().fields)]
        fields: Vec<String>,
        /// Re-adding a document id replaces its old postings
        #[arg(long, default_value_t = false)]
        replace_on_overwrite: bool,
        /// Drop near-duplicate records of this field before indexing
        #[arg(long)]
        dedup_field: Option<String>,
        #[command(flatten)]
        lsh: LshArgs,
    },
    /// Report near-duplicate groups found by MinHash LSH
    Dedup {
        #[arg(long)]
        input: String,
        #[arg(long, default_value = "summaries")]
        field: String,
        /// Also measure detection quality against random document pairs
        #[arg(long, default_value_t = false)]
        verify: bool,
        #[command(flatten)]
        lsh: LshArgs,
    },
    /// Query a stored index
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "summaries")]
        field: String,
        /// `bm25` or a vector space code such as `lnc.ltc`
        #[arg(long, default_value = "bm25")]
        method: String,
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        #[arg(long, value_delimiter = ',', default_values_t = IndexConfig::default().fields)]
        fields: Vec<String>,
    },
    /// Suggest a corrected query from the corpus vocabulary
    Spell {
        #[arg(long)]
        input: String,
        #[arg(long)]
        query: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, fields, replace_on_overwrite, dedup_field, lsh } => {
            let config = IndexConfig { fields, replace_on_overwrite };
            build_index(&input, &output, config, dedup_field.as_deref(), (&lsh).into())
        }
        Commands::Dedup { input, field, verify, lsh } => dedup(&input, &field, verify, (&lsh).into()),
        Commands::Search { index, query, field, method, k, fields } => {
            search(&index, &query, &field, &method, k, IndexConfig::with_fields(fields))
        }
        Commands::Spell { input, query } => spell(&input, &query),
    }
}

fn load_corpus(input: &str) -> Result<Corpus> {
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {input} does not exist");
    }

    let mut corpus = Corpus::default();
    for file in files {
        corpus.extend(Corpus::from_path(&file)?);
    }
    Ok(corpus)
}

fn build_index(input: &str, output: &str, config: IndexConfig, dedup_field: Option<&str>, lsh: LshParams) -> Result<()> {
    config.validate()?;
    let mut corpus = load_corpus(input)?;
    if let Some(field) = dedup_field {
        let groups = corpus.remove_near_duplicates(field, lsh)?;
        tracing::info!(groups = groups.len(), remaining = corpus.len(), "deduplicated corpus");
    }

    let fields = config.fields.clone();
    let docs = corpus.to_documents(&fields, preprocess);
    let engine = Engine::new(InvertedIndex::build(config, docs)?)?;
    engine.store(output)?;

    // Raw field texts are kept beside the index for snippet extraction
    let paths = IndexPaths::new(output);
    for movie in corpus.movies() {
        for field in &fields {
            save_text(&paths, field, &movie.id, &movie.text(field))?;
        }
    }

    tracing::info!(output, num_docs = engine.index().document_count(), "index build complete");
    Ok(())
}

fn dedup(input: &str, field: &str, verify: bool, params: LshParams) -> Result<()> {
    let corpus = load_corpus(input)?;
    let lsh = MinHashLsh::new(corpus.raw_texts(field), params)?;
    let buckets = lsh.perform_lsh()?;
    let pairs = candidate_pairs(&buckets);
    println!("buckets: {}  candidate pairs: {}", buckets.len(), pairs.len());
    for group in duplicate_groups(&buckets) {
        let ids: Vec<&str> = group.iter().map(|&i| corpus.movies()[i].id.as_str()).collect();
        println!("{}", ids.join(" "));
    }
    if verify {
        let mut rng = StdRng::seed_from_u64(params.seed);
        match lsh.detection_quality(&buckets, &mut rng) {
            Some(q) => println!("near duplicate detection score: {q:.3}"),
            None => println!("near duplicate detection score: n/a (no candidate pairs)"),
        }
    }
    Ok(())
}

fn search(index: &str, query: &str, field: &str, method: &str, k: usize, config: IndexConfig) -> Result<()> {
    let method: Method = method.parse()?;
    let engine = Engine::open(index, config)?;
    let terms = preprocess(query);
    let paths = IndexPaths::new(index);
    let extractor = SnippetExtractor::default();
    for (rank, (doc_id, score)) in engine.search(&terms, field, &method, k)?.into_iter().enumerate() {
        let title = engine.index().document(&doc_id).and_then(|d| d.title.clone()).unwrap_or_default();
        println!("{:>3}. {doc_id} {score:.4} {title}", rank + 1);
        if let Some(text) = load_text(&paths, field, &doc_id) {
            let snippet = extractor.find_snippet(&text, query);
            if !snippet.text.is_empty() {
                println!("     {}", snippet.text);
            }
        }
    }
    Ok(())
}

fn spell(input: &str, query: &str) -> Result<()> {
    let corpus = load_corpus(input)?;
    let texts: Vec<String> = corpus
        .raw_texts("summaries")
        .iter()
        .map(|t| t.to_lowercase().chars().map(|c| if c.is_alphanumeric() { c } else { ' ' }).collect())
        .collect();
    let corrector = SpellCorrector::new(&texts);
    println!("{}", corrector.spell_check(&query.to_lowercase()));
    Ok(())
}
