use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ircore::persist::{load_snapshot, save_snapshot, SnapshotPaths};
use ircore::pipeline::Pipeline;
use ircore::query::{Query, QueryParser};
use ircore::rank::{RunConfig, DEFAULT_DEPTH, DEFAULT_RUN_TAG};
use ircore::stopwords::StopwordFilter;
use ircore::{MemoryStats, ScoringParams, StatsProvider};
use ranker::{ElasticConfig, ElasticStats};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Rank a document collection against TREC queries with five retrieval models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Query file, one `<id>. Document ...` description per line
    #[arg(long)]
    queries: String,
    /// Newline-delimited stopword list (built-in English list when omitted)
    #[arg(long)]
    stopwords: Option<String>,
}

#[derive(Args)]
struct ElasticArgs {
    /// Elasticsearch base URL
    #[arg(long, default_value = "http://localhost:9200")]
    es_url: String,
    /// Index holding the collection
    #[arg(long, default_value = "ap_dataset")]
    index: String,
    #[arg(long, default_value = "text")]
    text_field: String,
    #[arg(long, default_value = "docno")]
    docno_field: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Args)]
struct ParamArgs {
    #[arg(long, default_value_t = 1.2)]
    k1: f64,
    #[arg(long, default_value_t = 100.0)]
    k2: f64,
    #[arg(long, default_value_t = 0.75)]
    b: f64,
    /// Jelinek-Mercer interpolation weight of the document model
    #[arg(long, default_value_t = 0.5)]
    lambda: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every query and write one run file per model
    Run {
        #[command(flatten)]
        input: QueryArgs,
        /// Read statistics from a snapshot directory instead of Elasticsearch
        #[arg(long)]
        snapshot: Option<String>,
        #[command(flatten)]
        elastic: ElasticArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Directory for the run files
        #[arg(long, default_value = "output")]
        output: String,
        /// Maximum ranked documents per query
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: usize,
        #[arg(long, default_value = DEFAULT_RUN_TAG)]
        run_tag: String,
    },
    /// Capture the statistics a query file needs into a snapshot directory
    Snapshot {
        #[command(flatten)]
        input: QueryArgs,
        #[command(flatten)]
        elastic: ElasticArgs,
        /// Snapshot output directory
        #[arg(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, snapshot, elastic, params, output, depth, run_tag } => {
            let queries = load_queries(&input)?;
            let params = ScoringParams { k1: params.k1, k2: params.k2, b: params.b, lambda: params.lambda };
            let config = RunConfig { output_dir: output.into(), depth, run_tag };
            match snapshot {
                Some(dir) => {
                    let stats = load_snapshot(&SnapshotPaths::new(&dir))
                        .with_context(|| format!("loading snapshot {dir}"))?;
                    run(stats, params, &queries, config)
                }
                None => run(connect(elastic)?, params, &queries, config),
            }
        }
        Commands::Snapshot { input, elastic, output } => {
            let queries = load_queries(&input)?;
            let provider = connect(elastic)?;
            let terms = queries.iter().flat_map(|q| q.terms.keys());
            let stats = MemoryStats::capture(&provider, terms).context("capturing statistics")?;
            let created_at = time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into());
            save_snapshot(&SnapshotPaths::new(&output), &stats, &created_at)?;
            tracing::info!(output = %output, terms = stats.postings.len(), docs = stats.doc_lengths.len(), "snapshot written");
            Ok(())
        }
    }
}

fn load_queries(input: &QueryArgs) -> Result<Vec<Query>> {
    let stopwords = match &input.stopwords {
        Some(path) => StopwordFilter::load(path).with_context(|| format!("reading stopwords {path}"))?,
        None => StopwordFilter::builtin(),
    };
    let queries = QueryParser::new(&stopwords)
        .load(&input.queries)
        .with_context(|| format!("reading queries {}", input.queries))?;
    tracing::info!(queries = queries.len(), stopwords = stopwords.len(), "loaded queries");
    Ok(queries)
}

fn connect(args: ElasticArgs) -> Result<ElasticStats> {
    let config = ElasticConfig {
        base_url: args.es_url,
        index: args.index,
        text_field: args.text_field,
        docno_field: args.docno_field,
        timeout_secs: args.timeout_secs,
        ..ElasticConfig::default()
    };
    Ok(ElasticStats::connect(config)?)
}

fn run<P: StatsProvider>(provider: P, params: ScoringParams, queries: &[Query], config: RunConfig) -> Result<()> {
    let output = config.output_dir.clone();
    let pipeline = Pipeline::new(provider, params).context("collecting corpus statistics")?;
    let summary = pipeline.run(queries, config)?;
    for (model, lines) in &summary.lines_written {
        tracing::info!(model = model.name(), lines, "run file complete");
    }
    tracing::info!(output = %output.display(), queries = summary.queries, empty = summary.empty_queries, "run complete");
    Ok(())
}
