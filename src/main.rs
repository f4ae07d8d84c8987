use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::{info, LevelFilter};

use tf_idf_cluster::{
    Convergence, Corpus, CorpusAssembly, CorpusModel, DefaultTFIDFEngine, Document, EngineConfig, KMeans, ModelData,
};

/// Cluster and rank tokenized articles by TF-IDF
#[derive(Parser, Debug)]
#[command(name = "tf-idf-cluster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group documents with k-means and print each cluster's members
    Cluster(ClusterArgs),
    /// Rank documents against a query by cosine similarity
    Rank(RankArgs),
    /// Write the vectorized corpus as a CBOR snapshot
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON array of { "id": ..., "tokens": [...] }
    #[arg(short, long, value_name = "CORPUS_JSON")]
    input: PathBuf,

    /// Engine configuration (JSON)
    #[arg(short, long, value_name = "CONFIG_JSON")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ClusterArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Number of clusters
    #[arg(short, long, env = "TFIDF_CLUSTER_K")]
    k: Option<usize>,

    /// Upper bound on centroid updates
    #[arg(long, env = "TFIDF_CLUSTER_MAX_UPDATES")]
    max_updates: Option<usize>,

    /// Seed for centroid sampling
    #[arg(long, env = "TFIDF_CLUSTER_SEED")]
    seed: Option<u64>,

    /// Stop once no centroid component moves more than this
    #[arg(long)]
    tolerance: Option<f64>,
}

#[derive(Args, Debug)]
struct RankArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Query tokens, already normalized the same way as the corpus
    #[arg(long, required = true, num_args = 1..)]
    query: Vec<String>,

    /// Number of hits to print
    #[arg(long, default_value = "10")]
    top: usize,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Destination of the CBOR snapshot
    #[arg(short, long, value_name = "MODEL_CBOR")]
    output: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(cli.log_level())
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command) -> tf_idf_cluster::Result<()> {
    match command {
        Command::Cluster(args) => cluster(args),
        Command::Rank(args) => rank(args),
        Command::Export(args) => export(args),
    }
}

fn load_config(path: Option<&Path>) -> tf_idf_cluster::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(path),
        None => Ok(EngineConfig::default()),
    }
}

fn load_corpus(path: &Path) -> tf_idf_cluster::Result<Corpus> {
    let json = fs::read_to_string(path)?;
    let documents: Vec<Document> = serde_json::from_str(&json)?;
    let corpus = Corpus::from_documents(documents)?;
    info!("loaded {} documents from {}", corpus.doc_num(), path.display());
    Ok(corpus)
}

fn build_model(corpus: &Corpus, config: &EngineConfig) -> tf_idf_cluster::Result<CorpusModel> {
    let start = Instant::now();
    let model = CorpusAssembly::<DefaultTFIDFEngine>::new(corpus)
        .with_config(config.vectorizer)
        .build()?;
    info!("vectorized in {:?}", start.elapsed());
    Ok(model)
}

fn cluster(args: ClusterArgs) -> tf_idf_cluster::Result<()> {
    let mut config = load_config(args.input.config.as_deref())?;
    if let Some(k) = args.k {
        config.clustering.k = k;
    }
    if let Some(max_updates) = args.max_updates {
        config.clustering.max_updates = max_updates;
    }
    if let Some(seed) = args.seed {
        config.clustering.seed = Some(seed);
    }
    if let Some(eps) = args.tolerance {
        config.clustering.convergence = Convergence::Tolerance(eps);
    }
    config.validate()?;

    let corpus = load_corpus(&args.input.input)?;
    let model = build_model(&corpus, &config)?;

    let start = Instant::now();
    let fit = KMeans::from_config(&config.clustering).fit_matrix(&model.matrix)?;
    info!("clustered in {:?}", start.elapsed());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{} clusters, {} updates, converged: {}",
        fit.centroids.len(),
        fit.iterations,
        fit.converged
    )?;
    for (i, members) in fit.clusters(&model.matrix)?.iter().enumerate() {
        writeln!(out, "cluster {} ({} documents)", i, members.len())?;
        for key in members {
            writeln!(out, "  {}", key)?;
        }
    }
    Ok(())
}

fn rank(args: RankArgs) -> tf_idf_cluster::Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let corpus = load_corpus(&args.input.input)?;
    let model = build_model(&corpus, &config)?;

    let mut hits = model.rank(args.query.as_slice())?;
    hits.truncate(args.top);
    print!("{}", hits);
    Ok(())
}

fn export(args: ExportArgs) -> tf_idf_cluster::Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let corpus = load_corpus(&args.input.input)?;
    let model = build_model(&corpus, &config)?;

    let mut writer = BufWriter::new(File::create(&args.output)?);
    ModelData::from(&model).write_cbor(&mut writer)?;
    writer.flush()?;
    info!(
        "wrote {} vectors of dimension {} to {}",
        model.matrix.len(),
        model.matrix.dim(),
        args.output.display()
    );
    Ok(())
}
