//! QTree CLI
//!
//! Command-line interface for:
//! - Learning a query from positive and negative example resources
//! - Scoring a candidate query against a reference query
//! - Running the evaluation harness over a file of reference queries
//! - Rendering the resource tree of a single resource

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use qtree_core::{Entailment, Node, PruneScope, TreeFactory, TreeFactoryConfig};
use qtree_eval::{prepare, Evaluation, EvaluationConfig, ScoringConfig, ScoringEngine};
use qtree_ingest_rdfowl::{load_graph, ClassHierarchy, Graph, MemoryEndpoint, PropertyAxioms};
use qtree_learn::{ExampleSelection, LearnerConfig, QueryTreeLearner, SearchStatus};
use qtree_sparql::{parse_query, render_string, tree_from_query, PrefixMap, SelectQuery};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "qtree")]
#[command(
    author,
    version,
    about = "QTree: learn SPARQL queries from example resources"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a query separating positive from negative example resources.
    Learn {
        #[command(flatten)]
        data: DataArgs,
        /// Positive example IRIs
        #[arg(long, value_delimiter = ',', required = true)]
        pos: Vec<String>,
        /// Negative example IRIs
        #[arg(long, value_delimiter = ',', required = true)]
        neg: Vec<String>,
        /// Learner configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Depth of the example descriptions
        #[arg(long, default_value_t = 3)]
        depth: usize,
        /// Number of solutions to print
        #[arg(long, default_value_t = 5)]
        show: usize,
    },

    /// Score a candidate query against a reference query.
    Score {
        #[command(flatten)]
        data: DataArgs,
        /// File holding the reference query
        #[arg(long)]
        reference: PathBuf,
        /// File holding the candidate query
        #[arg(long)]
        candidate: PathBuf,
        /// Noise of the examples the candidate was learned from
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        /// Scoring configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the evaluation harness.
    Eval {
        #[command(flatten)]
        data: DataArgs,
        /// Reference queries, one per line; blank lines and `#` comments are skipped
        #[arg(long)]
        queries: PathBuf,
        /// Evaluation configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the resource tree of a resource and the query it renders to.
    Render {
        #[command(flatten)]
        data: DataArgs,
        /// Resource IRI
        resource: String,
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
}

#[derive(Args)]
struct DataArgs {
    /// RDF file (N-Triples, Turtle, N-Quads, TriG or RDF/XML)
    #[arg(short, long)]
    data: PathBuf,
    /// Base IRI for rendered queries
    #[arg(long)]
    base: Option<String>,
    /// Namespace prefix for rendered queries, as `name=iri`
    #[arg(long = "prefix", value_parser = parse_prefix)]
    prefixes: Vec<(String, String)>,
}

impl DataArgs {
    fn load(&self) -> Result<MemoryEndpoint> {
        let graph = load_graph(&self.data)
            .with_context(|| format!("failed to load {}", self.data.display()))?;
        eprintln!(
            "{} {} ({} triples)",
            "Loaded".green().bold(),
            self.data.display(),
            graph.len()
        );
        Ok(MemoryEndpoint::new(graph))
    }

    fn prefix_map(&self) -> PrefixMap {
        self.prefixes.iter().cloned().collect()
    }
}

fn parse_prefix(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, iri)| (name.to_string(), iri.to_string()))
        .ok_or_else(|| format!("expected `name=iri`, got `{s}`"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Learn {
            data,
            pos,
            neg,
            config,
            depth,
            show,
        } => cmd_learn(&data, &pos, &neg, config.as_deref(), depth, show),
        Commands::Score {
            data,
            reference,
            candidate,
            noise,
            config,
        } => cmd_score(&data, &reference, &candidate, noise, config.as_deref()),
        Commands::Eval {
            data,
            queries,
            config,
            out,
        } => cmd_eval(&data, &queries, config.as_deref(), out.as_deref()),
        Commands::Render {
            data,
            resource,
            depth,
        } => cmd_render(&data, &resource, depth),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Deserialize `path`, or the default when no file is given.
fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn read_query(path: &Path) -> Result<SelectQuery> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_query(&text).with_context(|| format!("invalid query in {}", path.display()))
}

fn iris(values: &[String]) -> Vec<Node> {
    values.iter().map(|v| Node::iri(v.trim())).collect()
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_learn(
    data: &DataArgs,
    pos: &[String],
    neg: &[String],
    config: Option<&Path>,
    depth: usize,
    show: usize,
) -> Result<()> {
    let endpoint = data.load()?;
    let config: LearnerConfig = load_config(config)?;
    let factory = TreeFactory::new(TreeFactoryConfig {
        max_depth: depth,
        ..TreeFactoryConfig::default()
    });

    let examples = ExampleSelection {
        correct_positives: iris(pos),
        false_positives: Vec::new(),
        negatives: iris(neg),
    }
    .build(&endpoint, &factory)?;
    tracing::info!(
        positives = pos.len(),
        negatives = neg.len(),
        depth,
        entailment = ?config.entailment,
        "built example trees"
    );

    let learner = QueryTreeLearner::new(config.clone());
    let outcome = match config.entailment {
        Entailment::Rdf => learner.learn(&examples)?,
        Entailment::Rdfs => {
            let hierarchy = ClassHierarchy::from_graph(endpoint.graph());
            let axioms = PropertyAxioms::from_graph(endpoint.graph());
            learner.learn_with(&examples, PruneScope::rdfs(&hierarchy).with_axioms(&axioms))?
        }
    };

    let status = match outcome.status {
        SearchStatus::Converged => "converged".green().bold(),
        SearchStatus::Timeout => "timeout".yellow().bold(),
        SearchStatus::Failed => "failed".red().bold(),
    };
    eprintln!(
        "{} {} candidates, {} scored, {} ms",
        status, outcome.stats.generated, outcome.stats.scored, outcome.stats.elapsed_ms
    );
    if outcome.solutions.is_empty() {
        return Err(anyhow!("no solution found"));
    }

    let prefixes = data.prefix_map();
    for (rank, solution) in outcome.solutions.iter().take(show).enumerate() {
        let tree = prepare(solution.tree());
        let coverage = solution.coverage();
        println!(
            "{} score={:.4} pos={}/{} neg={}/{}",
            format!("#{}", rank + 1).bold(),
            solution.score(),
            coverage.covered_positives,
            coverage.total_positives,
            coverage.covered_negatives,
            coverage.total_negatives
        );
        println!("{}\n", render_string(&tree, data.base.as_deref(), &prefixes));
    }
    Ok(())
}

fn cmd_score(
    data: &DataArgs,
    reference: &Path,
    candidate: &Path,
    noise: f64,
    config: Option<&Path>,
) -> Result<()> {
    let endpoint = data.load()?;
    let config: ScoringConfig = load_config(config)?;
    let reference = read_query(reference)?;
    let tree = tree_from_query(&read_query(candidate)?)?;
    tracing::debug!(reference = %reference, nodes = tree.node_count(), "parsed queries");

    let engine = ScoringEngine::new(&endpoint, config)?
        .with_namespaces(data.base.clone(), data.prefix_map());
    let score = engine.score(&reference, &tree, noise)?;
    tracing::info!(kb_size = engine.kb_size(), noise, "scored candidate");
    println!("{}", "Score".green().bold());
    println!("{score}");
    Ok(())
}

fn cmd_eval(
    data: &DataArgs,
    queries: &Path,
    config: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let endpoint = data.load()?;
    let config: EvaluationConfig = load_config(config)?;

    let text = fs::read_to_string(queries)
        .with_context(|| format!("failed to read {}", queries.display()))?;
    let mut parsed = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let query = parse_query(line)
            .with_context(|| format!("{}:{}: invalid query", queries.display(), line_no + 1))?;
        parsed.push(query);
    }
    eprintln!(
        "{} {} queries, {} tasks",
        "Evaluating".green().bold(),
        parsed.len(),
        config.task_count(parsed.len())
    );

    let report = Evaluation::new(endpoint, config)
        .with_namespaces(data.base.clone(), data.prefix_map())
        .run(parsed)?;
    tracing::info!(
        tasks = report.tasks.len(),
        skipped_queries = report.skipped_queries.len(),
        elapsed_ms = report.elapsed_ms,
        "evaluation finished"
    );

    for summary in &report.configurations {
        let fmeasure = summary
            .learned
            .fmeasure
            .map(|s| format!("{:.4}", s.mean))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} examples={:<4} noise={:<5} completed={:<4} failed={:<4} F(mean)={}",
            summary.measure.to_string().bold(),
            summary.nr_of_examples,
            summary.noise,
            summary.completed,
            summary.failed,
            fmeasure
        );
    }
    let failed = report.failed_tasks().count();
    if failed > 0 {
        eprintln!("{} {} tasks failed", "warning:".yellow().bold(), failed);
    }

    match out {
        Some(path) => {
            report.write_json(path)?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn cmd_render(data: &DataArgs, resource: &str, depth: usize) -> Result<()> {
    let endpoint = data.load()?;
    let graph: &Graph = endpoint.graph();
    let root = Node::iri(resource);
    let triples = graph.bounded_description(&root, depth);
    if triples.is_empty() {
        return Err(anyhow!("{resource} has no outgoing triples"));
    }

    let tree = TreeFactory::new(TreeFactoryConfig {
        max_depth: depth,
        ..TreeFactoryConfig::default()
    })
    .build(&root, &triples);
    tracing::debug!(resource, triples = triples.len(), nodes = tree.node_count(), "built tree");
    println!("{}", "Tree".green().bold());
    println!("{tree}");
    println!("{}", "Query".green().bold());
    println!(
        "{}",
        render_string(&tree, data.base.as_deref(), &data.prefix_map())
    );
    Ok(())
}
