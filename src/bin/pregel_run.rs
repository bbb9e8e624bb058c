//! Runs a bundled vertex program over an edge list and prints the public
//! vertex values as JSON.
//!
//! Edge list format: one relationship per line, `source target [weight]`,
//! whitespace separated. Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pregel::algorithms::{ConnectedComponentsPregel, PageRankPregel, SingleSourceShortestPath};
use pregel::schema::ValueType;
use pregel::{CsrGraph, Graph, Pregel, PregelComputation, PregelConfig, PregelResult};

#[derive(Parser)]
#[command(name = "pregel-run")]
#[command(about = "Run a Pregel vertex program over an edge list", long_about = None)]
struct Cli {
    /// Path to the edge list
    input: PathBuf,

    #[command(flatten)]
    run: RunArgs,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    algorithm: Algorithm,
}

#[derive(Args)]
struct RunArgs {
    /// Superstep cap
    #[arg(long, default_value_t = pregel::config::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Use the asynchronous messenger when the program has no reducer
    #[arg(long, default_value_t = false)]
    asynchronous: bool,

    /// Schedule with fork-join bisection instead of fixed partitions
    #[arg(long, default_value_t = false)]
    fork_join: bool,

    /// Leaf size of fork-join bisection
    #[arg(long, default_value_t = pregel::config::DEFAULT_FORK_JOIN_THRESHOLD)]
    fork_join_threshold: usize,
}

impl RunArgs {
    fn to_config(&self) -> Result<PregelConfig> {
        let mut builder = PregelConfig::builder()
            .max_iterations(self.max_iterations)
            .is_asynchronous(self.asynchronous)
            .use_fork_join(self.fork_join)
            .fork_join_threshold(self.fork_join_threshold);
        if let Some(concurrency) = self.concurrency {
            builder = builder.concurrency(concurrency);
        }
        Ok(builder.build()?)
    }
}

#[derive(Subcommand)]
enum Algorithm {
    /// Delta-propagating PageRank
    PageRank {
        /// Damping factor
        #[arg(long, default_value_t = 0.85)]
        damping_factor: f64,
        /// Smallest rank change still propagated
        #[arg(long, default_value_t = 1e-7)]
        tolerance: f64,
    },
    /// Weakly connected components (the graph is made undirected first)
    ConnectedComponents,
    /// Single-source shortest paths
    ShortestPath {
        /// Original id of the source vertex
        #[arg(long)]
        source: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let graph = read_edge_list(&cli.input)?;
    info!(
        node_count = graph.node_count(),
        relationship_count = graph.relationship_count(),
        path = %cli.input.display(),
        "loaded graph"
    );
    let config = cli.run.to_config()?;

    let (graph, result) = match cli.algorithm {
        Algorithm::PageRank {
            damping_factor,
            tolerance,
        } => {
            if !(0.0..1.0).contains(&damping_factor) {
                bail!("damping factor must be in [0, 1), got {damping_factor}");
            }
            let computation = PageRankPregel {
                damping_factor,
                tolerance,
            };
            run(graph, config, computation)?
        }
        Algorithm::ConnectedComponents => run(graph.to_undirected(), config, ConnectedComponentsPregel)?,
        Algorithm::ShortestPath { source } => {
            let source = graph
                .to_mapped_node_id(source)
                .with_context(|| format!("source vertex {source} is not in the graph"))?;
            run(graph, config, SingleSourceShortestPath::new(source))?
        }
    };

    let output = json!({
        "did_converge": result.did_converge,
        "ran_iterations": result.ran_iterations,
        "nodes": node_values_json(&graph, &result),
    });
    let mut stdout = io::stdout().lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut stdout, &output)?;
    } else {
        serde_json::to_writer(&mut stdout, &output)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn run<C: PregelComputation>(graph: CsrGraph, config: PregelConfig, computation: C) -> Result<(CsrGraph, PregelResult)> {
    let mut pregel = Pregel::create(graph.clone(), config, computation)?;
    let result = pregel.run().context("pregel run failed")?;
    pregel.release();
    Ok((graph, result))
}

fn read_edge_list(path: &Path) -> Result<CsrGraph> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut edges = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parse_id = |field: &str| {
            field
                .parse::<u64>()
                .with_context(|| format!("line {}: invalid vertex id `{field}`", line_no + 1))
        };
        let edge = match fields.as_slice() {
            [source, target] => (parse_id(source)?, parse_id(target)?, None),
            [source, target, weight] => {
                let weight = weight
                    .parse::<f64>()
                    .with_context(|| format!("line {}: invalid weight `{weight}`", line_no + 1))?;
                (parse_id(source)?, parse_id(target)?, Some(weight))
            }
            _ => bail!("line {}: expected `source target [weight]`", line_no + 1),
        };
        edges.push(edge);
    }
    Ok(CsrGraph::from_original_edges(&edges))
}

fn node_values_json(graph: &CsrGraph, result: &PregelResult) -> Vec<Value> {
    let values = &result.node_values;
    let keys: Vec<(&str, ValueType)> = values
        .public_keys()
        .filter_map(|key| values.value_type(key).map(|t| (key, t)))
        .collect();
    (0..values.node_count())
        .map(|node| {
            let mut object = Map::new();
            object.insert("node_id".into(), json!(graph.to_original_node_id(node)));
            for &(key, value_type) in &keys {
                let value = match value_type {
                    ValueType::Long => json!(values.long_value(key, node)),
                    ValueType::Double => json!(values.double_value(key, node)),
                    ValueType::LongArray => json!(values.long_array_value(key, node)),
                    ValueType::DoubleArray => json!(values.double_array_value(key, node)),
                };
                object.insert(key.to_owned(), value);
            }
            Value::Object(object)
        })
        .collect()
}
