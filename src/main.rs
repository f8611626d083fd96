use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use rayon::prelude::*;

use graphdex::annealing::{Annealing, AnnealingConfig};
use graphdex::constraint_set::enumerate_constraint_sets;
use graphdex::parse::{parse_fmdg, parse_permutation, parse_rgfa};
use graphdex::{Graph, GraphIndex, Walk};

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

// constraint sets deeper than this stop paying off as an annealing objective
const CONSTRAINT_DEPTH: usize = 4;

#[derive(Parser)]
#[command(
    name = "graphdex",
    version,
    about = "FM-Index based substring search over string-labelled graphs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a string-labelled graph for querying
    Index(IndexArgs),
    /// Load an index and run string queries against the graph
    Query(QueryArgs),
    /// Approximate a vertex permutation that speeds up queries
    Permutation(PermutationArgs),
    /// Reserved for index validation
    Validate,
}

#[derive(Args)]
struct IndexArgs {
    /// Path to the input graph in fmdg or rGFA format (default: stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// The input file is rGFA
    #[arg(short = 'g', long = "rgfa")]
    rgfa: bool,

    /// Path of the output index file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Path to a vertex permutation file (default: identity permutation)
    #[arg(short = 'p', long = "permutation")]
    permutation: Option<PathBuf>,

    /// Suffix-array sampling rate; smaller is faster to query, larger on disk
    #[arg(short = 's', long = "isa-sample-rate", default_value_t = 256)]
    isa_sample_rate: usize,

    /// Rank cache rate, accepted for compatibility: the cache-line-aligned
    /// index has a fixed rank cache geometry
    #[arg(short = 'r', long = "rank-sample-rate", default_value_t = 256)]
    rank_sample_rate: usize,

    /// Report timings, sizes and memory estimates
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// What to report for each query
    #[arg(value_enum)]
    mode: QueryMode,

    /// Path to the index file
    #[arg(short = 'r', long = "reference")]
    reference: PathBuf,

    /// Path to the query file, one string per line (default: stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Queries are in FASTQ format
    #[arg(short = 'f', long = "fastq")]
    fastq: bool,

    /// Path of the output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Number of threads for parallel querying
    #[arg(short = 'j', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Report timings and fork statistics
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueryMode {
    /// One integer per query: the number of match positions
    Count,
    /// (vid, offset) tuples per query line
    Locate,
    /// One line per matching walk: (vid, offset) (vid) ... (vid, offset)
    Enumerate,
}

#[derive(Args)]
struct PermutationArgs {
    /// Path to the input graph in fmdg format (default: stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Path of the output permutation file, one vid per line (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Initial permutation to start optimizing from (default: identity)
    #[arg(short = 'p', long = "permutation")]
    permutation: Option<PathBuf>,

    /// Time budget in seconds
    #[arg(short = 't', long = "time", default_value_t = 15)]
    time: u64,

    /// Progress report interval in seconds
    #[arg(short = 'u', long = "update", default_value_t = 3)]
    update: u64,

    /// Number of threads for the parallel cost computation
    #[arg(short = 'j', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Report progress and costs
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Command::Index(args) => args.verbose,
        Command::Query(args) => args.verbose,
        Command::Permutation(args) => args.verbose,
        Command::Validate => false,
    };
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let result = match cli.command {
        Command::Index(args) => run_index(args),
        Command::Query(args) => run_query(args),
        Command::Permutation(args) => run_permutation(args),
        Command::Validate => Err(anyhow::anyhow!("validate is not implemented yet")),
    };

    if let Err(err) = result {
        log::error!("{:#}", err);
        std::process::exit(-1);
    }
}

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("could not open input {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("could not open output {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

fn read_graph(input: &Option<PathBuf>, rgfa: bool) -> Result<Graph> {
    let mut reader = open_input(input)?;
    let source = input
        .as_ref()
        .map_or_else(|| "stdin".to_string(), |p| p.display().to_string());

    let graph = if rgfa {
        parse_rgfa(&mut reader)
    } else {
        parse_fmdg(&mut reader)
    }
    .with_context(|| format!("could not parse graph from {}", source))?;

    info!(
        "parsed graph from {}: {} vertices, {} edges",
        source,
        graph.vertex_count(),
        graph.edge_count()
    );
    Ok(graph)
}

fn read_permutation_file(path: &PathBuf) -> Result<Vec<usize>> {
    let mut reader: Box<dyn BufRead> = Box::new(BufReader::new(
        File::open(path)
            .with_context(|| format!("could not open permutation {}", path.display()))?,
    ));
    parse_permutation(&mut reader)
        .with_context(|| format!("could not parse permutation {}", path.display()))
}

fn run_index(args: IndexArgs) -> Result<()> {
    let parse_start = Instant::now();
    let graph = read_graph(&args.input, args.rgfa)?;

    let permutation = args
        .permutation
        .as_ref()
        .map(read_permutation_file)
        .transpose()?;
    let parse_time = parse_start.elapsed();

    let no_vertices = graph.vertex_count();
    let no_edges = graph.edge_count();
    let no_chars = graph.total_label_len();
    let code_width = if no_vertices <= 1 {
        0
    } else {
        no_vertices.next_power_of_two().ilog2() as usize
    };
    let text_len = no_chars + (2 + code_width) * no_vertices + 1;
    info!("average in-degree: {:.3}", no_edges as f64 / no_vertices.max(1) as f64);
    info!(
        "total label length: {} ({:.3} per vertex)",
        no_chars,
        no_chars as f64 / no_vertices.max(1) as f64
    );
    // text, BWT and a 64-bit suffix array dominate construction
    info!(
        "estimated peak memory: {} bytes ({:.3} GB)",
        10 * text_len,
        10.0 * text_len as f64 * 1e-9
    );
    if args.rank_sample_rate != 256 {
        info!(
            "rank sample rate {} ignored: rank caches have a fixed cache-line geometry",
            args.rank_sample_rate
        );
    }

    let index_start = Instant::now();
    let index = GraphIndex::new(&graph, permutation.as_deref(), args.isa_sample_rate)
        .context("index construction failed")?;
    let index_time = index_start.elapsed();

    let write_start = Instant::now();
    let buf = index.to_buffer();
    let mut output = open_output(&args.output)?;
    output.write_all(&buf).context("could not write the index")?;
    output.flush().context("could not write the index")?;
    let write_time = write_start.elapsed();

    info!(
        "index size: {} bytes ({:.3} GB)",
        buf.len(),
        buf.len() as f64 * 1e-9
    );
    info!(
        "timings: parse {:.3}s, index {:.3}s, write {:.3}s",
        parse_time.as_secs_f64(),
        index_time.as_secs_f64(),
        write_time.as_secs_f64()
    );

    Ok(())
}

fn read_queries(reader: &mut impl BufRead, fastq: bool) -> Result<Vec<Vec<u8>>> {
    let mut queries = Vec::new();
    let mut line = Vec::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }

        // in FASTQ, the sequence is the second line of every four
        if fastq {
            if line_no % 4 == 1 {
                queries.push(line.clone());
            }
        } else if !line.is_empty() {
            queries.push(line.clone());
        }
        line_no += 1;
    }

    Ok(queries)
}

fn format_walk(walk: &Walk) -> String {
    let mut out = String::new();
    for (i, node) in walk.nodes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i == 0 {
            out.push_str(&format!("({},{})", node.vid, node.graph_lo));
        } else if i == walk.nodes.len() - 1 {
            out.push_str(&format!("({},{})", node.vid, node.graph_hi));
        } else {
            out.push_str(&format!("({})", node.vid));
        }
    }
    out
}

fn run_query(args: QueryArgs) -> Result<()> {
    let load_start = Instant::now();
    let index_file = File::open(&args.reference)
        .with_context(|| format!("could not open index {}", args.reference.display()))?;
    let index = GraphIndex::load_from_reader(&mut BufReader::new(index_file))
        .with_context(|| format!("could not load index {}", args.reference.display()))?;
    info!(
        "loaded index with {} vertices in {:.3}s",
        index.vertex_count(),
        load_start.elapsed().as_secs_f64()
    );

    let mut reader = open_input(&args.input)?;
    let queries = read_queries(&mut reader, args.fastq).context("could not read queries")?;
    info!("running {} queries on {} threads", queries.len(), args.threads);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("could not build the thread pool")?;

    let query_start = Instant::now();
    let results: Vec<(usize, String)> = pool.install(|| {
        queries
            .par_iter()
            .map(|query| {
                let matches = index.matches(query);
                let mut text = match args.mode {
                    QueryMode::Count => matches.count().to_string(),
                    QueryMode::Locate => {
                        let hits: Vec<String> = index
                            .locate_matches(&matches)
                            .iter()
                            .map(|hit| format!("({},{})", hit.vid, hit.offset))
                            .collect();
                        hits.join(" ")
                    }
                    QueryMode::Enumerate => {
                        let walks: Vec<String> = index
                            .enumerate_matches(&matches, query)
                            .iter()
                            .map(format_walk)
                            .collect();
                        walks.join("\n")
                    }
                };
                text.push('\n');
                (matches.no_forks, text)
            })
            .collect()
    });
    let total_forks: usize = results.iter().map(|(forks, _)| forks).sum();

    let mut output = open_output(&args.output)?;
    for (_, result) in &results {
        output
            .write_all(result.as_bytes())
            .context("could not write query results")?;
    }
    output.flush().context("could not write query results")?;

    info!(
        "queries took {:.3}s total, {} boundary forks",
        query_start.elapsed().as_secs_f64(),
        total_forks
    );

    Ok(())
}

fn run_permutation(args: PermutationArgs) -> Result<()> {
    let graph = read_graph(&args.input, false)?;
    if graph.vertex_count() < 2 {
        bail!("permutation optimization needs at least two vertices");
    }

    let initial = args
        .permutation
        .as_ref()
        .map(read_permutation_file)
        .transpose()?;
    if let Some(initial) = &initial {
        if initial.len() != graph.vertex_count() {
            bail!(
                "initial permutation has {} entries for {} vertices",
                initial.len(),
                graph.vertex_count()
            );
        }
    }

    let extract_start = Instant::now();
    let constraints = enumerate_constraint_sets(&graph, CONSTRAINT_DEPTH, true);
    info!(
        "extracted {} constraint sets up to depth {} in {:.3}s",
        constraints.len(),
        CONSTRAINT_DEPTH,
        extract_start.elapsed().as_secs_f64()
    );

    let config = AnnealingConfig {
        parallel: args.threads > 1,
        ..AnnealingConfig::default()
    };
    let mut annealing = match initial {
        Some(initial) => Annealing::with_initial_permutation(initial, &constraints, config),
        None => Annealing::new(graph.vertex_count(), &constraints, config),
    }
    .context("could not configure the annealing optimizer")?;

    info!("initial cost: {}", annealing.current_cost());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("could not build the thread pool")?;
    pool.install(|| {
        annealing.run_for(
            Duration::from_secs(args.time),
            Some(Duration::from_secs(args.update)),
        )
    });

    info!(
        "finished after {} iterations: best cost {}, final cost {}",
        annealing.iterations(),
        annealing.best_cost(),
        annealing.current_cost()
    );

    let mut output = open_output(&args.output)?;
    for &vid in annealing.best_permutation() {
        writeln!(output, "{}", vid).context("could not write the permutation")?;
    }
    output.flush().context("could not write the permutation")?;

    Ok(())
}
