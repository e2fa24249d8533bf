use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::{error, LevelFilter};

use depot::{
    clustering::{Clustering, KMeansConfig},
    config::RunConfig,
    models::facility_location::{DemandPolicy, Variant},
    parse::{read_problem, ProblemFromFile},
    reduction::{CandidateReduction, CustomerReduction},
    report::cluster_summary,
    run::{self, RunSettings},
    termination::Termination,
    Error,
};

/// Multi-period warehouse location
#[derive(Parser)]
#[clap(name = "depot", version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a facility location instance
    Solve(SolveArgs),
    /// Cluster the customers of an instance and print the centers
    Cluster(ClusterArgs),
}

#[derive(Args)]
struct SolveArgs {
    /// JSON problem instance
    #[clap(long)]
    problem: PathBuf,
    /// static, multi-period or stochastic
    #[clap(long)]
    variant: Option<Variant>,
    /// aggregate or single-source
    #[clap(long)]
    policy: Option<DemandPolicy>,
    /// all or cluster:K
    #[clap(long)]
    customers: Option<CustomerReduction>,
    /// all, cluster:K or subset:M
    #[clap(long)]
    candidates: Option<CandidateReduction>,
    /// When to stop the main model, e.g. "600 timeout 0.01 gap |"
    #[clap(long)]
    termination: Option<Termination>,
    /// When to stop the subset selection
    #[clap(long)]
    subset_termination: Option<Termination>,
    #[clap(long)]
    seed: Option<u64>,
    /// Only use the first N scenarios
    #[clap(long)]
    scenarios: Option<usize>,
    /// Write a JSON summary of the solution here
    #[clap(long)]
    output: Option<PathBuf>,
    /// JSON run configuration, overridden by the flags above
    #[clap(long)]
    config: Option<PathBuf>,
    /// Debug logging and solver output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct ClusterArgs {
    #[clap(long)]
    problem: PathBuf,
    #[clap(long)]
    clusters: usize,
    #[clap(long, default_value = "0")]
    seed: u64,
    #[clap(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let level = match verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn solve(args: SolveArgs) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(policy) = args.policy {
        config.policy = Some(policy);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(scenarios) = args.scenarios {
        config.scenarios = Some(scenarios);
    }
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    config.verbose |= args.verbose;

    let mut reduction = config.reduction_config()?;
    if let Some(customers) = args.customers {
        reduction.customers = customers;
    }
    if let Some(candidates) = args.candidates {
        reduction.candidates = candidates;
    }
    if let Some(termination) = args.subset_termination {
        reduction.subset_termination = termination;
    }

    let settings = RunSettings {
        options: config.model_options(),
        reduction,
        termination: match args.termination {
            Some(termination) => termination,
            None => config.termination()?,
        },
        scenarios: config.scenarios,
        verbose: config.verbose,
    };

    let ProblemFromFile { name, problem } = read_problem(&args.problem)?;
    let summary = run::solve(&problem, &name, &settings)?;
    println!("{}", summary);

    if let Some(path) = &config.output {
        summary.write_json(path)?;
    }
    Ok(())
}

fn cluster(args: ClusterArgs) -> Result<(), Error> {
    let ProblemFromFile { problem, .. } = read_problem(&args.problem)?;
    let points = problem
        .customers()
        .iter()
        .map(|c| c.location().to_wgs84())
        .collect::<Vec<_>>();
    let weights = problem.demand().rows().into_iter().map(|r| r.sum()).collect::<Vec<_>>();
    let clustering = Clustering::new(&points, &weights, &KMeansConfig::new(args.clusters).with_seed(args.seed))?;

    println!("{}", serde_json::to_string_pretty(&cluster_summary(&problem, &clustering))?);
    Ok(())
}

pub fn main() {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Solve(args) => args.verbose,
        Command::Cluster(args) => args.verbose,
    };
    init_logger(verbose);

    let result = match cli.command {
        Command::Solve(args) => solve(args),
        Command::Cluster(args) => cluster(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
