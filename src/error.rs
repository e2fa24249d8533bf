use derive_more::{Display, From};

use crate::{
    clustering::ClusteringError,
    costs::CostError,
    models::subset_selection::SubsetError,
    parse::{ParseOptionError, ParseTerminationError},
    problem::ProblemConstructionError,
    solver::SolverError,
};

/// Any failure of a run, from reading the instance to writing the report
#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "invalid problem: {}", _0)]
    Problem(ProblemConstructionError),
    #[display(fmt = "transport costs: {}", _0)]
    Cost(CostError),
    #[display(fmt = "clustering failed: {}", _0)]
    Clustering(ClusteringError),
    #[display(fmt = "subset selection failed: {}", _0)]
    Subset(SubsetError),
    #[display(fmt = "solver: {}", _0)]
    Solver(SolverError),
    #[display(fmt = "invalid termination: {}", _0)]
    Termination(ParseTerminationError),
    #[display(fmt = "invalid option: {}", _0)]
    Option(ParseOptionError),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::error::Error for Error {}
