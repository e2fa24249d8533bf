use log::info;

use crate::{
    costs::TransportCosts,
    models::facility_location::{FacilityLocationSolver, ModelOptions, Parameters, Sets},
    problem::Problem,
    reduction::{Reduction, ReductionConfig},
    report::SolutionSummary,
    termination::Termination,
    Error,
};

/// Everything needed to solve one instance
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub options: ModelOptions,
    pub reduction: ReductionConfig,
    pub termination: Termination,
    /// Only use the first scenarios of the stochastic variant
    pub scenarios: Option<usize>,
    /// Show the solver log
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            options: ModelOptions::default(),
            reduction: ReductionConfig::default(),
            termination: Termination::Never,
            scenarios: None,
            verbose: false,
        }
    }
}

/// Reduces, builds and solves `problem`, and summarises the result.
///
/// An infeasible or unbounded model is not an error, it is reported through the status of the summary.
pub fn solve(problem: &Problem, name: &str, settings: &RunSettings) -> Result<SolutionSummary, Error> {
    let options = &settings.options;
    info!(
        "Solving {} as {} with {} demand ({} customers, {} candidates, {})",
        name,
        options.variant,
        options.demand_policy,
        settings.reduction.customers,
        settings.reduction.candidates,
        settings.termination
    );

    let costs = TransportCosts::new(problem)?;
    let demand = options.variant.demand(problem, settings.scenarios);
    let reduction = Reduction::new(problem, &costs, demand, &settings.reduction)?;

    let sets = Sets::new(problem, &reduction);
    let parameters = Parameters::new(problem, &reduction, &costs, options);
    let result = FacilityLocationSolver::solve(&sets, &parameters, options, &settings.termination, settings.verbose)?;

    let summary = SolutionSummary::new(name, problem, &reduction, &costs, &parameters, options, &result);
    info!("{}", summary.status_line());
    Ok(summary)
}
