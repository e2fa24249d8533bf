use std::time::Duration;

use derive_more::Display;
use good_lp::{constraint, Expression, Variable};
use itertools::iproduct;
use log::{info, warn};
use ndarray::Array2;

use crate::{
    models::utils::{AddVars, ConvertVars},
    solver::{Model, SolverError, Status},
    termination::Termination,
};

pub struct Variables {
    /// `assign[i][j]`: customer `i` is served by candidate `j`
    pub assign: Vec<Vec<Variable>>,
    /// `open[j]`: candidate `j` is selected
    pub open: Vec<Variable>,
}

#[derive(Debug, Display)]
pub enum SubsetError {
    #[display(fmt = "cannot select {} of {} candidate sites", size, candidates)]
    InvalidSize { size: usize, candidates: usize },
    #[display(fmt = "subset selection ended with status {}", _0)]
    Unsolved(Status),
    Solver(SolverError),
}

impl std::error::Error for SubsetError {}

impl From<SolverError> for SubsetError {
    fn from(e: SolverError) -> Self {
        SubsetError::Solver(e)
    }
}

/// The candidates kept by a [`SubsetSelector`]
#[derive(Debug, Clone)]
pub struct Selection {
    /// Indices of the selected candidates, in increasing order
    pub candidates: Vec<usize>,
    pub objective: f64,
    pub status: Status,
    pub gap: Option<f64>,
}

/// Chooses exactly `size` candidate sites such that the cost of serving every customer
/// from its cheapest selected site is minimal.
pub struct SubsetSelector {
    pub model: Model,
    pub vars: Variables,
}

impl SubsetSelector {
    /// Relative gap and time limit used when nothing else is specified
    pub fn default_termination() -> Termination {
        Termination::Gap(0.05).any(Termination::Timeout(Duration::from_secs(300)))
    }

    /// `costs[[j, i]]` is the cost of serving customer `i` from candidate `j`
    pub fn new(costs: &Array2<f64>, size: usize) -> Result<SubsetSelector, SubsetError> {
        let (candidates, customers) = costs.dim();
        if size == 0 || size > candidates {
            return Err(SubsetError::InvalidSize { size, candidates });
        }

        info!(
            "Building subset selection model: {} of {} candidates for {} customers",
            size, candidates, customers
        );

        let mut model = Model::new(&format!("select {size} of {candidates} sites"));
        let vars = Variables {
            assign: (customers, candidates).binary(&mut model, "assign")?,
            open: candidates.binary(&mut model, "open")?,
        };

        Self::assignment_constraints(&mut model, &vars.assign);
        Self::open_constraints(&mut model, &vars.assign, &vars.open);
        Self::cardinality_constraint(&mut model, &vars.open, size);

        let objective = iproduct!(0..customers, 0..candidates)
            .map(|(i, j)| costs[[j, i]] * vars.assign[i][j])
            .sum();
        model.set_objective(objective);

        Ok(SubsetSelector { model, vars })
    }

    /// Every customer is assigned to exactly one candidate
    fn assignment_constraints(model: &mut Model, assign: &[Vec<Variable>]) {
        for (i, row) in assign.iter().enumerate() {
            let assigned = row.iter().copied().sum::<Expression>();
            model.add_constr(&format!("assign_{i}"), constraint!(assigned == 1.0));
        }
    }

    /// Customers can only be assigned to selected candidates
    fn open_constraints(model: &mut Model, assign: &[Vec<Variable>], open: &[Variable]) {
        for (i, row) in assign.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                model.add_constr(&format!("open_{i}_{j}"), constraint!(x <= open[j]));
            }
        }
    }

    /// Exactly `size` candidates are selected
    fn cardinality_constraint(model: &mut Model, open: &[Variable], size: usize) {
        let selected = open.iter().copied().sum::<Expression>();
        model.add_constr("cardinality", constraint!(selected == size as f64));
    }

    /// Only an optimal or a feasible selection can be used, there is no fallback
    fn check(status: Status, gap: Option<f64>) -> Result<(), SubsetError> {
        match status {
            Status::Optimal => Ok(()),
            Status::Feasible => {
                warn!("Subset selection stopped early, using the incumbent ({:?} gap)", gap);
                Ok(())
            }
            _ => Err(SubsetError::Unsolved(status)),
        }
    }

    pub fn solve(self, termination: &Termination) -> Result<Selection, SubsetError> {
        let solution = self.model.optimize(termination)?;
        let status = solution.status();
        Self::check(status, solution.gap())?;
        let objective = solution.objective().ok_or(SubsetError::Unsolved(status))?;

        let candidates = self
            .vars
            .open
            .convert(&solution)
            .into_iter()
            .enumerate()
            .filter(|&(_, open)| open > 0.5)
            .map(|(j, _)| j)
            .collect::<Vec<_>>();

        Ok(Selection {
            candidates,
            objective,
            status,
            gap: solution.gap(),
        })
    }
}
