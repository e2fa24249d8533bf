//! Mixed-integer models built with `good_lp` and solved by HiGHS.
//!
//! Variables, expressions and constraints are plain `good_lp` types. The model is handed to HiGHS
//! through the `good_lp` highs backend, and the status, objective and MIP gap are read back from
//! the solved HiGHS model.

use std::collections::HashMap;
use std::time::Instant;

use derive_more::Display;
use good_lp::{solvers::highs::highs, variable, Constraint, Expression, ProblemVariables, SolverModel, Variable};
use ::highs::HighsModelStatus;
use log::{debug, info, trace};
use serde::Serialize;

use crate::termination::Termination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Binary,
    Integer,
    Continuous,
}

#[derive(Debug, Display)]
pub enum SolverError {
    #[display(fmt = "variable {} has invalid bounds [{}, {}]", name, lb, ub)]
    InvalidBounds { name: String, lb: f64, ub: f64 },
    #[display(fmt = "HiGHS failed: {}", _0)]
    Failed(String),
}

impl std::error::Error for SolverError {}

/// The outcome of an optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[display(fmt = "optimal")]
    Optimal,
    /// A feasible incumbent exists, but optimality was not proven within the termination criteria
    #[display(fmt = "feasible")]
    Feasible,
    #[display(fmt = "infeasible")]
    Infeasible,
    #[display(fmt = "unbounded")]
    Unbounded,
    /// Presolve showed that the model has no optimum without telling which of the two cases it is
    #[display(fmt = "infeasible or unbounded")]
    InfeasibleOrUnbounded,
    /// The solver stopped without finding any feasible solution
    #[display(fmt = "no solution")]
    NoSolution,
}

impl Status {
    pub fn has_solution(self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }

    /// Maps the HiGHS model status. `incumbent` tells whether HiGHS holds a feasible solution,
    /// which decides what an early stop means.
    fn from_highs(status: HighsModelStatus, incumbent: impl FnOnce() -> bool) -> Result<Status, SolverError> {
        match status {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => Ok(Status::Optimal),
            HighsModelStatus::Infeasible => Ok(Status::Infeasible),
            HighsModelStatus::Unbounded => Ok(Status::Unbounded),
            HighsModelStatus::UnboundedOrInfeasible => Ok(Status::InfeasibleOrUnbounded),
            HighsModelStatus::NotSet
            | HighsModelStatus::LoadError
            | HighsModelStatus::ModelError
            | HighsModelStatus::PresolveError
            | HighsModelStatus::SolveError
            | HighsModelStatus::PostsolveError => Err(SolverError::Failed(format!("{:?}", status))),
            // stopped early, typically on the time limit
            _ => match incumbent() {
                true => Ok(Status::Feasible),
                false => Ok(Status::NoSolution),
            },
        }
    }
}

/// A minimization problem over `good_lp` variables
pub struct Model {
    name: String,
    vars: ProblemVariables,
    /// Every variable in the order it was added, which is also its HiGHS column
    columns: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Expression,
    integer: bool,
    verbose: bool,
}

impl Model {
    pub fn new(name: &str) -> Model {
        Model {
            name: name.to_string(),
            vars: ProblemVariables::new(),
            columns: Vec::new(),
            constraints: Vec::new(),
            objective: Expression::default(),
            integer: false,
            verbose: false,
        }
    }

    /// Whether HiGHS should print its own log to stdout
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, lb: f64, ub: f64) -> Result<Variable, SolverError> {
        let (lb, ub) = match vtype {
            VarType::Binary => (lb.max(0.0), ub.min(1.0)),
            VarType::Integer | VarType::Continuous => (lb, ub),
        };
        if lb.is_nan() || ub.is_nan() || lb > ub {
            return Err(SolverError::InvalidBounds {
                name: name.to_string(),
                lb,
                ub,
            });
        }

        let definition = variable().name(name).min(lb).max(ub);
        let var = match vtype {
            VarType::Continuous => self.vars.add(definition),
            VarType::Binary | VarType::Integer => {
                self.integer = true;
                self.vars.add(definition.integer())
            }
        };
        self.columns.push(var);
        Ok(var)
    }

    pub fn add_constr(&mut self, name: &str, constr: Constraint) {
        trace!("adding {}", name);
        self.constraints.push(constr);
    }

    /// Sets the expression to minimize
    pub fn set_objective(&mut self, objective: Expression) {
        self.objective = objective;
    }

    pub fn num_vars(&self) -> usize {
        self.columns.len()
    }

    pub fn num_constrs(&self) -> usize {
        self.constraints.len()
    }

    pub fn optimize(self, termination: &Termination) -> Result<Solution, SolverError> {
        let Model {
            name,
            vars,
            columns,
            constraints,
            objective,
            integer,
            verbose,
        } = self;
        info!(
            "Optimizing {} with {} columns and {} rows ({})",
            name,
            columns.len(),
            constraints.len(),
            termination
        );

        let mut problem = vars.minimise(objective).using(highs);
        for constraint in constraints {
            problem.add_constraint(constraint);
        }

        let mut model = problem.into_inner();
        model.set_option("output_flag", verbose);
        if let Some(limit) = termination.time_limit() {
            model.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(gap) = termination.mip_rel_gap() {
            model.set_option("mip_rel_gap", gap);
        }

        let start = Instant::now();
        let solved = model.solve();
        let highs_status = solved.status();
        debug!("HiGHS returned {:?} for {} after {:?}", highs_status, name, start.elapsed());

        // HiGHS keeps the MIP gap infinite until it has an incumbent
        let status = Status::from_highs(highs_status, || integer && solved.mip_gap().is_finite())?;

        if !status.has_solution() {
            info!("{} ended without a solution: {}", name, status);
            return Ok(Solution {
                status,
                values: HashMap::new(),
                objective: None,
                gap: None,
            });
        }

        let gap = match integer {
            true => Some(solved.mip_gap()).filter(|gap| gap.is_finite()).unwrap_or(0.0),
            false => 0.0,
        };
        let values = columns
            .into_iter()
            .zip(solved.get_solution().columns().iter().copied())
            .collect::<HashMap<_, _>>();
        let solution = Solution {
            status,
            values,
            objective: Some(solved.objective_value()),
            gap: Some(gap),
        };
        info!(
            "{} finished as {} with objective {:.2} (gap {:.2}%)",
            name,
            status,
            solved.objective_value(),
            100.0 * gap
        );
        Ok(solution)
    }
}

/// Values and quality of the result of [`Model::optimize`]
#[derive(Debug, Clone)]
pub struct Solution {
    status: Status,
    values: HashMap<Variable, f64>,
    objective: Option<f64>,
    gap: Option<f64>,
}

impl Solution {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Relative MIP gap reached by HiGHS, `|obj - bound| / |obj|`
    pub fn gap(&self) -> Option<f64> {
        self.gap
    }

    /// Best known lower bound on the optimal objective, derived from the gap
    pub fn bound(&self) -> Option<f64> {
        let (objective, gap) = (self.objective?, self.gap?);
        Some(objective - gap * objective.abs())
    }

    /// The value of `var` in the incumbent, or NaN if there is none
    pub fn value(&self, var: Variable) -> f64 {
        self.values.get(&var).copied().unwrap_or(f64::NAN)
    }

    pub fn eval(&self, expr: &Expression) -> f64 {
        match self.status.has_solution() {
            true => expr.eval_with(&self.values),
            false => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::constraint;
    use std::time::Duration;

    #[test]
    fn solves_small_lp() {
        let mut model = Model::new("lp");
        let x = model.add_var("x", VarType::Continuous, 0.0, 10.0).unwrap();
        let y = model.add_var("y", VarType::Continuous, 0.0, 10.0).unwrap();
        model.add_constr("cover", constraint!(x + y >= 4.0));
        model.add_constr("x_min", constraint!(x >= 1.0));
        model.set_objective(3.0 * x + 2.0 * y);

        let solution = model.optimize(&Termination::Never).unwrap();
        assert_eq!(solution.status(), Status::Optimal);
        assert!((solution.objective().unwrap() - 9.0).abs() < 1e-6);
        assert!((solution.value(x) - 1.0).abs() < 1e-6);
        assert_eq!(solution.gap(), Some(0.0));
    }

    #[test]
    fn solves_small_mip() {
        // pick two of three items with the smallest cost
        let mut model = Model::new("mip");
        let costs = [5.0, 2.0, 3.0];
        let vars = (0..3)
            .map(|i| model.add_var(&format!("pick_{i}"), VarType::Binary, 0.0, 1.0).unwrap())
            .collect::<Vec<_>>();
        let count = vars.iter().copied().sum::<Expression>();
        model.add_constr("count", constraint!(count == 2.0));
        model.set_objective(vars.iter().zip(costs).map(|(&v, c)| c * v).sum());

        let solution = model.optimize(&Termination::Timeout(Duration::from_secs(10))).unwrap();
        assert_eq!(solution.status(), Status::Optimal);
        assert!((solution.objective().unwrap() - 5.0).abs() < 1e-6);
        assert!(solution.value(vars[0]) < 0.5);
        assert!(solution.bound().unwrap() <= solution.objective().unwrap() + 1e-9);
    }

    #[test]
    fn reports_the_gap_reached_by_highs() {
        // cheapest cover of weight 12 costs 15, its LP relaxation 14.25
        let mut model = Model::new("cover");
        let weights = [3.0, 5.0, 7.0, 4.0, 6.0];
        let costs = [4.0, 6.0, 9.0, 5.0, 7.0];
        let vars = (0..weights.len())
            .map(|i| model.add_var(&format!("take_{i}"), VarType::Binary, 0.0, 1.0).unwrap())
            .collect::<Vec<_>>();
        let weight = vars.iter().zip(weights).map(|(&v, w)| w * v).sum::<Expression>();
        model.add_constr("cover", constraint!(weight >= 12.0));
        model.set_objective(vars.iter().zip(costs).map(|(&v, c)| c * v).sum());

        let solution = model.optimize(&Termination::Gap(0.25)).unwrap();
        assert_eq!(solution.status(), Status::Optimal);
        let gap = solution.gap().unwrap();
        assert!(gap >= 0.0 && gap < 0.25);
        let objective = solution.objective().unwrap();
        assert!(objective > 15.0 - 1e-6 && objective < 16.0 + 1e-6);
        let bound = solution.bound().unwrap();
        assert!(bound <= 15.0 + 1e-6);
        assert!((objective - bound - gap * objective).abs() < 1e-9);
    }

    #[test]
    fn reports_infeasibility() {
        let mut model = Model::new("infeasible");
        let x = model.add_var("x", VarType::Integer, 0.0, 3.0).unwrap();
        model.add_constr("too_much", constraint!(x >= 5.0));
        model.set_objective(x.into());

        let solution = model.optimize(&Termination::Never).unwrap();
        assert_eq!(solution.status(), Status::Infeasible);
        assert_eq!(solution.objective(), None);
        assert!(solution.value(x).is_nan());
    }

    #[test]
    fn reports_unboundedness() {
        let mut model = Model::new("unbounded");
        let x = model.add_var("x", VarType::Continuous, 0.0, f64::INFINITY).unwrap();
        let y = model.add_var("y", VarType::Continuous, 0.0, f64::INFINITY).unwrap();
        model.add_constr("spread", constraint!(x - y <= 1.0));
        model.set_objective(-1.0 * x - y);

        let solution = model.optimize(&Termination::Never).unwrap();
        assert!(matches!(
            solution.status(),
            Status::Unbounded | Status::InfeasibleOrUnbounded
        ));
        assert_ne!(solution.status(), Status::Infeasible);
        assert_eq!(solution.objective(), None);
    }

    #[test]
    fn maps_highs_statuses() {
        use HighsModelStatus::*;
        assert_eq!(Status::from_highs(Optimal, || true).unwrap(), Status::Optimal);
        assert_eq!(Status::from_highs(ModelEmpty, || false).unwrap(), Status::Optimal);
        assert_eq!(Status::from_highs(Infeasible, || false).unwrap(), Status::Infeasible);
        assert_eq!(Status::from_highs(Unbounded, || false).unwrap(), Status::Unbounded);
        assert_eq!(
            Status::from_highs(UnboundedOrInfeasible, || false).unwrap(),
            Status::InfeasibleOrUnbounded
        );
        assert_eq!(Status::from_highs(ReachedTimeLimit, || true).unwrap(), Status::Feasible);
        assert_eq!(Status::from_highs(ReachedTimeLimit, || false).unwrap(), Status::NoSolution);
        assert_eq!(Status::from_highs(ReachedIterationLimit, || false).unwrap(), Status::NoSolution);
        assert!(matches!(Status::from_highs(SolveError, || false), Err(SolverError::Failed(_))));
    }

    #[test]
    fn rejects_invalid_bounds() {
        let mut model = Model::new("invalid");
        assert!(model.add_var("x", VarType::Continuous, 2.0, 1.0).is_err());
        assert!(model.add_var("y", VarType::Integer, f64::NAN, 1.0).is_err());
        assert!(model.add_var("z", VarType::Binary, 0.0, 1.0).is_ok());
        assert_eq!(model.num_vars(), 1);
    }
}
