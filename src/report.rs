//! Human-readable and JSON summaries of a solved facility location model.

use std::fmt::{self, Display};
use std::path::Path;

use itertools::iproduct;
use log::info;
use serde::Serialize;

use crate::{
    clustering::Clustering,
    costs::TransportCosts,
    models::facility_location::{CostBreakdown, FacilityLocationResult, ModelOptions, Parameters, Variant},
    problem::{Id, Problem},
    reduction::Reduction,
    solver::Status,
    Error,
};

/// The line printed after every solve, e.g. `Optimal solution found. Objval: 1234.50, MIP Gap: 0.01%`
pub fn status_line(status: Status, objective: Option<f64>, gap: Option<f64>) -> String {
    let head = match status {
        Status::Optimal => "Optimal solution found",
        Status::Feasible => "Feasible solution (not proven optimal)",
        Status::Infeasible => "Model is infeasible",
        Status::Unbounded => "Model is unbounded",
        Status::InfeasibleOrUnbounded => "Model is infeasible or unbounded",
        Status::NoSolution => "No solution found",
    };
    match (objective, gap) {
        (Some(obj), Some(gap)) => format!("{head}. Objval: {obj:.2}, MIP Gap: {:.2}%", 100.0 * gap),
        (Some(obj), None) => format!("{head}. Objval: {obj:.2}, MIP Gap: unknown"),
        _ => head.to_string(),
    }
}

/// A customer served from a warehouse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub customer: Id,
    /// 1-based product group
    pub product: usize,
    /// 1-based scenario
    pub scenario: usize,
    pub warehouse: Id,
    pub quantity: f64,
}

/// Stock shipped from a supplier to a warehouse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyFlow {
    pub supplier: Id,
    pub warehouse: Id,
    pub product: usize,
    pub scenario: usize,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    /// 1-based period
    pub period: usize,
    pub open: Vec<Id>,
    pub operating_cost: f64,
    pub supply_cost: f64,
    pub delivery_cost: f64,
    /// Expected kg CO2 over the scenarios
    pub emissions: f64,
    pub assignments: Vec<Assignment>,
    pub supply: Vec<SupplyFlow>,
}

/// Everything worth keeping from one run, written as JSON with `--output`
#[derive(Debug, Clone, Serialize)]
pub struct SolutionSummary {
    pub name: String,
    pub variant: Variant,
    pub status: Status,
    pub objective: Option<f64>,
    pub bound: Option<f64>,
    pub gap: Option<f64>,
    pub costs: Option<CostBreakdown>,
    pub periods: Vec<PeriodSummary>,
}

const ACTIVE: f64 = 1e-6;

impl SolutionSummary {
    pub fn new(
        name: &str,
        problem: &Problem,
        reduction: &Reduction,
        costs: &TransportCosts,
        parameters: &Parameters,
        options: &ModelOptions,
        result: &FacilityLocationResult,
    ) -> SolutionSummary {
        let (customers, products, periods, scenarios) = parameters.D.dim();
        let sites = reduction.candidates();
        let site_id = |j: usize| problem.candidates()[sites[j]].id();
        let customer_id = |i: usize| problem.customers()[reduction.customers()[i]].id();

        let summaries = match (&result.costs, result.status.has_solution()) {
            (Some(breakdown), true) => (0..periods)
                .map(|t| {
                    let mut assignments = Vec::new();
                    let mut supply = Vec::new();
                    let mut emissions = 0.0;

                    for (i, j, p, s) in iproduct!(0..customers, 0..sites.len(), 0..products, 0..scenarios) {
                        let quantity = parameters.D[[i, p, t, s]];
                        if result.x[i][j][t][p][s] > 0.5 {
                            assignments.push(Assignment {
                                customer: customer_id(i),
                                product: p + 1,
                                scenario: s + 1,
                                warehouse: site_id(j),
                                quantity,
                            });
                            let rate = costs.delivery_emissions()[[sites[j], reduction.customers()[i]]];
                            emissions += parameters.pi[s] * rate * quantity;
                        }
                    }

                    for (k, j, s) in iproduct!(0..parameters.Q_supplier.len(), 0..sites.len(), 0..scenarios) {
                        let p = parameters.group[k];
                        let quantity = parameters.Q_supplier[k] * result.z[k][j][t][p][s];
                        if quantity > ACTIVE {
                            supply.push(SupplyFlow {
                                supplier: problem.suppliers()[k].id(),
                                warehouse: site_id(j),
                                product: p + 1,
                                scenario: s + 1,
                                quantity,
                            });
                            emissions += parameters.pi[s] * costs.supply_emissions()[[k, sites[j]]] * quantity;
                        }
                    }

                    PeriodSummary {
                        period: t + 1,
                        open: result.open_sites(t).into_iter().map(site_id).collect(),
                        operating_cost: breakdown.operating[t],
                        supply_cost: breakdown.supply[t],
                        delivery_cost: breakdown.delivery[t],
                        emissions,
                        assignments,
                        supply,
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        SolutionSummary {
            name: name.to_string(),
            variant: options.variant,
            status: result.status,
            objective: result.objective,
            bound: result.bound,
            gap: result.gap,
            costs: result.costs.clone(),
            periods: summaries,
        }
    }

    pub fn status_line(&self) -> String {
        status_line(self.status, self.objective, self.gap)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        info!("Wrote solution summary to {}", path.as_ref().display());
        Ok(())
    }
}

/// Per-period cost table
impl Display for SolutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status_line())?;
        if let Some(costs) = &self.costs {
            writeln!(f, "Setup cost: {:.2}", costs.setup)?;
        }
        writeln!(
            f,
            "{:>6} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "period", "open", "operating", "supply", "delivery", "total", "kg CO2"
        )?;
        for p in &self.periods {
            writeln!(
                f,
                "{:>6} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                p.period,
                p.open.len(),
                p.operating_cost,
                p.supply_cost,
                p.delivery_cost,
                p.operating_cost + p.supply_cost + p.delivery_cost,
                p.emissions
            )?;
        }
        if let Some(costs) = &self.costs {
            write!(f, "Total: {:.2}", costs.total())?;
        }
        Ok(())
    }
}

/// One cluster of a `depot cluster` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub center: Id,
    pub members: usize,
    pub demand: f64,
}

/// Describes every cluster by the id of its center, its size and its total demand
pub fn cluster_summary(problem: &Problem, clustering: &Clustering) -> Vec<ClusterSummary> {
    clustering
        .centers()
        .iter_enumerated()
        .map(|(c, &center)| ClusterSummary {
            center: problem.customers()[center].id(),
            members: clustering.members(c).len(),
            demand: clustering
                .members(c)
                .iter()
                .map(|&i| problem.demand().row(i).sum())
                .sum(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::KMeansConfig;
    use crate::models::facility_location::{FacilityLocationSolver, Sets};
    use crate::problem::tests::small_instance;
    use crate::termination::Termination;

    #[test]
    fn status_lines() {
        assert_eq!(
            status_line(Status::Optimal, Some(1234.5), Some(0.0001)),
            "Optimal solution found. Objval: 1234.50, MIP Gap: 0.01%"
        );
        assert_eq!(
            status_line(Status::Feasible, Some(10.0), Some(0.125)),
            "Feasible solution (not proven optimal). Objval: 10.00, MIP Gap: 12.50%"
        );
        assert_eq!(status_line(Status::Infeasible, None, None), "Model is infeasible");
        assert_eq!(
            status_line(Status::InfeasibleOrUnbounded, None, None),
            "Model is infeasible or unbounded"
        );
    }

    #[test]
    fn summarises_small_instance() {
        let problem = Problem::new(small_instance()).unwrap();
        let costs = TransportCosts::new(&problem).unwrap();
        let options = ModelOptions::new(Variant::MultiPeriod);
        let reduction = Reduction::full(&problem, &costs, options.variant.demand(&problem, None));
        let sets = Sets::new(&problem, &reduction);
        let parameters = Parameters::new(&problem, &reduction, &costs, &options);
        let result = FacilityLocationSolver::solve(&sets, &parameters, &options, &Termination::Never, false).unwrap();

        let summary = SolutionSummary::new("small", &problem, &reduction, &costs, &parameters, &options, &result);
        assert_eq!(summary.status, Status::Optimal);
        assert_eq!(summary.periods.len(), 1);

        let period = &summary.periods[0];
        assert_eq!(period.open.len(), 1);
        assert_eq!(period.assignments.len(), 3);
        assert!(period.assignments.iter().all(|a| a.warehouse == period.open[0]));
        let shipped: f64 = period.supply.iter().map(|f| f.quantity).sum();
        assert!((shipped - 60.0).abs() < 1e-6);
        assert!(period.emissions > 0.0);

        let table = summary.to_string();
        assert!(table.starts_with("Optimal solution found"));
        assert!(table.contains("Total:"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "optimal");
        assert_eq!(json["variant"], "multi-period");
    }

    #[test]
    fn summarises_clusters() {
        let problem = Problem::new(small_instance()).unwrap();
        let points = problem.customers().iter().map(|c| c.location().to_wgs84()).collect::<Vec<_>>();
        let weights = problem.demand().rows().into_iter().map(|r| r.sum()).collect::<Vec<_>>();
        let clustering = Clustering::new(&points, &weights, &KMeansConfig::new(2)).unwrap();

        let summary = cluster_summary(&problem, &clustering);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.iter().map(|c| c.members).sum::<usize>(), 3);
        assert!((summary.iter().map(|c| c.demand).sum::<f64>() - 60.0).abs() < 1e-9);
    }
}
