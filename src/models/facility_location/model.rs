use super::sets_and_parameters::{Balance, DemandPolicy, ModelOptions, Parameters, Sets};
use crate::models::utils::{AddVars, ConvertVars};
use crate::solver::{Model, SolverError, Status, VarType};
use crate::termination::Termination;
use good_lp::{constraint, Expression, Variable};
use itertools::iproduct;
use log::info;
use serde::Serialize;

type Vars5 = Vec<Vec<Vec<Vec<Vec<Variable>>>>>;
type Values5 = Vec<Vec<Vec<Vec<Vec<f64>>>>>;

pub struct Variables {
    /// x[i][j][t][p][s]: customer i is served product p by warehouse j in period t under scenario s
    pub x: Vars5,
    /// y[j][t]: warehouse j is open in period t
    pub y: Vec<Vec<Variable>>,
    /// z[k][j][t][p][s]: fraction of the capacity of supplier k shipped to warehouse j
    pub z: Vars5,
}

/// The objective split into its components
pub struct CostExprs {
    pub setup: Expression,
    pub operating: Vec<Expression>,
    pub supply: Vec<Expression>,
    pub delivery: Vec<Expression>,
}

impl CostExprs {
    pub fn total(&self) -> Expression {
        let mut total = self.setup.clone();
        for e in self.operating.iter().chain(&self.supply).chain(&self.delivery) {
            total += e.clone();
        }
        total
    }
}

pub struct FacilityLocationSolver {}

#[allow(non_snake_case)]
impl FacilityLocationSolver {
    /// builds the facility location model
    pub fn build(
        sets: &Sets,
        parameters: &Parameters,
        options: &ModelOptions,
    ) -> Result<(Model, Variables), SolverError> {
        info!(
            "Building {} facility location model with {} customers, {} sites, {} periods and {} scenarios",
            options.variant,
            sets.I.len(),
            sets.J.len(),
            sets.T.len(),
            sets.S.len()
        );

        let mut model = Model::new(&format!("{}_facility_location", options.variant));

        //*************CREATE VARIABLES*************//
        let I = sets.I.len();
        let J = sets.J.len();
        let K = sets.K.len();
        let T = sets.T.len();
        let P = sets.P.len();
        let S = sets.S.len();

        // 1 if customer i gets product p from warehouse j in period t under scenario s
        let x: Vars5 = (I, J, T, P, S).binary(&mut model, "x")?;

        // 1 if warehouse j is open in period t
        let y: Vec<Vec<Variable>> = (J, T).binary(&mut model, "y")?;

        // fraction of supplier k's capacity of product p routed to warehouse j, zero unless k supplies p
        let z: Vars5 = (K, J, T, P, S).vars_with(|(k, j, t, p, s)| {
            let ub = match parameters.group[k] == p {
                true => 1.0,
                false => 0.0,
            };
            model.add_var(&format!("z_{k}_{j}_{t}_{p}_{s}"), VarType::Continuous, 0.0, ub)
        })?;

        // ******************** ADD CONSTRAINTS ********************
        // customers can only be served by open warehouses
        for (i, j, t, p, s) in iproduct!(&sets.I, &sets.J, &sets.T, &sets.P, &sets.S) {
            model.add_constr(
                &format!("serve_open_{i}_{j}_{t}_{p}_{s}"),
                constraint!(x[*i][*j][*t][*p][*s] <= y[*j][*t]),
            );
        }

        // an opened warehouse stays open
        for (j, t) in iproduct!(&sets.J, &sets.T[..T.saturating_sub(1)]) {
            model.add_constr(&format!("stay_open_{j}_{t}"), constraint!(y[*j][*t] <= y[*j][t + 1]));
        }

        // demand satisfaction
        match options.demand_policy {
            DemandPolicy::AggregateSufficiency => {
                for s in &sets.S {
                    let served = iproduct!(&sets.I, &sets.J, &sets.T, &sets.P)
                        .map(|(i, j, t, p)| parameters.D[[*i, *p, *t, *s]] * x[*i][*j][*t][*p][*s])
                        .sum::<Expression>();
                    let total = iproduct!(&sets.I, &sets.T, &sets.P)
                        .map(|(i, t, p)| parameters.D[[*i, *p, *t, *s]])
                        .sum::<f64>();
                    model.add_constr(&format!("demand_{s}"), constraint!(served >= total));
                }
            }
            DemandPolicy::SingleSource => {
                for (i, t, p, s) in iproduct!(&sets.I, &sets.T, &sets.P, &sets.S) {
                    let lhs = sets.J.iter().map(|j| x[*i][*j][*t][*p][*s]).sum::<Expression>();
                    model.add_constr(&format!("single_source_{i}_{t}_{p}_{s}"), constraint!(lhs == 1.0));
                }
            }
        }

        // a supplier cannot ship more than its capacity
        for (k, t, p, s) in iproduct!(&sets.K, &sets.T, &sets.P, &sets.S) {
            let lhs = sets.J.iter().map(|j| z[*k][*j][*t][*p][*s]).sum::<Expression>();
            model.add_constr(&format!("supplier_capacity_{k}_{t}_{p}_{s}"), constraint!(lhs <= 1.0));
        }

        for (j, t, s) in iproduct!(&sets.J, &sets.T, &sets.S) {
            let inbound = || {
                iproduct!(&sets.K, &sets.P)
                    .map(|(k, p)| parameters.Q_supplier[*k] * z[*k][*j][*t][*p][*s])
                    .sum::<Expression>()
            };
            let outbound = iproduct!(&sets.I, &sets.P)
                .map(|(i, p)| parameters.D[[*i, *p, *t, *s]] * x[*i][*j][*t][*p][*s])
                .sum::<Expression>();

            // what is delivered from a warehouse must have been supplied to it
            let balance = match options.balance {
                Balance::AtLeast => constraint!(inbound() >= outbound),
                Balance::Exact => constraint!(inbound() == outbound),
            };
            model.add_constr(&format!("balance_{j}_{t}_{s}"), balance);

            // warehouse throughput
            model.add_constr(
                &format!("warehouse_capacity_{j}_{t}_{s}"),
                constraint!(inbound() <= parameters.Q_warehouse[*j]),
            );
        }

        if options.supply_requires_open {
            for (k, j, t, p, s) in iproduct!(&sets.K, &sets.J, &sets.T, &sets.P, &sets.S) {
                if parameters.group[*k] != *p {
                    continue;
                }
                model.add_constr(
                    &format!("supply_open_{k}_{j}_{t}_{p}_{s}"),
                    constraint!(z[*k][*j][*t][*p][*s] <= y[*j][*t]),
                );
            }
        }

        if let Some(max_open) = parameters.max_open {
            for t in &sets.T {
                let open = sets.J.iter().map(|j| y[*j][*t]).sum::<Expression>();
                model.add_constr(&format!("max_open_{t}"), constraint!(open <= max_open as f64));
            }
        }

        let vars = Variables { x, y, z };
        model.set_objective(Self::costs(sets, parameters, &vars).total());

        info!(
            "Successfully built facility location model with {} variables and {} constraints",
            model.num_vars(),
            model.num_constrs()
        );
        Ok((model, vars))
    }

    /// The cost components of the objective
    pub fn costs(sets: &Sets, parameters: &Parameters, vars: &Variables) -> CostExprs {
        let Variables { x, y, z } = vars;

        // setup is paid once for every warehouse open at the end of the horizon
        let setup = match sets.T.last() {
            Some(&last) => sets.J.iter().map(|j| parameters.C_setup[*j] * y[*j][last]).sum::<Expression>(),
            None => Expression::default(),
        };

        let operating = sets
            .T
            .iter()
            .map(|t| sets.J.iter().map(|j| parameters.C_operating[*j] * y[*j][*t]).sum::<Expression>())
            .collect();

        let supply = sets
            .T
            .iter()
            .map(|t| {
                iproduct!(&sets.K, &sets.J, &sets.P, &sets.S)
                    .filter(|(k, _, p, _)| parameters.group[**k] == **p)
                    .map(|(k, j, p, s)| {
                        let coeff = parameters.pi[*s] * parameters.C_supply[[*k, *j]] * parameters.Q_supplier[*k];
                        coeff * z[*k][*j][*t][*p][*s]
                    })
                    .sum::<Expression>()
            })
            .collect();

        let delivery = sets
            .T
            .iter()
            .map(|t| {
                iproduct!(&sets.I, &sets.J, &sets.P, &sets.S)
                    .map(|(i, j, p, s)| {
                        let coeff = parameters.pi[*s] * parameters.C_delivery[[*j, *i]] * parameters.D[[*i, *p, *t, *s]];
                        coeff * x[*i][*j][*t][*p][*s]
                    })
                    .sum::<Expression>()
            })
            .collect();

        CostExprs {
            setup,
            operating,
            supply,
            delivery,
        }
    }

    pub fn solve(
        sets: &Sets,
        parameters: &Parameters,
        options: &ModelOptions,
        termination: &Termination,
        verbose: bool,
    ) -> Result<FacilityLocationResult, SolverError> {
        // build model
        let (mut model, vars) = FacilityLocationSolver::build(sets, parameters, options)?;
        model.set_verbose(verbose);

        // optimize model
        let solution = model.optimize(termination)?;
        let costs = Self::costs(sets, parameters, &vars);

        let has_solution = solution.status().has_solution();
        let breakdown = match has_solution {
            true => Some(CostBreakdown {
                setup: solution.eval(&costs.setup),
                operating: costs.operating.iter().map(|e| solution.eval(e)).collect(),
                supply: costs.supply.iter().map(|e| solution.eval(e)).collect(),
                delivery: costs.delivery.iter().map(|e| solution.eval(e)).collect(),
            }),
            false => None,
        };

        Ok(FacilityLocationResult {
            status: solution.status(),
            objective: solution.objective(),
            bound: solution.bound(),
            gap: solution.gap(),
            x: match has_solution {
                true => vars.x.convert(&solution),
                false => Vec::new(),
            },
            y: match has_solution {
                true => vars.y.convert(&solution),
                false => Vec::new(),
            },
            z: match has_solution {
                true => vars.z.convert(&solution),
                false => Vec::new(),
            },
            costs: breakdown,
        })
    }
}

/// Objective components of a solution, per period where applicable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub setup: f64,
    pub operating: Vec<f64>,
    pub supply: Vec<f64>,
    pub delivery: Vec<f64>,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.setup
            + self.operating.iter().sum::<f64>()
            + self.supply.iter().sum::<f64>()
            + self.delivery.iter().sum::<f64>()
    }
}

#[derive(Debug, Clone)]
pub struct FacilityLocationResult {
    pub status: Status,
    pub objective: Option<f64>,
    pub bound: Option<f64>,
    pub gap: Option<f64>,
    /// x[i][j][t][p][s], empty if there is no solution
    pub x: Values5,
    /// y[j][t], empty if there is no solution
    pub y: Vec<Vec<f64>>,
    /// z[k][j][t][p][s], empty if there is no solution
    pub z: Values5,
    pub costs: Option<CostBreakdown>,
}

impl FacilityLocationResult {
    pub fn is_open(&self, j: usize, t: usize) -> bool {
        self.y.get(j).and_then(|y| y.get(t)).map_or(false, |&v| v > 0.5)
    }

    /// The warehouses open in period t
    pub fn open_sites(&self, t: usize) -> Vec<usize> {
        (0..self.y.len()).filter(|&j| self.is_open(j, t)).collect()
    }

    /// The warehouse serving customer i with product p in period t under scenario s
    pub fn server(&self, i: usize, t: usize, p: usize, s: usize) -> Option<usize> {
        self.x
            .get(i)?
            .iter()
            .position(|x| x.get(t).and_then(|x| x.get(p)).and_then(|x| x.get(s)).map_or(false, |&v| v > 0.5))
    }

    /// The quantity received by warehouse j in period t under scenario s
    pub fn inbound(&self, parameters: &Parameters, j: usize, t: usize, s: usize) -> f64 {
        self.z
            .iter()
            .enumerate()
            .map(|(k, z)| z[j][t].iter().map(|by_product| by_product[s]).sum::<f64>() * parameters.Q_supplier[k])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::{TransportCosts, VehicleType};
    use crate::geo::GridRef;
    use crate::models::facility_location::Variant;
    use crate::problem::tests::small_instance;
    use crate::problem::{Candidate, PeriodDemand, Problem, ProblemData, ScenarioDemand, Supplier};
    use crate::reduction::Reduction;
    use std::time::Duration;

    fn setup(data: ProblemData, options: &ModelOptions) -> (Sets, Parameters) {
        let problem = Problem::new(data).unwrap();
        let costs = TransportCosts::new(&problem).unwrap();
        let reduction = Reduction::full(&problem, &costs, options.variant.demand(&problem, None));
        let sets = Sets::new(&problem, &reduction);
        let parameters = Parameters::new(&problem, &reduction, &costs, options);
        (sets, parameters)
    }

    fn solve(data: ProblemData, options: &ModelOptions) -> (Sets, Parameters, FacilityLocationResult) {
        let (sets, parameters) = setup(data, options);
        let result = FacilityLocationSolver::solve(&sets, &parameters, options, &Termination::Never, false).unwrap();
        (sets, parameters, result)
    }

    /// Recomputes the objective from the solution values and the raw parameters
    fn recompute(sets: &Sets, parameters: &Parameters, result: &FacilityLocationResult) -> f64 {
        let last = *sets.T.last().unwrap();
        let setup: f64 = sets.J.iter().map(|&j| parameters.C_setup[j] * result.y[j][last]).sum();
        let operating: f64 = iproduct!(&sets.J, &sets.T)
            .map(|(&j, &t)| parameters.C_operating[j] * result.y[j][t])
            .sum();
        let supply: f64 = iproduct!(&sets.K, &sets.J, &sets.T, &sets.P, &sets.S)
            .map(|(&k, &j, &t, &p, &s)| {
                parameters.pi[s] * parameters.C_supply[[k, j]] * parameters.Q_supplier[k] * result.z[k][j][t][p][s]
            })
            .sum();
        let delivery: f64 = iproduct!(&sets.I, &sets.J, &sets.T, &sets.P, &sets.S)
            .map(|(&i, &j, &t, &p, &s)| {
                parameters.pi[s] * parameters.C_delivery[[j, i]] * parameters.D[[i, p, t, s]] * result.x[i][j][t][p][s]
            })
            .sum();
        setup + operating + supply + delivery
    }

    fn check_invariants(sets: &Sets, parameters: &Parameters, result: &FacilityLocationResult, options: &ModelOptions) {
        const EPS: f64 = 1e-6;
        // open warehouses stay open
        for (&j, &t) in iproduct!(&sets.J, &sets.T[..sets.T.len() - 1]) {
            assert!(result.y[j][t] <= result.y[j][t + 1] + EPS);
        }
        for (&i, &j, &t, &p, &s) in iproduct!(&sets.I, &sets.J, &sets.T, &sets.P, &sets.S) {
            assert!(result.x[i][j][t][p][s] <= result.y[j][t] + EPS);
        }
        // suppliers only ship their own product
        for (&k, &j, &t, &p, &s) in iproduct!(&sets.K, &sets.J, &sets.T, &sets.P, &sets.S) {
            if parameters.group[k] != p {
                assert!(result.z[k][j][t][p][s].abs() < EPS);
            }
        }
        for (&j, &t, &s) in iproduct!(&sets.J, &sets.T, &sets.S) {
            let inbound = result.inbound(parameters, j, t, s);
            let outbound: f64 = iproduct!(&sets.I, &sets.P)
                .map(|(&i, &p)| parameters.D[[i, p, t, s]] * result.x[i][j][t][p][s])
                .sum();
            assert!(inbound <= parameters.Q_warehouse[j] + EPS);
            match options.balance {
                Balance::AtLeast => assert!(inbound + EPS >= outbound),
                Balance::Exact => assert!((inbound - outbound).abs() < EPS),
            }
        }
        if options.demand_policy == DemandPolicy::SingleSource {
            for (&i, &t, &p, &s) in iproduct!(&sets.I, &sets.T, &sets.P, &sets.S) {
                let served: f64 = sets.J.iter().map(|&j| result.x[i][j][t][p][s]).sum();
                assert!((served - 1.0).abs() < EPS);
            }
        }
    }

    #[test]
    fn small_scenario_single_source() {
        let mut options = ModelOptions::new(Variant::MultiPeriod);
        options.demand_policy = DemandPolicy::SingleSource;
        let (sets, parameters, result) = solve(small_instance(), &options);

        assert_eq!(result.status, Status::Optimal);
        check_invariants(&sets, &parameters, &result, &options);

        // one site suffices; the total demand of 60 fits both the supplier and either site
        assert_eq!(result.open_sites(0).len(), 1);
        let objective = result.objective.unwrap();
        assert!((objective - recompute(&sets, &parameters, &result)).abs() < 1e-6);
        assert!((objective - result.costs.as_ref().unwrap().total()).abs() < 1e-6);

        // inbound matches the 60 units delivered, and every customer is served
        let j = result.open_sites(0)[0];
        assert!((result.inbound(&parameters, j, 0, 0) - 60.0).abs() < 1e-6);
        for i in 0..3 {
            assert_eq!(result.server(i, 0, 0, 0), Some(j));
        }
    }

    #[test]
    fn small_scenario_aggregate_sufficiency() {
        let mut options = ModelOptions::new(Variant::Static);
        options.demand_policy = DemandPolicy::AggregateSufficiency;
        let (sets, parameters, result) = solve(small_instance(), &options);

        assert_eq!(result.status, Status::Optimal);
        check_invariants(&sets, &parameters, &result, &options);

        let served: f64 = iproduct!(&sets.I, &sets.J)
            .map(|(&i, &j)| parameters.D[[i, 0, 0, 0]] * result.x[i][j][0][0][0])
            .sum();
        assert!(served >= 60.0 - 1e-6);
        let objective = result.objective.unwrap();
        assert!((objective - recompute(&sets, &parameters, &result)).abs() < 1e-6);
    }

    #[test]
    fn capacity_forces_a_second_site() {
        let mut data = small_instance();
        data.candidates = vec![
            Candidate::new(10, GridRef::new(410_000.0, 300_000.0), 40.0, 1000.0, 50.0),
            Candidate::new(11, GridRef::new(450_000.0, 320_000.0), 40.0, 800.0, 40.0),
        ];
        let options = ModelOptions::new(Variant::MultiPeriod);
        let (sets, parameters, result) = solve(data, &options);

        assert_eq!(result.status, Status::Optimal);
        check_invariants(&sets, &parameters, &result, &options);
        assert_eq!(result.open_sites(0), vec![0, 1]);
    }

    #[test]
    fn infeasible_when_supply_is_short() {
        let mut data = small_instance();
        data.suppliers = vec![Supplier::new(1, GridRef::new(400_000.0, 300_000.0), VehicleType::TRUCK, 1, 50.0)];
        let options = ModelOptions::new(Variant::MultiPeriod);
        let (_, _, result) = solve(data, &options);

        assert_eq!(result.status, Status::Infeasible);
        assert!(result.objective.is_none());
        assert!(result.costs.is_none());
        assert!(result.open_sites(0).is_empty());
    }

    #[test]
    fn stochastic_scenarios_are_served_separately() {
        let mut data = small_instance();
        data.scenario_demand.extend([
            ScenarioDemand { customer: 10, product: 1, period: 1, scenario: 2, quantity: 10.0 },
            ScenarioDemand { customer: 30, product: 1, period: 1, scenario: 2, quantity: 50.0 },
            ScenarioDemand { customer: 20, product: 1, period: 1, scenario: 2, quantity: 40.0 },
        ]);
        let options = ModelOptions::new(Variant::Stochastic);
        let (sets, parameters, result) = solve(data, &options);

        assert_eq!(sets.S.len(), 2);
        assert_eq!(parameters.pi, vec![0.5, 0.5]);
        assert_eq!(result.status, Status::Optimal);
        check_invariants(&sets, &parameters, &result, &options);
        // exactly one server per customer and scenario
        for (&i, &s) in iproduct!(&sets.I, &sets.S) {
            assert!(result.server(i, 0, 0, s).is_some());
        }
        // the supplier only ships to open warehouses
        for (&j, &s) in iproduct!(&sets.J, &sets.S) {
            if !result.is_open(j, 0) {
                assert!(result.inbound(&parameters, j, 0, s) < 1e-6);
            }
        }
        let objective = result.objective.unwrap();
        assert!((objective - recompute(&sets, &parameters, &result)).abs() < 1e-6);
    }

    #[test]
    fn incompatible_products_are_bounded_to_zero() {
        let mut data = small_instance();
        data.products = 2;
        let options = ModelOptions::new(Variant::MultiPeriod);
        let (sets, parameters) = setup(data, &options);
        let (model, vars) = FacilityLocationSolver::build(&sets, &parameters, &options).unwrap();

        let solution = model.optimize(&Termination::Never).unwrap();
        assert_eq!(solution.status(), Status::Optimal);
        for (&j, &s) in iproduct!(&sets.J, &sets.S) {
            assert!(solution.value(vars.z[0][j][0][1][s]).abs() < 1e-9);
        }
    }

    #[test]
    fn multi_period_monotonic_opening() {
        let mut data = small_instance();
        data.period_demand.extend([
            PeriodDemand { customer: 10, product: 1, period: 2, quantity: 30.0 },
            PeriodDemand { customer: 30, product: 1, period: 2, quantity: 60.0 },
        ]);
        let mut options = ModelOptions::new(Variant::MultiPeriod);
        options.demand_policy = DemandPolicy::SingleSource;
        let (sets, parameters, result) = solve(data, &options);

        assert_eq!(sets.T.len(), 2);
        assert_eq!(result.status, Status::Optimal);
        check_invariants(&sets, &parameters, &result, &options);
        let costs = result.costs.as_ref().unwrap();
        assert_eq!(costs.operating.len(), 2);
        assert!((result.objective.unwrap() - costs.total()).abs() < 1e-6);
    }

    #[test]
    fn cardinality_cap_limits_open_sites() {
        // without fixed costs both sites are worth opening: customer 30 is next to the far site
        let mut data = small_instance();
        data.candidates = vec![
            Candidate::new(10, GridRef::new(410_000.0, 300_000.0), 100.0, 0.0, 0.0),
            Candidate::new(11, GridRef::new(450_000.0, 320_000.0), 100.0, 0.0, 0.0),
        ];
        let mut options = ModelOptions::new(Variant::MultiPeriod);
        let (_, parameters, free) = solve(data.clone(), &options);
        assert_eq!(parameters.max_open, None);
        assert_eq!(free.status, Status::Optimal);
        assert_eq!(free.open_sites(0), vec![0, 1]);
        assert_eq!(free.server(2, 0, 0, 0), Some(1));

        options.cardinality_threshold = Some(1);
        let (sets, parameters, capped) = solve(data, &options);
        assert_eq!(parameters.max_open, Some(1));
        assert_eq!(capped.status, Status::Optimal);
        check_invariants(&sets, &parameters, &capped, &options);
        assert_eq!(capped.open_sites(0), vec![0]);
        assert!(capped.objective.unwrap() > free.objective.unwrap() + 1e-6);
    }

    #[test]
    fn stopping_early_keeps_status_and_result_consistent() {
        let mut data = small_instance();
        data.scenario_demand.extend([
            ScenarioDemand { customer: 10, product: 1, period: 1, scenario: 2, quantity: 10.0 },
            ScenarioDemand { customer: 30, product: 1, period: 1, scenario: 2, quantity: 50.0 },
            ScenarioDemand { customer: 20, product: 1, period: 1, scenario: 2, quantity: 40.0 },
        ]);
        let options = ModelOptions::new(Variant::Stochastic);
        let (sets, parameters) = setup(data, &options);
        let termination = Termination::Timeout(Duration::ZERO);
        let result = FacilityLocationSolver::solve(&sets, &parameters, &options, &termination, false).unwrap();

        match result.status {
            Status::Optimal | Status::Feasible => {
                check_invariants(&sets, &parameters, &result, &options);
                let objective = result.objective.unwrap();
                assert!((objective - result.costs.as_ref().unwrap().total()).abs() < 1e-6);
                assert!(result.bound.unwrap() <= objective + 1e-9);
                assert!(result.gap.unwrap() >= 0.0);
            }
            Status::NoSolution => {
                assert!(result.objective.is_none());
                assert!(result.costs.is_none());
                assert!(result.gap.is_none());
                assert!(result.open_sites(0).is_empty());
            }
            status => panic!("unexpected status {status}"),
        }
    }
}
