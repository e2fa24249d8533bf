use log::trace;
use ndarray::{Array2, Array4, Axis, Slice};
use serde::{Deserialize, Serialize};

use crate::{
    costs::TransportCosts,
    problem::{
        CandidateIndex, CustomerIndex, PeriodIndex, Problem, ProductIndex, ScenarioIndex, SupplierIndex,
    },
    reduction::Reduction,
};

/// Which demand data drives the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Total demand over the horizon, as a single period
    Static,
    /// Demand per period
    MultiPeriod,
    /// Demand per period under equally likely scenarios
    Stochastic,
}

/// How customer demand must be covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemandPolicy {
    /// The served demand summed over all customers, products and periods covers the total demand
    #[serde(alias = "aggregate")]
    AggregateSufficiency,
    /// Every (customer, product, period) is served by exactly one warehouse
    SingleSource,
}

/// How inbound supply relates to outbound deliveries at a warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Balance {
    /// Inbound supply is at least the outbound deliveries
    AtLeast,
    /// Inbound supply equals the outbound deliveries
    Exact,
}

impl Variant {
    /// The demand table of this variant, indexed by [customer, product, period, scenario].
    ///
    /// `max_scenarios` keeps only the first scenarios of the stochastic table.
    pub fn demand(self, problem: &Problem, max_scenarios: Option<usize>) -> Array4<f64> {
        match self {
            Variant::Static => problem.demand().clone().insert_axis(Axis(2)).insert_axis(Axis(3)),
            Variant::MultiPeriod => problem.period_demand().clone().insert_axis(Axis(3)),
            Variant::Stochastic => {
                let table = problem.scenario_demand();
                let keep = max_scenarios.unwrap_or(usize::MAX).clamp(1, table.len_of(Axis(3)));
                table.slice_axis(Axis(3), Slice::from(0..keep)).to_owned()
            }
        }
    }

    pub fn default_policy(self) -> DemandPolicy {
        match self {
            Variant::Static => DemandPolicy::AggregateSufficiency,
            Variant::MultiPeriod | Variant::Stochastic => DemandPolicy::SingleSource,
        }
    }

    pub fn default_balance(self) -> Balance {
        match self {
            Variant::Static => Balance::AtLeast,
            Variant::MultiPeriod | Variant::Stochastic => Balance::Exact,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Static => write!(f, "static"),
            Variant::MultiPeriod => write!(f, "multi-period"),
            Variant::Stochastic => write!(f, "stochastic"),
        }
    }
}

impl std::fmt::Display for DemandPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemandPolicy::AggregateSufficiency => write!(f, "aggregate"),
            DemandPolicy::SingleSource => write!(f, "single-source"),
        }
    }
}

/// The modelling choices of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub variant: Variant,
    pub demand_policy: DemandPolicy,
    pub balance: Balance,
    /// At most half of the sites may be open when there are more candidates than this
    pub cardinality_threshold: Option<usize>,
    /// Suppliers may only ship to open warehouses
    pub supply_requires_open: bool,
}

impl ModelOptions {
    /// The default options of a variant
    pub fn new(variant: Variant) -> ModelOptions {
        ModelOptions {
            variant,
            demand_policy: variant.default_policy(),
            balance: variant.default_balance(),
            cardinality_threshold: Some(30),
            supply_requires_open: variant == Variant::Stochastic,
        }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions::new(Variant::MultiPeriod)
    }
}

/// sets for the facility location model
#[derive(Debug)]
#[allow(non_snake_case)]
pub struct Sets {
    /// Set of customers
    pub I: Vec<CustomerIndex>,
    /// Set of candidate warehouse sites
    pub J: Vec<CandidateIndex>,
    /// Set of suppliers
    pub K: Vec<SupplierIndex>,
    /// Set of periods
    pub T: Vec<PeriodIndex>,
    /// Set of products
    pub P: Vec<ProductIndex>,
    /// Set of scenarios
    pub S: Vec<ScenarioIndex>,
}

/// parameters for the facility location model
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct Parameters {
    /// Demand of customer i for product p in period t under scenario s, indexed by [i, p, t, s]
    pub D: Array4<f64>,
    /// Capacity of supplier k per period
    pub Q_supplier: Vec<f64>,
    /// The product group of supplier k
    pub group: Vec<ProductIndex>,
    /// Capacity of warehouse j per period
    pub Q_warehouse: Vec<f64>,
    /// One-time cost of opening warehouse j
    pub C_setup: Vec<f64>,
    /// Cost of operating warehouse j for one period
    pub C_operating: Vec<f64>,
    /// Unit transport cost from supplier k to warehouse j, indexed by [k, j]
    pub C_supply: Array2<f64>,
    /// Unit transport cost from warehouse j to customer i, indexed by [j, i]
    pub C_delivery: Array2<f64>,
    /// Probability of scenario s
    pub pi: Vec<f64>,
    /// Upper limit on the number of open warehouses in a period
    pub max_open: Option<usize>,
}

#[allow(non_snake_case)]
impl Sets {
    pub fn new(problem: &Problem, reduction: &Reduction) -> Sets {
        let (I, P, T, S) = reduction.demand().dim();
        Sets {
            I: (0..I).collect(),
            J: (0..reduction.candidates().len()).collect(),
            K: (0..problem.suppliers().len()).collect(),
            T: (0..T).collect(),
            P: (0..P).collect(),
            S: (0..S).collect(),
        }
    }
}

#[allow(non_snake_case)]
impl Parameters {
    pub fn new(problem: &Problem, reduction: &Reduction, costs: &TransportCosts, options: &ModelOptions) -> Parameters {
        let candidates = reduction
            .candidates()
            .iter()
            .map(|&j| &problem.candidates()[j])
            .collect::<Vec<_>>();
        let S = reduction.demand().len_of(Axis(3));
        let J = candidates.len();

        let max_open = options
            .cardinality_threshold
            .filter(|&threshold| J > threshold)
            .map(|_| J / 2);
        trace!("Open warehouse limit: {:?}", max_open);

        Parameters {
            D: reduction.demand().clone(),
            Q_supplier: problem.suppliers().iter().map(|s| s.capacity()).collect(),
            group: problem.suppliers().iter().map(|s| s.product()).collect(),
            Q_warehouse: candidates.iter().map(|c| c.capacity()).collect(),
            C_setup: candidates.iter().map(|c| c.setup_cost()).collect(),
            C_operating: candidates.iter().map(|c| c.operating_cost()).collect(),
            C_supply: costs.supply().select(Axis(1), reduction.candidates()),
            C_delivery: reduction.delivery().clone(),
            pi: vec![1.0 / S as f64; S],
            max_open,
        }
    }
}
