//! Problem size reduction ahead of the facility location model.
//!
//! A [`Reduction`] decides which customers and candidate sites enter the model. Customers may
//! be replaced by the centers of demand-weighted clusters, carrying the demand of all members.
//! Candidates may be replaced by cluster centers, or by the best subset of a given size found
//! by the [`SubsetSelector`].

use log::info;
use ndarray::{Array2, Array4, Axis};

use crate::{
    clustering::{aggregate_costs, aggregate_demand, Clustering, KMeansConfig},
    costs::TransportCosts,
    geo::LatLon,
    models::subset_selection::SubsetSelector,
    problem::{CandidateIndex, CustomerIndex, Problem},
    termination::Termination,
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerReduction {
    /// Keep every customer
    All,
    /// Replace customers by the centers of this many clusters
    Cluster(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateReduction {
    /// Keep every candidate site
    All,
    /// Keep the centers of this many clusters of candidate sites
    Cluster(usize),
    /// Keep the best subset of this size
    Subset(usize),
}

impl Default for CustomerReduction {
    fn default() -> Self {
        CustomerReduction::All
    }
}

impl Default for CandidateReduction {
    fn default() -> Self {
        CandidateReduction::All
    }
}

impl std::fmt::Display for CustomerReduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustomerReduction::All => write!(f, "all"),
            CustomerReduction::Cluster(k) => write!(f, "cluster:{k}"),
        }
    }
}

impl std::fmt::Display for CandidateReduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateReduction::All => write!(f, "all"),
            CandidateReduction::Cluster(k) => write!(f, "cluster:{k}"),
            CandidateReduction::Subset(m) => write!(f, "subset:{m}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReductionConfig {
    pub customers: CustomerReduction,
    pub candidates: CandidateReduction,
    /// Seed used for every clustering
    pub seed: u64,
    /// When to stop the subset selection
    pub subset_termination: Termination,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        ReductionConfig {
            customers: CustomerReduction::All,
            candidates: CandidateReduction::All,
            seed: 0,
            subset_termination: SubsetSelector::default_termination(),
        }
    }
}

/// The customers and candidate sites retained for one run, with their demand and delivery costs.
#[derive(Debug, Clone)]
pub struct Reduction {
    /// Problem index of every retained customer
    customers: Vec<CustomerIndex>,
    /// Problem index of every retained candidate
    candidates: Vec<CandidateIndex>,
    /// Demand of the retained customers, indexed by [customer, product, period, scenario]
    demand: Array4<f64>,
    /// Unit delivery cost, indexed by [candidate, customer] over the retained sets
    delivery: Array2<f64>,
    customer_clustering: Option<Clustering>,
}

/// Total demand of every location, summed over products, periods and scenarios
fn totals(demand: &Array4<f64>) -> Vec<f64> {
    demand.outer_iter().map(|d| d.sum()).collect()
}

impl Reduction {
    /// Keeps every customer and candidate
    pub fn full(problem: &Problem, costs: &TransportCosts, demand: Array4<f64>) -> Reduction {
        Reduction {
            customers: (0..problem.customers().len()).collect(),
            candidates: (0..problem.candidates().len()).collect(),
            demand,
            delivery: costs.delivery().clone(),
            customer_clustering: None,
        }
    }

    /// Applies `config` to a problem, with `demand` indexed by [customer, product, period, scenario]
    pub fn new(
        problem: &Problem,
        costs: &TransportCosts,
        demand: Array4<f64>,
        config: &ReductionConfig,
    ) -> Result<Reduction, Error> {
        let weights = totals(&demand);

        let (customers, demand, customer_clustering) = match config.customers {
            CustomerReduction::All => ((0..problem.customers().len()).collect::<Vec<_>>(), demand, None),
            CustomerReduction::Cluster(k) => {
                let points = problem
                    .customers()
                    .iter()
                    .map(|c| c.location().to_wgs84())
                    .collect::<Vec<LatLon>>();
                let clustering = Clustering::new(&points, &weights, &KMeansConfig::new(k).with_seed(config.seed))?;
                let demand = aggregate_demand(&clustering, &demand)?;
                (clustering.centers().iter().copied().collect(), demand, Some(clustering))
            }
        };

        let candidates = match config.candidates {
            CandidateReduction::All => (0..problem.candidates().len()).collect::<Vec<_>>(),
            CandidateReduction::Cluster(k) => {
                let points = problem
                    .candidates()
                    .iter()
                    .map(|c| c.location().to_wgs84())
                    .collect::<Vec<_>>();
                // a site is as important as the demand of its own district
                let site_weights = problem
                    .candidates()
                    .iter()
                    .map(|c| problem.customer_index(c.id()).map_or(0.0, |i| weights[i]))
                    .collect::<Vec<_>>();
                let clustering =
                    Clustering::new(&points, &site_weights, &KMeansConfig::new(k).with_seed(config.seed))?;
                clustering.centers().iter().copied().collect()
            }
            CandidateReduction::Subset(m) => {
                let selection_costs = match &customer_clustering {
                    Some(clustering) => aggregate_costs(clustering, costs.delivery())?,
                    None => costs.delivery().clone(),
                };
                let selection = SubsetSelector::new(&selection_costs, m)?.solve(&config.subset_termination)?;
                selection.candidates
            }
        };

        let delivery = costs
            .delivery()
            .select(Axis(0), &candidates)
            .select(Axis(1), &customers);

        info!(
            "Reduced to {} of {} customers and {} of {} candidate sites",
            customers.len(),
            problem.customers().len(),
            candidates.len(),
            problem.candidates().len()
        );

        Ok(Reduction {
            customers,
            candidates,
            demand,
            delivery,
            customer_clustering,
        })
    }

    /// Problem index of every retained customer
    pub fn customers(&self) -> &[CustomerIndex] {
        &self.customers
    }

    /// Problem index of every retained candidate
    pub fn candidates(&self) -> &[CandidateIndex] {
        &self.candidates
    }

    /// Demand of the retained customers, indexed by [customer, product, period, scenario]
    pub fn demand(&self) -> &Array4<f64> {
        &self.demand
    }

    /// Unit delivery cost over the retained sets, indexed by [candidate, customer]
    pub fn delivery(&self) -> &Array2<f64> {
        &self.delivery
    }

    pub fn customer_clustering(&self) -> Option<&Clustering> {
        self.customer_clustering.as_ref()
    }
}
