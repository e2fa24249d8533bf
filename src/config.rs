use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        facility_location::{Balance, DemandPolicy, ModelOptions, Variant},
        subset_selection::SubsetSelector,
    },
    reduction::{CandidateReduction, CustomerReduction, ReductionConfig},
    termination::Termination,
    Error,
};

/// The options of a `solve` run, as read from a `--config` file. Command line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub variant: Variant,
    /// Defaults to the policy of the variant
    pub policy: Option<DemandPolicy>,
    /// Defaults to the balance of the variant
    pub balance: Option<Balance>,
    /// `all` or `cluster:K`
    pub customers: String,
    /// `all`, `cluster:K` or `subset:M`
    pub candidates: String,
    /// Termination of the main model, in reverse polish notation
    pub termination: String,
    /// Termination of the subset selection, in reverse polish notation
    pub subset_termination: Option<String>,
    pub seed: u64,
    /// Only use the first scenarios of the stochastic variant
    pub scenarios: Option<usize>,
    /// More candidates than this limits the number of open sites to half of them
    pub cardinality_threshold: Option<usize>,
    /// Defaults to true for the stochastic variant only
    pub supply_requires_open: Option<bool>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            variant: Variant::MultiPeriod,
            policy: None,
            balance: None,
            customers: CustomerReduction::All.to_string(),
            candidates: CandidateReduction::All.to_string(),
            termination: Termination::Never.to_string(),
            subset_termination: None,
            seed: 0,
            scenarios: None,
            cardinality_threshold: Some(30),
            supply_requires_open: None,
            output: None,
            verbose: false,
        }
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunConfig, Error> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: RunConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        debug!("Read run configuration from {}: {:?}", path.as_ref().display(), config);
        Ok(config)
    }

    pub fn model_options(&self) -> ModelOptions {
        let defaults = ModelOptions::new(self.variant);
        ModelOptions {
            variant: self.variant,
            demand_policy: self.policy.unwrap_or(defaults.demand_policy),
            balance: self.balance.unwrap_or(defaults.balance),
            cardinality_threshold: self.cardinality_threshold,
            supply_requires_open: self.supply_requires_open.unwrap_or(defaults.supply_requires_open),
        }
    }

    pub fn reduction_config(&self) -> Result<ReductionConfig, Error> {
        Ok(ReductionConfig {
            customers: self.customers.parse()?,
            candidates: self.candidates.parse()?,
            seed: self.seed,
            subset_termination: match &self.subset_termination {
                Some(rpn) => rpn.parse()?,
                None => SubsetSelector::default_termination(),
            },
        })
    }

    pub fn termination(&self) -> Result<Termination, Error> {
        Ok(self.termination.parse()?)
    }
}
