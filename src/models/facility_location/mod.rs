pub mod model;
pub mod sets_and_parameters;

pub use model::{CostBreakdown, FacilityLocationResult, FacilityLocationSolver, Variables};
pub use sets_and_parameters::{Balance, DemandPolicy, ModelOptions, Parameters, Sets, Variant};
