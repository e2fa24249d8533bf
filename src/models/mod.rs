pub mod facility_location;
pub mod subset_selection;
pub mod utils;

pub use facility_location::FacilityLocationSolver;
pub use subset_selection::SubsetSelector;
