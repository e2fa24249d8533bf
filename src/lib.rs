pub mod clustering;
pub mod config;
pub mod costs;
pub mod error;
pub mod geo;
pub mod models;
pub mod parse;
pub mod problem;
pub mod reduction;
pub mod report;
pub mod run;
pub mod solver;
pub mod termination;

pub use error::Error;
pub use problem::Problem;
