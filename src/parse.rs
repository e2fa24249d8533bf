use std::{
    num::ParseIntError,
    path::Path,
    str::FromStr,
    time::Duration,
};

use derive_more::Display;
use log::{debug, info};

use crate::{
    models::facility_location::{DemandPolicy, Variant},
    problem::{Problem, ProblemData},
    reduction::{CandidateReduction, CustomerReduction},
    termination::Termination,
    Error,
};

#[derive(Debug, Display)]
pub enum ParseTerminationError {
    ExpectedFloat,
    ExpectedTerm,
    UnconsumedTokens,
    EmptyStack,
    #[display(fmt = "gap must be a non-negative number, got {}", _0)]
    InvalidGap(f64),
    #[display(fmt = "timeout must be a non-negative number of seconds, got {}", _0)]
    InvalidTimeout(f64),
    UnrecognizedToken(String),
}

impl std::error::Error for ParseTerminationError {}

impl<'s> std::convert::TryFrom<&'s str> for Termination {
    type Error = ParseTerminationError;

    fn try_from(value: &'s str) -> Result<Self, Self::Error> {
        use ParseTerminationError::*;
        let tokens = value.split_ascii_whitespace();

        enum Arg {
            Int(u64),
            Float(f64),
            Term(Box<Termination>),
        }

        let mut stack = Vec::new();

        let float = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Float(x)) => Ok(x),
            Some(Arg::Int(x)) => Ok(x as f64),
            Some(_) => Err(ExpectedFloat),
            None => Err(EmptyStack),
        };

        let term = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Term(x)) => Ok(x),
            Some(_) => Err(ExpectedTerm),
            None => Err(EmptyStack),
        };

        for token in tokens {
            debug!("token = {token}");
            let new = match token {
                "never" => Arg::Term(Box::new(Termination::Never)),
                "timeout" => {
                    let secs = float(&mut stack)?;
                    match Duration::try_from_secs_f64(secs) {
                        Ok(duration) => Arg::Term(Box::new(Termination::Timeout(duration))),
                        Err(_) => return Err(InvalidTimeout(secs)),
                    }
                }
                "gap" => match float(&mut stack)? {
                    gap if gap >= 0.0 => Arg::Term(Box::new(Termination::Gap(gap))),
                    gap => return Err(InvalidGap(gap)),
                },
                "|" => {
                    let rhs = term(&mut stack)?;
                    let lhs = term(&mut stack)?;
                    Arg::Term(Box::new(Termination::Any(lhs, rhs)))
                }
                x => match (x.parse::<u64>(), x.parse::<f64>()) {
                    (Ok(num), _) => Arg::Int(num),
                    (_, Ok(num)) if num.is_finite() => Arg::Float(num),
                    _ => return Err(UnrecognizedToken(x.to_string())),
                },
            };

            stack.push(new);
        }

        let termination = term(&mut stack)?;
        match stack.is_empty() {
            true => Ok(*termination),
            false => Err(UnconsumedTokens),
        }
    }
}

impl FromStr for Termination {
    type Err = ParseTerminationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Termination::try_from(s)
    }
}

#[derive(Debug, Display)]
pub enum ParseOptionError {
    #[display(fmt = "unknown {}: {}", kind, value)]
    Unknown { kind: &'static str, value: String },
    #[display(fmt = "cluster and subset sizes must be positive")]
    ZeroSize,
    ParseIntError(ParseIntError),
}

impl std::error::Error for ParseOptionError {}

impl From<ParseIntError> for ParseOptionError {
    fn from(e: ParseIntError) -> Self {
        ParseOptionError::ParseIntError(e)
    }
}

/// Splits `cluster:30` into `("cluster", Some(30))`
fn sized(s: &str) -> Result<(&str, Option<usize>), ParseOptionError> {
    match s.split_once(':') {
        Some((kind, size)) => match size.trim().parse::<usize>()? {
            0 => Err(ParseOptionError::ZeroSize),
            n => Ok((kind.trim(), Some(n))),
        },
        None => Ok((s.trim(), None)),
    }
}

impl FromStr for CustomerReduction {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match sized(s)? {
            ("all", None) => Ok(CustomerReduction::All),
            ("cluster", Some(k)) => Ok(CustomerReduction::Cluster(k)),
            _ => Err(ParseOptionError::Unknown {
                kind: "customer reduction",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for CandidateReduction {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match sized(s)? {
            ("all", None) => Ok(CandidateReduction::All),
            ("cluster", Some(k)) => Ok(CandidateReduction::Cluster(k)),
            ("subset", Some(m)) => Ok(CandidateReduction::Subset(m)),
            _ => Err(ParseOptionError::Unknown {
                kind: "candidate reduction",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Variant {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "static" => Ok(Variant::Static),
            "multi-period" => Ok(Variant::MultiPeriod),
            "stochastic" => Ok(Variant::Stochastic),
            _ => Err(ParseOptionError::Unknown {
                kind: "model variant",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for DemandPolicy {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "aggregate" => Ok(DemandPolicy::AggregateSufficiency),
            "single-source" => Ok(DemandPolicy::SingleSource),
            _ => Err(ParseOptionError::Unknown {
                kind: "demand policy",
                value: s.to_string(),
            }),
        }
    }
}

pub struct ProblemFromFile {
    pub name: String,
    pub problem: Problem,
}

/// Reads and validates a JSON problem instance
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<ProblemFromFile, Error> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("problem")
        .to_string();

    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let data: ProblemData = serde_json::from_reader(reader)?;
    let problem = Problem::new(data)?;

    info!(
        "Read {}: {} suppliers, {} candidate sites, {} customers, {} products, {} periods, {} scenarios",
        name,
        problem.suppliers().len(),
        problem.candidates().len(),
        problem.customers().len(),
        problem.products(),
        problem.periods(),
        problem.scenarios()
    );

    Ok(ProblemFromFile { name, problem })
}
