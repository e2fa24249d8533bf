use std::time::Duration;

/// When the MIP solver may stop searching.
#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    /// Maximum wall-clock running time
    Timeout(Duration),
    /// Terminate once the relative MIP gap is at most the given value
    Gap(f64),
    /// Run until optimality is proven
    Never,
    /// Terminate if either of the two termination criteria
    /// tells it to terminate
    Any(Box<Termination>, Box<Termination>),
}

impl Termination {
    pub fn any(self, other: Termination) -> Termination {
        Termination::Any(Box::new(self), Box::new(other))
    }

    /// The time limit to hand to the solver, the tightest one if several are given
    pub fn time_limit(&self) -> Option<Duration> {
        match self {
            Termination::Timeout(duration) => Some(*duration),
            Termination::Gap(_) | Termination::Never => None,
            Termination::Any(one, two) => match (one.time_limit(), two.time_limit()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// The relative gap to hand to the solver, the loosest one if several are given
    pub fn mip_rel_gap(&self) -> Option<f64> {
        match self {
            Termination::Gap(gap) => Some(*gap),
            Termination::Timeout(_) | Termination::Never => None,
            Termination::Any(one, two) => match (one.mip_rel_gap(), two.mip_rel_gap()) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Termination::Never
    }
}

// Written in the same reverse polish notation that is accepted when parsing
impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Timeout(dur) => write!(f, "{} timeout", dur.as_secs_f64()),
            Termination::Gap(gap) => write!(f, "{gap:?} gap"),
            Termination::Never => write!(f, "never"),
            Termination::Any(lhs, rhs) => write!(f, "{lhs} {rhs} |"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_limits() {
        let term = Termination::Timeout(Duration::from_secs(600))
            .any(Termination::Gap(0.01))
            .any(Termination::Timeout(Duration::from_secs(60)))
            .any(Termination::Gap(0.05));
        assert_eq!(term.time_limit(), Some(Duration::from_secs(60)));
        assert_eq!(term.mip_rel_gap(), Some(0.05));
        assert_eq!(Termination::Never.time_limit(), None);
        assert_eq!(Termination::Never.mip_rel_gap(), None);
    }

    #[test]
    fn display_round_trips_through_parsing() {
        let term = Termination::Timeout(Duration::from_secs(600)).any(Termination::Gap(0.05));
        let shown = term.to_string();
        assert_eq!(shown, "600 timeout 0.05 gap |");
        assert_eq!(shown.parse::<Termination>().unwrap(), term);

        let term = Termination::Timeout(Duration::from_millis(500)).any(Termination::Never);
        let shown = term.to_string();
        assert_eq!(shown, "0.5 timeout never |");
        assert_eq!(shown.parse::<Termination>().unwrap(), term);
    }
}
