//! # Optimization Direction Resolution
//!
//! Input formats do not always state whether the objective is minimized or
//! maximized. Two reader options settle this: `opt_strategy` overrides
//! whatever the input says and `default_opt_strategy` only applies when the
//! input is silent.

use crate::{
    instances::{Direction, Instance},
    options::{ConfigurationError, Options},
};

/// The option keys every reader accepts in addition to its own
pub const STRATEGY_KEYS: [&str; 2] = ["opt_strategy", "default_opt_strategy"];

/// Resolves the direction of an objective. The override wins, the default
/// fills in an unspecified direction, otherwise the read direction is kept
/// (possibly unspecified).
#[must_use]
pub fn resolve(
    read: Direction,
    override_dir: Option<Direction>,
    default_dir: Option<Direction>,
) -> Direction {
    match (override_dir, read, default_dir) {
        (Some(dir), _, _) => dir,
        (None, Direction::Unspecified, Some(dir)) => dir,
        (None, read, _) => read,
    }
}

/// The configured direction overrides and defaults
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// Direction forced onto every instance
    pub override_dir: Option<Direction>,
    /// Direction for instances that do not specify one
    pub default_dir: Option<Direction>,
}

impl Strategy {
    /// Gets the strategy from reader options. Other keys are ignored, they
    /// are checked by the reader.
    ///
    /// # Errors
    ///
    /// If a value is neither `minimize` nor `maximize`
    pub fn from_options(opts: &Options) -> Result<Self, ConfigurationError> {
        Ok(Strategy {
            override_dir: opts.get_parsed(STRATEGY_KEYS[0])?,
            default_dir: opts.get_parsed(STRATEGY_KEYS[1])?,
        })
    }

    /// Sets the resolved direction on an instance and returns it
    pub fn apply(&self, inst: &mut Instance) -> Direction {
        let read = inst.objective().direction();
        let dir = resolve(read, self.override_dir, self.default_dir);
        if dir != read {
            tracing::debug!(from = %read, to = %dir, "resolved optimization direction");
            inst.objective_mut().set_direction(dir);
        }
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve, Strategy};
    use crate::{
        instances::{Direction, Instance},
        options::Options,
    };

    #[test]
    fn precedence() {
        use Direction::{Maximize as Max, Minimize as Min, Unspecified as Unsp};

        for read in [Max, Unsp] {
            for override_dir in [None, Some(Min)] {
                for default_dir in [None, Some(Min)] {
                    let expected = match (override_dir, read, default_dir) {
                        (Some(_), _, _) => Min,
                        (None, Max, _) => Max,
                        (None, _, Some(_)) => Min,
                        (None, _, None) => Unsp,
                    };
                    assert_eq!(
                        resolve(read, override_dir, default_dir),
                        expected,
                        "read {read}, override {override_dir:?}, default {default_dir:?}"
                    );
                }
            }
        }
        // a default never replaces a stated direction
        assert_eq!(resolve(Min, None, Some(Max)), Min);
        assert_eq!(resolve(Min, Some(Max), Some(Min)), Max);
    }

    #[test]
    fn from_options() {
        let opts = Options::parse("default_opt_strategy=max;default_ub=3").unwrap();
        let strat = Strategy::from_options(&opts).unwrap();
        assert_eq!(strat.override_dir, None);
        assert_eq!(strat.default_dir, Some(Direction::Maximize));
        assert!(Strategy::from_options(&Options::parse("opt_strategy=up").unwrap()).is_err());
    }

    #[test]
    fn apply() {
        let mut inst = Instance::new();
        let strat = Strategy {
            override_dir: None,
            default_dir: Some(Direction::Minimize),
        };
        assert_eq!(strat.apply(&mut inst), Direction::Minimize);
        assert_eq!(inst.objective().direction(), Direction::Minimize);
    }
}
