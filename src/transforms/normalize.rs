//! # Numeric Normalization
//!
//! Scales constraints and the objective to integer coefficients. Each
//! constraint is multiplied by the least common multiple of the denominators
//! of its coefficients and right-hand side, the objective by the least common
//! multiple of its coefficient denominators. The factors are positive, so
//! relations and the optimization direction stay the same. No rounding takes
//! place; factors above the configured maximum are rejected instead.

use thiserror::Error;

use crate::{
    instances::Instance,
    types::{checked_lcm, Coeff},
};

/// The default maximum scaling factor
pub const DEFAULT_MAX_SCALE: i64 = 1_000_000;

/// Making a constraint or the objective integral needs a factor above the
/// configured maximum
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("scaling {target} to integer coefficients needs a factor above {max_scale}")]
pub struct PrecisionLoss {
    /// What could not be scaled, e.g., `constraint 3` or `objective`
    pub target: String,
    /// The configured maximum factor
    pub max_scale: i64,
}

/// Scales instances to integer coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    max_scale: i64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            max_scale: DEFAULT_MAX_SCALE,
        }
    }
}

impl Normalizer {
    /// Creates a normalizer with a maximum scaling factor
    ///
    /// # Panics
    ///
    /// If the maximum is not positive
    #[must_use]
    pub fn new(max_scale: i64) -> Self {
        assert!(max_scale > 0, "the maximum scale must be positive");
        Normalizer { max_scale }
    }

    /// Gets the maximum scaling factor
    #[must_use]
    pub fn max_scale(&self) -> i64 {
        self.max_scale
    }

    /// The least common multiple of the denominators, if within bounds
    fn factor<I>(&self, coeffs: I, target: impl FnOnce() -> String) -> Result<i64, PrecisionLoss>
    where
        I: IntoIterator<Item = Coeff>,
    {
        let factor = coeffs.into_iter().try_fold(1, |factor, c| {
            checked_lcm(factor, *c.denom())
                .ok()
                .filter(|f| *f <= self.max_scale)
        });
        factor.ok_or_else(|| PrecisionLoss {
            target: target(),
            max_scale: self.max_scale,
        })
    }

    /// Scales all constraints and the objective of an instance to integer
    /// coefficients. Returns the number of scaled constraints.
    ///
    /// # Errors
    ///
    /// [`PrecisionLoss`] if a factor exceeds the maximum or scaling overflows.
    /// The instance may be partially scaled in that case.
    pub fn normalize(&self, inst: &mut Instance) -> Result<usize, PrecisionLoss> {
        let mut n_scaled = 0;
        for (idx, constr) in inst.iter_constrs_mut().enumerate() {
            let target = || format!("constraint {}", idx + 1);
            let coeffs = constr.terms().iter().map(|t| t.coeff);
            let factor = self.factor(coeffs.chain([constr.rhs()]), target)?;
            if factor > 1 {
                constr
                    .scale(Coeff::from_integer(factor))
                    .map_err(|_| PrecisionLoss {
                        target: target(),
                        max_scale: self.max_scale,
                    })?;
                n_scaled += 1;
            }
        }
        let obj = inst.objective_mut();
        let target = || String::from("objective");
        let factor = self.factor(obj.terms().iter().map(|t| t.coeff), target)?;
        if factor > 1 {
            obj.scale(Coeff::from_integer(factor))
                .map_err(|_| PrecisionLoss {
                    target: target(),
                    max_scale: self.max_scale,
                })?;
        }
        if n_scaled > 0 || factor > 1 {
            tracing::debug!(
                constrs = n_scaled,
                objective_factor = factor,
                "scaled to integer coefficients"
            );
        }
        Ok(n_scaled)
    }
}
