//! # Constraint Splitting
//!
//! Reduces every constraint to at most three terms by chain decomposition.
//! The first two terms `c1 x1 + c2 x2` are replaced by a fresh auxiliary
//! variable `a` defined by `L c1 x1 + L c2 x2 - a = 0`, where `L` is the
//! least common denominator of `c1` and `c2`. The auxiliary enters the
//! remaining constraint with coefficient `1/L`. Folding is repeated until
//! three terms remain, so a constraint with `n` terms turns into `n - 2`
//! constraints.
//!
//! The domain of `a` is the value range of `L c1 x1 + L c2 x2`, hence every
//! solution of the original constraint extends to exactly one solution of
//! the split constraints.

use std::collections::VecDeque;

use thiserror::Error;

use crate::{
    instances::{Instance, InstanceError},
    types::{checked_add, checked_lcm, checked_mul, Coeff, Domain, LinConstraint, Term, TypeError},
};

/// The largest arity left untouched
pub const MAX_ARITY: usize = 3;

/// Errors while splitting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// Arithmetic on the coefficients or auxiliary bounds overflowed
    #[error("constraint {constr}: {source}")]
    Arithmetic {
        /// The 1-based index of the constraint
        constr: usize,
        /// The underlying error
        source: TypeError,
    },
    /// The instance references undeclared variables
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// What splitting did to an instance
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    /// The number of constraints that were split
    pub n_split: usize,
    /// The number of auxiliary variables introduced
    pub n_aux: usize,
}

/// Splits all constraints of an instance with more than [`MAX_ARITY`]
/// distinct variables. Constraints with at most [`MAX_ARITY`] distinct
/// variables are kept as they are, even if they reference a variable twice.
///
/// # Errors
///
/// If coefficients or auxiliary bounds overflow
pub fn split_instance(inst: &mut Instance) -> Result<SplitStats, SplitError> {
    let mut stats = SplitStats::default();
    for (idx, constr) in inst.take_constrs().into_iter().enumerate() {
        let merged = constr
            .merged_terms()
            .map_err(|source| SplitError::Arithmetic {
                constr: idx + 1,
                source,
            })?;
        if merged.len() <= MAX_ARITY {
            inst.add_constr(constr)?;
            continue;
        }
        let (_, rel, rhs) = constr.decompose();
        let mut rest: VecDeque<Term> = merged.into();
        while rest.len() > MAX_ARITY {
            let (first, second) = (rest[0], rest[1]);
            rest.drain(..2);
            rest.push_front(fold(inst, idx, first, second)?);
            stats.n_aux += 1;
        }
        inst.add_constr(LinConstraint::new(rest, rel, rhs))?;
        stats.n_split += 1;
    }
    if stats.n_split > 0 {
        tracing::debug!(
            split = stats.n_split,
            aux_vars = stats.n_aux,
            "split constraints"
        );
    }
    Ok(stats)
}

/// Replaces two terms by an auxiliary variable. Adds the defining equality
/// and returns the term to use in place of the two.
fn fold(inst: &mut Instance, idx: usize, first: Term, second: Term) -> Result<Term, SplitError> {
    let domain = |t: Term| inst.domain(t.var).ok_or(InstanceError::UndeclaredVar(t.var));
    let (dom1, dom2) = (domain(first)?, domain(second)?);
    let arith = |source| SplitError::Arithmetic {
        constr: idx + 1,
        source,
    };

    let denom = checked_lcm(*first.coeff.denom(), *second.coeff.denom()).map_err(arith)?;
    let scale = Coeff::from_integer(denom);
    let first = Term::new(checked_mul(first.coeff, scale).map_err(arith)?, first.var);
    let second = Term::new(checked_mul(second.coeff, scale).map_err(arith)?, second.var);

    let (lo1, hi1) = first.value_range(dom1).map_err(arith)?;
    let (lo2, hi2) = second.value_range(dom2).map_err(arith)?;
    let lo = checked_add(lo1, lo2).map_err(arith)?.to_integer();
    let hi = checked_add(hi1, hi2).map_err(arith)?.to_integer();
    let aux = inst
        .new_aux_var(Domain::int(lo, hi).map_err(arith)?)
        .map_err(arith)?;

    inst.add_constr(LinConstraint::new_eq(
        [first, second, Term::int(-1, aux)],
        Coeff::from_integer(0),
    ))?;
    Ok(Term::new(Coeff::new(1, denom), aux))
}
