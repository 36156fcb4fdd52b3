//! # Constraint Types
//!
//! Linear constraints over integer and Boolean variables. A constraint is an
//! ordered sequence of [`Term`]s compared with a [`Relation`] against a
//! right-hand side.

use std::fmt;

use itertools::Itertools;
use num_traits::Zero;

use super::{checked_add, checked_mul, Coeff, RsHashMap, Term, TypeError, Var};

/// Possible relational operators
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    /// `<=`
    Le,
    /// `=`
    Eq,
    /// `>=`
    Ge,
}

impl Relation {
    /// Checks whether `lhs <rel> rhs` holds
    #[must_use]
    pub fn holds(self, lhs: Coeff, rhs: Coeff) -> bool {
        match self {
            Relation::Le => lhs <= rhs,
            Relation::Eq => lhs == rhs,
            Relation::Ge => lhs >= rhs,
        }
    }

    /// The textual operator
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Eq => "=",
            Relation::Ge => ">=",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Type representing a linear constraint `sum coeff_i * var_i <rel> rhs`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinConstraint {
    terms: Vec<Term>,
    rel: Relation,
    rhs: Coeff,
}

impl LinConstraint {
    /// Creates a new constraint
    #[must_use]
    pub fn new<I: IntoIterator<Item = Term>>(terms: I, rel: Relation, rhs: Coeff) -> Self {
        LinConstraint {
            terms: terms.into_iter().collect(),
            rel,
            rhs,
        }
    }

    /// Creates a new upper bounding constraint
    #[must_use]
    pub fn new_ub<I: IntoIterator<Item = Term>>(terms: I, rhs: Coeff) -> Self {
        Self::new(terms, Relation::Le, rhs)
    }

    /// Creates a new lower bounding constraint
    #[must_use]
    pub fn new_lb<I: IntoIterator<Item = Term>>(terms: I, rhs: Coeff) -> Self {
        Self::new(terms, Relation::Ge, rhs)
    }

    /// Creates a new equality constraint
    #[must_use]
    pub fn new_eq<I: IntoIterator<Item = Term>>(terms: I, rhs: Coeff) -> Self {
        Self::new(terms, Relation::Eq, rhs)
    }

    /// Gets the terms in declaration order
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Gets the relational operator
    #[must_use]
    pub fn rel(&self) -> Relation {
        self.rel
    }

    /// Gets the right-hand side
    #[must_use]
    pub fn rhs(&self) -> Coeff {
        self.rhs
    }

    /// Gets the number of terms, including duplicate references
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Checks if the constraint has no terms
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Decomposes the constraint into its parts
    #[must_use]
    pub fn decompose(self) -> (Vec<Term>, Relation, Coeff) {
        (self.terms, self.rel, self.rhs)
    }

    /// Gets the terms with duplicate variable references summed up. Terms
    /// whose coefficients sum to zero are dropped. The order of first
    /// occurrence is kept.
    ///
    /// # Errors
    ///
    /// If summing coefficients overflows
    pub fn merged_terms(&self) -> Result<Vec<Term>, TypeError> {
        let mut sums: RsHashMap<Var, Coeff> = RsHashMap::default();
        for t in &self.terms {
            let sum = sums.entry(t.var).or_insert_with(Coeff::zero);
            *sum = checked_add(*sum, t.coeff)?;
        }
        Ok(self
            .terms
            .iter()
            .map(|t| t.var)
            .unique()
            .filter_map(|v| {
                let c = sums[&v];
                (!c.is_zero()).then_some(Term::new(c, v))
            })
            .collect())
    }

    /// Gets the arity of the constraint, i.e., the number of distinct
    /// variables after summing duplicate references
    ///
    /// # Errors
    ///
    /// If summing coefficients overflows
    pub fn arity(&self) -> Result<usize, TypeError> {
        if self.terms.len() <= 1 {
            return Ok(self.terms.iter().filter(|t| !t.coeff.is_zero()).count());
        }
        Ok(self.merged_terms()?.len())
    }

    /// Checks whether all coefficients and the right-hand side are integral
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.rhs.is_integer() && self.terms.iter().all(|t| t.coeff.is_integer())
    }

    /// Multiplies the constraint with a positive factor
    ///
    /// # Errors
    ///
    /// If the multiplication overflows
    ///
    /// # Panics
    ///
    /// If the factor is not positive
    pub fn scale(&mut self, factor: Coeff) -> Result<(), TypeError> {
        assert!(factor > Coeff::zero(), "can only scale by positive factors");
        for t in &mut self.terms {
            t.coeff = checked_mul(t.coeff, factor)?;
        }
        self.rhs = checked_mul(self.rhs, factor)?;
        Ok(())
    }

    /// Evaluates the constraint under an assignment of values to variables.
    /// Returns `None` if the assignment does not cover every variable or the
    /// evaluation overflows.
    pub fn evaluate<F>(&self, mut value: F) -> Option<bool>
    where
        F: FnMut(Var) -> Option<i64>,
    {
        let mut lhs = Coeff::zero();
        for t in &self.terms {
            let val = Coeff::from_integer(value(t.var)?);
            lhs = checked_add(lhs, checked_mul(t.coeff, val).ok()?).ok()?;
        }
        Some(self.rel.holds(lhs, self.rhs))
    }
}

impl fmt::Display for LinConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            write!(f, "0")?;
        }
        for (idx, t) in self.terms.iter().enumerate() {
            if idx > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, " {} {}", self.rel, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::{LinConstraint, Relation};
    use crate::{coeff, types::Term, var};

    #[test]
    fn merge_duplicates() {
        let constr = LinConstraint::new_ub(
            [
                Term::int(1, var![0]),
                Term::int(2, var![1]),
                Term::int(3, var![0]),
                Term::int(-2, var![1]),
                Term::int(1, var![2]),
            ],
            coeff![4],
        );
        assert_eq!(
            constr.merged_terms().unwrap(),
            vec![Term::int(4, var![0]), Term::int(1, var![2])]
        );
        assert_eq!(constr.arity().unwrap(), 2);
        assert_eq!(constr.len(), 5);
    }

    #[test]
    fn evaluate() {
        let constr = LinConstraint::new(
            [Term::int(2, var![0]), Term::int(-1, var![1])],
            Relation::Ge,
            coeff![1],
        );
        assert_eq!(constr.evaluate(|v| Some(v.idx() as i64 + 1)), Some(false));
        assert_eq!(constr.evaluate(|v| Some(2 - v.idx() as i64)), Some(true));
        assert_eq!(constr.evaluate(|_| None), None);
    }

    #[test]
    fn scale_fractional() {
        let mut constr = LinConstraint::new_eq(
            [Term::new(coeff![1, 2], var![0]), Term::new(coeff![2, 3], var![1])],
            coeff![5, 6],
        );
        assert!(!constr.is_integral());
        constr.scale(coeff![6]).unwrap();
        assert!(constr.is_integral());
        assert_eq!(constr.terms()[0].coeff, coeff![3]);
        assert_eq!(constr.terms()[1].coeff, coeff![4]);
        assert_eq!(constr.rhs(), coeff![5]);
    }

    #[test]
    fn display() {
        let constr = LinConstraint::new_ub(
            [Term::int(1, var![1]), Term::int(2, var![2])],
            coeff![10],
        );
        assert_eq!(format!("{constr}"), "v1 + 2 v2 <= 10");
    }
}
