//! # Common Types for Linear Instances
//!
//! Common types used throughout the library to guarantee type safety.

use std::{fmt, ops};

use num_rational::Rational64;
use num_traits::{One, Signed};
use thiserror::Error;

pub mod constraints;
pub use constraints::{LinConstraint, Relation};

/// The hash map to use throughout the library
#[cfg(feature = "fxhash")]
pub type RsHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fxhash"))]
pub type RsHashMap<K, V> = std::collections::HashMap<K, V>;

/// Coefficients and constants are exact rationals. Formats that only know
/// integers produce coefficients with denominator 1.
pub type Coeff = Rational64;

/// Type representing the identity of a variable in an instance. The index is
/// stable for the lifetime of the instance and unique within it. The memory
/// representation of variables is `u32`.
#[derive(Hash, Eq, PartialEq, PartialOrd, Clone, Copy, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Var {
    idx: u32,
}

impl Var {
    /// The maximum index that can be represented.
    pub const MAX_IDX: u32 = u32::MAX - 1;

    /// Creates a new variable with a given index.
    ///
    /// # Panics
    ///
    /// If `idx > Var::MAX_IDX`.
    #[must_use]
    pub fn new(idx: u32) -> Var {
        assert!(idx <= Var::MAX_IDX, "variable index too high");
        Var { idx }
    }

    /// Creates a new variable with a given index.
    ///
    /// # Errors
    ///
    /// [`TypeError::IdxTooHigh`] if `idx > Var::MAX_IDX`.
    pub fn new_with_error(idx: u32) -> Result<Var, TypeError> {
        if idx > Var::MAX_IDX {
            return Err(TypeError::IdxTooHigh(idx, Var::MAX_IDX));
        }
        Ok(Var { idx })
    }

    /// Returns the index of the variable as a `usize`. For the 32 bit index use
    /// [`Var::idx32`].
    #[inline]
    #[must_use]
    pub fn idx(self) -> usize {
        self.idx as usize
    }

    /// Returns the 32 bit index of the variable.
    #[inline]
    #[must_use]
    pub fn idx32(self) -> u32 {
        self.idx
    }
}

/// Incrementing variables
impl ops::Add<u32> for Var {
    type Output = Var;

    fn add(self, rhs: u32) -> Self::Output {
        Var {
            idx: self.idx + rhs,
        }
    }
}

impl ops::AddAssign<u32> for Var {
    fn add_assign(&mut self, rhs: u32) {
        self.idx += rhs;
    }
}

/// Variables can be printed with the [`Display`](std::fmt::Display) trait
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.idx)
    }
}

/// More easily creates variables. Mainly used in tests.
///
/// # Examples
///
/// ```
/// use ilpconv::{types::Var, var};
///
/// assert_eq!(var![42], Var::new(42));
/// ```
#[macro_export]
macro_rules! var {
    ($v:expr) => {
        $crate::types::Var::new($v)
    };
}

/// Creates a [`Coeff`] from an integer or a fraction. Mainly used in tests.
///
/// # Examples
///
/// ```
/// use ilpconv::{coeff, types::Coeff};
///
/// assert_eq!(coeff![3], Coeff::from_integer(3));
/// assert_eq!(coeff![1, 2], Coeff::new(1, 2));
/// ```
#[macro_export]
macro_rules! coeff {
    ($n:expr) => {
        $crate::types::Coeff::from_integer($n)
    };
    ($n:expr, $d:expr) => {
        $crate::types::Coeff::new($n, $d)
    };
}

/// The domain of a variable
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    /// A Boolean variable, taking values 0 or 1
    Bool,
    /// A bounded integer variable with inclusive bounds
    Int {
        /// The lower bound
        lb: i64,
        /// The upper bound
        ub: i64,
    },
}

impl Domain {
    /// Creates an integer domain, checking that it is non-empty
    ///
    /// # Errors
    ///
    /// [`TypeError::EmptyDomain`] if `lb > ub`
    pub fn int(lb: i64, ub: i64) -> Result<Domain, TypeError> {
        if lb > ub {
            return Err(TypeError::EmptyDomain(lb, ub));
        }
        Ok(Domain::Int { lb, ub })
    }

    /// Gets the inclusive bounds of the domain
    #[must_use]
    pub fn bounds(self) -> (i64, i64) {
        match self {
            Domain::Bool => (0, 1),
            Domain::Int { lb, ub } => (lb, ub),
        }
    }

    /// Checks whether a value lies within the domain
    #[must_use]
    pub fn contains(self, val: i64) -> bool {
        let (lb, ub) = self.bounds();
        lb <= val && val <= ub
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Bool => write!(f, "bool"),
            Domain::Int { lb, ub } => write!(f, "{lb}..{ub}"),
        }
    }
}

/// Where a variable comes from
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    /// Declared in the input instance
    #[default]
    User,
    /// Introduced by a transformation
    Auxiliary,
}

/// Everything known about one variable of an instance
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarInfo {
    /// The name of the variable, unique within the instance
    pub name: String,
    /// The domain of the variable
    pub domain: Domain,
    /// Whether the variable was declared by the user or introduced later
    pub origin: Origin,
}

/// A weighted variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Term {
    /// The coefficient of the term
    pub coeff: Coeff,
    /// The variable of the term
    pub var: Var,
}

impl Term {
    /// Creates a new term
    #[must_use]
    pub fn new(coeff: Coeff, var: Var) -> Self {
        Term { coeff, var }
    }

    /// Creates a new term with an integer coefficient
    #[must_use]
    pub fn int(coeff: i64, var: Var) -> Self {
        Term {
            coeff: Coeff::from_integer(coeff),
            var,
        }
    }

    /// Gets the range of values the term can take over a domain
    ///
    /// # Errors
    ///
    /// If the bounds overflow [`Coeff`]
    pub fn value_range(&self, dom: Domain) -> Result<(Coeff, Coeff), TypeError> {
        let (lb, ub) = dom.bounds();
        let at_lb = checked_mul(self.coeff, Coeff::from_integer(lb))?;
        let at_ub = checked_mul(self.coeff, Coeff::from_integer(ub))?;
        if self.coeff.is_negative() {
            Ok((at_ub, at_lb))
        } else {
            Ok((at_lb, at_ub))
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coeff.is_one() {
            write!(f, "{}", self.var)
        } else {
            write!(f, "{} {}", self.coeff, self.var)
        }
    }
}

/// Multiplies two coefficients, detecting overflow
pub(crate) fn checked_mul(a: Coeff, b: Coeff) -> Result<Coeff, TypeError> {
    num_traits::CheckedMul::checked_mul(&a, &b).ok_or(TypeError::Overflow)
}

/// Adds two coefficients, detecting overflow
pub(crate) fn checked_add(a: Coeff, b: Coeff) -> Result<Coeff, TypeError> {
    num_traits::CheckedAdd::checked_add(&a, &b).ok_or(TypeError::Overflow)
}

/// Least common multiple of two positive integers, detecting overflow
pub(crate) fn checked_lcm(a: i64, b: i64) -> Result<i64, TypeError> {
    let gcd = num_integer::Integer::gcd(&a, &b);
    (a / gcd).checked_mul(b).ok_or(TypeError::Overflow)
}

/// Errors related to types
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeError {
    /// The requested index is too high.
    /// Contains the requested and the maximum index.
    #[error("index {0} is too high (maximum {1})")]
    IdxTooHigh(u32, u32),
    /// A domain with lower bound above the upper bound
    #[error("empty domain {0}..{1}")]
    EmptyDomain(i64, i64),
    /// An arithmetic operation on coefficients left the representable range
    #[error("coefficient arithmetic overflowed")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::{Domain, Term, TypeError, Var};
    use crate::coeff;

    #[test]
    fn var_index() {
        let x = Var::new(5);
        assert_eq!(x.idx(), 5);
        assert_eq!(x.idx32(), 5);
        assert_eq!(x + 2, Var::new(7));
    }

    #[test]
    fn var_idx_too_high() {
        assert_eq!(
            Var::new_with_error(u32::MAX),
            Err(TypeError::IdxTooHigh(u32::MAX, Var::MAX_IDX))
        );
    }

    #[test]
    fn domain_bounds() {
        assert_eq!(Domain::Bool.bounds(), (0, 1));
        assert_eq!(Domain::int(-3, 4).unwrap().bounds(), (-3, 4));
        assert_eq!(Domain::int(4, -3), Err(TypeError::EmptyDomain(4, -3)));
        assert!(Domain::Bool.contains(1));
        assert!(!Domain::Bool.contains(2));
    }

    #[test]
    fn term_range_negative_coeff() {
        let t = Term::int(-2, Var::new(0));
        assert_eq!(
            t.value_range(Domain::int(1, 3).unwrap()),
            Ok((coeff![-6], coeff![-2]))
        );
        let t = Term::new(coeff![1, 2], Var::new(0));
        assert_eq!(
            t.value_range(Domain::Bool),
            Ok((coeff![0], coeff![1, 2]))
        );
    }
}
