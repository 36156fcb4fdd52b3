//! # Objective Representation

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::types::{checked_mul, Coeff, Term, TypeError};

/// The optimization sense of an objective
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Minimize the objective
    Minimize,
    /// Maximize the objective
    Maximize,
    /// The input did not say
    #[default]
    Unspecified,
}

impl Direction {
    /// Checks whether the direction is known
    #[must_use]
    pub fn is_specified(self) -> bool {
        !matches!(self, Direction::Unspecified)
    }

    /// The keyword used in configuration options and most formats
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Minimize => "minimize",
            Direction::Maximize => "maximize",
            Direction::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Error parsing a [`Direction`] from a configuration value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid optimization strategy `{0}`, expected `minimize` or `maximize`")]
pub struct InvalidDirection(pub String);

/// Only the two concrete senses can be configured
impl FromStr for Direction {
    type Err = InvalidDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimize" | "min" => Ok(Direction::Minimize),
            "maximize" | "max" => Ok(Direction::Maximize),
            _ => Err(InvalidDirection(s.to_owned())),
        }
    }
}

/// Type representing a linear objective
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Objective {
    direction: Direction,
    terms: Vec<Term>,
}

impl Objective {
    /// Creates a new empty objective without a direction
    #[must_use]
    pub fn new() -> Self {
        Objective::default()
    }

    /// Creates an objective from a direction and terms
    #[must_use]
    pub fn with_terms<I: IntoIterator<Item = Term>>(direction: Direction, terms: I) -> Self {
        Objective {
            direction,
            terms: terms.into_iter().collect(),
        }
    }

    /// Adds a term to the objective
    pub fn add_term(&mut self, term: Term) {
        self.terms.push(term);
    }

    /// Gets the direction
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sets the direction
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Gets the terms
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Checks if the objective has no terms, i.e., the instance is a pure
    /// satisfaction problem
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Checks whether all coefficients are integral
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.terms.iter().all(|t| t.coeff.is_integer())
    }

    /// Multiplies all coefficients by a positive factor. This does not change
    /// the set of optimal solutions.
    ///
    /// # Errors
    ///
    /// If the multiplication overflows
    pub fn scale(&mut self, factor: Coeff) -> Result<(), TypeError> {
        debug_assert!(factor > Coeff::from_integer(0));
        for t in &mut self.terms {
            t.coeff = checked_mul(t.coeff, factor)?;
        }
        Ok(())
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.direction)?;
        for t in &self.terms {
            write!(f, " {t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, InvalidDirection};

    #[test]
    fn parse_direction() {
        assert_eq!("minimize".parse(), Ok(Direction::Minimize));
        assert_eq!("MAX".parse(), Ok(Direction::Maximize));
        assert_eq!(
            "unspecified".parse::<Direction>(),
            Err(InvalidDirection(String::from("unspecified")))
        );
    }
}
