//! # Instance Transformations
//!
//! Rewrites applied between reading and writing an instance: resolving the
//! optimization direction, scaling to integer coefficients and splitting
//! constraints into constraints with at most three terms.

pub mod normalize;
pub mod split;
pub mod strategy;
