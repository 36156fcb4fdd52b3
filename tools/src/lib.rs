//! # ilpconv-tools - Command Line Tools for ilpconv
//!
//! This crate contains the `ilpconv` conversion driver and the
//! `gen-knapsack` instance generator, together with the pieces they share.

pub mod knapsack;
pub mod logger;
