//! # ilpconv - Conversion of Linear Optimization Instances
//!
//! `ilpconv` reads integer and pseudo-Boolean linear optimization instances
//! from common input formats, converts them to an exact rational
//! intermediate representation and writes them in solver-input dialects.
//! Targets that only accept constraints with few terms are served by
//! splitting long constraints with auxiliary variables.
//!
//! ## Crate Structure
//!
//! - [`types`]: variables, domains, coefficients and linear constraints
//! - [`instances`]: the [`instances::Instance`] representation and the
//!   readers and writers in [`instances::fio`]
//! - [`transforms`]: direction resolution, numeric normalization and
//!   constraint splitting
//! - [`pipeline`]: the conversion driver with its format registry and
//!   output sinks
//! - [`options`]: string options for readers and writers
//!
//! ## Supported Formats
//!
//! | Key         | Read | Write | Description                           |
//! |-------------|------|-------|---------------------------------------|
//! | `mps`       | yes  |       | Free MPS                              |
//! | `lp`        | yes  |       | CPLEX LP subset                       |
//! | `pisinger`  | yes  |       | Pisinger knapsack streams             |
//! | `fznimf`    | yes  |       | FlatZinc subset                       |
//! | `inc`       | yes  | yes   | Lossless internal exchange format     |
//! | `sugar`     |      | yes   | Sugar CSP                             |
//! | `aspartame` |      | yes   | ASP facts, at most three terms        |
//! | `casp`      |      | yes   | Clingcon programs, at most three terms|
//!
//! ## Features
//!
//! - `fxhash`: use the faster hash maps of `rustc-hash` (default)
//! - `compression`: transparently read and write compressed files
//!   (`.bz2`, `.gz`, `.xz`)
//! - `serde`: serialization of the basic types

pub mod instances;
pub mod options;
pub mod pipeline;
pub mod transforms;
pub mod types;

