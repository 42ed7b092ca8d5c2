#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk normalization and aggregate statistics.
//!
//! [`normalize::normalize`] is the single place where loosely-typed
//! backend payloads are turned into [`NormalizedPrediction`] records, and
//! [`stats::summarize`] derives the dashboard counts from a collection of
//! those records. Both are pure.
//!
//! [`NormalizedPrediction`]: flood_map_risk_models::NormalizedPrediction

pub mod normalize;
pub mod stats;

pub use normalize::{denormalize, normalize};
pub use stats::summarize;
