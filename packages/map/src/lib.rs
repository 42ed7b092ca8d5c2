#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood risk map rendering.
//!
//! Styling is a pure function of the ward boundaries, the committed risk
//! state, the selection, and the hovered ward. Output is a GeoJSON
//! `FeatureCollection` carrying simplestyle properties (`fill`,
//! `fill-opacity`, `stroke`, `stroke-width`, `stroke-dasharray`) that any
//! GeoJSON viewer can draw. Colors come from an embedded TOML palette.

pub mod interaction;
pub mod palette;
pub mod render;

pub use interaction::{MapIntent, MapView};
pub use palette::Palette;
pub use render::{RegionStyle, render, style_for, tooltip};
