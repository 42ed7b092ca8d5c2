//! Pointer interaction.
//!
//! The map keeps only its own hover highlight. Clicks are turned into a
//! [`MapIntent`] for the caller to hand to the selection controller; the
//! map never changes selection or risk state itself.

use flood_map_controller::{AppRiskState, SelectionState};
use flood_map_region::RegionStore;
use flood_map_region_models::{LatLon, normalize_code};
use geojson::FeatureCollection;

use crate::palette::Palette;
use crate::render;

/// What the user asked for by interacting with the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapIntent {
    /// Select the ward with this code.
    Select(String),
}

/// The map view over a set of ward boundaries.
#[derive(Debug)]
pub struct MapView<'a> {
    regions: &'a RegionStore,
    palette: &'a Palette,
    hovered: Option<String>,
}

impl<'a> MapView<'a> {
    /// Creates a view over `regions` styled with the embedded palette.
    #[must_use]
    pub fn new(regions: &'a RegionStore) -> Self {
        Self::with_palette(regions, Palette::embedded())
    }

    /// Creates a view with an explicit palette.
    #[must_use]
    pub const fn with_palette(regions: &'a RegionStore, palette: &'a Palette) -> Self {
        Self {
            regions,
            palette,
            hovered: None,
        }
    }

    /// Whether the view has no boundaries to draw.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.regions.is_empty()
    }

    /// The ward under the pointer, if any.
    #[must_use]
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Pointer entered the ward `code`. Unknown codes are ignored.
    pub fn on_hover(&mut self, code: &str) {
        if let Some(region) = self.regions.get(code) {
            self.hovered = Some(region.code().to_string());
        }
    }

    /// Pointer left the ward `code`. Only clears the highlight if `code`
    /// is the hovered ward, so a late leave event cannot clear a newer
    /// hover.
    pub fn on_hover_end(&mut self, code: &str) {
        if self.hovered.as_deref() == Some(normalize_code(code).as_str()) {
            self.hovered = None;
        }
    }

    /// The ward `code` was clicked.
    #[must_use]
    pub fn on_click(&self, code: &str) -> Option<MapIntent> {
        self.regions
            .get(code)
            .map(|region| MapIntent::Select(region.code().to_string()))
    }

    /// The map was clicked at `point`; selects the ward containing it.
    #[must_use]
    pub fn on_click_at(&self, point: LatLon) -> Option<MapIntent> {
        let region = self.regions.region_containing(point)?;
        self.on_click(region.code())
    }

    /// Tooltip for the hovered ward.
    #[must_use]
    pub fn hover_tooltip(&self, risk: &AppRiskState) -> Option<String> {
        let region = self.regions.get(self.hovered.as_deref()?)?;
        Some(render::tooltip(region, risk))
    }

    /// Renders every ward with its current style.
    #[must_use]
    pub fn render(&self, risk: &AppRiskState, selection: &SelectionState) -> FeatureCollection {
        if self.is_degraded() {
            log::debug!("rendering without boundaries");
        }

        render::render(
            self.palette,
            self.regions.list_regions(),
            risk,
            selection,
            self.hovered.as_deref(),
        )
    }
}
