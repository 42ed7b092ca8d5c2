//! The embedded map palette.

use std::sync::LazyLock;

use flood_map_risk_models::RiskCategory;
use serde::Deserialize;

const PALETTE_TOML: &str = include_str!("../palette.toml");

static EMBEDDED: LazyLock<Palette> = LazyLock::new(|| {
    Palette::from_toml(PALETTE_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse palette.toml: {e}"))
});

/// Fill color per risk category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryFills {
    /// Fill for [`RiskCategory::Low`].
    pub low: String,
    /// Fill for [`RiskCategory::Medium`].
    pub medium: String,
    /// Fill for [`RiskCategory::High`].
    pub high: String,
    /// Fill for [`RiskCategory::Critical`].
    pub critical: String,
    /// Fill for [`RiskCategory::Unknown`].
    pub unknown: String,
}

/// Base style of a ward with a committed prediction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyzedStyle {
    /// Fill opacity in [0, 1].
    pub fill_opacity: f64,
    /// Outline color.
    pub stroke: String,
    /// Outline width in pixels.
    pub stroke_width: f64,
}

/// Style of a ward that has not been analyzed yet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnanalyzedStyle {
    /// Neutral fill color.
    pub fill: String,
    /// Fill opacity in [0, 1].
    pub fill_opacity: f64,
    /// Outline color.
    pub stroke: String,
    /// Outline width in pixels.
    pub stroke_width: f64,
    /// SVG dash pattern for the outline.
    pub dash: String,
}

/// Minimums applied under the pointer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HoverStyle {
    /// Lowest fill opacity of a hovered ward.
    pub fill_opacity: f64,
    /// Lowest outline width of a hovered ward.
    pub stroke_width: f64,
}

/// Outline of the selected ward.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectedStyle {
    /// Outline color.
    pub stroke: String,
    /// Outline width in pixels.
    pub stroke_width: f64,
}

/// Every color and width the renderer uses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Palette {
    /// Fills of analyzed wards.
    pub fill: CategoryFills,
    /// Base style of analyzed wards.
    pub analyzed: AnalyzedStyle,
    /// Base style of wards without a prediction.
    pub unanalyzed: UnanalyzedStyle,
    /// Hover emphasis.
    pub hover: HoverStyle,
    /// Selection outline.
    pub selected: SelectedStyle,
}

impl Palette {
    /// The palette compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `palette.toml` is malformed. It is checked
    /// by the test suite.
    #[must_use]
    pub fn embedded() -> &'static Self {
        &EMBEDDED
    }

    /// Parses a palette document.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a field is missing.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(contents)
    }

    /// Fill color for a risk category.
    #[must_use]
    pub fn fill_for(&self, category: RiskCategory) -> &str {
        match category {
            RiskCategory::Low => &self.fill.low,
            RiskCategory::Medium => &self.fill.medium,
            RiskCategory::High => &self.fill.high,
            RiskCategory::Critical => &self.fill.critical,
            RiskCategory::Unknown => &self.fill.unknown,
        }
    }
}
