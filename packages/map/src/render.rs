//! Pure styling of wards from committed risk and selection state.

use flood_map_controller::{AppRiskState, SelectionState};
use flood_map_region_models::Region;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};

use crate::palette::Palette;

/// Visual style of one ward.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStyle {
    /// Fill color.
    pub fill: String,
    /// Fill opacity in [0, 1].
    pub fill_opacity: f64,
    /// Outline color.
    pub stroke: String,
    /// Outline width in pixels.
    pub stroke_width: f64,
    /// Outline dash pattern; `None` for a solid outline.
    pub dash: Option<String>,
}

/// Computes the style of the ward `code`.
///
/// Precedence, lowest first: analyzed or unanalyzed base, hover, selection.
/// The selected ward always gets the selection outline whatever its risk.
#[must_use]
pub fn style_for(
    palette: &Palette,
    code: &str,
    risk: &AppRiskState,
    selection: &SelectionState,
    hovered: bool,
) -> RegionStyle {
    let mut style = risk.get(code).map_or_else(
        || RegionStyle {
            fill: palette.unanalyzed.fill.clone(),
            fill_opacity: palette.unanalyzed.fill_opacity,
            stroke: palette.unanalyzed.stroke.clone(),
            stroke_width: palette.unanalyzed.stroke_width,
            dash: Some(palette.unanalyzed.dash.clone()),
        },
        |prediction| RegionStyle {
            fill: palette.fill_for(prediction.risk_category).to_string(),
            fill_opacity: palette.analyzed.fill_opacity,
            stroke: palette.analyzed.stroke.clone(),
            stroke_width: palette.analyzed.stroke_width,
            dash: None,
        },
    );

    if hovered {
        style.fill_opacity = style.fill_opacity.max(palette.hover.fill_opacity);
        style.stroke_width = style.stroke_width.max(palette.hover.stroke_width);
    }

    if selection.is_selected(code) {
        style.stroke.clone_from(&palette.selected.stroke);
        style.stroke_width = palette.selected.stroke_width;
        style.dash = None;
    }

    style
}

/// One-line description shown under the pointer.
#[must_use]
pub fn tooltip(region: &Region, risk: &AppRiskState) -> String {
    risk.get(region.code()).map_or_else(
        || format!("{}: not analyzed", region.name()),
        |prediction| {
            format!(
                "{}: {} ({:.0}%)",
                region.name(),
                prediction.risk_category,
                prediction.flood_probability * 100.0
            )
        },
    )
}

/// Renders every ward as a GeoJSON feature with simplestyle properties.
///
/// An empty `regions` slice (boundaries failed to load) renders an empty
/// collection.
#[must_use]
pub fn render(
    palette: &Palette,
    regions: &[Region],
    risk: &AppRiskState,
    selection: &SelectionState,
    hovered: Option<&str>,
) -> FeatureCollection {
    let features = regions
        .iter()
        .map(|region| {
            let is_hovered = hovered.is_some_and(|code| code == region.code());
            let style = style_for(palette, region.code(), risk, selection, is_hovered);
            feature(region, &style, risk, selection, is_hovered)
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(
    region: &Region,
    style: &RegionStyle,
    risk: &AppRiskState,
    selection: &SelectionState,
    hovered: bool,
) -> Feature {
    let prediction = risk.get(region.code());
    let selected = selection.is_selected(region.code());

    let mut properties = JsonObject::new();
    properties.insert("code".into(), region.code().into());
    properties.insert("name".into(), region.name().into());
    properties.insert("analyzed".into(), prediction.is_some().into());
    properties.insert("selected".into(), selected.into());
    properties.insert("loading".into(), (selected && selection.loading).into());
    properties.insert("hovered".into(), hovered.into());
    properties.insert("tooltip".into(), tooltip(region, risk).into());

    if let Some(prediction) = prediction {
        properties.insert(
            "riskCategory".into(),
            prediction.risk_category.to_string().into(),
        );
        properties.insert(
            "floodProbability".into(),
            prediction.flood_probability.into(),
        );
        properties.insert("willFlood".into(), prediction.will_flood.into());
    }

    properties.insert("fill".into(), style.fill.clone().into());
    properties.insert("fill-opacity".into(), style.fill_opacity.into());
    properties.insert("stroke".into(), style.stroke.clone().into());
    properties.insert("stroke-width".into(), style.stroke_width.into());
    if let Some(dash) = &style.dash {
        properties.insert("stroke-dasharray".into(), dash.clone().into());
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(region.geometry()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Reads a property back out of a rendered feature.
#[must_use]
pub fn property<'a>(feature: &'a Feature, key: &str) -> Option<&'a JsonValue> {
    feature.properties.as_ref()?.get(key)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flood_map_controller::SelectionController;
    use flood_map_risk_models::RawPrediction;
    use geo::{LineString, MultiPolygon, Polygon};
    use serde_json::json;

    use super::*;

    fn square(code: &str, name: &str, lat: f64, lon: f64) -> Region {
        let ring = LineString::from(vec![
            (lon, lat),
            (lon + 0.01, lat),
            (lon + 0.01, lat + 0.01),
            (lon, lat + 0.01),
            (lon, lat),
        ]);
        Region::new(code, name, MultiPolygon(vec![Polygon::new(ring, vec![])]))
    }

    fn analyzed(controller: &mut SelectionController, code: &str, level: u64, p: f64) {
        let ticket = controller.select(code);
        let raw = RawPrediction::new(
            json!({
                "ward_code": code,
                "random_forest": { "flood_risk_level": level, "will_flood": level >= 1 },
                "bayesian_probability": p,
            }),
            Utc::now(),
        );
        controller.on_fetch_success(&ticket, &raw, None);
    }

    #[test]
    fn unanalyzed_wards_are_neutral_and_dashed() {
        let palette = Palette::embedded();
        let style = style_for(
            palette,
            "A",
            &AppRiskState::default(),
            &SelectionState::default(),
            false,
        );

        assert_eq!(style.fill, palette.unanalyzed.fill);
        assert!(style.fill_opacity < palette.analyzed.fill_opacity);
        assert_eq!(style.dash.as_deref(), Some(palette.unanalyzed.dash.as_str()));
    }

    #[test]
    fn critical_ward_gets_critical_fill() {
        let palette = Palette::embedded();
        let mut controller = SelectionController::default();
        analyzed(&mut controller, "H/E", 2, 0.82);

        let style = style_for(
            palette,
            "H/E",
            controller.risk(),
            controller.selection(),
            false,
        );

        assert_eq!(style.fill, palette.fill.critical);
        assert_eq!(style.stroke, palette.selected.stroke);
        assert!((style.stroke_width - palette.selected.stroke_width).abs() < f64::EPSILON);
        assert_eq!(style.dash, None);
    }

    #[test]
    fn selection_outline_overrides_hover_and_risk() {
        let palette = Palette::embedded();
        let mut controller = SelectionController::default();
        analyzed(&mut controller, "A", 0, 0.05);
        controller.select("B");

        let a = style_for(palette, "A", controller.risk(), controller.selection(), true);
        assert_eq!(a.fill, palette.fill.low);
        assert_eq!(a.stroke, palette.analyzed.stroke);
        assert!((a.stroke_width - palette.hover.stroke_width).abs() < f64::EPSILON);
        assert!((a.fill_opacity - palette.hover.fill_opacity).abs() < f64::EPSILON);

        let b = style_for(palette, "B", controller.risk(), controller.selection(), true);
        assert_eq!(b.fill, palette.unanalyzed.fill);
        assert_eq!(b.stroke, palette.selected.stroke);
        assert!((b.stroke_width - palette.selected.stroke_width).abs() < f64::EPSILON);
    }

    #[test]
    fn renders_simplestyle_features() {
        let palette = Palette::embedded();
        let mut controller = SelectionController::default();
        analyzed(&mut controller, "H/E", 2, 0.82);
        let regions = vec![
            square("H/E", "Bandra East", 19.05, 72.86),
            square("A", "Colaba", 18.91, 72.81),
        ];

        let collection = render(
            palette,
            &regions,
            controller.risk(),
            controller.selection(),
            Some("A"),
        );

        assert_eq!(collection.features.len(), 2);
        let he = &collection.features[0];
        assert_eq!(property(he, "fill"), Some(&json!(palette.fill.critical)));
        assert_eq!(property(he, "riskCategory"), Some(&json!("Critical")));
        assert_eq!(property(he, "selected"), Some(&json!(true)));
        assert_eq!(property(he, "tooltip"), Some(&json!("Bandra East: Critical (82%)")));
        assert!(property(he, "stroke-dasharray").is_none());
        assert!(he.geometry.is_some());

        let a = &collection.features[1];
        assert_eq!(property(a, "analyzed"), Some(&json!(false)));
        assert_eq!(property(a, "hovered"), Some(&json!(true)));
        assert_eq!(property(a, "tooltip"), Some(&json!("Colaba: not analyzed")));
        assert!(property(a, "riskCategory").is_none());
        assert!(property(a, "stroke-dasharray").is_some());
    }

    #[test]
    fn no_boundaries_renders_empty_collection() {
        let collection = render(
            Palette::embedded(),
            &[],
            &AppRiskState::default(),
            &SelectionState::default(),
            None,
        );
        assert!(collection.features.is_empty());
    }
}
