//! Administrative boundaries from GeoJSON FeatureCollections

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{to_multipolygon, AdministrativeUnit, BoundarySet};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// Properties tried, in order, when no id field is configured
const ID_FIELDS: &[&str] = &["unit_id", "UBIGEO", "GID_2", "GID_1"];

/// Properties tried, in order, when no name field is configured
const NAME_FIELDS: &[&str] = &["name", "NAME_CLEAN", "NAME_2", "NAME_1", "NAME"];

/// Options for reading boundaries
#[derive(Debug, Clone, Default)]
pub struct BoundaryOptions {
    /// Property holding the unit identifier
    pub id_field: Option<String>,
    /// Property holding the unit name
    pub name_field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    crs: Option<CrsDoc>,
    features: Vec<FeatureDoc>,
}

/// Legacy (pre RFC 7946) named CRS member
#[derive(Debug, Deserialize)]
struct CrsDoc {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryDoc {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

/// Read a GeoJSON FeatureCollection of administrative units.
///
/// A missing or unparseable file is [`Error::DataUnavailable`]. Features whose
/// geometry is missing or not a (Multi)Polygon are kept with `geometry: None`
/// and logged, so they surface later as malformed units.
pub fn read_boundaries<P: AsRef<Path>>(path: P, options: &BoundaryOptions) -> Result<BoundarySet> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
    let set = parse_boundaries(&text, options).map_err(|e| match e {
        Error::Json(e) => Error::unavailable(path, e),
        other => other,
    })?;
    info!("Boundaries: {} units from {} ({})", set.len(), path.display(), set.crs);
    Ok(set)
}

/// Parse a GeoJSON FeatureCollection held in memory
pub fn parse_boundaries(text: &str, options: &BoundaryOptions) -> Result<BoundarySet> {
    let doc: FeatureCollectionDoc = serde_json::from_str(text)?;
    if doc.type_ != "FeatureCollection" {
        return Err(Error::Other(format!(
            "expected a GeoJSON FeatureCollection, found '{}'",
            doc.type_
        )));
    }

    let crs = doc
        .crs
        .map(|c| CRS::parse(&c.properties.name))
        .unwrap_or_else(CRS::wgs84);

    let units = doc
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| build_unit(index, feature, options))
        .collect();

    BoundarySet::new(units, crs)
}

fn build_unit(index: usize, feature: FeatureDoc, options: &BoundaryOptions) -> AdministrativeUnit {
    let empty = Map::new();
    let props = feature.properties.as_ref().unwrap_or(&empty);

    let unit_id = options
        .id_field
        .as_deref()
        .and_then(|field| property_text(props, field))
        .or_else(|| ID_FIELDS.iter().find_map(|field| property_text(props, field)))
        .or_else(|| feature.id.as_ref().and_then(value_text))
        // '#' keeps positional ids apart from real codes
        .unwrap_or_else(|| format!("#{}", index + 1));

    let name = options
        .name_field
        .as_deref()
        .and_then(|field| property_text(props, field))
        .or_else(|| NAME_FIELDS.iter().find_map(|field| property_text(props, field)))
        .unwrap_or_else(|| unit_id.clone());

    let geometry = match feature.geometry {
        None | Some(Value::Null) => {
            warn!("Unit {} ({}): feature has no geometry", unit_id, name);
            None
        }
        Some(value) => match parse_geometry(value) {
            Ok(geometry) => Some(geometry),
            Err(reason) => {
                warn!("Unit {} ({}): unusable geometry: {}", unit_id, name, reason);
                None
            }
        },
    };

    AdministrativeUnit::new(unit_id, &name, geometry)
}

fn property_text(props: &Map<String, Value>, field: &str) -> Option<String> {
    props.get(field).and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_geometry(value: Value) -> std::result::Result<MultiPolygon<f64>, String> {
    let doc: GeometryDoc = serde_json::from_value(value).map_err(|e| e.to_string())?;
    match doc {
        GeometryDoc::Polygon { coordinates } => Ok(to_multipolygon(polygon_from(coordinates)?)),
        GeometryDoc::MultiPolygon { coordinates } => coordinates
            .into_iter()
            .map(polygon_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(MultiPolygon::new),
    }
}

fn polygon_from(rings: Vec<Vec<Vec<f64>>>) -> std::result::Result<Polygon<f64>, String> {
    let mut rings = rings.into_iter().map(ring_from);
    let exterior = rings.next().ok_or("polygon without rings")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from(positions: Vec<Vec<f64>>) -> std::result::Result<LineString<f64>, String> {
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(format!("position with {} coordinates", p.len())),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "UBIGEO": "21", "NAME_1": "Puno" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-70.5, -16.3], [-69.5, -16.3], [-69.5, -15.3], [-70.5, -15.3], [-70.5, -16.3]]]
                }
            },
            {
                "type": "Feature",
                "id": 7,
                "properties": { "name": "Junín" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-76.0, -12.0], [-75.0, -12.0], [-75.0, -11.0], [-76.0, -12.0]]],
                        [[[-74.0, -12.0], [-73.5, -12.0], [-73.5, -11.5], [-74.0, -12.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Callao" },
                "geometry": { "type": "Point", "coordinates": [-77.1, -12.05] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_units_and_ids() {
        let set = parse_boundaries(SAMPLE, &BoundaryOptions::default()).unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.crs.is_equivalent(&CRS::wgs84()));

        let ids: Vec<&str> = set.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["21", "7", "#3", "#4"]);

        let names: Vec<&str> = set.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["PUNO", "JUNIN", "CALLAO", "#4"]);
    }

    #[test]
    fn test_positional_ids_do_not_clash_with_codes() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "name": "Tumbes" }, "geometry": null },
                { "type": "Feature", "properties": { "unit_id": "1", "name": "Amazonas" }, "geometry": null }
            ]
        }"#;
        let set = parse_boundaries(text, &BoundaryOptions::default()).unwrap();
        let ids: Vec<&str> = set.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["#1", "1"]);
    }

    #[test]
    fn test_geometry_kinds() {
        let set = parse_boundaries(SAMPLE, &BoundaryOptions::default()).unwrap();
        assert_eq!(set.units[0].geometry.as_ref().map(|g| g.0.len()), Some(1));
        assert_eq!(set.units[1].geometry.as_ref().map(|g| g.0.len()), Some(2));
        // Point and null geometries are kept as malformed units
        assert!(set.units[2].geometry.is_none());
        assert!(set.units[3].geometry.is_none());
    }

    #[test]
    fn test_configured_fields() {
        let options = BoundaryOptions {
            id_field: Some("NAME_1".into()),
            name_field: Some("UBIGEO".into()),
        };
        let set = parse_boundaries(SAMPLE, &options).unwrap();
        assert_eq!(set.units[0].unit_id, "Puno");
        assert_eq!(set.units[0].name, "21");
    }

    #[test]
    fn test_legacy_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32718" } },
            "features": []
        }"#;
        let set = parse_boundaries(text, &BoundaryOptions::default()).unwrap();
        assert_eq!(set.crs.epsg(), Some(32718));
        assert!(set.is_empty());
    }

    #[test]
    fn test_not_a_feature_collection() {
        let text = r#"{ "type": "Feature", "features": [] }"#;
        assert!(parse_boundaries(text, &BoundaryOptions::default()).is_err());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = read_boundaries("/nonexistent/peru.geojson", &BoundaryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
    }
}
