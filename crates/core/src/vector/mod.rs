//! Administrative unit geometries

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo::{Area, BoundingRect};
use geo_types::{LineString, MultiPolygon, Polygon};
use std::collections::HashSet;

/// An administrative unit (department, province or district) to aggregate over.
///
/// `geometry` is `None` when the source feature carried no usable polygon;
/// such units are kept so they show up as malformed in the results instead
/// of silently disappearing.
#[derive(Debug, Clone, PartialEq)]
pub struct AdministrativeUnit {
    /// Unique identifier (UBIGEO code, GID, or `#` + feature index)
    pub unit_id: String,
    /// Display name, normalised with [`clean_name`]
    pub name: String,
    /// Unit boundary
    pub geometry: Option<MultiPolygon<f64>>,
}

impl AdministrativeUnit {
    pub fn new(unit_id: impl Into<String>, name: &str, geometry: Option<MultiPolygon<f64>>) -> Self {
        Self {
            unit_id: unit_id.into(),
            name: clean_name(name),
            geometry,
        }
    }

    /// Geometry bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let rect = self.geometry.as_ref()?.bounding_rect()?;
        Some((rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Check that the geometry can be used for cell-centre inclusion tests.
    ///
    /// Returns [`Error::MalformedGeometry`] for a missing or empty geometry,
    /// rings with fewer than four positions, open rings, non-finite
    /// coordinates or zero area.
    pub fn validate(&self) -> Result<&MultiPolygon<f64>> {
        let malformed = |reason: &str| Error::MalformedGeometry {
            unit_id: self.unit_id.clone(),
            reason: reason.to_string(),
        };

        let geometry = self.geometry.as_ref().ok_or_else(|| malformed("no polygon geometry"))?;
        if geometry.0.is_empty() {
            return Err(malformed("empty multipolygon"));
        }

        for polygon in &geometry.0 {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                check_ring(ring).map_err(|reason| malformed(reason))?;
            }
        }

        if geometry.unsigned_area() <= 0.0 {
            return Err(malformed("zero area"));
        }

        Ok(geometry)
    }
}

fn check_ring(ring: &LineString<f64>) -> std::result::Result<(), &'static str> {
    if ring.0.len() < 4 {
        return Err("ring has fewer than 4 positions");
    }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("non-finite coordinate");
    }
    if !ring.is_closed() {
        return Err("ring is not closed");
    }
    Ok(())
}

/// The boundary set for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    pub units: Vec<AdministrativeUnit>,
    pub crs: CRS,
}

impl BoundarySet {
    /// Build a boundary set, rejecting duplicate unit ids
    pub fn new(units: Vec<AdministrativeUnit>, crs: CRS) -> Result<Self> {
        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            if !seen.insert(unit.unit_id.as_str()) {
                return Err(Error::DuplicateUnit(unit.unit_id.clone()));
            }
        }
        Ok(Self { units, crs })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdministrativeUnit> {
        self.units.iter()
    }
}

/// Lift a polygon into a one-member multipolygon
pub fn to_multipolygon(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon])
}

/// Normalise a unit name: trim, upper-case and fold Latin diacritics to ASCII.
///
/// `"Apurímac"` becomes `"APURIMAC"`, `"Junín"` becomes `"JUNIN"`. Characters
/// with no ASCII fold (other than `Ñ`, which folds to `N`) are dropped.
pub fn clean_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| {
            let folded = match c {
                'á' | 'à' | 'â' | 'ä' | 'ã' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
                'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
                'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
                'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
                'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
                'ñ' | 'Ñ' => 'N',
                'ç' | 'Ç' => 'C',
                c if c.is_ascii() => c.to_ascii_uppercase(),
                _ => return None,
            };
            Some(folded)
        })
        .collect()
}
