//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
///
/// Rasters carry an EPSG code from their GeoKeys; boundary files carry
/// either nothing (GeoJSON default WGS84) or a named CRS such as
/// `urn:ogc:def:crs:EPSG::32718`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse a CRS name as found in GeoJSON `crs` members or on the command line.
    ///
    /// Accepts `EPSG:32718`, `epsg:4326`, `urn:ogc:def:crs:EPSG::32718`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` and `OGC:CRS84`. CRS84 differs from
    /// EPSG:4326 only in axis order, which GeoJSON fixes as lon/lat anyway,
    /// so it maps to 4326. Anything else is kept as WKT text.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Self::wgs84();
        }

        if let Some(pos) = upper.rfind("EPSG") {
            let code = upper[pos + 4..].rsplit(':').next().unwrap_or_default();
            if let Ok(code) = code.parse::<u32>() {
                return Self::from_epsg(code);
            }
        }

        Self::from_wkt(trimmed)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison only; no WKT normalisation is attempted
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(32718);
        assert_eq!(crs.epsg(), Some(32718));
        assert_eq!(crs.identifier(), "EPSG:32718");
    }

    #[test]
    fn test_parse_urn_and_short_forms() {
        assert_eq!(CRS::parse("urn:ogc:def:crs:EPSG::32718").epsg(), Some(32718));
        assert_eq!(CRS::parse("EPSG:4326").epsg(), Some(4326));
        assert_eq!(CRS::parse("epsg:4326").epsg(), Some(4326));
        assert_eq!(CRS::parse("urn:ogc:def:crs:EPSG:6.6:4326").epsg(), Some(4326));
        assert_eq!(CRS::parse("urn:ogc:def:crs:OGC:1.3:CRS84").epsg(), Some(4326));
        assert_eq!(CRS::parse("OGC:CRS84").epsg(), Some(4326));
    }

    #[test]
    fn test_parse_unknown_keeps_text() {
        let crs = CRS::parse("LOCAL_CS[\"grid\"]");
        assert_eq!(crs.epsg(), None);
        assert_eq!(crs.wkt(), Some("LOCAL_CS[\"grid\"]"));
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(CRS::parse("OGC:CRS84").is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(32718).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_wkt("GEOGCS[\"x\"]").is_equivalent(&CRS::wgs84()));
    }
}
