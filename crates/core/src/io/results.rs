//! Result table persistence
//!
//! Rows follow a stable column schema:
//! `unit_id, name, count, min, max, mean, std, p10, p90, range,
//! frost_risk, extreme_cold, risk_level`. Missing statistics are written as
//! empty CSV cells and JSON `null`, never as zero.

use crate::error::{Error, Result};
use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column order of the persisted table
pub const RESULT_COLUMNS: [&str; 13] = [
    "unit_id",
    "name",
    "count",
    "min",
    "max",
    "mean",
    "std",
    "p10",
    "p90",
    "range",
    "frost_risk",
    "extreme_cold",
    "risk_level",
];

/// One persisted row of the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub unit_id: String,
    pub name: String,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub p10: Option<f64>,
    pub p90: Option<f64>,
    pub range: Option<f64>,
    pub frost_risk: bool,
    pub extreme_cold: bool,
    pub risk_level: String,
}

/// Write rows as CSV with a header line
pub fn write_results_csv<P: AsRef<Path>>(rows: &[ResultRow], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(rows, BufWriter::new(file))
}

/// Write rows as CSV into any writer
pub fn write_csv<W: Write>(rows: &[ResultRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv.write_record(RESULT_COLUMNS)?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Read a result table previously written by [`write_results_csv`]
pub fn read_results_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ResultRow>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| Error::unavailable(path, e))?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(RESULT_COLUMNS.iter().copied()) {
        return Err(Error::unavailable(
            path,
            format!("unexpected columns: {}", headers.iter().collect::<Vec<_>>().join(",")),
        ));
    }

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<ResultRow>, csv::Error>>()
        .map_err(Error::from)
}

/// Write rows with their geometries as a GeoJSON FeatureCollection
pub fn write_results_geojson<P: AsRef<Path>>(
    rows: &[(ResultRow, Option<&MultiPolygon<f64>>)],
    path: P,
) -> Result<()> {
    let features: Vec<Value> = rows
        .iter()
        .map(|(row, geometry)| -> Result<Value> {
            Ok(json!({
                "type": "Feature",
                "id": row.unit_id,
                "properties": serde_json::to_value(row)?,
                "geometry": geometry.map(geometry_value),
            }))
        })
        .collect::<Result<_>>()?;

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

fn geometry_value(geometry: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = geometry
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.0.iter().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect();

    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn row(unit_id: &str, mean: Option<f64>) -> ResultRow {
        ResultRow {
            unit_id: unit_id.to_string(),
            name: format!("UNIT {}", unit_id),
            count: if mean.is_some() { 4 } else { 0 },
            min: mean.map(|m| m - 2.0),
            max: mean.map(|m| m + 2.0),
            mean,
            std: mean.map(|_| 1.5),
            p10: mean.map(|m| m - 1.5),
            p90: mean.map(|m| m + 1.5),
            range: mean.map(|_| 4.0),
            frost_risk: mean.is_some_and(|m| m - 2.0 < 0.0),
            extreme_cold: false,
            risk_level: if mean.is_some() { "Medium".into() } else { "Unclassifiable".into() },
        }
    }

    #[test]
    fn test_csv_header_and_nulls() {
        let mut buf = Vec::new();
        write_csv(&[row("01", Some(1.0)), row("02", None)], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], RESULT_COLUMNS.join(","));
        assert_eq!(lines[1], "01,UNIT 01,4,-1.0,3.0,1.0,1.5,-0.5,2.5,4.0,true,false,Medium");
        assert_eq!(lines[2], "02,UNIT 02,0,,,,,,,,false,false,Unclassifiable");
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim_end(), RESULT_COLUMNS.join(","));
    }

    #[test]
    fn test_csv_file_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peru_tmin_analysis.csv");
        let rows = vec![row("01", Some(-3.25)), row("02", None)];

        write_results_csv(&rows, &path).unwrap();
        assert_eq!(read_results_csv(&path).unwrap(), rows);
    }

    #[test]
    fn test_read_rejects_foreign_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "NAME_CLEAN,mean\nPUNO,-4.1\n").unwrap();
        assert!(matches!(read_results_csv(&path), Err(Error::DataUnavailable { .. })));
    }

    #[test]
    fn test_geojson_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peru_tmin_analysis.geojson");
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);

        write_results_geojson(&[(row("01", Some(6.0)), Some(&square)), (row("02", None), None)], &path)
            .unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["mean"], json!(6.0));
        assert_eq!(features[0]["geometry"]["type"], json!("MultiPolygon"));
        assert_eq!(features[0]["geometry"]["coordinates"][0][0][1], json!([1.0, 0.0]));
        assert!(features[1]["properties"]["mean"].is_null());
        assert!(features[1]["geometry"].is_null());
    }
}
