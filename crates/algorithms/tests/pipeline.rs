//! End-to-end runs over fixtures written to a temporary directory.
//!
//! The raster is a 4x5 grid of 1-degree cells with its upper-left corner at
//! (-75, -10). Each row is covered by exactly one unit:
//!
//! | row | unit    | values                  |
//! |-----|---------|-------------------------|
//! | 0   | `ANDES` | -12, -3, 2, 5, 8        |
//! | 1   | `SELVA` | 5, 6, 7, 9, 12          |
//! | 2   | `SIERRA`| -4, 0, -1, 1, -1        |
//! | 3   | `MASKED`| all nodata              |
//!
//! Two more units lie outside the grid or carry a point geometry.

use approx::assert_relative_eq;
use friaje_algorithms::prelude::*;
use friaje_core::io::{read_boundaries, write_geotiff, BoundaryOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

const NODATA: f64 = -9999.0;

fn tmin_raster(last_row: [f64; 5]) -> Raster<f64> {
    let mut values = vec![
        -12.0, -3.0, 2.0, 5.0, 8.0, //
        5.0, 6.0, 7.0, 9.0, 12.0, //
        -4.0, 0.0, -1.0, 1.0, -1.0,
    ];
    values.extend(last_row);
    let mut raster = Raster::from_vec(values, 4, 5).unwrap();
    raster.set_transform(GeoTransform::new(-75.0, -10.0, 1.0, -1.0));
    raster.set_crs(Some(CRS::wgs84()));
    raster.set_nodata(Some(NODATA));
    raster
}

fn row_polygon(row: usize) -> String {
    let top = -10.0 - row as f64;
    let bottom = top - 1.0;
    format!(
        r#"{{ "type": "Polygon", "coordinates": [[[-75.0, {b}], [-70.0, {b}], [-70.0, {t}], [-75.0, {t}], [-75.0, {b}]]] }}"#,
        b = bottom,
        t = top
    )
}

fn boundaries_json() -> String {
    let feature = |id: &str, name: &str, geometry: &str| {
        format!(
            r#"{{ "type": "Feature", "properties": {{ "UBIGEO": "{}", "NAME_1": "{}" }}, "geometry": {} }}"#,
            id, name, geometry
        )
    };
    let features = [
        feature("01", "Andes", &row_polygon(0)),
        feature("02", "Selva", &row_polygon(1)),
        feature("03", "Sierra", &row_polygon(2)),
        feature("04", "Masked", &row_polygon(3)),
        feature(
            "05",
            "Outside",
            r#"{ "type": "Polygon", "coordinates": [[[10.0, 10.0], [11.0, 10.0], [11.0, 11.0], [10.0, 11.0], [10.0, 10.0]]] }"#,
        ),
        feature("06", "Point", r#"{ "type": "Point", "coordinates": [-72.5, -10.5] }"#),
    ];
    format!(
        r#"{{ "type": "FeatureCollection", "features": [{}] }}"#,
        features.join(",")
    )
}

struct Fixture {
    dir: tempfile::TempDir,
    raster: PathBuf,
    boundaries: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("tmin.tif");
        let boundaries = dir.path().join("units.geojson");
        write_geotiff(&tmin_raster([NODATA; 5]), &raster).unwrap();
        std::fs::write(&boundaries, boundaries_json()).unwrap();
        Self {
            dir,
            raster,
            boundaries,
        }
    }

    fn out(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn analyze(fixture: &Fixture) -> ResultTable {
    AnalysisSession::default()
        .analyze(
            &fixture.raster,
            &fixture.boundaries,
            &ZonalParams::default(),
            &RiskClassifier::default(),
        )
        .unwrap()
}

fn unit<'a>(table: &'a ResultTable, id: &str) -> &'a AnalysisResult {
    table.get(id).unwrap_or_else(|| panic!("unit {} missing", id))
}

#[test]
fn one_row_per_unit_in_input_order() {
    let fixture = Fixture::new();
    let table = analyze(&fixture);

    let ids: Vec<&str> = table.iter().map(|r| r.unit_id.as_str()).collect();
    assert_eq!(ids, vec!["01", "02", "03", "04", "05", "06"]);
    assert_eq!(unit(&table, "03").name, "SIERRA");
}

#[test]
fn very_high_unit_with_both_flags() {
    let table = analyze(&Fixture::new());
    let andes = unit(&table, "01");
    let s = andes.summary.unwrap();

    assert_eq!(andes.count, 5);
    assert_eq!(s.min, -12.0);
    assert_eq!(s.max, 8.0);
    assert_eq!(s.mean, 0.0);
    assert_relative_eq!(s.p10, -8.4, epsilon = 1e-9);
    assert_relative_eq!(s.p90, 6.8, epsilon = 1e-9);
    assert_eq!(andes.risk_level, Some(RiskLevel::VeryHigh));
    assert!(andes.frost_risk);
    assert!(andes.extreme_cold);
}

#[test]
fn warm_unit_is_low_and_cold_mean_is_high() {
    let table = analyze(&Fixture::new());

    let selva = unit(&table, "02");
    assert_eq!(selva.risk_level, Some(RiskLevel::Low));
    assert!(!selva.frost_risk && !selva.extreme_cold);

    let sierra = unit(&table, "03");
    let s = sierra.summary.unwrap();
    assert_relative_eq!(s.mean, -1.0);
    assert_eq!(s.min, -4.0);
    assert_eq!(sierra.risk_level, Some(RiskLevel::High));
    assert!(sierra.frost_risk);
    assert!(!sierra.extreme_cold);
}

#[test]
fn units_without_data_are_unclassifiable() {
    let table = analyze(&Fixture::new());

    for id in ["04", "05", "06"] {
        let r = unit(&table, id);
        assert_eq!(r.count, 0, "unit {}", id);
        assert!(r.summary.is_none(), "unit {}", id);
        assert_eq!(r.risk_level, None, "unit {}", id);
        assert!(!r.frost_risk && !r.extreme_cold, "unit {}", id);
    }

    let row = unit(&table, "05").to_row();
    assert_eq!(row.mean, None);
    assert_eq!(row.risk_level, "Unclassifiable");
}

#[test]
fn statistics_are_ordered_and_flags_match() {
    let table = analyze(&Fixture::new());

    for r in table.iter() {
        match r.summary {
            Some(s) => {
                assert!(r.count > 0);
                assert!(s.min <= s.p10 && s.p10 <= s.p90 && s.p90 <= s.max, "{:?}", s);
                assert!(s.min <= s.mean && s.mean <= s.max, "{:?}", s);
                // holds for every fixture unit
                assert!(s.p10 <= s.mean && s.mean <= s.p90, "{:?}", s);
                assert!(r.risk_level.is_some());
                assert_eq!(r.frost_risk, s.min < 0.0);
                assert_eq!(r.extreme_cold, s.p10 < -5.0);
            }
            None => {
                assert_eq!(r.count, 0);
                assert!(r.risk_level.is_none());
            }
        }
    }
}

fn bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[test]
fn repeated_runs_write_identical_outputs() {
    let fixture = Fixture::new();
    let first = analyze(&fixture);
    let second = analyze(&fixture);
    assert_eq!(first, second);

    let (a, b) = (fixture.out("a.csv"), fixture.out("b.csv"));
    first.write_csv(&a).unwrap();
    second.write_csv(&b).unwrap();
    assert_eq!(bytes(&a), bytes(&b));

    let (ga, gb) = (fixture.out("a.geojson"), fixture.out("b.geojson"));
    first.write_geojson(&ga).unwrap();
    second.write_geojson(&gb).unwrap();
    assert_eq!(bytes(&ga), bytes(&gb));
}

#[test]
fn csv_reads_back_for_reporting() {
    let fixture = Fixture::new();
    let table = analyze(&fixture);
    let path = fixture.out("peru_tmin_analysis.csv");
    table.write_csv(&path).unwrap();

    let reloaded = ResultTable::read_csv(&path).unwrap();
    assert_eq!(reloaded.to_rows(), table.to_rows());
    assert_eq!(reloaded.risk_distribution(), table.risk_distribution());

    let coldest: Vec<&str> = reloaded.coldest(2).iter().map(|r| r.unit_id.as_str()).collect();
    assert_eq!(coldest, vec!["03", "01"]);

    let filtered = reloaded.filter(&ResultFilter {
        risk_levels: vec![Some(RiskLevel::High), None],
        max_mean: None,
    });
    assert_eq!(filtered.len(), 4);
}

/// Rewrite a fixture in place and move its mtime so the change is visible
/// even on filesystems with coarse timestamps.
fn touch_later(path: &Path) {
    let modified = std::fs::metadata(path).unwrap().modified().unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(modified + Duration::from_secs(60)).unwrap();
}

#[test]
fn session_reuses_inputs_until_files_change() {
    let fixture = Fixture::new();
    let mut session = AnalysisSession::default();
    let params = ZonalParams::default();
    let classifier = RiskClassifier::default();

    session.analyze(&fixture.raster, &fixture.boundaries, &params, &classifier).unwrap();
    session.analyze(&fixture.raster, &fixture.boundaries, &params, &classifier).unwrap();
    assert_eq!(session.loads(), (1, 1));

    let before = std::fs::metadata(&fixture.raster).unwrap().len();
    write_geotiff(&tmin_raster([20.0, 21.0, 22.0, 23.0, 24.0]), &fixture.raster).unwrap();
    assert_eq!(std::fs::metadata(&fixture.raster).unwrap().len(), before);
    touch_later(&fixture.raster);

    let table = session
        .analyze(&fixture.raster, &fixture.boundaries, &params, &classifier)
        .unwrap();
    assert_eq!(session.loads(), (2, 1));
    assert_eq!(unit(&table, "04").risk_level, Some(RiskLevel::Low));

    session.clear();
    session.analyze(&fixture.raster, &fixture.boundaries, &params, &classifier).unwrap();
    assert_eq!(session.loads(), (3, 2));
}

#[test]
fn crs_mismatch_is_fatal() {
    let fixture = Fixture::new();
    let mut raster = tmin_raster([NODATA; 5]);
    raster.set_crs(Some(CRS::from_epsg(32718)));
    let boundaries = read_boundaries(&fixture.boundaries, &BoundaryOptions::default()).unwrap();

    let err = run_analysis(&raster, &boundaries, &ZonalParams::default(), &RiskClassifier::default())
        .unwrap_err();
    assert!(matches!(err, Error::CoordinateMismatch(_, _)));

    raster.set_crs(None);
    let lenient = run_analysis(&raster, &boundaries, &ZonalParams::default(), &RiskClassifier::default());
    assert!(lenient.is_ok());

    let strict = ZonalParams {
        strict_crs: true,
        ..Default::default()
    };
    assert!(run_analysis(&raster, &boundaries, &strict, &RiskClassifier::default()).is_err());
}

#[test]
fn missing_inputs_are_unavailable() {
    let fixture = Fixture::new();
    let mut session = AnalysisSession::default();
    let err = session
        .analyze(
            fixture.out("missing.tif"),
            &fixture.boundaries,
            &ZonalParams::default(),
            &RiskClassifier::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::DataUnavailable { .. }));
}
