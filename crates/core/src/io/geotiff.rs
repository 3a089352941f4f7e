//! Single-band GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing is taken from ModelPixelScale + ModelTiepoint (or
//! ModelTransformation), the no-data sentinel from `GDAL_NODATA` and the
//! EPSG code and raster type from the GeoKeyDirectory.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

/// GeoKey ids used by the reader and writer
mod geokeys {
    pub const MODEL_TYPE: u16 = 1024;
    pub const RASTER_TYPE: u16 = 1025;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;

    pub const MODEL_TYPE_PROJECTED: u16 = 1;
    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
    pub const RASTER_PIXEL_IS_POINT: u16 = 2;
}

/// Read a single-band GeoTIFF into a Raster
///
/// A missing or unreadable file is reported as [`Error::DataUnavailable`].
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::unavailable(path, e))?;
    let raster = decode_geotiff(BufReader::new(file))
        .map_err(|e| Error::unavailable(path, e))?;

    debug!(
        "read {} ({} x {}, crs {:?}, nodata {:?})",
        path.display(),
        raster.cols(),
        raster.rows(),
        raster.crs().map(|c| c.identifier()),
        raster.nodata()
    );
    Ok(raster)
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{}: {}", context, e))
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    match decoder.colortype().map_err(tiff_err("Cannot read color type"))? {
        ColorType::Gray(_) => {}
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "expected a single-band raster, found {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    // The sentinel is stored as text, so it is narrowed to the sample type
    // before comparing against widened cells.
    let (data, narrow): (Vec<T>, fn(f64) -> Option<f64>) =
        match decoder.read_image().map_err(tiff_err("Cannot read image data"))? {
            DecodingResult::F32(buf) => (cast_all(buf), |v: f64| Some(v as f32 as f64)),
            DecodingResult::F64(buf) => (cast_all(buf), Some),
            DecodingResult::U8(buf) => (cast_all(buf), narrow_to::<u8>),
            DecodingResult::U16(buf) => (cast_all(buf), narrow_to::<u16>),
            DecodingResult::U32(buf) => (cast_all(buf), narrow_to::<u32>),
            DecodingResult::I8(buf) => (cast_all(buf), narrow_to::<i8>),
            DecodingResult::I16(buf) => (cast_all(buf), narrow_to::<i16>),
            DecodingResult::I32(buf) => (cast_all(buf), narrow_to::<i32>),
            _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
        };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    let keys = read_geokeys(&mut decoder);
    if let Some(transform) = read_geotransform(&mut decoder, keys.pixel_is_point) {
        raster.set_transform(transform);
    }
    raster.set_nodata(
        read_nodata(&mut decoder)
            .and_then(narrow)
            .and_then(num_traits::cast),
    );
    raster.set_crs(keys.crs);

    Ok(raster)
}

/// Integer sentinels that do not fit the sample type match no cell
fn narrow_to<S: NumCast>(value: f64) -> Option<f64> {
    num_traits::cast::<f64, S>(value.round())?.to_f64()
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
///
/// PixelIsPoint rasters anchor the model at the centre of the first cell;
/// the returned transform is shifted so its origin is the cell corner.
fn read_geotransform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    pixel_is_point: bool,
) -> Option<GeoTransform> {
    let mut transform = model_transform(decoder)?;
    if pixel_is_point {
        transform.origin_x -= 0.5 * (transform.pixel_width + transform.row_rotation);
        transform.origin_y -= 0.5 * (transform.col_rotation + transform.pixel_height);
    }
    Some(transform)
}

fn model_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let t = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if t.len() >= 16 {
        return Some(GeoTransform {
            origin_x: t[3],
            origin_y: t[7],
            pixel_width: t[0],
            pixel_height: t[5],
            row_rotation: t[1],
            col_rotation: t[4],
        });
    }

    None
}

/// No-data sentinel from the GDAL_NODATA ASCII tag
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let text = text.trim_end_matches('\0').trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        _ => text.parse::<f64>().ok(),
    }
}

/// Keys of interest from the GeoKeyDirectory
#[derive(Debug, Default)]
struct GeoKeys {
    /// Projected codes win over geographic ones
    crs: Option<CRS>,
    pixel_is_point: bool,
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoKeys {
    decoder
        .get_tag_u32_vec(Tag::GeoKeyDirectoryTag)
        .map(|keys| parse_geokeys(&keys))
        .unwrap_or_default()
}

fn parse_geokeys(keys: &[u32]) -> GeoKeys {
    // [version, revision, minor, count, (key_id, location, count, value)*]
    let Some(&num_keys) = keys.get(3) else {
        return GeoKeys::default();
    };
    let mut geographic = None;
    let mut projected = None;
    let mut pixel_is_point = false;

    for entry in keys[4..].chunks_exact(4).take(num_keys as usize) {
        let (key_id, location, value) = (entry[0] as u16, entry[1], entry[3]);
        // location != 0 means the value lives in another tag
        if location != 0 {
            continue;
        }
        match key_id {
            geokeys::RASTER_TYPE => pixel_is_point = value == geokeys::RASTER_PIXEL_IS_POINT as u32,
            geokeys::PROJECTED_CS_TYPE if value != 0 && value != 32767 => projected = Some(value),
            geokeys::GEOGRAPHIC_TYPE if value != 0 && value != 32767 => geographic = Some(value),
            _ => {}
        }
    }

    GeoKeys {
        crs: projected.or(geographic).map(CRS::from_epsg),
        pixel_is_point,
    }
}

/// Write a Raster to a single-band 64-bit float GeoTIFF
///
/// Writes the geotransform, `GDAL_NODATA` when a sentinel is set, and a
/// GeoKeyDirectory naming the EPSG code when the CRS has one.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let keys = build_geokeys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, keys.as_slice())
        .map_err(tiff_err("Cannot write geokey tag"))?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(tiff_err("Cannot write nodata tag"))?;
    }

    image
        .write_data(&data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}

fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg()).and_then(|code| u16::try_from(code).ok());

    let mut entries: Vec<[u16; 4]> = vec![[geokeys::RASTER_TYPE, 0, 1, geokeys::RASTER_PIXEL_IS_AREA]];
    match epsg {
        Some(code) if (4000..5000).contains(&code) => {
            entries.insert(0, [geokeys::MODEL_TYPE, 0, 1, geokeys::MODEL_TYPE_GEOGRAPHIC]);
            entries.push([geokeys::GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        Some(code) => {
            entries.insert(0, [geokeys::MODEL_TYPE, 0, 1, geokeys::MODEL_TYPE_PROJECTED]);
            entries.push([geokeys::PROJECTED_CS_TYPE, 0, 1, code]);
        }
        None => {}
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}
