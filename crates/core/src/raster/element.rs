//! Raster element trait for generic cell values

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a temperature raster cell.
///
/// Temperatures are continuous, so only floating point cells are supported;
/// integer GeoTIFF samples are widened on read. Conversion to `f64` comes
/// from the `NumCast`/`ToPrimitive` bound.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + Float + NumCast + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * 100.0 * nd.abs().max(1.0),
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_float!(f32);
impl_raster_element_float!(f64);
