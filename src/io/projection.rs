use crate::base::InversionError;

/// Mean radius of the Earth (m)
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Defines the conversion between geodetic and planar (east, north) coordinates
pub trait MapProjection {
    /// Converts (longitude, latitude) in degrees to (x, y) in meters
    fn forward(&self, lon: f64, lat: f64) -> Result<[f64; 2], InversionError>;

    /// Converts (x, y) in meters to (longitude, latitude) in degrees
    fn inverse(&self, x: f64, y: f64) -> [f64; 2];
}

/// Implements the transverse Mercator projection on a sphere
///
/// The x axis points east and the y axis points north at the projection centre.
///
/// # Reference
///
/// 1. Snyder JP (1987) Map Projections: A Working Manual, USGS Professional Paper 1395, p. 58
#[derive(Clone, Copy, Debug)]
pub struct TransverseMercator {
    lon0: f64,
    lat0: f64,
    radius: f64,
}

impl TransverseMercator {
    /// Allocates a new instance centred at (lon0, lat0) in degrees
    pub fn new(lon0: f64, lat0: f64) -> Result<Self, InversionError> {
        if !lon0.is_finite() || !(lat0 >= -90.0 && lat0 <= 90.0) {
            return Err(InversionError::InvalidInput("projection centre is invalid"));
        }
        Ok(TransverseMercator {
            lon0,
            lat0,
            radius: EARTH_RADIUS,
        })
    }

    /// Allocates a new instance centred at the mean of the given (longitude, latitude) points
    pub fn centred_on(points: &[[f64; 2]]) -> Result<Self, InversionError> {
        if points.is_empty() {
            return Err(InversionError::InvalidInput("cannot centre a projection on zero points"));
        }
        let n = points.len() as f64;
        let lon0 = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let lat0 = points.iter().map(|p| p[1]).sum::<f64>() / n;
        TransverseMercator::new(lon0, lat0)
    }

    /// Returns the projection centre (longitude, latitude) in degrees
    pub fn centre(&self) -> [f64; 2] {
        [self.lon0, self.lat0]
    }
}

impl MapProjection for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<[f64; 2], InversionError> {
        if !lon.is_finite() || !(lat >= -90.0 && lat <= 90.0) {
            return Err(InversionError::InvalidInput("longitude and latitude are invalid"));
        }
        let phi = lat.to_radians();
        let dl = (lon - self.lon0).to_radians();
        let b = f64::cos(phi) * f64::sin(dl);
        if f64::abs(b) >= 1.0 - 1e-12 {
            return Err(InversionError::InvalidInput("point is too far from the central meridian"));
        }
        let x = self.radius * f64::atanh(b);
        let y = self.radius * (f64::atan2(f64::sin(phi), f64::cos(phi) * f64::cos(dl)) - self.lat0.to_radians());
        Ok([x, y])
    }

    fn inverse(&self, x: f64, y: f64) -> [f64; 2] {
        let d = y / self.radius + self.lat0.to_radians();
        let xr = x / self.radius;
        let lat = f64::asin(f64::sin(d) / f64::cosh(xr));
        let lon = self.lon0.to_radians() + f64::atan2(f64::sinh(xr), f64::cos(d));
        [lon.to_degrees(), lat.to_degrees()]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
