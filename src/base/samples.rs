use super::SegmentConfig;
use russell_lab::math::PI;

/// Holds some sample fault segments and observation layouts
pub struct Samples;

impl Samples {
    /// Returns a large, steeply dipping segment (1000 km × 1000 km, strike 20°, dip 80°) with a 40 × 20 grid
    pub fn segment_large() -> SegmentConfig {
        SegmentConfig {
            position: [0.0, 0.0, -1000.0],
            strike: 20.0,
            dip: 80.0,
            length: 1_000_000.0,
            width: 1_000_000.0,
            n_along_strike: 40,
            n_along_dip: 20,
        }
    }

    /// Returns a shallow thrust segment (40 km × 20 km, strike 0°, dip 30°) with a 4 × 2 grid
    pub fn segment_thrust() -> SegmentConfig {
        SegmentConfig {
            position: [0.0, 0.0, -2000.0],
            strike: 0.0,
            dip: 30.0,
            length: 40_000.0,
            width: 20_000.0,
            n_along_strike: 4,
            n_along_dip: 2,
        }
    }

    /// Returns a vertical strike-slip segment reaching the surface (30 km × 10 km, strike 90°) with a 3 × 1 grid
    pub fn segment_strike_slip() -> SegmentConfig {
        SegmentConfig {
            position: [0.0, 0.0, 0.0],
            strike: 90.0,
            dip: 90.0,
            length: 30_000.0,
            width: 10_000.0,
            n_along_strike: 3,
            n_along_dip: 1,
        }
    }

    /// Returns `n` surface points evenly spaced on a circle centred at the origin
    pub fn ring_points(n: usize, radius: f64) -> Vec<[f64; 3]> {
        (0..n)
            .map(|i| {
                let a = 2.0 * PI * (i as f64) / (n as f64);
                [radius * f64::cos(a), radius * f64::sin(a), 0.0]
            })
            .collect()
    }

    /// Returns an `nx × ny` grid of surface points centred at the origin
    ///
    /// The x coordinate runs fastest.
    pub fn grid_points(nx: usize, ny: usize, spacing: f64) -> Vec<[f64; 3]> {
        let x0 = -0.5 * spacing * ((nx as f64) - 1.0);
        let y0 = -0.5 * spacing * ((ny as f64) - 1.0);
        let mut points = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                points.push([x0 + spacing * (i as f64), y0 + spacing * (j as f64), 0.0]);
            }
        }
        points
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
