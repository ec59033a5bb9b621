use super::OkadaSource;
use crate::base::{InversionError, DEFAULT_POISSON, SURFACE_TOLERANCE};
use crate::geometry::Patch;

/// Relative distance (times the largest patch dimension) used to move an observation
/// point away from a singular location of the closed-form solution
pub const STABILIZING_OFFSET: f64 = 1e-6;

/// Defines the displacement response to unit slip on a patch
///
/// Implementations must be pure: the same inputs always give the same output and
/// no mutable state is shared between calls, so columns may be evaluated in parallel.
pub trait GreenKernel: Sync {
    /// Calculates the displacement (east, north, up) at `point` due to slip `slip` on `patch`
    ///
    /// # Input
    ///
    /// * `patch` -- the source patch
    /// * `slip` -- slip vector in the patch frame (along-strike, up-dip, normal)
    /// * `point` -- global coordinates of the observation point
    fn evaluate(&self, patch: &Patch, slip: &[f64; 3], point: &[f64; 3]) -> Result<[f64; 3], InversionError>;
}

/// Implements the Green's function of a rectangular dislocation in a homogeneous elastic half-space
///
/// The surface displacement is given by Okada (1985). Observation points must lie on the free
/// surface (z = 0). Points located exactly on a singular location (e.g., the surface corner of a
/// surface-breaking patch) are moved by `STABILIZING_OFFSET × max(length, width)` perpendicular to
/// strike, toward the footwall side; points exactly on a surface trace get the average of the two
/// sides, since the solution is discontinuous there.
#[derive(Clone, Copy, Debug)]
pub struct OkadaKernel {
    poisson: f64,
    mu_ratio: f64,
}

impl OkadaKernel {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `poisson` -- Poisson's coefficient of the half-space, in (-1, 0.5)
    pub fn new(poisson: f64) -> Result<Self, InversionError> {
        if !(poisson > -1.0 && poisson < 0.5) {
            return Err(InversionError::KernelDomain("poisson must be in (-1.0, 0.5)"));
        }
        Ok(OkadaKernel {
            poisson,
            mu_ratio: 1.0 - 2.0 * poisson,
        })
    }

    /// Returns the Poisson's coefficient
    pub fn poisson(&self) -> f64 {
        self.poisson
    }

    /// Converts the patch and the slip into Okada's source, frame, and dislocation
    ///
    /// Returns `(source, origin, x_axis, y_axis, dislocation)` where origin and axes are horizontal.
    fn okada_frame(&self, patch: &Patch, slip: &[f64; 3]) -> (OkadaSource, [f64; 2], [f64; 2], [f64; 2], [f64; 3]) {
        // overturned patches (dip > 90°) are the same plane seen with reversed strike;
        // the normal flips, so the dislocation flips to keep the same field
        let (strike, dip, dislocation) = if patch.dip() > 90.0 {
            (patch.strike() + 180.0, 180.0 - patch.dip(), [slip[0], -slip[1], slip[2]])
        } else {
            (patch.strike(), patch.dip(), *slip)
        };
        let (ss, cs) = f64::sin_cos(strike.to_radians());
        let x_axis = [ss, cs];
        let y_axis = [-cs, ss];
        let top = patch.position();
        let up_dip = patch.axes()[1];
        let w = patch.width();
        let bottom = [top[0] - w * up_dip[0], top[1] - w * up_dip[1], top[2] - w * up_dip[2]];
        let hl = 0.5 * patch.length();
        let origin = [bottom[0] - hl * x_axis[0], bottom[1] - hl * x_axis[1]];
        let source = OkadaSource {
            depth: -bottom[2],
            dip,
            length: patch.length(),
            width: w,
            mu_ratio: self.mu_ratio,
        };
        (source, origin, x_axis, y_axis, dislocation)
    }
}

impl Default for OkadaKernel {
    fn default() -> Self {
        OkadaKernel {
            poisson: DEFAULT_POISSON,
            mu_ratio: 1.0 - 2.0 * DEFAULT_POISSON,
        }
    }
}

impl GreenKernel for OkadaKernel {
    fn evaluate(&self, patch: &Patch, slip: &[f64; 3], point: &[f64; 3]) -> Result<[f64; 3], InversionError> {
        if f64::abs(point[2]) > SURFACE_TOLERANCE {
            return Err(InversionError::KernelDomain(
                "observation point must lie on the free surface (z = 0)",
            ));
        }
        if point.iter().any(|v| !v.is_finite()) || slip.iter().any(|v| !v.is_finite()) {
            return Err(InversionError::KernelDomain("observation point and slip must be finite"));
        }
        let (source, origin, x_axis, y_axis, dislocation) = self.okada_frame(patch, slip);
        source.validate().map_err(InversionError::KernelDomain)?;
        let dx = point[0] - origin[0];
        let dy = point[1] - origin[1];
        let x = dx * x_axis[0] + dy * x_axis[1];
        let y = dx * y_axis[0] + dy * y_axis[1];
        let mut u = source.displacement(x, y, &dislocation);
        if u.iter().any(|v| !v.is_finite()) {
            let offset = STABILIZING_OFFSET * f64::max(source.length, source.width);
            tracing::warn!(x, y, offset, "observation point is singular; moving it toward the footwall");
            u = source.displacement(x, y + offset, &dislocation);
            if u.iter().any(|v| !v.is_finite()) {
                return Err(InversionError::KernelDomain(
                    "observation point is singular and cannot be stabilized",
                ));
            }
        }
        Ok([
            u[0] * x_axis[0] + u[1] * y_axis[0],
            u[0] * x_axis[1] + u[1] * y_axis[1],
            u[2],
        ])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{GreenKernel, OkadaKernel};
    use crate::base::InversionError;
    use crate::geometry::Patch;
    use russell_lab::approx_eq;

    // Patch reproducing Okada (1985), Table 2, case 2, with strike = 0 (north):
    // the Okada origin is at (0, 0), the bottom edge at depth 4, and the
    // observation point (x = 2, y = 3) is at (east, north) = (-3, 2)
    fn table2_patch() -> Patch {
        let dip = 70.0_f64.to_radians();
        let top = [-2.0 * f64::cos(dip), 1.5, -4.0 + 2.0 * f64::sin(dip)];
        Patch::new(top, 3.0, 2.0, 0.0, 70.0).unwrap()
    }

    #[test]
    fn new_captures_errors() {
        assert_eq!(
            OkadaKernel::new(0.5).err(),
            Some(InversionError::KernelDomain("poisson must be in (-1.0, 0.5)"))
        );
        assert_eq!(OkadaKernel::new(0.25).unwrap().poisson(), 0.25);
        assert_eq!(OkadaKernel::default().poisson(), 0.25);
    }

    #[test]
    fn evaluate_captures_errors() {
        let kernel = OkadaKernel::default();
        let patch = table2_patch();
        assert_eq!(
            kernel.evaluate(&patch, &[1.0, 0.0, 0.0], &[0.0, 0.0, -1.0]).err(),
            Some(InversionError::KernelDomain(
                "observation point must lie on the free surface (z = 0)"
            ))
        );
        assert_eq!(
            kernel.evaluate(&patch, &[f64::NAN, 0.0, 0.0], &[0.0, 0.0, 0.0]).err(),
            Some(InversionError::KernelDomain("observation point and slip must be finite"))
        );
        let above = Patch::new([0.0, 0.0, 0.5], 3.0, 2.0, 0.0, 70.0).unwrap();
        assert_eq!(
            kernel.evaluate(&above, &[1.0, 0.0, 0.0], &[5.0, 0.0, 0.0]).err(),
            Some(InversionError::KernelDomain(
                "the top edge of the source must not be above the free surface"
            ))
        );
    }

    #[test]
    fn evaluate_matches_okada_table2() {
        let kernel = OkadaKernel::new(0.25).unwrap();
        let patch = table2_patch();
        let point = [-3.0, 2.0, 0.0];
        // global (east, north, up) = (-uy, ux, uz) for strike = 0
        let u = kernel.evaluate(&patch, &[1.0, 0.0, 0.0], &point).unwrap();
        approx_eq(u[0], 4.298e-3, 1e-6);
        approx_eq(u[1], -8.689e-3, 1e-6);
        approx_eq(u[2], -2.747e-3, 1e-6);
        let u = kernel.evaluate(&patch, &[0.0, 1.0, 0.0], &point).unwrap();
        approx_eq(u[0], 3.527e-2, 1e-5);
        approx_eq(u[1], -4.682e-3, 1e-6);
        approx_eq(u[2], -3.564e-2, 1e-5);
        let u = kernel.evaluate(&patch, &[0.0, 0.0, 1.0], &point).unwrap();
        approx_eq(u[0], -1.056e-2, 1e-5);
        approx_eq(u[1], -2.660e-4, 1e-7);
        approx_eq(u[2], 3.214e-3, 1e-6);
    }

    #[test]
    fn evaluate_is_invariant_under_rotation() {
        // rotating the patch and the observation point about the vertical axis
        // rotates the horizontal displacement by the same angle
        let kernel = OkadaKernel::default();
        let patch = table2_patch();
        let point = [-3.0, 2.0, 0.0];
        let slip = [0.3, 0.7, 0.0];
        let reference = kernel.evaluate(&patch, &slip, &point).unwrap();
        let angle = 35.0_f64;
        let (sa, ca) = f64::sin_cos(angle.to_radians());
        // clockwise rotation (strike increases by `angle`)
        let rotate = |v: &[f64; 3]| [ca * v[0] + sa * v[1], -sa * v[0] + ca * v[1], v[2]];
        let rotated = Patch::new(
            rotate(&patch.position()),
            patch.length(),
            patch.width(),
            patch.strike() + angle,
            patch.dip(),
        )
        .unwrap();
        let u = kernel.evaluate(&rotated, &slip, &rotate(&point)).unwrap();
        let expected = rotate(&reference);
        for i in 0..3 {
            approx_eq(u[i], expected[i], 1e-13);
        }
    }

    #[test]
    fn overturned_patch_is_consistent() {
        // the same plane described with (strike, dip) and (strike + 180, 180 - dip) has
        // opposite normals; slip (s, d, n) on one equals slip (s, -d, n) on the other
        let kernel = OkadaKernel::default();
        let a = Patch::new([100.0, -50.0, -10.0], 80.0, 40.0, 30.0, 60.0).unwrap();
        let b = Patch::new([100.0, -50.0, -10.0], 80.0, 40.0, 210.0, 120.0).unwrap();
        for i in 0..3 {
            approx_eq(a.axes()[1][i], b.axes()[1][i], 1e-14);
            approx_eq(a.axes()[2][i], -b.axes()[2][i], 1e-14);
        }
        let point = [130.0, 25.0, 0.0];
        let ua = kernel.evaluate(&a, &[0.2, 0.9, 0.1], &point).unwrap();
        let ub = kernel.evaluate(&b, &[0.2, -0.9, 0.1], &point).unwrap();
        for i in 0..3 {
            approx_eq(ua[i], ub[i], 1e-12);
        }
    }

    #[test]
    fn singular_corner_is_stabilized() {
        // vertical, surface-breaking, north-striking patch; observe at the top-start corner
        let kernel = OkadaKernel::default();
        let patch = Patch::new([0.0, 0.0, 0.0], 10.0, 5.0, 0.0, 90.0).unwrap();
        let corner = patch.corners()[0];
        let u = kernel.evaluate(&patch, &[1.0, 0.0, 0.0], &[corner[0], corner[1], 0.0]).unwrap();
        assert!(u.iter().all(|v| v.is_finite()));
        assert!(u.iter().all(|v| f64::abs(*v) < 1.0));
    }

    #[test]
    fn far_field_decays() {
        let kernel = OkadaKernel::default();
        let patch = Patch::new([0.0, 0.0, -1000.0], 2000.0, 1000.0, 45.0, 30.0).unwrap();
        let near = kernel.evaluate(&patch, &[0.0, 1.0, 0.0], &[500.0, 500.0, 0.0]).unwrap();
        let far = kernel.evaluate(&patch, &[0.0, 1.0, 0.0], &[5e6, 5e6, 0.0]).unwrap();
        let norm = |v: &[f64; 3]| f64::sqrt(v[0] * v[0] + v[1] * v[1] + v[2] * v[2]);
        assert!(norm(&near) > 1e-3);
        assert!(norm(&far) < 1e-6);
    }
}
