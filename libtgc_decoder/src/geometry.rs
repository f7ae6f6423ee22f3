//! Geometry service interface and the small vector math used by the
//! projector.
//!
//! The detector description is an external collaborator; the decoder only
//! needs per-channel extents, channel positions, and the chamber's
//! local/global transform, expressed by the `ElementGeometry` trait. All
//! implementations must be read-only and safe for unsynchronized concurrent
//! reads.

use serde::{Deserialize, Serialize};

use super::identifiers::{ChannelId, ElementId};

/// Local 2D point on a chamber surface: `x` is the radial offset from the
/// chamber center (the wire measurement direction), `y` the azimuthal arc
/// (the strip measurement direction).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Global 3D point, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    /// Distance from the beam line.
    pub fn perp(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn eta(&self) -> f64 {
        let theta = self.perp().atan2(self.z);
        -(theta / 2.0).tan().ln()
    }
}

/// Wrapped azimuthal difference in (-pi, pi].
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = a - b;
    while d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    }
    while d <= -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d
}

/// One chamber of the detector description.
pub trait ElementGeometry {
    fn element_id(&self) -> ElementId;

    /// Whether the channel exists on this chamber.
    fn contains(&self, channel: &ChannelId) -> bool;

    /// Global position of the channel center.
    fn channel_position(&self, channel: &ChannelId) -> Option<Vec3>;

    /// Local measurement extent of a wire gang (min, max).
    fn wire_extent(&self, gas_gap: u8, channel: u16) -> Option<(f64, f64)>;

    /// Local measurement extent of a strip (min, max) at the given radial
    /// local coordinate; strips fan out so their edges depend on it.
    fn strip_extent(&self, gas_gap: u8, channel: u16, local_r: f64) -> Option<(f64, f64)>;

    /// Project a global point onto the chamber surface. Fails when the point
    /// is off the surface plane beyond tolerance.
    fn to_local(&self, global: Vec3) -> Option<Vec2>;

    /// Embed a local point into the global frame.
    fn to_global(&self, local: Vec2) -> Vec3;
}

/// Chamber registry of the detector description.
pub trait TgcGeometry {
    fn element(&self, element: &ElementId) -> Option<&dyn ElementGeometry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_of_forward_point() {
        let p = Vec3::new(3000.0, 0.0, 15000.0);
        // eta = -ln(tan(theta/2)) with theta = atan(r/z)
        let theta = (3000.0f64 / 15000.0).atan();
        let expected = -(theta / 2.0).tan().ln();
        assert!((p.eta() - expected).abs() < 1e-12);
        assert!(p.eta() > 0.0);
        let m = Vec3::new(3000.0, 0.0, -15000.0);
        assert!(m.eta() < 0.0);
    }

    #[test]
    fn test_delta_phi_wraps() {
        let pi = std::f64::consts::PI;
        assert!((delta_phi(pi - 0.1, -pi + 0.1) - (-0.2)).abs() < 1e-12);
        assert!((delta_phi(0.3, 0.1) - 0.2).abs() < 1e-12);
    }
}
