//! Planar endcap implementation of the geometry service.
//!
//! Chambers are flat annular sectors at a fixed z per station. Wires gang
//! radially from the outer edge inwards, strips fan azimuthally across the
//! sector. This stands in for the full detector description in tests and in
//! the command-line driver; the decode engine itself only sees the
//! `TgcGeometry` trait.

use fxhash::FxHashMap;

use super::cabling_map::CablingMap;
use super::geometry::{delta_phi, ElementGeometry, TgcGeometry, Vec2, Vec3};
use super::identifiers::{ChannelId, ElementHash, ElementId, Station};

/// Azimuthal half-opening of one endcap sector (48 sectors per wheel).
const SECTOR_HALF_DPHI: f64 = std::f64::consts::PI / 48.0;
/// Tolerance for projecting a global point onto the chamber plane.
const SURFACE_TOLERANCE: f64 = 50.0;

/// Wire counts per chamber, outermost first.
const DOUBLET_WIRE_COUNTS: [u16; 5] = [40, 32, 32, 96, 120];
const TRIPLET_WIRE_COUNTS: [u16; 5] = [45, 45, 45, 45, 44];
const INNER_WIRE_COUNT: u16 = 32;
const STRIP_COUNT: u16 = 32;

/// Radial chamber bounds (min, max) shared by the big wheels, outermost
/// chamber first.
const WHEEL_RADII: [(f64, f64); 5] = [
    (10200.0, 12000.0),
    (8900.0, 10200.0),
    (7600.0, 8900.0),
    (5200.0, 7600.0),
    (2200.0, 5200.0),
];
const INNER_RADII: (f64, f64) = (2000.0, 7000.0);

fn station_z(station: Station) -> f64 {
    match station {
        Station::Triplet => 13440.0,
        Station::MiddleDoublet => 14700.0,
        Station::PivotDoublet => 15150.0,
        Station::Inner => 7400.0,
    }
}

#[derive(Debug, Clone)]
pub struct PlanarChamber {
    id: ElementId,
    z: f64,
    r_min: f64,
    r_max: f64,
    phi_center: f64,
    n_wires: u16,
    n_strips: u16,
    n_gaps: u8,
}

impl PlanarChamber {
    fn new(id: ElementId) -> Option<Self> {
        let eta_index = id.eta.unsigned_abs() as usize;
        if eta_index == 0 {
            return None;
        }
        let (r_min, r_max, n_wires, n_gaps) = match id.station {
            Station::Triplet => {
                let (lo, hi) = *WHEEL_RADII.get(eta_index - 1)?;
                (lo, hi, TRIPLET_WIRE_COUNTS[eta_index - 1], 3)
            }
            Station::MiddleDoublet | Station::PivotDoublet => {
                let (lo, hi) = *WHEEL_RADII.get(eta_index - 1)?;
                (lo, hi, DOUBLET_WIRE_COUNTS[eta_index - 1], 2)
            }
            Station::Inner => (INNER_RADII.0, INNER_RADII.1, INNER_WIRE_COUNT, 2),
        };
        let z = station_z(id.station) * id.side().z_sign();
        let phi_center = (id.phi as f64) * 2.0 * SECTOR_HALF_DPHI - SECTOR_HALF_DPHI;
        Some(PlanarChamber {
            id,
            z,
            r_min,
            r_max,
            phi_center,
            n_wires,
            n_strips: STRIP_COUNT,
            n_gaps,
        })
    }

    fn r_mid(&self) -> f64 {
        0.5 * (self.r_min + self.r_max)
    }

    fn wire_pitch(&self) -> f64 {
        (self.r_max - self.r_min) / self.n_wires as f64
    }

    fn strip_dphi(&self) -> f64 {
        2.0 * SECTOR_HALF_DPHI / self.n_strips as f64
    }

    fn strip_allowed(&self, gas_gap: u8) -> bool {
        // The middle layer of a triplet carries no strips.
        !(self.id.station == Station::Triplet && gas_gap == 2)
    }
}

impl ElementGeometry for PlanarChamber {
    fn element_id(&self) -> ElementId {
        self.id
    }

    fn contains(&self, channel: &ChannelId) -> bool {
        if channel.element != self.id || channel.gas_gap == 0 || channel.gas_gap > self.n_gaps {
            return false;
        }
        if channel.is_strip {
            self.strip_allowed(channel.gas_gap)
                && channel.channel >= 1
                && channel.channel <= self.n_strips
        } else {
            channel.channel >= 1 && channel.channel <= self.n_wires
        }
    }

    fn channel_position(&self, channel: &ChannelId) -> Option<Vec3> {
        if !self.contains(channel) {
            return None;
        }
        let (r, phi) = if channel.is_strip {
            let phi = self.phi_center
                + (channel.channel as f64 - 0.5 * (self.n_strips as f64 + 1.0)) * self.strip_dphi();
            (self.r_mid(), phi)
        } else {
            // Wire 1 sits at the outer edge.
            let r = self.r_max - (channel.channel as f64 - 0.5) * self.wire_pitch();
            (r, self.phi_center)
        };
        Some(Vec3::new(r * phi.cos(), r * phi.sin(), self.z))
    }

    fn wire_extent(&self, gas_gap: u8, channel: u16) -> Option<(f64, f64)> {
        if gas_gap == 0 || gas_gap > self.n_gaps || channel < 1 || channel > self.n_wires {
            return None;
        }
        let pitch = self.wire_pitch();
        let hi = self.r_max - (channel as f64 - 1.0) * pitch - self.r_mid();
        Some((hi - pitch, hi))
    }

    fn strip_extent(&self, gas_gap: u8, channel: u16, local_r: f64) -> Option<(f64, f64)> {
        if gas_gap == 0
            || gas_gap > self.n_gaps
            || !self.strip_allowed(gas_gap)
            || channel < 1
            || channel > self.n_strips
        {
            return None;
        }
        let r = self.r_mid() + local_r;
        let dphi = self.strip_dphi();
        let lo = (channel as f64 - 1.0 - 0.5 * self.n_strips as f64) * dphi * r;
        Some((lo, lo + dphi * r))
    }

    fn to_local(&self, global: Vec3) -> Option<Vec2> {
        if (global.z - self.z).abs() > SURFACE_TOLERANCE {
            return None;
        }
        let r = global.perp();
        Some(Vec2::new(
            r - self.r_mid(),
            delta_phi(global.phi(), self.phi_center) * self.r_mid(),
        ))
    }

    fn to_global(&self, local: Vec2) -> Vec3 {
        let r = self.r_mid() + local.x;
        let phi = self.phi_center + local.y / self.r_mid();
        Vec3::new(r * phi.cos(), r * phi.sin(), self.z)
    }
}

/// Chamber registry backed by the planar model, covering every element of a
/// cabling map.
#[derive(Debug, Clone, Default)]
pub struct PlanarGeometry {
    chambers: FxHashMap<ElementId, PlanarChamber>,
}

impl PlanarGeometry {
    /// Build one chamber per element known to the cabling map.
    pub fn from_cabling(cabling: &CablingMap) -> Self {
        let mut chambers = FxHashMap::default();
        for hash in 0..cabling.module_hash_max() {
            if let Some(element) = cabling.element_of(ElementHash(hash as u16)) {
                if let Some(chamber) = PlanarChamber::new(*element) {
                    chambers.insert(*element, chamber);
                }
            }
        }
        PlanarGeometry { chambers }
    }
}

impl TgcGeometry for PlanarGeometry {
    fn element(&self, element: &ElementId) -> Option<&dyn ElementGeometry> {
        self.chambers
            .get(element)
            .map(|c| c as &dyn ElementGeometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chamber() -> PlanarChamber {
        PlanarChamber::new(ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: 1,
            phi: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_wire_positions_decrease_with_channel() {
        let c = chamber();
        let first = c
            .channel_position(&ChannelId {
                element: c.id,
                gas_gap: 1,
                is_strip: false,
                channel: 1,
            })
            .unwrap();
        let last = c
            .channel_position(&ChannelId {
                element: c.id,
                gas_gap: 1,
                is_strip: false,
                channel: 40,
            })
            .unwrap();
        assert!(first.perp() > last.perp());
        assert!(c
            .channel_position(&ChannelId {
                element: c.id,
                gas_gap: 1,
                is_strip: false,
                channel: 41,
            })
            .is_none());
    }

    #[test]
    fn test_wire_extent_width_is_pitch() {
        let c = chamber();
        let (lo, hi) = c.wire_extent(1, 7).unwrap();
        assert!((hi - lo - c.wire_pitch()).abs() < 1e-9);
        assert!(c.wire_extent(3, 7).is_none()); // doublet has two gaps
    }

    #[test]
    fn test_local_global_round_trip() {
        let c = chamber();
        let local = Vec2::new(120.0, -35.0);
        let back = c.to_local(c.to_global(local)).unwrap();
        assert!((back.x - local.x).abs() < 1e-6);
        assert!((back.y - local.y).abs() < 1e-6);
        // Points far off the plane do not project.
        let mut off = c.to_global(local);
        off.z += 500.0;
        assert!(c.to_local(off).is_none());
    }

    #[test]
    fn test_triplet_middle_layer_has_no_strips() {
        let t = PlanarChamber::new(ElementId {
            station: Station::Triplet,
            is_forward: false,
            eta: 1,
            phi: 1,
        })
        .unwrap();
        assert!(t.strip_extent(1, 5, 0.0).is_some());
        assert!(t.strip_extent(2, 5, 0.0).is_none());
        assert!(t.strip_extent(3, 5, 0.0).is_some());
    }

    #[test]
    fn test_side_c_sits_at_negative_z() {
        let c = PlanarChamber::new(ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: -1,
            phi: 1,
        })
        .unwrap();
        assert!(c.z < 0.0);
    }
}
