//! Projection of resolved channels onto chamber surfaces.
//!
//! Turns geometric channels into local positions, widths and uncertainty
//! inputs. Coincidence windows may span two chambers; the span projections
//! below collapse the window's edge channels into one representative
//! position by moving the edge radii through an eta-preserving transform
//! into the representative chamber's z plane, instead of mixing two
//! chambers' local frames directly.

use super::geometry::{delta_phi, ElementGeometry, TgcGeometry, Vec2, Vec3};
use super::identifiers::ChannelId;

/// Result of projecting a single channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelProjection {
    pub local: Vec2,
    pub width: f64,
    pub error: f64,
}

/// Result of collapsing a multi-chamber window onto one chamber.
#[derive(Debug, Clone, Copy)]
pub struct SpanProjection {
    pub width: f64,
    /// Position along the measurement direction, in the representative
    /// chamber's local frame.
    pub measurement: f64,
    pub local: Vec2,
    pub representative: ChannelId,
}

pub struct GeometryProjector<'a> {
    geometry: &'a dyn TgcGeometry,
    min_width: f64,
    drop_zero_width: bool,
}

/// Cylindrical coordinates of a global point. Fails on the beam line. The
/// returned eta is unsigned.
pub fn r_phi_eta_from_xyz(p: Vec3) -> Option<(f64, f64, f64)> {
    if p.x.abs() < f64::MIN_POSITIVE && p.y.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let r = p.perp();
    let phi = p.phi();
    let theta = r.atan2(p.z.abs()).abs();
    let eta = -(theta / 2.0).tan().ln();
    Some((r, phi, eta))
}

/// Unsigned pseudo-rapidity of a cylinder point.
pub fn eta_from_r_z(r: f64, z: f64) -> Option<f64> {
    let r = r.abs();
    let z = z.abs();
    if r < f64::MIN_POSITIVE && z < f64::MIN_POSITIVE {
        return None;
    }
    let theta = r.atan2(z).abs();
    Some(-(theta / 2.0).tan().ln())
}

/// Radius at |z| of the eta line; the eta-preserving transform.
pub fn r_from_eta_z(eta: f64, z: f64) -> Option<f64> {
    let theta_half = (-eta).exp().atan();
    let r = (2.0 * theta_half).tan() * z.abs();
    if r >= 0.0 {
        Some(r)
    } else {
        None
    }
}

impl<'a> GeometryProjector<'a> {
    pub fn new(geometry: &'a dyn TgcGeometry, min_width: f64, drop_zero_width: bool) -> Self {
        GeometryProjector {
            geometry,
            min_width,
            drop_zero_width,
        }
    }

    /// Chamber descriptor owning a channel; fails when the description does
    /// not actually contain the channel (geometry inconsistency).
    pub fn descriptor(&self, channel: &ChannelId) -> Option<&dyn ElementGeometry> {
        let descriptor = self.geometry.element(&channel.element)?;
        if !descriptor.contains(channel) {
            spdlog::debug!("illegal channel for element geometry: {}", channel);
            return None;
        }
        Some(descriptor)
    }

    /// Physical extent of a channel, from the chamber description.
    pub fn channel_width(
        &self,
        descriptor: &dyn ElementGeometry,
        channel: &ChannelId,
    ) -> Option<f64> {
        let (lo, hi) = if channel.is_strip {
            let local_r = self.channel_local(descriptor, channel)?.x;
            descriptor.strip_extent(channel.gas_gap, channel.channel, local_r)?
        } else {
            descriptor.wire_extent(channel.gas_gap, channel.channel)?
        };
        let width = hi - lo;
        if width < self.min_width {
            spdlog::debug!("width for {} is degenerate: {}", channel, width);
        }
        Some(width)
    }

    /// Local position of the channel center.
    pub fn channel_local(
        &self,
        descriptor: &dyn ElementGeometry,
        channel: &ChannelId,
    ) -> Option<Vec2> {
        let position = descriptor.channel_position(channel)?;
        let local = descriptor.to_local(position);
        if local.is_none() {
            spdlog::warn!("global to local projection failed for {}", channel);
        }
        local
    }

    fn width_ok(&self, width: f64) -> bool {
        !(width < self.min_width && self.drop_zero_width)
    }

    fn half_width_ok(&self, half_width: f64) -> bool {
        !(half_width < self.min_width / 2.0 && self.drop_zero_width)
    }

    /// Single-channel projection: local position, width and the flat
    /// uncertainty derived from it.
    pub fn project(&self, channel: &ChannelId) -> Option<ChannelProjection> {
        let descriptor = self.descriptor(channel)?;
        let local = self.channel_local(descriptor, channel)?;
        let width = self.channel_width(descriptor, channel)?;
        if !self.width_ok(width) {
            return None;
        }
        Some(ChannelProjection {
            local,
            width,
            error: width / 12.0f64.sqrt(),
        })
    }

    /// Collapse the two pivot-plane edge wires of a high-pT window. The
    /// first channel is the larger-radius edge.
    pub fn wire_span_pivot(&self, channels: &[ChannelId; 2]) -> Option<SpanProjection> {
        let descriptors = [self.descriptor(&channels[0])?, self.descriptor(&channels[1])?];
        let mut r = [0.0f64; 2];
        let mut z = [0.0f64; 2];
        for i in 0..2 {
            let position = descriptors[i].channel_position(&channels[i])?;
            let (radius, _, _) = r_phi_eta_from_xyz(position)?;
            let half_width = self.channel_width(descriptors[i], &channels[i])? / 2.0;
            if !self.half_width_ok(half_width) {
                return None;
            }
            // Edge channels contribute their outer half-widths.
            r[i] = if i == 0 {
                radius + half_width
            } else {
                radius - half_width
            };
            z[i] = position.z;
        }
        // Carry the outer edge to the representative plane along its eta line.
        let eta = eta_from_r_z(r[0], z[0])?;
        r[0] = r_from_eta_z(eta, z[1])?;

        let width = r[0] - r[1];
        let gas_gap = channels[1].gas_gap;
        let (gang_lo, _) = descriptors[1].wire_extent(gas_gap, channels[1].channel)?;
        let measurement = gang_lo + width / 2.0;
        let local_y = self.channel_local(descriptors[1], &channels[1])?.y;
        Some(SpanProjection {
            width,
            measurement,
            local: Vec2::new(measurement, local_y),
            representative: channels[1],
        })
    }

    /// Collapse the two pivot-plane edge strips of a high-pT window.
    pub fn strip_span_pivot(
        &self,
        channels: &[ChannelId; 2],
        is_backward: bool,
        is_aside: bool,
    ) -> Option<SpanProjection> {
        let descriptors = [self.descriptor(&channels[0])?, self.descriptor(&channels[1])?];
        let mut local_r = [0.0f64; 2];
        for i in 0..2 {
            local_r[i] = self.channel_local(descriptors[i], &channels[i])?.x;
        }

        let (index, reverse) = strip_ordering(is_backward, is_aside);
        let representative_index = if is_backward { 1 } else { 0 };

        let (_, strip_max) = descriptors[index[0]].strip_extent(
            channels[index[0]].gas_gap,
            channels[index[0]].channel,
            local_r[index[0]],
        )?;
        let (strip_min, _) = descriptors[index[1]].strip_extent(
            channels[index[1]].gas_gap,
            channels[index[1]].channel,
            local_r[index[1]],
        )?;
        let width = strip_max - strip_min;
        let mut measurement = strip_min + width / 2.0;
        if reverse {
            measurement *= -1.0;
        }
        let local_x = self.channel_local(descriptors[1], &channels[1])?.x;
        Some(SpanProjection {
            width,
            measurement,
            local: Vec2::new(local_x, measurement),
            representative: channels[representative_index],
        })
    }

    /// Collapse the four non-pivot edge wires of a high-pT window. Channels
    /// 0/1 are the large/small-radius window edges; 2/3 are their nearest
    /// companions on the third layer, used to detect which edge crosses a
    /// chamber boundary.
    pub fn wire_span_nonpivot(&self, channels: &[ChannelId; 4]) -> Option<SpanProjection> {
        let mut descriptors = Vec::with_capacity(4);
        for channel in channels.iter() {
            descriptors.push(self.descriptor(channel)?);
        }

        // Pick the window edge that stays inside one chamber; its companion
        // tells whether that edge already sits on the third layer.
        let boundary_flag = if channels[1].element == channels[3].element {
            if channels[1].gas_gap == channels[3].gas_gap {
                1
            } else {
                3
            }
        } else if channels[0].element == channels[2].element {
            if channels[0].gas_gap == channels[2].gas_gap {
                0
            } else {
                2
            }
        } else {
            spdlog::debug!("wire window touches three readout elements");
            return None;
        };

        let representative = channels[boundary_flag];
        let rep_descriptor = self.descriptor(&representative)?;

        let positions = [
            descriptors[0].channel_position(&channels[0])?,
            descriptors[1].channel_position(&channels[1])?,
            rep_descriptor.channel_position(&representative)?,
        ];
        let mut r = [0.0f64; 3];
        for i in 0..3 {
            let (radius, _, _) = r_phi_eta_from_xyz(positions[i])?;
            r[i] = radius;
            if i < 2 {
                let half_width = self.channel_width(descriptors[i], &channels[i])? / 2.0;
                if !self.half_width_ok(half_width) {
                    return None;
                }
                if i == 0 {
                    r[0] += half_width;
                } else {
                    r[1] -= half_width;
                }
                let eta = eta_from_r_z(r[i], positions[i].z)?;
                r[i] = r_from_eta_z(eta, positions[2].z)?;
            }
        }

        let width = r[0] - r[1];
        if width < 0.0 {
            spdlog::debug!("negative non-pivot wire window width {}", width);
            return None;
        }

        let gas_gap = representative.gas_gap;
        let half_width = self.channel_width(rep_descriptor, &representative)? / 2.0;
        if !self.half_width_ok(half_width) {
            return None;
        }
        let (gang_lo, gang_hi) = rep_descriptor.wire_extent(gas_gap, representative.channel)?;
        let measurement = if boundary_flag % 2 == 1 {
            // Lower edge is clean; grow downwards from its gang floor.
            r[2] -= half_width;
            gang_lo - (r[2] - r[1]) + width / 2.0
        } else {
            // Higher edge is clean; grow upwards from its gang ceiling.
            r[2] += half_width;
            gang_hi + (r[0] - r[2]) - width / 2.0
        };

        let local_y = self.channel_local(descriptors[1], &channels[1])?.y;
        Some(SpanProjection {
            width,
            measurement,
            local: Vec2::new(measurement, local_y),
            representative,
        })
    }

    /// Collapse the four non-pivot strips of a high-pT window; the
    /// representative is whichever sits on the third layer.
    pub fn strip_span_nonpivot(
        &self,
        channels: &[ChannelId; 4],
        is_backward: bool,
        is_aside: bool,
    ) -> Option<SpanProjection> {
        let representative = *channels.iter().find(|c| c.gas_gap == 3)?;
        let rep_descriptor = self.descriptor(&representative)?;
        let descriptors = [self.descriptor(&channels[0])?, self.descriptor(&channels[1])?];

        // The representative position only sanity-checks the window; the
        // measurement comes from the two edge strips.
        rep_descriptor.channel_position(&representative)?;

        let (index, reverse) = strip_ordering(is_backward, is_aside);
        let mut local_r = [0.0f64; 2];
        for i in 0..2 {
            local_r[i] = self.channel_local(descriptors[i], &channels[i])?.x;
        }
        let (_, strip_max) = descriptors[index[0]].strip_extent(
            channels[index[0]].gas_gap,
            channels[index[0]].channel,
            local_r[index[0]],
        )?;
        let (strip_min, _) = descriptors[index[1]].strip_extent(
            channels[index[1]].gas_gap,
            channels[index[1]].channel,
            local_r[index[1]],
        )?;
        let width = strip_max - strip_min;
        let mut measurement = strip_min + width / 2.0;
        if reverse {
            measurement *= -1.0;
        }
        let local_x = self.channel_local(descriptors[1], &channels[1])?.x;
        Some(SpanProjection {
            width,
            measurement,
            local: Vec2::new(local_x, measurement),
            representative,
        })
    }

    /// Radial span of a sector-logic candidate from its three wire channels
    /// (larger-radius edge, center, smaller-radius edge). Returns (width, r,
    /// z) of the span center on the representative chamber.
    pub fn sl_wire_geometry(&self, channels: &[ChannelId; 3]) -> Option<(f64, f64, f64)> {
        let descriptors = [
            self.descriptor(&channels[0])?,
            self.descriptor(&channels[1])?,
            self.descriptor(&channels[2])?,
        ];
        let center_local = self.channel_local(descriptors[2], &channels[2])?;

        let mut r = [0.0f64; 3];
        let mut z = [0.0f64; 3];
        for i in [0usize, 2] {
            let position = descriptors[i].channel_position(&channels[i])?;
            let (radius, _, _) = r_phi_eta_from_xyz(position)?;
            let half_width = self.channel_width(descriptors[i], &channels[i])? / 2.0;
            if !self.half_width_ok(half_width) {
                return None;
            }
            r[i] = if i == 0 {
                radius + half_width
            } else {
                radius - half_width
            };
            z[i] = position.z;
        }
        let eta = eta_from_r_z(r[0], z[0])?;
        r[0] = r_from_eta_z(eta, z[2])?;

        let width = r[0] - r[2];
        let gas_gap = channels[2].gas_gap;
        let (gang_lo, _) = descriptors[2].wire_extent(gas_gap, channels[2].channel)?;
        let local = Vec2::new(gang_lo + width / 2.0, center_local.y);
        let global = descriptors[2].to_global(local);
        Some((width, r[2] + width / 2.0, global.z))
    }

    /// Azimuthal span of a sector-logic candidate from its three strip
    /// channels. Returns (width, phi) of the span center.
    pub fn sl_strip_geometry(
        &self,
        channels: &[ChannelId; 3],
        is_backward: bool,
        is_aside: bool,
    ) -> Option<(f64, f64)> {
        let descriptors = [
            self.descriptor(&channels[0])?,
            self.descriptor(&channels[1])?,
            self.descriptor(&channels[2])?,
        ];
        let center_local = self.channel_local(descriptors[1], &channels[1])?;

        let mut local_r = [0.0f64; 3];
        for i in [0usize, 2] {
            local_r[i] = self.channel_local(descriptors[i], &channels[i])?.x;
        }

        let (index, reverse) = strip_ordering_sl(is_backward, is_aside);
        let (_, strip_max) = descriptors[index[0]].strip_extent(
            channels[index[0]].gas_gap,
            channels[index[0]].channel,
            local_r[index[0]],
        )?;
        let (strip_min, _) = descriptors[index[1]].strip_extent(
            channels[index[1]].gas_gap,
            channels[index[1]].channel,
            local_r[index[1]],
        )?;
        let width = strip_max - strip_min;
        let mut measurement = strip_min + width / 2.0;
        if reverse {
            measurement *= -1.0;
        }

        let index_global = if is_backward { 2 } else { 0 };
        let local = Vec2::new(center_local.x, measurement);
        let global = descriptors[index_global].to_global(local);
        Some((width, global.phi()))
    }

    /// Local coordinate whose forward projection matches the target (eta,
    /// phi), found with a secant iteration. Used by the sector-logic decoder
    /// when the direct projection is rejected by the frame transform.
    pub fn sl_local_position(
        &self,
        descriptor: &dyn ElementGeometry,
        eta: f64,
        phi: f64,
    ) -> Vec2 {
        const STEP_LENGTH: f64 = 100.0; // 100 mm
        const MAX_ITERATIONS: usize = 10;
        const DR_ACCURACY: f64 = 1.0e-20;
        const MAX_LOCAL_R: f64 = 10000.0; // 10 m divergence guard

        let mut loc_x = 0.0f64;
        let mut loc_y = 0.0f64;
        for _ in 0..MAX_ITERATIONS {
            let center = descriptor.to_global(Vec2::new(loc_x, loc_y));
            let residual = Vec2::new(eta - center.eta(), delta_phi(phi, center.phi()));
            if residual.norm() < DR_ACCURACY {
                break;
            }

            let shifted_x = descriptor.to_global(Vec2::new(loc_x + STEP_LENGTH, loc_y));
            let shifted_y = descriptor.to_global(Vec2::new(loc_x, loc_y + STEP_LENGTH));
            // Finite-difference Jacobian of (eta, phi) against the local axes.
            let m00 = shifted_x.eta() - center.eta();
            let m10 = delta_phi(shifted_x.phi(), center.phi());
            let m01 = shifted_y.eta() - center.eta();
            let m11 = delta_phi(shifted_y.phi(), center.phi());

            let determinant = m00 * m11 - m01 * m10;
            if determinant != 0.0 {
                let sol_x = (m11 * residual.x - m01 * residual.y) / determinant;
                let sol_y = (m00 * residual.y - m10 * residual.x) / determinant;
                loc_x += STEP_LENGTH * sol_x;
                loc_y += STEP_LENGTH * sol_y;

                let loc_r = loc_x.hypot(loc_y);
                if loc_r > MAX_LOCAL_R {
                    loc_x *= MAX_LOCAL_R / loc_r;
                    loc_y *= MAX_LOCAL_R / loc_r;
                }
            }
        }
        Vec2::new(loc_x, loc_y)
    }
}

/// Which window edge carries the azimuth maximum, and whether the combined
/// measurement flips sign, by chamber orientation.
fn strip_ordering(is_backward: bool, is_aside: bool) -> ([usize; 2], bool) {
    if !is_backward {
        if is_aside {
            ([1, 0], true)
        } else {
            ([0, 1], false)
        }
    } else if is_aside {
        ([0, 1], true)
    } else {
        ([1, 0], false)
    }
}

/// Sector-logic flavor of the ordering; the three-channel window indexes its
/// edges 0 and 2.
fn strip_ordering_sl(is_backward: bool, is_aside: bool) -> ([usize; 2], bool) {
    let ([a, b], reverse) = strip_ordering(is_backward, is_aside);
    ([if a == 1 { 2 } else { 0 }, if b == 1 { 2 } else { 0 }], reverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling_map::CablingMap;
    use crate::identifiers::{ElementId, Station};
    use crate::planar_geometry::PlanarGeometry;

    fn setup() -> (CablingMap, PlanarGeometry) {
        let map = CablingMap::new(None).unwrap();
        let geometry = PlanarGeometry::from_cabling(&map);
        (map, geometry)
    }

    fn wire(eta: i8, channel: u16, gas_gap: u8) -> ChannelId {
        ChannelId {
            element: ElementId {
                station: Station::PivotDoublet,
                is_forward: false,
                eta,
                phi: 1,
            },
            gas_gap,
            is_strip: false,
            channel,
        }
    }

    #[test]
    fn test_cylindrical_helpers_round_trip() {
        let p = Vec3::new(4000.0, 1000.0, 15150.0);
        let (r, _phi, eta) = r_phi_eta_from_xyz(p).unwrap();
        let eta_back = eta_from_r_z(r, p.z).unwrap();
        assert!((eta - eta_back).abs() < 1e-12);
        let r_back = r_from_eta_z(eta, p.z).unwrap();
        assert!((r - r_back).abs() < 1e-6);
        assert!(r_phi_eta_from_xyz(Vec3::new(0.0, 0.0, 100.0)).is_none());
    }

    #[test]
    fn test_project_single_wire() {
        let (_map, geometry) = setup();
        let projector = GeometryProjector::new(&geometry, 0.1, true);
        let projection = projector.project(&wire(1, 3, 1)).unwrap();
        assert!(projection.width > 0.1);
        assert!((projection.error - projection.width / 12.0f64.sqrt()).abs() < 1e-12);
        // Channel 3 sits near the chamber's outer edge: positive local x.
        assert!(projection.local.x > 0.0);
        // Unknown channel fails cleanly.
        assert!(projector.project(&wire(1, 200, 1)).is_none());
    }

    #[test]
    fn test_wire_span_monotonicity_within_one_chamber() {
        let (_map, geometry) = setup();
        let projector = GeometryProjector::new(&geometry, 0.1, true);
        // Channel 5 is at larger radius than channel 9 of the same chamber.
        let channels = [wire(1, 5, 1), wire(1, 9, 1)];
        let span = projector.wire_span_pivot(&channels).unwrap();
        let d = geometry.element(&channels[0].element).unwrap();
        let (lo5, hi5) = d.wire_extent(1, 5).unwrap();
        let (lo9, hi9) = d.wire_extent(1, 9).unwrap();
        // The span covers the window edge to edge.
        assert!((span.width - (hi5 - lo9)).abs() < 1e-6);
        assert!(span.measurement > lo9.min(lo5) && span.measurement < hi5.max(hi9));
        // And the measurement is centered between the outer edges.
        assert!((span.measurement - (lo9 + hi5) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wire_span_across_chamber_boundary() {
        let (_map, geometry) = setup();
        let projector = GeometryProjector::new(&geometry, 0.1, true);
        // Last wire of chamber 1 and first wire of chamber 2 straddle the
        // boundary; both representatives live on chamber 2.
        let channels = [wire(1, 40, 1), wire(2, 1, 1)];
        let span = projector.wire_span_pivot(&channels).unwrap();
        assert!(span.width > 0.0);
        assert_eq!(span.representative, channels[1]);
        // Span center radius lies between the two channel radii.
        let p0 = geometry
            .element(&channels[0].element)
            .unwrap()
            .channel_position(&channels[0])
            .unwrap();
        let p1 = geometry
            .element(&channels[1].element)
            .unwrap()
            .channel_position(&channels[1])
            .unwrap();
        let d = geometry.element(&channels[1].element).unwrap();
        let (lo, hi) = d.wire_extent(1, 1).unwrap();
        assert!(span.measurement > lo - span.width && span.measurement < hi + span.width);
        assert!(p1.perp() < p0.perp());
    }

    #[test]
    fn test_secant_solver_recovers_target() {
        let (_map, geometry) = setup();
        let projector = GeometryProjector::new(&geometry, 0.1, true);
        let element = ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: 2,
            phi: 1,
        };
        let descriptor = geometry.element(&element).unwrap();
        let target_local = Vec2::new(250.0, -120.0);
        let target = descriptor.to_global(target_local);
        let solved = projector.sl_local_position(descriptor, target.eta(), target.phi());
        let achieved = descriptor.to_global(solved);
        assert!((achieved.eta() - target.eta()).abs() < 1e-9);
        assert!(delta_phi(achieved.phi(), target.phi()).abs() < 1e-9);
    }
}
