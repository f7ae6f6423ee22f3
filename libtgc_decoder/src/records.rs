//! Reconstructed records produced by the per-kind decoders.
//!
//! Records are immutable once pushed into a collection; the collection owns
//! them. The duplicate-identity contract lives here: two records with the
//! same identity must never coexist in one collection.

use serde::{Deserialize, Serialize};

use super::geometry::Vec2;
use super::identifiers::{ChannelId, ElementHash};

/// A geometry-resolved hit derived from one (or, for OR'd lines, two) raw
/// words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRecord {
    pub channel: ChannelId,
    pub hash: ElementHash,
    pub local_position: Vec2,
    /// Flat readout uncertainty, width / sqrt(12).
    pub error: f64,
    pub width: f64,
    /// Contributing channels; the resolved channel plus any OR partner
    /// recorded alongside.
    pub identifiers: Vec<ChannelId>,
    /// Which time slices observed this channel; filled by the AllBC merge.
    pub bc_bitmap: u16,
}

impl HitRecord {
    /// Hits are identified by their channel alone.
    pub fn is_duplicate_of(&self, other: &HitRecord) -> bool {
        self.channel == other.channel
    }
}

/// Discriminant of a coincidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinKind {
    Tracklet,
    TrackletInner,
    HighPt,
    Inner,
    SectorLogic,
}

/// Fields shared by every coincidence flavor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinCommon {
    pub hash: ElementHash,
    pub is_aside: bool,
    pub phi: u8,
    pub is_forward: bool,
    pub is_strip: bool,
    pub tracklet_id: i32,
}

/// A coincidence between chamber layers, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoinRecord {
    /// Low-pT coincidence; the identifying channel is the pivot one.
    Tracklet {
        common: CoinCommon,
        channel_in: ChannelId,
        channel_out: ChannelId,
        position_in: Vec2,
        position_out: Vec2,
        width_in: f64,
        width_out: f64,
        delta: i32,
        sub_matrix: i32,
    },
    /// Inner-station tracklet; has no pivot partner.
    TrackletInner {
        common: CoinCommon,
        channel_in: ChannelId,
        position_in: Vec2,
        width_in: f64,
        sub_matrix: i32,
    },
    HighPt {
        common: CoinCommon,
        channel_in: ChannelId,
        channel_out: ChannelId,
        position_in: Vec2,
        position_out: Vec2,
        width_in: f64,
        width_out: f64,
        delta: i32,
        hsub: i32,
        inner: u32,
    },
    /// Inner-detector flags; coarse element only, no per-channel geometry.
    Inner {
        common: CoinCommon,
        is_inner_detector: bool,
        inner: u32,
    },
    SectorLogic {
        common: CoinCommon,
        channel_out: ChannelId,
        position: Vec2,
        /// Diagonal covariance terms: radial and azimuthal window widths.
        error_r: f64,
        error_phi: f64,
        tracklet_id_strip: i32,
        roi: i32,
        threshold: i32,
        veto: bool,
        is_positive_delta_r: bool,
    },
}

impl CoinRecord {
    pub fn kind(&self) -> CoinKind {
        match self {
            CoinRecord::Tracklet { .. } => CoinKind::Tracklet,
            CoinRecord::TrackletInner { .. } => CoinKind::TrackletInner,
            CoinRecord::HighPt { .. } => CoinKind::HighPt,
            CoinRecord::Inner { .. } => CoinKind::Inner,
            CoinRecord::SectorLogic { .. } => CoinKind::SectorLogic,
        }
    }

    pub fn common(&self) -> &CoinCommon {
        match self {
            CoinRecord::Tracklet { common, .. }
            | CoinRecord::TrackletInner { common, .. }
            | CoinRecord::HighPt { common, .. }
            | CoinRecord::Inner { common, .. }
            | CoinRecord::SectorLogic { common, .. } => common,
        }
    }

    pub fn hash(&self) -> ElementHash {
        self.common().hash
    }

    /// The duplicate-suppression contract: no two records in one collection
    /// may share kind, identifying channel(s), tracklet id, delta and
    /// sub-index.
    pub fn is_duplicate_of(&self, other: &CoinRecord) -> bool {
        match (self, other) {
            (
                CoinRecord::Tracklet {
                    common,
                    channel_in,
                    channel_out,
                    delta,
                    sub_matrix,
                    ..
                },
                CoinRecord::Tracklet {
                    common: o_common,
                    channel_in: o_in,
                    channel_out: o_out,
                    delta: o_delta,
                    sub_matrix: o_sub,
                    ..
                },
            ) => {
                channel_out == o_out
                    && channel_in == o_in
                    && common.tracklet_id == o_common.tracklet_id
                    && delta == o_delta
                    && sub_matrix == o_sub
            }
            (
                CoinRecord::TrackletInner {
                    channel_in,
                    sub_matrix,
                    ..
                },
                CoinRecord::TrackletInner {
                    channel_in: o_in,
                    sub_matrix: o_sub,
                    ..
                },
            ) => channel_in == o_in && sub_matrix == o_sub,
            (
                CoinRecord::HighPt {
                    common,
                    channel_in,
                    channel_out,
                    delta,
                    hsub,
                    inner,
                    ..
                },
                CoinRecord::HighPt {
                    common: o_common,
                    channel_in: o_in,
                    channel_out: o_out,
                    delta: o_delta,
                    hsub: o_hsub,
                    inner: o_inner,
                    ..
                },
            ) => {
                channel_out == o_out
                    && channel_in == o_in
                    && common.tracklet_id == o_common.tracklet_id
                    && delta == o_delta
                    && hsub == o_hsub
                    && inner == o_inner
            }
            (
                CoinRecord::SectorLogic {
                    common,
                    channel_out,
                    tracklet_id_strip,
                    roi,
                    threshold,
                    veto,
                    is_positive_delta_r,
                    ..
                },
                CoinRecord::SectorLogic {
                    common: o_common,
                    channel_out: o_out,
                    tracklet_id_strip: o_strip,
                    roi: o_roi,
                    threshold: o_threshold,
                    veto: o_veto,
                    is_positive_delta_r: o_mu,
                    ..
                },
            ) => {
                channel_out == o_out
                    && common.tracklet_id == o_common.tracklet_id
                    && tracklet_id_strip == o_strip
                    && roi == o_roi
                    && threshold == o_threshold
                    && veto == o_veto
                    && is_positive_delta_r == o_mu
            }
            // Inner flag words carry no channel identity and are kept as-is.
            (CoinRecord::Inner { .. }, CoinRecord::Inner { .. }) => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{ElementId, Station};

    fn channel(n: u16) -> ChannelId {
        ChannelId {
            element: ElementId {
                station: Station::PivotDoublet,
                is_forward: false,
                eta: 1,
                phi: 1,
            },
            gas_gap: 1,
            is_strip: false,
            channel: n,
        }
    }

    fn tracklet(delta: i32, out: u16) -> CoinRecord {
        CoinRecord::Tracklet {
            common: CoinCommon {
                hash: ElementHash(0),
                is_aside: true,
                phi: 1,
                is_forward: false,
                is_strip: false,
                tracklet_id: 4,
            },
            channel_in: channel(10),
            channel_out: channel(out),
            position_in: Vec2::default(),
            position_out: Vec2::default(),
            width_in: 10.0,
            width_out: 10.0,
            delta,
            sub_matrix: 0,
        }
    }

    #[test]
    fn test_tracklet_duplicate_contract() {
        let a = tracklet(2, 7);
        assert!(a.is_duplicate_of(&tracklet(2, 7)));
        assert!(!a.is_duplicate_of(&tracklet(3, 7)));
        assert!(!a.is_duplicate_of(&tracklet(2, 8)));
    }

    #[test]
    fn test_kinds_never_collide() {
        let a = tracklet(2, 7);
        let b = CoinRecord::Inner {
            common: a.common().clone(),
            is_inner_detector: true,
            inner: 0,
        };
        assert!(!a.is_duplicate_of(&b));
        assert!(!b.is_duplicate_of(&b.clone()));
        assert_eq!(b.kind(), CoinKind::Inner);
    }
}
