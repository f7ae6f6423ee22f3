//! Raw readout words and their container.
//!
//! One `RawWord` is one as-recorded front-end word. The kind-specific payload
//! lives in the `RawContent` sum type; the decode orchestrator dispatches by
//! matching on it rather than inspecting flag combinations.

use serde::{Deserialize, Serialize};

use super::bit_layout::SlbKind;
use super::identifiers::{BcTag, Side};

/// Packed payload of an inner-station coincidence word. The four sub-kinds
/// carry different fields; each is flattened into the coincidence record's
/// bit field with its own shift table (see `decode_inner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnerPayload {
    /// New-small-wheel segment candidate.
    Nsw {
        eta: u8,
        phi: u8,
        dtheta: u8,
        phi_res: bool,
        low_res: bool,
        id: u8,
        bcid: u8,
        input: u8,
    },
    /// RPC BIS78 coincidence.
    Rpc {
        eta: u8,
        phi: u8,
        delta_eta: u8,
        delta_phi: u8,
        flag: u8,
        bcid: u8,
    },
    /// Inner-wheel EI/FI hit pattern.
    Eifi { ei: u8, fi: u8, chamber_id: u8 },
    /// Tile calorimeter muon trigger word.
    Tile { module: u8, bcid: u8 },
}

/// Kind-specific content of a raw word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawContent {
    /// One fired channel of one serializer board.
    Hit {
        ssw_id: u16,
        slb_id: u16,
        bit_pos: u16,
    },
    /// Low-pT coincidence between the pivot and middle doublet.
    Tracklet {
        ssw_id: u16,
        slb_id: u16,
        slb_kind: SlbKind,
        sub_matrix: u8,
        position: u8,
        delta: i8,
    },
    /// Inner-station (EI/FI) tracklet.
    TrackletInner {
        ssw_id: u16,
        slb_id: u16,
        is_strip: bool,
        sub_matrix: u8,
    },
    /// High-pT coincidence between the pivot doublet and the triplet.
    HighPt {
        is_strip: bool,
        is_forward: bool,
        sector: u8,
        chip: u8,
        index: u8,
        hit_id: u8,
        hsub: u8,
        delta: i8,
        inner: u16,
    },
    /// Inner-detector coincidence flags forwarded to the sector logic.
    Inner {
        is_forward: bool,
        sector: u8,
        payload: InnerPayload,
    },
    /// Sector-logic region-of-interest decision.
    SectorLogic {
        is_forward: bool,
        sector: u8,
        inner_flag: u8,
        coin_flag: u8,
        is_muplus: bool,
        threshold: u8,
        veto: bool,
        roi: u16,
    },
}

impl RawContent {
    pub fn is_coincidence(&self) -> bool {
        !matches!(self, RawContent::Hit { .. })
    }
}

/// One raw readout word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWord {
    pub side: Side,
    pub rod_id: u16,
    pub bc_tag: BcTag,
    pub content: RawContent,
}

/// All raw words read out by one pipeline (one ROD) for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdoCollection {
    pub side: Side,
    pub rod_id: u16,
    pub words: Vec<RawWord>,
}

impl RdoCollection {
    pub fn new(side: Side, rod_id: u16) -> Self {
        RdoCollection {
            side,
            rod_id,
            words: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Per-event input: one block per readout pipeline.
pub type RdoContainer = Vec<RdoCollection>;
