//! Static hardware-to-geometry translation, loaded once per process.
//!
//! The map is a CSV table bundled with the crate (a site-specific table can
//! be passed in instead). Two row kinds exist:
//!
//! `B,side,rod,ssw,sbloc,slbid,kind,lo,hi,station,fwd,eta,phi,gA,gB,gC,gD,base`
//!   maps the board-local layer channels `lo..=hi` of one serializer board
//!   to one chamber. The four gap columns give the gas gap served by each
//!   input line (0 = line unused). `base` is the detector channel number of
//!   `lo`. A board whose channel range spans a chamber boundary appears as
//!   several rows.
//!
//! `O,side,rod,ssw,sbloc,bitpos,station,fwd,eta,phi,gap,strip,channel`
//!   declares a signal-OR: the given bit position also reads out the listed
//!   partner channel.
//!
//! All lookups are pure reads against the loaded table; the map is safe to
//! share across decode threads.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::bit_layout::{self, SlbKind, INVALID};
use super::constants::{NUM_SLBID_SBLOC_OFFSET_WT, WD_MAP_SIZE};
use super::error::CablingMapError;
use super::identifiers::{ChannelId, ElementHash, ElementId, Side, Station};

const BOARD_ENTRIES_PER_LINE: usize = 18;
const OR_ENTRIES_PER_LINE: usize = 13;

/// Load the bundled default map.
fn load_default_map() -> String {
    String::from(include_str!("data/default_cabling.csv"))
}

/// Segmentation scheme of the readout pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CablingScheme {
    /// One pipeline per 1/12 wheel sector, pipelines numbered 1..=12.
    TwelveFold,
    /// Legacy octant segmentation, pipelines numbered 0..=7.
    EightFold,
}

impl CablingScheme {
    pub fn rods_per_side(&self) -> u16 {
        match self {
            CablingScheme::TwelveFold => 12,
            CablingScheme::EightFold => 8,
        }
    }

    pub fn max_online_id(&self) -> u16 {
        2 * self.rods_per_side()
    }

    /// Compact pipeline index: side A first, then side C.
    pub fn online_id(&self, side: Side, rod: u16) -> u16 {
        let local = match self {
            CablingScheme::TwelveFold => rod - 1,
            CablingScheme::EightFold => rod,
        };
        match side {
            Side::A => local,
            Side::C => local + self.rods_per_side(),
        }
    }

    pub fn decompose_online_id(&self, online_id: u16) -> (Side, u16) {
        let n = self.rods_per_side();
        let (side, local) = if online_id < n {
            (Side::A, online_id)
        } else {
            (Side::C, online_id - n)
        };
        match self {
            CablingScheme::TwelveFold => (side, local + 1),
            CablingScheme::EightFold => (side, local),
        }
    }
}

/// Board family; the inner boards carry a wire section (D line) and a strip
/// section (A/B lines) on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    WireTriplet,
    WireDoublet,
    StripTriplet,
    StripDoublet,
    Inner,
}

impl BoardKind {
    fn from_keyword(word: &str) -> Option<BoardKind> {
        match word {
            "WT" => Some(BoardKind::WireTriplet),
            "WD" => Some(BoardKind::WireDoublet),
            "ST" => Some(BoardKind::StripTriplet),
            "SD" => Some(BoardKind::StripDoublet),
            "IN" => Some(BoardKind::Inner),
            _ => None,
        }
    }

    pub fn slb_kind(&self) -> Option<SlbKind> {
        match self {
            BoardKind::WireTriplet => Some(SlbKind::WireTriplet),
            BoardKind::WireDoublet => Some(SlbKind::WireDoublet),
            BoardKind::StripTriplet => Some(SlbKind::StripTriplet),
            BoardKind::StripDoublet => Some(SlbKind::StripDoublet),
            BoardKind::Inner => None,
        }
    }

    pub fn is_strip(&self) -> bool {
        matches!(self, BoardKind::StripTriplet | BoardKind::StripDoublet)
    }

    pub fn is_doublet(&self) -> bool {
        matches!(self, BoardKind::WireDoublet | BoardKind::StripDoublet)
    }
}

/// One contiguous slice of a board mapped onto one chamber.
#[derive(Debug, Clone)]
struct BoardRange {
    lo: i32,
    hi: i32,
    element: ElementId,
    /// Gas gap per input line A, B, C, D; 0 marks an unused line.
    gaps: [u8; 4],
    /// Detector channel number of `lo` (channels are 1-based).
    base: u16,
}

#[derive(Debug, Clone)]
struct Board {
    kind: BoardKind,
    slb_id: u16,
    ranges: Vec<BoardRange>,
}

type BoardKey = (Side, u16, u16, u16);

/// High-pT board coordinates of one trigger candidate. `hit_id` is 0-based
/// in the simulation numbering; the as-recorded words carry it 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighPtId {
    pub index: u8,
    pub chip: u8,
    pub hit_id: u8,
    pub sub: u8,
}

#[derive(Debug, Clone)]
pub struct CablingMap {
    scheme: CablingScheme,
    boards: FxHashMap<BoardKey, Board>,
    ors: FxHashMap<(BoardKey, i32), ChannelId>,
    elements: Vec<ElementId>,
    element_hashes: FxHashMap<ElementId, ElementHash>,
    hash_to_online_id: Vec<u16>,
}

impl CablingMap {
    /// Create a new CablingMap.
    /// If the path is None, we load the default that is bundled with the
    /// decoder.
    pub fn new(path: Option<&Path>) -> Result<Self, CablingMapError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_map();
        }
        Self::from_csv(&contents)
    }

    fn from_csv(contents: &str) -> Result<Self, CablingMapError> {
        let mut scheme = CablingScheme::TwelveFold;
        let mut boards: FxHashMap<BoardKey, Board> = FxHashMap::default();
        let mut ors = FxHashMap::default();

        for (line_number, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').collect();
            match entries[0] {
                "scheme" => {
                    if entries.len() != 2 {
                        return Err(CablingMapError::BadFileFormat(line_number));
                    }
                    scheme = match entries[1] {
                        "12fold" => CablingScheme::TwelveFold,
                        "8fold" => CablingScheme::EightFold,
                        other => return Err(CablingMapError::BadScheme(other.to_string())),
                    };
                }
                "B" => {
                    if entries.len() != BOARD_ENTRIES_PER_LINE {
                        return Err(CablingMapError::BadFileFormat(line_number));
                    }
                    let side = parse_side(entries[1])?;
                    let rod: u16 = entries[2].parse()?;
                    let ssw: u16 = entries[3].parse()?;
                    let sbloc: u16 = entries[4].parse()?;
                    let slb_id: u16 = entries[5].parse()?;
                    let kind = BoardKind::from_keyword(entries[6])
                        .ok_or_else(|| CablingMapError::BadBoardKind(entries[6].to_string()))?;
                    let lo: i32 = entries[7].parse()?;
                    let hi: i32 = entries[8].parse()?;
                    let station_index: u8 = entries[9].parse()?;
                    let station = Station::from_index(station_index)
                        .ok_or(CablingMapError::BadStation(station_index))?;
                    let is_forward = entries[10].parse::<u8>()? != 0;
                    let eta_magnitude: i8 = entries[11].parse()?;
                    let phi: u8 = entries[12].parse()?;
                    let gaps = [
                        entries[13].parse()?,
                        entries[14].parse()?,
                        entries[15].parse()?,
                        entries[16].parse()?,
                    ];
                    let base: u16 = entries[17].parse()?;

                    let eta = match side {
                        Side::A => eta_magnitude,
                        Side::C => -eta_magnitude,
                    };
                    let range = BoardRange {
                        lo,
                        hi,
                        element: ElementId {
                            station,
                            is_forward,
                            eta,
                            phi,
                        },
                        gaps,
                        base,
                    };
                    let board = boards.entry((side, rod, ssw, sbloc)).or_insert(Board {
                        kind,
                        slb_id,
                        ranges: Vec::new(),
                    });
                    if board.ranges.iter().any(|r| r.lo <= hi && lo <= r.hi) {
                        return Err(CablingMapError::OverlappingRanges(line_number));
                    }
                    board.ranges.push(range);
                }
                "O" => {
                    if entries.len() != OR_ENTRIES_PER_LINE {
                        return Err(CablingMapError::BadFileFormat(line_number));
                    }
                    let side = parse_side(entries[1])?;
                    let rod: u16 = entries[2].parse()?;
                    let ssw: u16 = entries[3].parse()?;
                    let sbloc: u16 = entries[4].parse()?;
                    let bitpos: i32 = entries[5].parse()?;
                    let station_index: u8 = entries[6].parse()?;
                    let station = Station::from_index(station_index)
                        .ok_or(CablingMapError::BadStation(station_index))?;
                    let is_forward = entries[7].parse::<u8>()? != 0;
                    let eta_magnitude: i8 = entries[8].parse()?;
                    let phi: u8 = entries[9].parse()?;
                    let gas_gap: u8 = entries[10].parse()?;
                    let is_strip = entries[11].parse::<u8>()? != 0;
                    let channel: u16 = entries[12].parse()?;

                    let eta = match side {
                        Side::A => eta_magnitude,
                        Side::C => -eta_magnitude,
                    };
                    let partner = ChannelId {
                        element: ElementId {
                            station,
                            is_forward,
                            eta,
                            phi,
                        },
                        gas_gap,
                        is_strip,
                        channel,
                    };
                    ors.insert(((side, rod, ssw, sbloc), bitpos), partner);
                }
                _ => return Err(CablingMapError::BadFileFormat(line_number)),
            }
        }

        // Element registry: hashes are the indices of the sorted distinct
        // chamber list, so they are stable for a given table.
        let mut elements: Vec<ElementId> = boards
            .values()
            .flat_map(|b| b.ranges.iter().map(|r| r.element))
            .collect();
        elements.sort();
        elements.dedup();
        let element_hashes: FxHashMap<ElementId, ElementHash> = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (*e, ElementHash(i as u16)))
            .collect();

        // Precompute hash -> online pipeline id for seeded membership tests.
        let mut hash_to_online_id = vec![u16::MAX; elements.len()];
        for ((side, rod, _, _), board) in &boards {
            for range in &board.ranges {
                let hash = element_hashes[&range.element];
                hash_to_online_id[hash.0 as usize] = scheme.online_id(*side, *rod);
            }
        }

        Ok(CablingMap {
            scheme,
            boards,
            ors,
            elements,
            element_hashes,
            hash_to_online_id,
        })
    }

    pub fn scheme(&self) -> CablingScheme {
        self.scheme
    }

    /// True when the map uses the 12-fold sector segmentation required by the
    /// coincidence decoders.
    pub fn is_twelve_fold(&self) -> bool {
        self.scheme == CablingScheme::TwelveFold
    }

    /// Number of chambers known to the registry; hashes run 0..max.
    pub fn module_hash_max(&self) -> usize {
        self.elements.len()
    }

    pub fn hash_of(&self, element: &ElementId) -> Option<ElementHash> {
        self.element_hashes.get(element).copied()
    }

    pub fn element_of(&self, hash: ElementHash) -> Option<&ElementId> {
        self.elements.get(hash.0 as usize)
    }

    /// Online pipeline id owning a chamber, for seeded membership tests.
    pub fn online_id_of_hash(&self, hash: ElementHash) -> Option<u16> {
        match self.hash_to_online_id.get(hash.0 as usize) {
            Some(&id) if id != u16::MAX => Some(id),
            _ => None,
        }
    }

    /// True when the bit position shares its hardware line with a logical
    /// neighbor channel.
    pub fn is_ored(&self, side: Side, rod: u16, ssw: u16, sbloc: u16, bitpos: i32) -> bool {
        self.ors.contains_key(&((side, rod, ssw, sbloc), bitpos))
    }

    /// Geometric channel of a hardware coordinate. `NotFound` (None) is the
    /// expected outcome for unused hardware slots, not an error. With
    /// `or_flag` the OR-partner table is consulted instead of the primary
    /// mapping.
    pub fn resolve(
        &self,
        side: Side,
        rod: u16,
        ssw: u16,
        sbloc: u16,
        bitpos: i32,
        or_flag: bool,
    ) -> Option<ChannelId> {
        if or_flag {
            return self.ors.get(&((side, rod, ssw, sbloc), bitpos)).copied();
        }
        let board = self.boards.get(&(side, rod, ssw, sbloc))?;
        let (layer_channel, input, is_strip) = match board.kind.slb_kind() {
            Some(slb_kind) => {
                let c = bit_layout::channel_of(bitpos, slb_kind);
                if c == INVALID {
                    return None;
                }
                let input = match slb_kind {
                    SlbKind::WireTriplet => match c % 3 {
                        0 => 2, // C line
                        1 => 1, // B line
                        _ => 0, // A line
                    },
                    _ => match c % 2 {
                        0 => 1, // B line
                        _ => 0, // A line
                    },
                };
                (c / slb_kind.inputs(), input, slb_kind.is_strip())
            }
            None => {
                // Inner board: wire section on the D line, strip section on
                // the A and B lines, one gas gap per line.
                let line = bit_layout::input_line_of(bitpos);
                let offset = bit_layout::line_offset_of(bitpos);
                match line {
                    3 => (offset, 3, false),
                    0 | 1 => (offset, line as usize, true),
                    _ => return None,
                }
            }
        };

        let range = board
            .ranges
            .iter()
            .find(|r| r.lo <= layer_channel && layer_channel <= r.hi)?;
        let gas_gap = range.gaps[input];
        if gas_gap == 0 {
            return None;
        }
        Some(ChannelId {
            element: range.element,
            gas_gap,
            is_strip,
            channel: range.base + (layer_channel - range.lo) as u16,
        })
    }

    /// Chamber owning a hardware coordinate.
    pub fn element_of_readout(
        &self,
        side: Side,
        rod: u16,
        ssw: u16,
        sbloc: u16,
        bitpos: i32,
        or_flag: bool,
    ) -> Option<ElementId> {
        self.resolve(side, rod, ssw, sbloc, bitpos, or_flag)
            .map(|c| c.element)
    }

    /// Hardware coordinate of a geometric channel; inverse of `resolve`.
    pub fn reverse(&self, channel: &ChannelId) -> Option<(Side, u16, u16, u16, i32)> {
        for ((side, rod, ssw, sbloc), board) in &self.boards {
            let section_is_strip = match board.kind {
                BoardKind::Inner => channel.is_strip,
                kind => {
                    if kind.is_strip() != channel.is_strip {
                        continue;
                    }
                    channel.is_strip
                }
            };
            for range in &board.ranges {
                if range.element != channel.element {
                    continue;
                }
                if channel.channel < range.base
                    || channel.channel > range.base + (range.hi - range.lo) as u16
                {
                    continue;
                }
                let layer_channel = range.lo + (channel.channel - range.base) as i32;
                let bitpos = match board.kind.slb_kind() {
                    Some(slb_kind) => {
                        let input = (0..slb_kind.inputs() as usize)
                            .find(|i| range.gaps[*i] == channel.gas_gap);
                        let Some(input) = input else { continue };
                        let c = match slb_kind {
                            SlbKind::WireTriplet => {
                                let interleave = match input {
                                    2 => 0, // C line
                                    1 => 1, // B line
                                    _ => 2, // A line
                                };
                                3 * layer_channel + interleave
                            }
                            _ => {
                                let interleave = if input == 1 { 0 } else { 1 };
                                2 * layer_channel + interleave
                            }
                        };
                        bit_layout::bit_position_of(c, slb_kind)
                    }
                    None => {
                        let line = if section_is_strip {
                            (0..2usize).find(|i| range.gaps[*i] == channel.gas_gap)
                        } else if range.gaps[3] == channel.gas_gap {
                            Some(3)
                        } else {
                            None
                        };
                        let Some(line) = line else { continue };
                        let origin = match line {
                            0 => super::constants::BIT_POS_A_INPUT_ORIGIN,
                            1 => super::constants::BIT_POS_B_INPUT_ORIGIN,
                            _ => super::constants::BIT_POS_D_INPUT_ORIGIN,
                        };
                        origin - super::constants::BIT_POS_INPUT_SIZE + 1 + layer_channel
                    }
                };
                if bitpos == INVALID {
                    continue;
                }
                return Some((*side, *rod, *ssw, *sbloc, bitpos));
            }
        }
        None
    }

    /// Geometric channel of a low-pT coincidence coordinate. The pivot plane
    /// reads the addressed board directly; the non-pivot plane reads the
    /// paired middle-doublet board, parked two switches up on the same
    /// pipeline.
    pub fn resolve_low_pt(
        &self,
        side: Side,
        rod: u16,
        ssw: u16,
        sbloc: u16,
        sub_matrix: u8,
        position: u8,
        nonpivot: bool,
    ) -> Option<ChannelId> {
        let ssw = if nonpivot { ssw + 2 } else { ssw };
        let board = self.boards.get(&(side, rod, ssw, sbloc))?;
        let slb_kind = board.kind.slb_kind()?;
        if !board.kind.is_doublet() {
            return None;
        }
        let c = 32 * sub_matrix as i32 + position as i32;
        let bitpos = bit_layout::bit_position_of(c, slb_kind);
        if bitpos == INVALID {
            return None;
        }
        self.resolve(side, rod, ssw, sbloc, bitpos, false)
    }

    /// 1-based as-recorded high-pT hit id to the 0-based numbering used by
    /// the bit-position tables.
    pub fn sim_from_rdo_high_pt(&self, id: &HighPtId) -> Option<HighPtId> {
        if id.hit_id < 1 || id.hit_id > 6 {
            return None;
        }
        Some(HighPtId {
            hit_id: id.hit_id - 1,
            ..*id
        })
    }

    pub fn rdo_from_sim_high_pt(&self, id: &HighPtId) -> Option<HighPtId> {
        if id.hit_id > 5 {
            return None;
        }
        Some(HighPtId {
            hit_id: id.hit_id + 1,
            ..*id
        })
    }

    /// Strip-board radial index (0 = outermost chamber) candidates of a
    /// region of interest: primary, secondary at chamber boundaries, and the
    /// extra fallback rows introduced by the high-pT endcap strip board bug.
    pub fn strip_board_candidates(roi: u16, is_forward: bool) -> [Option<u8>; 3] {
        if is_forward {
            return [Some(0), None, None];
        }
        let ssc = (roi + 4) / 8;
        match ssc {
            0..=1 => [Some(0), None, None],
            2 => [Some(1), Some(0), None],
            3 => [Some(1), None, None],
            4 => [Some(2), Some(1), None],
            5 => [Some(2), None, None],
            6 => [Some(3), Some(2), Some(4)],
            7..=11 => [Some(3), Some(4), None],
            12 => [Some(3), Some(4), None],
            13..=18 => [Some(4), Some(3), None],
            _ => [None, None, None],
        }
    }

    /// High-pT board coordinates covering a region of interest (0-based hit
    /// ids).
    pub fn high_pt_from_roi(&self, roi: u16, is_forward: bool, is_strip: bool) -> Option<HighPtId> {
        let row = roi / 4;
        let max_row = if is_forward { 15 } else { 36 };
        if row > max_row {
            return None;
        }
        if !is_strip {
            Some(HighPtId {
                index: 0,
                chip: (row / 12) as u8,
                hit_id: ((row % 12) / 2) as u8,
                sub: (row % 2) as u8,
            })
        } else {
            let board = Self::strip_board_candidates(roi, is_forward)[0]?;
            let sub_matrix = (roi % 4) / 2;
            Some(HighPtId {
                index: 0,
                chip: board / 3,
                hit_id: (board % 3) * 2 + sub_matrix as u8,
                sub: (roi % 2) as u8,
            })
        }
    }

    /// Region of interest addressed by a wire and a strip high-pT candidate
    /// (0-based hit ids); inverse of `high_pt_from_roi`.
    pub fn roi_from_high_pt(
        &self,
        is_forward: bool,
        wire: &HighPtId,
        strip: &HighPtId,
    ) -> Option<u16> {
        if wire.hit_id > 5 || strip.hit_id > 5 {
            return None;
        }
        let row = wire.chip as u16 * 12 + wire.hit_id as u16 * 2 + wire.sub as u16;
        let max_row = if is_forward { 15 } else { 36 };
        if row > max_row {
            return None;
        }
        let board = strip.chip * 3 + strip.hit_id / 2;
        let sub_matrix = strip.hit_id % 2;
        let roi = 4 * row + 2 * sub_matrix as u16 + strip.sub as u16;
        let candidates = Self::strip_board_candidates(roi, is_forward);
        if !candidates.contains(&Some(board)) {
            return None;
        }
        Some(roi)
    }

    /// Center channel of a high-pT candidate's pivot window (0-based hit
    /// ids).
    pub fn offline_from_high_pt(
        &self,
        side: Side,
        rod: u16,
        sector: u8,
        is_forward: bool,
        is_strip: bool,
        id: &HighPtId,
    ) -> Option<ChannelId> {
        if id.hit_id > 5 {
            return None;
        }
        let ssw = if is_forward { 7 } else { 3 + sector as u16 };
        let (sbloc, board_channel) = if !is_strip {
            let row = id.chip as i32 * 12 + id.hit_id as i32 * 2 + id.sub as i32;
            let continuum = row * (WD_MAP_SIZE / 4) + WD_MAP_SIZE / 8;
            ((continuum / WD_MAP_SIZE) as u16, continuum % WD_MAP_SIZE)
        } else {
            let board = id.chip as u16 * 3 + id.hit_id as u16 / 2;
            let sub_matrix = (id.hit_id % 2) as i32;
            (
                16 + board,
                32 * sub_matrix + 16 * id.sub as i32 + 8,
            )
        };
        let kind = if is_strip {
            bit_layout::SlbKind::StripDoublet
        } else {
            bit_layout::SlbKind::WireDoublet
        };
        let bitpos = bit_layout::bit_position_of(board_channel, kind);
        self.resolve(side, rod, ssw, sbloc, bitpos, false)
    }

    /// Pivot-plane board of a high-pT candidate (0-based hit ids). Returns
    /// (switch id, board location, board id).
    pub fn high_pt_pivot(
        &self,
        side: Side,
        rod: u16,
        sector: u8,
        is_forward: bool,
        is_strip: bool,
        id: &HighPtId,
    ) -> Option<(u16, u16, u16)> {
        if id.hit_id > 5 {
            return None;
        }
        let ssw = if is_forward { 7 } else { 3 + sector as u16 };
        let sbloc = if !is_strip {
            let row = id.chip as u16 * 12 + id.hit_id as u16 * 2 + id.sub as u16;
            row / 4
        } else {
            let board = id.chip as u16 * 3 + id.hit_id as u16 / 2;
            16 + board
        };
        let board = self.boards.get(&(side, rod, ssw, sbloc))?;
        Some((ssw, sbloc, board.slb_id))
    }

    /// Azimuthal sector of a sector-logic block, from its readout
    /// coordinates.
    pub fn sl_phi(&self, rod: u16, sbloc: u16) -> u8 {
        ((rod - 1) * 2 + sbloc + 1) as u8
    }

    /// Continuous non-pivot (triplet) wire channel bounds of one pipeline
    /// sector, in board-interleaved units. Used by the high-pT decoder to
    /// clamp window arithmetic at the wheel edges.
    pub fn triplet_wire_channel_bounds(&self, is_forward: bool) -> (i32, i32) {
        if is_forward {
            (0, 312)
        } else {
            (78, 665)
        }
    }

    /// Offset added when stepping from pivot doublet channels to triplet
    /// channels, accounting for the staggered wheel origins.
    pub fn triplet_wire_offset(&self, is_forward: bool) -> i32 {
        if is_forward {
            0
        } else {
            32
        }
    }

    /// Board-location offset of the wire-triplet boards of an odd sector.
    pub fn triplet_wire_sbloc_offset(&self, sector: u8) -> u16 {
        if sector % 2 == 1 {
            NUM_SLBID_SBLOC_OFFSET_WT as u16
        } else {
            0
        }
    }

    /// Switch hosting the triplet boards of a sector.
    pub fn triplet_ssw(&self, sector: u8, is_forward: bool) -> u16 {
        if is_forward {
            2
        } else {
            (sector / 2) as u16
        }
    }

    /// Strip-triplet board location for a high-pT chip, per the fixed
    /// connection table.
    pub fn triplet_strip_sbloc(&self, sector: u8, chip: u8) -> u16 {
        let base = if sector % 2 == 0 { 16 } else { 24 };
        if chip == 0 {
            base
        } else {
            base + 1
        }
    }
}

fn parse_side(word: &str) -> Result<Side, CablingMapError> {
    match word {
        "A" => Ok(Side::A),
        "C" => Ok(Side::C),
        _ => Err(CablingMapError::BadSide(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_layout::bit_position_of;

    fn default_map() -> CablingMap {
        match CablingMap::new(None) {
            Ok(m) => m,
            Err(e) => panic!("default cabling map failed to load: {e}"),
        }
    }

    #[test]
    fn test_default_map_loads() {
        let map = default_map();
        assert!(map.is_twelve_fold());
        assert!(map.module_hash_max() > 0);
        // Chambers come in mirrored pairs, one per side.
        assert_eq!(map.module_hash_max() % 2, 0);
    }

    #[test]
    fn test_resolve_pivot_doublet_wire() {
        let map = default_map();
        // Board 0 of the pivot wheel, first board channel: B line, outermost
        // chamber, first channel.
        let bitpos = bit_position_of(0, SlbKind::WireDoublet);
        let channel = map.resolve(Side::A, 1, 3, 0, bitpos, false).unwrap();
        assert_eq!(channel.element.station, Station::PivotDoublet);
        assert_eq!(channel.element.eta, 1);
        assert_eq!(channel.element.phi, 1);
        assert_eq!(channel.gas_gap, 1);
        assert!(!channel.is_strip);
        assert_eq!(channel.channel, 1);
        // The A line of the same pair reads gas gap 2.
        let bitpos = bit_position_of(1, SlbKind::WireDoublet);
        let channel = map.resolve(Side::A, 1, 3, 0, bitpos, false).unwrap();
        assert_eq!(channel.gas_gap, 2);
        assert_eq!(channel.channel, 1);
    }

    #[test]
    fn test_resolve_unused_slot_is_not_found() {
        let map = default_map();
        assert!(map.resolve(Side::A, 1, 3, 40, 78, false).is_none());
        assert!(map.resolve(Side::A, 9, 3, 0, 78, false).is_none());
        // Bit position outside any input line.
        assert!(map.resolve(Side::A, 1, 3, 0, 77, false).is_none());
    }

    #[test]
    fn test_cabling_round_trip() {
        let map = default_map();
        let mut checked = 0usize;
        for side in [Side::A, Side::C] {
            for ssw in [0u16, 3, 4, 5, 6, 8] {
                for sbloc in 0..26u16 {
                    for bitpos in 40..190 {
                        if let Some(channel) = map.resolve(side, 1, ssw, sbloc, bitpos, false) {
                            let (r_side, r_rod, r_ssw, r_sbloc, r_bitpos) =
                                map.reverse(&channel).expect("reverse failed");
                            let back = map
                                .resolve(r_side, r_rod, r_ssw, r_sbloc, r_bitpos, false)
                                .expect("re-resolve failed");
                            assert_eq!(back, channel);
                            checked += 1;
                        }
                    }
                }
            }
        }
        assert!(checked > 1000, "too few mapped coordinates: {checked}");
    }

    #[test]
    fn test_ored_channels() {
        let map = default_map();
        let bitpos = bit_position_of(0, SlbKind::WireDoublet);
        assert!(map.is_ored(Side::A, 1, 3, 0, bitpos));
        let primary = map.resolve(Side::A, 1, 3, 0, bitpos, false).unwrap();
        let partner = map.resolve(Side::A, 1, 3, 0, bitpos, true).unwrap();
        assert_ne!(primary, partner);
        assert_eq!(primary.element, partner.element);
        assert!(!map.is_ored(Side::A, 1, 3, 1, bitpos));
        assert!(map.resolve(Side::A, 1, 3, 1, bitpos, true).is_none());
    }

    #[test]
    fn test_online_ids() {
        let map = default_map();
        let scheme = map.scheme();
        assert_eq!(scheme.online_id(Side::A, 1), 0);
        assert_eq!(scheme.online_id(Side::C, 1), 12);
        assert_eq!(scheme.decompose_online_id(12), (Side::C, 1));
        let hash = map
            .hash_of(&ElementId {
                station: Station::PivotDoublet,
                is_forward: false,
                eta: 1,
                phi: 1,
            })
            .unwrap();
        assert_eq!(map.online_id_of_hash(hash), Some(0));
        let hash_c = map
            .hash_of(&ElementId {
                station: Station::PivotDoublet,
                is_forward: false,
                eta: -1,
                phi: 1,
            })
            .unwrap();
        assert_eq!(map.online_id_of_hash(hash_c), Some(12));
    }

    #[test]
    fn test_low_pt_resolution() {
        let map = default_map();
        // Pivot plane, submatrix 0, position 0 -> first channel of gap 1.
        let pivot = map
            .resolve_low_pt(Side::A, 1, 3, 0, 0, 0, false)
            .expect("pivot channel");
        assert_eq!(pivot.element.station, Station::PivotDoublet);
        assert_eq!(pivot.gas_gap, 1);
        // Non-pivot reads the paired middle-doublet board.
        let nonpivot = map
            .resolve_low_pt(Side::A, 1, 3, 0, 0, 0, true)
            .expect("non-pivot channel");
        assert_eq!(nonpivot.element.station, Station::MiddleDoublet);
        assert_eq!(nonpivot.channel, pivot.channel);
        // A triplet board is not a valid low-pT coordinate.
        assert!(map.resolve_low_pt(Side::A, 1, 0, 0, 0, 0, false).is_none());
    }

    #[test]
    fn test_high_pt_roi_round_trip() {
        let map = default_map();
        for roi in 0..148u16 {
            let wire = map.high_pt_from_roi(roi, false, false).expect("wire id");
            let strip = map.high_pt_from_roi(roi, false, true).expect("strip id");
            let back = map
                .roi_from_high_pt(false, &wire, &strip)
                .expect("roi back");
            assert_eq!(back, roi, "roi {roi}");
        }
        assert!(map.high_pt_from_roi(148, false, false).is_none());
        assert!(map.high_pt_from_roi(64, true, false).is_none());
    }

    #[test]
    fn test_high_pt_id_numbering_conversions() {
        let map = default_map();
        let rdo = HighPtId {
            index: 0,
            chip: 1,
            hit_id: 3,
            sub: 1,
        };
        let sim = map.sim_from_rdo_high_pt(&rdo).unwrap();
        assert_eq!(sim.hit_id, 2);
        assert_eq!(map.rdo_from_sim_high_pt(&sim).unwrap(), rdo);
        let bad = HighPtId {
            hit_id: 0,
            ..rdo
        };
        assert!(map.sim_from_rdo_high_pt(&bad).is_none());
    }

    #[test]
    fn test_high_pt_pivot_boards() {
        let map = default_map();
        // Row 20 lives on wire board 5.
        let wire = map.high_pt_from_roi(80, false, false).unwrap();
        let (ssw, sbloc, slb_id) = map
            .high_pt_pivot(Side::A, 1, 0, false, false, &wire)
            .unwrap();
        assert_eq!(ssw, 3);
        assert_eq!(sbloc, 5);
        assert_eq!(slb_id, 5);
        // Strip board of the same region.
        let strip = map.high_pt_from_roi(80, false, true).unwrap();
        let (ssw_s, sbloc_s, _) = map
            .high_pt_pivot(Side::A, 1, 0, false, true, &strip)
            .unwrap();
        assert_eq!(ssw_s, 3);
        assert_eq!(sbloc_s, 19);
    }
}
