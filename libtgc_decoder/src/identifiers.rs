//! Geometric and temporal identifiers.
//!
//! A `ChannelId` names exactly one physical readout channel; an `ElementId`
//! names the chamber that owns it. `ElementHash` is the compact collection
//! key assigned by the cabling map's element registry. Many raw words may
//! resolve to the same `ChannelId` across time slices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Endcap side of the spectrometer. Carried in the raw data as the
/// sub-detector id (0x67 for A, 0x68 for C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    C,
}

impl Side {
    pub fn sub_detector_id(&self) -> u16 {
        match self {
            Side::A => 0x67,
            Side::C => 0x68,
        }
    }

    pub fn from_sub_detector_id(id: u16) -> Option<Side> {
        match id {
            0x67 => Some(Side::A),
            0x68 => Some(Side::C),
            _ => None,
        }
    }

    /// Sign of the z coordinate (and of the signed station eta).
    pub fn z_sign(&self) -> f64 {
        match self {
            Side::A => 1.0,
            Side::C => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::C => write!(f, "C"),
        }
    }
}

/// Bunch-crossing tag of a raw word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcTag {
    Undefined,
    Previous,
    Current,
    Next,
    NextNext,
}

/// Number of hit time slices (previous, current, next).
pub const N_HIT_SLICES: usize = 3;
/// Number of coincidence time slices (previous, current, next, next-next).
pub const N_TRIG_SLICES: usize = 4;
/// Index of the derived time-integrated hit container.
pub const ALL_BC_SLICE: usize = N_HIT_SLICES;

/// Slice bit flags accumulated by the AllBC merge.
pub const BC_BIT_PREVIOUS: u16 = 0b001;
pub const BC_BIT_CURRENT: u16 = 0b010;
pub const BC_BIT_NEXT: u16 = 0b100;

impl BcTag {
    /// Hit container index. The undefined tag folds onto the current slice
    /// for backward compatibility; next-next is not readable on the hit path.
    pub fn hit_slice(&self) -> Option<usize> {
        match self {
            BcTag::Previous => Some(0),
            BcTag::Current | BcTag::Undefined => Some(1),
            BcTag::Next => Some(2),
            BcTag::NextNext => None,
        }
    }

    /// Coincidence container index.
    pub fn trig_slice(&self) -> usize {
        match self {
            BcTag::Previous => 0,
            BcTag::Current | BcTag::Undefined => 1,
            BcTag::Next => 2,
            BcTag::NextNext => 3,
        }
    }

    /// Slice flag for the AllBC bit field.
    pub fn bc_bit(&self) -> u16 {
        match self {
            BcTag::Previous => BC_BIT_PREVIOUS,
            BcTag::Current | BcTag::Undefined => BC_BIT_CURRENT,
            BcTag::Next => BC_BIT_NEXT,
            BcTag::NextNext => 0,
        }
    }
}

/// Slice flag for a hit container index, used by the AllBC merge.
pub fn bc_bit_of_slice(slice: usize) -> u16 {
    match slice {
        0 => BC_BIT_PREVIOUS,
        1 => BC_BIT_CURRENT,
        2 => BC_BIT_NEXT,
        _ => 0,
    }
}

/// Chamber station. The middle stations are doublets, the innermost wheel is
/// the triplet, and the small inner wheel hosts the EI/FI chambers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Station {
    /// Triplet wheel (three gas gaps).
    Triplet,
    /// Middle doublet wheel (non-pivot plane of low-pT coincidences).
    MiddleDoublet,
    /// Pivot doublet wheel.
    PivotDoublet,
    /// Inner EI/FI chambers.
    Inner,
}

impl Station {
    pub fn from_index(index: u8) -> Option<Station> {
        match index {
            1 => Some(Station::Triplet),
            2 => Some(Station::MiddleDoublet),
            3 => Some(Station::PivotDoublet),
            4 => Some(Station::Inner),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Station::Triplet => 1,
            Station::MiddleDoublet => 2,
            Station::PivotDoublet => 3,
            Station::Inner => 4,
        }
    }
}

/// One chamber. `eta` is signed: positive on side A, negative on side C,
/// increasing in magnitude towards the beam line. `phi` is the azimuthal
/// sector number, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    pub station: Station,
    pub is_forward: bool,
    pub eta: i8,
    pub phi: u8,
}

impl ElementId {
    pub fn side(&self) -> Side {
        if self.eta >= 0 {
            Side::A
        } else {
            Side::C
        }
    }

}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{}{}-eta{}-phi{}",
            self.station.index(),
            if self.is_forward { "F" } else { "E" },
            self.eta,
            self.phi
        )
    }
}

/// One physical readout channel. Channels are numbered from 1 within a gas
/// gap, following the detector description convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub element: ElementId,
    pub gas_gap: u8,
    pub is_strip: bool,
    pub channel: u16,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-g{}-{}{}",
            self.element,
            self.gas_gap,
            if self.is_strip { "s" } else { "w" },
            self.channel
        )
    }
}

/// Compact key of the chamber owning a channel; assigned contiguously by the
/// cabling map's element registry and used as the collection key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHash(pub u16);

impl fmt::Display for ElementHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_indices() {
        assert_eq!(BcTag::Previous.hit_slice(), Some(0));
        assert_eq!(BcTag::Current.hit_slice(), Some(1));
        assert_eq!(BcTag::Undefined.hit_slice(), Some(1));
        assert_eq!(BcTag::Next.hit_slice(), Some(2));
        assert_eq!(BcTag::NextNext.hit_slice(), None);
        assert_eq!(BcTag::NextNext.trig_slice(), 3);
    }

    #[test]
    fn test_bc_bits_are_disjoint() {
        assert_eq!(BC_BIT_PREVIOUS & BC_BIT_CURRENT, 0);
        assert_eq!(BC_BIT_CURRENT & BC_BIT_NEXT, 0);
        assert_eq!(BcTag::Previous.bc_bit() | BcTag::Next.bc_bit(), 0b101);
    }

    #[test]
    fn test_element_side_follows_eta_sign() {
        let e = ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: 2,
            phi: 1,
        };
        assert_eq!(e.side(), Side::A);
        let c = ElementId { eta: -2, ..e };
        assert_eq!(c.side(), Side::C);
    }

    #[test]
    fn test_sub_detector_id_round_trip() {
        for side in [Side::A, Side::C] {
            assert_eq!(Side::from_sub_detector_id(side.sub_detector_id()), Some(side));
        }
        assert_eq!(Side::from_sub_detector_id(0), None);
        assert_eq!(Side::A.z_sign(), 1.0);
        assert_eq!(Side::C.z_sign(), -1.0);
    }
}
