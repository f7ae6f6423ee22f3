//! Inner-detector coincidence decoder.
//!
//! Inner words carry flags from the NSW, the BIS78 RPCs, the EI/FI inner
//! wheel or the tile calorimeter, addressed to a coarse element only
//! (side, sector); no per-channel geometry exists. Each sub-kind packs its
//! fields into one bit field with its own shift table.

use super::decoder::{DecodeState, Outcome, TgcRdoDecoder};
use super::identifiers::{ElementId, Side, Station};
use super::raw_word::{InnerPayload, RawContent, RawWord};
use super::records::{CoinCommon, CoinRecord};

// Packed-word layout per sub-kind.
pub const INNER_NSW_R_SHIFT: u32 = 0;
pub const INNER_NSW_PHI_SHIFT: u32 = 8;
pub const INNER_NSW_DTHETA_SHIFT: u32 = 14;
pub const INNER_NSW_PHIRES_SHIFT: u32 = 19;
pub const INNER_NSW_LOWRES_SHIFT: u32 = 20;
pub const INNER_NSW_ID_SHIFT: u32 = 21;
pub const INNER_NSW_BCID_SHIFT: u32 = 25;
pub const INNER_NSW_INPUT_SHIFT: u32 = 29;

pub const INNER_RPC_ETA_SHIFT: u32 = 0;
pub const INNER_RPC_PHI_SHIFT: u32 = 6;
pub const INNER_RPC_DETA_SHIFT: u32 = 12;
pub const INNER_RPC_DPHI_SHIFT: u32 = 15;
pub const INNER_RPC_FLAG_SHIFT: u32 = 18;
pub const INNER_RPC_BCID_SHIFT: u32 = 20;

pub const INNER_EIFI_EI_SHIFT: u32 = 0;
pub const INNER_EIFI_FI_SHIFT: u32 = 8;
pub const INNER_EIFI_CID_SHIFT: u32 = 16;

pub const INNER_TILE_MODULE_SHIFT: u32 = 0;
pub const INNER_TILE_BCID_SHIFT: u32 = 8;

impl InnerPayload {
    /// Flatten to the coincidence record's bit field, and report the
    /// (inner-detector, strip-slot) flags the sub-kind occupies.
    pub fn pack(&self) -> (u32, bool, bool) {
        match *self {
            InnerPayload::Nsw {
                eta,
                phi,
                dtheta,
                phi_res,
                low_res,
                id,
                bcid,
                input,
            } => {
                let bits = ((eta as u32) << INNER_NSW_R_SHIFT)
                    + ((phi as u32) << INNER_NSW_PHI_SHIFT)
                    + ((dtheta as u32) << INNER_NSW_DTHETA_SHIFT)
                    + ((phi_res as u32) << INNER_NSW_PHIRES_SHIFT)
                    + ((low_res as u32) << INNER_NSW_LOWRES_SHIFT)
                    + ((id as u32) << INNER_NSW_ID_SHIFT)
                    + ((bcid as u32) << INNER_NSW_BCID_SHIFT)
                    + ((input as u32) << INNER_NSW_INPUT_SHIFT);
                (bits, true, false)
            }
            InnerPayload::Rpc {
                eta,
                phi,
                delta_eta,
                delta_phi,
                flag,
                bcid,
            } => {
                let bits = ((eta as u32) << INNER_RPC_ETA_SHIFT)
                    + ((phi as u32) << INNER_RPC_PHI_SHIFT)
                    + ((delta_eta as u32) << INNER_RPC_DETA_SHIFT)
                    + ((delta_phi as u32) << INNER_RPC_DPHI_SHIFT)
                    + ((flag as u32) << INNER_RPC_FLAG_SHIFT)
                    + ((bcid as u32) << INNER_RPC_BCID_SHIFT);
                (bits, true, true)
            }
            InnerPayload::Eifi { ei, fi, chamber_id } => {
                let bits = ((ei as u32) << INNER_EIFI_EI_SHIFT)
                    + ((fi as u32) << INNER_EIFI_FI_SHIFT)
                    + ((chamber_id as u32) << INNER_EIFI_CID_SHIFT);
                (bits, false, false)
            }
            InnerPayload::Tile { module, bcid } => {
                let bits = ((module as u32) << INNER_TILE_MODULE_SHIFT)
                    + ((bcid as u32) << INNER_TILE_BCID_SHIFT);
                (bits, false, true)
            }
        }
    }
}

impl<'a> TgcRdoDecoder<'a> {
    pub(crate) fn decode_inner(&self, state: &mut DecodeState<'_>, word: &RawWord) -> Outcome {
        let RawContent::Inner {
            is_forward,
            sector,
            payload,
        } = word.content
        else {
            return Outcome::Skipped;
        };

        let is_aside = word.side == Side::A;
        let (inner, is_inner_detector, is_strip) = payload.pack();
        let phi = self.cabling.sl_phi(word.rod_id, sector as u16);

        // Inner flags are attached to the pivot wheel element of their
        // sector, first ring.
        let element = ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: if is_aside { 1 } else { -1 },
            phi,
        };
        let Some(hash) = self.cabling.hash_of(&element) else {
            spdlog::debug!("no pivot element for inner word at phi {}", phi);
            return Outcome::Skipped;
        };

        spdlog::debug!(
            "inner data word, phi: {} aside: {} forward: {} inner: {:#x}",
            phi,
            is_aside,
            is_forward,
            inner
        );

        let slice = word.bc_tag.trig_slice();
        let Some(collection) = state.coin_collection(slice, hash, element) else {
            return Outcome::Seen;
        };
        collection.push(CoinRecord::Inner {
            common: CoinCommon {
                hash,
                is_aside,
                phi,
                is_forward,
                is_strip,
                tracklet_id: 0,
            },
            is_inner_detector,
            inner,
        });
        Outcome::Converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling_map::CablingMap;
    use crate::decoder::{DecodeProducts, DecodeRequest, TgcRdoDecoder};
    use crate::identifiers::BcTag;
    use crate::planar_geometry::PlanarGeometry;
    use crate::raw_word::RdoCollection;

    fn run(words: Vec<RawWord>) -> DecodeProducts {
        let map = CablingMap::new(None).unwrap();
        let geometry = PlanarGeometry::from_cabling(&map);
        let decoder = TgcRdoDecoder::new(&map, &geometry);
        let mut collection = RdoCollection::new(Side::A, 1);
        collection.words = words;
        decoder
            .decode(&vec![collection], DecodeRequest::Unseeded)
            .unwrap()
    }

    fn inner_word(payload: InnerPayload) -> RawWord {
        RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::Inner {
                is_forward: false,
                sector: 0,
                payload,
            },
        }
    }

    #[test]
    fn test_nsw_packing() {
        let payload = InnerPayload::Nsw {
            eta: 0xAB,
            phi: 0x15,
            dtheta: 3,
            phi_res: true,
            low_res: false,
            id: 5,
            bcid: 9,
            input: 2,
        };
        let (bits, is_inner, is_strip) = payload.pack();
        assert!(is_inner);
        assert!(!is_strip);
        assert_eq!(bits & 0xFF, 0xAB);
        assert_eq!((bits >> INNER_NSW_PHI_SHIFT) & 0x3F, 0x15);
        assert_eq!((bits >> INNER_NSW_DTHETA_SHIFT) & 0x1F, 3);
        assert_eq!((bits >> INNER_NSW_PHIRES_SHIFT) & 1, 1);
        assert_eq!((bits >> INNER_NSW_LOWRES_SHIFT) & 1, 0);
        assert_eq!((bits >> INNER_NSW_ID_SHIFT) & 0xF, 5);
        assert_eq!((bits >> INNER_NSW_BCID_SHIFT) & 0xF, 9);
        assert_eq!(bits >> INNER_NSW_INPUT_SHIFT, 2);
    }

    #[test]
    fn test_eifi_and_tile_packing() {
        let (bits, is_inner, is_strip) = InnerPayload::Eifi {
            ei: 0x0F,
            fi: 0xA0,
            chamber_id: 2,
        }
        .pack();
        assert!(!is_inner);
        assert!(!is_strip);
        assert_eq!(bits, 0x0F | (0xA0 << 8) | (2 << 16));
        let (bits, is_inner, is_strip) = InnerPayload::Tile {
            module: 0x3C,
            bcid: 1,
        }
        .pack();
        assert!(!is_inner);
        assert!(is_strip);
        assert_eq!(bits, 0x3C | (1 << 8));
    }

    #[test]
    fn test_inner_word_attaches_to_pivot_element() {
        let products = run(vec![inner_word(InnerPayload::Eifi {
            ei: 1,
            fi: 0,
            chamber_id: 0,
        })]);
        assert_eq!(products.stats.high_pt.seen, 1);
        assert_eq!(products.stats.high_pt.converted, 1);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        let CoinRecord::Inner { common, .. } = collection.iter().next().unwrap() else {
            panic!("not an inner record");
        };
        assert_eq!(common.phi, 1);
        assert!(common.is_aside);
    }

    #[test]
    fn test_inner_word_outside_table_is_skipped() {
        let word = RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::Inner {
                is_forward: false,
                sector: 3, // phi 4 has no chambers in the default table
                payload: InnerPayload::Tile { module: 0, bcid: 0 },
            },
        };
        let products = run(vec![word]);
        assert_eq!(products.stats.high_pt.seen, 0);
        assert!(products.coins[1].is_empty());
    }
}
