//! Low-pT tracklet decoders: the pivot/middle doublet coincidence and the
//! inner-station (EI/FI) tracklet.

use super::bit_layout::SlbKind;
use super::constants::{
    BIT_POS_ASD_SIZE, BIT_POS_A_INPUT_ORIGIN, BIT_POS_B_INPUT_ORIGIN, BIT_POS_D_INPUT_ORIGIN,
    BIT_POS_INPUT_SIZE,
};
use super::decoder::{DecodeState, Outcome, TgcRdoDecoder};
use super::identifiers::Side;
use super::raw_word::{RawContent, RawWord};
use super::records::{CoinCommon, CoinRecord};

/// Non-pivot coordinates of a tracklet, derived from the pivot position and
/// the measured delta. Accounts for board-edge wraparound; the clamp and
/// bail-out cases mirror the physical edge boards.
fn tracklet_nonpivot_coordinates(
    ssw: u16,
    slb: u16,
    slb_kind: SlbKind,
    sub_matrix: u8,
    position: u8,
    delta: i8,
) -> Option<(u16, u8, u8)> {
    if sub_matrix > 1 {
        spdlog::debug!("tracklet submatrix {} is invalid", sub_matrix);
        return None;
    }
    let is_strip = slb_kind == SlbKind::StripDoublet;
    let is_wire = slb_kind == SlbKind::WireDoublet;
    if !is_strip && !is_wire {
        return None;
    }
    let mut slb = slb;
    let mut sub_matrix = sub_matrix;
    let position_delta = position as i32 + delta as i32;

    let position = if position_delta >= BIT_POS_INPUT_SIZE {
        let mut position = position_delta - BIT_POS_INPUT_SIZE;
        if sub_matrix == 1 {
            if is_strip {
                // The expected strip position does not exist; clamp to the
                // edge of this board.
                position = BIT_POS_INPUT_SIZE - 1;
            } else if is_wire && ssw == 7 && (slb == 3 || slb == 11) {
                // Upper edge board of the forward wheel.
                return None;
            } else if is_wire && ssw != 7 && slb == 9 {
                // Upper edge board of the endcap wheel.
                return None;
            } else {
                sub_matrix = 0;
                slb += 1;
            }
        } else {
            sub_matrix = 1;
        }
        position
    } else if position_delta < 0 {
        let mut position = position_delta + BIT_POS_INPUT_SIZE;
        if sub_matrix == 0 {
            if is_strip {
                position = 0;
            } else if is_wire && ssw == 7 && (slb == 0 || slb == 8) {
                // Bottom edge board of the forward wheel; one step below the
                // edge is still readable.
                if position_delta == -1 {
                    position = 0;
                } else {
                    return None;
                }
            } else if is_wire && ssw != 7 && slb == 0 {
                if position_delta == -1 {
                    position = 0;
                } else {
                    return None;
                }
            } else {
                sub_matrix = 1;
                slb -= 1;
            }
        } else {
            sub_matrix = 0;
        }
        position
    } else {
        position_delta
    };

    Some((slb, sub_matrix, position as u8))
}

impl<'a> TgcRdoDecoder<'a> {
    pub(crate) fn decode_tracklet(&self, state: &mut DecodeState<'_>, word: &RawWord) -> Outcome {
        let RawContent::Tracklet {
            ssw_id,
            slb_id,
            slb_kind,
            sub_matrix,
            position,
            delta,
        } = word.content
        else {
            return Outcome::Skipped;
        };

        // Pivot plane channel.
        let Some(channel_out) = self.cabling.resolve_low_pt(
            word.side,
            word.rod_id,
            ssw_id,
            slb_id,
            sub_matrix,
            position,
            false,
        ) else {
            spdlog::debug!("tracklet pivot channel not found");
            return Outcome::Skipped;
        };

        // Non-pivot plane channel, following the delta across board edges.
        let Some((np_slb, np_sub, np_position)) =
            tracklet_nonpivot_coordinates(ssw_id, slb_id, slb_kind, sub_matrix, position, delta)
        else {
            return Outcome::Skipped;
        };
        let Some(channel_in) = self.cabling.resolve_low_pt(
            word.side,
            word.rod_id,
            ssw_id,
            np_slb,
            np_sub,
            np_position,
            true,
        ) else {
            spdlog::debug!("tracklet non-pivot channel not found");
            return Outcome::Skipped;
        };

        let element = channel_out.element;
        let Some(hash) = self.cabling.hash_of(&element) else {
            spdlog::warn!("no hash for element {}", element);
            return Outcome::Skipped;
        };

        let slice = word.bc_tag.trig_slice();
        if state.coin_satisfied_by_cache(slice, hash) {
            return Outcome::Seen;
        }

        let tracklet_id = 2 * slb_id as i32 + sub_matrix as i32;
        let delta = delta as i32;
        let sub_matrix = sub_matrix as i32;

        let projector = self.projector();
        let Some(out_projection) = projector.project(&channel_out) else {
            return Outcome::Seen;
        };
        let Some(in_projection) = projector.project(&channel_in) else {
            return Outcome::Seen;
        };

        let Some(collection) = state.coin_collection(slice, hash, element) else {
            return Outcome::Seen;
        };

        let record = CoinRecord::Tracklet {
            common: CoinCommon {
                hash,
                is_aside: word.side == Side::A,
                phi: element.phi,
                is_forward: ssw_id == 7 || ssw_id == 2,
                is_strip: slb_kind.is_strip(),
                tracklet_id,
            },
            channel_in,
            channel_out,
            position_in: in_projection.local,
            position_out: out_projection.local,
            width_in: in_projection.width,
            width_out: out_projection.width,
            delta,
            sub_matrix,
        };
        if collection.contains_duplicate_of(&record) {
            spdlog::debug!("duplicated tracklet dropped: {}", channel_out);
            return Outcome::Duplicate;
        }
        collection.push(record);
        Outcome::Converted
    }

    pub(crate) fn decode_tracklet_inner(
        &self,
        state: &mut DecodeState<'_>,
        word: &RawWord,
    ) -> Outcome {
        let RawContent::TrackletInner {
            ssw_id,
            slb_id,
            is_strip,
            sub_matrix,
        } = word.content
        else {
            return Outcome::Skipped;
        };

        let is_aside = word.side == Side::A;
        // Even board locations host the forward (FI) chambers.
        let is_forward = slb_id % 2 == 0;
        let slot = (slb_id as i32 / 2 + (word.rod_id as i32 - 2) * 2 + 23) % 24 + 1;
        let is_backward = if !is_forward {
            // EI orientation, with the slot 15/16 special pair.
            if slot == 15 {
                !is_aside
            } else if slot == 16 {
                is_aside
            } else if is_aside {
                slot % 3 == 2
            } else {
                slot % 3 != 2
            }
        } else {
            is_aside
        };

        // Derive the bit position of the first layer's representative
        // channel; one submatrix covers eight channels.
        let bit_pos = if !is_strip {
            let mut sub = sub_matrix as i32;
            if !is_forward {
                if sub == 3
                    && matches!(slot, 1 | 3 | 4 | 5 | 6 | 7 | 8 | 10 | 11 | 13 | 18 | 19 | 20)
                {
                    // These slots carry 24 wire channels only.
                    sub = 2;
                } else if sub == 2 && matches!(slot, 24 | 2 | 12 | 14 | 15 | 16 | 22 | 23) {
                    // These slots carry 16 wire channels only.
                    sub = 1;
                }
            }
            BIT_POS_D_INPUT_ORIGIN - BIT_POS_INPUT_SIZE + 1 + BIT_POS_ASD_SIZE / 4 * (sub * 2 + 1)
        } else if is_backward {
            BIT_POS_B_INPUT_ORIGIN - BIT_POS_INPUT_SIZE
                + 1
                + i32::from(is_aside)
                + BIT_POS_ASD_SIZE / 4 * (sub_matrix as i32 * 2 + 1)
        } else {
            BIT_POS_A_INPUT_ORIGIN - BIT_POS_INPUT_SIZE
                + 1
                + i32::from(!is_aside)
                + BIT_POS_ASD_SIZE / 4 * (sub_matrix as i32 * 2 + 1)
        };

        let Some(channel_in) =
            self.cabling
                .resolve(word.side, word.rod_id, ssw_id, slb_id, bit_pos, false)
        else {
            spdlog::warn!(
                "inner tracklet channel not found: side={} rod={} ssw={} slb={} bitpos={} strip={} slot={}",
                word.side,
                word.rod_id,
                ssw_id,
                slb_id,
                bit_pos,
                is_strip,
                slot
            );
            return Outcome::Skipped;
        };

        let element = channel_in.element;
        let Some(hash) = self.cabling.hash_of(&element) else {
            spdlog::warn!("no hash for element {}", element);
            return Outcome::Skipped;
        };

        let slice = word.bc_tag.trig_slice();
        if state.coin_satisfied_by_cache(slice, hash) {
            return Outcome::Seen;
        }

        let projector = self.projector();
        let Some(descriptor) = projector.descriptor(&channel_in) else {
            return Outcome::Seen;
        };
        let Some(local) = projector.channel_local(descriptor, &channel_in) else {
            return Outcome::Seen;
        };

        // One submatrix spans eight channels around the representative.
        let gas_gap = channel_in.gas_gap;
        let channel = channel_in.channel;
        let width = if is_strip {
            let hi = descriptor.strip_extent(gas_gap, channel + 4, local.x);
            let lo = channel
                .checked_sub(3)
                .and_then(|c| descriptor.strip_extent(gas_gap, c, local.x));
            match (hi, lo) {
                (Some((_, max)), Some((min, _))) => max - min,
                _ => return Outcome::Seen,
            }
        } else {
            let mut positive_offset = 4;
            if is_forward && slot % 3 == 2 && channel == 28 {
                // The short forward slot has 30 channels only.
                positive_offset = 2;
            }
            let hi = descriptor.wire_extent(gas_gap, channel + positive_offset);
            let lo = channel
                .checked_sub(3)
                .and_then(|c| descriptor.wire_extent(gas_gap, c));
            match (hi, lo) {
                (Some((_, max)), Some((min, _))) => max - min,
                _ => return Outcome::Seen,
            }
        };
        if width < self.config.min_channel_width {
            spdlog::warn!(
                "inner tracklet width is invalid: gasgap={} channel={} width={}",
                gas_gap,
                channel,
                width
            );
            return Outcome::Seen;
        }

        let Some(collection) = state.coin_collection(slice, hash, element) else {
            return Outcome::Seen;
        };

        let record = CoinRecord::TrackletInner {
            common: CoinCommon {
                hash,
                is_aside,
                phi: element.phi,
                is_forward,
                is_strip,
                tracklet_id: 0,
            },
            channel_in,
            position_in: local,
            width_in: width,
            sub_matrix: sub_matrix as i32,
        };
        if collection.contains_duplicate_of(&record) {
            spdlog::debug!("duplicated inner tracklet dropped: {}", channel_in);
            return Outcome::Duplicate;
        }
        collection.push(record);
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
    use crate::records::CoinKind;

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

    fn tracklet_word(sub_matrix: u8, position: u8, delta: i8) -> RawWord {
        RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::Tracklet {
                ssw_id: 3,
                slb_id: 2,
                slb_kind: SlbKind::WireDoublet,
                sub_matrix,
                position,
                delta,
            },
        }
    }

    #[test]
    fn test_tracklet_converts_with_both_planes() {
        let products = run(vec![tracklet_word(0, 10, 2)]);
        assert_eq!(products.stats.tracklet.seen, 1);
        assert_eq!(products.stats.tracklet.converted, 1);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        let record = collection.iter().next().unwrap();
        assert_eq!(record.kind(), CoinKind::Tracklet);
        let CoinRecord::Tracklet {
            common,
            channel_in,
            channel_out,
            delta,
            ..
        } = record
        else {
            panic!("not a tracklet");
        };
        assert_eq!(common.tracklet_id, 4);
        assert_eq!(*delta, 2);
        assert!(!common.is_forward);
        assert_eq!(
            channel_out.element.station,
            crate::identifiers::Station::PivotDoublet
        );
        assert_eq!(
            channel_in.element.station,
            crate::identifiers::Station::MiddleDoublet
        );
    }

    #[test]
    fn test_duplicate_tracklets_collapse_to_one_record() {
        let products = run(vec![tracklet_word(0, 10, 2), tracklet_word(0, 10, 2)]);
        assert_eq!(products.stats.tracklet.seen, 1);
        assert_eq!(products.stats.tracklet.converted, 1);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        assert_eq!(collection.len(), 1);
        // A different delta is a distinct coincidence.
        let products = run(vec![tracklet_word(0, 10, 2), tracklet_word(0, 10, 3)]);
        assert_eq!(products.stats.tracklet.converted, 2);
    }

    #[test]
    fn test_wraparound_crosses_into_next_board() {
        // Position 30 with delta +5 walks over the submatrix boundary.
        let (slb, sub, pos) =
            tracklet_nonpivot_coordinates(4, 2, SlbKind::WireDoublet, 0, 30, 5).unwrap();
        assert_eq!((slb, sub, pos), (2, 1, 3));
        // From the upper submatrix it walks into the next board.
        let (slb, sub, pos) =
            tracklet_nonpivot_coordinates(4, 2, SlbKind::WireDoublet, 1, 30, 5).unwrap();
        assert_eq!((slb, sub, pos), (3, 0, 3));
        // The endcap top edge board has no upper neighbor.
        assert!(tracklet_nonpivot_coordinates(4, 9, SlbKind::WireDoublet, 1, 30, 5).is_none());
        // Strips clamp to the board edge instead.
        let (slb, sub, pos) =
            tracklet_nonpivot_coordinates(4, 17, SlbKind::StripDoublet, 1, 30, 5).unwrap();
        assert_eq!((slb, sub, pos), (17, 1, 31));
    }

    #[test]
    fn test_bottom_edge_allows_single_step() {
        let (slb, sub, pos) =
            tracklet_nonpivot_coordinates(4, 0, SlbKind::WireDoublet, 0, 0, -1).unwrap();
        assert_eq!((slb, sub, pos), (0, 0, 0));
        assert!(tracklet_nonpivot_coordinates(4, 0, SlbKind::WireDoublet, 0, 0, -3).is_none());
    }

    #[test]
    fn test_inner_tracklet_converts() {
        let word = RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::TrackletInner {
                ssw_id: 8,
                slb_id: 1,
                is_strip: false,
                sub_matrix: 1,
            },
        };
        let products = run(vec![word]);
        assert_eq!(products.stats.tracklet_inner.seen, 1);
        assert_eq!(products.stats.tracklet_inner.converted, 1);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        let record = collection.iter().next().unwrap();
        assert_eq!(record.kind(), CoinKind::TrackletInner);
        let CoinRecord::TrackletInner { common, .. } = record else {
            panic!("not an inner tracklet");
        };
        // Odd board locations are EI chambers.
        assert!(!common.is_forward);
    }

    #[test]
    fn test_inner_tracklet_strip_uses_orientation_line() {
        let word = RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::TrackletInner {
                ssw_id: 8,
                slb_id: 0,
                is_strip: true,
                sub_matrix: 0,
            },
        };
        let products = run(vec![word]);
        assert_eq!(products.stats.tracklet_inner.converted, 1);
    }
}
