//! Sector-logic decoder: region-of-interest decisions into 2D coincidence
//! records.
//!
//! The radial coordinate comes from three wire channels bracketing the ROI
//! row, the azimuth from three strip channels; the two are combined into a
//! 3D point and projected back onto the representative wire chamber. For
//! ROIs on a chamber boundary the strip board cannot be derived from the
//! ROI alone and is recovered by scanning the raw collection for the
//! matching high-pT strip (or, failing that, tracklet strip) word.

use super::bit_layout::SlbKind;
use super::cabling_map::HighPtId;
use super::constants::*;
use super::decode_hipt::{bit_pos_out_strip, is_backward_chamber};
use super::decoder::{DecodeState, Outcome, TgcRdoDecoder};
use super::geometry::Vec3;
use super::identifiers::{ChannelId, Side};
use super::projector::eta_from_r_z;
use super::raw_word::{RawContent, RawWord, RdoCollection};
use super::records::{CoinCommon, CoinRecord};

fn roi_row(roi: u16) -> u16 {
    roi / 4
}

/// Endcap ROI rows whose strip window straddles two chambers.
fn is_included_in_chamber_boundary(is_forward: bool, roi: u16) -> bool {
    !is_forward && matches!(roi_row(roi), 3 | 4 | 7 | 8 | 11 | 12 | 23 | 24)
}

/// Strip tracklet-id ladder of an endcap ROI: primary, boundary partner,
/// and the extra fallback introduced by the high-pT endcap strip board bug.
/// Entries are -1 when absent.
fn endcap_strip_candidate_tracklet_ids(roi: u16) -> [i32; 3] {
    const T9_OFFSET: i32 = 32;
    const T8_OFFSET: i32 = 34;
    const T7_OFFSET: i32 = 36;
    const T6_OFFSET: i32 = 38;
    const T5_OFFSET: i32 = 40;

    let ssc = (roi as i32 + 4) / 8;
    let half_ssc = (roi as i32 % 4) / 2;
    match ssc {
        0..=1 => [T9_OFFSET + half_ssc, -1, -1],
        2 => [T8_OFFSET + half_ssc, T9_OFFSET + half_ssc, -1],
        3 => [T8_OFFSET + half_ssc, -1, -1],
        4 => [T7_OFFSET + half_ssc, T8_OFFSET + half_ssc, -1],
        5 => [T7_OFFSET + half_ssc, -1, -1],
        6 => [T6_OFFSET + half_ssc, T7_OFFSET + half_ssc, T5_OFFSET + half_ssc],
        7..=11 => [T6_OFFSET + half_ssc, T5_OFFSET + half_ssc, -1],
        12 => [T6_OFFSET + half_ssc, T5_OFFSET + half_ssc, -1],
        13..=18 => [T5_OFFSET + half_ssc, T6_OFFSET + half_ssc, -1],
        _ => [-1, -1, -1],
    }
}

/// Wire window of a sector-logic row: submatrix plus the bit positions of
/// the larger-radius edge, the inner reference and the smaller-radius
/// center. The fixed rows patch the short edge boards.
fn bit_pos_wire(is_forward: bool, row: u16, hit_id: u8, sub: u8) -> (i32, [i32; 3]) {
    if row == 0 && !is_forward {
        // First endcap board: six channels only, the largest radius.
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_R_CH05,
                BIT_POS_A_INPUT_SMALL_R_CH04,
                BIT_POS_A_INPUT_SMALL_R_CH00,
            ],
        )
    } else if row == 36 && !is_forward {
        // Last endcap board: four channels only, the smallest radius.
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_R_CH07,
                BIT_POS_A_INPUT_SMALL_R_CH04,
                BIT_POS_A_INPUT_SMALL_R_CH04,
            ],
        )
    } else if row == 0 && is_forward {
        // First forward board: five channels only.
        (
            0,
            [
                BIT_POS_B_INPUT_LARGE_R_CH12,
                BIT_POS_A_INPUT_LARGE_R_CH12,
                BIT_POS_A_INPUT_LARGE_R_CH08,
            ],
        )
    } else if row == 15 && is_forward {
        // Last forward board: five channels only.
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_R_CH07,
                BIT_POS_A_INPUT_SMALL_R_CH04,
                BIT_POS_A_INPUT_SMALL_R_CH03,
            ],
        )
    } else if hit_id % 2 == 0 {
        if sub == 0 {
            (
                0,
                [
                    BIT_POS_B_INPUT_LARGE_R_CH15,
                    BIT_POS_A_INPUT_LARGE_R_CH12,
                    BIT_POS_A_INPUT_LARGE_R_CH08,
                ],
            )
        } else {
            (
                0,
                [
                    BIT_POS_B_INPUT_LARGE_R_CH07,
                    BIT_POS_A_INPUT_LARGE_R_CH04,
                    BIT_POS_A_INPUT_LARGE_R_CH00,
                ],
            )
        }
    } else if sub == 0 {
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_R_CH15,
                BIT_POS_A_INPUT_SMALL_R_CH12,
                BIT_POS_A_INPUT_SMALL_R_CH08,
            ],
        )
    } else {
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_R_CH07,
                BIT_POS_A_INPUT_SMALL_R_CH04,
                BIT_POS_A_INPUT_SMALL_R_CH00,
            ],
        )
    }
}

/// Strip window of a sector-logic column, in the A-side-forward /
/// C-side-backward azimuth orientation.
fn bit_pos_strip(hit_id: u8, sub: u8) -> (i32, [i32; 3]) {
    if hit_id % 2 == 0 {
        if sub == 0 {
            (
                0,
                [
                    BIT_POS_B_INPUT_LARGE_PHI_CH15,
                    BIT_POS_A_INPUT_LARGE_PHI_CH12,
                    BIT_POS_A_INPUT_LARGE_PHI_CH08,
                ],
            )
        } else {
            (
                0,
                [
                    BIT_POS_B_INPUT_LARGE_PHI_CH07,
                    BIT_POS_A_INPUT_LARGE_PHI_CH04,
                    BIT_POS_A_INPUT_LARGE_PHI_CH00,
                ],
            )
        }
    } else if sub == 0 {
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_PHI_CH15,
                BIT_POS_A_INPUT_SMALL_PHI_CH12,
                BIT_POS_A_INPUT_SMALL_PHI_CH08,
            ],
        )
    } else {
        (
            1,
            [
                BIT_POS_B_INPUT_SMALL_PHI_CH07,
                BIT_POS_A_INPUT_SMALL_PHI_CH04,
                BIT_POS_A_INPUT_SMALL_PHI_CH00,
            ],
        )
    }
}

struct SlChannels {
    channels: [ChannelId; 3],
    sbloc: u16,
    sub_matrix: i32,
    high_pt: HighPtId,
}

impl<'a> TgcRdoDecoder<'a> {
    pub(crate) fn decode_sector_logic(
        &self,
        state: &mut DecodeState<'_>,
        word: &RawWord,
        rdo_collection: &RdoCollection,
    ) -> Outcome {
        let RawContent::SectorLogic {
            is_forward,
            sector,
            inner_flag,
            coin_flag,
            is_muplus,
            threshold,
            veto,
            roi,
        } = word.content
        else {
            return Outcome::Skipped;
        };

        // Wire triple bracketing the ROI row.
        let Some(wire) = self.sl_wire_ids(word, sector, is_forward, roi) else {
            return Outcome::Skipped;
        };
        // Strip triple; chamber-boundary ROIs need the raw collection to
        // recover the strip board.
        let Some(strip) = self.sl_strip_ids(word, sector, is_forward, roi, &wire, rdo_collection)
        else {
            return Outcome::Skipped;
        };

        let element = wire.channels[1].element;
        let Some(hash) = self.cabling.hash_of(&element) else {
            spdlog::warn!("no hash for element {}", element);
            return Outcome::Skipped;
        };

        let slice = word.bc_tag.trig_slice();
        if state.coin_satisfied_by_cache(slice, hash) {
            return Outcome::Seen;
        }

        let tracklet_id = 2 * wire.sbloc as i32 + wire.sub_matrix;
        let tracklet_id_strip = 2 * strip.sbloc as i32 + strip.sub_matrix;
        let mut full_threshold = threshold as i32;
        full_threshold += (coin_flag as i32) << 4;
        full_threshold += (inner_flag as i32) << 7;

        // Radial coordinate from the wires.
        let projector = self.projector();
        let Some((width_r, r, z)) = projector.sl_wire_geometry(&wire.channels) else {
            return Outcome::Seen;
        };
        if width_r < self.config.min_channel_width && self.config.drop_zero_width_records {
            return Outcome::Seen;
        }
        let Some(mut eta) = eta_from_r_z(r, z) else {
            spdlog::warn!("eta conversion failed for sector-logic record");
            return Outcome::Seen;
        };
        if z < 0.0 {
            eta *= -1.0;
        }

        // Azimuthal coordinate from the strips.
        let is_backward = is_backward_chamber(word.side, sector, is_forward);
        let is_aside = word.side == Side::A;
        let Some((width_phi, phi_angle)) =
            projector.sl_strip_geometry(&strip.channels, is_backward, is_aside)
        else {
            return Outcome::Seen;
        };
        if width_phi < self.config.min_channel_width && self.config.drop_zero_width_records {
            return Outcome::Seen;
        }

        // Combine into a space point and project it back onto the
        // representative wire chamber; fall back to the iterative solver
        // when the frame transform rejects the point.
        let Some(descriptor) = projector.descriptor(&wire.channels[2]) else {
            return Outcome::Seen;
        };
        let global = Vec3::new(r * phi_angle.cos(), r * phi_angle.sin(), z);
        let position = match descriptor.to_local(global) {
            Some(local) => local,
            None => projector.sl_local_position(descriptor, eta, phi_angle),
        };

        let Some(collection) = state.coin_collection(slice, hash, element) else {
            return Outcome::Seen;
        };

        let record = CoinRecord::SectorLogic {
            common: CoinCommon {
                hash,
                is_aside,
                phi: wire.channels[2].element.phi,
                is_forward,
                is_strip: false,
                tracklet_id,
            },
            channel_out: wire.channels[2],
            position,
            error_r: width_r,
            error_phi: width_phi,
            tracklet_id_strip,
            roi: roi as i32,
            threshold: full_threshold,
            veto,
            is_positive_delta_r: is_muplus,
        };
        if collection.contains_duplicate_of(&record) {
            spdlog::debug!("duplicated sector-logic dropped: {}", wire.channels[2]);
            return Outcome::Duplicate;
        }
        collection.push(record);
        Outcome::Converted
    }

    /// Wire channels of the ROI row: larger-radius edge, center reference,
    /// smaller-radius center.
    fn sl_wire_ids(
        &self,
        word: &RawWord,
        sector: u8,
        is_forward: bool,
        roi: u16,
    ) -> Option<SlChannels> {
        let high_pt = self.cabling.high_pt_from_roi(roi, is_forward, false)?;
        let center = self.cabling.offline_from_high_pt(
            word.side,
            word.rod_id,
            sector,
            is_forward,
            false,
            &high_pt,
        )?;
        let (ssw, sbloc, _) =
            self.cabling
                .high_pt_pivot(word.side, word.rod_id, sector, is_forward, false, &high_pt)?;
        let (sub_matrix, bitpos) = bit_pos_wire(is_forward, roi_row(roi), high_pt.hit_id, high_pt.sub);
        let edge = self
            .cabling
            .resolve(word.side, word.rod_id, ssw, sbloc, bitpos[0], false)?;
        let small = self
            .cabling
            .resolve(word.side, word.rod_id, ssw, sbloc, bitpos[2], false)?;
        Some(SlChannels {
            channels: [edge, center, small],
            sbloc,
            sub_matrix,
            high_pt,
        })
    }

    /// Strip channels of the ROI column.
    fn sl_strip_ids(
        &self,
        word: &RawWord,
        sector: u8,
        is_forward: bool,
        roi: u16,
        wire: &SlChannels,
        rdo_collection: &RdoCollection,
    ) -> Option<SlChannels> {
        let high_pt = self.cabling.high_pt_from_roi(roi, is_forward, true)?;
        let (sub_matrix, bitpos) = bit_pos_strip(high_pt.hit_id, high_pt.sub);

        if !is_included_in_chamber_boundary(is_forward, roi) {
            let center = self.cabling.offline_from_high_pt(
                word.side,
                word.rod_id,
                sector,
                is_forward,
                true,
                &high_pt,
            )?;
            let (ssw, sbloc, _) = self.cabling.high_pt_pivot(
                word.side,
                word.rod_id,
                sector,
                is_forward,
                true,
                &high_pt,
            )?;
            let edge = self
                .cabling
                .resolve(word.side, word.rod_id, ssw, sbloc, bitpos[0], false)?;
            let small = self
                .cabling
                .resolve(word.side, word.rod_id, ssw, sbloc, bitpos[2], false)?;
            return Some(SlChannels {
                channels: [edge, center, small],
                sbloc,
                sub_matrix,
                high_pt,
            });
        }

        // Boundary ROI: the strip board is recovered from an associated
        // high-pT strip word, or a tracklet strip word as fallback.
        let ssw = sector as u16 + 3;
        let sbloc = self
            .sl_strip_board_from_high_pt(word, sector, roi, &wire.high_pt, rdo_collection)
            .or_else(|| {
                self.sl_strip_board_from_tracklet(word, sector, roi, &wire.high_pt, rdo_collection)
            });
        let Some(sbloc) = sbloc else {
            spdlog::debug!("no strip board found for boundary roi {}", roi);
            return None;
        };

        let mut channels = [None; 3];
        for i in 0..3 {
            channels[i] = self
                .cabling
                .resolve(word.side, word.rod_id, ssw, sbloc, bitpos[i], false);
            channels[i]?;
        }
        Some(SlChannels {
            channels: [channels[0]?, channels[1]?, channels[2]?],
            sbloc,
            sub_matrix,
            high_pt,
        })
    }

    /// Scan the raw collection for a high-pT strip word whose ROI matches;
    /// its pivot board is the boundary strip board.
    fn sl_strip_board_from_high_pt(
        &self,
        word: &RawWord,
        sector: u8,
        roi: u16,
        wire_high_pt: &HighPtId,
        rdo_collection: &RdoCollection,
    ) -> Option<u16> {
        let candidates = endcap_strip_candidate_tracklet_ids(roi);
        let mut found: Option<u16> = None;

        for candidate in &rdo_collection.words {
            let RawContent::HighPt {
                is_strip: true,
                is_forward: false,
                sector: cand_sector,
                chip,
                index,
                hit_id,
                hsub,
                ..
            } = candidate.content
            else {
                continue;
            };
            if candidate.bc_tag != word.bc_tag
                || candidate.side != word.side
                || candidate.rod_id != word.rod_id
                || cand_sector != sector
            {
                continue;
            }

            let rdo_id = HighPtId {
                index,
                chip,
                hit_id,
                sub: hsub,
            };
            let Some(strip_sim) = self.cabling.sim_from_rdo_high_pt(&rdo_id) else {
                continue;
            };
            let Some((_, sbloc_o, _)) = self.cabling.high_pt_pivot(
                candidate.side,
                candidate.rod_id,
                cand_sector,
                false,
                true,
                &strip_sim,
            ) else {
                continue;
            };
            let (strip_sub_matrix, _) = bit_pos_out_strip(hit_id, hsub);
            let tracklet_id_strip = 2 * sbloc_o as i32 + strip_sub_matrix;
            if !candidates.contains(&tracklet_id_strip) {
                continue;
            }
            // The bug fallback row only counts when nothing else matched.
            if found.is_some() && tracklet_id_strip == candidates[2] {
                continue;
            }

            let Some(matched_roi) = self.cabling.roi_from_high_pt(false, wire_high_pt, &strip_sim)
            else {
                continue;
            };
            if matched_roi == roi {
                found = Some(sbloc_o);
                if tracklet_id_strip == candidates[0] {
                    break;
                }
            }
        }
        found
    }

    /// Tracklet-strip fallback of the boundary scan.
    fn sl_strip_board_from_tracklet(
        &self,
        word: &RawWord,
        sector: u8,
        roi: u16,
        wire_high_pt: &HighPtId,
        rdo_collection: &RdoCollection,
    ) -> Option<u16> {
        let candidates = endcap_strip_candidate_tracklet_ids(roi);
        let mut found: Option<u16> = None;

        for candidate in &rdo_collection.words {
            let RawContent::Tracklet {
                ssw_id,
                slb_id,
                slb_kind: SlbKind::StripDoublet,
                sub_matrix,
                position,
                ..
            } = candidate.content
            else {
                continue;
            };
            // Chamber boundaries exist in the endcap only; the strip
            // doublets of this sector sit three switches up.
            if ssw_id < 3 || ssw_id as i32 - 3 != sector as i32 {
                continue;
            }
            if candidate.bc_tag != word.bc_tag
                || candidate.side != word.side
                || candidate.rod_id != word.rod_id
            {
                continue;
            }

            let tracklet_id_strip = 2 * slb_id as i32 + sub_matrix as i32;
            if !candidates.contains(&tracklet_id_strip) {
                continue;
            }
            if found.is_some() && tracklet_id_strip == candidates[2] {
                continue;
            }

            // Confirm the tracklet points at this ROI before adopting its
            // board.
            if self
                .cabling
                .resolve_low_pt(
                    candidate.side,
                    candidate.rod_id,
                    ssw_id,
                    slb_id,
                    sub_matrix,
                    position,
                    false,
                )
                .is_none()
            {
                continue;
            }
            let board = slb_id.checked_sub(16)?;
            let strip_sim = HighPtId {
                index: 0,
                chip: (board / 3) as u8,
                hit_id: ((board % 3) * 2 + sub_matrix as u16) as u8,
                sub: (position / 16) as u8,
            };
            let Some(matched_roi) = self.cabling.roi_from_high_pt(false, wire_high_pt, &strip_sim)
            else {
                continue;
            };
            if matched_roi == roi {
                found = Some(slb_id);
                if tracklet_id_strip == candidates[0] {
                    break;
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling_map::CablingMap;
    use crate::decoder::{DecodeProducts, DecodeRequest, TgcRdoDecoder};
    use crate::identifiers::BcTag;
    use crate::planar_geometry::PlanarGeometry;
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

    fn sl_word(roi: u16) -> RawWord {
        RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::SectorLogic {
                is_forward: false,
                sector: 0,
                inner_flag: 0,
                coin_flag: 0,
                is_muplus: true,
                threshold: 3,
                veto: false,
                roi,
            },
        }
    }

    fn strip_high_pt_word(chip: u8, hit_id: u8, hsub: u8) -> RawWord {
        RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag: BcTag::Current,
            content: RawContent::HighPt {
                is_strip: true,
                is_forward: false,
                sector: 0,
                chip,
                index: 0,
                hit_id,
                hsub,
                delta: 0,
                inner: 0,
            },
        }
    }

    #[test]
    fn test_sector_logic_converts_off_boundary() {
        // Row 5 sits inside the second chamber; no boundary handling.
        let products = run(vec![sl_word(20)]);
        assert_eq!(products.stats.sector_logic.seen, 1);
        assert_eq!(products.stats.sector_logic.converted, 1);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        let record = collection.iter().next().unwrap();
        assert_eq!(record.kind(), CoinKind::SectorLogic);
        let CoinRecord::SectorLogic {
            common,
            error_r,
            error_phi,
            roi,
            threshold,
            ..
        } = record
        else {
            panic!("not a sector-logic record");
        };
        assert_eq!(*roi, 20);
        assert_eq!(*threshold, 3);
        assert!(*error_r > 0.0);
        assert!(*error_phi > 0.0);
        assert!(common.is_aside);
    }

    #[test]
    fn test_sector_logic_position_is_on_chamber() {
        let products = run(vec![sl_word(20)]);
        let (_, collection) = products.coins[1].iter().next().unwrap();
        let CoinRecord::SectorLogic {
            channel_out,
            position,
            ..
        } = collection.iter().next().unwrap()
        else {
            panic!("not a sector-logic record");
        };
        // The local position is finite and within the chamber's radial span.
        assert!(position.x.abs() < 2000.0);
        assert_eq!(
            channel_out.element.station,
            crate::identifiers::Station::PivotDoublet
        );
    }

    #[test]
    fn test_duplicate_sector_logic_collapses() {
        let products = run(vec![sl_word(20), sl_word(20)]);
        assert_eq!(products.stats.sector_logic.seen, 1);
        assert_eq!(products.stats.sector_logic.converted, 1);
    }

    #[test]
    fn test_boundary_roi_without_partner_is_skipped() {
        // Row 3 is a boundary row; with no strip word to resolve the board
        // the word is skipped and the counters stay untouched.
        let products = run(vec![sl_word(12)]);
        assert_eq!(products.stats.sector_logic.seen, 0);
        assert_eq!(products.stats.sector_logic.converted, 0);
    }

    #[test]
    fn test_boundary_roi_resolved_by_high_pt_strip() {
        // ROI 12 is on the chamber 1/2 boundary (row 3, ssc 2); its primary
        // strip candidate is the second chamber's board (tracklet id 34),
        // which chip 0 / hit 3 / hsub 0 addresses.
        let words = vec![strip_high_pt_word(0, 3, 0), sl_word(12)];
        let products = run(words);
        assert_eq!(products.stats.sector_logic.seen, 1);
        assert_eq!(products.stats.sector_logic.converted, 1);
        let (_, collection) = products
            .coins[1]
            .iter()
            .find(|(_, c)| c.iter().any(|r| r.kind() == CoinKind::SectorLogic))
            .unwrap();
        let CoinRecord::SectorLogic {
            tracklet_id_strip, ..
        } = collection
            .iter()
            .find(|r| r.kind() == CoinKind::SectorLogic)
            .unwrap()
        else {
            panic!("not a sector-logic record");
        };
        assert_eq!(*tracklet_id_strip, 34);
    }
}
