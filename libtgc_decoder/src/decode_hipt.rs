//! High-pT decoder: pivot doublet against triplet coincidences, including
//! the chamber-boundary window collapse.

use super::bit_layout::{bit_position_of, channel_of, SlbKind};
use super::cabling_map::HighPtId;
use super::constants::*;
use super::decoder::{DecodeState, Outcome, TgcRdoDecoder};
use super::identifiers::{ChannelId, Side};
use super::raw_word::{RawContent, RawWord};
use super::records::{CoinCommon, CoinRecord};

/// Orientation of a big-wheel chamber, by side and azimuthal sector parity.
pub(crate) fn is_backward_chamber(side: Side, sector: u8, is_forward: bool) -> bool {
    if !is_forward {
        match side {
            Side::A => sector % 2 == 1,
            Side::C => sector % 2 == 0,
        }
    } else {
        side == Side::A
    }
}

/// Expand the compressed delta back to channel units. The readout packs the
/// tails of the window nonuniformly; literal table.
pub(crate) fn delta_before_convert(is_strip: bool, delta: i8) -> i32 {
    if is_strip {
        match delta {
            5 => 6,
            6 => 8,
            7 => 10,
            -4 => -5,
            -5 => -7,
            -6 => -9,
            -7 => -12,
            d => d as i32,
        }
    } else {
        match delta {
            11 => 12,
            12 => 14,
            13 => 16,
            14 => 18,
            15 => 20,
            -12 => -13,
            -13 => -15,
            -14 => -17,
            -15 => -19,
            d => d as i32,
        }
    }
}

/// Pivot-plane window edges of a wire candidate (as-recorded ids). Returns
/// the output submatrix and the two edge bit positions, larger radius
/// first. The tail entries correct the short edge boards, which carry fewer
/// channels than a full one.
fn bit_pos_out_wire(
    is_forward: bool,
    chip: u8,
    hit_id: u8,
    hsub: u8,
) -> (i32, [i32; 2]) {
    let (mut sub_matrix, mut bitpos) = if hit_id % 2 == 1 {
        if hsub == 0 {
            (0, [BIT_POS_B_INPUT_LARGE_R_CH15, BIT_POS_A_INPUT_LARGE_R_CH08])
        } else {
            (0, [BIT_POS_B_INPUT_LARGE_R_CH07, BIT_POS_A_INPUT_LARGE_R_CH00])
        }
    } else if hsub == 0 {
        (1, [BIT_POS_B_INPUT_SMALL_R_CH15, BIT_POS_A_INPUT_SMALL_R_CH08])
    } else {
        (1, [BIT_POS_B_INPUT_SMALL_R_CH07, BIT_POS_A_INPUT_SMALL_R_CH00])
    };

    if !is_forward {
        if chip == 0 && hit_id == 1 && hsub == 1 {
            // First endcap board: six channels only, the largest radius.
            sub_matrix = 1;
            bitpos = [BIT_POS_B_INPUT_SMALL_R_CH05, BIT_POS_A_INPUT_SMALL_R_CH00];
        } else if chip == 3 && hit_id == 6 && hsub == 1 {
            // Last endcap board: four channels only, the smallest radius.
            bitpos = [BIT_POS_B_INPUT_SMALL_R_CH07, BIT_POS_A_INPUT_SMALL_R_CH04];
        }
    } else if chip == 0 && hit_id == 1 && hsub == 0 {
        // First forward board: five channels only.
        bitpos = [BIT_POS_B_INPUT_LARGE_R_CH12, BIT_POS_A_INPUT_LARGE_R_CH08];
    } else if chip == 1 && hit_id == 2 && hsub == 1 {
        // Last forward board: five channels only.
        bitpos = [BIT_POS_B_INPUT_SMALL_R_CH07, BIT_POS_A_INPUT_SMALL_R_CH03];
    }
    (sub_matrix, bitpos)
}

/// Pivot-plane window edges of a strip candidate (as-recorded ids); larger
/// azimuth (A-side forward / C-side backward orientation) first.
pub(crate) fn bit_pos_out_strip(hit_id: u8, hsub: u8) -> (i32, [i32; 2]) {
    if hit_id % 2 == 1 {
        if hsub == 0 {
            (0, [BIT_POS_B_INPUT_LARGE_PHI_CH15, BIT_POS_A_INPUT_LARGE_PHI_CH08])
        } else {
            (0, [BIT_POS_B_INPUT_LARGE_PHI_CH07, BIT_POS_A_INPUT_LARGE_PHI_CH00])
        }
    } else if hsub == 0 {
        (1, [BIT_POS_B_INPUT_SMALL_PHI_CH15, BIT_POS_A_INPUT_SMALL_PHI_CH08])
    } else {
        (1, [BIT_POS_B_INPUT_SMALL_PHI_CH07, BIT_POS_A_INPUT_SMALL_PHI_CH00])
    }
}

impl<'a> TgcRdoDecoder<'a> {
    pub(crate) fn decode_high_pt(&self, state: &mut DecodeState<'_>, word: &RawWord) -> Outcome {
        let RawContent::HighPt {
            is_strip,
            is_forward,
            sector,
            chip,
            index,
            hit_id,
            hsub,
            delta,
            inner,
        } = word.content
        else {
            return Outcome::Skipped;
        };

        if hit_id == 0 {
            spdlog::debug!("high-pT word with hit id 0, skipped");
            return Outcome::Skipped;
        }

        let is_aside = word.side == Side::A;
        let is_backward = is_backward_chamber(word.side, sector, is_forward);
        let delta_wide = delta_before_convert(is_strip, delta);

        // Pivot board of the candidate.
        let rdo_id = HighPtId {
            index,
            chip,
            hit_id,
            sub: hsub,
        };
        let Some(sim_id) = self.cabling.sim_from_rdo_high_pt(&rdo_id) else {
            return Outcome::Skipped;
        };
        let Some((ssw_o, sbloc_o, slb_id_o)) =
            self.cabling
                .high_pt_pivot(word.side, word.rod_id, sector, is_forward, is_strip, &sim_id)
        else {
            spdlog::debug!("high-pT pivot board not found");
            return Outcome::Skipped;
        };

        // Window edges on the pivot plane.
        let (sub_matrix_out, bitpos_o) = if !is_strip {
            bit_pos_out_wire(is_forward, chip, hit_id, hsub)
        } else {
            bit_pos_out_strip(hit_id, hsub)
        };
        let mut channels_out: [Option<ChannelId>; 2] = [None; 2];
        for i in 0..2 {
            channels_out[i] =
                self.cabling
                    .resolve(word.side, word.rod_id, ssw_o, sbloc_o, bitpos_o[i], false);
            if channels_out[i].is_none() {
                spdlog::debug!("high-pT pivot channel not found for bitpos {}", bitpos_o[i]);
                return Outcome::Skipped;
            }
        }
        let channels_out = [channels_out[0].unwrap(), channels_out[1].unwrap()];

        // Window edges on the non-pivot (triplet) plane.
        let channels_in = if !is_strip {
            self.resolve_high_pt_wire_in(word, sector, is_forward, slb_id_o, &bitpos_o, delta_wide)
        } else {
            self.resolve_high_pt_strip_in(word, sector, chip, is_forward, &bitpos_o, delta_wide)
        };
        let Some(channels_in) = channels_in else {
            return Outcome::Skipped;
        };

        let element = channels_out[1].element;
        let Some(hash) = self.cabling.hash_of(&element) else {
            spdlog::warn!("no hash for element {}", element);
            return Outcome::Skipped;
        };

        let slice = word.bc_tag.trig_slice();
        if state.coin_satisfied_by_cache(slice, hash) {
            return Outcome::Seen;
        }

        // Collapse each window onto its representative chamber.
        let projector = self.projector();
        let out_span = if !is_strip {
            projector.wire_span_pivot(&channels_out)
        } else {
            projector.strip_span_pivot(&channels_out, is_backward, is_aside)
        };
        let Some(out_span) = out_span else {
            return Outcome::Seen;
        };
        let in_span = if !is_strip {
            projector.wire_span_nonpivot(&channels_in)
        } else {
            projector.strip_span_nonpivot(&channels_in, is_backward, is_aside)
        };
        let Some(in_span) = in_span else {
            return Outcome::Seen;
        };

        let tracklet_id = 2 * sbloc_o as i32 + sub_matrix_out;
        let Some(collection) = state.coin_collection(slice, hash, element) else {
            return Outcome::Seen;
        };

        let record = CoinRecord::HighPt {
            common: CoinCommon {
                hash,
                is_aside,
                phi: out_span.representative.element.phi,
                is_forward,
                is_strip,
                tracklet_id,
            },
            channel_in: in_span.representative,
            channel_out: out_span.representative,
            position_in: in_span.local,
            position_out: out_span.local,
            width_in: in_span.width,
            width_out: out_span.width,
            delta: delta as i32,
            hsub: hsub as i32,
            inner: inner as u32,
        };
        if collection.contains_duplicate_of(&record) {
            // Includes the repeats injected by the endcap strip board bug
            // (tracklet ids 38 to 41); all leave the counters untouched.
            spdlog::debug!("duplicated high-pT dropped: {}", out_span.representative);
            return Outcome::Duplicate;
        }
        collection.push(record);
        Outcome::Converted
    }

    /// The four triplet wire channels bracketing a high-pT window: the two
    /// displaced window edges and their nearest third-layer companions.
    fn resolve_high_pt_wire_in(
        &self,
        word: &RawWord,
        sector: u8,
        is_forward: bool,
        slb_id_o: u16,
        bitpos_o: &[i32; 2],
        delta_wide: i32,
    ) -> Option<[ChannelId; 4]> {
        let (rdoch_min, rdoch_max) = self.cabling.triplet_wire_channel_bounds(is_forward);
        let offset_dt = self.cabling.triplet_wire_offset(is_forward);
        let sbloc_offset = self.cabling.triplet_wire_sbloc_offset(sector);
        let ssw_i = self.cabling.triplet_ssw(sector, is_forward);

        let mut channels: [Option<ChannelId>; 4] = [None; 4];
        for i in 0..2 {
            let slb_channel_o = channel_of(bitpos_o[i], SlbKind::WireDoublet);
            let mut rdo_channel =
                WD_MAP_SIZE * slb_id_o as i32 + slb_channel_o + delta_wide + offset_dt;
            rdo_channel = rdo_channel.clamp(rdoch_min, rdoch_max);

            // Nearest third-layer companion: below for the large-radius
            // edge, above for the small-radius one.
            let mut companion = if i == 0 {
                (rdo_channel / 3) * 3 + 2
            } else {
                ((rdo_channel + 1) / 3) * 3 - 1
            };
            if companion > rdoch_max {
                companion = rdoch_max;
            } else if companion < rdoch_min {
                companion = rdoch_min + 2;
            }

            for (slot, rdo_ch) in [(i, rdo_channel), (i + 2, companion)] {
                let sbloc = (rdo_ch / WT_MAP_SIZE) as u16 + sbloc_offset;
                let bitpos = bit_position_of(rdo_ch % WT_MAP_SIZE, SlbKind::WireTriplet);
                channels[slot] =
                    self.cabling
                        .resolve(word.side, word.rod_id, ssw_i, sbloc, bitpos, false);
                if channels[slot].is_none() {
                    spdlog::debug!(
                        "high-pT non-pivot wire channel not found: ssw={} sbloc={} bitpos={}",
                        ssw_i,
                        sbloc,
                        bitpos
                    );
                    return None;
                }
            }
        }
        Some([
            channels[0].unwrap(),
            channels[1].unwrap(),
            channels[2].unwrap(),
            channels[3].unwrap(),
        ])
    }

    /// The four triplet strip channels bracketing a high-pT window.
    fn resolve_high_pt_strip_in(
        &self,
        word: &RawWord,
        sector: u8,
        chip: u8,
        is_forward: bool,
        bitpos_o: &[i32; 2],
        delta_wide: i32,
    ) -> Option<[ChannelId; 4]> {
        let rdoch_max = ST_MAP_SIZE - 1;
        let rdoch_min = 0;
        let sbloc_i = self.cabling.triplet_strip_sbloc(sector, chip);
        let ssw_i = self.cabling.triplet_ssw(sector, is_forward);

        let mut channels: [Option<ChannelId>; 4] = [None; 4];
        for i in 0..2 {
            let slb_channel_o = channel_of(bitpos_o[i], SlbKind::StripDoublet);
            let edge = (slb_channel_o + delta_wide).clamp(rdoch_min, rdoch_max);
            let companion =
                (if i == 0 { edge + 1 } else { edge - 1 }).clamp(rdoch_min, rdoch_max);

            for (slot, ch) in [(i, edge), (i + 2, companion)] {
                let bitpos = bit_position_of(ch, SlbKind::StripTriplet);
                channels[slot] =
                    self.cabling
                        .resolve(word.side, word.rod_id, ssw_i, sbloc_i, bitpos, false);
                if channels[slot].is_none() {
                    spdlog::debug!(
                        "high-pT non-pivot strip channel not found: ssw={} sbloc={} bitpos={}",
                        ssw_i,
                        sbloc_i,
                        bitpos
                    );
                    return None;
                }
            }
        }
        Some([
            channels[0].unwrap(),
            channels[1].unwrap(),
            channels[2].unwrap(),
            channels[3].unwrap(),
        ])
    }
}
