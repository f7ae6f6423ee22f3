//! Pure conversion between board-local channel numbers and serializer bit
//! positions.
//!
//! These are deterministic integer mappings derived from the input-line
//! origins in `constants`. Out-of-range inputs return `INVALID` and callers
//! must check before use.

use serde::{Deserialize, Serialize};

use super::constants::*;

/// Sentinel for a channel or bit position outside the board's range.
pub const INVALID: i32 = -1;

/// Serializer board kind. Strip triplets and strip doublets share one bit
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlbKind {
    WireTriplet,
    WireDoublet,
    StripTriplet,
    StripDoublet,
}

impl SlbKind {
    pub fn is_strip(&self) -> bool {
        matches!(self, SlbKind::StripTriplet | SlbKind::StripDoublet)
    }

    /// Board channel count (the valid range of `bit_position_of` input).
    pub fn map_size(&self) -> i32 {
        match self {
            SlbKind::WireTriplet => WT_MAP_SIZE,
            SlbKind::WireDoublet => WD_MAP_SIZE,
            SlbKind::StripTriplet => ST_MAP_SIZE,
            SlbKind::StripDoublet => SD_MAP_SIZE,
        }
    }

    /// Interleaved input lines per board channel cycle.
    pub fn inputs(&self) -> i32 {
        match self {
            SlbKind::WireTriplet => 3,
            _ => 2,
        }
    }
}

/// Bit position of a board-local channel, or `INVALID`.
///
/// Triplet wires interleave three input lines C, B, A; the two-line boards
/// interleave B, A.
pub fn bit_position_of(channel: i32, kind: SlbKind) -> i32 {
    let base = -BIT_POS_INPUT_SIZE + 1;
    match kind {
        SlbKind::WireTriplet => {
            if channel < 0 || channel >= WT_MAP_SIZE {
                return INVALID;
            }
            let origin = match channel % 3 {
                0 => BIT_POS_C_INPUT_ORIGIN,
                1 => BIT_POS_B_INPUT_ORIGIN,
                _ => BIT_POS_A_INPUT_ORIGIN,
            };
            base + origin + channel / 3
        }
        SlbKind::StripTriplet | SlbKind::StripDoublet | SlbKind::WireDoublet => {
            if channel < 0 || channel >= kind.map_size() {
                return INVALID;
            }
            let origin = if channel % 2 == 0 {
                BIT_POS_B_INPUT_ORIGIN
            } else {
                BIT_POS_A_INPUT_ORIGIN
            };
            base + origin + channel / 2
        }
    }
}

/// Board-local channel of a bit position, or `INVALID`.
pub fn channel_of(bit_position: i32, kind: SlbKind) -> i32 {
    let input = if bit_position <= BIT_POS_A_INPUT_ORIGIN
        && bit_position > BIT_POS_A_INPUT_ORIGIN - BIT_POS_INPUT_SIZE
    {
        2 // A input
    } else if bit_position <= BIT_POS_B_INPUT_ORIGIN
        && bit_position > BIT_POS_B_INPUT_ORIGIN - BIT_POS_INPUT_SIZE
    {
        1 // B input
    } else if bit_position <= BIT_POS_C_INPUT_ORIGIN
        && bit_position > BIT_POS_C_INPUT_ORIGIN - BIT_POS_INPUT_SIZE
    {
        0 // C input
    } else {
        return INVALID;
    };
    // Only wire triplets have a C input.
    if input == 0 && kind != SlbKind::WireTriplet {
        return INVALID;
    }

    let base = 1 - BIT_POS_INPUT_SIZE;
    match kind {
        SlbKind::WireTriplet => {
            let origin = match input {
                2 => BIT_POS_A_INPUT_ORIGIN,
                1 => BIT_POS_B_INPUT_ORIGIN,
                _ => BIT_POS_C_INPUT_ORIGIN,
            };
            // C(0) -> B(1) -> A(2) -> C(3) -> ... -> A(95)
            3 * (bit_position - (base + origin)) + input
        }
        SlbKind::StripTriplet | SlbKind::WireDoublet | SlbKind::StripDoublet => {
            let origin = if input == 2 {
                BIT_POS_A_INPUT_ORIGIN
            } else {
                BIT_POS_B_INPUT_ORIGIN
            };
            // B(0) -> A(1) -> B(2) -> ... -> A(63)
            2 * (bit_position - (base + origin)) + input - 1
        }
    }
}

/// Input line (0 = A, 1 = B, 2 = C, 3 = D) a bit position belongs to, or
/// `INVALID`. The cabling map uses this to assign the gas gap, and to read
/// the inner boards, whose wire section sits on the D line and strip section
/// on the A and B lines without interleaving.
pub fn input_line_of(bit_position: i32) -> i32 {
    for (line, origin) in [
        BIT_POS_A_INPUT_ORIGIN,
        BIT_POS_B_INPUT_ORIGIN,
        BIT_POS_C_INPUT_ORIGIN,
        BIT_POS_D_INPUT_ORIGIN,
    ]
    .iter()
    .enumerate()
    {
        if bit_position <= *origin && bit_position > *origin - BIT_POS_INPUT_SIZE {
            return line as i32;
        }
    }
    INVALID
}

/// Offset of a bit position within its input line (0 at the line's lowest
/// bit), or `INVALID`.
pub fn line_offset_of(bit_position: i32) -> i32 {
    let origin = match input_line_of(bit_position) {
        0 => BIT_POS_A_INPUT_ORIGIN,
        1 => BIT_POS_B_INPUT_ORIGIN,
        2 => BIT_POS_C_INPUT_ORIGIN,
        3 => BIT_POS_D_INPUT_ORIGIN,
        _ => return INVALID,
    };
    bit_position - (origin - BIT_POS_INPUT_SIZE + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_triplet_truth_table() {
        // C(0) B(1) A(2) interleave from each line's lowest bit.
        assert_eq!(bit_position_of(0, SlbKind::WireTriplet), 114);
        assert_eq!(bit_position_of(1, SlbKind::WireTriplet), 78);
        assert_eq!(bit_position_of(2, SlbKind::WireTriplet), 42);
        assert_eq!(bit_position_of(3, SlbKind::WireTriplet), 115);
        assert_eq!(bit_position_of(95, SlbKind::WireTriplet), 73);
        assert_eq!(bit_position_of(96, SlbKind::WireTriplet), INVALID);
        assert_eq!(bit_position_of(-1, SlbKind::WireTriplet), INVALID);
    }

    #[test]
    fn test_doublet_truth_table() {
        // B(0) A(1) interleave.
        assert_eq!(bit_position_of(0, SlbKind::WireDoublet), 78);
        assert_eq!(bit_position_of(1, SlbKind::WireDoublet), 42);
        assert_eq!(bit_position_of(62, SlbKind::WireDoublet), 109);
        assert_eq!(bit_position_of(63, SlbKind::WireDoublet), 73);
        assert_eq!(bit_position_of(64, SlbKind::WireDoublet), INVALID);
        // Strip doublet and strip triplet share the table.
        assert_eq!(
            bit_position_of(17, SlbKind::StripDoublet),
            bit_position_of(17, SlbKind::StripTriplet)
        );
    }

    #[test]
    fn test_c_input_rejected_for_two_line_boards() {
        let c_input_bit = bit_position_of(0, SlbKind::WireTriplet); // 114
        assert_eq!(channel_of(c_input_bit, SlbKind::WireDoublet), INVALID);
        assert_eq!(channel_of(c_input_bit, SlbKind::StripDoublet), INVALID);
    }

    #[test]
    fn test_round_trip_all_kinds() {
        for kind in [
            SlbKind::WireTriplet,
            SlbKind::WireDoublet,
            SlbKind::StripTriplet,
            SlbKind::StripDoublet,
        ] {
            for channel in 0..kind.map_size() {
                let bitpos = bit_position_of(channel, kind);
                assert_ne!(bitpos, INVALID, "{kind:?} channel {channel}");
                assert_eq!(channel_of(bitpos, kind), channel, "{kind:?} bit {bitpos}");
            }
        }
    }

    #[test]
    fn test_out_of_range_bit_positions() {
        assert_eq!(channel_of(0, SlbKind::WireTriplet), INVALID);
        assert_eq!(channel_of(200, SlbKind::WireTriplet), INVALID);
        assert_eq!(channel_of(77, SlbKind::WireDoublet), INVALID); // gap between A and B
    }

    #[test]
    fn test_input_lines() {
        assert_eq!(input_line_of(73), 0);
        assert_eq!(input_line_of(42), 0);
        assert_eq!(input_line_of(109), 1);
        assert_eq!(input_line_of(145), 2);
        assert_eq!(input_line_of(181), 3);
        assert_eq!(input_line_of(77), INVALID);
        assert_eq!(input_line_of(0), INVALID);
        assert_eq!(line_offset_of(42), 0);
        assert_eq!(line_offset_of(73), 31);
        assert_eq!(line_offset_of(181), 31);
        assert_eq!(line_offset_of(77), INVALID);
    }
}
