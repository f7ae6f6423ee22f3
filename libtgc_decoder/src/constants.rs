//! Fixed hardware layout constants for the serializer boards (SLBs).
//!
//! An SLB serializes up to four 32-bit input lines (A to D) into one 200-bit
//! readout frame. The origins below are the highest bit position of each
//! input segment; a segment is read downwards from its origin. Two ASDs of
//! 16 channels feed one input line. These numbers come from the board
//! documentation and must not be re-derived.

/// Number of bits in one serializer input line.
pub const BIT_POS_INPUT_SIZE: i32 = 32;
/// Channels served by one ASD chip.
pub const BIT_POS_ASD_SIZE: i32 = 16;

pub const BIT_POS_A_INPUT_ORIGIN: i32 = 73;
pub const BIT_POS_B_INPUT_ORIGIN: i32 = 109;
pub const BIT_POS_C_INPUT_ORIGIN: i32 = 145;
pub const BIT_POS_D_INPUT_ORIGIN: i32 = 181;

/// Wire-triplet boards serve three input lines (A, B, C).
pub const WT_MAP_SIZE: i32 = 3 * BIT_POS_INPUT_SIZE;
/// Wire-doublet boards serve two input lines (A, B).
pub const WD_MAP_SIZE: i32 = 2 * BIT_POS_INPUT_SIZE;
/// Strip-triplet and strip-doublet boards share one two-line table.
pub const ST_MAP_SIZE: i32 = 2 * BIT_POS_INPUT_SIZE;
pub const SD_MAP_SIZE: i32 = 2 * BIT_POS_INPUT_SIZE;

// Named bit positions used by the coincidence decoders. The CHnn suffix is
// the ASD channel; LARGE/SMALL refer to the radial half of the input line.
// For strips the same positions are read as the large/small azimuth half
// (A-side forward / C-side backward orientation). Literal case tables, do
// not re-derive.
pub const BIT_POS_A_INPUT_LARGE_R_CH00: i32 = 57;
pub const BIT_POS_A_INPUT_LARGE_R_CH04: i32 = 53;
pub const BIT_POS_A_INPUT_LARGE_R_CH08: i32 = 49;
pub const BIT_POS_A_INPUT_LARGE_R_CH12: i32 = 45;
pub const BIT_POS_A_INPUT_SMALL_R_CH00: i32 = 73;
pub const BIT_POS_A_INPUT_SMALL_R_CH03: i32 = 70;
pub const BIT_POS_A_INPUT_SMALL_R_CH04: i32 = 69;
pub const BIT_POS_A_INPUT_SMALL_R_CH08: i32 = 65;
pub const BIT_POS_A_INPUT_SMALL_R_CH12: i32 = 61;
pub const BIT_POS_B_INPUT_LARGE_R_CH07: i32 = 86;
pub const BIT_POS_B_INPUT_LARGE_R_CH12: i32 = 81;
pub const BIT_POS_B_INPUT_LARGE_R_CH15: i32 = 78;
pub const BIT_POS_B_INPUT_SMALL_R_CH05: i32 = 104;
pub const BIT_POS_B_INPUT_SMALL_R_CH07: i32 = 102;
pub const BIT_POS_B_INPUT_SMALL_R_CH15: i32 = 94;

// Strip aliases for the same serializer positions.
pub const BIT_POS_A_INPUT_LARGE_PHI_CH00: i32 = BIT_POS_A_INPUT_LARGE_R_CH00;
pub const BIT_POS_A_INPUT_LARGE_PHI_CH04: i32 = BIT_POS_A_INPUT_LARGE_R_CH04;
pub const BIT_POS_A_INPUT_LARGE_PHI_CH08: i32 = BIT_POS_A_INPUT_LARGE_R_CH08;
pub const BIT_POS_A_INPUT_LARGE_PHI_CH12: i32 = BIT_POS_A_INPUT_LARGE_R_CH12;
pub const BIT_POS_A_INPUT_SMALL_PHI_CH00: i32 = BIT_POS_A_INPUT_SMALL_R_CH00;
pub const BIT_POS_A_INPUT_SMALL_PHI_CH04: i32 = BIT_POS_A_INPUT_SMALL_R_CH04;
pub const BIT_POS_A_INPUT_SMALL_PHI_CH08: i32 = BIT_POS_A_INPUT_SMALL_R_CH08;
pub const BIT_POS_A_INPUT_SMALL_PHI_CH12: i32 = BIT_POS_A_INPUT_SMALL_R_CH12;
pub const BIT_POS_B_INPUT_LARGE_PHI_CH07: i32 = BIT_POS_B_INPUT_LARGE_R_CH07;
pub const BIT_POS_B_INPUT_LARGE_PHI_CH15: i32 = BIT_POS_B_INPUT_LARGE_R_CH15;
pub const BIT_POS_B_INPUT_SMALL_PHI_CH07: i32 = BIT_POS_B_INPUT_SMALL_R_CH07;
pub const BIT_POS_B_INPUT_SMALL_PHI_CH15: i32 = BIT_POS_B_INPUT_SMALL_R_CH15;

/// Board-location offset of the wire-triplet boards serving the odd
/// azimuthal sector of a readout pipeline.
pub const NUM_SLBID_SBLOC_OFFSET_WT: i32 = 8;

/// Records whose measured channel width falls below this are degenerate
/// (units: mm). See `DecoderConfig::min_channel_width`.
pub const CUT_DROP_PRD_WITH_ZERO_WIDTH: f64 = 0.1;
