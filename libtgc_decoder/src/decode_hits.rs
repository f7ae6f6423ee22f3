//! Hit decoder: one raw channel word to one (or, for OR'd lines, two)
//! hit records.

use super::decoder::{DecodeState, Outcome, TgcRdoDecoder};
use super::identifiers::Side;
use super::raw_word::{RawContent, RawWord};
use super::records::HitRecord;

/// Hardware coordinates known to fire without a mapped channel; observed in
/// long data-taking periods and kept as a literal table.
fn is_known_dead_channel(side: Side, rod: u16, ssw: u16, slb: u16, bit_pos: u16) -> bool {
    (side == Side::A && rod == 9 && ssw == 6 && slb == 20 && bit_pos == 151)
        || (side == Side::A && rod == 11 && ssw == 2 && slb == 8 && bit_pos == 41)
        || (rod % 3 == 2 && ssw == 8)
}

impl<'a> TgcRdoDecoder<'a> {
    pub(crate) fn decode_hit(&self, state: &mut DecodeState<'_>, word: &RawWord) -> Outcome {
        let RawContent::Hit {
            ssw_id,
            slb_id,
            bit_pos,
        } = word.content
        else {
            return Outcome::Skipped;
        };
        // The hit readout supports three time slices only.
        let Some(slice) = word.bc_tag.hit_slice() else {
            return Outcome::Skipped;
        };

        let projector = self.projector();
        let mut converted = false;
        let mut duplicated = false;
        let mut resolved_any = false;

        // Second pass covers the OR'd partner when the line has one.
        for i_or in 0..2 {
            let or_flag = i_or != 0;
            if or_flag
                && !self
                    .cabling
                    .is_ored(word.side, word.rod_id, ssw_id, slb_id, bit_pos as i32)
            {
                continue;
            }

            let Some(channel) = self.cabling.resolve(
                word.side,
                word.rod_id,
                ssw_id,
                slb_id,
                bit_pos as i32,
                or_flag,
            ) else {
                if !or_flag && self.cabling.is_twelve_fold() {
                    if is_known_dead_channel(word.side, word.rod_id, ssw_id, slb_id, bit_pos) {
                        if self.config.warn_known_dead_channels {
                            spdlog::warn!(
                                "known dead channel fired: side={} rod={} ssw={} slb={} bitpos={}",
                                word.side,
                                word.rod_id,
                                ssw_id,
                                slb_id,
                                bit_pos
                            );
                        }
                    } else {
                        spdlog::debug!(
                            "element not found for side={} rod={} ssw={} slb={} bitpos={}",
                            word.side,
                            word.rod_id,
                            ssw_id,
                            slb_id,
                            bit_pos
                        );
                    }
                }
                continue;
            };

            let Some(hash) = self.cabling.hash_of(&channel.element) else {
                spdlog::warn!("no hash for element {}", channel.element);
                continue;
            };

            let Some(collection) = state.hit_collection(slice, hash, channel.element) else {
                // Satisfied by the external cache; no decoding work here.
                continue;
            };

            if collection
                .iter()
                .any(|existing| existing.channel == channel)
            {
                spdlog::debug!("duplicated hit dropped: {}", channel);
                duplicated = true;
                continue;
            }
            resolved_any = true;

            let Some(projection) = projector.project(&channel) else {
                continue;
            };

            collection.push(HitRecord {
                channel,
                hash,
                local_position: projection.local,
                error: projection.error,
                width: projection.width,
                identifiers: vec![channel],
                bc_bitmap: word.bc_tag.bc_bit(),
            });
            converted = true;
        }

        if converted {
            Outcome::Converted
        } else if duplicated {
            Outcome::Duplicate
        } else if resolved_any {
            Outcome::Seen
        } else {
            Outcome::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_layout::{bit_position_of, SlbKind};
    use crate::cabling_map::CablingMap;
    use crate::decoder::{DecodeRequest, TgcRdoDecoder};
    use crate::identifiers::BcTag;
    use crate::planar_geometry::PlanarGeometry;
    use crate::raw_word::RdoCollection;

    fn hit_word(bc_tag: BcTag, ssw: u16, slb: u16, bit_pos: u16) -> RawWord {
        RawWord {
            side: Side::A,
            rod_id: 1,
            bc_tag,
            content: RawContent::Hit {
                ssw_id: ssw,
                slb_id: slb,
                bit_pos,
            },
        }
    }

    fn run(words: Vec<RawWord>) -> crate::decoder::DecodeProducts {
        let map = CablingMap::new(None).unwrap();
        let geometry = PlanarGeometry::from_cabling(&map);
        let decoder = TgcRdoDecoder::new(&map, &geometry);
        let mut collection = RdoCollection::new(Side::A, 1);
        collection.words = words;
        decoder
            .decode(&vec![collection], DecodeRequest::Unseeded)
            .unwrap()
    }

    #[test]
    fn test_single_hit_converts() {
        let bit_pos = bit_position_of(10, SlbKind::WireDoublet) as u16;
        let products = run(vec![hit_word(BcTag::Current, 3, 0, bit_pos)]);
        assert_eq!(products.stats.hit.seen, 1);
        assert_eq!(products.stats.hit.converted, 1);
        let (_, collection) = products.hits[1].iter().next().unwrap();
        assert_eq!(collection.len(), 1);
        let hit = collection.iter().next().unwrap();
        assert!((hit.error - hit.width / 12.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(hit.identifiers.len(), 1);
        // Current slice only; previous and next are empty.
        assert!(products.hits[0].is_empty());
        assert!(products.hits[2].is_empty());
    }

    #[test]
    fn test_invalid_bit_position_leaves_counters_untouched() {
        // Bit 77 falls between the A and B input lines.
        let products = run(vec![hit_word(BcTag::Current, 3, 0, 77)]);
        assert_eq!(products.stats.hit.seen, 0);
        assert_eq!(products.stats.hit.converted, 0);
        assert!(products.hits[1].is_empty());
    }

    #[test]
    fn test_next_next_slice_is_rejected() {
        let bit_pos = bit_position_of(10, SlbKind::WireDoublet) as u16;
        let products = run(vec![hit_word(BcTag::NextNext, 3, 0, bit_pos)]);
        assert_eq!(products.stats.hit.seen, 0);
        assert!(products.hits.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_duplicate_hit_corrects_input_counter() {
        let bit_pos = bit_position_of(10, SlbKind::WireDoublet) as u16;
        let word = hit_word(BcTag::Current, 3, 0, bit_pos);
        let products = run(vec![word, word]);
        assert_eq!(products.stats.hit.seen, 1);
        assert_eq!(products.stats.hit.converted, 1);
        let (_, collection) = products.hits[1].iter().next().unwrap();
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_ored_line_yields_two_records() {
        // Bit 78 of pivot board 0 carries an OR with the far end of the
        // same chamber.
        let products = run(vec![hit_word(BcTag::Current, 3, 0, 78)]);
        assert_eq!(products.stats.hit.seen, 1);
        assert_eq!(products.stats.hit.converted, 1);
        let (_, collection) = products.hits[1].iter().next().unwrap();
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_hits_in_different_slices_split_containers() {
        let bit_pos = bit_position_of(10, SlbKind::WireDoublet) as u16;
        let products = run(vec![
            hit_word(BcTag::Previous, 3, 0, bit_pos),
            hit_word(BcTag::Next, 3, 0, bit_pos),
        ]);
        assert_eq!(products.stats.hit.seen, 2);
        assert_eq!(products.stats.hit.converted, 2);
        assert_eq!(products.hits[0].len(), 1);
        assert_eq!(products.hits[2].len(), 1);
        assert!(products.hits[1].is_empty());
    }
}
