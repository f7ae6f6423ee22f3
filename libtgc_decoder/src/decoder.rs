//! The decode orchestrator.
//!
//! Walks the raw container (or the requested subset of it), classifies each
//! word by its content tag, hands it to the matching per-kind decoder,
//! commits every constructed collection exactly once, and finally derives
//! the time-integrated (AllBC) hit view. Decoding one event is synchronous
//! and single threaded; parallelism exists only across events, which share
//! the read-only cabling map and geometry and, in trigger mode, the
//! external collection cache.

use std::fmt;
use std::sync::Arc;

use bit_set::BitSet;
use fxhash::FxHashMap;

use super::cabling_map::CablingMap;
use super::collections::{
    CoinCollection, CoinContainer, HitCollection, HitContainer, SharedDecodeCache, StorageMode,
};
use super::config::DecoderConfig;
use super::error::DecodeError;
use super::geometry::TgcGeometry;
use super::identifiers::{bc_bit_of_slice, ElementHash, ElementId, ALL_BC_SLICE, N_HIT_SLICES, N_TRIG_SLICES};
use super::projector::GeometryProjector;
use super::raw_word::{RawContent, RawWord, RdoCollection, RdoContainer};

/// What a per-kind decoder did with one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A record was appended.
    Converted,
    /// The word resolved but was dropped on geometry or width grounds.
    Seen,
    /// The word did not resolve to mapped hardware; not an error.
    Skipped,
    /// An identical record already exists in the collection.
    Duplicate,
}

/// Words-seen / records-emitted pair for one word kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    pub seen: u64,
    pub converted: u64,
}

impl KindStats {
    fn note(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Converted => {
                self.seen += 1;
                self.converted += 1;
            }
            Outcome::Seen => self.seen += 1,
            // Unmapped words and duplicates leave the input counter
            // untouched.
            Outcome::Skipped | Outcome::Duplicate => {}
        }
    }
}

/// Conversion counters, returned by value with the decode result. The inner
/// flag words share the high-pT counters, as they share its readout slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub hit: KindStats,
    pub tracklet: KindStats,
    pub tracklet_inner: KindStats,
    pub high_pt: KindStats,
    pub sector_logic: KindStats,
}

impl fmt::Display for DecodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input RDOs->output records [Hit: {}->{}, Tracklet: {}->{}, TrackletInner: {}->{}, HiPt: {}->{}, SL: {}->{}]",
            self.hit.seen,
            self.hit.converted,
            self.tracklet.seen,
            self.tracklet.converted,
            self.tracklet_inner.seen,
            self.tracklet_inner.converted,
            self.high_pt.seen,
            self.high_pt.converted,
            self.sector_logic.seen,
            self.sector_logic.converted,
        )
    }
}

/// Decode scope: everything, or only the chambers a trigger request asked
/// for.
#[derive(Debug, Clone, Copy)]
pub enum DecodeRequest<'r> {
    Unseeded,
    Seeded(&'r [ElementHash]),
}

/// Everything one decode call produces.
#[derive(Default)]
pub struct DecodeProducts {
    /// Hit containers for the previous/current/next slices plus the derived
    /// AllBC view at index `ALL_BC_SLICE`.
    pub hits: [HitContainer; N_HIT_SLICES + 1],
    /// Coincidence containers per slice.
    pub coins: [CoinContainer; N_TRIG_SLICES],
    /// Chambers that contain data (restricted to the request in seeded
    /// mode).
    pub selected_hashes: Vec<ElementHash>,
    pub stats: DecodeStats,
}

/// Under-construction collections of one decode call.
pub(crate) struct DecodeState<'a> {
    pub hit_builders: [FxHashMap<ElementHash, HitCollection>; N_HIT_SLICES],
    pub coin_builders: [FxHashMap<ElementHash, CoinCollection>; N_TRIG_SLICES],
    cache: Option<&'a SharedDecodeCache>,
    /// Collections found ready in the external cache, to be adopted at
    /// commit time.
    adopted_hits: Vec<(usize, ElementHash)>,
    adopted_coins: Vec<(usize, ElementHash)>,
}

impl<'a> DecodeState<'a> {
    fn new(cache: Option<&'a SharedDecodeCache>) -> Self {
        DecodeState {
            hit_builders: std::array::from_fn(|_| FxHashMap::default()),
            coin_builders: std::array::from_fn(|_| FxHashMap::default()),
            cache,
            adopted_hits: Vec::new(),
            adopted_coins: Vec::new(),
        }
    }

    /// Hit collection under construction for (slice, hash), creating it on
    /// first use. None when the external cache already holds it, in which
    /// case no decoding work must be spent on it.
    pub(crate) fn hit_collection(
        &mut self,
        slice: usize,
        hash: ElementHash,
        element: ElementId,
    ) -> Option<&mut HitCollection> {
        if !self.hit_builders[slice].contains_key(&hash) {
            if let Some(cache) = self.cache {
                if cache.hit_present(slice, hash) {
                    spdlog::debug!("hit collection {} slice {} in cache, adopting", hash, slice);
                    if !self.adopted_hits.contains(&(slice, hash)) {
                        self.adopted_hits.push((slice, hash));
                    }
                    return None;
                }
            }
            self.hit_builders[slice].insert(hash, HitCollection::new(element, hash));
        }
        self.hit_builders[slice].get_mut(&hash)
    }

    /// Early cache probe for the coincidence decoders: when the external
    /// cache already holds the collection, register the adoption and report
    /// true so the caller can stop before any geometry work.
    pub(crate) fn coin_satisfied_by_cache(&mut self, slice: usize, hash: ElementHash) -> bool {
        if self.coin_builders[slice].contains_key(&hash) {
            return false;
        }
        let Some(cache) = self.cache else {
            return false;
        };
        if !cache.coin_present(slice, hash) {
            return false;
        }
        spdlog::debug!("coin collection {} slice {} in cache, adopting", hash, slice);
        if !self.adopted_coins.contains(&(slice, hash)) {
            self.adopted_coins.push((slice, hash));
        }
        true
    }

    /// Coincidence twin of `hit_collection`.
    pub(crate) fn coin_collection(
        &mut self,
        slice: usize,
        hash: ElementHash,
        element: ElementId,
    ) -> Option<&mut CoinCollection> {
        if !self.coin_builders[slice].contains_key(&hash) {
            if let Some(cache) = self.cache {
                if cache.coin_present(slice, hash) {
                    spdlog::debug!("coin collection {} slice {} in cache, adopting", hash, slice);
                    if !self.adopted_coins.contains(&(slice, hash)) {
                        self.adopted_coins.push((slice, hash));
                    }
                    return None;
                }
            }
            self.coin_builders[slice].insert(hash, CoinCollection::new(element, hash));
        }
        self.coin_builders[slice].get_mut(&hash)
    }
}

/// The decode engine. Read-only over its collaborators; one instance may be
/// shared by concurrent per-event decode calls.
pub struct TgcRdoDecoder<'a> {
    pub(crate) cabling: &'a CablingMap,
    pub(crate) geometry: &'a dyn TgcGeometry,
    pub(crate) config: DecoderConfig,
    storage: StorageMode,
}

impl<'a> TgcRdoDecoder<'a> {
    pub fn new(cabling: &'a CablingMap, geometry: &'a dyn TgcGeometry) -> Self {
        TgcRdoDecoder {
            cabling,
            geometry,
            config: DecoderConfig::default(),
            storage: StorageMode::Owned,
        }
    }

    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    pub(crate) fn projector(&self) -> GeometryProjector<'_> {
        GeometryProjector::new(
            self.geometry,
            self.config.min_channel_width,
            self.config.drop_zero_width_records,
        )
    }

    /// Decode one event's raw container.
    pub fn decode(
        &self,
        rdos: &RdoContainer,
        request: DecodeRequest<'_>,
    ) -> Result<DecodeProducts, DecodeError> {
        let mut products = DecodeProducts::default();
        let mut state = DecodeState::new(self.storage.cache());

        if rdos.is_empty() {
            spdlog::debug!("empty rdo container, nothing to decode");
            return Ok(products);
        }

        match request {
            DecodeRequest::Seeded(requested) => {
                spdlog::debug!("decode called for {} requested chambers", requested.len());
                // Each readout pipeline is decoded at most once per call,
                // however many requested chambers it carries.
                let mut decoded_online = BitSet::with_capacity(
                    self.cabling.scheme().max_online_id() as usize,
                );
                for hash in requested {
                    let Some(online_id) = self.cabling.online_id_of_hash(*hash) else {
                        spdlog::debug!("requested chamber {} has no pipeline, skipped", hash);
                        continue;
                    };
                    if !decoded_online.insert(online_id as usize) {
                        spdlog::debug!(
                            "pipeline {} already decoded for a previous request",
                            online_id
                        );
                        continue;
                    }
                    for collection in rdos.iter() {
                        let coll_online = self
                            .cabling
                            .scheme()
                            .online_id(collection.side, collection.rod_id);
                        if coll_online == online_id {
                            self.decode_collection(
                                &mut state,
                                collection,
                                Some(requested),
                                &mut products.stats,
                            );
                            break;
                        }
                    }
                }
            }
            DecodeRequest::Unseeded => {
                spdlog::debug!("decode called unseeded over {} collections", rdos.len());
                for collection in rdos.iter() {
                    if !collection.is_empty() {
                        self.decode_collection(&mut state, collection, None, &mut products.stats);
                    }
                }
            }
        }

        self.commit(state, &mut products)?;
        self.merge_all_bc(&mut products)?;
        self.fill_selected_hashes(&request, &mut products);

        spdlog::debug!("{}", products.stats);
        Ok(products)
    }

    /// Classify and dispatch every word of one pipeline's block.
    fn decode_collection(
        &self,
        state: &mut DecodeState<'_>,
        collection: &RdoCollection,
        requested: Option<&[ElementHash]>,
        stats: &mut DecodeStats,
    ) {
        let coincidences_enabled = self.config.fill_coincidences && self.cabling.is_twelve_fold();
        for word in &collection.words {
            match &word.content {
                RawContent::Hit {
                    ssw_id,
                    slb_id,
                    bit_pos,
                } => {
                    // Pipeline ids are shared by many chambers; in seeded
                    // mode each hit is additionally filtered on its own
                    // chamber so a request never decodes outside its region.
                    if let Some(requested) = requested {
                        let element = self.cabling.element_of_readout(
                            word.side,
                            word.rod_id,
                            *ssw_id,
                            *slb_id,
                            *bit_pos as i32,
                            false,
                        );
                        let in_request = element
                            .and_then(|e| self.cabling.hash_of(&e))
                            .is_some_and(|h| requested.contains(&h));
                        if !in_request {
                            continue;
                        }
                    }
                    let outcome = self.decode_hit(state, word);
                    stats.hit.note(outcome);
                }
                RawContent::Tracklet { .. } => {
                    if coincidences_enabled {
                        let outcome = self.decode_tracklet(state, word);
                        stats.tracklet.note(outcome);
                    }
                }
                RawContent::TrackletInner { .. } => {
                    if coincidences_enabled {
                        let outcome = self.decode_tracklet_inner(state, word);
                        stats.tracklet_inner.note(outcome);
                    }
                }
                RawContent::HighPt { .. } => {
                    if coincidences_enabled {
                        let outcome = self.decode_high_pt(state, word);
                        stats.high_pt.note(outcome);
                    }
                }
                RawContent::Inner { .. } => {
                    if coincidences_enabled {
                        // Inner flag words ride the high-pT readout slot and
                        // share its counters.
                        let outcome = self.decode_inner(state, word);
                        stats.high_pt.note(outcome);
                    }
                }
                RawContent::SectorLogic { .. } => {
                    if coincidences_enabled {
                        let outcome = self.decode_sector_logic(state, word, collection);
                        stats.sector_logic.note(outcome);
                    }
                }
            }
        }
    }

    /// Write every constructed collection into its container exactly once,
    /// and adopt the cache-satisfied ones.
    fn commit(
        &self,
        state: DecodeState<'_>,
        products: &mut DecodeProducts,
    ) -> Result<(), DecodeError> {
        let DecodeState {
            hit_builders,
            coin_builders,
            cache,
            adopted_hits,
            adopted_coins,
        } = state;

        for (slice, builders) in hit_builders.into_iter().enumerate() {
            for (hash, collection) in builders {
                let collection = Arc::new(collection);
                if let Some(cache) = cache {
                    if !cache.publish_hits(slice, &collection) {
                        return Err(DecodeError::CommitCollision { slice, hash });
                    }
                }
                if !products.hits[slice].insert(collection) {
                    return Err(DecodeError::CommitCollision { slice, hash });
                }
            }
        }
        for (slice, builders) in coin_builders.into_iter().enumerate() {
            for (hash, collection) in builders {
                let collection = Arc::new(collection);
                if let Some(cache) = cache {
                    if !cache.publish_coins(slice, &collection) {
                        return Err(DecodeError::CommitCollision { slice, hash });
                    }
                }
                if !products.coins[slice].insert(collection) {
                    return Err(DecodeError::CommitCollision { slice, hash });
                }
            }
        }

        if let Some(cache) = cache {
            for (slice, hash) in adopted_hits {
                if let Some(collection) = cache.adopt_hits(slice, hash) {
                    products.hits[slice].insert(collection);
                }
            }
            for (slice, hash) in adopted_coins {
                if let Some(collection) = cache.adopt_coins(slice, hash) {
                    products.coins[slice].insert(collection);
                }
            }
        }
        Ok(())
    }

    /// Build the time-integrated view: one record per distinct channel, its
    /// slice bit field the OR of the slices that observed it.
    fn merge_all_bc(&self, products: &mut DecodeProducts) -> Result<(), DecodeError> {
        let mut hashes: Vec<ElementHash> = Vec::new();
        for slice in 0..N_HIT_SLICES {
            for hash in products.hits[slice].hashes() {
                if !hashes.contains(&hash) {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        spdlog::debug!("{} chambers to merge into the AllBC container", hashes.len());

        let cache = self.storage.cache();
        for hash in hashes {
            if let Some(cache) = cache {
                if let Some(collection) = cache.adopt_hits(ALL_BC_SLICE, hash) {
                    products.hits[ALL_BC_SLICE].insert(collection);
                    continue;
                }
            }

            let mut merged: Option<HitCollection> = None;
            for slice in 0..N_HIT_SLICES {
                let Some(collection) = products.hits[slice].get(hash) else {
                    continue;
                };
                let merged = merged
                    .get_or_insert_with(|| HitCollection::new(collection.element, hash));
                for hit in collection.iter() {
                    let bit = bc_bit_of_slice(slice);
                    let existing_idx = merged.iter().position(|h| h.channel == hit.channel);
                    match existing_idx {
                        Some(idx) => {
                            if let Some(existing) = merged.iter_mut().nth(idx) {
                                existing.bc_bitmap |= bit;
                            }
                        }
                        None => {
                            let mut clone = hit.clone();
                            clone.bc_bitmap = bit;
                            merged.push(clone);
                        }
                    }
                }
            }
            if let Some(merged) = merged {
                let merged = Arc::new(merged);
                if let Some(cache) = cache {
                    if !cache.publish_hits(ALL_BC_SLICE, &merged) {
                        return Err(DecodeError::CommitCollision {
                            slice: ALL_BC_SLICE,
                            hash,
                        });
                    }
                }
                if !products.hits[ALL_BC_SLICE].insert(merged) {
                    return Err(DecodeError::CommitCollision {
                        slice: ALL_BC_SLICE,
                        hash,
                    });
                }
            }
        }
        Ok(())
    }

    /// Report which chambers now contain data; in seeded mode only the
    /// requested ones are eligible.
    fn fill_selected_hashes(&self, request: &DecodeRequest<'_>, products: &mut DecodeProducts) {
        let has_data = |hash: ElementHash| {
            products.hits.iter().any(|c| c.contains(hash))
                || products.coins.iter().any(|c| c.contains(hash))
        };
        match request {
            DecodeRequest::Seeded(requested) => {
                for hash in *requested {
                    if has_data(*hash) && !products.selected_hashes.contains(hash) {
                        products.selected_hashes.push(*hash);
                    }
                }
            }
            DecodeRequest::Unseeded => {
                for id in 0..self.cabling.module_hash_max() {
                    let hash = ElementHash(id as u16);
                    if has_data(hash) {
                        products.selected_hashes.push(hash);
                    }
                }
            }
        }
    }
}
