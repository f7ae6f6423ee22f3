//! # libtgc_decoder
//!
//! Decode engine for the raw readout of an endcap trigger-chamber system:
//! binary front-end words in, calibrated geometry-aware hit and coincidence
//! records out.
//!
//! The same engine serves two operating modes. Offline reconstruction runs
//! it *unseeded*, converting every raw collection of an event once. A
//! trigger farm runs it *seeded*, passing the chamber hashes of a region of
//! interest so that only the matching readout pipelines are decoded, and
//! sharing a [`collections::SharedDecodeCache`] across requests so repeated
//! partial decodes of one event never redo work.
//!
//! ## Structure
//!
//! - [`bit_layout`] maps board-local channel numbers to serializer bit
//!   positions and back, per board kind.
//! - [`cabling_map`] is the static hardware-to-geometry translation, loaded
//!   once per process from a CSV table (a default is bundled).
//! - [`projector`] turns resolved channels into local positions, widths and
//!   uncertainties, including the chamber-boundary interpolation used by
//!   the high-pT and sector-logic decoders.
//! - [`decoder`] orchestrates a decode call: classify each word, dispatch
//!   to the per-kind decoders, suppress duplicates, commit collections and
//!   derive the time-integrated (AllBC) view.
//! - [`geometry`] is the narrow interface to the external detector
//!   description; [`planar_geometry`] is a planar stand-in used by tests
//!   and the command-line driver.
//!
//! Decoding one event is synchronous and single threaded. Many events may
//! be decoded concurrently by independent calls; the cabling map and
//! geometry are read-only, and the shared cache arbitrates publication per
//! chamber and time slice.
//!
//! ## Example
//!
//! ```no_run
//! use libtgc_decoder::cabling_map::CablingMap;
//! use libtgc_decoder::decoder::{DecodeRequest, TgcRdoDecoder};
//! use libtgc_decoder::planar_geometry::PlanarGeometry;
//!
//! let cabling = CablingMap::new(None).unwrap();
//! let geometry = PlanarGeometry::from_cabling(&cabling);
//! let decoder = TgcRdoDecoder::new(&cabling, &geometry);
//! let products = decoder.decode(&Vec::new(), DecodeRequest::Unseeded).unwrap();
//! println!("{}", products.stats);
//! ```

pub mod bit_layout;
pub mod cabling_map;
pub mod collections;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod identifiers;
pub mod planar_geometry;
pub mod projector;
pub mod raw_word;
pub mod records;

mod decode_hipt;
mod decode_hits;
mod decode_inner;
mod decode_sl;
mod decode_tracklet;
