use std::path::PathBuf;
use thiserror::Error;

use super::identifiers::ElementHash;

#[derive(Debug, Error)]
pub enum CablingMapError {
    #[error("CablingMap failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("CablingMap failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("CablingMap found an unknown board kind keyword: {0}")]
    BadBoardKind(String),
    #[error("CablingMap found an unknown side keyword: {0}")]
    BadSide(String),
    #[error("CablingMap found an unknown station index: {0}")]
    BadStation(u8),
    #[error("CablingMap was given a file with the incorrect format at line {0}; most likely the number of columns is incorrect")]
    BadFileFormat(usize),
    #[error("CablingMap was given overlapping channel ranges for one board at line {0}")]
    OverlappingRanges(usize),
    #[error("CablingMap was given an unknown scheme keyword: {0}")]
    BadScheme(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decode failed to commit a collection: slice {slice} already owns a collection for element hash {hash}")]
    CommitCollision { slice: usize, hash: ElementHash },
    #[error("Decode failed due to cabling map error: {0}")]
    CablingError(#[from] CablingMapError),
}
