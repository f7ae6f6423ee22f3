use clap::{Arg, Command};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libtgc_decoder::cabling_map::CablingMap;
use libtgc_decoder::config::DecoderConfig;
use libtgc_decoder::decoder::{DecodeRequest, TgcRdoDecoder};
use libtgc_decoder::planar_geometry::PlanarGeometry;
use libtgc_decoder::raw_word::RdoContainer;

/// Driver configuration: where the inputs live plus the decode policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CliConfig {
    /// Site cabling table; the bundled default is used when absent.
    cabling_path: Option<PathBuf>,
    /// YAML dump of per-event raw-word containers.
    events_path: PathBuf,
    decoder: DecoderConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cabling_path: None,
            events_path: PathBuf::from("None"),
            decoder: DecoderConfig::default(),
        }
    }
}

fn make_template_config(path: &Path) {
    let config = CliConfig::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn main() {
    // Create a cli
    let matches = Command::new("tgc_decoder_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("Could not create logging!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let yaml_str = match std::fs::read_to_string(&config_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Could not read config: {e}");
            return;
        }
    };
    let config: CliConfig = match serde_yaml::from_str(&yaml_str) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Could not parse config: {e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Events Path: {}", config.events_path.to_string_lossy());
    match &config.cabling_path {
        Some(path) => log::info!("Cabling Path: {}", path.to_string_lossy()),
        None => log::info!("Cabling Path: bundled default"),
    }

    // Static services: the cabling table and the planar geometry stand-in.
    let cabling = match CablingMap::new(config.cabling_path.as_deref()) {
        Ok(map) => map,
        Err(e) => {
            log::error!("Could not load cabling map: {e}");
            return;
        }
    };
    log::info!("Cabling map with {} chambers loaded.", cabling.module_hash_max());
    let geometry = PlanarGeometry::from_cabling(&cabling);

    // Events: a YAML list of per-event raw containers.
    let events_str = match std::fs::read_to_string(&config.events_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Could not read events file: {e}");
            return;
        }
    };
    let events: Vec<RdoContainer> = match serde_yaml::from_str(&events_str) {
        Ok(events) => events,
        Err(e) => {
            log::error!("Could not parse events file: {e}");
            return;
        }
    };
    log::info!("Decoding {} events...", events.len());

    let decoder = TgcRdoDecoder::new(&cabling, &geometry).with_config(config.decoder);
    let mut failures = 0usize;
    for (number, event) in events.iter().enumerate() {
        match decoder.decode(event, DecodeRequest::Unseeded) {
            Ok(products) => {
                log::info!(
                    "Event {}: {} chambers with data, {}",
                    number,
                    products.selected_hashes.len(),
                    products.stats
                );
            }
            Err(e) => {
                log::error!("Event {number} failed to decode: {e}");
                failures += 1;
            }
        }
    }

    if failures == 0 {
        log::info!("Successfully decoded all events!");
    } else {
        log::error!("{failures} events failed to decode.");
    }
    log::info!("Done.");
}
