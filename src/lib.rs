pub mod capture;
mod commands;
pub mod db;
pub mod geo;
pub mod matching;
pub mod sensing;
pub mod settings;
mod utils;
pub mod vision;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use log::info;
use tokio::io::BufReader;

use capture::{CaptureAuthority, LoggingTrigger};
use clap::Parser;
use commands::{require_finite, Cli, Command};
use db::{AccessMode, Database};
use matching::{build_prototypes, MatchRequest, MatchingBackend, MatchingService, ReferenceCorpus};
use sensing::{SensorFusionState, StaticSensorSource};
use settings::SettingsStore;
use vision::{extract, ModelInput, ModelRuntime, PerceptualHashRuntime, DEFAULT_INPUT_SIDE};

const SETTINGS_ENV: &str = "GEOGATE_SETTINGS";
const DEBUG_ENV: &str = "GEOGATE_DEBUG";
const DEFAULT_SETTINGS_FILE: &str = "geogate.settings.json";

pub(crate) struct AppState {
    pub(crate) settings: SettingsStore,
    pub(crate) fusion: SensorFusionState,
}

impl AppState {
    fn load() -> Result<Self> {
        let settings_path = std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        let settings = SettingsStore::new(settings_path)?;

        Ok(Self {
            settings,
            fusion: SensorFusionState::new(),
        })
    }

    fn open_database(&self, mode: AccessMode) -> Result<Database> {
        let path = self.settings.get().database_path;
        Database::new(path.clone(), mode)
            .with_context(|| format!("failed to open reference database {}", path.display()))
    }
}

pub fn run() -> Result<()> {
    let debug = std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    env_logger::Builder::from_default_env()
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let command = Cli::parse().into_command();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let state = AppState::load()?;

    runtime.block_on(async move {
        match command {
            Command::Serve => serve(&state).await,
            Command::Verify {
                latitude,
                longitude,
                heading,
            } => verify(&state, latitude, longitude, heading).await,
            Command::Extract { image } => extract_request(&state, &image),
            Command::Prototypes { activate } => rebuild_prototypes(&state, activate).await,
        }
    })
}

async fn serve(state: &AppState) -> Result<()> {
    let matching = state.settings.matching();
    let db = state.open_database(AccessMode::ReadOnly)?;

    let corpus = if matching.use_prototypes {
        ReferenceCorpus::from_prototypes(&db.load_prototypes().await?)
    } else {
        ReferenceCorpus::load(&db).await?
    };

    let mut backend = MatchingBackend::new(
        MatchingService::new(matching.metric),
        corpus,
        matching.top_k,
    );
    if matching.classify {
        backend = backend.with_policy(matching.policy);
    }
    if backend.corpus().is_empty() {
        log::warn!("Reference corpus is empty; every request will return no matches");
    }

    backend
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

async fn verify(
    state: &AppState,
    latitude: f64,
    longitude: f64,
    heading: Option<f32>,
) -> Result<()> {
    let latitude = require_finite(latitude, "latitude")?;
    let longitude = require_finite(longitude, "longitude")?;
    let heading = heading
        .map(|degrees| require_finite(f64::from(degrees), "heading").map(|_| degrees))
        .transpose()?;

    let source = StaticSensorSource::new(state.fusion.clone(), latitude, longitude, heading);
    let authority = CaptureAuthority::new(
        state.fusion.clone(),
        Arc::new(source),
        Arc::new(LoggingTrigger),
        state.settings.capture(),
    );

    let verdict = authority.request_verification().await?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn extract_request(state: &AppState, image: &std::path::Path) -> Result<()> {
    let Some(asset) = state.settings.get().model.asset_path else {
        bail!("no model configured; set model.assetPath in the settings file");
    };

    let mut handle = PerceptualHashRuntime.load(&asset)?;
    let side = handle.input_side().unwrap_or(DEFAULT_INPUT_SIDE);
    let input = ModelInput::open(image, side)?;
    let vector = extract(&handle, &input)?;
    handle.release();

    info!(
        "Extracted {}-dimensional vector from {}",
        vector.len(),
        image.display()
    );
    let request = MatchRequest {
        vector: vector.into_inner(),
        top_k: None,
    };
    println!("{}", serde_json::to_string(&request)?);
    Ok(())
}

async fn rebuild_prototypes(state: &AppState, activate: bool) -> Result<()> {
    let db = state.open_database(AccessMode::ReadWrite)?;
    let records = db.load_reference_records().await?;
    let prototypes = build_prototypes(&records)?;
    db.replace_prototypes(&prototypes).await?;

    info!(
        "Stored {} prototypes from {} reference records in {}",
        prototypes.len(),
        records.len(),
        db.path().display()
    );

    if activate {
        let mut matching = state.settings.matching();
        matching.use_prototypes = true;
        state.settings.update_matching(matching)?;
        info!("Matching now ranks against prototypes");
    }
    Ok(())
}
