//! Shared application service layer for polebalance.
//!
//! Config handling, runtime assembly and the headless run loop, used by the
//! CLI.

pub mod config;
pub mod config_service;
pub mod error;
pub mod run_service;
pub mod runtime;

pub use config::{
    AxesDef, AxisDef, BalanceConfig, CONFIG_VERSION, DisturbanceDef, InitialDef, PlantDef, RunDef,
    SynthesisDef, WeightChangeDef, WeightsDef,
};
pub use config_service::{load_config, save_config, validate_config};
pub use error::{AppError, AppResult};
pub use run_service::{RunProgress, RunRecord, RunSummary, SynthesisEvent, run, run_with_progress};
pub use runtime::{BalanceRuntime, build_runtime, synthesize_once};
