pub mod config;
pub mod render;
pub mod session;

pub use config::{apply_overrides, load_planner_settings, open_key_store, RunOverrides, Scope};
pub use session::{run_plan, AutoApprove, Confirmer, StdinConfirmer};
