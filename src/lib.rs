pub mod clock;
pub mod commands;
pub mod db;
pub mod error;
pub mod productivity;
pub mod settings;
pub mod timer;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use log::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::Database;
pub use error::{TimerError, TimerResult};
pub use settings::Settings;
pub use timer::{ElapsedStream, TimerController};

pub struct AppState {
    pub db: Database,
    pub timer: TimerController,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let db = Database::new(settings.database_path.clone())?;
        let timer = TimerController::new(db.clone(), &settings);
        Ok(Self {
            db,
            timer,
            settings,
        })
    }

    /// State around an existing controller, e.g. one driven by a
    /// [`ManualClock`].
    pub fn with_controller(timer: TimerController, settings: Settings) -> Self {
        Self {
            db: timer.database().clone(),
            timer,
            settings,
        }
    }
}

/// Entry point of the `tasktimer` binary: load settings, open the database
/// and serve JSON-lines commands on stdin/stdout until EOF.
pub async fn run() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the info default)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("tasktimer starting up...");

    let settings_path = env::var_os("TASKTIMER_SETTINGS").map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;
    info!(
        "Using database {} with {:?} accounting",
        settings.database_path.display(),
        settings.accounting
    );

    let state = Arc::new(AppState::new(settings)?);
    commands::serve(state, tokio::io::stdin(), tokio::io::stdout()).await?;

    info!("Input closed, shutting down");
    Ok(())
}
