use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use rover_navigation::{FollowerConfig, InflationConfig, PursuitConfig};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "ROVER";

/// Simulation loop tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Control loop period.
    pub control_period_ms: u64,
    /// Odometry integration period.
    pub sensor_period_ms: u64,
    /// Obstacle source refresh period.
    pub perception_period_ms: u64,
    /// How often a finished goal is replaced.
    pub goal_period_ms: u64,
    /// A command older than this trips the watchdog.
    pub watchdog_timeout_ms: u64,
    /// Cost map resolution (m per cell).
    pub resolution: f64,
    /// Size of the rectangular waypoint loop (m).
    pub loop_width: f64,
    pub loop_height: f64,
    /// Spacing of the recorded trajectory along the loop (m).
    pub waypoint_spacing: f64,
    /// Chance per perception tick that the bumper reports a contact.
    pub bump_probability: f64,
    /// How long a bumper contact stays in the map (s).
    pub bump_lifetime_secs: f64,
    /// Distance ahead of the robot checked for obstacles (m).
    pub blocked_lookahead: f64,
    /// Seed of the simulation random generator.
    pub seed: u64,
    /// Stop after this many seconds. 0 runs forever.
    pub run_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            control_period_ms: 50,
            sensor_period_ms: 10,
            perception_period_ms: 200,
            goal_period_ms: 500,
            watchdog_timeout_ms: 250,
            resolution: 0.05,
            loop_width: 4.0,
            loop_height: 2.0,
            waypoint_spacing: 0.02,
            bump_probability: 0.02,
            bump_lifetime_secs: 2.0,
            blocked_lookahead: 0.3,
            seed: 1337,
            run_secs: 0,
        }
    }
}

/// Every configuration section of the application.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sim: SimConfig,
    pub follower: FollowerConfig,
    pub pursuit: PursuitConfig,
    pub inflation: InflationConfig,
}

/// Loads `config/default.toml`, then applies `ROVER__SECTION__KEY`
/// environment overrides.
pub fn load_settings() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
