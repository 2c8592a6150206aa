use std::path::Path;

use tracing::{info, warn};

/// Loads env files lowest-precedence first: common settings, then the
/// `APP_ENV` overlay, then local secrets. Later files override earlier ones.
pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let overlay = match dotenvy::var("APP_ENV").as_deref() {
        Ok("prod") => "config/prod.env",
        _ => "config/dev.env",
    };

    for path in ["config/common.env", overlay, ".secrets.env"] {
        load_env_file(path)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!(path, "env file not found, skipping");
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!(path, "loaded environment file");
    Ok(())
}
