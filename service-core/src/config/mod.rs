use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load layered settings for a service.
///
/// Sources, lowest precedence first:
/// 1. `<config_dir>/base.yaml` (optional)
/// 2. Environment variables prefixed with `APP_`, nested with `__`
///    (e.g. `APP_PAYPAL__CLIENT_ID`)
pub fn load<T: DeserializeOwned>(config_dir: &Path) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let settings = Cfg::builder()
        .add_source(File::from(config_dir.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Locate a service's `config` directory whether the process runs from the
/// workspace root or from the service directory itself.
pub fn config_dir(service_name: &str) -> Result<std::path::PathBuf, AppError> {
    let base_path = std::env::current_dir()?;

    if base_path.ends_with(service_name) {
        Ok(base_path.join("config"))
    } else {
        Ok(base_path.join(service_name).join("config"))
    }
}
