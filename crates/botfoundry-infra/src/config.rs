//! Factory configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.botfoundry/` in
//! production) into [`FactoryConfig`]. A missing or malformed file never
//! aborts startup; the factory runs on defaults and says so in the log.

use std::path::Path;

use botfoundry_types::config::FactoryConfig;

/// Load factory configuration from `{data_dir}/config.toml`.
///
/// Serde defaults fill any field the file omits, so a config that only
/// lists `[[bots]]` entries is complete.
pub async fn load_factory_config(data_dir: &Path) -> FactoryConfig {
    let path = data_dir.join("config.toml");

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), "no config.toml, using defaults");
            } else {
                tracing::warn!(path = %path.display(), %err, "config unreadable, using defaults");
            }
            return FactoryConfig::default();
        }
    };

    toml::from_str(&raw).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), %err, "config failed to parse, using defaults");
        FactoryConfig::default()
    })
}
