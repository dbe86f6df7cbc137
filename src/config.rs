use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Имя сокета, которое использует отправитель пользовательских команд
pub const DEFAULT_SOCKET_NAME: &str = "karabiner_user_command_receiver.sock";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub desktop: DesktopConfig,
    pub presentation: PresentationConfig,
    // Индекс скрытых идентификаторов - не сериализуется, строится после загрузки
    #[serde(skip)]
    hidden_set: HashSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Идентификатор собственного приложения, исключаемый из show_window_frames
    #[serde(default)]
    pub self_identifier: Option<String>,
    pub max_datagram_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DesktopConfig {
    pub backend: String,
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresentationConfig {
    pub output: String,
    #[serde(default)]
    pub hidden_identifiers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            server: ServerConfig {
                socket_path: default_socket_path(),
                self_identifier: None,
                max_datagram_bytes: 64 * 1024,
            },
            desktop: DesktopConfig {
                backend: "x11".to_string(),
                call_timeout_ms: 2000,
            },
            presentation: PresentationConfig {
                output: "log".to_string(),
                hidden_identifiers: vec!["com.apple.controlcenter".to_string()],
            },
            hidden_set: HashSet::new(),
        };
        config.build_indexes();
        config
    }
}

/// Путь к сокету по умолчанию: $XDG_RUNTIME_DIR, иначе /tmp
pub fn default_socket_path() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(|dir| PathBuf::from(dir).join(DEFAULT_SOCKET_NAME))
        .unwrap_or_else(|_| PathBuf::from("/tmp").join(DEFAULT_SOCKET_NAME))
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("UCS_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_indexes();

        Ok(config)
    }

    pub fn build_indexes(&mut self) {
        self.hidden_set = self
            .presentation
            .hidden_identifiers
            .iter()
            .cloned()
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.server.socket_path.as_os_str().is_empty() {
            anyhow::bail!("socket_path не может быть пустым");
        }

        if self.server.max_datagram_bytes == 0 {
            anyhow::bail!("max_datagram_bytes должно быть больше 0");
        }

        match self.desktop.backend.as_str() {
            "x11" | "dry_run" => {}
            _ => anyhow::bail!("Неверный backend рабочего стола: {}", self.desktop.backend),
        }

        if self.desktop.call_timeout_ms == 0 {
            anyhow::bail!("call_timeout_ms должно быть больше 0");
        }

        match self.presentation.output.as_str() {
            "log" | "stdout" => {}
            _ => anyhow::bail!("Неверный вывод представления: {}", self.presentation.output),
        }

        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.desktop.call_timeout_ms)
    }

    pub fn hidden_identifiers(&self) -> &HashSet<String> {
        &self.hidden_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.hidden_identifiers().contains("com.apple.controlcenter"));
        assert!(!config.hidden_identifiers().contains("com.example.editor"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.desktop.backend = "wayland".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.desktop.call_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.presentation.output = "window".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_merges_toml_over_defaults() {
        let dir = std::env::temp_dir().join(format!("ucs-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("server.toml");
        std::fs::write(
            &path,
            "[desktop]\nbackend = \"dry_run\"\ncall_timeout_ms = 500\n\n[presentation]\noutput = \"stdout\"\nhidden_identifiers = [\"com.example.dock\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.desktop.backend, "dry_run");
        assert_eq!(config.call_timeout(), Duration::from_millis(500));
        assert_eq!(config.logging.level, "info");
        assert!(config.hidden_identifiers().contains("com.example.dock"));
        assert!(!config.hidden_identifiers().contains("com.apple.controlcenter"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/user-command-server.toml").unwrap();
        assert_eq!(config.desktop.backend, "x11");
        assert_eq!(config.server.max_datagram_bytes, 64 * 1024);
    }
}
