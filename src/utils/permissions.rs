use crate::error::Result;
use crate::server_error;
use std::path::PathBuf;
use tracing::{info, warn};

/// Утилиты, через которые X11 backend читает и меняет окна
pub const REQUIRED_TOOLS: &[&str] = &["wmctrl", "xdotool", "xprop", "xwininfo", "xrandr"];

/// Проверить, что автоматизация окон вообще возможна.
///
/// Ошибка здесь не фатальна: без доступа каждый вызов изменения окна
/// просто завершится неудачей и будет залогирован.
pub fn check_automation_access() -> Result<()> {
    info!("Проверка доступа к управлению окнами...");

    check_display()?;

    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| find_in_path(tool).is_none())
        .collect();

    if !missing.is_empty() {
        return Err(server_error!(
            service_unavailable,
            "Не найдены утилиты: {}",
            missing.join(", ")
        ));
    }

    check_not_root();

    info!("Проверка доступа к управлению окнами завершена успешно");
    Ok(())
}

fn check_display() -> Result<()> {
    let name = display_name(std::env::var("DISPLAY").ok())?;
    info!("Используется дисплей {}", name);
    Ok(())
}

fn display_name(value: Option<String>) -> Result<String> {
    match value {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(server_error!(
            permission,
            "Переменная DISPLAY не задана, доступ к окнам невозможен"
        )),
    }
}

/// Найти исполняемый файл в $PATH
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

fn check_not_root() {
    if let Ok(user) = std::env::var("USER") {
        if user == "root" {
            warn!("⚠️  Сервер запущен от имени root: окна пользовательской сессии могут быть недоступны");
        }
    }
}

/// Получить рекомендуемые команды для установки утилит
pub fn get_setup_commands() -> Vec<String> {
    vec![
        "# Debian / Ubuntu:".to_string(),
        "sudo apt install wmctrl xdotool x11-utils x11-xserver-utils".to_string(),
        "".to_string(),
        "# Fedora:".to_string(),
        "sudo dnf install wmctrl xdotool xprop xwininfo xrandr".to_string(),
    ]
}
