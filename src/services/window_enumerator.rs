use crate::{debug_if_enabled, trace_if_enabled};
use crate::events::AppWindowEntry;
use crate::services::desktop::DesktopCapability;
use crate::utils::natural_cmp;
use std::collections::HashMap;
use tracing::warn;

/// Снимок видимых окон всех приложений, кроме `excluding`.
///
/// Никогда не возвращает ошибку: недоступная система окон даёт пустой
/// список. Результат отсортирован по идентификатору приложения; порядок
/// окон одного приложения совпадает с порядком источника.
pub async fn enumerate_other_app_windows(
    desktop: &dyn DesktopCapability,
    excluding: Option<&str>,
) -> Vec<AppWindowEntry> {
    let windows = match desktop.list_on_screen_windows().await {
        Ok(windows) => windows,
        Err(e) => {
            warn!("Не удалось получить список окон: {}", e);
            return Vec::new();
        }
    };

    // pid -> идентификатор, только на время одного вызова
    let mut identifiers: HashMap<u32, Option<String>> = HashMap::new();
    let mut entries = Vec::with_capacity(windows.len());

    for window in windows {
        let (Some(pid), Some(frame)) = (window.owner_pid, window.bounds) else {
            continue;
        };

        let identifier = match identifiers.get(&pid) {
            Some(cached) => cached.clone(),
            None => {
                let resolved = desktop.resolve_application_identifier(pid).await;
                identifiers.insert(pid, resolved.clone());
                resolved
            }
        };

        let Some(identifier) = identifier else {
            continue;
        };
        if Some(identifier.as_str()) == excluding || frame.is_empty() {
            continue;
        }

        let entry = AppWindowEntry::new(identifier, frame);
        trace_if_enabled!("Окно другого приложения: {}", entry);
        entries.push(entry);
    }

    entries.sort_by(|a, b| natural_cmp(&a.application_identifier, &b.application_identifier));

    debug_if_enabled!(
        "Найдено {} окон других приложений ({} процессов)",
        entries.len(),
        identifiers.len()
    );

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Rect;
    use crate::services::desktop::{DesktopCall, DryRunDesktop, FakeWindow};

    #[tokio::test]
    async fn test_zero_area_dropped_and_sorted() {
        let desktop = DryRunDesktop::new()
            .with_process(1, "com.b")
            .with_process(2, "com.a")
            .with_window(FakeWindow::new(10, 1, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(20, 2, Rect::new(5.0, 5.0, 640.0, 480.0)))
            .with_window(FakeWindow::new(21, 2, Rect::new(5.0, 5.0, 0.0, 480.0)));

        let entries = enumerate_other_app_windows(&desktop, Some("self")).await;
        assert_eq!(
            entries,
            vec![
                AppWindowEntry::new("com.a", Rect::new(5.0, 5.0, 640.0, 480.0)),
                AppWindowEntry::new("com.b", Rect::new(0.0, 0.0, 300.0, 200.0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_excluded_unresolved_and_ownerless_windows_dropped() {
        let desktop = DryRunDesktop::new()
            .with_process(1, "self")
            .with_process(2, "com.a")
            .with_window(FakeWindow::new(10, 1, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(20, 2, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(30, 99, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(40, 2, Rect::new(0.0, 0.0, 300.0, 200.0)).without_owner());

        let entries = enumerate_other_app_windows(&desktop, Some("self")).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].application_identifier, "com.a");
    }

    #[tokio::test]
    async fn test_identifier_resolved_once_per_process() {
        let desktop = DryRunDesktop::new()
            .with_process(2, "com.a")
            .with_window(FakeWindow::new(20, 2, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(21, 2, Rect::new(10.0, 10.0, 300.0, 200.0)))
            .with_window(FakeWindow::new(22, 2, Rect::new(20.0, 20.0, 300.0, 200.0)));

        let entries = enumerate_other_app_windows(&desktop, None).await;
        assert_eq!(entries.len(), 3);

        let lookups = desktop
            .calls()
            .into_iter()
            .filter(|call| matches!(call, DesktopCall::ResolveApplicationIdentifier(_)))
            .count();
        assert_eq!(lookups, 1);
    }

    #[tokio::test]
    async fn test_unavailable_desktop_yields_empty_list() {
        let desktop = DryRunDesktop::with_sample_apps().unavailable();
        assert!(enumerate_other_app_windows(&desktop, None).await.is_empty());
    }
}
