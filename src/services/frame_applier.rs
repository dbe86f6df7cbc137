use crate::debug_if_enabled;
use crate::events::{Point, Rect, WindowFrameSpec, XValue};
use crate::services::desktop::{
    AttributeValue, DesktopCapability, Display, WindowAttribute, WindowHandle, ROLE_DESKTOP,
};
use std::fmt;
use tracing::{info, warn};

/// Причина, по которой окно не изменялось
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    Minimized,
    DesktopRole,
    EmptySize,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Hidden => "скрыто",
            SkipReason::Minimized => "свёрнуто",
            SkipReason::DesktopRole => "рабочий стол",
            SkipReason::EmptySize => "нулевой размер",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Applied,
    Skipped(SkipReason),
    /// Хотя бы один из вызовов изменения не удался
    Failed {
        size_error: Option<String>,
        position_error: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub window: WindowHandle,
    pub outcome: WindowOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub pid: u32,
    /// Ошибка получения списка окон процесса
    pub error: Option<String>,
    pub windows: Vec<WindowReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpecStatus {
    NoRunningProcess,
    LookupFailed(String),
    Processed(Vec<ProcessReport>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecReport {
    pub application_identifier: String,
    pub status: SpecStatus,
}

/// Итог применения пакета директив; отправителю команды не передаётся
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub specs: Vec<SpecReport>,
}

impl ApplyReport {
    fn window_outcomes(&self) -> impl Iterator<Item = &WindowOutcome> {
        self.specs
            .iter()
            .filter_map(|spec| match &spec.status {
                SpecStatus::Processed(processes) => Some(processes),
                _ => None,
            })
            .flatten()
            .flat_map(|process| process.windows.iter().map(|w| &w.outcome))
    }

    pub fn applied_count(&self) -> usize {
        self.window_outcomes()
            .filter(|o| matches!(o, WindowOutcome::Applied))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.window_outcomes()
            .filter(|o| matches!(o, WindowOutcome::Skipped(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.window_outcomes()
            .filter(|o| matches!(o, WindowOutcome::Failed { .. }))
            .count()
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "директив: {}, изменено окон: {}, пропущено: {}, с ошибками: {}",
            self.specs.len(),
            self.applied_count(),
            self.skipped_count(),
            self.failed_count()
        )
    }
}

/// Горизонтальное начало окна; для `Centered` берётся видимая область
/// основного дисплея (или первого, если основного нет).
pub fn compute_origin_x(x: XValue, width: f64, displays: &[Display]) -> f64 {
    match x {
        XValue::Absolute(value) => value,
        XValue::Centered => {
            let visible = displays
                .iter()
                .find(|d| d.primary)
                .or_else(|| displays.first())
                .map(|d| d.visible_frame)
                .unwrap_or_default();
            visible.mid_x() - width / 2.0
        }
    }
}

/// Применить директивы ко всем подходящим окнам; ошибки не прерывают пакет
pub async fn apply_frames(desktop: &dyn DesktopCapability, specs: &[WindowFrameSpec]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for spec in specs {
        report.specs.push(apply_spec(desktop, spec).await);
    }
    report
}

async fn apply_spec(desktop: &dyn DesktopCapability, spec: &WindowFrameSpec) -> SpecReport {
    debug_if_enabled!("Применяем директиву {}", spec);

    let status = match desktop.running_processes(&spec.application_identifier).await {
        Ok(pids) if pids.is_empty() => {
            info!("Приложение не запущено: {}", spec.application_identifier);
            SpecStatus::NoRunningProcess
        }
        Err(e) => {
            warn!("Не удалось найти процессы {}: {}", spec.application_identifier, e);
            SpecStatus::LookupFailed(e.to_string())
        }
        Ok(pids) => {
            let target = target_frame(desktop, spec).await;
            debug_if_enabled!("Целевая рамка для {}: {}", spec.application_identifier, target);

            let mut processes = Vec::with_capacity(pids.len());
            for pid in pids {
                processes.push(apply_to_process(desktop, pid, target).await);
            }
            SpecStatus::Processed(processes)
        }
    };

    SpecReport {
        application_identifier: spec.application_identifier.clone(),
        status,
    }
}

async fn target_frame(desktop: &dyn DesktopCapability, spec: &WindowFrameSpec) -> Rect {
    let displays = match spec.x {
        XValue::Centered => desktop.displays().await.unwrap_or_else(|e| {
            warn!("Не удалось получить список дисплеев: {}", e);
            Vec::new()
        }),
        XValue::Absolute(_) => Vec::new(),
    };

    Rect::new(
        compute_origin_x(spec.x, spec.width, &displays),
        spec.y,
        spec.width,
        spec.height,
    )
}

async fn apply_to_process(desktop: &dyn DesktopCapability, pid: u32, target: Rect) -> ProcessReport {
    let windows = match desktop.list_windows(pid).await {
        Ok(windows) => windows,
        Err(e) => {
            warn!("Нет доступных окон у процесса {}: {}", pid, e);
            return ProcessReport {
                pid,
                error: Some(e.to_string()),
                windows: Vec::new(),
            };
        }
    };

    let mut reports = Vec::with_capacity(windows.len());
    for window in windows {
        let outcome = match skip_reason(desktop, window).await {
            Some(reason) => {
                debug_if_enabled!("Окно {} пропущено: {}", window, reason);
                WindowOutcome::Skipped(reason)
            }
            None => apply_to_window(desktop, window, target).await,
        };
        reports.push(WindowReport { window, outcome });
    }

    ProcessReport {
        pid,
        error: None,
        windows: reports,
    }
}

/// Неудачное чтение атрибута считается значением по умолчанию: не скрыто,
/// не свёрнуто, обычная роль, нулевой размер.
async fn skip_reason(desktop: &dyn DesktopCapability, window: WindowHandle) -> Option<SkipReason> {
    let flag = |value: Option<AttributeValue>| value.and_then(|v| v.as_bool()).unwrap_or(false);

    if flag(desktop.get_attribute(window, WindowAttribute::Hidden).await.ok()) {
        return Some(SkipReason::Hidden);
    }
    if flag(desktop.get_attribute(window, WindowAttribute::Minimized).await.ok()) {
        return Some(SkipReason::Minimized);
    }

    let role = desktop.get_attribute(window, WindowAttribute::Role).await.ok();
    if role.as_ref().and_then(AttributeValue::as_text) == Some(ROLE_DESKTOP) {
        return Some(SkipReason::DesktopRole);
    }

    let size = desktop
        .get_attribute(window, WindowAttribute::Size)
        .await
        .ok()
        .and_then(|v| v.as_size())
        .unwrap_or_default();
    if !size.is_positive() {
        return Some(SkipReason::EmptySize);
    }

    None
}

async fn apply_to_window(desktop: &dyn DesktopCapability, window: WindowHandle, target: Rect) -> WindowOutcome {
    // Сначала размер: перемещение не должно сбиваться отложенным ресайзом
    let size_error = desktop
        .set_attribute(window, AttributeValue::Size(target.size()))
        .await
        .err()
        .map(|e| {
            warn!("Не удалось изменить размер окна {}: {}", window, e);
            e.to_string()
        });

    let position_error = desktop
        .set_attribute(window, AttributeValue::Position(Point::new(target.x, target.y)))
        .await
        .err()
        .map(|e| {
            warn!("Не удалось переместить окно {}: {}", window, e);
            e.to_string()
        });

    if size_error.is_none() && position_error.is_none() {
        WindowOutcome::Applied
    } else {
        WindowOutcome::Failed {
            size_error,
            position_error,
        }
    }
}
