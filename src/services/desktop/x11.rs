use crate::error::Result;
use crate::{debug_if_enabled, server_error};
use crate::events::{Point, Rect, Size};
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::r#trait::{
    AttributeValue, DesktopCapability, Display, OnScreenWindow, ProcessIds, WindowAttribute,
    WindowHandle,
};

/// Типы окон, относящиеся к оформлению рабочего стола
const DESKTOP_CHROME_TYPES: &[&str] = &["desktop", "dock"];

/// Backend для X11: вызывает wmctrl, xdotool, xprop, xwininfo и xrandr.
///
/// Каждый вызов ограничен `call_timeout`, чтобы зависшая утилита не
/// блокировала очередь команд.
pub struct X11Desktop {
    call_timeout: Duration,
}

/// Строка вывода `wmctrl -lpG`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WmctrlWindow {
    pub id: u64,
    pub desktop: i64,
    pub pid: u32,
    pub frame: Rect,
}

impl X11Desktop {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    /// Ограничить внешний вызов `call_timeout`
    async fn bounded<T>(&self, what: &str, call: impl Future<Output = T>) -> Result<T> {
        timeout(self.call_timeout, call).await.map_err(|_| {
            server_error!(
                timeout,
                "{} не ответил за {}мс",
                what,
                self.call_timeout.as_millis()
            )
        })
    }

    async fn run_tool(&self, program: &str, args: &[&str]) -> Result<String> {
        let invocation = format!("{} {}", program, args.join(" "));
        debug_if_enabled!("Запуск {}", invocation);

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = self
            .bounded(&invocation, command.output())
            .await?
            .map_err(|e| server_error!(capability, "{} не найден: {}", program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} вернул ошибку: {}", program, stderr.trim());
            return Err(server_error!(capability, "{} вернул ошибку: {}", program, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn managed_windows(&self) -> Result<Vec<WmctrlWindow>> {
        let stdout = self.run_tool("wmctrl", &["-lpG"]).await?;
        Ok(parse_wmctrl_windows(&stdout))
    }

    async fn window_type(&self, id: u64) -> Result<String> {
        let id = id.to_string();
        let stdout = self
            .run_tool("xprop", &["-id", &id, "_NET_WM_WINDOW_TYPE"])
            .await?;
        Ok(parse_window_type(&stdout).unwrap_or_else(|| "normal".to_string()))
    }

    async fn geometry(&self, window: WindowHandle) -> Result<(Point, Size)> {
        let id = window.0.to_string();
        let stdout = self.run_tool("xdotool", &["getwindowgeometry", &id]).await?;
        parse_geometry(&stdout)
            .ok_or_else(|| server_error!(capability, "не удалось разобрать геометрию окна {}", window))
    }
}

#[async_trait::async_trait]
impl DesktopCapability for X11Desktop {
    async fn list_on_screen_windows(&self) -> Result<Vec<OnScreenWindow>> {
        let windows = self.managed_windows().await?;

        let current_desktop = match self.run_tool("wmctrl", &["-d"]).await {
            Ok(stdout) => parse_current_desktop(&stdout),
            Err(e) => {
                debug!("Не удалось определить текущий рабочий стол: {}", e);
                None
            }
        };

        let mut result = Vec::with_capacity(windows.len());
        for window in windows {
            // -1: окно видно на всех рабочих столах
            let visible_here = window.desktop == -1
                || current_desktop.map_or(true, |current| current == window.desktop);
            if !visible_here {
                continue;
            }

            match self.window_type(window.id).await {
                Ok(kind) if DESKTOP_CHROME_TYPES.contains(&kind.as_str()) => continue,
                Ok(_) => {}
                Err(e) => debug!("Тип окна 0x{:08x} неизвестен: {}", window.id, e),
            }

            result.push(OnScreenWindow {
                owner_pid: (window.pid != 0).then_some(window.pid),
                bounds: Some(window.frame),
            });
        }

        Ok(result)
    }

    async fn resolve_application_identifier(&self, pid: u32) -> Option<String> {
        match self.bounded(&format!("/proc/{}", pid), process_identifier(pid)).await {
            Ok(identifier) => identifier,
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    async fn running_processes(&self, identifier: &str) -> Result<ProcessIds> {
        self.bounded("поиск процессов в /proc", scan_processes(identifier))
            .await?
    }

    async fn list_windows(&self, pid: u32) -> Result<Vec<WindowHandle>> {
        Ok(self
            .managed_windows()
            .await?
            .into_iter()
            .filter(|w| w.pid == pid)
            .map(|w| WindowHandle(w.id))
            .collect())
    }

    async fn get_attribute(&self, window: WindowHandle, attribute: WindowAttribute) -> Result<AttributeValue> {
        let id = window.0.to_string();
        match attribute {
            WindowAttribute::Hidden => {
                let stdout = self.run_tool("xwininfo", &["-id", &id]).await?;
                let state = parse_map_state(&stdout)
                    .ok_or_else(|| server_error!(capability, "нет Map State для окна {}", window))?;
                Ok(AttributeValue::Bool(state != "IsViewable"))
            }
            WindowAttribute::Minimized => {
                let stdout = self
                    .run_tool("xprop", &["-id", &id, "_NET_WM_STATE"])
                    .await?;
                Ok(AttributeValue::Bool(stdout.contains("_NET_WM_STATE_HIDDEN")))
            }
            WindowAttribute::Role => Ok(AttributeValue::Text(self.window_type(window.0).await?)),
            WindowAttribute::Size => Ok(AttributeValue::Size(self.geometry(window).await?.1)),
            WindowAttribute::Position => Ok(AttributeValue::Position(self.geometry(window).await?.0)),
        }
    }

    async fn set_attribute(&self, window: WindowHandle, value: AttributeValue) -> Result<()> {
        let id = window.0.to_string();
        match value {
            AttributeValue::Size(size) => {
                let width = (size.width.round() as i64).to_string();
                let height = (size.height.round() as i64).to_string();
                self.run_tool("xdotool", &["windowsize", &id, &width, &height])
                    .await?;
            }
            AttributeValue::Position(point) => {
                let x = (point.x.round() as i64).to_string();
                let y = (point.y.round() as i64).to_string();
                self.run_tool("xdotool", &["windowmove", &id, &x, &y]).await?;
            }
            other => return Err(server_error!(capability, "атрибут {:?} нельзя изменить", other)),
        }
        Ok(())
    }

    async fn displays(&self) -> Result<Vec<Display>> {
        let stdout = self.run_tool("xrandr", &["--query"]).await?;
        let outputs = parse_xrandr(&stdout);

        let workarea = match self.run_tool("xprop", &["-root", "_NET_WORKAREA"]).await {
            Ok(stdout) => parse_workarea(&stdout),
            Err(e) => {
                debug!("_NET_WORKAREA недоступен: {}", e);
                None
            }
        };

        Ok(outputs
            .into_iter()
            .map(|(frame, primary)| Display {
                frame,
                visible_frame: workarea
                    .and_then(|area| frame.intersection(&area))
                    .unwrap_or(frame),
                primary,
            })
            .collect())
    }
}

/// Идентификатор приложения процесса: имя исполняемого файла или comm
async fn process_identifier(pid: u32) -> Option<String> {
    // comm обрезан до 15 символов, поэтому сначала имя исполняемого файла
    if let Ok(exe) = tokio::fs::read_link(format!("/proc/{}/exe", pid)).await {
        if let Some(name) = exe.file_name().and_then(|name| name.to_str()) {
            return Some(name.trim_end_matches(" (deleted)").to_string());
        }
    }

    let comm = tokio::fs::read_to_string(format!("/proc/{}/comm", pid))
        .await
        .ok()?;
    let identifier = comm.trim();
    (!identifier.is_empty()).then(|| identifier.to_string())
}

async fn scan_processes(identifier: &str) -> Result<ProcessIds> {
    let mut pids = ProcessIds::new();
    let mut entries = tokio::fs::read_dir("/proc")
        .await
        .map_err(|e| server_error!(lookup, "/proc недоступен: {}", e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| server_error!(lookup, "ошибка чтения /proc: {}", e))?
    {
        let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse::<u32>().ok()) else {
            continue;
        };
        if process_identifier(pid).await.as_deref() == Some(identifier) {
            pids.push(pid);
        }
    }

    Ok(pids)
}

/// `0x03a00003 -1 1234  0 0  1920 27  host title...`
pub(crate) fn parse_wmctrl_windows(stdout: &str) -> Vec<WmctrlWindow> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 7 {
                return None;
            }
            let id = u64::from_str_radix(parts[0].trim_start_matches("0x"), 16).ok()?;
            let desktop = parts[1].parse::<i64>().ok()?;
            let pid = parts[2].parse::<u32>().ok()?;
            let numbers: Vec<f64> = parts[3..7]
                .iter()
                .map(|p| p.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .ok()?;
            Some(WmctrlWindow {
                id,
                desktop,
                pid,
                frame: Rect::new(numbers[0], numbers[1], numbers[2], numbers[3]),
            })
        })
        .collect()
}

/// Номер текущего рабочего стола из `wmctrl -d` (строка со звёздочкой)
pub(crate) fn parse_current_desktop(stdout: &str) -> Option<i64> {
    stdout.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let index = parts.next()?.parse::<i64>().ok()?;
        (parts.next()? == "*").then_some(index)
    })
}

/// `_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_NORMAL` -> "normal"
pub(crate) fn parse_window_type(stdout: &str) -> Option<String> {
    let (_, atoms) = stdout.split_once('=')?;
    let first = atoms.split(',').next()?.trim();
    first
        .strip_prefix("_NET_WM_WINDOW_TYPE_")
        .map(|kind| kind.to_lowercase())
}

pub(crate) fn parse_map_state(stdout: &str) -> Option<&str> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Map State:")
            .map(|state| state.trim())
    })
}

/// Вывод `xdotool getwindowgeometry`: строки Position и Geometry
pub(crate) fn parse_geometry(stdout: &str) -> Option<(Point, Size)> {
    let mut position = None;
    let mut size = None;

    for line in stdout.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Position:") {
            let coords = rest.split_whitespace().next()?;
            let (x, y) = coords.split_once(',')?;
            position = Some(Point::new(x.parse().ok()?, y.parse().ok()?));
        } else if let Some(rest) = line.strip_prefix("Geometry:") {
            let (w, h) = rest.trim().split_once('x')?;
            size = Some(Size::new(w.parse().ok()?, h.parse().ok()?));
        }
    }

    Some((position?, size?))
}

/// `HDMI-1 connected primary 1920x1080+0+0 (normal ...) ...`
pub(crate) fn parse_xrandr(stdout: &str) -> Vec<(Rect, bool)> {
    stdout
        .lines()
        .filter(|line| line.contains(" connected"))
        .filter_map(|line| {
            let mut tokens = line.split_whitespace().skip(2).peekable();
            let primary = tokens.next_if_eq(&"primary").is_some();
            let frame = parse_xrandr_geometry(tokens.next()?)?;
            Some((frame, primary))
        })
        .collect()
}

fn parse_xrandr_geometry(token: &str) -> Option<Rect> {
    let (size, offsets) = token.split_once('+')?;
    let (w, h) = size.split_once('x')?;
    let (x, y) = offsets.split_once('+')?;
    Some(Rect::new(
        x.parse().ok()?,
        y.parse().ok()?,
        w.parse().ok()?,
        h.parse().ok()?,
    ))
}

/// Первая рабочая область из `_NET_WORKAREA(CARDINAL) = 0, 27, 1920, 1053, ...`
pub(crate) fn parse_workarea(stdout: &str) -> Option<Rect> {
    let (_, values) = stdout.split_once('=')?;
    let numbers: Vec<f64> = values
        .split(',')
        .take(4)
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (numbers.len() == 4).then(|| Rect::new(numbers[0], numbers[1], numbers[2], numbers[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let desktop = X11Desktop::new(Duration::from_millis(10));
        let result = desktop
            .bounded("зависший вызов", std::future::pending::<()>())
            .await;
        assert!(matches!(result, Err(ServerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_own_process_identifier_resolved_within_timeout() {
        let desktop = X11Desktop::new(Duration::from_secs(5));
        let own = desktop.resolve_application_identifier(std::process::id()).await;
        assert!(own.is_some_and(|name| !name.is_empty()));
    }

    #[test]
    fn test_parse_wmctrl_windows() {
        let stdout = "0x03a00003 -1 1234 0    0    1920 27   host Top Panel\n\
                      0x04200007  0 5678 100  80   1280 900  host Editor - main.rs\n\
                      garbage line\n";
        let windows = parse_wmctrl_windows(stdout);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].desktop, -1);
        assert_eq!(windows[1].id, 0x04200007);
        assert_eq!(windows[1].pid, 5678);
        assert_eq!(windows[1].frame, Rect::new(100.0, 80.0, 1280.0, 900.0));
    }

    #[test]
    fn test_parse_current_desktop() {
        let stdout = "0  - DG: 1920x1080  VP: N/A  WA: 0,27 1920x1053  One\n\
                      1  * DG: 1920x1080  VP: 0,0  WA: 0,27 1920x1053  Two\n";
        assert_eq!(parse_current_desktop(stdout), Some(1));
        assert_eq!(parse_current_desktop(""), None);
    }

    #[test]
    fn test_parse_window_type() {
        assert_eq!(
            parse_window_type("_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_DESKTOP\n"),
            Some("desktop".to_string())
        );
        assert_eq!(
            parse_window_type("_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_DIALOG, _NET_WM_WINDOW_TYPE_NORMAL"),
            Some("dialog".to_string())
        );
        assert_eq!(parse_window_type("_NET_WM_WINDOW_TYPE:  not found."), None);
    }

    #[test]
    fn test_parse_map_state() {
        let stdout = "xwininfo: Window id: 0x4200007 \"Editor\"\n\n  Width: 1280\n  Map State: IsUnMapped\n";
        assert_eq!(parse_map_state(stdout), Some("IsUnMapped"));
    }

    #[test]
    fn test_parse_geometry() {
        let stdout = "Window 69206023\n  Position: 100,80 (screen: 0)\n  Geometry: 1280x900\n";
        assert_eq!(
            parse_geometry(stdout),
            Some((Point::new(100.0, 80.0), Size::new(1280.0, 900.0)))
        );
        assert_eq!(parse_geometry("Window 1\n"), None);
    }

    #[test]
    fn test_parse_xrandr() {
        let stdout = "Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384\n\
                      eDP-1 connected 1920x1080+1920+0 (normal left inverted right x axis y axis) 309mm x 174mm\n\
                      HDMI-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 527mm x 296mm\n\
                      DP-1 disconnected (normal left inverted right x axis y axis)\n\
                      DP-2 connected (normal left inverted right x axis y axis)\n";
        let outputs = parse_xrandr(stdout);
        assert_eq!(
            outputs,
            vec![
                (Rect::new(1920.0, 0.0, 1920.0, 1080.0), false),
                (Rect::new(0.0, 0.0, 1920.0, 1080.0), true),
            ]
        );
    }

    #[test]
    fn test_parse_workarea() {
        assert_eq!(
            parse_workarea("_NET_WORKAREA(CARDINAL) = 0, 27, 1920, 1053, 0, 27, 1920, 1053\n"),
            Some(Rect::new(0.0, 27.0, 1920.0, 1053.0))
        );
        assert_eq!(parse_workarea("_NET_WORKAREA:  not found."), None);
    }
}
