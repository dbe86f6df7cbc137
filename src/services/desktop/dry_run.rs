use crate::error::Result;
use crate::server_error;
use crate::events::{Point, Rect, Size};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::info;

use super::r#trait::{
    AttributeValue, DesktopCapability, Display, OnScreenWindow, ProcessIds, WindowAttribute,
    WindowHandle, ROLE_DESKTOP,
};

/// Окно эмулируемого рабочего стола
#[derive(Debug, Clone, PartialEq)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub owner_pid: Option<u32>,
    pub frame: Rect,
    pub hidden: bool,
    pub minimized: bool,
    pub role: String,
    pub on_screen: bool,
    pub fail_mutations: bool,
}

impl FakeWindow {
    pub fn new(handle: u64, owner_pid: u32, frame: Rect) -> Self {
        Self {
            handle: WindowHandle(handle),
            owner_pid: Some(owner_pid),
            frame,
            hidden: false,
            minimized: false,
            role: "normal".to_string(),
            on_screen: true,
            fail_mutations: false,
        }
    }

    #[allow(dead_code)]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self.on_screen = false;
        self
    }

    pub fn minimized(mut self) -> Self {
        self.minimized = true;
        self.on_screen = false;
        self
    }

    #[allow(dead_code)]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    #[allow(dead_code)]
    pub fn without_owner(mut self) -> Self {
        self.owner_pid = None;
        self
    }

    #[allow(dead_code)]
    pub fn failing(mut self) -> Self {
        self.fail_mutations = true;
        self
    }
}

/// Сколько последних обращений хранит журнал
pub const CALL_LOG_CAPACITY: usize = 1024;

/// Журнал обращений к эмулируемому рабочему столу
#[derive(Debug, Clone, PartialEq)]
pub enum DesktopCall {
    ListOnScreenWindows,
    ResolveApplicationIdentifier(u32),
    RunningProcesses(String),
    ListWindows(u32),
    GetAttribute(WindowHandle, WindowAttribute),
    SetAttribute(WindowHandle, AttributeValue),
    Displays,
}

#[derive(Debug, Default)]
struct DryRunState {
    processes: Vec<(u32, String)>,
    windows: Vec<FakeWindow>,
    displays: Vec<Display>,
    unavailable: bool,
    // Процессы, для которых list_windows завершается ошибкой
    broken_pids: Vec<u32>,
}

/// Рабочий стол в памяти: режим --dry-run и тесты.
///
/// Изменения размера и положения применяются к собственному состоянию,
/// последние `CALL_LOG_CAPACITY` вызовов хранятся в журнале.
#[derive(Debug, Default)]
pub struct DryRunDesktop {
    state: Mutex<DryRunState>,
    calls: Mutex<VecDeque<DesktopCall>>,
}

impl DryRunDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Несколько фиктивных приложений для режима сухого запуска
    pub fn with_sample_apps() -> Self {
        Self::new()
            .with_display(
                Rect::new(0.0, 0.0, 1920.0, 1080.0),
                Rect::new(0.0, 25.0, 1920.0, 1055.0),
                true,
            )
            .with_process(1001, "org.example.terminal")
            .with_process(1002, "org.example.browser")
            .with_process(1003, "org.example.editor")
            .with_window(FakeWindow::new(0x1001, 1001, Rect::new(40.0, 60.0, 900.0, 600.0)))
            .with_window(FakeWindow::new(0x1002, 1002, Rect::new(200.0, 80.0, 1280.0, 900.0)))
            .with_window(FakeWindow::new(0x1003, 1002, Rect::new(220.0, 100.0, 1280.0, 900.0)).minimized())
            .with_window(FakeWindow::new(0x1004, 1003, Rect::new(960.0, 40.0, 960.0, 1000.0)))
    }

    pub fn with_display(self, frame: Rect, visible_frame: Rect, primary: bool) -> Self {
        self.state.lock().displays.push(Display {
            frame,
            visible_frame,
            primary,
        });
        self
    }

    pub fn with_process(self, pid: u32, identifier: &str) -> Self {
        self.state.lock().processes.push((pid, identifier.to_string()));
        self
    }

    pub fn with_window(self, window: FakeWindow) -> Self {
        self.state.lock().windows.push(window);
        self
    }

    /// Эмулировать недоступность системы окон
    #[allow(dead_code)]
    pub fn unavailable(self) -> Self {
        self.state.lock().unavailable = true;
        self
    }

    /// Отказ в списке окон для одного процесса
    #[allow(dead_code)]
    pub fn with_broken_process(self, pid: u32) -> Self {
        self.state.lock().broken_pids.push(pid);
        self
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<DesktopCall> {
        self.calls.lock().iter().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn mutation_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, DesktopCall::SetAttribute(..)))
            .count()
    }

    #[allow(dead_code)]
    pub fn window_frame(&self, handle: WindowHandle) -> Option<Rect> {
        self.state
            .lock()
            .windows
            .iter()
            .find(|w| w.handle == handle)
            .map(|w| w.frame)
    }

    fn record(&self, call: DesktopCall) {
        let mut calls = self.calls.lock();
        if calls.len() == CALL_LOG_CAPACITY {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    fn check_available(&self) -> Result<()> {
        if self.state.lock().unavailable {
            return Err(server_error!(service_unavailable, "эмулируемая система окон недоступна"));
        }
        Ok(())
    }

    fn with_window_mut<T>(
        &self,
        handle: WindowHandle,
        f: impl FnOnce(&mut FakeWindow) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.handle == handle)
            .ok_or_else(|| server_error!(capability, "окно {} не существует", handle))?;
        f(window)
    }
}

#[async_trait::async_trait]
impl DesktopCapability for DryRunDesktop {
    async fn list_on_screen_windows(&self) -> Result<Vec<OnScreenWindow>> {
        self.record(DesktopCall::ListOnScreenWindows);
        self.check_available()?;

        let state = self.state.lock();
        Ok(state
            .windows
            .iter()
            .filter(|w| w.on_screen && w.role != ROLE_DESKTOP)
            .map(|w| OnScreenWindow {
                owner_pid: w.owner_pid,
                bounds: Some(w.frame),
            })
            .collect())
    }

    async fn resolve_application_identifier(&self, pid: u32) -> Option<String> {
        self.record(DesktopCall::ResolveApplicationIdentifier(pid));
        let state = self.state.lock();
        state
            .processes
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, id)| id.clone())
    }

    async fn running_processes(&self, identifier: &str) -> Result<ProcessIds> {
        self.record(DesktopCall::RunningProcesses(identifier.to_string()));
        self.check_available()?;

        let state = self.state.lock();
        Ok(state
            .processes
            .iter()
            .filter(|(_, id)| id == identifier)
            .map(|(pid, _)| *pid)
            .collect())
    }

    async fn list_windows(&self, pid: u32) -> Result<Vec<WindowHandle>> {
        self.record(DesktopCall::ListWindows(pid));
        self.check_available()?;

        let state = self.state.lock();
        if state.broken_pids.contains(&pid) {
            return Err(server_error!(capability, "процесс {} не отдаёт список окон", pid));
        }
        Ok(state
            .windows
            .iter()
            .filter(|w| w.owner_pid == Some(pid))
            .map(|w| w.handle)
            .collect())
    }

    async fn get_attribute(&self, window: WindowHandle, attribute: WindowAttribute) -> Result<AttributeValue> {
        self.record(DesktopCall::GetAttribute(window, attribute));
        self.with_window_mut(window, |w| {
            Ok(match attribute {
                WindowAttribute::Hidden => AttributeValue::Bool(w.hidden),
                WindowAttribute::Minimized => AttributeValue::Bool(w.minimized),
                WindowAttribute::Role => AttributeValue::Text(w.role.clone()),
                WindowAttribute::Size => AttributeValue::Size(w.frame.size()),
                WindowAttribute::Position => AttributeValue::Position(w.frame.origin()),
            })
        })
    }

    async fn set_attribute(&self, window: WindowHandle, value: AttributeValue) -> Result<()> {
        self.record(DesktopCall::SetAttribute(window, value.clone()));
        self.with_window_mut(window, |w| {
            if w.fail_mutations {
                return Err(server_error!(capability, "окно {} отклонило изменение", window));
            }
            match value {
                AttributeValue::Size(Size { width, height }) => {
                    info!("[DRY RUN] Размер окна {}: {:.0}x{:.0}", window, width, height);
                    w.frame.width = width;
                    w.frame.height = height;
                }
                AttributeValue::Position(Point { x, y }) => {
                    info!("[DRY RUN] Положение окна {}: ({:.0}, {:.0})", window, x, y);
                    w.frame.x = x;
                    w.frame.y = y;
                }
                other => {
                    return Err(server_error!(capability, "атрибут {:?} нельзя изменить", other))
                }
            }
            Ok(())
        })
    }

    async fn displays(&self) -> Result<Vec<Display>> {
        self.record(DesktopCall::Displays);
        self.check_available()?;
        Ok(self.state.lock().displays.clone())
    }
}
