use crate::config::Config;
use crate::error::Result;
use crate::events::{Point, Rect, Size};
use smallvec::SmallVec;
use std::fmt;

/// Роль окна, которое никогда не изменяется (рабочий стол)
pub const ROLE_DESKTOP: &str = "desktop";

/// Непрозрачный идентификатор окна во внешней системе
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Окно из списка видимых окон; любое поле может отсутствовать
#[derive(Debug, Clone, PartialEq)]
pub struct OnScreenWindow {
    pub owner_pid: Option<u32>,
    pub bounds: Option<Rect>,
}

/// Дисплей и его видимая область (без панелей)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Display {
    pub frame: Rect,
    pub visible_frame: Rect,
    pub primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAttribute {
    Hidden,
    Minimized,
    Role,
    Size,
    Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Text(String),
    Size(Size),
    Position(Point),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_size(&self) -> Option<Size> {
        match self {
            AttributeValue::Size(value) => Some(*value),
            _ => None,
        }
    }
}

pub type ProcessIds = SmallVec<[u32; 4]>;

/// Внешняя возможность чтения и изменения окон других процессов.
///
/// Вызовы не обязаны быть потокобезопасными на стороне системы: все
/// обращения идут из единственного последовательного исполнителя.
#[async_trait::async_trait]
pub trait DesktopCapability: Send + Sync {
    async fn list_on_screen_windows(&self) -> Result<Vec<OnScreenWindow>>;

    async fn resolve_application_identifier(&self, pid: u32) -> Option<String>;

    async fn running_processes(&self, identifier: &str) -> Result<ProcessIds>;

    async fn list_windows(&self, pid: u32) -> Result<Vec<WindowHandle>>;

    async fn get_attribute(&self, window: WindowHandle, attribute: WindowAttribute) -> Result<AttributeValue>;

    async fn set_attribute(&self, window: WindowHandle, value: AttributeValue) -> Result<()>;

    async fn displays(&self) -> Result<Vec<Display>>;
}

/// Factory function to create a desktop backend based on config and the dry_run flag
pub fn create_desktop(config: &Config, dry_run: bool) -> Result<Box<dyn DesktopCapability>> {
    if dry_run || config.desktop.backend == "dry_run" {
        Ok(Box::new(super::dry_run::DryRunDesktop::with_sample_apps()))
    } else {
        Ok(Box::new(super::x11::X11Desktop::new(config.call_timeout())))
    }
}
