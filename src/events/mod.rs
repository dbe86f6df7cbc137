pub mod command;
pub mod window;

pub use command::Command;
pub use window::{AppWindowEntry, Point, Rect, Size, WindowFrameSpec, XValue};
