//! Desktop capability: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the
//! external window system: listing on-screen windows, resolving process
//! identity, reading window attributes and writing size/position.
//! It MUST NOT decide which windows to touch or how geometry is computed;
//! that belongs to the enumerator and the frame applier.

mod dry_run;
mod r#trait;
mod x11;

pub use self::r#trait::{
    create_desktop, AttributeValue, DesktopCapability, Display, WindowAttribute, WindowHandle,
    ROLE_DESKTOP,
};

#[cfg(test)]
pub use self::dry_run::{DesktopCall, DryRunDesktop, FakeWindow};
