pub mod desktop;
pub mod dispatcher;
pub mod frame_applier;
pub mod presentation;
pub mod receiver;
pub mod window_enumerator;

pub use desktop::create_desktop;
pub use dispatcher::SerialExecutor;
pub use presentation::create_presenter;
pub use receiver::CommandReceiver;
