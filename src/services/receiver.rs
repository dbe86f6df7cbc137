use crate::error::Result;
use crate::services::dispatcher::CommandDispatcher;
use crate::{server_error, trace_if_enabled};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixDatagram;
use tracing::{error, info, warn};

const RECV_BACKOFF_BASE: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Приёмник пользовательских команд: один JSON-документ на датаграмму
pub struct CommandReceiver {
    socket_path: PathBuf,
    socket: UnixDatagram,
    dispatcher: CommandDispatcher,
    buffer_size: usize,
}

impl CommandReceiver {
    pub fn bind(socket_path: &Path, dispatcher: CommandDispatcher, buffer_size: usize) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Старый сокет от предыдущего запуска
        if socket_path.exists() {
            warn!("Удаляем оставшийся сокет {:?}", socket_path);
            std::fs::remove_file(socket_path)?;
        }

        let socket = UnixDatagram::bind(socket_path)
            .map_err(|e| server_error!(service_unavailable, "Не удалось открыть сокет {:?}: {}", socket_path, e))?;

        info!("Ожидание команд на {:?}", socket_path);

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            socket,
            dispatcher,
            buffer_size,
        })
    }

    pub async fn run(self) -> Result<()> {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut consecutive_errors = 0u32;

        loop {
            let len = match self.socket.recv(&mut buffer).await {
                Ok(len) => {
                    consecutive_errors = 0;
                    len
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let delay = recv_backoff(consecutive_errors);
                    error!("Ошибка чтения из сокета: {} (повтор через {:?})", e, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            trace_if_enabled!("Получена датаграмма ({} байт)", len);

            match parse_datagram(&buffer[..len]) {
                Ok(value) => self.dispatcher.handle(&value),
                Err(e) => error!("Некорректное сообщение: {}", e),
            }
        }
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!("Не удалось удалить сокет {:?}: {}", self.socket_path, e);
        }
    }
}

/// Пауза перед повторным чтением после `consecutive_errors` ошибок подряд
fn recv_backoff(consecutive_errors: u32) -> Duration {
    let exponent = consecutive_errors.saturating_sub(1).min(16);
    RECV_BACKOFF_BASE
        .saturating_mul(1 << exponent)
        .min(RECV_BACKOFF_MAX)
}

/// Разобрать содержимое датаграммы как JSON
pub fn parse_datagram(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::events::Rect;
    use crate::services::desktop::{DryRunDesktop, FakeWindow, WindowHandle};
    use crate::services::dispatcher::SerialExecutor;
    use crate::services::presentation::LogPresenter;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_parse_datagram() {
        let value = parse_datagram(br#"{"command":"show_window_frames"}"#).unwrap();
        assert_eq!(value["command"], "show_window_frames");
        assert!(matches!(parse_datagram(b"{not json"), Err(ServerError::Json(_))));
    }

    #[test]
    fn test_recv_backoff_grows_and_is_capped() {
        assert_eq!(recv_backoff(1), Duration::from_millis(10));
        assert_eq!(recv_backoff(2), Duration::from_millis(20));
        assert_eq!(recv_backoff(4), Duration::from_millis(80));
        assert_eq!(recv_backoff(8), Duration::from_secs(1));
        assert_eq!(recv_backoff(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_datagram_reaches_desktop() {
        let dir = std::env::temp_dir().join(format!("ucs-receiver-test-{}", std::process::id()));
        let socket_path = dir.join("receiver.sock");

        let desktop = Arc::new(
            DryRunDesktop::new()
                .with_process(5, "com.z")
                .with_window(FakeWindow::new(1, 5, Rect::new(0.0, 0.0, 300.0, 300.0))),
        );
        let (dispatcher, executor) = SerialExecutor::new(
            desktop.clone(),
            Box::new(LogPresenter::new(HashSet::new())),
            Some("self".to_string()),
        );

        let receiver = CommandReceiver::bind(&socket_path, dispatcher, 4096).unwrap();
        let receiver_handle = tokio::spawn(receiver.run());
        let executor_handle = tokio::spawn(executor.run());

        let client = UnixDatagram::unbound().unwrap();
        client.send_to(b"not json at all", &socket_path).await.unwrap();
        client
            .send_to(
                br#"{"command":"set_window_frames","frames":[{"bundle_identifier":"com.z","x":10,"y":20,"width":640,"height":480}]}"#,
                &socket_path,
            )
            .await
            .unwrap();

        let mut applied = false;
        for _ in 0..100 {
            if desktop.window_frame(WindowHandle(1)) == Some(Rect::new(10.0, 20.0, 640.0, 480.0)) {
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(applied);

        receiver_handle.abort();
        let _ = receiver_handle.await;
        let _ = executor_handle.await;
        assert!(!socket_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
