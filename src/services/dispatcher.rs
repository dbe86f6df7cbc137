use crate::error::Result;
use crate::events::{Command, WindowFrameSpec};
use crate::services::desktop::DesktopCapability;
use crate::services::frame_applier::apply_frames;
use crate::services::presentation::{Presenter, WindowFramesStore};
use crate::services::window_enumerator::enumerate_other_app_windows;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Работа, выполняемая последовательным исполнителем
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    ApplyFrames(Vec<WindowFrameSpec>),
    ShowWindowFrames,
}

/// Принимает команды от транспорта, декодирует и ставит в очередь.
///
/// Сам не обращается к окнам: всё выполняется в `SerialExecutor`.
#[derive(Clone)]
pub struct CommandDispatcher {
    jobs: mpsc::UnboundedSender<Job>,
}

impl CommandDispatcher {
    pub fn handle(&self, raw: &Value) {
        match Command::decode(raw) {
            Ok(Command::SetWindowFrames(frames)) => {
                info!("Получена команда set_window_frames ({} директив)", frames.len());
                self.schedule(Job::ApplyFrames(frames));
            }
            Ok(Command::ShowWindowFrames) => {
                info!("Получена команда show_window_frames");
                self.schedule(Job::ShowWindowFrames);
            }
            Ok(command @ Command::Unrecognized(_)) => {
                debug!("Игнорируем неизвестную команду: {}", command);
            }
            Err(e) => {
                warn!("Команда отклонена: {}", e);
            }
        }
    }

    fn schedule(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            error!("Исполнитель команд остановлен, команда потеряна");
        }
    }
}

/// Единственный контекст, который обращается к окнам и к снимку.
///
/// Задачи выполняются строго по одной в порядке поступления.
pub struct SerialExecutor {
    desktop: Arc<dyn DesktopCapability>,
    presenter: Box<dyn Presenter>,
    store: WindowFramesStore,
    configured_identifier: Option<String>,
    jobs: mpsc::UnboundedReceiver<Job>,
}

impl SerialExecutor {
    pub fn new(
        desktop: Arc<dyn DesktopCapability>,
        presenter: Box<dyn Presenter>,
        configured_identifier: Option<String>,
    ) -> (CommandDispatcher, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = Self {
            desktop,
            presenter,
            store: WindowFramesStore::new(),
            configured_identifier,
            jobs: rx,
        };
        (CommandDispatcher { jobs: tx }, executor)
    }

    /// Обрабатывать задачи, пока живы все диспетчеры
    pub async fn run(mut self) -> Result<()> {
        let self_identifier = self.resolve_self_identifier().await;
        info!(
            "Исполнитель команд запущен (собственный идентификатор: {})",
            self_identifier.as_deref().unwrap_or("неизвестен")
        );

        while let Some(job) = self.jobs.recv().await {
            self.execute(job, self_identifier.as_deref()).await;
        }

        info!("Исполнитель команд завершил работу");
        Ok(())
    }

    async fn resolve_self_identifier(&self) -> Option<String> {
        match &self.configured_identifier {
            Some(identifier) => Some(identifier.clone()),
            None => {
                self.desktop
                    .resolve_application_identifier(std::process::id())
                    .await
            }
        }
    }

    async fn execute(&mut self, job: Job, self_identifier: Option<&str>) {
        match job {
            Job::ApplyFrames(specs) => {
                let report = apply_frames(self.desktop.as_ref(), &specs).await;
                info!("set_window_frames выполнена: {}", report);
            }
            Job::ShowWindowFrames => {
                let entries = enumerate_other_app_windows(self.desktop.as_ref(), self_identifier).await;
                info!("show_window_frames: найдено {} окон", entries.len());
                self.store.replace(entries);
                self.presenter.present(&self.store);
                self.presenter.raise();
            }
        }
    }
}
