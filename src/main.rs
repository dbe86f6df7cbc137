use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::desktop::DesktopCapability;
use services::{create_desktop, create_presenter, CommandReceiver, SerialExecutor};

#[derive(Parser, Debug)]
#[command(name = "user-command-server")]
#[command(about = "Сервер команд для перемещения и изменения размеров окон других приложений")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "user-command-server.toml")]
    config: String,

    /// Режим сухого запуска (эмулируемый рабочий стол вместо реальных окон)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Путь к сокету (переопределяет конфигурацию)
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(socket) = &args.socket {
        config.server.socket_path = socket.clone();
    }

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск user-command-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные окна не изменяются");
    } else if config.desktop.backend == "x11" {
        // Без доступа каждое изменение окна просто завершится ошибкой
        if let Err(e) = utils::permissions::check_automation_access() {
            warn!("Управление окнами может не работать: {}", e);
            for line in utils::permissions::get_setup_commands() {
                warn!("   {}", line);
            }
        }
    }

    // Инициализация компонентов
    let desktop: Arc<dyn DesktopCapability> = Arc::from(create_desktop(&config, args.dry_run)?);
    let presenter = create_presenter(&config);
    let (dispatcher, executor) =
        SerialExecutor::new(desktop, presenter, config.server.self_identifier.clone());
    let receiver = CommandReceiver::bind(
        &config.server.socket_path,
        dispatcher,
        config.server.max_datagram_bytes,
    )?;

    info!("Все компоненты инициализированы");

    let executor_handle = tokio::spawn(async move {
        if let Err(e) = executor.run().await {
            error!("Ошибка в SerialExecutor: {}", e);
        }
    });
    let receiver_handle = tokio::spawn(async move {
        if let Err(e) = receiver.run().await {
            error!("Ошибка в CommandReceiver: {}", e);
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Остановка приёмника закрывает очередь; исполнитель дорабатывает принятые команды
    receiver_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = receiver_handle.await;
        let _ = executor_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("user-command-server завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "full" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
