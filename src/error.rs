use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Некорректные данные команды: {0}")]
    Decode(String),

    #[error("Приложение не найдено: {0}")]
    Lookup(String),

    #[error("Ошибка доступа к окнам: {0}")]
    Capability(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Превышено время ожидания: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! server_error {
    (decode, $($arg:tt)*) => {
        $crate::error::ServerError::Decode(format!($($arg)*))
    };
    (lookup, $($arg:tt)*) => {
        $crate::error::ServerError::Lookup(format!($($arg)*))
    };
    (capability, $($arg:tt)*) => {
        $crate::error::ServerError::Capability(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::ServerError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::ServerError::ServiceUnavailable(format!($($arg)*))
    };
    (timeout, $($arg:tt)*) => {
        $crate::error::ServerError::Timeout(format!($($arg)*))
    };
}
