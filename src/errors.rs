use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataHubError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("WebDriver command error: {0}")]
    WebDriverError(#[from] fantoccini::error::CmdError),

    /// 浏览器进程启动或页面导航失败
    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Timed out after {timeout_ms}ms waiting for #{target}")]
    TimeoutError { target: String, timeout_ms: u64 },

    /// 元素已脱离文档或无法点击
    #[error("Interaction error: {0}")]
    InteractionError(String),

    #[error("Malformed page: {0}")]
    MalformedPageError(String),

    #[error("Snapshot store error on {path}: {source}")]
    StoreIOError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl DataHubError {
    /// 单行详情抓取中可以跳过的错误
    pub fn is_row_recoverable(&self) -> bool {
        matches!(
            self,
            DataHubError::TimeoutError { .. }
                | DataHubError::InteractionError(_)
                | DataHubError::MalformedPageError(_)
                | DataHubError::WebDriverError(_)
        )
    }

    pub(crate) fn store(path: &std::path::Path, source: std::io::Error) -> Self {
        DataHubError::StoreIOError {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DataHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_errors_are_recoverable_cycle_errors_are_not() {
        let timeout = DataHubError::TimeoutError {
            target: "panel".to_string(),
            timeout_ms: 10_000,
        };
        assert!(timeout.is_row_recoverable());
        assert!(DataHubError::InteractionError("stale".into()).is_row_recoverable());
        assert!(!DataHubError::SessionError("no browser".into()).is_row_recoverable());
        assert!(!DataHubError::ConfigError("bad".into()).is_row_recoverable());
    }

    #[test]
    fn timeout_message_names_target() {
        let err = DataHubError::TimeoutError {
            target: "detalle-simbolo".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Timed out after 250ms waiting for #detalle-simbolo");
    }
}
