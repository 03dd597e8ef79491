use chrono::NaiveTime;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{DataHubError, Result};
use crate::scrapers::PageLayout;

pub const DEFAULT_TARGET_URL: &str = "https://www.bolsadecaracas.com/resumen-mercado/";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

pub struct Config {
    pub target_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub data_dir: String,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub schedule_times: Vec<NaiveTime>,
    pub timezone: Tz,
    pub bind_addr: String,
    pub log_file: Option<PathBuf>,
    pub layout: PageLayout,
}

impl Config {
    pub fn new() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            data_dir: "json".to_string(),
            wait_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(250),
            // 开盘后与收盘后各抓取一次
            schedule_times: vec![
                NaiveTime::from_hms_opt(9, 45, 0).unwrap_or_default(),
                NaiveTime::from_hms_opt(13, 15, 0).unwrap_or_default(),
            ],
            timezone: chrono_tz::America::Caracas,
            bind_addr: "0.0.0.0:8000".to_string(),
            log_file: Some(PathBuf::from("logs.log")),
            layout: PageLayout::default(),
        }
    }

    pub fn with_target_url(mut self, url: &str) -> Self {
        self.target_url = url.to_string();
        self
    }

    pub fn with_webdriver_url(mut self, url: &str) -> Self {
        self.webdriver_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = dir.to_string();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// 解析 "HH:MM" 格式的触发时间列表
    pub fn with_schedule(mut self, times: &[&str]) -> Result<Self> {
        let mut parsed = Vec::with_capacity(times.len());
        for t in times {
            let time = NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .map_err(|e| DataHubError::ConfigError(format!("Invalid schedule time '{}': {}", t, e)))?;
            parsed.push(time);
        }
        if parsed.is_empty() {
            return Err(DataHubError::ConfigError("Schedule needs at least one time".to_string()));
        }
        parsed.sort();
        parsed.dedup();
        self.schedule_times = parsed;
        Ok(self)
    }

    pub fn with_timezone(mut self, name: &str) -> Result<Self> {
        self.timezone = name
            .parse::<Tz>()
            .map_err(|e| DataHubError::ConfigError(format!("Unknown timezone '{}': {}", name, e)))?;
        Ok(self)
    }

    pub fn with_bind_addr(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// 空路径表示只输出到终端
    pub fn with_log_file(mut self, path: Option<&str>) -> Self {
        self.log_file = path.filter(|p| !p.is_empty()).map(PathBuf::from);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_deployment() {
        let config = Config::new();
        assert_eq!(config.data_dir, "json");
        assert_eq!(config.wait_timeout, Duration::from_millis(10_000));
        assert_eq!(config.schedule_times.len(), 2);
        assert_eq!(config.timezone, chrono_tz::America::Caracas);
    }

    #[test]
    fn schedule_is_sorted_and_deduplicated() {
        let config = Config::new().with_schedule(&["13:15", "09:45", "13:15"]).unwrap();
        let expected = vec![
            NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 15, 0).unwrap(),
        ];
        assert_eq!(config.schedule_times, expected);
    }

    #[test]
    fn bad_schedule_and_timezone_are_config_errors() {
        assert!(matches!(
            Config::new().with_schedule(&["25:99"]),
            Err(DataHubError::ConfigError(_))
        ));
        assert!(matches!(
            Config::new().with_schedule(&[]),
            Err(DataHubError::ConfigError(_))
        ));
        assert!(matches!(
            Config::new().with_timezone("Mars/Olympus"),
            Err(DataHubError::ConfigError(_))
        ));
    }

    #[test]
    fn empty_log_file_disables_file_logging() {
        assert_eq!(Config::new().log_file, Some(PathBuf::from("logs.log")));
        assert_eq!(Config::new().with_log_file(Some("")).log_file, None);
        assert_eq!(Config::new().with_log_file(None).log_file, None);
        assert_eq!(
            Config::new().with_log_file(Some("/var/log/bvc.log")).log_file,
            Some(PathBuf::from("/var/log/bvc.log"))
        );
    }

    #[test]
    fn webdriver_url_loses_trailing_slash() {
        let config = Config::new().with_webdriver_url("http://127.0.0.1:4444/");
        assert_eq!(config.webdriver_url, "http://127.0.0.1:4444");
    }
}
