use crate::errors::{DataHubError, Result};
use crate::session::base::{PageSession, SessionOpener};
use async_trait::async_trait;
use log::{debug, info};
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::time::Duration;

enum Source {
    Html(String),
    File(PathBuf),
}

/// 回放已保存的页面 HTML，不启动浏览器
pub struct StaticPageOpener {
    source: Source,
}

impl StaticPageOpener {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { source: Source::Html(html.into()) }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self { source: Source::File(path.into()) }
    }
}

#[async_trait]
impl SessionOpener for StaticPageOpener {
    type Session = StaticPageSession;

    async fn open(&self, target_url: &str) -> Result<StaticPageSession> {
        let html = match &self.source {
            Source::Html(html) => html.clone(),
            Source::File(path) => {
                info!("Replaying saved page {} in place of {}", path.display(), target_url);
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    DataHubError::SessionError(format!("Cannot read {}: {}", path.display(), e))
                })?
            }
        };
        Ok(StaticPageSession { html, closed: false })
    }
}

/// 静态页面没有可交互的行，详情面板永远不会出现
pub struct StaticPageSession {
    html: String,
    closed: bool,
}

impl StaticPageSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DataHubError::SessionError("Session already closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageSession for StaticPageSession {
    type Handle = ();

    async fn rendered_document(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.html.clone())
    }

    async fn locate_interactive_rows(&self, selector: &str) -> Result<Vec<()>> {
        self.ensure_open()?;
        debug!("Static page offers no live rows for {}", selector);
        Ok(Vec::new())
    }

    async fn click(&self, _handle: &()) -> Result<()> {
        Err(DataHubError::InteractionError("Static page has no live elements".to_string()))
    }

    async fn wait_for_visible(&self, id: &str, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        // 静态文档不会变化，元素存在且未隐藏即视为可见
        let selector = Selector::parse(&format!("#{}", id))
            .map_err(|e| DataHubError::MalformedPageError(format!("Bad id {}: {:?}", id, e)))?;
        let document = Html::parse_document(&self.html);
        let visible = document.select(&selector).next().is_some_and(|el| {
            let style = el.value().attr("style").unwrap_or_default().replace(' ', "");
            el.value().attr("hidden").is_none() && !style.contains("display:none")
        });
        if visible {
            Ok(())
        } else {
            Err(DataHubError::TimeoutError {
                target: id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn dismiss(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
