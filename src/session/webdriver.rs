use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::session::base::{PageSession, SessionOpener};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use log::{debug, info, warn};
use reqwest::Client as HttpClient;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::Instant;

// 先滚动到可视区域并派发悬停事件，再用脚本点击，绕过页面上的遮挡层
const HOVER_AND_CLICK: &str = r#"
const el = arguments[0];
el.scrollIntoView({block: 'center'});
for (const type of ['mouseover', 'mouseenter', 'mousemove']) {
    el.dispatchEvent(new MouseEvent(type, {bubbles: true, cancelable: true, view: window}));
}
el.click();
"#;

/// 通过 WebDriver (chromedriver) 驱动无头 Chrome
pub struct WebDriverOpener {
    webdriver_url: String,
    headless: bool,
    poll_interval: Duration,
    http: HttpClient,
}

impl WebDriverOpener {
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(DataHubError::RequestError)?;

        Ok(Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            poll_interval: config.poll_interval,
            http,
        })
    }

    /// 确认 WebDriver 服务已就绪
    async fn check_ready(&self) -> Result<()> {
        let status_url = format!("{}/status", self.webdriver_url);
        let response = self.http.get(&status_url).send().await.map_err(|e| {
            DataHubError::SessionError(format!("WebDriver unreachable at {}: {}", status_url, e))
        })?;

        let body: Value = response.json().await?;
        let ready = body
            .get("value")
            .and_then(|v| v.get("ready"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !ready {
            return Err(DataHubError::SessionError(format!(
                "WebDriver at {} is not ready",
                self.webdriver_url
            )));
        }
        Ok(())
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut args = vec!["--disable-gpu", "--no-sandbox", "--window-size=1920,1080"];
        if self.headless {
            args.push("--headless=new");
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

#[async_trait]
impl SessionOpener for WebDriverOpener {
    type Session = WebDriverSession;

    async fn open(&self, target_url: &str) -> Result<WebDriverSession> {
        self.check_ready().await?;

        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| DataHubError::SessionError(format!("Cannot start browser: {}", e)))?;

        info!("Navigating to {}", target_url);
        if let Err(e) = client.goto(target_url).await {
            // 导航失败也要释放浏览器
            if let Err(close_err) = client.close().await {
                warn!("Failed to close browser after navigation error: {}", close_err);
            }
            return Err(DataHubError::SessionError(format!(
                "Navigation to {} failed: {}",
                target_url, e
            )));
        }

        Ok(WebDriverSession {
            client: Some(client),
            poll_interval: self.poll_interval,
        })
    }
}

pub struct WebDriverSession {
    client: Option<Client>,
    poll_interval: Duration,
}

impl WebDriverSession {
    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DataHubError::SessionError("Browser session already closed".to_string()))
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    type Handle = Element;

    async fn rendered_document(&self) -> Result<String> {
        Ok(self.client()?.source().await?)
    }

    async fn locate_interactive_rows(&self, selector: &str) -> Result<Vec<Element>> {
        let rows = self.client()?.find_all(Locator::Css(selector)).await?;
        debug!("Found {} interactive rows for {}", rows.len(), selector);
        Ok(rows)
    }

    async fn click(&self, handle: &Element) -> Result<()> {
        let element = serde_json::to_value(handle)?;
        self.client()?
            .execute(HOVER_AND_CLICK, vec![element])
            .await
            .map_err(|e| DataHubError::InteractionError(format!("Click failed: {}", e)))?;
        Ok(())
    }

    async fn wait_for_visible(&self, id: &str, timeout: Duration) -> Result<()> {
        let client = self.client()?;
        let deadline = Instant::now() + timeout;

        loop {
            // 元素可能尚未插入 DOM，找不到时继续轮询
            if let Ok(element) = client.find(Locator::Id(id)).await {
                if element.is_displayed().await.unwrap_or(false) {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(DataHubError::TimeoutError {
                    target: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn dismiss(&self, selector: &str) -> Result<()> {
        let client = self.client()?;
        for element in client.find_all(Locator::Css(selector)).await? {
            if element.is_displayed().await.unwrap_or(false) {
                self.click(&element).await?;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            debug!("Closing browser session");
            client.close().await?;
        }
        Ok(())
    }
}
