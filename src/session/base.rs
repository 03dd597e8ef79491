use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 一次抓取周期内独占的浏览器页面
///
/// 所有等待都在 `wait_for_visible` 中发生并受超时约束。
#[async_trait]
pub trait PageSession: Send + Sync {
    /// 可交互行的句柄
    type Handle: Send + Sync;

    /// 当前 DOM 的 HTML，每次调用都反映调用时的页面状态
    async fn rendered_document(&self) -> Result<String>;

    /// 按属性选择器查找可点击的行，保持文档顺序
    async fn locate_interactive_rows(&self, selector: &str) -> Result<Vec<Self::Handle>>;

    /// 先把指针移到元素上再以脚本方式点击，避开遮挡元素
    async fn click(&self, handle: &Self::Handle) -> Result<()>;

    /// 等待 id 对应的元素可见，超时返回 `TimeoutError`
    async fn wait_for_visible(&self, id: &str, timeout: Duration) -> Result<()>;

    /// 点击面板的关闭按钮（如果存在）
    async fn dismiss(&self, selector: &str) -> Result<()>;

    /// 释放浏览器，可重复调用
    async fn close(&mut self) -> Result<()>;
}

/// 为一个周期打开并导航到目标页面的会话
#[async_trait]
pub trait SessionOpener: Send + Sync {
    type Session: PageSession;

    async fn open(&self, target_url: &str) -> Result<Self::Session>;
}
