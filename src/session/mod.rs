pub mod base;
pub mod static_page;
pub mod webdriver;

pub use base::{PageSession, SessionOpener};
pub use static_page::{StaticPageOpener, StaticPageSession};
pub use webdriver::{WebDriverOpener, WebDriverSession};
