pub mod binary;
pub mod browser;
pub mod login;

pub use browser::{BrowserSession, ChromeElement, ChromePage, SessionOptions};
pub use login::interactive_login;
