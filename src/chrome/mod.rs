//! Chrome (CDP) バックエンド

mod session;

pub use session::ChromeSession;
