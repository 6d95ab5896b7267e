#[cfg(feature = "chromium")]
pub mod chromium;
pub mod config;
pub mod panel;
pub mod session;
