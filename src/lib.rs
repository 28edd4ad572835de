pub mod api;
pub mod app;
pub mod config;
pub mod state;
pub mod terminal;
pub mod text;
pub mod ui;
pub mod util;

#[cfg(test)]
pub mod test_support;
