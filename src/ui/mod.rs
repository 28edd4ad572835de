pub mod input_metrics;
pub mod layout;
pub mod render;
pub mod transcript;
