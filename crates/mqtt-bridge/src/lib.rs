pub mod config;
pub mod source;

pub use config::MqttConfig;
pub use source::{MqttSource, MqttSourceError};
