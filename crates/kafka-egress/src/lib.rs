pub mod buffer;
pub mod config;
pub mod envelope;
pub mod liveness;
pub mod spool;
pub mod writer;

pub use buffer::{ingress_channel, BufferStats, EgressBuffer, EgressError};
pub use config::EgressConfig;
pub use writer::{MockWriter, RdKafkaWriter, Writer, WriterError};
