//! Exposition of the latest snapshot and delivery to the Pushgateway.

pub mod collector;
pub mod gateway;
pub mod host;

pub use self::collector::{MetricRegistry, SnapshotCollector, HOST_LABEL};
pub use self::gateway::{GatewayClient, MetricsSink};
pub use self::host::resolve_host;
