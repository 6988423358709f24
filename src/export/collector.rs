use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::record::{Schema, Snapshot};

/// Constant label carrying the host identifier on every gauge.
pub const HOST_LABEL: &str = "host";

/// Latest snapshot shared between the publisher and the collect path.
type Current = Arc<Mutex<Option<Snapshot>>>;

/// Prometheus collector exposing the current snapshot as one gauge per field.
///
/// Descriptors are fixed at construction from a single [`Schema`]. Collection
/// holds the snapshot lock for the whole read so a scrape never mixes values
/// from two snapshots.
#[derive(Clone)]
pub struct SnapshotCollector {
    schema: Schema,
    gauges: Vec<Gauge>,
    current: Current,
}

impl SnapshotCollector {
    fn new(schema: Schema, host: &str, current: Current) -> Result<Self> {
        let gauges = schema
            .fields()
            .iter()
            .map(|field| {
                Gauge::with_opts(
                    Opts::new(*field, format!("vdbench {} interval value.", field))
                        .const_label(HOST_LABEL, host),
                )
                .with_context(|| format!("creating gauge {field}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            gauges,
            current,
        })
    }
}

impl Collector for SnapshotCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.iter().flat_map(|g| g.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let current = self.current.lock();
        let Some(snapshot) = current.as_ref() else {
            return Vec::new();
        };
        if snapshot.schema() != self.schema {
            return Vec::new();
        }

        let mut families = Vec::with_capacity(self.gauges.len());
        for (gauge, value) in self.gauges.iter().zip(snapshot.values()) {
            gauge.set(*value);
            families.extend(gauge.collect());
        }
        families
    }
}

/// Registry holding the descriptor set for the committed schema and the
/// latest snapshot.
pub struct MetricRegistry {
    schema: Schema,
    registry: Registry,
    collector: SnapshotCollector,
    current: Current,
}

impl MetricRegistry {
    /// Build the descriptor set for `schema`, labelled with `host`.
    pub fn new(schema: Schema, host: &str) -> Result<Self> {
        let current: Current = Arc::new(Mutex::new(None));
        let collector = SnapshotCollector::new(schema, host, Arc::clone(&current))?;

        let registry = Registry::new();
        registry
            .register(Box::new(collector.clone()))
            .context("registering snapshot collector")?;

        Ok(Self {
            schema,
            registry,
            collector,
            current,
        })
    }

    /// Schema the descriptor set was built from.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// All metric descriptors, one per schema field.
    pub fn describe(&self) -> Vec<Desc> {
        self.collector.desc().into_iter().cloned().collect()
    }

    /// Replace the current snapshot wholesale.
    pub fn replace(&self, snapshot: Snapshot) {
        *self.current.lock() = Some(snapshot);
    }

    /// Copy of the current snapshot, if one has been published.
    pub fn current(&self) -> Option<Snapshot> {
        self.current.lock().clone()
    }

    /// Collect the current snapshot as metric families.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render the current snapshot in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.gather(), &mut buffer)
            .context("encoding metrics")?;
        Ok(buffer)
    }
}
