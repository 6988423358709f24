use std::fmt;

/// Number of leading timestamp tokens on every vdbench interval line.
pub const TIMESTAMP_TOKENS: usize = 2;

/// Field names of a raw-device (`sd=`/`wd=`) interval report, in column order.
pub const DEVICE_FIELDS: &[&str] = &[
    "io_rate",
    "mb_ps",
    "bytes",
    "read_pct",
    "resp_time",
    "read_resp",
    "write_resp",
    "read_max",
    "write_max",
    "resp_stddev",
    "q_depth",
    "cpu_total",
    "cpu_sys",
];

/// Field names of a filesystem (`fsd=`/`fwd=`) interval report, in column order.
pub const FILESYSTEM_FIELDS: &[&str] = &[
    "req_std_ops_rate",
    "req_std_ops_resp",
    "cpu_total",
    "cpu_sys",
    "read_pct",
    "read_rate",
    "read_resp",
    "write_rate",
    "write_resp",
    "read_mb_ps",
    "write_mb_ps",
    "total_mb_ps",
    "xfer_size",
    "mkdir_rate",
    "mkdir_resp",
    "rmdir_rate",
    "rmdir_resp",
    "create_rate",
    "create_resp",
    "open_rate",
    "open_resp",
    "close_rate",
    "close_resp",
    "delete_rate",
    "delete_resp",
];

/// Schema identifies which interval report layout a line carries.
///
/// The two layouts are told apart by width alone, so every width-based
/// decision in the pipeline goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    Device,
    Filesystem,
}

impl Schema {
    /// Returns both schemas in a stable order.
    pub const fn all() -> &'static [Self] {
        &[Self::Device, Self::Filesystem]
    }

    /// Returns the canonical label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Filesystem => "filesystem",
        }
    }

    /// Ordered field names for this schema.
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Device => DEVICE_FIELDS,
            Self::Filesystem => FILESYSTEM_FIELDS,
        }
    }

    /// Number of value columns.
    pub const fn len(self) -> usize {
        self.fields().len()
    }

    /// Number of whitespace-separated tokens on a data line, timestamps included.
    pub const fn token_count(self) -> usize {
        self.len() + TIMESTAMP_TOKENS
    }

    /// Resolve the schema whose value column count equals `count`.
    pub fn from_value_count(count: usize) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.len() == count)
    }

    /// Resolve the schema whose full line width equals `count`.
    pub fn from_token_count(count: usize) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.token_count() == count)
    }

    /// Position of `name` in this schema's field list.
    pub fn index_of(self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| *f == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
