use std::fs;
use std::path::Path;

/// Host label value used when no hostname can be determined.
pub const UNKNOWN_HOST: &str = "unknown";

const HOSTNAME_SOURCES: &[&str] = &["/proc/sys/kernel/hostname", "/etc/hostname"];

/// Resolves the host identifier attached to every exported gauge.
///
/// A non-empty `configured` value wins. Otherwise the kernel hostname is read
/// from procfs, then `/etc/hostname`, falling back to [`UNKNOWN_HOST`].
pub fn resolve_host(configured: Option<&str>) -> String {
    if let Some(host) = configured.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    first_hostname(HOSTNAME_SOURCES.iter().map(Path::new))
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

fn first_hostname<'a>(sources: impl IntoIterator<Item = &'a Path>) -> Option<String> {
    sources
        .into_iter()
        .filter_map(read_text_file)
        .find(|h| !h.is_empty())
}

fn read_text_file(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    Some(text.trim().to_string())
}
