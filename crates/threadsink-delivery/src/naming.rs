//! Stable identity strings for stats grouping and persisted state.
//!
//! Both formatters return owned strings, so concurrent workers and drivers
//! can format names without sharing scratch buffers.

/// Formats the stats-instance string that groups metrics for one driver:
/// `"<kind>,<discriminator>"`.
pub fn stats_instance(kind: &str, discriminator: &str) -> String {
    format!("{kind},{discriminator}")
}

/// Formats the persisted-state key for one driver:
/// `"<kind>.<user-name-or-discriminator>"`.
///
/// The key is stable across reloads so persisted sequence numbers and
/// counters reattach to the same logical destination. Two unnamed
/// instances with identical discriminators produce the same key; callers
/// running multiple instances of one kind against the same target must
/// set an explicit name to keep their persisted state apart.
pub fn persist_name(kind: &str, explicit_name: Option<&str>, discriminator: &str) -> String {
    match explicit_name {
        Some(name) => format!("{kind}.{name}"),
        None => format!("{kind}.{discriminator}"),
    }
}
