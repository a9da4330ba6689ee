//! Opaque per-check settings with typed access.

use std::time::Duration;
use toml::Value;

/// The settings bag a check reads its knobs from.
///
/// Wraps the service's raw `[services.health_check.settings]` table.
/// Accessors return the caller's default when a key is absent or holds a
/// value of the wrong type; unknown keys are simply never read. The
/// per-check help listing is the schema.
#[derive(Debug, Clone, Default)]
pub struct CheckSettings {
    values: toml::Table,
}

impl CheckSettings {
    /// Wrap a raw settings table.
    #[must_use]
    pub fn new(values: toml::Table) -> Self {
        Self { values }
    }

    /// An empty settings bag; every lookup yields its default.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Boolean setting, or `default`.
    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Integer setting, or `default`.
    #[must_use]
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(Value::as_integer)
            .unwrap_or(default)
    }

    /// String setting, or `default`.
    #[must_use]
    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Duration setting, or `default`.
    ///
    /// Accepts humantime strings (`"500ms"`, `"1s"`) or a plain integer
    /// number of seconds.
    #[must_use]
    pub fn duration_or(&self, key: &str, default: Duration) -> Duration {
        match self.values.get(key) {
            Some(Value::String(s)) => humantime::parse_duration(s).unwrap_or(default),
            Some(Value::Integer(secs)) => u64::try_from(*secs)
                .map(Duration::from_secs)
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Port setting, or the target's own port when absent or out of range.
    #[must_use]
    pub fn port_or(&self, key: &str, target_port: u16) -> u16 {
        u16::try_from(self.int_or(key, i64::from(target_port))).unwrap_or(target_port)
    }
}
