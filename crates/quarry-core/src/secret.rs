use std::fmt;

/// API key or token that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Read `key` from the environment; empty values count as unset.
    #[must_use]
    pub fn from_env(key: &str) -> Option<Self> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_redact() {
        let secret = Secret::new("pa-123456");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(secret.expose(), "pa-123456");
    }

    #[test]
    #[serial_test::serial]
    fn blank_env_value_is_unset() {
        unsafe { std::env::set_var("QUARRY_TEST_SECRET", "  ") };
        assert!(Secret::from_env("QUARRY_TEST_SECRET").is_none());
        unsafe { std::env::set_var("QUARRY_TEST_SECRET", "k") };
        assert_eq!(
            Secret::from_env("QUARRY_TEST_SECRET").map(|s| s.expose().to_owned()),
            Some("k".to_owned())
        );
        unsafe { std::env::remove_var("QUARRY_TEST_SECRET") };
    }
}
