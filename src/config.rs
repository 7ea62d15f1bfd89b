// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device configuration.
//!
//! A [`Config`] is passed to [`crate::device::Device::new`].  [`Config::default`] is what
//! most callers want; [`Config::from_env`] layers environment overrides on top of it so a
//! host application can be debugged without recompiling:
//!
//! | Variable | Effect |
//! |---|---|
//! | `SLOTBOUND_ANNOTATIONS` | `0` disables debug names and markers |
//! | `SLOTBOUND_VALIDATE` | `1` checks handles on bind/draw paths, `0` skips the checks |
//! | `SLOTBOUND_MAX_PUSH_CONSTANT_WORDS` | upper bound on one push-constant call |

/// Largest constant buffer the driver can bind, in 32-bit words.
pub const MAX_CONSTANT_BUFFER_WORDS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Forward debug names and markers to the driver's annotation interface.
    pub debug_annotations: bool,
    /// Check handles on bind and draw paths and log stale ones.
    ///
    /// Stale handles always resolve to null bindings; this only controls the logging.
    pub validate_handles: bool,
    /// Pushes ending beyond this many words are dropped.
    pub max_push_constant_words: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug_annotations: true,
            validate_handles: cfg!(debug_assertions),
            max_push_constant_words: MAX_CONSTANT_BUFFER_WORDS,
        }
    }
}

impl Config {
    /// The default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("SLOTBOUND_ANNOTATIONS") {
            self.debug_annotations = v != "0";
        }
        if let Some(v) = var("SLOTBOUND_VALIDATE") {
            self.validate_handles = v == "1";
        }
        if let Some(v) = var("SLOTBOUND_MAX_PUSH_CONSTANT_WORDS") {
            match v.parse::<u32>() {
                Ok(words) => {
                    self.max_push_constant_words = words.min(MAX_CONSTANT_BUFFER_WORDS);
                }
                Err(_) => {
                    logwise::warn_sync!(
                        "Ignoring unparseable SLOTBOUND_MAX_PUSH_CONSTANT_WORDS={value}",
                        value = logwise::privacy::LogIt(&v)
                    );
                }
            }
        }
        self
    }
}
