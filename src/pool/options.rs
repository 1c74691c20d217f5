// src/pool/options.rs

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_MAX_SIZE: usize = 10;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Raw pool sizing as it appears in configuration.
///
/// Values are kept signed and optional so that nonsense input can be
/// corrected rather than rejected; see [`PoolOptions::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PoolOptions {
    #[serde(default)]
    pub max_size: Option<i64>,

    #[serde(default)]
    pub preallocated_size: Option<i64>,

    #[serde(default)]
    pub max_queue_size: Option<i64>,
}

/// Effective, validated pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_size: usize,
    pub preallocated_size: usize,
    pub max_queue_size: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolOptions::default().resolve()
    }
}

impl PoolLimits {
    /// Apply the same corrections as [`PoolOptions::resolve`] to limits built
    /// in code: a zero `max_size` becomes [`DEFAULT_MAX_SIZE`] and a
    /// `preallocated_size` above `max_size` becomes 10% of `max_size`.
    pub fn normalized(self) -> PoolLimits {
        let max_size = if self.max_size == 0 {
            warn!(fallback = DEFAULT_MAX_SIZE, "pool max_size of 0; using default");
            DEFAULT_MAX_SIZE
        } else {
            self.max_size
        };
        let preallocated_size = if self.preallocated_size > max_size {
            let fallback = default_preallocated(max_size);
            warn!(
                requested = self.preallocated_size,
                max_size,
                fallback,
                "pool preallocated_size exceeds max_size; using default"
            );
            fallback
        } else {
            self.preallocated_size
        };
        PoolLimits {
            max_size,
            preallocated_size,
            max_queue_size: self.max_queue_size,
        }
    }
}

/// 10% of `max_size`, rounded half away from zero.
fn default_preallocated(max_size: usize) -> usize {
    (max_size as f64 * 0.1).round() as usize
}

impl PoolOptions {
    /// Apply the corrected-default rules:
    ///
    /// - `max_size`: missing or `<= 0` becomes [`DEFAULT_MAX_SIZE`].
    /// - `preallocated_size`: missing, negative, or larger than `max_size`
    ///   becomes 10% of `max_size`.
    /// - `max_queue_size`: missing or negative becomes
    ///   [`DEFAULT_MAX_QUEUE_SIZE`]; zero is allowed and disables queueing.
    pub fn resolve(&self) -> PoolLimits {
        let max_size = match self.max_size {
            Some(n) if n > 0 => n as usize,
            Some(n) => {
                warn!(requested = n, fallback = DEFAULT_MAX_SIZE, "invalid pool max_size; using default");
                DEFAULT_MAX_SIZE
            }
            None => DEFAULT_MAX_SIZE,
        };

        let fallback_prealloc = default_preallocated(max_size);
        let preallocated_size = match self.preallocated_size {
            Some(n) if n >= 0 && (n as usize) <= max_size => n as usize,
            Some(n) => {
                warn!(
                    requested = n,
                    max_size,
                    fallback = fallback_prealloc,
                    "invalid pool preallocated_size; using default"
                );
                fallback_prealloc
            }
            None => fallback_prealloc,
        };

        let max_queue_size = match self.max_queue_size {
            Some(n) if n >= 0 => n as usize,
            Some(n) => {
                warn!(
                    requested = n,
                    fallback = DEFAULT_MAX_QUEUE_SIZE,
                    "invalid pool max_queue_size; using default"
                );
                DEFAULT_MAX_QUEUE_SIZE
            }
            None => DEFAULT_MAX_QUEUE_SIZE,
        };

        PoolLimits {
            max_size,
            preallocated_size,
            max_queue_size,
        }
    }
}
