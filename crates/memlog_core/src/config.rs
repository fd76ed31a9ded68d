//! Log memory configuration.

/// Default segment size: 8 MiB.
pub const DEFAULT_SEGMENT_SIZE: u32 = 8 * 1024 * 1024;

/// Default seglet size: 64 KiB.
pub const DEFAULT_SEGLET_SIZE: u32 = 64 * 1024;

/// Configuration for the log's segment memory.
///
/// Passed explicitly to [`SegletAllocator::new`](crate::SegletAllocator::new);
/// there is no process-global configuration. `segment_size` must be an exact
/// multiple of `seglet_size`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Logical size of a full segment, in bytes.
    pub segment_size: u32,

    /// Size of each fixed allocation block (seglet), in bytes.
    pub seglet_size: u32,

    /// Total memory backing the seglet pool, in bytes.
    pub log_total_bytes: usize,

    /// Seglets held back for the emergency reservation class, guaranteeing
    /// that cleaning and recovery can open a segment even when the default
    /// pool is exhausted.
    pub emergency_seglets: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            seglet_size: DEFAULT_SEGLET_SIZE,
            log_total_bytes: 64 * 1024 * 1024,
            emergency_seglets: (DEFAULT_SEGMENT_SIZE / DEFAULT_SEGLET_SIZE) as usize,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment size.
    #[must_use]
    pub const fn segment_size(mut self, size: u32) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the seglet size.
    #[must_use]
    pub const fn seglet_size(mut self, size: u32) -> Self {
        self.seglet_size = size;
        self
    }

    /// Sets the total pool memory.
    #[must_use]
    pub const fn log_total_bytes(mut self, bytes: usize) -> Self {
        self.log_total_bytes = bytes;
        self
    }

    /// Sets the emergency seglet reserve.
    #[must_use]
    pub const fn emergency_seglets(mut self, count: usize) -> Self {
        self.emergency_seglets = count;
        self
    }

    /// Returns the number of seglets backing one full segment.
    #[must_use]
    pub const fn seglets_per_segment(&self) -> usize {
        (self.segment_size / self.seglet_size) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.segment_size, DEFAULT_SEGMENT_SIZE);
        assert_eq!(config.seglet_size, DEFAULT_SEGLET_SIZE);
        assert_eq!(config.seglets_per_segment(), 128);
    }

    #[test]
    fn builder_pattern() {
        let config = LogConfig::new()
            .segment_size(66560)
            .seglet_size(256)
            .log_total_bytes(66560)
            .emergency_seglets(0);

        assert_eq!(config.segment_size, 66560);
        assert_eq!(config.seglet_size, 256);
        assert_eq!(config.seglets_per_segment(), 260);
    }
}
