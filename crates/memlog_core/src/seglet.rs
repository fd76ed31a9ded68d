//! Fixed-size memory blocks and the pool that issues them.
//!
//! A [`Seglet`] is the unit of allocation for segment memory. The
//! [`SegletAllocator`] preallocates all seglets up front and hands them out
//! by value: a caller that holds a `Seglet` owns it exclusively, and the only
//! way to release one is to move it back into the pool. Double-release and
//! use-after-free are therefore unrepresentable.

use crate::config::LogConfig;
use crate::error::{LogError, LogResult};
use parking_lot::Mutex;

/// Reservation class a seglet is drawn from.
///
/// The emergency class guarantees that privileged callers (log cleaning,
/// crash-recovery replay) can obtain seglets even when ordinary allocation is
/// exhausted. Ordinary segment growth uses [`SegletClass::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegletClass {
    /// Ordinary allocations.
    Default,
    /// Reserved capacity for cleaning and recovery.
    Emergency,
}

/// A fixed-size block of segment memory.
///
/// Owned by exactly one segment while in use; returned to the
/// [`SegletAllocator`] when the segment releases it.
#[derive(Debug)]
pub struct Seglet {
    id: u32,
    class: SegletClass,
    data: Box<[u8]>,
}

impl Seglet {
    fn new(id: u32, class: SegletClass, size: usize) -> Self {
        Self {
            id,
            class,
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Returns the pool-assigned identity of this seglet.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the reservation class this seglet was drawn from.
    #[must_use]
    pub const fn class(&self) -> SegletClass {
        self.class
    }

    /// Returns the seglet size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the seglet has zero size.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the seglet's memory.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[derive(Debug, Default)]
struct FreeLists {
    default: Vec<Seglet>,
    emergency: Vec<Seglet>,
}

impl FreeLists {
    fn list(&mut self, class: SegletClass) -> &mut Vec<Seglet> {
        match class {
            SegletClass::Default => &mut self.default,
            SegletClass::Emergency => &mut self.emergency,
        }
    }
}

/// Pool of preallocated seglets backing all segments of one log.
///
/// Created once per process for the lifetime of the log's storage. Allocation
/// never blocks: it either succeeds atomically or fails immediately with
/// [`LogError::SegletsExhausted`].
#[derive(Debug)]
pub struct SegletAllocator {
    segment_size: u32,
    seglet_size: u32,
    total: usize,
    free: Mutex<FreeLists>,
}

impl SegletAllocator {
    /// Creates a pool carved from `config.log_total_bytes` of memory.
    ///
    /// The first `config.emergency_seglets` seglets fund the emergency
    /// reservation class; the rest go to the default class.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidConfig`] if sizes are zero, if
    /// `segment_size` is not an exact multiple of `seglet_size`, if the pool
    /// memory is not a whole number of seglets, or if the emergency reserve
    /// exceeds the pool.
    pub fn new(config: &LogConfig) -> LogResult<Self> {
        if config.seglet_size == 0 || config.segment_size == 0 {
            return Err(LogError::invalid_config(
                "segment and seglet sizes must be nonzero",
            ));
        }
        if config.segment_size % config.seglet_size != 0 {
            return Err(LogError::invalid_config(format!(
                "segment size {} is not a multiple of seglet size {}",
                config.segment_size, config.seglet_size
            )));
        }
        if config.log_total_bytes % config.seglet_size as usize != 0 {
            return Err(LogError::invalid_config(format!(
                "pool memory {} is not a whole number of {}-byte seglets",
                config.log_total_bytes, config.seglet_size
            )));
        }

        let total = config.log_total_bytes / config.seglet_size as usize;
        if config.emergency_seglets > total {
            return Err(LogError::invalid_config(format!(
                "emergency reserve of {} seglets exceeds pool of {}",
                config.emergency_seglets, total
            )));
        }

        let seglet_size = config.seglet_size as usize;
        let mut free = FreeLists::default();
        for id in 0..total {
            let class = if id < config.emergency_seglets {
                SegletClass::Emergency
            } else {
                SegletClass::Default
            };
            free.list(class)
                .push(Seglet::new(id as u32, class, seglet_size));
        }

        Ok(Self {
            segment_size: config.segment_size,
            seglet_size: config.seglet_size,
            total,
            free: Mutex::new(free),
        })
    }

    /// Returns the seglet size this pool was configured with.
    #[must_use]
    pub const fn seglet_size(&self) -> u32 {
        self.seglet_size
    }

    /// Returns the segment size this pool was configured with.
    #[must_use]
    pub const fn segment_size(&self) -> u32 {
        self.segment_size
    }

    /// Returns the number of seglets backing one full segment.
    #[must_use]
    pub const fn seglets_per_segment(&self) -> usize {
        (self.segment_size / self.seglet_size) as usize
    }

    /// Returns the total number of seglets in the pool.
    #[must_use]
    pub const fn total_seglets(&self) -> usize {
        self.total
    }

    /// Returns the number of free seglets in `class`.
    #[must_use]
    pub fn free_seglets(&self, class: SegletClass) -> usize {
        let mut free = self.free.lock();
        free.list(class).len()
    }

    /// Returns the number of seglets currently issued to segments.
    #[must_use]
    pub fn allocated_seglets(&self) -> usize {
        let free = self.free.lock();
        self.total - free.default.len() - free.emergency.len()
    }

    /// Allocates exactly `count` seglets from `class`.
    ///
    /// The allocation is atomic: on failure nothing is issued. Returned
    /// seglets carry no physical-order guarantee; their logical order within
    /// a segment is the order of this vector.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::SegletsExhausted`] if `class` has fewer than
    /// `count` free seglets.
    pub fn allocate(&self, class: SegletClass, count: usize) -> LogResult<Vec<Seglet>> {
        let mut free = self.free.lock();
        let list = free.list(class);
        if list.len() < count {
            return Err(LogError::SegletsExhausted {
                class,
                requested: count,
                available: list.len(),
            });
        }
        let at = list.len() - count;
        Ok(list.split_off(at))
    }

    /// Returns a seglet to its reservation class for reissue.
    pub fn release(&self, seglet: Seglet) {
        let mut free = self.free.lock();
        free.list(seglet.class()).push(seglet);
    }
}
