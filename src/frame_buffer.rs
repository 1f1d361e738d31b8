use crate::error::BufferError;
use crate::frame::Frame;
use tracing::{debug, trace};

/// Fixed-capacity, index-addressed frame storage
///
/// Streaming sessions allocate a single slot that every capture reuses;
/// batch sessions allocate one slot per requested frame and fill them in
/// order. The slot vector is sized once at allocation and never grows.
#[derive(Debug)]
pub struct FrameBuffer {
    slots: Vec<Option<Frame>>,
    stats: FrameBufferStats,
}

/// Write counters for the buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBufferStats {
    /// Total frames written
    pub writes: u64,
    /// Writes that replaced a frame already in the slot
    pub overwrites: u64,
}

/// Snapshot of buffer occupancy and counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferStatsSnapshot {
    pub capacity: usize,
    pub filled_slots: usize,
    pub writes: u64,
    pub overwrites: u64,
    pub bytes_held: usize,
}

impl FrameBuffer {
    /// Pre-reserve `capacity` empty slots
    ///
    /// # Example
    /// ```
    /// use laserfence::frame_buffer::FrameBuffer;
    ///
    /// let buffer = FrameBuffer::allocate(10).unwrap();
    /// assert_eq!(buffer.capacity(), 10);
    /// ```
    pub fn allocate(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        debug!("Allocated frame buffer with {} slots", capacity);

        Ok(Self {
            slots,
            stats: FrameBufferStats::default(),
        })
    }

    /// Store `frame` at slot `index`
    pub fn write(&mut self, index: usize, frame: Frame) -> Result<(), BufferError> {
        let capacity = self.capacity();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(BufferError::Overflow { index, capacity })?;

        if slot.is_some() {
            self.stats.overwrites += 1;
            trace!("Overwriting frame buffer slot {}", index);
        }

        trace!(
            "Writing frame {} ({}x{}) to slot {}",
            frame.sequence,
            frame.width(),
            frame.height(),
            index
        );
        *slot = Some(frame);
        self.stats.writes += 1;
        Ok(())
    }

    /// Frame at slot `index`, if one has been written
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Filled slots in index order
    pub fn filled(&self) -> impl Iterator<Item = (usize, &Frame)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|frame| (index, frame)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> FrameBufferStatsSnapshot {
        let filled: Vec<&Frame> = self.slots.iter().flatten().collect();
        FrameBufferStatsSnapshot {
            capacity: self.capacity(),
            filled_slots: filled.len(),
            writes: self.stats.writes,
            overwrites: self.stats.overwrites,
            bytes_held: filled.iter().map(|frame| frame.size_bytes()).sum(),
        }
    }
}
