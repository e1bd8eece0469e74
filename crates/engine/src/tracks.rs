use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use basedrop::{Handle, Shared, SharedCell};
use looper_transport::{LooperError, SampleBuffer, TRACK_COUNT};

type Slot = Option<SampleBuffer>;

/// Sentinel stored in `master_len` while no loop exists.
const NO_LOOP: usize = 0;

struct TrackSlot {
    buffer: SharedCell<Slot>,
    enabled: AtomicBool,
    /// `f32` gain stored as raw bits.
    gain: AtomicU32,
}

impl TrackSlot {
    fn new(handle: &Handle) -> Self {
        Self {
            buffer: SharedCell::new(Shared::new(handle, None)),
            enabled: AtomicBool::new(true),
            gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    fn is_populated(&self) -> bool {
        self.buffer.get().is_some()
    }
}

/// Read-only view of a committed track buffer.
///
/// Holds a reference count on the buffer rather than a copy. If the slot is
/// replaced or cleared while the view is alive, the view keeps reading the old
/// data.
#[derive(Clone)]
pub struct TrackBuffer(Shared<Slot>);

impl Deref for TrackBuffer {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        // Only constructed from populated slots.
        match &*self.0 {
            Some(buffer) => buffer,
            None => unreachable!("TrackBuffer built from an empty slot"),
        }
    }
}

impl std::fmt::Debug for TrackBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (**self).fmt(f)
    }
}

/// The four track slots plus the master loop length.
///
/// Control attributes are single atomic words. Buffers are swapped in whole
/// through a `SharedCell`, so the output callback sees either the old buffer
/// or the new one, never a partial write. Old buffers are released through the
/// `basedrop` collector that issued `handle`.
pub struct TrackStore {
    slots: [TrackSlot; TRACK_COUNT],
    master_len: AtomicUsize,
    handle: Handle,
}

impl TrackStore {
    pub fn new(handle: &Handle) -> Self {
        Self {
            slots: std::array::from_fn(|_| TrackSlot::new(handle)),
            master_len: AtomicUsize::new(NO_LOOP),
            handle: handle.clone(),
        }
    }

    fn slot(&self, track: usize) -> Result<&TrackSlot, LooperError> {
        self.slots.get(track).ok_or(LooperError::InvalidTrack(track))
    }

    /// Fails with `InvalidTrack` unless `track` is in `0..TRACK_COUNT`.
    pub fn check_index(&self, track: usize) -> Result<(), LooperError> {
        self.slot(track).map(|_| ())
    }

    /// Frame count every populated track matches, if any track was recorded.
    pub fn master_len(&self) -> Option<usize> {
        match self.master_len.load(Ordering::Acquire) {
            NO_LOOP => None,
            len => Some(len),
        }
    }

    pub fn set_enabled(&self, track: usize, enabled: bool) -> Result<(), LooperError> {
        self.slot(track)?.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_enabled(&self, track: usize) -> Result<bool, LooperError> {
        Ok(self.slot(track)?.enabled.load(Ordering::Relaxed))
    }

    /// Store a gain clamped to [0.0, 1.0]. NaN is treated as silence.
    pub fn set_gain(&self, track: usize, gain: f32) -> Result<(), LooperError> {
        let gain = if gain.is_nan() { 0.0 } else { gain.clamp(0.0, 1.0) };
        self.slot(track)?
            .gain
            .store(gain.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn gain(&self, track: usize) -> Result<f32, LooperError> {
        Ok(self.slot(track)?.gain())
    }

    pub fn is_populated(&self, track: usize) -> Result<bool, LooperError> {
        Ok(self.slot(track)?.is_populated())
    }

    /// Number of tracks holding a buffer.
    pub fn populated_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_populated()).count()
    }

    /// Drop the track's buffer. Clearing the last populated track removes the
    /// master loop.
    pub fn clear(&self, track: usize) -> Result<(), LooperError> {
        self.slot(track)?
            .buffer
            .set(Shared::new(&self.handle, None));

        if self.populated_count() == 0 {
            self.master_len.store(NO_LOOP, Ordering::Release);
        }
        Ok(())
    }

    /// Publish a conformed buffer into a slot.
    ///
    /// `master_len` becomes the loop length when none exists yet. The length
    /// is stored before the buffer so the mixer never sees a buffer without a
    /// loop to play it against.
    pub fn commit(
        &self,
        track: usize,
        buffer: SampleBuffer,
        master_len: usize,
    ) -> Result<(), LooperError> {
        let slot = self.slot(track)?;
        debug_assert_eq!(buffer.frames(), master_len);

        if self.master_len().is_none() {
            self.master_len.store(master_len, Ordering::Release);
        }
        slot.buffer.set(Shared::new(&self.handle, Some(buffer)));
        Ok(())
    }

    /// Borrow the committed buffer of a track without copying it.
    pub fn snapshot(&self, track: usize) -> Result<Option<TrackBuffer>, LooperError> {
        let shared = self.slot(track)?.buffer.get();
        Ok(shared.is_some().then(|| TrackBuffer(shared)))
    }

    /// Enabled, populated tracks with their gains, in track order.
    pub fn audible(&self) -> Vec<(TrackBuffer, f32)> {
        let mut sources = Vec::with_capacity(TRACK_COUNT);
        self.for_each_audible(|buffer, gain| sources.push((buffer, gain)));
        sources
    }

    /// Visit every enabled, populated track. Allocation-free; safe to call
    /// from the output callback.
    pub fn for_each_audible(&self, mut f: impl FnMut(TrackBuffer, f32)) {
        for slot in &self.slots {
            if !slot.enabled.load(Ordering::Relaxed) {
                continue;
            }
            let shared = slot.buffer.get();
            if shared.is_some() {
                f(TrackBuffer(shared), slot.gain());
            }
        }
    }
}
