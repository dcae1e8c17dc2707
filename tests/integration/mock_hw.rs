//! In-memory doubles for the non-modem ports: firmware file, flash,
//! persisted state, camera, wall clock and event sink.

#![allow(dead_code)]

use smartcam::app::events::AppEvent;
use smartcam::app::ports::{
    EventSink, FirmwareStore, FlashWriter, PersistedState, PhotoSource, StatePort, StorageError,
    WallClock,
};
use smartcam::ota::flash::{FlashError, FlashManager};

// ── Firmware file ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemStore {
    pub data: Vec<u8>,
    pub creates: usize,
    /// Fail every append once this many bytes are stored.
    pub full_at: Option<usize>,
}

impl FirmwareStore for MemStore {
    fn create(&mut self) -> Result<(), StorageError> {
        self.creates += 1;
        self.data.clear();
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.full_at.is_some_and(|cap| self.data.len() + data.len() > cap) {
            return Err(StorageError::Full);
        }
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn len(&self) -> Result<u32, StorageError> {
        Ok(self.data.len() as u32)
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, StorageError> {
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

// ── Flash ─────────────────────────────────────────────────────

/// Wraps the host [`FlashManager`] and can be told to accept one byte
/// less than offered on every write.
#[derive(Default)]
pub struct TestFlash {
    pub inner: FlashManager,
    pub short_writes: bool,
    pub aborts: usize,
    pub begins: usize,
}

impl TestFlash {
    pub fn short() -> Self {
        Self {
            short_writes: true,
            ..Self::default()
        }
    }

    pub fn image(&self) -> &[u8] {
        self.inner.image()
    }
}

impl FlashWriter for TestFlash {
    fn begin(&mut self, size: u32) -> Result<(), FlashError> {
        self.begins += 1;
        self.inner.begin(size)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError> {
        if self.short_writes && !data.is_empty() {
            return self.inner.write(&data[..data.len() - 1]);
        }
        self.inner.write(data)
    }

    fn finalize(&mut self) -> Result<(), FlashError> {
        self.inner.finalize()
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.inner.abort();
    }
}

// ── Persisted state ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemState {
    pub saved: Vec<PersistedState>,
    pub fail: bool,
}

impl MemState {
    pub fn last(&self) -> Option<&PersistedState> {
        self.saved.last()
    }
}

impl StatePort for MemState {
    fn load_state(&self) -> Result<PersistedState, StorageError> {
        Ok(self.saved.last().cloned().unwrap_or_default())
    }

    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::IoError);
        }
        self.saved.push(state.clone());
        Ok(())
    }
}

// ── Camera, clock, sink ───────────────────────────────────────

/// Hands out the queued frames, then nothing.
#[derive(Debug, Default)]
pub struct FakeCamera {
    pub frames: Vec<Vec<u8>>,
}

impl FakeCamera {
    pub fn with_frame(frame: &[u8]) -> Self {
        Self {
            frames: vec![frame.to_vec()],
        }
    }
}

impl PhotoSource for FakeCamera {
    fn capture(&mut self) -> Option<Vec<u8>> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.remove(0))
        }
    }
}

/// 2026-10-16 12:00:00 UTC.
pub const NOON_UTC: i64 = 1_792_152_000;

#[derive(Debug, Clone, Copy)]
pub struct FixedWallClock(pub i64);

impl Default for FixedWallClock {
    fn default() -> Self {
        Self(NOON_UTC)
    }
}

impl WallClock for FixedWallClock {
    fn unix_secs(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
