//! Frame registry: per-frame load state, decoded image cache, LRU eviction.
//!
//! One `FrameEntry` per manifest index, built once at boot and never resized.
//! All mutation happens on the viewer thread; worker threads only produce
//! `FrameImage` values that the viewer feeds back in via `complete_load`.
//!
//! State machine per entry:
//!   Idle → Loading (begin_load, exactly once per in-flight fetch)
//!   Loading → Loaded (complete_load) | Error (fail_load)
//!   Loaded → Idle (evict)
//! An Error entry stays Error for the rest of the run — failed frames are
//! not retried (see DESIGN.md).

use log::{debug, trace};

/// A decoded frame, ready for transmission to the terminal.
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

struct FrameEntry {
    status: FrameStatus,
    /// Present iff `status == Loaded`.
    image: Option<FrameImage>,
    /// Monotonic use stamp for LRU ordering. 0 = never used.
    last_used: u64,
}

impl FrameEntry {
    fn idle() -> Self {
        Self {
            status: FrameStatus::Idle,
            image: None,
            last_used: 0,
        }
    }
}

/// The frame table plus the counters that hang off it.
///
/// Indexing is fail-fast: all public methods panic on an out-of-range index.
/// Callers clamp (the draw path clamps the interpolated index; the prefetch
/// path range-checks neighbors before enqueueing).
pub struct FrameStore {
    entries: Vec<FrameEntry>,
    /// Advances on every touch; gives a total LRU order without clock reads.
    clock: u64,
    loaded: usize,
}

impl FrameStore {
    pub fn new(count: usize) -> Self {
        Self {
            entries: (0..count).map(|_| FrameEntry::idle()).collect(),
            clock: 0,
            loaded: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn status(&self, index: usize) -> FrameStatus {
        self.entries[index].status
    }

    /// Number of entries currently holding a decoded image.
    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    /// Borrow the decoded image and stamp it as just used.
    pub fn image(&mut self, index: usize) -> Option<&FrameImage> {
        self.clock += 1;
        let clock = self.clock;
        let entry = &mut self.entries[index];
        if entry.image.is_some() {
            entry.last_used = clock;
        }
        entry.image.as_ref()
    }

    /// Transition Idle → Loading. Returns false if the entry is already
    /// loading, loaded, or errored — the dedup invariant: at most one fetch
    /// is ever started per Idle→Loading transition.
    pub fn begin_load(&mut self, index: usize) -> bool {
        let entry = &mut self.entries[index];
        if entry.status != FrameStatus::Idle {
            return false;
        }
        entry.status = FrameStatus::Loading;
        trace!("frame {index}: idle -> loading");
        true
    }

    /// Transition Loading → Loaded with the decoded image.
    pub fn complete_load(&mut self, index: usize, image: FrameImage) {
        self.clock += 1;
        let clock = self.clock;
        let entry = &mut self.entries[index];
        if entry.status != FrameStatus::Loading {
            // A result for an entry we no longer expect one for; the state
            // machine has no path here, but dropping it is always safe.
            debug!("frame {index}: discarding load result in state {:?}", entry.status);
            return;
        }
        entry.status = FrameStatus::Loaded;
        entry.image = Some(image);
        entry.last_used = clock;
        self.loaded += 1;
        trace!("frame {index}: loading -> loaded ({} cached)", self.loaded);
    }

    /// Transition Loading → Error. Non-fatal; the frame is simply unavailable.
    pub fn fail_load(&mut self, index: usize) {
        let entry = &mut self.entries[index];
        if entry.status != FrameStatus::Loading {
            return;
        }
        entry.status = FrameStatus::Error;
        debug!("frame {index}: loading -> error");
    }

    /// Evict least-recently-used frames until at most `capacity` remain
    /// loaded. The `protected` index (the frame currently on screen) is
    /// skipped and the next-oldest victim taken instead, so the bound holds
    /// after every call. Returns the evicted indices so the caller can free
    /// terminal-side copies too.
    pub fn evict(&mut self, capacity: usize, protected: usize) -> Vec<usize> {
        if self.loaded <= capacity {
            return Vec::new();
        }

        let mut loaded: Vec<(u64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == FrameStatus::Loaded)
            .map(|(i, e)| (e.last_used, i))
            .collect();
        loaded.sort_unstable();

        let mut evicted = Vec::new();
        for (_, index) in loaded {
            if self.loaded <= capacity {
                break;
            }
            if index == protected {
                continue;
            }
            let entry = &mut self.entries[index];
            entry.status = FrameStatus::Idle;
            entry.image = None;
            entry.last_used = 0;
            self.loaded -= 1;
            evicted.push(index);
        }
        if !evicted.is_empty() {
            debug!("evicted {} frames, {} cached", evicted.len(), self.loaded);
        }
        evicted
    }
}
