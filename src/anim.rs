//! Scroll-to-frame mapping and the interpolated render loop state.
//!
//! Pure logic, no I/O. The viewer feeds scroll offsets into `ScrollMapper`,
//! pushes the resulting target into `Interpolator`, and runs one `tick` per
//! frame budget while the interpolator stays scheduled.

/// Per-tick smoothing: the gap to the target shrinks by this fraction.
pub const LERP_FACTOR: f32 = 0.15;

/// The loop settles (stops rescheduling) once the gap is at most this.
pub const SETTLE_EPSILON: f32 = 0.01;

// ---------------------------------------------------------------------------
// ScrollMapper
// ---------------------------------------------------------------------------

/// Maps a scroll offset inside the animation region to a target frame index.
///
/// `progress = clamp(offset / scrollable, 0, 1)`,
/// `target = round(progress * (frame_count - 1))`, where `scrollable` is the
/// region extent minus one viewport height, floored at 1.
///
/// The mapper is visibility-gated: while the region is not visible (the
/// terminal lost focus), `target_for` yields nothing and no draws happen.
pub struct ScrollMapper {
    frame_count: usize,
    scrollable: u32,
    visible: bool,
}

impl ScrollMapper {
    /// `region_px` is the total scrollable extent of the animation region,
    /// `viewport_px` the height of the visible window within it.
    pub fn new(frame_count: usize, region_px: u32, viewport_px: u32) -> Self {
        Self {
            frame_count,
            scrollable: region_px.saturating_sub(viewport_px).max(1),
            visible: true,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Largest useful scroll offset (progress 1.0).
    pub fn max_offset(&self) -> u32 {
        self.scrollable
    }

    /// Scroll offset whose target is `frame` (inverse of `target_for`,
    /// used by frame jumps). Out-of-range frames map to the last offset.
    pub fn offset_for(&self, frame: usize) -> u32 {
        if self.frame_count <= 1 {
            return 0;
        }
        let frame = frame.min(self.frame_count - 1);
        let progress = frame as f32 / (self.frame_count - 1) as f32;
        (progress * self.scrollable as f32).round() as u32
    }

    /// Target frame index for a scroll offset, or None while not visible.
    pub fn target_for(&self, y_offset: u32) -> Option<f32> {
        if !self.visible || self.frame_count == 0 {
            return None;
        }
        let progress = (y_offset as f32 / self.scrollable as f32).clamp(0.0, 1.0);
        Some((progress * (self.frame_count - 1) as f32).round())
    }
}

// ---------------------------------------------------------------------------
// Interpolator
// ---------------------------------------------------------------------------

/// Whether a render tick is pending. At most one tick is ever scheduled;
/// requesting a render while one is pending is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Scheduled,
}

/// Outcome of one interpolation tick.
pub struct Tick {
    /// The integral frame index the interpolated position rounds to.
    pub rounded: usize,
    /// True when `rounded` differs from the last frame actually drawn.
    pub needs_draw: bool,
    /// True when the loop has converged and unscheduled itself.
    pub settled: bool,
}

/// Exponential interpolation of the displayed frame index toward the target.
pub struct Interpolator {
    current: f32,
    target: f32,
    last_drawn: Option<usize>,
    phase: RenderPhase,
}

impl Interpolator {
    pub fn new() -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            last_drawn: None,
            phase: RenderPhase::Idle,
        }
    }

    /// Update the target and request a render. Returns true when the caller
    /// must arm the tick (the phase moved Idle → Scheduled); false while a
    /// tick is already pending.
    pub fn retarget(&mut self, target: f32) -> bool {
        self.target = target;
        self.request()
    }

    /// Request a render without changing the target.
    pub fn request(&mut self) -> bool {
        if self.phase == RenderPhase::Scheduled {
            return false;
        }
        self.phase = RenderPhase::Scheduled;
        true
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Rounded current position — the frame that is (or should be) on
    /// screen; the cache evictor protects this index.
    pub fn displayed(&self) -> usize {
        self.current.round().max(0.0) as usize
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// True when a finished load for `index` warrants a redraw: the frame
    /// under the cursor was skipped earlier because it was not loaded yet.
    pub fn wants_frame(&self, index: usize) -> bool {
        self.displayed() == index && self.last_drawn != Some(index)
    }

    /// Record a successful draw. Skipped draws leave `last_drawn` alone so
    /// the next tick (or settle) retries the frame.
    pub fn mark_drawn(&mut self, index: usize) {
        self.last_drawn = Some(index);
    }

    /// Forget the drawn frame (after a resize the surface is stale).
    pub fn invalidate(&mut self) {
        self.last_drawn = None;
    }

    /// One interpolation step. Converges geometrically: with a constant
    /// target the gap shrinks by `LERP_FACTOR` per tick, and the loop
    /// unschedules itself once the gap is within `SETTLE_EPSILON`.
    pub fn tick(&mut self) -> Tick {
        self.current += (self.target - self.current) * LERP_FACTOR;
        let rounded = self.displayed();
        let needs_draw = self.last_drawn != Some(rounded);
        let settled = (self.target - self.current).abs() <= SETTLE_EPSILON;
        if settled {
            self.phase = RenderPhase::Idle;
        }
        Tick {
            rounded,
            needs_draw,
            settled,
        }
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- mapper ----

    #[test]
    fn midpoint_of_three_frames_is_frame_one() {
        // progress 0.5 over 3 frames: round(0.5 * 2) = 1.
        let mapper = ScrollMapper::new(3, 1000 + 100, 100);
        assert_eq!(mapper.target_for(500), Some(1.0));
    }

    #[test]
    fn full_scroll_hits_last_frame_exactly() {
        let mapper = ScrollMapper::new(10, 2000, 200);
        assert_eq!(mapper.target_for(1800), Some(9.0));
    }

    #[test]
    fn overscroll_clamps_to_last_frame() {
        let mapper = ScrollMapper::new(10, 2000, 200);
        assert_eq!(mapper.target_for(u32::MAX), Some(9.0));
        assert_eq!(mapper.target_for(0), Some(0.0));
    }

    #[test]
    fn target_always_within_frame_range() {
        let mapper = ScrollMapper::new(7, 1234, 321);
        for y in (0..5000).step_by(13) {
            let t = mapper.target_for(y).unwrap();
            assert!((0.0..=6.0).contains(&t), "offset {y} -> {t}");
        }
    }

    #[test]
    fn degenerate_region_does_not_divide_by_zero() {
        // Region smaller than the viewport: scrollable floors at 1.
        let mapper = ScrollMapper::new(5, 50, 100);
        assert_eq!(mapper.target_for(0), Some(0.0));
        assert_eq!(mapper.target_for(1), Some(4.0));
    }

    #[test]
    fn hidden_mapper_yields_nothing() {
        let mut mapper = ScrollMapper::new(10, 2000, 200);
        mapper.set_visible(false);
        assert_eq!(mapper.target_for(900), None);
        mapper.set_visible(true);
        assert!(mapper.target_for(900).is_some());
    }

    #[test]
    fn offset_for_round_trips_through_target() {
        let mapper = ScrollMapper::new(60, 5000, 800);
        for frame in [0usize, 1, 29, 58, 59] {
            let y = mapper.offset_for(frame);
            assert_eq!(mapper.target_for(y), Some(frame as f32), "frame {frame}");
        }
        assert_eq!(mapper.offset_for(999), mapper.offset_for(59));
    }

    // ---- interpolator ----

    #[test]
    fn gap_shrinks_monotonically_until_settle() {
        let mut interp = Interpolator::new();
        assert!(interp.retarget(40.0));
        let mut prev_gap = f32::MAX;
        let mut ticks = 0;
        loop {
            let t = interp.tick();
            let gap = (40.0 - interp.current).abs();
            assert!(gap < prev_gap, "gap must shrink every tick");
            prev_gap = gap;
            ticks += 1;
            assert!(ticks < 500, "must settle");
            if t.settled {
                break;
            }
        }
        assert_eq!(interp.phase(), RenderPhase::Idle);
        assert!(prev_gap <= SETTLE_EPSILON);
        assert_eq!(interp.displayed(), 40);
    }

    #[test]
    fn at_most_one_tick_scheduled() {
        let mut interp = Interpolator::new();
        assert!(interp.retarget(5.0));
        // Already scheduled: further requests are no-ops.
        assert!(!interp.retarget(6.0));
        assert!(!interp.request());
        assert_eq!(interp.target(), 6.0, "target still updates");
    }

    #[test]
    fn settled_loop_can_be_rearmed() {
        let mut interp = Interpolator::new();
        interp.retarget(0.0);
        let t = interp.tick();
        assert!(t.settled);
        assert!(interp.retarget(3.0), "idle loop arms again");
    }

    #[test]
    fn needs_draw_only_on_index_change() {
        let mut interp = Interpolator::new();
        interp.retarget(1.0);
        let t = interp.tick();
        assert_eq!(t.rounded, 0, "first step of 1.0 gap rounds to 0");
        assert!(t.needs_draw, "nothing drawn yet");
        interp.mark_drawn(t.rounded);
        let t = interp.tick();
        if t.rounded == 0 {
            assert!(!t.needs_draw, "same frame needs no redraw");
        }
    }

    #[test]
    fn skipped_draw_is_retried() {
        let mut interp = Interpolator::new();
        interp.retarget(2.0);
        let mut saw_retry = false;
        for _ in 0..100 {
            let t = interp.tick();
            // Never mark_drawn: the frame stays wanted.
            if t.needs_draw && t.settled {
                saw_retry = true;
                break;
            }
            if t.settled {
                break;
            }
        }
        assert!(saw_retry, "an undrawn frame still needs a draw at settle");
        assert!(interp.wants_frame(2));
    }

    #[test]
    fn invalidate_forces_redraw_of_current_frame() {
        let mut interp = Interpolator::new();
        interp.retarget(0.0);
        let t = interp.tick();
        interp.mark_drawn(t.rounded);
        assert!(!interp.wants_frame(0));
        interp.invalidate();
        assert!(interp.wants_frame(0));
    }
}
