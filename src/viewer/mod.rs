//! Terminal frame-sequence player with Kitty Graphics Protocol
//!
//! Layout:
//!   rows 0..term_rows-1 : frame image viewport (cover-fit)
//!   row term_rows-1     : status bar
//!
//! Scroll model:
//!   Key scrolling moves a pixel offset through a virtual region sized
//!   `frame_count * rows_per_frame * cell_h` plus one viewport height. The
//!   offset maps to a target frame index; the displayed index eases toward
//!   the target a fraction per tick, so held keys play the sequence as a
//!   smooth animation instead of jumping.
//!
//! Loading:
//!   Frames are fetched and decoded by a small worker pool. The scheduler on
//!   this thread caps outstanding fetches; the draw path puts the frame under
//!   the cursor at the front of the queue and seeds its neighbors behind it.
//!
//! Kitty response suppression:
//!   All Kitty Graphics Protocol commands use `q=2` (suppress all responses).
//!   Without this, error responses (e.g. ENOENT from oversized images) are
//!   delivered as APC sequences that crossterm misparses as key events,
//!   causing phantom scrolling. `q=2` suppresses both OK and error responses.
//!   Since the player never reads Kitty responses, this is always safe.

mod input;
mod state;
mod terminal;

use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::{
    event::{self, Event},
    terminal as crossterm_terminal,
};
use log::{debug, info};
use std::thread;
use std::time::{Duration, Instant};

use crate::anim::{Interpolator, ScrollMapper};
use crate::config::Config;
use crate::fetch::{self, FetchOutcome, FetchRequest};
use crate::frames::{FrameStatus, FrameStore};
use crate::manifest::FrameManifest;
use crate::sched::LoadScheduler;

use input::{Action, InputAccumulator, map_key_event};
use state::{ExitReason, Layout, LoadedFrames, ViewState};

/// Run the terminal player against `<base>/frames/`.
pub fn run(base: String, config: &Config) -> anyhow::Result<()> {
    terminal::check_tty()?;

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(30)))
        .build()
        .into();

    // 1. Fetch the manifest before touching the terminal, so failures print
    //    as ordinary errors.
    let manifest = FrameManifest::fetch(&agent, &base)?;
    let frame_count = manifest.count();

    // 2. ターミナルサイズを先に取得してビューポートを確定
    let winsize = crossterm_terminal::window_size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    let (term_cols, term_rows) = (winsize.columns, winsize.rows);
    let (pixel_w, pixel_h) = (winsize.width, winsize.height);

    if pixel_w == 0 || pixel_h == 0 {
        anyhow::bail!(
            "terminal pixel size {}x{} is zero — Kitty graphics requires non-zero pixel dimensions",
            pixel_w, pixel_h
        );
    }

    // 3. raw mode + alternate screen (maintained across resizes)
    let mut guard = terminal::RawGuard::enter()?;

    let mut layout = state::compute_layout(term_cols, term_rows, pixel_w, pixel_h);

    // Decoded frames survive a resize; terminal-side copies do not.
    let mut store = FrameStore::new(frame_count);
    let mut sched = LoadScheduler::new(config.cache.load_concurrency);
    let mut interp = Interpolator::new();
    let mut state = ViewState { y_offset: 0, base };
    let mut booted = false;

    // Outer loop: each iteration builds a fresh layout + worker pool
    // (initial + resize)
    'outer: loop {
        let (_, vp_h) = state::vp_dims(&layout);
        let region_px =
            frame_count as u32 * config.viewer.rows_per_frame * layout.cell_h as u32 + vp_h;
        let mut mapper = ScrollMapper::new(frame_count, region_px, vp_h);
        state.y_offset = state.y_offset.min(mapper.max_offset());

        let mut loaded = LoadedFrames::new();

        // 4. thread::scope — fetch workers + inner event loop
        let exit = thread::scope(|s| -> anyhow::Result<ExitReason> {
            let (req_tx, req_rx) = unbounded::<FetchRequest>();
            let (res_tx, res_rx) = unbounded::<FetchOutcome>();
            fetch::spawn_workers(s, config.cache.load_concurrency, &agent, &req_rx, &res_tx);
            // Workers hold clones; dropping ours lets recv() fail if the pool
            // ever dies.
            drop(res_tx);
            drop(req_rx);

            if !booted {
                booted = true;
                boot_first_batch(
                    config, &manifest, &mut store, &mut sched, &req_tx, &res_rx,
                )?;
            }

            // Vim-style number prefix accumulator
            let mut acc = InputAccumulator::new();
            // Flash message (e.g., "frame 7 unavailable"), cleared on next keypress
            let mut flash_msg: Option<String> = None;

            // Initial draw: ease toward whatever the carried offset maps to.
            if let Some(target) = mapper.target_for(state.y_offset) {
                interp.retarget(target);
            }
            interp.invalidate();
            terminal::clear_screen()?;

            // Inner event loop
            let mut dirty = true;
            let mut last_render = Instant::now();

            loop {
                // Drain fetch results into the store; every completed load can
                // push the cache over capacity, so evict right after.
                while let Ok(outcome) = res_rx.try_recv() {
                    apply_outcome(outcome, &mut store, &mut sched, &mut interp, &mut dirty);
                }
                let on_screen = interp.displayed().min(frame_count - 1);
                for victim in store.evict(config.cache.capacity, on_screen) {
                    loaded.remove(victim);
                }
                dispatch_ready(&mut sched, &mut store, &manifest, &req_tx);

                let timeout = if dirty {
                    config.viewer.frame_budget.saturating_sub(last_render.elapsed())
                } else if sched.dispatched() > 0 {
                    // Keep draining results while loads are in flight.
                    Duration::from_millis(50)
                } else {
                    Duration::from_secs(86400)
                };

                if event::poll(timeout)? {
                    let ev = event::read()?;
                    debug!("event: {:?}", ev);

                    match ev {
                        Event::Key(key_event) => {
                            // Clear flash message on any keypress
                            let had_flash = flash_msg.is_some();
                            flash_msg = None;

                            let max_y = mapper.max_offset();
                            let scroll_step = config.viewer.scroll_step * layout.cell_h as u32;
                            let half_page =
                                (layout.image_rows as u32 / 2).max(1) * layout.cell_h as u32;
                            let mut moved = false;

                            match map_key_event(key_event, &mut acc) {
                                Some(Action::Quit) => {
                                    return Ok(ExitReason::Quit);
                                }

                                Some(Action::CancelInput) => {
                                    draw_status(&layout, &state, &store, &interp, None, None)?;
                                }

                                Some(Action::Digit) => {
                                    draw_status(&layout, &state, &store, &interp, acc.peek(), None)?;
                                }

                                Some(Action::ScrollDown(count)) => {
                                    state.y_offset =
                                        (state.y_offset + count * scroll_step).min(max_y);
                                    moved = true;
                                }
                                Some(Action::ScrollUp(count)) => {
                                    state.y_offset =
                                        state.y_offset.saturating_sub(count * scroll_step);
                                    moved = true;
                                }
                                Some(Action::HalfPageDown(count)) => {
                                    state.y_offset =
                                        (state.y_offset + count * half_page).min(max_y);
                                    moved = true;
                                }
                                Some(Action::HalfPageUp(count)) => {
                                    state.y_offset =
                                        state.y_offset.saturating_sub(count * half_page);
                                    moved = true;
                                }

                                Some(Action::JumpToTop) => {
                                    state.y_offset = 0;
                                    moved = true;
                                }
                                Some(Action::JumpToBottom) => {
                                    state.y_offset = max_y;
                                    moved = true;
                                }
                                Some(Action::JumpToFrame(n)) => {
                                    // 1-based on the status bar, 0-based inside.
                                    let frame = (n as usize).saturating_sub(1);
                                    state.y_offset = mapper.offset_for(frame);
                                    moved = true;
                                }

                                None => {
                                    // Unknown key: reset accumulator
                                    if acc.is_active() {
                                        acc.reset();
                                        draw_status(&layout, &state, &store, &interp, None, None)?;
                                    } else if had_flash {
                                        draw_status(&layout, &state, &store, &interp, None, None)?;
                                    }
                                }
                            }

                            if moved {
                                debug!(
                                    "scroll: y_offset={} max={max_y} target={:?}",
                                    state.y_offset,
                                    mapper.target_for(state.y_offset)
                                );
                                if let Some(target) = mapper.target_for(state.y_offset) {
                                    interp.retarget(target);
                                    dirty = true;
                                }
                            }
                        }

                        Event::FocusLost => {
                            debug!("focus lost: pausing animation");
                            mapper.set_visible(false);
                        }
                        Event::FocusGained => {
                            debug!("focus gained: resuming animation");
                            mapper.set_visible(true);
                            if let Some(target) = mapper.target_for(state.y_offset) {
                                interp.retarget(target);
                                dirty = true;
                            }
                        }

                        Event::Resize(new_cols, new_rows) => {
                            // Settle the worker pool before tearing it down so
                            // no frame is stranded in Loading.
                            while sched.dispatched() > 0 {
                                let outcome = res_rx
                                    .recv()
                                    .map_err(|_| anyhow::anyhow!("fetch workers exited early"))?;
                                let mut ignored = false;
                                apply_outcome(
                                    outcome, &mut store, &mut sched, &mut interp, &mut ignored,
                                );
                            }
                            return Ok(ExitReason::Resize { new_cols, new_rows });
                            // req_tx dropped → workers exit → scope joins
                        }

                        _ => {}
                    }
                    continue;
                }

                // poll timeout → frame budget elapsed, run one animation tick
                if dirty {
                    // tick 直前に追加 drain: event::poll() のブロック中に worker が
                    // 完了した結果を回収し、描画スキップを減らす。
                    while let Ok(outcome) = res_rx.try_recv() {
                        apply_outcome(outcome, &mut store, &mut sched, &mut interp, &mut dirty);
                    }

                    let tick = interp.tick();
                    for victim in store.evict(config.cache.capacity, tick.rounded) {
                        loaded.remove(victim);
                    }
                    let frame = tick.rounded.min(frame_count - 1);
                    if tick.needs_draw {
                        match store.status(frame) {
                            FrameStatus::Loaded => {
                                draw_frame(
                                    frame, &layout, &state, &mut store, &mut loaded, &mut interp,
                                    acc.peek(),
                                )?;
                                enqueue_neighbors(&mut sched, &store, frame);
                            }
                            FrameStatus::Idle => {
                                // Not even queued yet: load it ahead of any
                                // backlog, keep the previous frame on screen.
                                sched.enqueue_front(frame);
                            }
                            FrameStatus::Loading => {
                                // Completion re-arms the loop via wants_frame.
                            }
                            FrameStatus::Error => {
                                flash_msg = Some(format!("frame {} unavailable", frame + 1));
                                draw_status(
                                    &layout, &state, &store, &interp,
                                    acc.peek(), flash_msg.as_deref(),
                                )?;
                                interp.mark_drawn(frame);
                            }
                        }
                        dispatch_ready(&mut sched, &mut store, &manifest, &req_tx);
                    }
                    dirty = !tick.settled;
                }
                last_render = Instant::now();
            }
            // req_tx dropped here → workers recv() get Err → workers exit → scope joins
        })?;

        match exit {
            ExitReason::Quit => break 'outer,
            ExitReason::Resize { new_cols, new_rows } => {
                debug!("resize: {new_cols}x{new_rows}, rebuilding layout");
                let new_winsize = crossterm_terminal::window_size()?;
                layout = state::compute_layout(
                    new_cols,
                    new_rows,
                    new_winsize.width,
                    new_winsize.height,
                );
                // Terminal-side images are wiped; decoded frames are kept.
                terminal::delete_all_images()?;
                interp.invalidate();
                // continue 'outer → new mapper + new scope + new workers
            }
        }
    }

    guard.cleanup();
    Ok(())
}

/// Load the opening frames before the first draw, so initial scrubbing does
/// not start on a blank screen.
fn boot_first_batch(
    config: &Config,
    manifest: &FrameManifest,
    store: &mut FrameStore,
    sched: &mut LoadScheduler,
    req_tx: &Sender<FetchRequest>,
    res_rx: &Receiver<FetchOutcome>,
) -> anyhow::Result<()> {
    let batch = config.cache.first_batch.min(store.count());
    info!("boot: loading first {batch} frames");
    for index in 0..batch {
        sched.enqueue(index);
    }
    dispatch_ready(sched, store, manifest, req_tx);

    let pending = |store: &FrameStore| {
        (0..batch)
            .filter(|&i| matches!(store.status(i), FrameStatus::Idle | FrameStatus::Loading))
            .count()
    };
    let mut interp = Interpolator::new(); // boot has no animation yet
    while pending(store) > 0 {
        terminal::draw_boot_progress(batch - pending(store), batch)?;
        let outcome = res_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("fetch workers exited during boot"))?;
        let mut ignored = false;
        apply_outcome(outcome, store, sched, &mut interp, &mut ignored);
        dispatch_ready(sched, store, manifest, req_tx);
    }
    info!("boot: done, {} of {batch} loaded", store.loaded_count());

    // Queue the rest of the sequence behind the first batch; the pool drains
    // it in the background while the user scrolls.
    for index in batch..store.count() {
        sched.enqueue(index);
    }
    dispatch_ready(sched, store, manifest, req_tx);
    Ok(())
}

/// Fold one worker result into the store and free its scheduler slot.
fn apply_outcome(
    outcome: FetchOutcome,
    store: &mut FrameStore,
    sched: &mut LoadScheduler,
    interp: &mut Interpolator,
    dirty: &mut bool,
) {
    sched.on_complete();
    match outcome.result {
        Ok(image) => {
            store.complete_load(outcome.index, image);
            // The frame under the cursor was skipped while it loaded: redraw.
            if interp.wants_frame(outcome.index) && interp.request() {
                *dirty = true;
            }
        }
        // Worker already logged the error with its URL.
        Err(_) => store.fail_load(outcome.index),
    }
}

/// Pump queued indices into the worker channel while slots are free.
fn dispatch_ready(
    sched: &mut LoadScheduler,
    store: &mut FrameStore,
    manifest: &FrameManifest,
    req_tx: &Sender<FetchRequest>,
) {
    sched.pump(|index| {
        if !store.begin_load(index) {
            return false; // already loading, loaded, or errored
        }
        req_tx
            .send(FetchRequest { index, url: manifest.frame_url(index) })
            .is_ok()
    });
}

/// Seed loads around a drawn frame: one behind, two ahead, then two behind.
fn enqueue_neighbors(sched: &mut LoadScheduler, store: &FrameStore, frame: usize) {
    let candidates = [
        frame.checked_sub(1),
        Some(frame + 1),
        Some(frame + 2),
        frame.checked_sub(2),
    ];
    for neighbor in candidates.into_iter().flatten() {
        if neighbor < store.count() && store.status(neighbor) == FrameStatus::Idle {
            sched.enqueue(neighbor);
        }
    }
}

fn draw_frame(
    frame: usize,
    layout: &Layout,
    state: &ViewState,
    store: &mut FrameStore,
    loaded: &mut LoadedFrames,
    interp: &mut Interpolator,
    acc_peek: Option<u32>,
) -> anyhow::Result<()> {
    let frame_count = store.count();
    let cached = store.loaded_count();
    let (vp_w, vp_h) = state::vp_dims(layout);
    if let Some(image) = store.image(frame) {
        let id = loaded.ensure_loaded(frame, image)?;
        let crop = state::cover_crop(image.width, image.height, vp_w, vp_h);
        // Ordering: delete old placements, then place new (both fast; the
        // slow transmit happened in ensure_loaded).
        loaded.delete_placements()?;
        terminal::place_frame(id, &crop, layout)?;
        terminal::draw_status_bar(
            layout, &state.base, frame, frame_count, cached, acc_peek, None,
        )?;
        interp.mark_drawn(frame);
    }
    Ok(())
}

fn draw_status(
    layout: &Layout,
    state: &ViewState,
    store: &FrameStore,
    interp: &Interpolator,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> anyhow::Result<()> {
    let frame = interp.displayed().min(store.count().saturating_sub(1));
    terminal::draw_status_bar(
        layout, &state.base, frame, store.count(), store.loaded_count(), acc_peek, flash,
    )?;
    Ok(())
}
