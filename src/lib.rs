//! flipbook: scroll-driven frame-sequence player for Kitty-protocol terminals.
//!
//! A sequence of images published as `<base>/frames/manifest.json` plus the
//! frame files it lists is played back by scrolling: the scroll position maps
//! to a frame index, the displayed frame eases toward it, and frames are
//! fetched lazily around the playhead with a bounded in-memory cache.

pub mod anim;
pub mod config;
pub mod fetch;
pub mod frames;
pub mod manifest;
pub mod sched;
pub mod viewer;
