//! Fetch workers: download and decode frame images off the viewer thread.
//!
//! A fixed pool of workers shares one request channel; the viewer's scheduler
//! keeps at most `concurrency` requests outstanding, so the pool size equals
//! the concurrency ceiling. Results flow back over a second channel and the
//! viewer drains them with `try_recv` — the viewer thread never blocks.
//!
//! Teardown: the viewer drops the request sender when its scope ends; each
//! worker's `recv()` then fails and the thread exits, and any result still in
//! flight is discarded along with the result channel.

use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};

use crate::frames::FrameImage;

/// Per-frame response bodies larger than this are refused.
const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

pub struct FetchRequest {
    pub index: usize,
    pub url: String,
}

pub struct FetchOutcome {
    pub index: usize,
    pub result: Result<FrameImage>,
}

/// Download one frame and decode it to RGBA.
pub fn fetch_frame(agent: &ureq::Agent, url: &str) -> Result<FrameImage> {
    let mut response = agent
        .get(url)
        .call()
        .with_context(|| format!("failed to fetch {url}"))?;
    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_FRAME_BYTES)
        .read_to_vec()
        .with_context(|| format!("failed to read {url}"))?;

    let decoded = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode {url}"))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    trace!("fetched {url}: {width}x{height}, {} bytes on the wire", bytes.len());
    Ok(FrameImage {
        width,
        height,
        rgba: decoded.into_raw(),
    })
}

/// Spawn `count` fetch workers inside the viewer's thread scope.
pub fn spawn_workers<'scope, 'env>(
    scope: &'scope thread::Scope<'scope, 'env>,
    count: usize,
    agent: &ureq::Agent,
    requests: &Receiver<FetchRequest>,
    results: &Sender<FetchOutcome>,
) {
    for worker in 0..count {
        let agent = agent.clone();
        let requests = requests.clone();
        let results = results.clone();
        scope.spawn(move || {
            debug!("fetch worker {worker}: started");
            while let Ok(request) = requests.recv() {
                let FetchRequest { index, url } = request;
                let result = fetch_frame(&agent, &url);
                if let Err(e) = &result {
                    debug!("fetch worker {worker}: frame {index} failed: {e:#}");
                }
                if results.send(FetchOutcome { index, result }).is_err() {
                    break; // viewer gone
                }
            }
            debug!("fetch worker {worker}: channel closed, exiting");
        });
    }
}
