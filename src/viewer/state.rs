//! Application state: layout, viewport, cover-fit cropping, terminal-side images.

use std::collections::HashMap;
use std::io;

use super::terminal;
use crate::frames::FrameImage;

// ---------------------------------------------------------------------------
// Layout / ViewState
// ---------------------------------------------------------------------------

pub(super) struct Layout {
    pub image_cols: u16, // 画像領域の幅 (= term_cols)
    pub image_rows: u16, // 画像領域の高さ (= term_rows - 1)
    pub status_row: u16, // ステータスバーの行 (= term_rows - 1)
    pub cell_w: u16,     // ピクセル/セル（幅）
    pub cell_h: u16,     // ピクセル/セル（高さ）
}

pub(super) struct ViewState {
    pub y_offset: u32, // スクロールオフセット（ピクセル）
    pub base: String,
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16, pixel_w: u16, pixel_h: u16) -> Layout {
    let image_cols = term_cols;
    let image_rows = term_rows.saturating_sub(1);
    let status_row = term_rows.saturating_sub(1);
    let cell_w = if term_cols > 0 { (pixel_w / term_cols).max(1) } else { 1 };
    let cell_h = if term_rows > 0 { (pixel_h / term_rows).max(1) } else { 1 };
    Layout { image_cols, image_rows, status_row, cell_w, cell_h }
}

/// Viewport dimensions in pixels (the area frames are drawn into).
pub(super) fn vp_dims(layout: &Layout) -> (u32, u32) {
    let vp_w = layout.image_cols as u32 * layout.cell_w as u32;
    let vp_h = layout.image_rows as u32 * layout.cell_h as u32;
    (vp_w, vp_h)
}

// ---------------------------------------------------------------------------
// Cover-fit crop
// ---------------------------------------------------------------------------

/// Source rectangle within a frame image, in image pixels.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct CropRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Centered crop of the image that matches the viewport's aspect ratio.
///
/// The crop covers the viewport: the image is notionally scaled up until both
/// viewport dimensions are filled, then the overflow on the long axis is cut
/// off evenly from both sides. Degenerate dimensions fall back to the full
/// image.
pub(super) fn cover_crop(img_w: u32, img_h: u32, vp_w: u32, vp_h: u32) -> CropRect {
    if img_w == 0 || img_h == 0 || vp_w == 0 || vp_h == 0 {
        return CropRect { x: 0, y: 0, w: img_w.max(1), h: img_h.max(1) };
    }
    let img_ratio = img_w as f64 / img_h as f64;
    let vp_ratio = vp_w as f64 / vp_h as f64;
    if img_ratio > vp_ratio {
        // Image wider than viewport: crop left and right.
        let w = ((img_h as f64 * vp_ratio).round() as u32).clamp(1, img_w);
        CropRect { x: (img_w - w) / 2, y: 0, w, h: img_h }
    } else {
        // Image taller than viewport: crop top and bottom.
        let h = ((img_w as f64 / vp_ratio).round() as u32).clamp(1, img_h);
        CropRect { x: 0, y: (img_h - h) / 2, w: img_w, h }
    }
}

// ---------------------------------------------------------------------------
// Terminal-side frame images
// ---------------------------------------------------------------------------

/// Track which frames are transmitted to the terminal, keyed by frame index.
pub(super) struct LoadedFrames {
    /// frame_index → Kitty image ID
    map: HashMap<usize, u32>,
    next_id: u32,
}

impl LoadedFrames {
    pub(super) fn new() -> Self {
        Self {
            map: HashMap::new(),
            next_id: 100, // Reserve 1-99 for future use
        }
    }

    /// Ensure a frame's pixels are transmitted, returning its image ID.
    pub(super) fn ensure_loaded(&mut self, index: usize, image: &FrameImage) -> io::Result<u32> {
        if let Some(&id) = self.map.get(&index) {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        terminal::transmit_image(image, id)?;
        self.map.insert(index, id);
        Ok(id)
    }

    /// Drop the terminal-side copy of an evicted frame. Memory eviction and
    /// terminal eviction move together so terminal memory stays bounded too.
    pub(super) fn remove(&mut self, index: usize) {
        if let Some(id) = self.map.remove(&index) {
            let _ = terminal::delete_image(id);
        }
    }

    /// Delete all frame placements (keep image data).
    pub(super) fn delete_placements(&self) -> io::Result<()> {
        use std::io::Write;
        let mut out = std::io::stdout();
        for &id in self.map.values() {
            write!(out, "\x1b_Ga=d,d=i,i={id},q=2\x1b\\")?;
        }
        out.flush()
    }
}

/// Why the event loop exited the inner `thread::scope`.
pub(super) enum ExitReason {
    Quit,
    Resize { new_cols: u16, new_rows: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_crops_sides() {
        // 2:1 image into a 1:1 viewport: keep the middle square.
        let crop = cover_crop(200, 100, 500, 500);
        assert_eq!(crop, CropRect { x: 50, y: 0, w: 100, h: 100 });
    }

    #[test]
    fn tall_image_crops_top_and_bottom() {
        // 1:2 image into a 2:1 viewport: keep a centered 100x50 band.
        let crop = cover_crop(100, 200, 400, 200);
        assert_eq!(crop, CropRect { x: 0, y: 75, w: 100, h: 50 });
    }

    #[test]
    fn matching_aspect_keeps_full_image() {
        let crop = cover_crop(1920, 1080, 960, 540);
        assert_eq!(crop, CropRect { x: 0, y: 0, w: 1920, h: 1080 });
    }

    #[test]
    fn degenerate_dims_do_not_panic() {
        let crop = cover_crop(100, 100, 0, 50);
        assert_eq!(crop.w, 100);
        assert_eq!(crop.h, 100);
        let crop = cover_crop(0, 0, 100, 100);
        assert!(crop.w >= 1 && crop.h >= 1);
    }

    #[test]
    fn crop_never_exceeds_image_bounds() {
        for (iw, ih, vw, vh) in [
            (3u32, 1000u32, 1000u32, 3u32),
            (1000, 3, 3, 1000),
            (7, 7, 1920, 1080),
            (4096, 4096, 80, 24),
        ] {
            let c = cover_crop(iw, ih, vw, vh);
            assert!(c.x + c.w <= iw, "{iw}x{ih} into {vw}x{vh}: {c:?}");
            assert!(c.y + c.h <= ih, "{iw}x{ih} into {vw}x{vh}: {c:?}");
        }
    }

    #[test]
    fn layout_reserves_status_row() {
        let layout = compute_layout(80, 24, 1600, 768);
        assert_eq!(layout.image_rows, 23);
        assert_eq!(layout.status_row, 23);
        assert_eq!(layout.cell_w, 20);
        assert_eq!(layout.cell_h, 32);
        let (vp_w, vp_h) = vp_dims(&layout);
        assert_eq!(vp_w, 1600);
        assert_eq!(vp_h, 23 * 32);
    }

    #[test]
    fn zero_pixel_report_falls_back_to_unit_cells() {
        // Terminals that report no pixel size still get a usable layout.
        let layout = compute_layout(80, 24, 0, 0);
        assert_eq!(layout.cell_w, 1);
        assert_eq!(layout.cell_h, 1);
    }
}
