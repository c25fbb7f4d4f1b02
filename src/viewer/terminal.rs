//! Terminal I/O layer: raw mode, Kitty Graphics Protocol, status bar.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    event::{DisableFocusChange, EnableFocusChange},
    style::{self, Stylize},
    terminal,
};
use flate2::{Compression, write::ZlibEncoder};
use std::io::{self, Write, stdout};

use super::state::{CropRect, Layout};
use crate::frames::FrameImage;

const CHUNK_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// RawGuard — Drop で raw mode / alternate screen / 画像削除を確実に復元
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        stdout().execute(EnableFocusChange)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\");
        let _ = out.execute(DisableFocusChange);
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Kitty protocol helpers
// ---------------------------------------------------------------------------

/// RGBA ピクセルを zlib 圧縮してチャンク分割送信（a=t: データ転送のみ、表示なし）
///
/// f=32 (raw RGBA) + o=z. Decoded frames are large; zlib keeps the escape
/// stream a fraction of the raw size for typical photographic frames.
pub(super) fn transmit_image(image: &FrameImage, image_id: u32) -> io::Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&image.rgba)?;
    let compressed = encoder.finish()?;

    let encoded = BASE64.encode(&compressed);
    let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(CHUNK_SIZE).collect();

    let mut out = stdout();
    let (s, v) = (image.width, image.height);
    for (i, chunk) in chunks.iter().enumerate() {
        let is_last = i == chunks.len() - 1;
        let m = if is_last { 0 } else { 1 };
        if i == 0 {
            write!(out, "\x1b_Ga=t,f=32,o=z,s={s},v={v},i={image_id},t=d,q=2,m={m};")?;
        } else {
            write!(out, "\x1b_Gm={m},q=2;")?;
        }
        out.write_all(chunk)?;
        write!(out, "\x1b\\")?;
    }
    out.flush()
}

/// 画像データ+配置を削除
pub(super) fn delete_image(image_id: u32) -> io::Result<()> {
    let mut out = stdout();
    write!(out, "\x1b_Ga=d,d=I,i={image_id},q=2\x1b\\")?;
    out.flush()
}

/// 全画像+データ削除
pub(super) fn delete_all_images() -> io::Result<()> {
    let mut out = stdout();
    write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\")?;
    out.flush()
}

/// Clear the text layer.
pub(super) fn clear_screen() -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    out.flush()
}

/// Place one frame filling the image area via Kitty Graphics Protocol.
///
/// The crop is the cover-fit source rectangle; c/r stretch it over the full
/// image area so every frame lands on the same cells regardless of its
/// native size.
pub(super) fn place_frame(image_id: u32, crop: &CropRect, layout: &Layout) -> io::Result<()> {
    let mut out = stdout();
    let cols = layout.image_cols;
    let rows = layout.image_rows.max(1);
    out.queue(cursor::MoveTo(0, 0))?;
    write!(
        out,
        "\x1b_Ga=p,i={image_id},x={x},y={y},w={w},h={h},c={cols},r={rows},C=1,q=2\x1b\\",
        x = crop.x,
        y = crop.y,
        w = crop.w,
        h = crop.h,
    )?;
    out.flush()
}

/// ステータスバーをターミナル最終行に描画。
///
/// `acc_peek`: 数字蓄積中なら `:56_` のように表示
/// `flash`: 一時メッセージ（次のキー入力でクリア）
pub(super) fn draw_status_bar(
    layout: &Layout,
    base: &str,
    frame: usize,
    frame_count: usize,
    loaded: usize,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;

    let pct = if frame_count == 0 {
        100
    } else {
        (loaded * 100 / frame_count) as u32
    };

    let middle = if let Some(msg) = flash {
        format!(" {base} | {msg} | frame {}/{frame_count}  cached {pct}%", frame + 1)
    } else if let Some(n) = acc_peek {
        format!(" {base} | :{n}_ | frame {}/{frame_count}  cached {pct}%", frame + 1)
    } else {
        format!(
            " {base} | frame {}/{frame_count}  cached {pct}%  [j/k d/u Ng:goto g/G q:quit]",
            frame + 1
        )
    };

    let padded = format!("{:<width$}", middle, width = layout.image_cols as usize);
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

/// Boot progress line (before the alternate screen, so it scrolls away).
pub(super) fn draw_boot_progress(loaded: usize, batch: usize) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, 0))?;
    write!(out, "loading frames {loaded}/{batch}...")?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty
    // (Unix) or Console API (Windows), so stdin being a pipe is always fine.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "flipbook requires an interactive terminal.\n\
             \n\
             Supported terminals: Kitty, Ghostty, WezTerm\n\
             To inspect a sequence without one, use: flipbook <BASE_URL> info"
        );
    }
    Ok(())
}
