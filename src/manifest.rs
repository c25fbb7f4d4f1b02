//! Frame manifest: the ordered list of frame filenames served next to the
//! frames themselves. Fetched once at boot and immutable afterwards — it is
//! the source of truth for frame count and ordering.

use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;

/// Wire format of `<base>/frames/manifest.json`.
#[derive(Deserialize)]
struct ManifestFile {
    #[serde(default)]
    files: Vec<String>,
}

pub struct FrameManifest {
    base: String,
    files: Vec<String>,
}

impl FrameManifest {
    /// Fetch and validate the manifest. A non-2xx response, unparseable
    /// body, or empty file list is fatal to the viewer (but only to the
    /// viewer: main reports it and exits cleanly).
    pub fn fetch(agent: &ureq::Agent, base: &str) -> Result<Self> {
        let url = manifest_url(base);
        let mut response = agent
            .get(&url)
            .call()
            .with_context(|| format!("failed to fetch {url}"))?;
        let parsed: ManifestFile = response
            .body_mut()
            .read_json()
            .with_context(|| format!("failed to parse {url}"))?;
        Self::from_files(base, parsed.files)
    }

    /// Build a manifest from an already-parsed file list (also the seam the
    /// tests use).
    pub fn from_files(base: &str, files: Vec<String>) -> Result<Self> {
        if files.is_empty() {
            bail!("manifest has no frames — nothing to animate");
        }
        info!("manifest: {} frames from {}", files.len(), base);
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            files,
        })
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn file(&self, index: usize) -> &str {
        &self.files[index]
    }

    /// Absolute URL of one frame image.
    pub fn frame_url(&self, index: usize) -> String {
        format!("{}/frames/{}", self.base, self.files[index])
    }
}

fn manifest_url(base: &str) -> String {
    format!("{}/frames/manifest.json", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_urls_follow_manifest_order() {
        let m = FrameManifest::from_files(
            "http://cdn.invalid",
            vec!["f0.png".into(), "f1.png".into(), "f2.png".into()],
        )
        .unwrap();
        assert_eq!(m.count(), 3);
        assert_eq!(m.frame_url(0), "http://cdn.invalid/frames/f0.png");
        assert_eq!(m.frame_url(2), "http://cdn.invalid/frames/f2.png");
        assert_eq!(m.file(1), "f1.png");
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let m = FrameManifest::from_files("http://cdn.invalid/", vec!["a.png".into()]).unwrap();
        assert_eq!(m.frame_url(0), "http://cdn.invalid/frames/a.png");
        assert_eq!(
            manifest_url("http://cdn.invalid/"),
            "http://cdn.invalid/frames/manifest.json"
        );
    }

    #[test]
    fn empty_file_list_is_fatal() {
        let err = FrameManifest::from_files("http://cdn.invalid", Vec::new());
        assert!(err.is_err());
    }

    #[test]
    fn wire_format_parses_files_array() {
        let parsed: ManifestFile =
            serde_json::from_str(r#"{"files": ["f0.png", "f1.png"]}"#).unwrap();
        assert_eq!(parsed.files, vec!["f0.png", "f1.png"]);
    }

    #[test]
    fn missing_files_field_parses_as_empty() {
        // Missing array behaves like an empty one: fatal at validation.
        let parsed: ManifestFile = serde_json::from_str("{}").unwrap();
        assert!(parsed.files.is_empty());
        assert!(FrameManifest::from_files("http://x.invalid", parsed.files).is_err());
    }
}
