//! Screenshots and page captures for debugging.
//!
//! Write-only. Failures are logged and otherwise ignored.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, warn};

use crate::browser::Surface;

/// Writes debug artifacts into a directory, or nowhere when disabled.
#[derive(Debug, Clone, Default)]
pub struct ArtifactWriter {
    dir: Option<PathBuf>,
}

impl ArtifactWriter {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Save a screenshot and the page HTML under `label`.
    pub async fn capture<S: Surface + ?Sized>(&self, surface: &S, label: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "Cannot create artifact directory");
            return;
        }

        let stem = format!("{}_{}", Utc::now().format("%Y%m%dT%H%M%S%.3f"), sanitize(label));

        let png = dir.join(format!("{stem}.png"));
        match surface.screenshot(&png).await {
            Ok(()) => debug!(path = %png.display(), "Saved screenshot"),
            Err(e) => warn!(label, error = %e, "Screenshot failed"),
        }

        let html = dir.join(format!("{stem}.html"));
        match surface.page_source().await {
            Ok(source) => {
                if let Err(e) = tokio::fs::write(&html, source).await {
                    warn!(path = %html.display(), error = %e, "Page capture write failed");
                }
            }
            Err(e) => warn!(label, error = %e, "Page capture failed"),
        }
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
