//! Diagnostics - screenshots and page-state logging
//!
//! Pure side-effecting observers. Nothing here alters page state, consumes
//! input, or affects control flow; a failed capture (filesystem error, page
//! already gone) is logged and swallowed so the tested flow proceeds
//! unchanged.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::page::Page;

/// Sink for run-scoped diagnostic artifacts
#[derive(Debug, Clone)]
pub struct Diagnostics {
    artifact_dir: PathBuf,
}

impl Diagnostics {
    /// Create a sink rooted at `artifact_dir`. The directory is created
    /// lazily at first capture so a run with no screenshots leaves nothing
    /// behind.
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Capture the rendered page under a labelled, timestamped name.
    ///
    /// Returns the artifact path when the capture landed, `None` when it
    /// failed; either way the scenario continues.
    pub async fn screenshot(&self, page: &mut Page, label: &str) -> Option<PathBuf> {
        match self.try_screenshot(page, label).await {
            Ok(path) => {
                info!(path = %path.display(), "screenshot captured");
                Some(path)
            }
            Err(e) => {
                warn!(label, error = %e, "screenshot failed, continuing");
                None
            }
        }
    }

    async fn try_screenshot(
        &self,
        page: &mut Page,
        label: &str,
    ) -> crate::error::HarnessResult<PathBuf> {
        let png = page.screenshot_png().await?;

        std::fs::create_dir_all(&self.artifact_dir)?;
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self.artifact_dir.join(format!("{label}-{stamp}.png"));
        std::fs::write(&path, png)?;
        Ok(path)
    }

    /// Log the page's current URL to the diagnostic stream.
    pub async fn log_page(&self, page: &mut Page) {
        match page.current_url().await {
            Ok(url) => info!(%url, "page state"),
            Err(e) => warn!(error = %e, "could not read page URL"),
        }
    }

    /// Log an arbitrary scenario message.
    pub fn log(&self, message: &str) {
        info!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_dir_not_created_up_front() {
        let dir = std::env::temp_dir().join("ssoprobe-diag-test-unused");
        let _ = std::fs::remove_dir_all(&dir);
        let diag = Diagnostics::new(&dir);
        assert_eq!(diag.artifact_dir(), dir.as_path());
        assert!(!dir.exists());
    }
}
