//! Batch renaming of downloaded media files
//!
//! Renaming is two-phase so callers can preview: [`scan`] proposes a
//! [`RenamePlan`] per media file, the caller may mark plans as skipped, and
//! [`execute`] applies the rest. One failed rename never aborts the batch.

use crate::error::{Error, Result};
use crate::utils::sanitize_filename;
use regex::{NoExpand, RegexBuilder};
use std::path::{Path, PathBuf};

/// Extensions [`scan`] considers (compared case-insensitively)
pub const MEDIA_EXTENSIONS: [&str; 10] = ["mp4", "avi", "flv", "mkv", "mov", "wmv", "mp3", "flac", "aac", "m4a"];

/// How a new name is derived from the old one
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameRule {
    /// Keep only the text inside `《…》`, else inside `【…】`
    ExtractTitle,
    /// Substitute every occurrence of `from` with `to` in the file stem
    Replace {
        /// Text to look for
        from: String,
        /// Replacement text
        to: String,
        /// Match case exactly
        case_sensitive: bool,
    },
}

impl RenameRule {
    /// New stem for `stem`, or `None` when the rule does not apply
    pub fn apply(&self, stem: &str) -> Option<String> {
        let renamed = match self {
            RenameRule::ExtractTitle => extract_title(stem)?,
            RenameRule::Replace { from, to, case_sensitive } => {
                if from.is_empty() {
                    return None;
                }
                let re = RegexBuilder::new(&regex::escape(from))
                    .case_insensitive(!case_sensitive)
                    .build()
                    .ok()?;
                if !re.is_match(stem) {
                    return None;
                }
                re.replace_all(stem, NoExpand(to)).into_owned()
            }
        };

        let renamed = sanitize_filename(renamed.trim());
        (!renamed.is_empty() && renamed != stem).then_some(renamed)
    }
}

fn extract_title(stem: &str) -> Option<String> {
    bracketed(stem, '《', '》').or_else(|| bracketed(stem, '【', '】'))
}

fn bracketed(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)? + open.len_utf8();
    let len = text[start..].find(close)?;
    (len > 0).then(|| text[start..start + len].to_string())
}

/// One proposed rename
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamePlan {
    /// Current file path
    pub source: PathBuf,
    /// Proposed file name (extension kept); `None` when the rule did not match
    pub new_name: Option<String>,
    /// Set by the caller to leave this file alone
    pub skip: bool,
}

impl RenamePlan {
    /// Destination path, if this plan renames anything
    pub fn target(&self) -> Option<PathBuf> {
        let name = self.new_name.as_ref()?;
        Some(self.source.with_file_name(name))
    }
}

/// Outcome of [`execute`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// New paths of renamed files
    pub succeeded: Vec<PathBuf>,
    /// Plans skipped by the caller or without a match
    pub skipped: usize,
    /// Source paths that could not be renamed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

fn is_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

/// Propose renames for the media files directly inside `folder`
///
/// Plans are sorted by file name. Files the rule does not match are
/// included with `new_name: None`.
///
/// # Errors
///
/// Fails when `folder` is missing or not a directory.
pub async fn scan(folder: &Path, rule: &RenameRule) -> Result<Vec<RenamePlan>> {
    let metadata = tokio::fs::metadata(folder).await?;
    if !metadata.is_dir() {
        return Err(Error::Other(format!("{} is not a directory", folder.display())));
    }

    let mut plans = Vec::new();
    let mut entries = tokio::fs::read_dir(folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_media(&path) {
            continue;
        }
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let new_name = rule.apply(stem).map(|new_stem| format!("{new_stem}.{ext}"));
        plans.push(RenamePlan {
            source: path.clone(),
            new_name,
            skip: false,
        });
    }

    plans.sort_by(|a, b| a.source.file_name().cmp(&b.source.file_name()));
    tracing::debug!(
        folder = %folder.display(),
        files = plans.len(),
        matched = plans.iter().filter(|p| p.new_name.is_some()).count(),
        "rename scan finished"
    );
    Ok(plans)
}

/// Apply every non-skipped plan
///
/// An existing file at the destination is never overwritten; that plan is
/// reported as failed.
pub async fn execute(plans: &[RenamePlan]) -> RenameReport {
    let mut report = RenameReport::default();

    for plan in plans {
        let Some(target) = plan.target().filter(|_| !plan.skip) else {
            report.skipped += 1;
            continue;
        };

        let result = match tokio::fs::try_exists(&target).await {
            Ok(true) => Err(format!("{} already exists", target.display())),
            Ok(false) => tokio::fs::rename(&plan.source, &target)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => {
                tracing::info!(from = %plan.source.display(), to = %target.display(), "renamed");
                report.succeeded.push(target);
            }
            Err(reason) => {
                tracing::error!(path = %plan.source.display(), error = %reason, "rename failed");
                report.failed.push((plan.source.clone(), reason));
            }
        }
    }

    report
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn replace(from: &str, to: &str, case_sensitive: bool) -> RenameRule {
        RenameRule::Replace {
            from: from.to_string(),
            to: to.to_string(),
            case_sensitive,
        }
    }

    #[test]
    fn extract_prefers_book_title_marks() {
        let rule = RenameRule::ExtractTitle;
        assert_eq!(rule.apply("【合集】《三体》第一集").as_deref(), Some("三体"));
        assert_eq!(rule.apply("【公开课】线性代数").as_deref(), Some("公开课"));
        assert_eq!(rule.apply("plain name"), None);
        assert_eq!(rule.apply("empty《》"), None);
    }

    #[test]
    fn extracted_title_is_sanitized() {
        assert_eq!(RenameRule::ExtractTitle.apply("《A/B》").as_deref(), Some("A_B"));
    }

    #[test]
    fn replace_respects_case_flag() {
        assert_eq!(replace("EP", "Episode ", true).apply("show ep1"), None);
        assert_eq!(
            replace("EP", "Episode ", false).apply("show ep1 Ep2").as_deref(),
            Some("show Episode 1 Episode 2")
        );
        assert_eq!(replace("", "x", true).apply("anything"), None);
    }

    #[test]
    fn replacement_text_is_literal() {
        assert_eq!(replace("a", "$0$1", true).apply("cat").as_deref(), Some("c$0$1t"));
    }

    #[tokio::test]
    async fn scan_lists_media_files_only() {
        let dir = tempdir().unwrap();
        for name in ["《B》.mp4", "《A》.FLAC", "notes.txt", "raw.mp4"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("sub.mkv")).await.unwrap();

        let plans = scan(dir.path(), &RenameRule::ExtractTitle).await.unwrap();
        let names: Vec<_> = plans.iter().map(|p| p.new_name.clone()).collect();
        assert_eq!(
            names,
            vec![None, Some("A.FLAC".to_string()), Some("B.mp4".to_string())]
        );
    }

    #[tokio::test]
    async fn scan_rejects_missing_folder() {
        let dir = tempdir().unwrap();
        assert!(scan(&dir.path().join("nope"), &RenameRule::ExtractTitle).await.is_err());
    }

    #[tokio::test]
    async fn execute_reports_each_plan() {
        let dir = tempdir().unwrap();
        for name in ["《One》.mp4", "《Two》.mp4", "《Three》.mp4", "Three.mp4", "other.mp4"] {
            tokio::fs::write(dir.path().join(name), name).await.unwrap();
        }

        let mut plans = scan(dir.path(), &RenameRule::ExtractTitle).await.unwrap();
        plans
            .iter_mut()
            .filter(|p| p.source.ends_with("《Two》.mp4"))
            .for_each(|p| p.skip = true);
        let report = execute(&plans).await;

        assert_eq!(report.succeeded, vec![dir.path().join("One.mp4")]);
        assert_eq!(report.skipped, 3, "skipped plan and two unmatched files");
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("already exists"));
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("Three.mp4")).await.unwrap(),
            "Three.mp4"
        );
        assert!(dir.path().join("《Two》.mp4").exists());
    }
}
