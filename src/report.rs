//! Commit-style summary of what changed in the feed.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::diff::DiffResult;
use crate::util::write_atomic;

/// A one-line title plus a multi-line body describing a [`DiffResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub title: String,
    pub body: String,
}

impl ChangeReport {
    /// Renders the report, or `None` when the diff has nothing to say.
    ///
    /// A single new episode is named in the title; anything else gets counts,
    /// e.g. `2 episode(s) added, 1 episode(s) updated`.
    pub fn from_diff(diff: &DiffResult) -> Option<Self> {
        if diff.is_empty() {
            return None;
        }

        let title = match (diff.added.as_slice(), diff.updated.is_empty()) {
            ([only], true) => format!("New episode: {}", only.title),
            _ => {
                let mut parts = Vec::new();
                if !diff.added.is_empty() {
                    parts.push(format!("{} episode(s) added", diff.added.len()));
                }
                if !diff.updated.is_empty() {
                    parts.push(format!("{} episode(s) updated", diff.updated.len()));
                }
                parts.join(", ")
            }
        };

        let mut lines = Vec::new();
        if !diff.added.is_empty() {
            lines.push("New episodes:".to_string());
            for episode in &diff.added {
                lines.push(format!("  + {} ({})", episode.title, episode.pub_date));
            }
        }
        if !diff.updated.is_empty() {
            lines.push("Updated episodes:".to_string());
            for update in &diff.updated {
                let (old, new) = (&update.previous, &update.current);
                lines.push(format!("  ~ {} ({})", new.title, new.pub_date));
                if update.title_changed() {
                    lines.push(format!("      title: {} → {}", old.title, new.title));
                }
                if update.pub_date_changed() {
                    lines.push(format!("      pubDate: {} → {}", old.pub_date, new.pub_date));
                }
            }
        }

        Some(Self {
            title,
            body: lines.join("\n"),
        })
    }

    /// Title, blank line, body: the layout `git commit -F` expects.
    pub fn commit_message(&self) -> String {
        format!("{}\n\n{}", self.title, self.body)
    }

    /// Markdown for a CI job summary: the title as a heading and the body
    /// verbatim in a fenced block so its indentation survives rendering.
    pub fn step_summary(&self) -> String {
        format!("## {}\n\n```\n{}\n```\n", self.title, self.body)
    }
}

/// Writes the commit message, replacing any previous one.
pub fn write_commit_message(path: &Path, report: &ChangeReport) -> Result<()> {
    write_atomic(path, report.commit_message().as_bytes())
        .with_context(|| format!("Failed to write commit message to {}", path.display()))
}

/// Appends the report to the step-summary file, creating it if needed.
///
/// The file is shared with other steps of the same job, so it is never
/// truncated.
pub fn append_step_summary(path: &Path, report: &ChangeReport) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open step summary {}", path.display()))?;
    file.write_all(report.step_summary().as_bytes())
        .with_context(|| format!("Failed to append step summary {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::UpdatedEpisode;
    use crate::feed::Episode;
    use pretty_assertions::assert_eq;

    fn episode(guid: &str, title: &str, pub_date: &str) -> Episode {
        Episode {
            guid: guid.to_string(),
            title: title.to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    fn updated(previous: Episode, current: Episode) -> UpdatedEpisode {
        UpdatedEpisode { previous, current }
    }

    #[test]
    fn test_empty_diff_has_no_report() {
        assert!(ChangeReport::from_diff(&DiffResult::default()).is_none());
    }

    #[test]
    fn test_single_new_episode_is_named() {
        let diff = DiffResult {
            added: vec![episode("1", "Pilot", "Mon, 06 Jan 2025")],
            updated: vec![],
        };
        let report = ChangeReport::from_diff(&diff).unwrap();
        assert_eq!(report.title, "New episode: Pilot");
        assert_eq!(report.body, "New episodes:\n  + Pilot (Mon, 06 Jan 2025)");
    }

    #[test]
    fn test_counts_when_several_added() {
        let diff = DiffResult {
            added: vec![episode("1", "One", "d1"), episode("2", "Two", "d2")],
            updated: vec![],
        };
        let report = ChangeReport::from_diff(&diff).unwrap();
        assert_eq!(report.title, "2 episode(s) added");
    }

    #[test]
    fn test_title_only_change() {
        let diff = DiffResult {
            added: vec![],
            updated: vec![updated(
                episode("1", "Old name", "d1"),
                episode("1", "New name", "d1"),
            )],
        };
        let report = ChangeReport::from_diff(&diff).unwrap();
        assert_eq!(report.title, "1 episode(s) updated");
        assert_eq!(
            report.body,
            "Updated episodes:\n  ~ New name (d1)\n      title: Old name → New name"
        );
        assert!(!report.body.contains("pubDate:"));
    }

    #[test]
    fn test_added_and_updated_sections() {
        let diff = DiffResult {
            added: vec![episode("3", "Fresh", "d3")],
            updated: vec![updated(
                episode("1", "Same", "Mon"),
                episode("1", "Same", "Tue"),
            )],
        };
        let report = ChangeReport::from_diff(&diff).unwrap();
        assert_eq!(report.title, "1 episode(s) added, 1 episode(s) updated");
        assert_eq!(
            report.body,
            [
                "New episodes:",
                "  + Fresh (d3)",
                "Updated episodes:",
                "  ~ Same (Tue)",
                "      pubDate: Mon → Tue",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_both_fields_changed() {
        let diff = DiffResult {
            added: vec![],
            updated: vec![updated(episode("1", "A", "x"), episode("1", "B", "y"))],
        };
        let report = ChangeReport::from_diff(&diff).unwrap();
        assert!(report.body.contains("      title: A → B\n      pubDate: x → y"));
    }

    #[test]
    fn test_commit_message_and_summary_layout() {
        let report = ChangeReport {
            title: "New episode: Pilot".to_string(),
            body: "New episodes:\n  + Pilot (d)".to_string(),
        };
        assert_eq!(
            report.commit_message(),
            "New episode: Pilot\n\nNew episodes:\n  + Pilot (d)"
        );
        assert_eq!(
            report.step_summary(),
            "## New episode: Pilot\n\n```\nNew episodes:\n  + Pilot (d)\n```\n"
        );
    }

    #[test]
    fn test_artifact_files() {
        let dir = std::env::temp_dir().join("feedbridge_report_test_artifacts");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let report = ChangeReport {
            title: "t".to_string(),
            body: "b".to_string(),
        };

        let message = dir.join("commit_msg.txt");
        write_commit_message(&message, &report).unwrap();
        write_commit_message(&message, &report).unwrap();
        assert_eq!(std::fs::read_to_string(&message).unwrap(), "t\n\nb");

        let summary = dir.join("summary.md");
        std::fs::write(&summary, "earlier step\n").unwrap();
        append_step_summary(&summary, &report).unwrap();
        assert_eq!(
            std::fs::read_to_string(&summary).unwrap(),
            "earlier step\n## t\n\n```\nb\n```\n"
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
