//! Episode-level comparison between the freshly fetched feed and the last
//! published one.
//!
//! Episodes are matched by guid only. Removals are not reported: an episode
//! that disappears from the source simply stops being published.

use std::collections::HashMap;

use crate::feed::Episode;

/// Previously published episodes keyed by guid.
///
/// When the same guid appears more than once, the later record wins.
#[derive(Debug, Default)]
pub struct EpisodeIndex {
    by_guid: HashMap<String, Episode>,
}

impl EpisodeIndex {
    pub fn from_episodes(episodes: impl IntoIterator<Item = Episode>) -> Self {
        let mut by_guid = HashMap::new();
        for episode in episodes {
            by_guid.insert(episode.guid.clone(), episode);
        }
        Self { by_guid }
    }

    pub fn get(&self, guid: &str) -> Option<&Episode> {
        self.by_guid.get(guid)
    }

    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }
}

/// An episode whose guid was already published but whose record changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedEpisode {
    pub previous: Episode,
    pub current: Episode,
}

impl UpdatedEpisode {
    pub fn title_changed(&self) -> bool {
        self.previous.title != self.current.title
    }

    pub fn pub_date_changed(&self) -> bool {
        self.previous.pub_date != self.current.pub_date
    }
}

/// Classification of the new feed's episodes, each list in new-feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<Episode>,
    pub updated: Vec<UpdatedEpisode>,
}

impl DiffResult {
    /// `true` when nothing was added or updated, i.e. nothing to publish.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

/// Compares `new_episodes` against the published index.
///
/// Field comparison is exact string equality with no normalisation. Each
/// entry of `new_episodes` is classified on its own, so a guid repeated in
/// the new feed can be reported more than once.
pub fn diff(new_episodes: &[Episode], existing: &EpisodeIndex) -> DiffResult {
    let mut result = DiffResult::default();

    for episode in new_episodes {
        match existing.get(&episode.guid) {
            None => result.added.push(episode.clone()),
            Some(previous) if previous != episode => result.updated.push(UpdatedEpisode {
                previous: previous.clone(),
                current: episode.clone(),
            }),
            Some(_) => {}
        }
    }

    tracing::debug!(
        new = new_episodes.len(),
        existing = existing.len(),
        added = result.added.len(),
        updated = result.updated.len(),
        "Diffed episodes"
    );
    result
}
