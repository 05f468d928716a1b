//! The hot-reload decision engine.
//!
//! After a changed node is re-cooked, the engine walks the dependents
//! index upward and decides whether the update can be absorbed as a
//! scoped patch or must become a full page reload. Per edge, first match
//! wins: an explicit marker on the edge, then the dependency's per-type
//! default (stylesheets and resources accept, classic scripts decline,
//! JS modules propagate to their own dependents). Any path reaching the
//! top unabsorbed, or any decline on the way, reloads the page.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use galley_graph::{AssetType, AssetUrl, HotPolicy};
use galley_kitchen::Kitchen;

use crate::error::Result;
use crate::event::{FileEvent, FileEventKind};
use crate::message::HotMessage;

/// Outcome of walking one changed node's dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum HotDecision {
    /// Every upward path was absorbed; `accepted_path` is the deepest
    /// chain from the changed node to an accepting boundary.
    HotUpdate {
        url: AssetUrl,
        accepted_path: Vec<AssetUrl>,
    },
    FullReload { url: AssetUrl, reason: String },
}

impl HotDecision {
    pub fn into_message(self) -> HotMessage {
        match self {
            Self::HotUpdate { url, accepted_path } => HotMessage::HotUpdate { url, accepted_path },
            Self::FullReload { url, reason } => HotMessage::FullReload { url, reason },
        }
    }
}

/// Re-cooks changed nodes and turns dependency fallout into client
/// messages.
pub struct HotReloader {
    kitchen: Kitchen,
}

impl HotReloader {
    pub fn new(kitchen: Kitchen) -> Self {
        Self { kitchen }
    }

    pub fn kitchen(&self) -> &Kitchen {
        &self.kitchen
    }

    /// One coalesced file event in, ordered client messages out.
    ///
    /// Events for files outside the graph are ignored; the graph only
    /// grows through cooking, never through the watcher.
    pub async fn handle_event(&self, event: &FileEvent) -> Result<Vec<HotMessage>> {
        let url = AssetUrl::from_file_path(&event.path)?;
        let graph = self.kitchen.graph();
        if !graph.contains(&url) {
            return Ok(Vec::new());
        }

        match event.kind {
            FileEventKind::Removed => Ok(vec![
                HotMessage::Cleanup { url: url.clone() },
                HotMessage::FullReload {
                    url,
                    reason: "file removed".to_string(),
                },
            ]),
            FileEventKind::Added | FileEventKind::Updated => {
                let diff = self.kitchen.recook(&url).await?;
                debug!(url = %url, pruned = diff.pruned.len(), "recooked after change");
                let mut messages: Vec<HotMessage> = diff
                    .pruned
                    .into_iter()
                    .map(|pruned| HotMessage::Cleanup { url: pruned })
                    .collect();
                messages.push(self.decide(&url).into_message());
                Ok(messages)
            }
        }
    }

    /// Walks dependents breadth-first and decides patch vs reload.
    pub fn decide(&self, changed: &AssetUrl) -> HotDecision {
        let graph = self.kitchen.graph();
        let Some(asset) = graph.get(changed) else {
            return HotDecision::FullReload {
                url: changed.clone(),
                reason: "node left the graph".to_string(),
            };
        };
        if asset.meta.hot_decline {
            return HotDecision::FullReload {
                url: changed.clone(),
                reason: format!("{changed} declines hot updates"),
            };
        }
        if asset.meta.hot_accept_self {
            return HotDecision::HotUpdate {
                url: changed.clone(),
                accepted_path: vec![changed.clone()],
            };
        }

        let mut queue: VecDeque<Vec<AssetUrl>> = VecDeque::from([vec![changed.clone()]]);
        let mut visited: HashSet<AssetUrl> = HashSet::from([changed.clone()]);
        let mut accepted: Vec<Vec<AssetUrl>> = Vec::new();

        while let Some(path) = queue.pop_front() {
            let node = path.last().expect("path never empty").clone();
            let node_type = graph
                .get(&node)
                .map(|asset| asset.asset_type)
                .unwrap_or(AssetType::Other);

            let mut dependents = graph.dependents(&node);
            if dependents.is_empty() {
                return HotDecision::FullReload {
                    url: changed.clone(),
                    reason: format!("{node} reached the top without an accepting importer"),
                };
            }
            dependents.sort();

            for parent in dependents {
                let edge_hot = graph
                    .references_between(&parent, &node)
                    .iter()
                    .find_map(|reference| reference.hot);
                match edge_hot {
                    Some(HotPolicy::Decline) => {
                        return HotDecision::FullReload {
                            url: changed.clone(),
                            reason: format!("{parent} declines updates of {node}"),
                        };
                    }
                    Some(HotPolicy::Accept) => {
                        accepted.push(extended(&path, parent));
                        continue;
                    }
                    None => {}
                }

                match node_type {
                    AssetType::JsClassic => {
                        return HotDecision::FullReload {
                            url: changed.clone(),
                            reason: format!("{node} is a classic script"),
                        };
                    }
                    // modules carry their update upward unless someone
                    // along the way accepts it
                    AssetType::JsModule => {
                        let parent_asset = graph.get(&parent);
                        let parent_meta = parent_asset.map(|asset| asset.meta).unwrap_or_default();
                        if parent_meta.hot_decline {
                            return HotDecision::FullReload {
                                url: changed.clone(),
                                reason: format!("{parent} declines hot updates"),
                            };
                        }
                        if parent_meta.hot_accept_self {
                            accepted.push(extended(&path, parent));
                        } else if visited.insert(parent.clone()) {
                            queue.push_back(extended(&path, parent));
                        }
                    }
                    // stylesheets, images, fonts, json, everything else:
                    // the importer re-fetches in place
                    _ => accepted.push(extended(&path, parent)),
                }
            }
        }

        accepted.sort_by_key(|path| std::cmp::Reverse(path.len()));
        let accepted_path = accepted
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![changed.clone()]);
        HotDecision::HotUpdate {
            url: changed.clone(),
            accepted_path,
        }
    }
}

fn extended(path: &[AssetUrl], parent: AssetUrl) -> Vec<AssetUrl> {
    let mut out = path.to_vec();
    out.push(parent);
    out
}
