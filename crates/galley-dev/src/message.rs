//! Server→client push messages.
//!
//! Fire-and-forget JSON; clients never reply. The wire shape is
//! `{ "type": ..., "data": { ... } }`.

use serde::{Deserialize, Serialize};

use galley_graph::AssetUrl;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HotMessage {
    /// Scoped patch: the client re-imports along the accepted path
    /// instead of reloading the page.
    HotUpdate {
        url: AssetUrl,
        #[serde(rename = "acceptedPath")]
        accepted_path: Vec<AssetUrl>,
    },
    /// Something on the update path declined; reload the page.
    FullReload { url: AssetUrl, reason: String },
    /// A node left the graph (dependency removed, inline region gone);
    /// the client drops whatever it holds for it.
    Cleanup { url: AssetUrl },
}

impl HotMessage {
    pub fn url(&self) -> &AssetUrl {
        match self {
            Self::HotUpdate { url, .. } | Self::FullReload { url, .. } | Self::Cleanup { url } => {
                url
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = HotMessage::HotUpdate {
            url: AssetUrl::parse("file:///src/b.css").unwrap(),
            accepted_path: vec![
                AssetUrl::parse("file:///src/b.css").unwrap(),
                AssetUrl::parse("file:///src/a.js").unwrap(),
            ],
        };
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "hot_update");
        assert_eq!(json["data"]["url"], "file:///src/b.css");
        assert_eq!(json["data"]["acceptedPath"][1], "file:///src/a.js");

        let reload = HotMessage::FullReload {
            url: AssetUrl::parse("file:///src/a.js").unwrap(),
            reason: "declined".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&reload).unwrap()).unwrap();
        assert_eq!(json["type"], "full_reload");

        let cleanup = HotMessage::Cleanup {
            url: AssetUrl::parse("file:///src/gone.css").unwrap(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&cleanup).unwrap()).unwrap();
        assert_eq!(json["type"], "cleanup");
        assert_eq!(json["data"]["url"], "file:///src/gone.css");
    }

    #[test]
    fn test_round_trip() {
        let msg = HotMessage::Cleanup {
            url: AssetUrl::parse("file:///src/gone.css").unwrap(),
        };
        let back: HotMessage = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
