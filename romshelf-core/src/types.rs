//! Game records and catalog match candidates.

use serde::{Deserialize, Serialize};

/// Row id of a game record in the collection store.
pub type GameId = i64;

/// The slice of a persisted game record the engine needs to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub id: GameId,
    pub title: String,
    pub platform: Option<String>,
}

/// A raw search hit from the external catalog, before ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// The catalog's own identifier for this game.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub artwork_urls: Vec<String>,
}

/// A ranked match proposed by the resolver. Transient — never persisted
/// until accepted by the batch reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataCandidate {
    /// External catalog identifier.
    pub external_id: String,
    pub title: String,
    pub platform: Option<String>,
    /// Resolver confidence in [0, 1]; see the resolver's ranking constants.
    pub confidence: f32,
    pub artwork_urls: Vec<String>,
}
