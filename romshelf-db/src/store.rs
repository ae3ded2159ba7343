//! [`GameStore`] implementation over a SQLite connection.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use romshelf_core::{
    ContentIdentity, FileLocation, GameId, GameRecord, GameStore, MetadataCandidate, StoreError,
};

/// SQLite-backed collection store. The connection sits behind a mutex so
/// the store satisfies the engine's `Send + Sync` collaborator bound;
/// each operation is an independent unit, matching the best-effort batch
/// discipline of the reconciler.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = crate::schema::open_database(path).map_err(StoreError::backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = crate::schema::open_memory().map_err(StoreError::backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl GameStore for SqliteStore {
    fn find_game_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Option<GameRecord>, StoreError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT g.id, g.title, g.platform
             FROM games g
             JOIN file_locations l ON l.game_id = g.id
             WHERE l.identity_hex = ?1 AND l.size = ?2
             LIMIT 1",
            params![identity.hex(), identity.size],
            |row| {
                Ok(GameRecord {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    platform: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::backend)
    }

    fn find_locations_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Vec<FileLocation>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT path, game_id FROM file_locations
                 WHERE identity_hex = ?1 AND size = ?2",
            )
            .map_err(StoreError::backend)?;
        let rows = stmt
            .query_map(params![identity.hex(), identity.size], |row| {
                Ok(FileLocation {
                    path: std::path::PathBuf::from(row.get::<_, String>(0)?),
                    game_id: row.get(1)?,
                })
            })
            .map_err(StoreError::backend)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::backend)
    }

    fn apply_metadata_update(
        &self,
        game_id: GameId,
        candidate: &MetadataCandidate,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE games SET
                     external_id = ?2,
                     title = ?3,
                     platform = ?4,
                     artwork_url = ?5,
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    game_id,
                    candidate.external_id,
                    candidate.title,
                    candidate.platform,
                    candidate.artwork_urls.first(),
                ],
            )
            .map_err(StoreError::backend)?;
        if changed == 0 {
            return Err(StoreError::not_found("game", game_id));
        }
        Ok(())
    }

    fn create_game(
        &self,
        candidate: &MetadataCandidate,
        identity: &ContentIdentity,
        path: &Path,
    ) -> Result<GameId, StoreError> {
        let mut conn = self.lock();
        // One transaction: a rejected location insert must not leave an
        // orphaned games row behind.
        let tx = conn.transaction().map_err(StoreError::backend)?;
        tx.execute(
            "INSERT INTO games (external_id, title, platform, artwork_url)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                candidate.external_id,
                candidate.title,
                candidate.platform,
                candidate.artwork_urls.first(),
            ],
        )
        .map_err(StoreError::backend)?;
        let game_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO file_locations (identity_hex, size, path, game_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                 identity_hex = excluded.identity_hex,
                 size = excluded.size,
                 game_id = excluded.game_id",
            params![
                identity.hex(),
                identity.size,
                path.to_string_lossy(),
                game_id,
            ],
        )
        .map_err(StoreError::backend)?;
        tx.commit().map_err(StoreError::backend)?;

        Ok(game_id)
    }
}
