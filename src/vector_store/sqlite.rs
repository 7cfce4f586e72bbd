//! SQLite-based stats store implementation.
//!
//! Embeddings are stored as little-endian `f32` BLOBs and similarity is
//! computed in Rust. The tables are a few thousand rows, so a full scan per
//! question is cheap.

use super::{rank, PlayerHits, RetrievalQuery, SearchResult, StatsStore, StoreStats};
use crate::error::{CourtsideError, Result};
use crate::ingest::{Dataset, IngestReport};
use crate::records::{
    parse_timestamp, GameRecord, GameRow, PlayerBoxScoreRecord, PlayerRecord, PlayerRow, TeamRecord,
};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const TEAMS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS teams (
        team_id INTEGER PRIMARY KEY,
        city TEXT NOT NULL,
        name TEXT NOT NULL,
        abbreviation TEXT NOT NULL
    );
"#;

const PLAYERS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS players (
        player_id INTEGER PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL
    );
"#;

const GAMES_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS game_details (
        game_id INTEGER PRIMARY KEY,
        season INTEGER NOT NULL,
        game_timestamp TEXT NOT NULL,
        home_team_id INTEGER NOT NULL,
        away_team_id INTEGER NOT NULL,
        home_points INTEGER NOT NULL,
        away_points INTEGER NOT NULL,
        winning_team_id INTEGER NOT NULL,
        game_embedding BLOB
    );
"#;

const BOX_SCORES_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS player_box_scores (
        person_id INTEGER NOT NULL,
        game_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        points INTEGER NOT NULL,
        offensive_reb INTEGER NOT NULL,
        defensive_reb INTEGER NOT NULL,
        assists INTEGER NOT NULL,
        steals INTEGER NOT NULL,
        blocks INTEGER NOT NULL,
        turnovers INTEGER NOT NULL,
        fg2_made INTEGER NOT NULL,
        fg2_attempted INTEGER NOT NULL,
        fg3_made INTEGER NOT NULL,
        fg3_attempted INTEGER NOT NULL,
        ft_made INTEGER NOT NULL,
        ft_attempted INTEGER NOT NULL,
        offensive_fouls INTEGER NOT NULL,
        defensive_fouls INTEGER NOT NULL,
        seconds INTEGER NOT NULL,
        player_embedding BLOB,
        PRIMARY KEY (person_id, game_id)
    );

    CREATE INDEX IF NOT EXISTS idx_player_box_scores_game_id ON player_box_scores(game_id);
"#;

const GAME_COLUMNS: &str = r#"
    g.game_id, g.season, g.game_timestamp, g.home_team_id, g.away_team_id,
    g.home_points, g.away_points, g.winning_team_id,
    h.team_id, h.city, h.name, h.abbreviation,
    a.team_id, a.city, a.name, a.abbreviation
"#;

const GAME_JOINS: &str = r#"
    FROM game_details g
    JOIN teams h ON g.home_team_id = h.team_id
    JOIN teams a ON g.away_team_id = a.team_id
"#;

/// Index of the embedding column when appended after `GAME_COLUMNS`.
const GAME_EMBEDDING_IDX: usize = 16;

const PLAYER_COLUMNS: &str = r#"
    pbs.person_id, pbs.game_id, pbs.team_id, pbs.points, pbs.offensive_reb, pbs.defensive_reb,
    pbs.assists, pbs.steals, pbs.blocks, pbs.turnovers, pbs.fg2_made, pbs.fg2_attempted,
    pbs.fg3_made, pbs.fg3_attempted, pbs.ft_made, pbs.ft_attempted, pbs.offensive_fouls,
    pbs.defensive_fouls, pbs.seconds,
    p.player_id, p.first_name, p.last_name,
    t.team_id, t.city, t.name, t.abbreviation,
    o.team_id, o.city, o.name, o.abbreviation,
    g.game_id, g.season, g.game_timestamp, g.home_team_id, g.away_team_id,
    g.home_points, g.away_points, g.winning_team_id
"#;

// Box scores with a missing player, team or game fall out of the inner joins.
const PLAYER_JOINS: &str = r#"
    FROM player_box_scores pbs
    JOIN players p ON pbs.person_id = p.player_id
    JOIN game_details g ON pbs.game_id = g.game_id
    JOIN teams t ON pbs.team_id = t.team_id
    JOIN teams o ON o.team_id = CASE
        WHEN pbs.team_id = g.home_team_id THEN g.away_team_id
        ELSE g.home_team_id
    END
"#;

/// Index of the embedding column when appended after `PLAYER_COLUMNS`.
const PLAYER_EMBEDDING_IDX: usize = 38;

/// SQLite-based stats store.
pub struct SqliteStatsStore {
    conn: Mutex<Connection>,
}

impl SqliteStatsStore {
    /// Open (or create) a stats database.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::from_connection(conn)?;
        info!("Opened stats database at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(TEAMS_DDL)?;
        conn.execute_batch(PLAYERS_DDL)?;
        conn.execute_batch(GAMES_DDL)?;
        conn.execute_batch(BOX_SCORES_DDL)?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_embedding_columns()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CourtsideError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Add the embedding columns to tables that were loaded without them.
    pub fn ensure_embedding_columns(&self) -> Result<()> {
        let conn = self.lock()?;
        for (table, column) in [("game_details", "game_embedding"), ("player_box_scores", "player_embedding")] {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
            let columns = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            if !columns.iter().any(|c| c == column) {
                conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} BLOB;", table, column))?;
                info!("Added {}.{} column", table, column);
            }
        }
        Ok(())
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

// Full-replace loaders used by ingestion (not part of StatsStore).
impl SqliteStatsStore {
    /// Replace all four tables in one transaction. On error nothing changes.
    ///
    /// Existing embeddings are discarded.
    #[instrument(skip_all)]
    pub fn replace_all(&self, data: &Dataset) -> Result<IngestReport> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let report = IngestReport {
            teams: load_teams(&tx, &data.teams)?,
            players: load_players(&tx, &data.players)?,
            games: load_games(&tx, &data.games)?,
            box_scores: load_box_scores(&tx, &data.box_scores)?,
        };
        tx.commit()?;
        info!(
            "Loaded {} teams, {} players, {} games, {} box scores",
            report.teams, report.players, report.games, report.box_scores
        );
        Ok(report)
    }

    /// Drop and rebuild `teams`.
    pub fn replace_teams(&self, teams: &[TeamRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let n = load_teams(&tx, teams)?;
        tx.commit()?;
        Ok(n)
    }

    /// Drop and rebuild `players`.
    pub fn replace_players(&self, players: &[PlayerRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let n = load_players(&tx, players)?;
        tx.commit()?;
        Ok(n)
    }

    /// Drop and rebuild `game_details`. Existing embeddings are discarded.
    pub fn replace_games(&self, games: &[GameRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let n = load_games(&tx, games)?;
        tx.commit()?;
        Ok(n)
    }

    /// Drop and rebuild `player_box_scores`. Existing embeddings are discarded.
    pub fn replace_box_scores(&self, box_scores: &[PlayerBoxScoreRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let n = load_box_scores(&tx, box_scores)?;
        tx.commit()?;
        Ok(n)
    }
}

fn load_teams(conn: &Connection, teams: &[TeamRecord]) -> Result<usize> {
    conn.execute_batch("DROP TABLE IF EXISTS teams;")?;
    conn.execute_batch(TEAMS_DDL)?;
    for team in teams {
        conn.execute(
            "INSERT INTO teams (team_id, city, name, abbreviation) VALUES (?1, ?2, ?3, ?4)",
            params![team.team_id, team.city, team.name, team.abbreviation],
        )?;
    }
    debug!("Loaded {} teams", teams.len());
    Ok(teams.len())
}

fn load_players(conn: &Connection, players: &[PlayerRecord]) -> Result<usize> {
    conn.execute_batch("DROP TABLE IF EXISTS players;")?;
    conn.execute_batch(PLAYERS_DDL)?;
    for player in players {
        conn.execute(
            "INSERT INTO players (player_id, first_name, last_name) VALUES (?1, ?2, ?3)",
            params![player.player_id, player.first_name, player.last_name],
        )?;
    }
    debug!("Loaded {} players", players.len());
    Ok(players.len())
}

fn load_games(conn: &Connection, games: &[GameRecord]) -> Result<usize> {
    conn.execute_batch("DROP TABLE IF EXISTS game_details;")?;
    conn.execute_batch(GAMES_DDL)?;
    for game in games {
        conn.execute(
            r#"
            INSERT INTO game_details
            (game_id, season, game_timestamp, home_team_id, away_team_id,
             home_points, away_points, winning_team_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                game.game_id,
                game.season,
                game.game_timestamp.to_rfc3339(),
                game.home_team_id,
                game.away_team_id,
                game.home_points,
                game.away_points,
                game.winning_team_id,
            ],
        )?;
    }
    debug!("Loaded {} games", games.len());
    Ok(games.len())
}

fn load_box_scores(conn: &Connection, box_scores: &[PlayerBoxScoreRecord]) -> Result<usize> {
    conn.execute_batch("DROP TABLE IF EXISTS player_box_scores;")?;
    conn.execute_batch(BOX_SCORES_DDL)?;
    for s in box_scores {
        conn.execute(
            r#"
            INSERT INTO player_box_scores
            (person_id, game_id, team_id, points, offensive_reb, defensive_reb, assists,
             steals, blocks, turnovers, fg2_made, fg2_attempted, fg3_made, fg3_attempted,
             ft_made, ft_attempted, offensive_fouls, defensive_fouls, seconds)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                s.person_id,
                s.game_id,
                s.team_id,
                s.points,
                s.offensive_reb,
                s.defensive_reb,
                s.assists,
                s.steals,
                s.blocks,
                s.turnovers,
                s.fg2_made,
                s.fg2_attempted,
                s.fg3_made,
                s.fg3_attempted,
                s.ft_made,
                s.ft_attempted,
                s.offensive_fouls,
                s.defensive_fouls,
                s.seconds,
            ],
        )?;
    }
    debug!("Loaded {} player box scores", box_scores.len());
    Ok(box_scores.len())
}

fn team_at(row: &Row<'_>, start: usize) -> rusqlite::Result<TeamRecord> {
    Ok(TeamRecord {
        team_id: row.get(start)?,
        city: row.get(start + 1)?,
        name: row.get(start + 2)?,
        abbreviation: row.get(start + 3)?,
    })
}

fn game_at(row: &Row<'_>, start: usize) -> rusqlite::Result<GameRecord> {
    let ts_idx = start + 2;
    let raw: String = row.get(ts_idx)?;
    let game_timestamp = parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            ts_idx,
            Type::Text,
            format!("unrecognized timestamp: {}", raw).into(),
        )
    })?;

    Ok(GameRecord {
        game_id: row.get(start)?,
        season: row.get(start + 1)?,
        game_timestamp,
        home_team_id: row.get(start + 3)?,
        away_team_id: row.get(start + 4)?,
        home_points: row.get(start + 5)?,
        away_points: row.get(start + 6)?,
        winning_team_id: row.get(start + 7)?,
    })
}

fn game_row_from(row: &Row<'_>) -> rusqlite::Result<GameRow> {
    Ok(GameRow {
        game: game_at(row, 0)?,
        home: team_at(row, 8)?,
        away: team_at(row, 12)?,
    })
}

fn player_row_from(row: &Row<'_>) -> rusqlite::Result<PlayerRow> {
    Ok(PlayerRow {
        stats: PlayerBoxScoreRecord {
            person_id: row.get(0)?,
            game_id: row.get(1)?,
            team_id: row.get(2)?,
            points: row.get(3)?,
            offensive_reb: row.get(4)?,
            defensive_reb: row.get(5)?,
            assists: row.get(6)?,
            steals: row.get(7)?,
            blocks: row.get(8)?,
            turnovers: row.get(9)?,
            fg2_made: row.get(10)?,
            fg2_attempted: row.get(11)?,
            fg3_made: row.get(12)?,
            fg3_attempted: row.get(13)?,
            ft_made: row.get(14)?,
            ft_attempted: row.get(15)?,
            offensive_fouls: row.get(16)?,
            defensive_fouls: row.get(17)?,
            seconds: row.get(18)?,
        },
        player: PlayerRecord {
            player_id: row.get(19)?,
            first_name: row.get(20)?,
            last_name: row.get(21)?,
        },
        team: team_at(row, 22)?,
        opponent: team_at(row, 26)?,
        game: game_at(row, 30)?,
    })
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn query_nearest_games(conn: &Connection, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<GameRow>>> {
    let sql = format!(
        "SELECT {}, g.game_embedding {} WHERE g.game_embedding IS NOT NULL",
        GAME_COLUMNS, GAME_JOINS
    );
    let mut stmt = conn.prepare(&sql)?;
    let candidates = stmt
        .query_map([], |row| {
            let bytes: Vec<u8> = row.get(GAME_EMBEDDING_IDX)?;
            Ok((game_row_from(row)?, SqliteStatsStore::bytes_to_embedding(&bytes)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let results = rank(query_embedding, candidates, limit)?;
    debug!("Found {} nearest games", results.len());
    Ok(results)
}

fn query_nearest_players(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<SearchResult<PlayerRow>>> {
    let sql = format!(
        "SELECT {}, pbs.player_embedding {} WHERE pbs.player_embedding IS NOT NULL",
        PLAYER_COLUMNS, PLAYER_JOINS
    );
    let mut stmt = conn.prepare(&sql)?;
    let candidates = stmt
        .query_map([], |row| {
            let bytes: Vec<u8> = row.get(PLAYER_EMBEDDING_IDX)?;
            Ok((player_row_from(row)?, SqliteStatsStore::bytes_to_embedding(&bytes)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let results = rank(query_embedding, candidates, limit)?;
    debug!("Found {} nearest box scores", results.len());
    Ok(results)
}

fn query_players_in_games(conn: &Connection, game_ids: &[i64]) -> Result<Vec<PlayerRow>> {
    if game_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; game_ids.len()].join(", ");
    let sql = format!(
        "SELECT {} {} WHERE pbs.game_id IN ({}) ORDER BY pbs.game_id, pbs.points DESC, pbs.person_id",
        PLAYER_COLUMNS, PLAYER_JOINS, placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(game_ids.iter()), player_row_from)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!("Fetched {} box scores for {} games", rows.len(), game_ids.len());
    Ok(rows)
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    #[instrument(skip(self, query_embedding))]
    async fn nearest_games(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<GameRow>>> {
        let conn = self.lock()?;
        query_nearest_games(&conn, query_embedding, limit)
    }

    #[instrument(skip(self, query_embedding))]
    async fn nearest_players(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<PlayerRow>>> {
        let conn = self.lock()?;
        query_nearest_players(&conn, query_embedding, limit)
    }

    #[instrument(skip(self))]
    async fn players_in_games(&self, game_ids: &[i64]) -> Result<Vec<PlayerRow>> {
        let conn = self.lock()?;
        query_players_in_games(&conn, game_ids)
    }

    /// Both reads run under one lock and one read transaction.
    #[instrument(skip(self, query_embedding))]
    async fn games_with_players(
        &self,
        query_embedding: &[f32],
        query: RetrievalQuery,
    ) -> Result<(Vec<SearchResult<GameRow>>, PlayerHits)> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let games = query_nearest_games(&tx, query_embedding, query.game_k)?;
        let players = match query.roster_games {
            Some(m) if !games.is_empty() => {
                let ids: Vec<i64> = games.iter().take(m).map(|r| r.row.game.game_id).collect();
                PlayerHits::Roster(query_players_in_games(&tx, &ids)?)
            }
            _ => PlayerHits::Nearest(query_nearest_players(&tx, query_embedding, query.player_k)?),
        };

        tx.commit()?;
        Ok((games, players))
    }

    #[instrument(skip(self))]
    async fn games_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<GameRow>> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} {} WHERE g.game_embedding IS NULL ORDER BY g.game_timestamp DESC, g.game_id DESC LIMIT ?1",
            GAME_COLUMNS, GAME_JOINS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], game_row_from)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn players_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<PlayerRow>> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} {} WHERE pbs.player_embedding IS NULL ORDER BY pbs.game_id DESC, pbs.person_id LIMIT ?1",
            PLAYER_COLUMNS, PLAYER_JOINS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], player_row_from)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[instrument(skip(self, embedding))]
    async fn set_game_embedding(&self, game_id: i64, embedding: &[f32]) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE game_details SET game_embedding = ?1 WHERE game_id = ?2 AND game_embedding IS NULL",
            params![Self::embedding_to_bytes(embedding), game_id],
        )?;
        Ok(updated > 0)
    }

    #[instrument(skip(self, embedding))]
    async fn set_player_embedding(&self, person_id: i64, game_id: i64, embedding: &[f32]) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            r#"
            UPDATE player_box_scores SET player_embedding = ?1
            WHERE person_id = ?2 AND game_id = ?3 AND player_embedding IS NULL
            "#,
            params![Self::embedding_to_bytes(embedding), person_id, game_id],
        )?;
        Ok(updated > 0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            teams: count("SELECT COUNT(*) FROM teams")?,
            players: count("SELECT COUNT(*) FROM players")?,
            games: count("SELECT COUNT(*) FROM game_details")?,
            games_embedded: count("SELECT COUNT(*) FROM game_details WHERE game_embedding IS NOT NULL")?,
            box_scores: count("SELECT COUNT(*) FROM player_box_scores")?,
            box_scores_embedded: count(
                "SELECT COUNT(*) FROM player_box_scores WHERE player_embedding IS NOT NULL",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;
    use crate::vector_store::fixtures::seeded_store;

    #[tokio::test]
    async fn test_roster_fetch_orders_by_game_then_points() {
        let store = seeded_store();

        let rows = store.players_in_games(&[200, 100]).await.unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.stats.key()).collect();
        assert_eq!(keys, vec!["1628369_100", "2544_100", "1629029_200", "2544_200"]);

        let luka = &rows[2];
        assert_eq!(luka.team.abbreviation, "DAL");
        assert_eq!(luka.opponent.abbreviation, "LAL");
        assert_eq!(luka.player.last_name, "Dončić");

        assert!(store.players_in_games(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_games_only_considers_embedded_rows() {
        let store = seeded_store();
        assert!(store.nearest_games(&[1.0, 0.0], 5).await.unwrap().is_empty());

        assert!(store.set_game_embedding(100, &[1.0, 0.0]).await.unwrap());
        assert!(store.set_game_embedding(200, &[0.0, 1.0]).await.unwrap());

        let results = store.nearest_games(&[0.9, 0.1], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row.game.game_id, 100);
        assert_eq!(results[0].row.home.abbreviation, "LAL");
        assert_eq!(results[0].row.away.abbreviation, "BOS");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_embedding_write_is_once_only() {
        let store = seeded_store();

        assert!(store.set_player_embedding(2544, 100, &[1.0, 0.0]).await.unwrap());
        assert!(!store.set_player_embedding(2544, 100, &[0.0, 1.0]).await.unwrap());

        let nearest = store.nearest_players(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(nearest[0].row.stats.key(), "2544_100");
        assert!((nearest[0].score - 1.0).abs() < 0.001);

        let missing = store.players_missing_embedding(None).await.unwrap();
        assert_eq!(missing.len(), 3);
        assert_eq!(store.players_missing_embedding(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let store = seeded_store();
        store.set_game_embedding(100, &[1.0]).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.teams, 3);
        assert_eq!(stats.players, 3);
        assert_eq!(stats.games, 2);
        assert_eq!(stats.games_embedded, 1);
        assert_eq!(stats.box_scores, 5);
        assert_eq!(stats.box_scores_embedded, 0);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_rows() {
        let store = seeded_store();
        store.replace_teams(&[lakers()]).unwrap();
        assert_eq!(store.stats().await.unwrap().teams, 1);
    }

    #[tokio::test]
    async fn test_replace_all_rolls_back_on_failure() {
        let store = seeded_store();
        store.set_game_embedding(100, &[1.0, 0.0]).await.unwrap();

        let dup = box_score(2544, 100, lakers().team_id, 10, (0, 0), 0);
        let data = Dataset {
            teams: vec![lakers()],
            players: Vec::new(),
            games: Vec::new(),
            box_scores: vec![dup.clone(), dup],
        };
        let err = store.replace_all(&data).unwrap_err();
        assert!(matches!(err, CourtsideError::Database(_)));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.teams, 3);
        assert_eq!(stats.games, 2);
        assert_eq!(stats.games_embedded, 1);
    }

    #[tokio::test]
    async fn test_games_with_players_reads_roster_or_nearest() {
        let store = seeded_store();
        store.set_game_embedding(100, &[1.0, 0.0]).await.unwrap();
        store.set_game_embedding(200, &[0.0, 1.0]).await.unwrap();
        store.set_player_embedding(1629029, 200, &[0.0, 1.0]).await.unwrap();

        let leader = RetrievalQuery {
            game_k: 2,
            player_k: 5,
            roster_games: Some(1),
        };
        let (games, players) = store.games_with_players(&[1.0, 0.0], leader).await.unwrap();
        assert_eq!(games[0].row.game.game_id, 100);
        match players {
            PlayerHits::Roster(rows) => {
                let keys: Vec<_> = rows.iter().map(|r| r.stats.key()).collect();
                assert_eq!(keys, vec!["1628369_100", "2544_100"]);
            }
            other => panic!("expected roster, got {:?}", other),
        }

        let regular = RetrievalQuery {
            roster_games: None,
            ..leader
        };
        let (_, players) = store.games_with_players(&[1.0, 0.0], regular).await.unwrap();
        match players {
            PlayerHits::Nearest(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].row.stats.key(), "1629029_200");
            }
            other => panic!("expected nearest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mismatched_query_dimensions_are_an_error() {
        let store = seeded_store();
        store.set_game_embedding(100, &[1.0, 0.0, 0.0]).await.unwrap();

        let err = store.nearest_games(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, CourtsideError::Store(_)));
    }

    #[test]
    fn test_ensure_embedding_columns_on_bare_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE game_details (game_id INTEGER PRIMARY KEY, season INTEGER, game_timestamp TEXT,
             home_team_id INTEGER, away_team_id INTEGER, home_points INTEGER, away_points INTEGER,
             winning_team_id INTEGER);",
        )
        .unwrap();

        let store = SqliteStatsStore::from_connection(conn).unwrap();
        let conn = store.lock().unwrap();
        let has_column: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('game_details') WHERE name = 'game_embedding'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_column, 1);
    }
}
