//! In-memory stats store implementation.
//!
//! Useful for testing and for small hand-built datasets.

use super::{rank, sort_roster, SearchResult, StatsStore, StoreStats};
use crate::error::{CourtsideError, Result};
use crate::records::{GameRecord, GameRow, PlayerBoxScoreRecord, PlayerRecord, PlayerRow, TeamRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    teams: HashMap<i64, TeamRecord>,
    players: HashMap<i64, PlayerRecord>,
    games: BTreeMap<i64, (GameRecord, Option<Vec<f32>>)>,
    box_scores: BTreeMap<(i64, i64), (PlayerBoxScoreRecord, Option<Vec<f32>>)>,
}

impl Tables {
    fn game_row(&self, game: &GameRecord) -> Option<GameRow> {
        Some(GameRow {
            game: game.clone(),
            home: self.teams.get(&game.home_team_id)?.clone(),
            away: self.teams.get(&game.away_team_id)?.clone(),
        })
    }

    /// Join a box score; `None` when any reference is missing.
    fn player_row(&self, stats: &PlayerBoxScoreRecord) -> Option<PlayerRow> {
        let (game, _) = self.games.get(&stats.game_id)?;
        let opponent_id = if stats.team_id == game.home_team_id {
            game.away_team_id
        } else {
            game.home_team_id
        };

        Some(PlayerRow {
            stats: stats.clone(),
            player: self.players.get(&stats.person_id)?.clone(),
            team: self.teams.get(&stats.team_id)?.clone(),
            opponent: self.teams.get(&opponent_id)?.clone(),
            game: game.clone(),
        })
    }
}

/// In-memory stats store.
#[derive(Default)]
pub struct MemoryStatsStore {
    tables: RwLock<Tables>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| CourtsideError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| CourtsideError::Store(format!("Failed to acquire lock: {}", e)))
    }

    pub fn insert_team(&self, team: TeamRecord) -> Result<()> {
        self.write()?.teams.insert(team.team_id, team);
        Ok(())
    }

    pub fn insert_player(&self, player: PlayerRecord) -> Result<()> {
        self.write()?.players.insert(player.player_id, player);
        Ok(())
    }

    pub fn insert_game(&self, game: GameRecord, embedding: Option<Vec<f32>>) -> Result<()> {
        self.write()?.games.insert(game.game_id, (game, embedding));
        Ok(())
    }

    pub fn insert_box_score(&self, stats: PlayerBoxScoreRecord, embedding: Option<Vec<f32>>) -> Result<()> {
        self.write()?
            .box_scores
            .insert((stats.person_id, stats.game_id), (stats, embedding));
        Ok(())
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn nearest_games(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<GameRow>>> {
        let tables = self.read()?;
        let candidates = tables.games.values().filter_map(|(game, embedding)| {
            let embedding = embedding.as_ref()?;
            Some((tables.game_row(game)?, embedding.clone()))
        });
        rank(query_embedding, candidates, limit)
    }

    async fn nearest_players(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<PlayerRow>>> {
        let tables = self.read()?;
        let candidates = tables.box_scores.values().filter_map(|(stats, embedding)| {
            let embedding = embedding.as_ref()?;
            Some((tables.player_row(stats)?, embedding.clone()))
        });
        rank(query_embedding, candidates, limit)
    }

    async fn players_in_games(&self, game_ids: &[i64]) -> Result<Vec<PlayerRow>> {
        let tables = self.read()?;
        let mut rows: Vec<PlayerRow> = tables
            .box_scores
            .values()
            .filter(|(stats, _)| game_ids.contains(&stats.game_id))
            .filter_map(|(stats, _)| tables.player_row(stats))
            .collect();
        sort_roster(&mut rows);
        Ok(rows)
    }

    async fn games_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<GameRow>> {
        let tables = self.read()?;
        Ok(tables
            .games
            .values()
            .rev()
            .filter(|(_, embedding)| embedding.is_none())
            .filter_map(|(game, _)| tables.game_row(game))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn players_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<PlayerRow>> {
        let tables = self.read()?;
        Ok(tables
            .box_scores
            .values()
            .filter(|(_, embedding)| embedding.is_none())
            .filter_map(|(stats, _)| tables.player_row(stats))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn set_game_embedding(&self, game_id: i64, embedding: &[f32]) -> Result<bool> {
        let mut tables = self.write()?;
        match tables.games.get_mut(&game_id) {
            Some((_, slot @ None)) => {
                *slot = Some(embedding.to_vec());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_player_embedding(&self, person_id: i64, game_id: i64, embedding: &[f32]) -> Result<bool> {
        let mut tables = self.write()?;
        match tables.box_scores.get_mut(&(person_id, game_id)) {
            Some((_, slot @ None)) => {
                *slot = Some(embedding.to_vec());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.read()?;
        Ok(StoreStats {
            teams: tables.teams.len(),
            players: tables.players.len(),
            games: tables.games.len(),
            games_embedded: tables.games.values().filter(|(_, e)| e.is_some()).count(),
            box_scores: tables.box_scores.len(),
            box_scores_embedded: tables.box_scores.values().filter(|(_, e)| e.is_some()).count(),
        })
    }
}
