//! Row retrieval for one question.

use super::classify::{classify, Classification};
use super::RetrievedRow;
use crate::error::Result;
use crate::vector_store::{PlayerHits, RetrievalQuery, StatsStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Picks the game and player rows a question is answered from.
///
/// Games always come from vector similarity. Players depend on the question:
/// a leader question ("who led ...") gets the full box score of the top games,
/// since the leader may not be among the nearest player rows. Anything else
/// gets the nearest player rows. Games and players come from one store read.
pub struct Retriever {
    store: Arc<dyn StatsStore>,
    game_k: usize,
    player_k: usize,
    leader_games: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn StatsStore>, game_k: usize, player_k: usize, leader_games: usize) -> Self {
        Self {
            store,
            game_k,
            player_k,
            leader_games,
        }
    }

    /// Retrieve rows for a question whose embedding is `query_embedding`.
    pub async fn retrieve(&self, query_embedding: &[f32], question: &str) -> Result<Vec<RetrievedRow>> {
        self.retrieve_classified(query_embedding, &classify(question)).await
    }

    /// Retrieve rows for an already classified question.
    ///
    /// Games come first in similarity order, players after. Roster rows keep
    /// the store's (game id, points descending) order.
    #[instrument(skip(self, query_embedding), fields(leader = classification.is_leader))]
    pub async fn retrieve_classified(
        &self,
        query_embedding: &[f32],
        classification: &Classification,
    ) -> Result<Vec<RetrievedRow>> {
        let query = RetrievalQuery {
            game_k: self.game_k,
            player_k: self.player_k,
            roster_games: classification.is_leader.then_some(self.leader_games),
        };
        let (games, players) = self.store.games_with_players(query_embedding, query).await?;

        let mut rows: Vec<RetrievedRow> = games
            .into_iter()
            .map(|r| RetrievedRow::nearest_game(r.row, r.score))
            .collect();

        match players {
            PlayerHits::Roster(roster) => {
                debug!("Leader question: {} roster rows", roster.len());
                rows.extend(roster.into_iter().map(RetrievedRow::roster_player));
            }
            PlayerHits::Nearest(players) => {
                debug!("{} nearest player rows", players.len());
                rows.extend(
                    players
                        .into_iter()
                        .map(|r| RetrievedRow::nearest_player(r.row, r.score)),
                );
            }
        }

        Ok(rows)
    }
}
