//! Typed records for the stats tables and their joined views.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Table holding one row per game.
pub const GAME_TABLE: &str = "game_details";
/// Table holding one row per (player, game).
pub const PLAYER_TABLE: &str = "player_box_scores";

/// Static team reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: i64,
    pub city: String,
    pub name: String,
    pub abbreviation: String,
}

impl TeamRecord {
    /// City and name, e.g. "Los Angeles Lakers".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.city, self.name)
    }

    /// Full name with abbreviation, e.g. "Los Angeles Lakers (LAL)".
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.city, self.name, self.abbreviation)
    }
}

/// Static player reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl PlayerRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A single game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: i64,
    /// Year the season started (2023 for 2023-24).
    pub season: i32,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub game_timestamp: DateTime<Utc>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_points: u32,
    pub away_points: u32,
    pub winning_team_id: i64,
}

impl GameRecord {
    /// Check the winner invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.winning_team_id != self.home_team_id && self.winning_team_id != self.away_team_id {
            return Err(format!(
                "game {}: winning team {} is neither home ({}) nor away ({})",
                self.game_id, self.winning_team_id, self.home_team_id, self.away_team_id
            ));
        }
        Ok(())
    }

    pub fn home_won(&self) -> bool {
        self.winning_team_id == self.home_team_id
    }

    /// Season span label, e.g. "2023-24".
    pub fn season_span(&self) -> String {
        season_span(self.season)
    }
}

/// Format a season start year as a span label.
pub fn season_span(season: i32) -> String {
    format!("{}-{:02}", season, (season + 1).rem_euclid(100))
}

/// One player's statistical line in one game.
///
/// `(person_id, game_id)` is the key; `person_id` alone repeats across games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBoxScoreRecord {
    pub person_id: i64,
    pub game_id: i64,
    pub team_id: i64,
    pub points: u32,
    pub offensive_reb: u32,
    pub defensive_reb: u32,
    pub assists: u32,
    pub steals: u32,
    pub blocks: u32,
    pub turnovers: u32,
    pub fg2_made: u32,
    pub fg2_attempted: u32,
    pub fg3_made: u32,
    pub fg3_attempted: u32,
    pub ft_made: u32,
    pub ft_attempted: u32,
    pub offensive_fouls: u32,
    pub defensive_fouls: u32,
    pub seconds: u32,
}

impl PlayerBoxScoreRecord {
    pub fn rebounds(&self) -> u32 {
        self.offensive_reb + self.defensive_reb
    }

    /// Composite key used in citations: `"{person_id}_{game_id}"`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.person_id, self.game_id)
    }
}

/// A game joined with both teams.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub game: GameRecord,
    pub home: TeamRecord,
    pub away: TeamRecord,
}

impl GameRow {
    pub fn winner(&self) -> &TeamRecord {
        if self.game.home_won() {
            &self.home
        } else {
            &self.away
        }
    }

    /// Matchup string, away team first: "BOS@LAL".
    pub fn matchup(&self) -> String {
        format!("{}@{}", self.away.abbreviation, self.home.abbreviation)
    }
}

/// A box score joined with the player, both teams and the game.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRow {
    pub stats: PlayerBoxScoreRecord,
    pub player: PlayerRecord,
    pub team: TeamRecord,
    pub opponent: TeamRecord,
    pub game: GameRecord,
}

impl PlayerRow {
    pub fn is_home(&self) -> bool {
        self.stats.team_id == self.game.home_team_id
    }

    /// The two teams as (home, away).
    pub fn home_away(&self) -> (&TeamRecord, &TeamRecord) {
        if self.is_home() {
            (&self.team, &self.opponent)
        } else {
            (&self.opponent, &self.team)
        }
    }

    /// Matchup string, away team first.
    pub fn matchup(&self) -> String {
        let (home, away) = self.home_away();
        format!("{}@{}", away.abbreviation, home.abbreviation)
    }
}

/// Parse the timestamp formats seen in exported datasets.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%#z", "%Y-%m-%dT%H:%M:%S%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {}", raw)))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built rows shared by tests across modules.

    use super::*;

    pub fn lakers() -> TeamRecord {
        TeamRecord {
            team_id: 1610612747,
            city: "Los Angeles".to_string(),
            name: "Lakers".to_string(),
            abbreviation: "LAL".to_string(),
        }
    }

    pub fn celtics() -> TeamRecord {
        TeamRecord {
            team_id: 1610612738,
            city: "Boston".to_string(),
            name: "Celtics".to_string(),
            abbreviation: "BOS".to_string(),
        }
    }

    pub fn mavericks() -> TeamRecord {
        TeamRecord {
            team_id: 1610612742,
            city: "Dallas".to_string(),
            name: "Mavericks".to_string(),
            abbreviation: "DAL".to_string(),
        }
    }

    pub fn game(game_id: i64, home: &TeamRecord, away: &TeamRecord, home_points: u32, away_points: u32) -> GameRecord {
        GameRecord {
            game_id,
            season: 2023,
            game_timestamp: Utc.with_ymd_and_hms(2023, 12, 25, 22, 0, 0).unwrap(),
            home_team_id: home.team_id,
            away_team_id: away.team_id,
            home_points,
            away_points,
            winning_team_id: if home_points > away_points { home.team_id } else { away.team_id },
        }
    }

    pub fn player(player_id: i64, first: &str, last: &str) -> PlayerRecord {
        PlayerRecord {
            player_id,
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    pub fn box_score(person_id: i64, game_id: i64, team_id: i64, points: u32, rebounds: (u32, u32), assists: u32) -> PlayerBoxScoreRecord {
        PlayerBoxScoreRecord {
            person_id,
            game_id,
            team_id,
            points,
            offensive_reb: rebounds.0,
            defensive_reb: rebounds.1,
            assists,
            steals: 1,
            blocks: 0,
            turnovers: 2,
            fg2_made: 0,
            fg2_attempted: 0,
            fg3_made: 0,
            fg3_attempted: 0,
            ft_made: 0,
            ft_attempted: 0,
            offensive_fouls: 0,
            defensive_fouls: 0,
            seconds: 2000,
        }
    }

    pub fn game_row(game_id: i64) -> GameRow {
        let (home, away) = (lakers(), celtics());
        GameRow {
            game: game(game_id, &home, &away, 114, 106),
            home,
            away,
        }
    }

    pub fn player_row(person_id: i64, first: &str, last: &str, game_id: i64, points: u32) -> PlayerRow {
        let (home, away) = (lakers(), celtics());
        PlayerRow {
            stats: box_score(person_id, game_id, home.team_id, points, (1, 5), 4),
            player: player(person_id, first, last),
            team: home.clone(),
            opponent: away.clone(),
            game: game(game_id, &home, &away, 114, 106),
        }
    }
}
