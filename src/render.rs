//! Natural-language rendering of stats rows.
//!
//! The rendered text is what gets embedded, so it repeats the same facts in
//! several phrasings (three date formats, season year and span, names with
//! and without diacritics). Questions phrased around a date, a team or a
//! holiday then land close to the right row.

use crate::records::{GameRow, PlayerRow};
use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

/// Threshold for a category to count toward a double-double.
const MILESTONE_THRESHOLD: u32 = 10;

/// Double-double / triple-double label for a stat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    DoubleDouble,
    TripleDouble,
}

impl Milestone {
    /// Classify from points, rebounds and assists.
    ///
    /// Exactly two categories at 10+ is a double-double; all three is a
    /// triple-double.
    pub fn from_line(points: u32, rebounds: u32, assists: u32) -> Option<Self> {
        let count = [points, rebounds, assists]
            .iter()
            .filter(|v| **v >= MILESTONE_THRESHOLD)
            .count();
        match count {
            3 => Some(Milestone::TripleDouble),
            2 => Some(Milestone::DoubleDouble),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Milestone::DoubleDouble => "Double-Double",
            Milestone::TripleDouble => "Triple-Double",
        }
    }
}

/// Strip diacritics and drop anything else outside ASCII: "Dončić" -> "Doncic".
pub fn ascii_fold(text: &str) -> String {
    text.nfd().filter(|c| c.is_ascii()).collect()
}

/// "December 25, 2023"
pub fn long_date(ts: &DateTime<Utc>) -> String {
    ts.format("%B %d, %Y").to_string()
}

/// "12/25/2023"
pub fn slash_date(ts: &DateTime<Utc>) -> String {
    ts.format("%m/%d/%Y").to_string()
}

/// "2023-12-25"
pub fn iso_date(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn date_variants(ts: &DateTime<Utc>) -> String {
    format!("{} | {} | {}", long_date(ts), slash_date(ts), iso_date(ts))
}

/// Render a game row for embedding.
pub fn render_game(row: &GameRow) -> String {
    let game = &row.game;
    format!(
        "{dates} | {season} | {span} | Home: {home} | Away: {away} | Matchup: {matchup} | \
         Score: {home_name} {home_pts} - {away_pts} {away_name} | Winner: {winner} victory",
        dates = date_variants(&game.game_timestamp),
        season = game.season,
        span = game.season_span(),
        home = row.home.label(),
        away = row.away.label(),
        matchup = row.matchup(),
        home_name = row.home.full_name(),
        home_pts = game.home_points,
        away_pts = game.away_points,
        away_name = row.away.full_name(),
        winner = row.winner().label(),
    )
}

/// Render a player box-score row for embedding.
pub fn render_player(row: &PlayerRow) -> String {
    let stats = &row.stats;
    let name = row.player.full_name();
    let rebounds = stats.rebounds();

    let mut text = format!(
        "{name} | {name_ascii} | {dates} | {season} | {span} | Team: {team} | Opponent: {opponent} | \
         Matchup: {matchup} | {team_name} vs {opponent_name} | Points: {pts} | Rebounds: {reb} | \
         Assists: {ast} | Steals: {stl} | Blocks: {blk} | Turnovers: {tov}",
        name_ascii = ascii_fold(&name),
        dates = date_variants(&row.game.game_timestamp),
        season = row.game.season,
        span = row.game.season_span(),
        team = row.team.label(),
        opponent = row.opponent.label(),
        matchup = row.matchup(),
        team_name = row.team.full_name(),
        opponent_name = row.opponent.full_name(),
        pts = stats.points,
        reb = rebounds,
        ast = stats.assists,
        stl = stats.steals,
        blk = stats.blocks,
        tov = stats.turnovers,
    );

    if let Some(milestone) = Milestone::from_line(stats.points, rebounds, stats.assists) {
        text.push_str(" | ");
        text.push_str(milestone.label());
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;

    #[test]
    fn test_milestones() {
        assert_eq!(Milestone::from_line(12, 11, 3), Some(Milestone::DoubleDouble));
        assert_eq!(Milestone::from_line(10, 10, 10), Some(Milestone::TripleDouble));
        assert_eq!(Milestone::from_line(30, 9, 9), None);
        assert_eq!(Milestone::from_line(9, 9, 9), None);
    }

    #[test]
    fn test_ascii_fold() {
        assert_eq!(ascii_fold("Dončić"), "Doncic");
        assert_eq!(ascii_fold("Nikola Jokić"), "Nikola Jokic");
        assert_eq!(ascii_fold("LeBron James"), "LeBron James");
    }

    #[test]
    fn test_render_game() {
        let text = render_game(&game_row(22300634));

        assert!(text.starts_with("December 25, 2023 | 12/25/2023 | 2023-12-25 | 2023 | 2023-24"));
        assert!(text.contains("Home: Los Angeles Lakers (LAL)"));
        assert!(text.contains("Away: Boston Celtics (BOS)"));
        assert!(text.contains("Matchup: BOS@LAL"));
        assert!(text.contains("Score: Los Angeles Lakers 114 - 106 Boston Celtics"));
        assert!(text.ends_with("Winner: Los Angeles Lakers (LAL) victory"));
    }

    #[test]
    fn test_render_game_away_winner() {
        let mut row = game_row(1);
        row.game.home_points = 99;
        row.game.winning_team_id = row.game.away_team_id;
        assert!(render_game(&row).ends_with("Winner: Boston Celtics (BOS) victory"));
    }

    #[test]
    fn test_render_player() {
        let mut row = player_row(1629029, "Luka", "Dončić", 22300634, 28);
        row.team = mavericks();
        row.stats.team_id = row.team.team_id;
        row.game.home_team_id = row.team.team_id;
        row.stats.offensive_reb = 3;
        row.stats.defensive_reb = 8;
        row.stats.assists = 10;

        let text = render_player(&row);
        assert!(text.starts_with("Luka Dončić | Luka Doncic | December 25, 2023"));
        assert!(text.contains("Team: Dallas Mavericks (DAL)"));
        assert!(text.contains("Opponent: Boston Celtics (BOS)"));
        assert!(text.contains("Matchup: BOS@DAL"));
        assert!(text.contains("Rebounds: 11"));
        assert!(text.ends_with("Triple-Double"));
    }

    #[test]
    fn test_render_player_rebounds_are_summed() {
        let mut row = player_row(2544, "LeBron", "James", 1, 12);
        row.stats.offensive_reb = 4;
        row.stats.defensive_reb = 7;
        row.stats.assists = 3;

        let text = render_player(&row);
        assert!(text.contains(&format!("Rebounds: {}", row.stats.offensive_reb + row.stats.defensive_reb)));
        assert!(text.ends_with("Double-Double"));
        assert!(!text.contains("Triple-Double"));
    }
}
