//! Context building for answer prompts.

use super::classify::{StatCategories, StatCategory};
use super::RetrievedRow;
use crate::records::{GameRow, PlayerRow};
use crate::render::{ascii_fold, long_date};

/// Format retrieved rows as the prompt's context block.
///
/// Games are listed first in retrieval order, then players sorted by game id
/// and descending points so a game's leader reads first. Every line starts
/// with the citation key the model is asked to quote.
pub fn build_context(rows: &[RetrievedRow], categories: &StatCategories) -> String {
    let games: Vec<String> = rows
        .iter()
        .filter_map(|r| r.as_game().map(|g| format_game_line(&r.citation_key(), g)))
        .collect();

    let mut players: Vec<(&RetrievedRow, &PlayerRow)> =
        rows.iter().filter_map(|r| r.as_player().map(|p| (r, p))).collect();
    players.sort_by(|(_, a), (_, b)| {
        a.stats
            .game_id
            .cmp(&b.stats.game_id)
            .then(b.stats.points.cmp(&a.stats.points))
    });
    let players: Vec<String> = players
        .into_iter()
        .map(|(r, p)| format_player_line(&r.citation_key(), p, categories))
        .collect();

    format!(
        "=== Games ===\n{}\n\n=== Players ===\n{}",
        section_body(&games),
        section_body(&players)
    )
}

fn section_body(lines: &[String]) -> String {
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn format_game_line(key: &str, row: &GameRow) -> String {
    let game = &row.game;
    format!(
        "[{}] {} | {} season ({}) | {} {} - {} {} | Winner: {}",
        key,
        long_date(&game.game_timestamp),
        game.season,
        game.season_span(),
        row.home.label(),
        game.home_points,
        game.away_points,
        row.away.label(),
        row.winner().full_name(),
    )
}

fn format_player_line(key: &str, row: &PlayerRow, categories: &StatCategories) -> String {
    let name = row.player.full_name();
    let folded = ascii_fold(&name);
    let name = if folded == name {
        name
    } else {
        format!("{} ({})", name, folded)
    };

    let mut line = format!(
        "[{}] Game {}, {} | {} | {} vs {}",
        key,
        row.stats.game_id,
        long_date(&row.game.game_timestamp),
        name,
        row.team.full_name(),
        row.opponent.full_name(),
    );
    for category in categories.iter() {
        line.push_str(&format!(" | {}: {}", category, stat_value(row, category)));
    }
    line
}

fn stat_value(row: &PlayerRow, category: StatCategory) -> u32 {
    let stats = &row.stats;
    match category {
        StatCategory::Points => stats.points,
        StatCategory::Rebounds => stats.rebounds(),
        StatCategory::Assists => stats.assists,
        StatCategory::Steals => stats.steals,
        StatCategory::Blocks => stats.blocks,
        StatCategory::Turnovers => stats.turnovers,
    }
}
