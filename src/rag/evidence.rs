//! Evidence resolution for model output.
//!
//! The model is asked to cite its source row with an inline tag,
//! `|||EVIDENCE:<table>:<id>|||`, and (in batch mode) to answer with a JSON
//! object. Models do not always comply, so resolution runs in stages and
//! records which ones fired:
//!
//! 1. Tag extraction: strip every tag from the text and keep the ones that
//!    point at a row that was actually retrieved.
//! 2. Strict JSON: parse the tag-free text as a JSON object.
//! 3. Recovery: parse the first `{`-delimited JSON object inside the text.
//! 4. Fallback: with no usable tag, cite the top game row, plus the top player
//!    row when the question is about a player or no game was retrieved.
//!
//! None of this can fail. The worst case is an unparsed answer with
//! heuristic evidence.

use super::{RetrievedRow, RowRecord, RowSource};
use crate::records::{GameRow, PlayerRow, GAME_TABLE, PLAYER_TABLE};
use crate::render::{iso_date, long_date};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Question keywords that make the fallback cite a player row.
pub const PLAYER_KEYWORDS: &[&str] = &["scored", "points", "player", "who"];

/// Row id as it appears in evidence: an integer game id, or
/// `"{person_id}_{game_id}"` for a box score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceId {
    Game(i64),
    Player(String),
}

/// A cited row with enough denormalized fields to show it to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub table: String,
    pub id: EvidenceId,
    pub display_name: String,
    pub date: String,
    pub matchup: String,
    /// Home team full name.
    #[serde(default)]
    pub home_team: String,
    /// Away team full name.
    #[serde(default)]
    pub away_team: String,
    /// Final score, home first: "114-106".
    #[serde(default)]
    pub score: String,
    /// Player full name, for box-score rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
}

impl EvidenceItem {
    pub fn from_game(row: &GameRow) -> Self {
        Self {
            table: GAME_TABLE.to_string(),
            id: EvidenceId::Game(row.game.game_id),
            display_name: format!(
                "{} {} - {} {}, {}",
                row.home.full_name(),
                row.game.home_points,
                row.game.away_points,
                row.away.full_name(),
                long_date(&row.game.game_timestamp)
            ),
            date: iso_date(&row.game.game_timestamp),
            matchup: row.matchup(),
            home_team: row.home.full_name(),
            away_team: row.away.full_name(),
            score: format!("{}-{}", row.game.home_points, row.game.away_points),
            player: None,
        }
    }

    pub fn from_player(row: &PlayerRow) -> Self {
        let (home, away) = row.home_away();
        Self {
            table: PLAYER_TABLE.to_string(),
            id: EvidenceId::Player(row.stats.key()),
            display_name: format!(
                "{} ({}) vs {}, {}: {} PTS, {} REB, {} AST",
                row.player.full_name(),
                row.team.abbreviation,
                row.opponent.abbreviation,
                long_date(&row.game.game_timestamp),
                row.stats.points,
                row.stats.rebounds(),
                row.stats.assists
            ),
            date: iso_date(&row.game.game_timestamp),
            matchup: row.matchup(),
            home_team: home.full_name(),
            away_team: away.full_name(),
            score: format!("{}-{}", row.game.home_points, row.game.away_points),
            player: Some(row.player.full_name()),
        }
    }

    pub fn from_row(row: &RetrievedRow) -> Self {
        match &row.record {
            RowRecord::Game(game) => Self::from_game(game),
            RowRecord::Player(player) => Self::from_player(player),
        }
    }
}

/// How the structured result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseOutcome {
    /// The whole tag-free text was a JSON object.
    Strict,
    /// A JSON object was recovered from a `{ ... }` span inside the text.
    Recovered,
    /// No JSON object could be read.
    Unparsed,
}

/// Where the evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationOutcome {
    /// At least one tag resolved to a retrieved row.
    Tagged,
    /// No usable tag; evidence picked by heuristics.
    Fallback,
    /// No usable tag and nothing was retrieved.
    Empty,
}

/// Resolved model output.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Model text with citation tags removed.
    pub answer: String,
    pub result: Option<Value>,
    pub evidence: Vec<EvidenceItem>,
    pub parse: ParseOutcome,
    pub citation: CitationOutcome,
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"\|\|\|\s*EVIDENCE\s*:\s*([A-Za-z_]+)\s*:\s*([0-9_]+)\s*\|\|\|").expect("Invalid regex")
    })
}

/// Resolve raw model output against the rows the prompt was built from.
pub fn resolve(raw: &str, rows: &[RetrievedRow], question: &str) -> Resolution {
    let (answer, cited) = extract_tags(raw);

    let mut evidence: Vec<EvidenceItem> = Vec::new();
    for (table, id) in &cited {
        match find_cited_row(rows, table, id) {
            Some(row) => {
                let item = EvidenceItem::from_row(row);
                if !evidence.iter().any(|e| e.table == item.table && e.id == item.id) {
                    evidence.push(item);
                }
            }
            None => debug!("Dropping citation {}:{} with no matching row", table, id),
        }
    }

    let citation = if !evidence.is_empty() {
        CitationOutcome::Tagged
    } else {
        evidence = fallback_evidence(rows, question);
        if evidence.is_empty() {
            CitationOutcome::Empty
        } else {
            CitationOutcome::Fallback
        }
    };

    let (result, parse) = parse_result(&answer);
    debug!(?parse, ?citation, evidence = evidence.len(), "Resolved model output");

    Resolution {
        answer,
        result,
        evidence,
        parse,
        citation,
    }
}

/// Remove every tag from the text and return the (table, id) pairs found.
fn extract_tags(raw: &str) -> (String, Vec<(String, String)>) {
    let re = tag_regex();
    let cited = re
        .captures_iter(raw)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();
    let answer = re.replace_all(raw, "").trim().to_string();
    (answer, cited)
}

fn find_cited_row<'a>(rows: &'a [RetrievedRow], table: &str, id: &str) -> Option<&'a RetrievedRow> {
    match table {
        GAME_TABLE => {
            let game_id: i64 = id.parse().ok()?;
            rows.iter()
                .find(|r| r.as_game().is_some_and(|g| g.game.game_id == game_id))
        }
        PLAYER_TABLE => {
            let (person, game) = id.split_once('_')?;
            let (person_id, game_id): (i64, i64) = (person.parse().ok()?, game.parse().ok()?);
            rows.iter().find(|r| {
                r.as_player()
                    .is_some_and(|p| p.stats.person_id == person_id && p.stats.game_id == game_id)
            })
        }
        _ => None,
    }
}

fn fallback_evidence(rows: &[RetrievedRow], question: &str) -> Vec<EvidenceItem> {
    let q = question.to_lowercase();
    let wants_player = PLAYER_KEYWORDS.iter().any(|k| q.contains(k));

    let top_game = rows.iter().find_map(|r| r.as_game());
    let mut evidence: Vec<EvidenceItem> = top_game.map(EvidenceItem::from_game).into_iter().collect();

    if wants_player || top_game.is_none() {
        if let Some(player) = top_player(rows, top_game) {
            evidence.push(EvidenceItem::from_player(player));
        }
    }
    evidence
}

/// Most similar player row, or the top game's scoring leader when players
/// came from a roster fetch.
fn top_player<'a>(rows: &'a [RetrievedRow], top_game: Option<&GameRow>) -> Option<&'a PlayerRow> {
    let roster_leader = top_game.and_then(|game| {
        rows.iter()
            .filter(|r| r.source == RowSource::GameRoster)
            .filter_map(|r| r.as_player())
            .filter(|p| p.stats.game_id == game.game.game_id)
            .max_by_key(|p| p.stats.points)
    });
    roster_leader.or_else(|| rows.iter().find_map(|r| r.as_player()))
}

fn parse_result(text: &str) -> (Option<Value>, ParseOutcome) {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return (Some(value), ParseOutcome::Strict);
    }

    // Read one value from each `{` in turn; whatever follows it is ignored.
    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = values.next() {
            return (Some(value), ParseOutcome::Recovered);
        }
    }

    (None, ParseOutcome::Unparsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;
    use serde_json::json;

    fn rows() -> Vec<RetrievedRow> {
        vec![
            RetrievedRow::nearest_game(game_row(22300634), 0.9),
            RetrievedRow::nearest_game(game_row(22300001), 0.7),
            RetrievedRow::nearest_player(player_row(2544, "LeBron", "James", 22300634, 32), 0.8),
            RetrievedRow::nearest_player(player_row(203999, "Nikola", "Jokić", 22300001, 28), 0.6),
        ]
    }

    #[test]
    fn test_game_tag_resolves_and_is_stripped() {
        let raw = "The Lakers beat the Celtics 114-106. |||EVIDENCE:game_details:22300634|||";
        let res = resolve(raw, &rows(), "Who won on Christmas?");

        assert_eq!(res.answer, "The Lakers beat the Celtics 114-106.");
        assert_eq!(res.citation, CitationOutcome::Tagged);
        assert_eq!(res.evidence.len(), 1);
        assert_eq!(res.evidence[0].table, "game_details");
        assert_eq!(res.evidence[0].id, EvidenceId::Game(22300634));
        assert_eq!(res.evidence[0].matchup, "BOS@LAL");
        assert_eq!(res.parse, ParseOutcome::Unparsed);
        assert!(res.result.is_none());
    }

    #[test]
    fn test_player_tag_splits_composite_id() {
        let raw = "LeBron had 32. |||EVIDENCE:player_box_scores:2544_22300634||| \
                   |||EVIDENCE:player_box_scores:2544_22300634|||";
        let res = resolve(raw, &rows(), "How many points did LeBron score?");

        assert_eq!(res.evidence.len(), 1);
        assert_eq!(res.evidence[0].id, EvidenceId::Player("2544_22300634".to_string()));
        assert_eq!(
            serde_json::to_value(&res.evidence[0].id).unwrap(),
            json!("2544_22300634")
        );
    }

    #[test]
    fn test_unretrieved_citation_falls_back() {
        let raw = "Answer. |||EVIDENCE:game_details:99999999||| |||EVIDENCE:teams:1|||";
        let res = resolve(raw, &rows(), "What was the final score?");

        assert_eq!(res.answer, "Answer.");
        assert_eq!(res.citation, CitationOutcome::Fallback);
        assert_eq!(res.evidence.len(), 1);
        assert_eq!(res.evidence[0].id, EvidenceId::Game(22300634));
    }

    #[test]
    fn test_points_question_fallback_cites_game_and_player() {
        let res = resolve("LeBron scored 32.", &rows(), "How many points did LeBron James score?");

        assert_eq!(res.citation, CitationOutcome::Fallback);
        let ids: Vec<_> = res.evidence.iter().map(|e| e.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                EvidenceId::Game(22300634),
                EvidenceId::Player("2544_22300634".to_string())
            ]
        );
    }

    #[test]
    fn test_fallback_prefers_roster_leader_of_top_game() {
        let rows = vec![
            RetrievedRow::nearest_game(game_row(200), 0.9),
            RetrievedRow::nearest_game(game_row(100), 0.8),
            RetrievedRow::roster_player(player_row(1, "A", "One", 100, 40)),
            RetrievedRow::roster_player(player_row(2, "B", "Two", 200, 35)),
            RetrievedRow::roster_player(player_row(3, "C", "Three", 200, 12)),
        ];
        let res = resolve("No tag here", &rows, "Who was the leading scorer?");

        assert_eq!(res.evidence[1].id, EvidenceId::Player("2_200".to_string()));
    }

    #[test]
    fn test_fallback_without_games_cites_player() {
        let rows = vec![RetrievedRow::nearest_player(player_row(2544, "LeBron", "James", 1, 30), 0.5)];
        let res = resolve("Something", &rows, "What happened on Christmas?");
        assert_eq!(res.evidence.len(), 1);
        assert_eq!(res.evidence[0].table, "player_box_scores");

        let empty = resolve("Something", &[], "What happened?");
        assert_eq!(empty.citation, CitationOutcome::Empty);
        assert!(empty.evidence.is_empty());
    }

    #[test]
    fn test_strict_json_result() {
        let raw = r#"{"winner": "Los Angeles Lakers", "points": 114} |||EVIDENCE:game_details:22300634|||"#;
        let res = resolve(raw, &rows(), "Who won?");

        assert_eq!(res.parse, ParseOutcome::Strict);
        assert_eq!(res.result, Some(json!({"winner": "Los Angeles Lakers", "points": 114})));
    }

    #[test]
    fn test_recovers_json_wrapped_in_prose() {
        let raw = "Here is the answer:\n```json\n{\"player\": {\"name\": \"Luka Doncic\"}}\n```\nHope that helps!";
        let res = resolve(raw, &rows(), "Who scored 41?");

        assert_eq!(res.parse, ParseOutcome::Recovered);
        assert_eq!(res.result, Some(json!({"player": {"name": "Luka Doncic"}})));
    }

    #[test]
    fn test_recovery_stops_at_end_of_first_object() {
        let raw = "Answer:\n{\"winner\": \"Los Angeles Lakers\"}\nScore was {114-106}.";
        let res = resolve(raw, &rows(), "Who won?");

        assert_eq!(res.parse, ParseOutcome::Recovered);
        assert_eq!(res.result, Some(json!({"winner": "Los Angeles Lakers"})));
    }

    #[test]
    fn test_recovery_skips_brace_text_before_object() {
        let raw = "Final {114-106}, so: {\"winner\": \"Los Angeles Lakers\"}";
        let res = resolve(raw, &rows(), "Who won?");

        assert_eq!(res.parse, ParseOutcome::Recovered);
        assert_eq!(res.result, Some(json!({"winner": "Los Angeles Lakers"})));
    }

    #[test]
    fn test_evidence_carries_teams_and_score() {
        let game = EvidenceItem::from_row(&rows()[0]);
        assert_eq!(game.home_team, "Los Angeles Lakers");
        assert_eq!(game.away_team, "Boston Celtics");
        assert_eq!(game.score, "114-106");
        assert!(game.player.is_none());
        assert!(serde_json::to_value(&game).unwrap().get("player").is_none());

        let player = EvidenceItem::from_row(&rows()[2]);
        assert_eq!(player.player.as_deref(), Some("LeBron James"));
        assert_eq!(player.home_team, "Los Angeles Lakers");
        assert_eq!(player.score, "114-106");
    }

    #[test]
    fn test_broken_json_is_unparsed_not_fatal() {
        let res = resolve("{\"winner\": \"Lakers\",", &rows(), "Who won?");
        assert_eq!(res.parse, ParseOutcome::Unparsed);
        assert!(res.result.is_none());
        assert!(!res.evidence.is_empty());
    }
}
