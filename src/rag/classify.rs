//! Keyword classification of questions.
//!
//! Matching is plain substring search on the lowercased question. That keeps
//! recall high ("led" catches "who led the Lakers") at the cost of precision
//! ("led" also matches "scheduled"). A false positive only changes which
//! player rows are fetched, never the game rows.

use std::fmt;

/// Phrases that mark a question as asking for a per-game leader.
pub const LEADER_PHRASES: &[&str] = &["leading", "leader", "led", "most", "highest", "top", "who was the"];

/// A counting stat the context can list for each player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatCategory {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
}

impl StatCategory {
    pub fn label(&self) -> &'static str {
        match self {
            StatCategory::Points => "Points",
            StatCategory::Rebounds => "Rebounds",
            StatCategory::Assists => "Assists",
            StatCategory::Steals => "Steals",
            StatCategory::Blocks => "Blocks",
            StatCategory::Turnovers => "Turnovers",
        }
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered set of categories to show. Always holds points, rebounds and assists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCategories(Vec<StatCategory>);

impl StatCategories {
    pub fn contains(&self, category: StatCategory) -> bool {
        self.0.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = StatCategory> + '_ {
        self.0.iter().copied()
    }

    fn insert(&mut self, category: StatCategory) {
        if !self.0.contains(&category) {
            self.0.push(category);
            self.0.sort();
        }
    }
}

impl Default for StatCategories {
    fn default() -> Self {
        Self(vec![StatCategory::Points, StatCategory::Rebounds, StatCategory::Assists])
    }
}

/// What the question asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_leader: bool,
    pub categories: StatCategories,
}

/// Classify a question.
pub fn classify(question: &str) -> Classification {
    let q = question.to_lowercase();

    let is_leader = LEADER_PHRASES.iter().any(|phrase| q.contains(phrase));

    let mut categories = StatCategories::default();
    for (needle, category) in [
        ("steal", StatCategory::Steals),
        ("block", StatCategory::Blocks),
        ("turnover", StatCategory::Turnovers),
    ] {
        if q.contains(needle) {
            categories.insert(category);
        }
    }

    Classification { is_leader, categories }
}
