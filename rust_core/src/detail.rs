//! Play-by-play detail matching
//!
//! Goal and penalty observations often arrive before the scorer, assists or
//! infraction are known. These helpers search the scoring/penalty summaries
//! (newest first) for the row describing a given event.

use crate::models::{GoalDraft, PenaltyDraft, PenaltyEntry, ScoringEntry};
use regex::Regex;
use std::sync::OnceLock;

static JERSEY_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
static PAREN_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
static LAST_PLAY_TAGGED: OnceLock<Option<Regex>> = OnceLock::new();
static LAST_PLAY_BARE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Strip quotes, trailing jersey numbers ("#34") and trailing parentheticals
pub fn cleanup_player_display(name: &str) -> String {
    let mut text = name
        .trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == ' ')
        .to_string();
    if let Some(re) = cached(&JERSEY_SUFFIX, r"\s+#\d+$") {
        text = re.replace(&text, "").into_owned();
    }
    if let Some(re) = cached(&PAREN_SUFFIX, r"\s+\(.*?\)$") {
        text = re.replace(&text, "").into_owned();
    }
    text
}

/// Comparison key for player and infraction names
pub fn normalize_name(name: &str) -> String {
    cleanup_player_display(name)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Pull "NAME (ABC)" out of free-text such as "Goal: Auston Matthews (TOR) ..."
pub fn parse_scorer_from_last_play(last_play: &str) -> Option<(String, Option<String>)> {
    let tagged = cached(&LAST_PLAY_TAGGED, r"(?i)Goal:\s*([^(\n]+?)\s*\(([A-Z]{3})\)")?;
    if let Some(caps) = tagged.captures(last_play) {
        let name = caps.get(1)?.as_str().trim().to_string();
        let team = caps.get(2).map(|m| m.as_str().to_uppercase());
        return Some((name, team));
    }

    let bare = cached(&LAST_PLAY_BARE, r"(?i)Goal:\s*([^(\n]+)")?;
    let caps = bare.captures(last_play)?;
    let name = caps.get(1)?.as_str().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some((name, None))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// True when both sides carry a value and the values disagree
fn conflicts(wanted: Option<&str>, found: Option<&str>) -> bool {
    match (non_empty(wanted), non_empty(found)) {
        (Some(w), Some(f)) => w != f,
        _ => false,
    }
}

fn conflicts_ignore_case(wanted: Option<&str>, found: Option<&str>) -> bool {
    match (non_empty(wanted), non_empty(found)) {
        (Some(w), Some(f)) => !w.eq_ignore_ascii_case(&f),
        _ => false,
    }
}

fn clean_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| cleanup_player_display(n))
        .filter(|n| !n.is_empty())
        .collect()
}

/// Filters for locating a goal in the scoring summary
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalQuery<'a> {
    pub team_abbr: Option<&'a str>,
    pub score_str: Option<&'a str>,
    pub scorer: Option<&'a str>,
    pub time: Option<&'a str>,
}

/// Newest scoring row agreeing with every provided filter
pub fn match_goal_detail(feed: &[ScoringEntry], query: &GoalQuery<'_>) -> Option<GoalDraft> {
    let wanted_scorer = query.scorer.map(normalize_name).unwrap_or_default();

    feed.iter().rev().find_map(|entry| {
        if conflicts_ignore_case(query.team_abbr, entry.team_abbr.as_deref())
            || conflicts(query.score_str, entry.score_str.as_deref())
            || conflicts(query.time, entry.time.as_deref())
        {
            return None;
        }

        let entry_scorer = entry
            .scorer
            .as_deref()
            .map(cleanup_player_display)
            .filter(|s| !s.is_empty());
        if !wanted_scorer.is_empty()
            && entry_scorer.as_deref().map(normalize_name).unwrap_or_default() != wanted_scorer
        {
            return None;
        }

        Some(GoalDraft {
            scorer: entry_scorer.or_else(|| non_empty(query.scorer)),
            assists: clean_names(&entry.assists),
            shot_type: non_empty(entry.shot_type.as_deref()),
            strength: non_empty(entry.strength.as_deref()),
            period_ord: non_empty(entry.period_ord.as_deref()),
            time: non_empty(entry.time.as_deref()).or_else(|| non_empty(query.time)),
            score: None,
            team_abbrev: non_empty(entry.team_abbr.as_deref())
                .or_else(|| non_empty(query.team_abbr))
                .map(|t| t.to_uppercase()),
            side: None,
        })
    })
}

/// Filters for locating a penalty in the penalty summary
#[derive(Debug, Clone, Copy, Default)]
pub struct PenaltyQuery<'a> {
    pub team_abbr: Option<&'a str>,
    pub infraction: Option<&'a str>,
    pub player: Option<&'a str>,
    pub time: Option<&'a str>,
    pub period_ord: Option<&'a str>,
}

/// Newest penalty row agreeing with every provided filter
pub fn match_penalty_detail(feed: &[PenaltyEntry], query: &PenaltyQuery<'_>) -> Option<PenaltyDraft> {
    let wanted_player = query.player.map(normalize_name).unwrap_or_default();
    let wanted_infraction = query.infraction.map(normalize_name).unwrap_or_default();

    feed.iter().rev().find_map(|entry| {
        if conflicts_ignore_case(query.team_abbr, entry.team_abbr.as_deref()) {
            return None;
        }

        let infraction = entry
            .name
            .as_deref()
            .map(cleanup_player_display)
            .filter(|s| !s.is_empty());
        if !wanted_infraction.is_empty()
            && infraction.as_deref().map(normalize_name).unwrap_or_default() != wanted_infraction
        {
            return None;
        }

        let player = entry
            .player
            .as_deref()
            .map(cleanup_player_display)
            .filter(|s| !s.is_empty());
        if !wanted_player.is_empty()
            && player.as_deref().map(normalize_name).unwrap_or_default() != wanted_player
        {
            return None;
        }

        if conflicts(query.time, entry.time.as_deref())
            || conflicts(query.period_ord, entry.period_ord.as_deref())
        {
            return None;
        }

        Some(PenaltyDraft {
            team_abbrev: non_empty(entry.team_abbr.as_deref())
                .or_else(|| non_empty(query.team_abbr))
                .map(|t| t.to_uppercase()),
            player: player.or_else(|| non_empty(query.player)),
            infraction: infraction.or_else(|| non_empty(query.infraction)),
            minutes: entry.minutes,
            drawn_by: entry
                .drawn_by
                .as_deref()
                .map(cleanup_player_display)
                .filter(|s| !s.is_empty()),
            served_by: entry
                .served_by
                .as_deref()
                .map(cleanup_player_display)
                .filter(|s| !s.is_empty()),
            result: non_empty(entry.result.as_deref()),
            period_ord: non_empty(entry.period_ord.as_deref()).or_else(|| non_empty(query.period_ord)),
            time: non_empty(entry.time.as_deref()).or_else(|| non_empty(query.time)),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoring(team: &str, score: &str, scorer: &str, time: &str) -> ScoringEntry {
        ScoringEntry {
            team_abbr: Some(team.to_string()),
            score_str: Some(score.to_string()),
            scorer: Some(scorer.to_string()),
            assists: vec!["Mitch Marner #16".to_string(), "".to_string()],
            shot_type: Some("Wrist".to_string()),
            strength: Some("PPG".to_string()),
            time: Some(time.to_string()),
            period_ord: Some("2nd".to_string()),
        }
    }

    #[test]
    fn test_cleanup_player_display() {
        assert_eq!(cleanup_player_display("  'Auston Matthews' "), "Auston Matthews");
        assert_eq!(cleanup_player_display("William Nylander #88"), "William Nylander");
        assert_eq!(cleanup_player_display("Morgan Rielly (3)"), "Morgan Rielly");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("J.T. Miller #9"), "jtmiller");
        assert_eq!(normalize_name("O'Reilly"), "oreilly");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_parse_scorer_from_last_play() {
        assert_eq!(
            parse_scorer_from_last_play("Goal: Auston Matthews (TOR) at 12:01 of 2nd"),
            Some(("Auston Matthews".to_string(), Some("TOR".to_string())))
        );
        assert_eq!(
            parse_scorer_from_last_play("goal: Brad Marchand"),
            Some(("Brad Marchand".to_string(), None))
        );
        assert_eq!(parse_scorer_from_last_play("Faceoff won by TOR"), None);
    }

    #[test]
    fn test_match_goal_newest_first_with_filters() {
        let feed = vec![
            scoring("TOR", "1-0", "Auston Matthews", "05:00"),
            scoring("BOS", "1-1", "David Pastrnak", "08:00"),
            scoring("TOR", "2-1", "William Nylander", "12:01"),
        ];

        let detail = match_goal_detail(
            &feed,
            &GoalQuery {
                team_abbr: Some("tor"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(detail.scorer.as_deref(), Some("William Nylander"));
        assert_eq!(detail.assists, vec!["Mitch Marner".to_string()]);
        assert_eq!(detail.team_abbrev.as_deref(), Some("TOR"));

        let detail = match_goal_detail(
            &feed,
            &GoalQuery {
                score_str: Some("1-0"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(detail.scorer.as_deref(), Some("Auston Matthews"));

        assert!(match_goal_detail(
            &feed,
            &GoalQuery {
                team_abbr: Some("TOR"),
                scorer: Some("David Pastrnak"),
                ..Default::default()
            }
        )
        .is_none());
    }

    #[test]
    fn test_match_goal_missing_entry_fields_do_not_conflict() {
        let feed = vec![ScoringEntry {
            scorer: Some("Auston Matthews".to_string()),
            ..Default::default()
        }];
        let detail = match_goal_detail(
            &feed,
            &GoalQuery {
                team_abbr: Some("TOR"),
                score_str: Some("1-0"),
                time: Some("01:00"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(detail.time.as_deref(), Some("01:00"));
        assert_eq!(detail.team_abbrev.as_deref(), Some("TOR"));
    }

    #[test]
    fn test_match_penalty_detail() {
        let feed = vec![
            PenaltyEntry {
                team_abbr: Some("BOS".to_string()),
                name: Some("Tripping".to_string()),
                player: Some("Brad Marchand #63".to_string()),
                minutes: Some(2),
                drawn_by: Some("Mitch Marner".to_string()),
                time: Some("04:12".to_string()),
                period_ord: Some("1st".to_string()),
                ..Default::default()
            },
            PenaltyEntry {
                team_abbr: Some("TOR".to_string()),
                name: Some("Hooking".to_string()),
                player: Some("Morgan Rielly".to_string()),
                minutes: Some(2),
                time: Some("09:40".to_string()),
                period_ord: Some("1st".to_string()),
                ..Default::default()
            },
        ];

        let detail = match_penalty_detail(
            &feed,
            &PenaltyQuery {
                team_abbr: Some("BOS"),
                player: Some("brad marchand"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(detail.player.as_deref(), Some("Brad Marchand"));
        assert_eq!(detail.infraction.as_deref(), Some("Tripping"));
        assert_eq!(detail.minutes, Some(2));
        assert_eq!(detail.drawn_by.as_deref(), Some("Mitch Marner"));

        assert!(match_penalty_detail(
            &feed,
            &PenaltyQuery {
                infraction: Some("Slashing"),
                ..Default::default()
            }
        )
        .is_none());
    }
}
