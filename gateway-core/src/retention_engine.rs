//! §4.S Retention Engine — priority-sorted rule evaluation producing a
//! retention decision per event, plus the cap-eviction score formula.

use nostr::{Event, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::types::{Aggregate, RetentionDecision};

const SECS_PER_DAY: i64 = 86_400;
const DAYS_PER_MONTH: i64 = 30;

/// A single retention rule: a named, prioritized condition tree plus the
/// action to apply on first match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRule {
    pub name: String,
    pub priority: i32,
    pub condition: Condition,
    pub action: Action,
}

/// The condition tree: `All` is the catch-all leaf, `And`/`Or`/`Not`
/// combine subtrees, and `Leaf` carries an implicit AND across whichever
/// predicates it sets (unset predicates are vacuously true).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    All,
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Leaf(Box<LeafPredicate>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafPredicate {
    pub kinds: Option<Vec<u16>>,
    pub kinds_exclude: Option<Vec<u16>>,
    pub author_is_owner: Option<bool>,
    pub author_in_list: Option<Vec<PublicKey>>,
    pub author_not_in_list: Option<Vec<PublicKey>>,
    pub social_distance_min: Option<i32>,
    pub social_distance_max: Option<i32>,
    pub author_is_following: Option<bool>,
    pub author_is_mutual: Option<bool>,
    pub age_days_min: Option<i64>,
    pub age_days_max: Option<i64>,
    pub content_size_min: Option<usize>,
    pub content_size_max: Option<usize>,
    pub tags_count_max: Option<usize>,
    pub reply_count_min: Option<u64>,
    pub reaction_count_min: Option<u64>,
    pub zap_sats_min: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Retain,
    RetainDays(u32),
    RetainUntil(String),
    Delete { delete_after_days: u32 },
}

/// Context a condition tree is evaluated against: the event, its
/// aggregate (zeroed if unknown), the author's social distance from the
/// owner (-1 if not present in the graph), and whether that relationship
/// is mutual.
pub struct EvalContext<'a> {
    pub event: &'a Event,
    pub aggregate: Option<&'a Aggregate>,
    pub owner: PublicKey,
    pub social_distance: i32,
    pub is_mutual: bool,
}

pub struct RetentionEngine {
    rules: Vec<RetentionRule>,
}

impl RetentionEngine {
    /// Sorts `rules` by priority descending, once, at construction.
    pub fn new(mut rules: Vec<RetentionRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Evaluates the sorted rule list against `ctx`; the first matching
    /// rule's action produces the decision. `default_action` governs the
    /// no-match case.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        now: Timestamp,
        default_action: crate::config::DefaultAction,
    ) -> Result<RetentionDecision> {
        for (index, rule) in self.rules.iter().enumerate() {
            if evaluate_condition(&rule.condition, ctx) {
                let decision = apply_action(&rule.action, ctx, now, rule.name.clone(), rule.priority)?;
                return Ok(self.score(decision, ctx, now, index));
            }
        }

        let decision = match default_action {
            crate::config::DefaultAction::Keep => RetentionDecision {
                event_id: ctx.event.id,
                rule_name: "default".to_string(),
                rule_priority: i32::MIN,
                retain_until: None,
                protected: false,
                score: 0,
            },
            crate::config::DefaultAction::Delete => RetentionDecision {
                event_id: ctx.event.id,
                rule_name: "default".to_string(),
                rule_priority: i32::MIN,
                retain_until: Some(now),
                protected: false,
                score: 0,
            },
        };
        Ok(self.score(decision, ctx, now, self.rules.len()))
    }

    fn score(
        &self,
        mut decision: RetentionDecision,
        ctx: &EvalContext<'_>,
        now: Timestamp,
        _matched_index: usize,
    ) -> RetentionDecision {
        if decision.protected {
            decision.score = i64::MAX;
            return decision;
        }

        let age_months = (now.as_u64() as i64 - ctx.event.created_at.as_u64() as i64)
            .max(0)
            / (SECS_PER_DAY * DAYS_PER_MONTH);

        let reply_count = ctx.aggregate.map(|a| a.reply_count).unwrap_or(0);
        let reaction_total = ctx.aggregate.map(|a| a.reaction_total).unwrap_or(0);
        let zap_sats = ctx.aggregate.map(|a| a.zap_sats_total).unwrap_or(0);

        let mut score = decision.rule_priority as i64 * 100;
        if ctx.event.pubkey == ctx.owner {
            score += 1000;
        }
        if ctx.social_distance >= 0 {
            score += (10 - ctx.social_distance as i64).max(0) * 100;
        }
        score += (10 - age_months).max(0) * 10;

        let engagement = reply_count as f64 + reaction_total as f64 / 10.0 + zap_sats as f64 / 1000.0;
        score += (engagement.min(10.0) as i64) * 5;

        decision.score = score;
        decision
    }
}

fn apply_action(
    action: &Action,
    ctx: &EvalContext<'_>,
    now: Timestamp,
    rule_name: String,
    rule_priority: i32,
) -> Result<RetentionDecision> {
    let (retain_until, protected) = match action {
        Action::Retain => (None, true),
        Action::RetainDays(days) => {
            let secs = *days as u64 * SECS_PER_DAY as u64;
            (Some(Timestamp::from(ctx.event.created_at.as_u64() + secs)), false)
        }
        Action::RetainUntil(rfc3339) => {
            let parsed = parse_rfc3339(rfc3339)
                .ok_or_else(|| GatewayError::Retention(format!("invalid retain_until: {rfc3339}")))?;
            (Some(parsed), false)
        }
        Action::Delete { delete_after_days: 0 } => (Some(now), false),
        Action::Delete { delete_after_days } => {
            let secs = *delete_after_days as u64 * SECS_PER_DAY as u64;
            (Some(Timestamp::from(now.as_u64() + secs)), false)
        }
    };

    Ok(RetentionDecision {
        event_id: ctx.event.id,
        rule_name,
        rule_priority,
        retain_until,
        protected,
        score: 0,
    })
}

/// Minimal RFC3339 `YYYY-MM-DDTHH:MM:SSZ` parser, no external crate: the
/// retention config is a small, operator-authored surface and doesn't
/// warrant pulling in `chrono` for one field.
fn parse_rfc3339(input: &str) -> Option<Timestamp> {
    let input = input.strip_suffix('Z').unwrap_or(input);
    let (date, time) = input.split_once('T')?;
    let mut date_parts = date.split('-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: i64 = date_parts.next()?.parse().ok()?;
    let day: i64 = date_parts.next()?.parse().ok()?;

    let mut time_parts = time.split(':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second: i64 = time_parts.next()?.parse().ok()?;

    if !(1970..=9999).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let days_since_epoch = days_from_civil(year, month, day);
    let secs = days_since_epoch * SECS_PER_DAY + hour * 3600 + minute * 60 + second;
    u64::try_from(secs).ok().map(Timestamp::from)
}

/// Howard Hinnant's days-from-civil algorithm (proleptic Gregorian).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn evaluate_condition(condition: &Condition, ctx: &EvalContext<'_>) -> bool {
    match condition {
        Condition::All => true,
        Condition::And(children) => children.iter().all(|c| evaluate_condition(c, ctx)),
        Condition::Or(children) => children.iter().any(|c| evaluate_condition(c, ctx)),
        Condition::Not(inner) => !evaluate_condition(inner, ctx),
        Condition::Leaf(leaf) => evaluate_leaf(leaf, ctx),
    }
}

fn evaluate_leaf(leaf: &LeafPredicate, ctx: &EvalContext<'_>) -> bool {
    let kind = ctx.event.kind.as_u16();

    if let Some(kinds) = &leaf.kinds {
        if !kinds.contains(&kind) {
            return false;
        }
    }
    if let Some(kinds_exclude) = &leaf.kinds_exclude {
        if kinds_exclude.contains(&kind) {
            return false;
        }
    }
    if let Some(expected) = leaf.author_is_owner {
        if (ctx.event.pubkey == ctx.owner) != expected {
            return false;
        }
    }
    if let Some(list) = &leaf.author_in_list {
        if !list.contains(&ctx.event.pubkey) {
            return false;
        }
    }
    if let Some(list) = &leaf.author_not_in_list {
        if list.contains(&ctx.event.pubkey) {
            return false;
        }
    }
    // A distance of -1 (author not present in the graph) fails any
    // distance predicate rather than vacuously matching it.
    if let Some(min) = leaf.social_distance_min {
        if ctx.social_distance < 0 || ctx.social_distance < min {
            return false;
        }
    }
    if let Some(max) = leaf.social_distance_max {
        if ctx.social_distance < 0 || ctx.social_distance > max {
            return false;
        }
    }
    if let Some(expected) = leaf.author_is_following {
        if (ctx.social_distance == 1) != expected {
            return false;
        }
    }
    if let Some(expected) = leaf.author_is_mutual {
        if ctx.is_mutual != expected {
            return false;
        }
    }

    let age_days = (Timestamp::now().as_u64() as i64 - ctx.event.created_at.as_u64() as i64)
        .max(0)
        / SECS_PER_DAY;
    if let Some(min) = leaf.age_days_min {
        if age_days < min {
            return false;
        }
    }
    if let Some(max) = leaf.age_days_max {
        if age_days > max {
            return false;
        }
    }

    let content_size = ctx.event.content.len();
    if let Some(min) = leaf.content_size_min {
        if content_size < min {
            return false;
        }
    }
    if let Some(max) = leaf.content_size_max {
        if content_size > max {
            return false;
        }
    }
    if let Some(max) = leaf.tags_count_max {
        if ctx.event.tags.len() > max {
            return false;
        }
    }

    let reply_count = ctx.aggregate.map(|a| a.reply_count).unwrap_or(0);
    let reaction_total = ctx.aggregate.map(|a| a.reaction_total).unwrap_or(0);
    let zap_sats = ctx.aggregate.map(|a| a.zap_sats_total).unwrap_or(0);
    if let Some(min) = leaf.reply_count_min {
        if reply_count < min {
            return false;
        }
    }
    if let Some(min) = leaf.reaction_count_min {
        if reaction_total < min {
            return false;
        }
    }
    if let Some(min) = leaf.zap_sats_min {
        if zap_sats < min {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultAction;
    use nostr::{EventBuilder, Keys, Kind};

    fn note(keys: &Keys) -> Event {
        EventBuilder::new(Kind::TextNote, "hello").sign_with_keys(keys).unwrap()
    }

    fn ctx<'a>(event: &'a Event, owner: PublicKey, social_distance: i32, is_mutual: bool) -> EvalContext<'a> {
        EvalContext { event, aggregate: None, owner, social_distance, is_mutual }
    }

    #[test]
    fn owner_events_are_retained_by_an_author_is_owner_rule() {
        let keys = Keys::generate();
        let event = note(&keys);
        let rules = vec![RetentionRule {
            name: "keep-mine".to_string(),
            priority: 100,
            condition: Condition::Leaf(Box::new(LeafPredicate {
                author_is_owner: Some(true),
                ..Default::default()
            })),
            action: Action::Retain,
        }];
        let engine = RetentionEngine::new(rules);
        let decision = engine
            .evaluate(&ctx(&event, keys.public_key(), 0, false), Timestamp::now(), DefaultAction::Delete)
            .unwrap();
        assert!(decision.protected);
        assert!(decision.retain_until.is_none());
    }

    #[test]
    fn unmatched_event_uses_default_action_keep() {
        let keys = Keys::generate();
        let other = Keys::generate().public_key();
        let event = note(&keys);
        let engine = RetentionEngine::new(Vec::new());
        let decision = engine
            .evaluate(&ctx(&event, other, -1, false), Timestamp::now(), DefaultAction::Keep)
            .unwrap();
        assert!(decision.retain_until.is_none());
        assert!(!decision.protected);
    }

    #[test]
    fn unmatched_event_uses_default_action_delete() {
        let keys = Keys::generate();
        let other = Keys::generate().public_key();
        let event = note(&keys);
        let engine = RetentionEngine::new(Vec::new());
        let decision = engine
            .evaluate(&ctx(&event, other, -1, false), Timestamp::now(), DefaultAction::Delete)
            .unwrap();
        assert!(decision.retain_until.is_some());
    }

    #[test]
    fn negative_social_distance_fails_distance_predicates() {
        let keys = Keys::generate();
        let other = Keys::generate().public_key();
        let event = note(&keys);
        let leaf = LeafPredicate { social_distance_max: Some(2), ..Default::default() };
        assert!(!evaluate_leaf(&leaf, &ctx(&event, other, -1, false)));
    }

    #[test]
    fn rules_evaluate_in_priority_order_first_match_wins() {
        let keys = Keys::generate();
        let event = note(&keys);
        let low = RetentionRule {
            name: "low".to_string(),
            priority: 1,
            condition: Condition::All,
            action: Action::Delete { delete_after_days: 0 },
        };
        let high = RetentionRule {
            name: "high".to_string(),
            priority: 10,
            condition: Condition::All,
            action: Action::Retain,
        };
        let engine = RetentionEngine::new(vec![low, high]);
        let decision = engine
            .evaluate(&ctx(&event, keys.public_key(), 0, false), Timestamp::now(), DefaultAction::Delete)
            .unwrap();
        assert_eq!(decision.rule_name, "high");
    }

    #[test]
    fn rfc3339_parser_round_trips_a_known_date() {
        let ts = parse_rfc3339("2024-01-15T00:00:00Z").unwrap();
        // 2024-01-15 is 19737 days after the epoch.
        assert_eq!(ts.as_u64(), 19737 * 86_400);
    }
}
