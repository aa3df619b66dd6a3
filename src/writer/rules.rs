//! Ordered rule tables for composite text fields.
//!
//! A table is tried top to bottom and the first rule whose predicate matches
//! is the only one applied. Order is part of each table's meaning: the
//! fishing treasure rule must run before the plain fallback, a season before
//! a skill, and so on.

use serde_json::Value;
use tracing::debug;

use super::{data_props, props, WriteCtx, WriteError};
use crate::definitions::{DAYS_PER_SEASON, SEASONS, SKILLS, VILLAGERS};
use crate::graph::NodeRef;
use crate::parenthetical::{self, parse_level};
use crate::parser::wikicode;

pub type Predicate = fn(&str) -> Option<&'static str>;
pub type Action = fn(&mut WriteCtx<'_>, &str, &'static str) -> Result<(), WriteError>;

/// `matches` returns the token it recognised (or `""` for plain tests); the
/// action receives the full text and that token.
pub struct Rule {
    pub name: &'static str,
    pub matches: Predicate,
    pub action: Action,
}

pub fn first_match(rules: &'static [Rule], text: &str) -> Option<(&'static Rule, &'static str)> {
    rules
        .iter()
        .find_map(|rule| (rule.matches)(text).map(|token| (rule, token)))
}

/// Apply the first matching rule. No match writes nothing.
pub fn apply(
    ctx: &mut WriteCtx<'_>,
    rules: &'static [Rule],
    field: &str,
    text: &str,
) -> Result<(), WriteError> {
    match first_match(rules, text) {
        Some((rule, token)) => {
            debug!(page = %ctx.node.name, field, rule = rule.name, "rule matched");
            (rule.action)(ctx, text, token)
        }
        None => {
            debug!(page = %ctx.node.name, field, text, "no rule matched");
            Ok(())
        }
    }
}

fn always(_: &str) -> Option<&'static str> {
    Some("")
}

fn contained_in(candidates: &'static [&'static str], text: &str) -> Option<&'static str> {
    candidates.iter().copied().find(|c| text.contains(c))
}

// ── source ──

pub static SOURCE_RULES: &[Rule] = &[
    Rule {
        name: "fishing_treasure",
        matches: |t| (t.contains("Fishing") && t.contains("Treasure")).then_some(""),
        action: fishing_treasure,
    },
    Rule {
        name: "crafting",
        matches: |t| t.contains("Crafting").then_some("Crafting"),
        action: fixed_target,
    },
    Rule {
        name: "desert_festival",
        matches: |t| t.contains("Desert Festival").then_some("Desert Festival"),
        action: event,
    },
    Rule {
        name: "literal",
        matches: always,
        action: literal_source,
    },
];

fn fishing_treasure(ctx: &mut WriteCtx<'_>, text: &str, _: &'static str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new("Fishing").label("Skill"), "SOURCE", Default::default())?;
    let chest = if text.contains("Golden") {
        "Golden Fishing Treasure Chest"
    } else {
        "Fishing Treasure Chest"
    };
    ctx.link(
        NodeRef::new(chest).label("SpecialItem"),
        "SOURCE",
        data_props(parenthetical::auxiliary(text)),
    )
}

fn fixed_target(ctx: &mut WriteCtx<'_>, text: &str, target: &'static str) -> Result<(), WriteError> {
    ctx.link(
        NodeRef::new(target),
        "SOURCE",
        data_props(parenthetical::auxiliary(text)),
    )
}

fn event(ctx: &mut WriteCtx<'_>, text: &str, name: &'static str) -> Result<(), WriteError> {
    ctx.link(
        NodeRef::new(name).label("Event"),
        "SOURCE",
        data_props(parenthetical::auxiliary(text)),
    )
}

fn literal_source(ctx: &mut WriteCtx<'_>, text: &str, _: &'static str) -> Result<(), WriteError> {
    let (target, aux) = parenthetical::extract(text);
    ctx.link(NodeRef::new(&target), "SOURCE", data_props(aux.as_deref()))
}

// ── recipe ──

pub static RECIPE_RULES: &[Rule] = &[
    Rule {
        name: "queen_of_sauce",
        matches: |t| contained_in(SEASONS, t),
        action: dated_recipe,
    },
    Rule {
        name: "skill",
        matches: |t| contained_in(SKILLS, t),
        action: skill_recipe,
    },
    Rule {
        name: "friendship",
        matches: |t| contained_in(VILLAGERS, t),
        action: villager_recipe,
    },
];

/// `"Spring 21, Year 2"` → `("Spring 21", 2)`. `"21 Spring"` is reordered so
/// it names the same calendar node.
pub fn parse_air_date(text: &str, season: &str) -> Option<(String, i64)> {
    let (day_part, rest) = text.split_once(',').unwrap_or((text, text));
    let day_part = day_part.trim();

    let day = day_part
        .split_whitespace()
        .find_map(|w| w.parse::<u32>().ok())
        .filter(|d| (1..=DAYS_PER_SEASON).contains(d));
    let date = match day {
        Some(d) => format!("{} {}", season, d),
        None => day_part.to_string(),
    };

    let year = match rest.find("Year") {
        Some(idx) => rest[idx + 4..]
            .trim_start()
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|d| d.parse().ok()),
        None => text.trim_end().chars().last()?.to_digit(10).map(i64::from),
    }?;
    Some((date, year))
}

fn dated_recipe(ctx: &mut WriteCtx<'_>, text: &str, season: &'static str) -> Result<(), WriteError> {
    let (date, year) = parse_air_date(text, season)
        .ok_or_else(|| WriteError::malformed(format!("no year in {:?}", text)))?;
    ctx.link(
        NodeRef::new(&date).label("Date"),
        "RECIPE_SOURCE",
        props([("year", Value::from(year))]),
    )
}

fn skill_recipe(ctx: &mut WriteCtx<'_>, text: &str, skill: &'static str) -> Result<(), WriteError> {
    let p = match parenthetical::auxiliary(text) {
        Some(aux) => match parse_level(aux) {
            Some(level) => props([("level", Value::from(level))]),
            None => data_props(Some(aux)),
        },
        None => Default::default(),
    };
    ctx.link(NodeRef::new(skill).label("Skill"), "RECIPE_SOURCE", p)
}

fn villager_recipe(ctx: &mut WriteCtx<'_>, text: &str, villager: &'static str) -> Result<(), WriteError> {
    ctx.link(
        NodeRef::new(villager).label("Villager"),
        "RECIPE_SOURCE",
        data_props(parenthetical::auxiliary(text)),
    )
}

// ── weapon source ──

const WEAPON_LOCATIONS: &[&str] = &[
    "Adventurer's Guild",
    "The Mines",
    "Volcano Dungeon",
    "Volcano Cavern",
];

pub static WEAPON_SOURCE_RULES: &[Rule] = &[
    Rule {
        name: "linked",
        matches: |t| wikicode::parse(t).wikilinks().next().map(|_| ""),
        action: linked_sources,
    },
    Rule {
        name: "location",
        matches: |t| contained_in(WEAPON_LOCATIONS, t),
        action: weapon_location,
    },
    Rule {
        name: "desert_festival",
        matches: |t| t.contains("Desert Festival").then_some("Desert Festival"),
        action: weapon_event,
    },
    Rule {
        name: "literal",
        matches: always,
        action: literal_source,
    },
];

/// Every link in the text is a source; the whole text is kept as data.
fn linked_sources(ctx: &mut WriteCtx<'_>, text: &str, _: &'static str) -> Result<(), WriteError> {
    for link in wikicode::parse(text).wikilinks() {
        ctx.link(
            NodeRef::new(&link.title),
            "SOURCE",
            props([("data", Value::from(text))]),
        )?;
    }
    Ok(())
}

fn weapon_location(ctx: &mut WriteCtx<'_>, text: &str, place: &'static str) -> Result<(), WriteError> {
    ctx.link(
        NodeRef::new(place).label("Location"),
        "SOURCE",
        props([("data", Value::from(text))]),
    )
}

fn weapon_event(ctx: &mut WriteCtx<'_>, text: &str, name: &'static str) -> Result<(), WriteError> {
    ctx.link(
        NodeRef::new(name).label("Event"),
        "SOURCE",
        props([("data", Value::from(text))]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, MemoryGraph};

    fn run(rules: &'static [Rule], text: &str) -> MemoryGraph {
        let mut g = MemoryGraph::new();
        let mut ctx = WriteCtx::new(&mut g, NodeRef::new("Subject").label("Item"));
        apply(&mut ctx, rules, "test", text).unwrap();
        g
    }

    fn rule_name(rules: &'static [Rule], text: &str) -> Option<&'static str> {
        first_match(rules, text).map(|(r, _)| r.name)
    }

    #[test]
    fn source_rule_order() {
        assert_eq!(rule_name(SOURCE_RULES, "Fishing Treasure Chest"), Some("fishing_treasure"));
        assert_eq!(rule_name(SOURCE_RULES, "Crafting Fishing Treasure"), Some("fishing_treasure"));
        assert_eq!(rule_name(SOURCE_RULES, "Crafting (Desert Festival)"), Some("crafting"));
        assert_eq!(rule_name(SOURCE_RULES, "Desert Festival (Emily)"), Some("desert_festival"));
        assert_eq!(rule_name(SOURCE_RULES, "Mines"), Some("literal"));
    }

    #[test]
    fn golden_treasure_chest() {
        let g = run(SOURCE_RULES, "Fishing Treasure Chest (Golden)");
        assert_eq!(g.stats().unwrap().relationships, 2);
        assert!(g.relationship("Subject", "Fishing", "SOURCE").unwrap().properties.is_empty());
        let chest = g.relationship("Subject", "Golden Fishing Treasure Chest", "SOURCE").unwrap();
        assert_eq!(chest.properties["data"], "Golden");
        assert_eq!(g.node("Golden Fishing Treasure Chest").unwrap().labels, vec!["SpecialItem"]);
    }

    #[test]
    fn plain_treasure_chest() {
        let g = run(SOURCE_RULES, "Fishing Treasure Chest");
        assert!(g.relationship("Subject", "Fishing Treasure Chest", "SOURCE").is_some());
    }

    #[test]
    fn crafting_and_festival() {
        let g = run(SOURCE_RULES, "Crafting (Farming Level 2)");
        assert_eq!(
            g.relationship("Subject", "Crafting", "SOURCE").unwrap().properties["data"],
            "Farming Level 2"
        );
        let g = run(SOURCE_RULES, "Desert Festival");
        assert_eq!(g.node("Desert Festival").unwrap().labels, vec!["Event"]);
    }

    #[test]
    fn literal_source_is_stripped() {
        let g = run(SOURCE_RULES, "Krobus (500g)");
        let rel = g.relationship("Subject", "Krobus", "SOURCE").unwrap();
        assert_eq!(rel.properties["data"], "500g");
    }

    #[test]
    fn queen_of_sauce_date() {
        let g = run(RECIPE_RULES, "Spring 21, Year 2");
        assert_eq!(g.stats().unwrap().relationships, 1);
        let rel = g.relationship("Subject", "Spring 21", "RECIPE_SOURCE").unwrap();
        assert_eq!(rel.properties["year"], 2);
    }

    #[test]
    fn air_dates() {
        assert_eq!(parse_air_date("Spring 21, Year 2", "Spring"), Some(("Spring 21".into(), 2)));
        assert_eq!(parse_air_date("21 Spring, Year 2", "Spring"), Some(("Spring 21".into(), 2)));
        assert_eq!(parse_air_date("Winter 7, Year 1", "Winter"), Some(("Winter 7".into(), 1)));
        assert_eq!(parse_air_date("Fall 28 Year 12", "Fall"), Some(("Fall 28".into(), 12)));
        assert_eq!(parse_air_date("Summer", "Summer"), None);
    }

    #[test]
    fn undated_season_is_malformed() {
        let mut g = MemoryGraph::new();
        let mut ctx = WriteCtx::new(&mut g, NodeRef::new("Subject"));
        let err = apply(&mut ctx, RECIPE_RULES, "recipe", "Summer").unwrap_err();
        assert!(matches!(err, WriteError::Malformed { .. }));
    }

    #[test]
    fn skill_level() {
        let g = run(RECIPE_RULES, "Farming (Level 3)");
        let rel = g.relationship("Subject", "Farming", "RECIPE_SOURCE").unwrap();
        assert_eq!(rel.properties["level"], 3);

        let g = run(RECIPE_RULES, "Mining (Dwarf scroll)");
        let rel = g.relationship("Subject", "Mining", "RECIPE_SOURCE").unwrap();
        assert_eq!(rel.properties["data"], "Dwarf scroll");
    }

    #[test]
    fn villager_friendship() {
        let g = run(RECIPE_RULES, "Gus (Mail - 3+ hearts)");
        let rel = g.relationship("Subject", "Gus", "RECIPE_SOURCE").unwrap();
        assert_eq!(rel.properties["data"], "Mail - 3+ hearts");
        assert_eq!(g.node("Gus").unwrap().labels, vec!["Villager"]);
    }

    #[test]
    fn unmatched_recipe_writes_nothing() {
        let g = run(RECIPE_RULES, "Starter recipe");
        assert_eq!(g.stats().unwrap().relationships, 0);
    }

    #[test]
    fn weapon_links_win() {
        let g = run(WEAPON_SOURCE_RULES, "[[The Mines]] chests, [[Skull Cavern]] floors");
        assert!(g.relationship("Subject", "The Mines", "SOURCE").is_some());
        let rel = g.relationship("Subject", "Skull Cavern", "SOURCE").unwrap();
        assert_eq!(rel.properties["data"], "[[The Mines]] chests, [[Skull Cavern]] floors");
    }

    #[test]
    fn weapon_known_places() {
        let g = run(WEAPON_SOURCE_RULES, "Buy at Adventurer's Guild after The Mines level 40");
        assert!(g.relationship("Subject", "Adventurer's Guild", "SOURCE").is_some());
        assert!(g.relationship("Subject", "The Mines", "SOURCE").is_none());

        let g = run(WEAPON_SOURCE_RULES, "Desert Festival shop");
        assert_eq!(g.node("Desert Festival").unwrap().labels, vec!["Event"]);

        let g = run(WEAPON_SOURCE_RULES, "Fishing Treasure Chest (rare)");
        assert!(g.relationship("Subject", "Fishing Treasure Chest", "SOURCE").is_some());
    }
}
