//! Entity kinds and their own field handlers.

use serde_json::Value;
use tracing::debug;

use super::handlers;
use super::rules::{self, WEAPON_SOURCE_RULES};
use super::{data_props, props, FieldHandler, WriteCtx, WriteError};
use crate::graph::{NodeRef, Properties};
use crate::parenthetical::{self, Annotation};
use crate::parser::wikicode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Common handlers only.
    Generic,
    Villager,
    Location,
    Fish,
    Monster,
    Furniture,
    Animal,
    Tool,
    Tree,
    Building,
    Artifact,
    Seed,
    Weapon,
    Crop,
}

impl EntityKind {
    /// Kinds with their own handlers, in the order the pipeline writes them.
    pub const SPECIFIC: &'static [EntityKind] = &[
        EntityKind::Villager,
        EntityKind::Location,
        EntityKind::Fish,
        EntityKind::Monster,
        EntityKind::Furniture,
        EntityKind::Animal,
        EntityKind::Tool,
        EntityKind::Tree,
        EntityKind::Building,
        EntityKind::Artifact,
        EntityKind::Seed,
        EntityKind::Weapon,
    ];

    /// Infobox type written by this kind. Crops have no infobox type of their
    /// own and are found through categories.
    pub fn infobox_type(self) -> Option<&'static str> {
        match self {
            EntityKind::Generic | EntityKind::Crop => None,
            _ => Some(self.default_label()),
        }
    }

    pub fn from_infobox_type(entity_type: &str) -> Option<Self> {
        Self::SPECIFIC
            .iter()
            .copied()
            .find(|k| k.default_label().eq_ignore_ascii_case(entity_type))
    }

    pub fn default_label(self) -> &'static str {
        match self {
            EntityKind::Generic => "Item",
            EntityKind::Villager => "Villager",
            EntityKind::Location => "Location",
            EntityKind::Fish => "Fish",
            EntityKind::Monster => "Monster",
            EntityKind::Furniture => "Furniture",
            EntityKind::Animal => "Animal",
            EntityKind::Tool => "Tool",
            EntityKind::Tree => "Tree",
            EntityKind::Building => "Building",
            EntityKind::Artifact => "Artifact",
            EntityKind::Seed => "Seed",
            EntityKind::Weapon => "Weapon",
            EntityKind::Crop => "Crop",
        }
    }

    pub fn specific_handlers(self) -> &'static [FieldHandler] {
        match self {
            EntityKind::Generic => &[],
            EntityKind::Villager => VILLAGER,
            EntityKind::Location => LOCATION,
            EntityKind::Fish => FISH,
            EntityKind::Monster => MONSTER,
            EntityKind::Furniture => FURNITURE,
            EntityKind::Animal => ANIMAL,
            EntityKind::Tool => TOOL,
            EntityKind::Tree => TREE,
            EntityKind::Building => BUILDING,
            EntityKind::Artifact => ARTIFACT,
            EntityKind::Seed => SEED,
            EntityKind::Weapon => WEAPON,
            EntityKind::Crop => CROP,
        }
    }

    /// Runs on the collected properties before the node is merged.
    pub fn post_process(self, properties: &mut Properties) {
        if self == EntityKind::Fish {
            collapse_size(properties);
        }
    }
}

// ── Villager ──

static VILLAGER: &[FieldHandler] = &[
    FieldHandler { field: "address", handle: address },
    FieldHandler { field: "family", handle: family },
    FieldHandler { field: "friends", handle: friend },
    FieldHandler { field: "birthday", handle: birthday },
    FieldHandler { field: "favorites", handle: ignore },
];

/// `"Carpenter's Shop (24 Mountain Road)"` lives in the shop; the street
/// address is dropped.
fn address(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let place = parenthetical::strip(text, None);
    ctx.link(NodeRef::new(&place).label("Location"), "LIVES_IN", Default::default())
}

fn family(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (member, relation) = parenthetical::extract(text);
    let p = match relation {
        Some(r) => props([("type", Value::from(r))]),
        None => Default::default(),
    };
    ctx.link(NodeRef::new(&member).label("Villager"), "HAS_FAMILY_MEMBER", p)
}

fn friend(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Villager"), "FRIENDS_WITH", Default::default())
}

fn birthday(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let date: String = text.chars().filter(|c| *c != '(' && *c != ')').collect();
    ctx.link(NodeRef::new(&date).label("Date"), "BIRTHDAY", Default::default())
}

fn ignore(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    debug!(page = %ctx.node.name, text, "ignored entry");
    Ok(())
}

// ── Location ──

static LOCATION: &[FieldHandler] = &[FieldHandler { field: "occupants", handle: occupant }];

fn occupant(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Villager"), "HAS_OCCUPANT", Default::default())
}

// ── Fish ──

static FISH: &[FieldHandler] = &[
    FieldHandler { field: "weather", handle: weather },
    FieldHandler { field: "size", handle: size },
];

fn weather(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Weather"), "AVAILABLE_IN", Default::default())
}

/// Sizes are collected here and collapsed in post-processing.
fn size(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    match ctx
        .properties
        .entry("size")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(sizes) => sizes.push(Value::from(text)),
        other => *other = Value::Array(vec![Value::from(text)]),
    }
    Ok(())
}

/// One size → `"X"`, two → `"X-Y"`. More than two cannot be told apart from
/// a list of alternatives, so the field is dropped.
pub fn collapse_size(properties: &mut Properties) {
    let sizes = match properties.remove("size") {
        Some(Value::Array(sizes)) => sizes,
        Some(other) => {
            properties.insert("size".into(), other);
            return;
        }
        None => return,
    };
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match sizes.as_slice() {
        [one] => {
            properties.insert("size".into(), Value::from(text(one)));
        }
        [a, b] => {
            properties.insert("size".into(), Value::from(format!("{}-{}", text(a), text(b))));
        }
        [] => {}
        _ => debug!(sizes = sizes.len(), "ambiguous size list dropped"),
    }
}

// ── Monster ──

static MONSTER: &[FieldHandler] = &[
    FieldHandler { field: "drops", handle: drop_item },
    FieldHandler { field: "variations", handle: variation },
];

fn drop_item(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (item, aux) = parenthetical::extract(text);
    ctx.link(NodeRef::new(&item), "DROP", data_props(aux.as_deref()))
}

fn variation(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Monster"), "VARIANT", Default::default())
}

// ── Furniture ──

static FURNITURE: &[FieldHandler] = &[FieldHandler { field: "os", handle: other_source }];

fn other_source(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (source, aux) = parenthetical::extract(text);
    ctx.link(NodeRef::new(&source), "SOURCE", data_props(aux.as_deref()))
}

// ── Animal ──

static ANIMAL: &[FieldHandler] = &[FieldHandler { field: "building", handle: home_building }];

fn home_building(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Building"), "LIVES_IN", Default::default())
}

// ── Tool ──

static TOOL: &[FieldHandler] = &[
    FieldHandler { field: "previoustier", handle: previous_tier },
    FieldHandler { field: "nexttier", handle: next_tier },
    FieldHandler { field: "soldby", handle: handlers::source },
];

fn previous_tier(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Tool"), "PREVIOUS_TIER", Default::default())
}

fn next_tier(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Tool"), "NEXT_TIER", Default::default())
}

// ── Tree ──

static TREE: &[FieldHandler] = &[
    FieldHandler { field: "seed", handle: seed_source },
    FieldHandler { field: "sapling", handle: seed_source },
    FieldHandler { field: "tapper", handle: handlers::product },
    FieldHandler { field: "produce", handle: fruit },
    FieldHandler { field: "season", handle: tree_season },
    FieldHandler { field: "altprice", handle: handlers::source },
];

fn seed_source(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Seed"), "SOURCE", Default::default())
}

fn fruit(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Fruit"), "PRODUCES", Default::default())
}

/// The parenthetical of a tree season names where it grows then.
fn tree_season(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (season, place) = parenthetical::extract(text);
    let p = match place {
        Some(l) => props([("location", Value::from(l))]),
        None => Default::default(),
    };
    ctx.link(NodeRef::new(&season).label("Date"), "AVAILABLE_IN", p)
}

// ── Building ──

static BUILDING: &[FieldHandler] = &[
    FieldHandler { field: "materials", handle: material },
    FieldHandler { field: "animals", handle: housed_animal },
];

fn material(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (item, aux) = parenthetical::extract(text);
    let mut p = Properties::new();
    if let Some(aux) = aux {
        Annotation::classify(&aux).insert_into(&mut p);
    }
    ctx.link(NodeRef::new(&item), "REQUIRES", p)
}

fn housed_animal(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Animal"), "HAS_OCCUPANT", Default::default())
}

// ── Artifact ──

static ARTIFACT: &[FieldHandler] = &[
    FieldHandler { field: "as", handle: artifact_spot },
    FieldHandler { field: "os", handle: artifact_other_source },
    FieldHandler { field: "dr", handle: donation_reward },
    FieldHandler { field: "md", handle: monster_drop },
];

/// Artifact spot: a location with a dig probability.
fn artifact_spot(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (place, chance) = parenthetical::extract(text);
    ctx.link(
        NodeRef::new(&place).label("Location"),
        "SOURCE",
        probability(chance.as_deref()),
    )
}

/// Other sources. The parenthetical is either a probability or holds links
/// to the actual sources; a parenthetical inside it is then the probability:
/// `"Fishing Chests ([[Skull Cavern]] (0.5%))"`.
fn artifact_other_source(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let Some(aux) = parenthetical::auxiliary(text) else {
        return ctx.link(NodeRef::new(text), "SOURCE", Default::default());
    };

    let inner = parenthetical::auxiliary(aux);
    let outer = match inner {
        Some(i) => parenthetical::strip(aux, Some(i)),
        None => aux.trim().to_string(),
    };

    let code = wikicode::parse(&outer);
    let links: Vec<_> = code.wikilinks().collect();
    if !links.is_empty() {
        for link in links {
            ctx.link(NodeRef::new(&link.title), "SOURCE", probability(inner))?;
        }
        return Ok(());
    }

    let chance = inner.map_or(outer.as_str(), |i| i);
    let source = parenthetical::strip(text, Some(aux));
    ctx.link(NodeRef::new(&source), "SOURCE", probability(Some(chance)))
}

fn donation_reward(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (reward, aux) = parenthetical::extract(text);
    let mut p = Properties::new();
    if let Some(aux) = aux {
        Annotation::classify(&aux).insert_into(&mut p);
    }
    ctx.link(NodeRef::new(&reward), "REWARDS", p)
}

fn monster_drop(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (monster, chance) = parenthetical::extract(text);
    ctx.link(
        NodeRef::new(&monster).label("Monster"),
        "SOURCE",
        probability(chance.as_deref()),
    )
}

fn probability(chance: Option<&str>) -> Properties {
    match chance {
        Some(c) => props([("probability", Value::from(c))]),
        None => Properties::new(),
    }
}

// ── Seed / Crop ──

static SEED: &[FieldHandler] = &[FieldHandler { field: "crop", handle: grows_into }];

fn grows_into(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text).label("Crop"), "PRODUCES", Default::default())
}

static CROP: &[FieldHandler] = &[FieldHandler { field: "seed", handle: grown_from }];

/// Reverse edge: the seed produces this crop.
fn grown_from(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link_from(NodeRef::new(text).label("Seed"), "PRODUCES", Default::default())
}

// ── Weapon ──

static WEAPON: &[FieldHandler] = &[FieldHandler { field: "source", handle: weapon_source }];

fn weapon_source(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    rules::apply(ctx, WEAPON_SOURCE_RULES, "source", text)
}
