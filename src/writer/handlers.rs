//! Handlers shared by every entity kind.

use serde_json::Value;

use super::rules::{self, RECIPE_RULES, SOURCE_RULES};
use super::{data_props, props, FieldHandler, WriteCtx, WriteError};
use crate::definitions::{is_skill, SKILLS};
use crate::graph::NodeRef;
use crate::parenthetical::{self, Annotation};

pub static COMMON: &[FieldHandler] = &[
    FieldHandler { field: "location", handle: location },
    FieldHandler { field: "ingredients", handle: ingredient },
    FieldHandler { field: "tingredients", handle: ingredient },
    FieldHandler { field: "source", handle: source },
    FieldHandler { field: "recipe", handle: recipe },
    FieldHandler { field: "season", handle: season },
    FieldHandler { field: "buff", handle: buff },
    FieldHandler { field: "stats", handle: buff },
    FieldHandler { field: "produce", handle: product },
    FieldHandler { field: "produces", handle: product },
    FieldHandler { field: "xp", handle: xp },
];

pub fn location(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (place, aux) = parenthetical::extract(text);
    ctx.link(
        NodeRef::new(&place).label("Location"),
        "LIVES_IN",
        data_props(aux.as_deref()),
    )
}

pub fn ingredient(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (item, aux) = parenthetical::extract(text);
    let mut p = serde_json::Map::new();
    if let Some(aux) = aux {
        Annotation::classify(&aux).insert_into(&mut p);
    }
    ctx.link(NodeRef::new(&item), "REQUIRES", p)
}

pub fn source(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    rules::apply(ctx, SOURCE_RULES, "source", text)
}

pub fn recipe(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    rules::apply(ctx, RECIPE_RULES, "recipe", text)
}

pub fn season(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (date, aux) = parenthetical::extract(text);
    ctx.link(
        NodeRef::new(&date).label("Date"),
        "AVAILABLE_IN",
        data_props(aux.as_deref()),
    )
}

/// `"Farming (+2)"`: the stripped name is a skill or a buff, the
/// parenthetical its value.
pub fn buff(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    let (kind, value) = parenthetical::extract(text);
    let label = if is_skill(&kind) { "Skill" } else { "Buff" };
    let p = match value {
        Some(v) => props([("value", Value::from(v))]),
        None => Default::default(),
    };
    ctx.link(NodeRef::new(&kind).label(label), "BUFF", p)
}

pub fn product(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    ctx.link(NodeRef::new(text), "PRODUCES", Default::default())
}

/// One `XP` edge per skill named in the text, which is kept as data.
pub fn xp(ctx: &mut WriteCtx<'_>, text: &str) -> Result<(), WriteError> {
    for skill in SKILLS.iter().filter(|s| text.contains(*s)) {
        ctx.link(
            NodeRef::new(skill).label("Skill"),
            "XP",
            props([("data", Value::from(text))]),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, MemoryGraph};

    fn run(handler: crate::writer::Handler, text: &str) -> MemoryGraph {
        let mut g = MemoryGraph::new();
        let mut ctx = WriteCtx::new(&mut g, NodeRef::new("Subject").label("Item"));
        handler(&mut ctx, text).unwrap();
        g
    }

    #[test]
    fn ingredient_quantities() {
        let g = run(ingredient, "Fried Egg (1)");
        assert_eq!(g.relationship("Subject", "Fried Egg", "REQUIRES").unwrap().properties["quantity"], 1);

        let g = run(ingredient, "Fish (Any)");
        assert_eq!(g.relationship("Subject", "Fish", "REQUIRES").unwrap().properties["quantity"], "Any");

        let g = run(ingredient, "Wheat Flour (from mill)");
        assert_eq!(
            g.relationship("Subject", "Wheat Flour", "REQUIRES").unwrap().properties["data"],
            "from mill"
        );

        let g = run(ingredient, "Parsnip");
        assert!(g.relationship("Subject", "Parsnip", "REQUIRES").unwrap().properties.is_empty());
    }

    #[test]
    fn location_keeps_data() {
        let g = run(location, "The Beach (Night Market)");
        let rel = g.relationship("Subject", "The Beach", "LIVES_IN").unwrap();
        assert_eq!(rel.properties["data"], "Night Market");
        assert_eq!(g.node("The Beach").unwrap().labels, vec!["Location"]);
    }

    #[test]
    fn buff_targets_skill_or_buff() {
        let g = run(buff, "Farming (+2)");
        assert_eq!(g.relationship("Subject", "Farming", "BUFF").unwrap().properties["value"], "+2");
        assert_eq!(g.node("Farming").unwrap().labels, vec!["Skill"]);

        let g = run(buff, "Max Energy (+50)");
        assert_eq!(g.node("Max Energy").unwrap().labels, vec!["Buff"]);
    }

    #[test]
    fn xp_links_every_named_skill() {
        let g = run(xp, "Farming and Foraging 10xp");
        assert!(g.relationship("Subject", "Farming", "XP").is_some());
        assert!(g.relationship("Subject", "Foraging", "XP").is_some());
        assert_eq!(g.stats().unwrap().relationships, 2);
    }

    #[test]
    fn season_with_data() {
        let g = run(season, "Summer (Ginger Island)");
        let rel = g.relationship("Subject", "Summer", "AVAILABLE_IN").unwrap();
        assert_eq!(rel.properties["data"], "Ginger Island");
    }

    #[test]
    fn product_is_unlabeled() {
        let g = run(product, "maple syrup");
        assert!(g.node("Maple Syrup").unwrap().labels.is_empty());
    }
}
