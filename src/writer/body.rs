//! Writers for what lives in a page body rather than its infobox.

use serde::Deserialize;
use serde_json::Value;

use super::{WriteCtx, WriteError, WriteReport};
use crate::graph::{GraphStore, NodeRef, Properties};
use crate::parenthetical::{self, Annotation};
use crate::parser::Page;
use crate::util::format_page_name;

const ARTIFACTS_NAVBOX: &str = "{{NavboxArtifacts}}";

/// `page -PART_OF-> Category` for each standalone category of the page.
pub fn add_page_categories(store: &mut dyn GraphStore, page: &Page) -> WriteReport {
    let mut report = WriteReport::default();
    let mut ctx = WriteCtx::new(store, NodeRef::new(&page.name));

    let mut categories: Vec<&str> = page.categories.iter().map(String::as_str).collect();
    // Artifact pages carry their category through the navbox only.
    if categories.is_empty() && page.source().contains(ARTIFACTS_NAVBOX) {
        categories.push("Artifacts");
    }

    for category in categories {
        let to = NodeRef::new(category).label("Category");
        if let Err(e) = ctx.link(to, "PART_OF", Properties::new()) {
            report.record(&page.name, "category", category, e);
        }
    }
    report.relationships += ctx.relationships();
    report
}

/// Name of the category a category page describes, if it is one.
pub fn category_page_name(page: &Page) -> Option<String> {
    if !page.is_category_page() {
        return None;
    }
    let bare = page.title.rsplit(':').next().unwrap_or_default();
    // Saved pages may spell the namespace with an underscore.
    let bare = bare.strip_prefix("Category_").unwrap_or(bare);
    let name = format_page_name(bare);
    (!name.is_empty() && !name.contains('%')).then_some(name)
}

/// Parent categories linked from a category page.
pub fn parent_categories(page: &Page) -> Vec<String> {
    page.wikicode
        .wikilinks()
        .filter(|l| l.title.contains("Category"))
        .map(|l| l.title.rsplit(':').next().unwrap_or_default().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// `Category -PART_OF-> parent Category` for a category page.
pub fn add_category_structure(store: &mut dyn GraphStore, page: &Page) -> WriteReport {
    let mut report = WriteReport::default();
    let Some(name) = category_page_name(page) else {
        return report;
    };

    let mut ctx = WriteCtx::new(store, NodeRef::new(&name).label("Category"));
    for parent in parent_categories(page) {
        let to = NodeRef::new(&parent).label("Category");
        if let Err(e) = ctx.link(to, "PART_OF", Properties::new()) {
            report.record(&name, "category", &parent, e);
        }
    }
    report.relationships += ctx.relationships();
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GiftTaste {
    Love,
    Like,
    Neutral,
    Dislike,
    Hate,
}

impl GiftTaste {
    const ALL: [GiftTaste; 5] = [
        GiftTaste::Love,
        GiftTaste::Like,
        GiftTaste::Neutral,
        GiftTaste::Dislike,
        GiftTaste::Hate,
    ];

    fn key(self) -> &'static str {
        match self {
            GiftTaste::Love => "|love",
            GiftTaste::Like => "|like",
            GiftTaste::Neutral => "|neutral",
            GiftTaste::Dislike => "|dislike",
            GiftTaste::Hate => "|hate",
        }
    }

    pub fn rel_type(self) -> &'static str {
        match self {
            GiftTaste::Love => "LOVES",
            GiftTaste::Like => "LIKES",
            GiftTaste::Neutral => "NEUTRAL",
            GiftTaste::Dislike => "DISLIKES",
            GiftTaste::Hate => "HATES",
        }
    }
}

/// `|love=Emily, Haley` lines of a gifting section. A later line for the
/// same taste replaces an earlier one.
pub fn parse_gifting(section: &str) -> Vec<(GiftTaste, Vec<String>)> {
    let mut out: Vec<(GiftTaste, Vec<String>)> = Vec::new();
    for line in section.lines() {
        let Some(taste) = GiftTaste::ALL.into_iter().find(|t| line.starts_with(t.key())) else {
            continue;
        };
        let value = line.rsplit('=').next().unwrap_or_default();
        let villagers = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "N/A" && !v.eq_ignore_ascii_case("none"))
            .map(str::to_string)
            .collect();
        out.retain(|(t, _)| *t != taste);
        out.push((taste, villagers));
    }
    out
}

/// `Villager -LOVES-> page` (and the other tastes) from the "Gifting" section.
pub fn add_gifting(store: &mut dyn GraphStore, page: &Page) -> WriteReport {
    let mut report = WriteReport::default();
    let Some(section) = page.get_heading_content("Gifting") else {
        return report;
    };

    let mut ctx = WriteCtx::new(store, NodeRef::new(&page.name));
    for (taste, villagers) in parse_gifting(&section) {
        for villager in villagers {
            let from = NodeRef::new(&villager).label("Villager");
            if let Err(e) = ctx.link_from(from, taste.rel_type(), Properties::new()) {
                report.record(&page.name, "gifting", &villager, e);
            }
        }
    }
    report.relationships += ctx.relationships();
    report
}

/// A community center bundle as produced from the bundle tables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Bundle {
    pub id: String,
    pub bundle: Vec<String>,
    #[serde(default)]
    pub reward: Option<String>,
}

/// `Bundle` node with its reward; each item is `PART_OF` it.
pub fn add_bundle(store: &mut dyn GraphStore, bundle: &Bundle) -> WriteReport {
    let mut report = WriteReport::default();
    let node = NodeRef::new(&bundle.id).label("Bundle");

    let mut p = Properties::new();
    if let Some(reward) = &bundle.reward {
        p.insert("reward".into(), Value::from(reward.as_str()));
    }
    if let Err(e) = store.merge_node(&node, &p) {
        report.record(&bundle.id, "reward", "", e.into());
    }

    let mut ctx = WriteCtx::new(store, node);
    for item in &bundle.bundle {
        if let Err(e) = bundle_item(&mut ctx, item) {
            report.record(&bundle.id, "bundle", item, e);
        }
    }
    report.relationships += ctx.relationships();
    report
}

fn bundle_item(ctx: &mut WriteCtx<'_>, item: &str) -> Result<(), WriteError> {
    let (name, aux) = parenthetical::extract(item);
    let mut p = Properties::new();
    if let Some(aux) = aux {
        match Annotation::classify(&aux) {
            Annotation::Quantity(n) => p.insert("quantity".into(), Value::from(n)),
            _ => p.insert("data".into(), Value::from(aux)),
        };
    }
    ctx.link_from(NodeRef::new(&name), "PART_OF", p)
}
