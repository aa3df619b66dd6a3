//! Full rebuild: every writer over every page, in dependency order.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::graph::GraphStore;
use crate::parser::infobox::UNKNOWN_TYPE;
use crate::parser::Page;
use crate::provider::{FieldMap, FieldProvider};
use crate::util::{category_to_label, format_page_name};
use crate::writer::body::{self, Bundle};
use crate::writer::calendar;
use crate::writer::entities::EntityKind;
use crate::writer::{InfoboxWriter, WriteFailure, WriteReport};

/// Infobox types written with the common handlers only.
pub const GENERIC_TYPES: &[&str] = &["clothing", "mineral", "cooking"];

/// Categories whose untyped infoboxes are still worth a node, labelled
/// after the category.
pub const CURATED_CATEGORIES: &[&str] = &[
    "Craftable items",
    "Special items",
    "Artisan Goods",
    "Books",
    "Resources",
    "Animal Products",
    "Decor",
    "Craftable lighting",
    "Fishing Tackle",
    "Field Office donations",
];

const CROPS: &str = "Crops";

#[derive(Debug, Default)]
pub struct BatchReport {
    pub pages: usize,
    pub written: usize,
    /// Writes not attempted because the provider had no data for the page.
    pub skipped: usize,
    pub relationships: usize,
    pub failures: Vec<WriteFailure>,
}

impl BatchReport {
    fn absorb(&mut self, report: WriteReport) {
        self.relationships += report.relationships;
        self.failures.extend(report.failures);
    }

    pub fn log(&self) {
        info!(
            pages = self.pages,
            written = self.written,
            skipped = self.skipped,
            relationships = self.relationships,
            failures = self.failures.len(),
            "batch finished"
        );
    }
}

pub fn run(
    store: &mut dyn GraphStore,
    pages: &[Page],
    provider: &dyn FieldProvider,
    bundles: &[Bundle],
) -> Result<BatchReport> {
    let mut report = BatchReport {
        pages: pages.len(),
        ..Default::default()
    };

    let dates = calendar::create_dates(store);
    info!(relationships = dates.relationships, "calendar written");
    report.absorb(dates);

    let fields = provider_fields(provider, pages)?;

    for ty in GENERIC_TYPES {
        let targets: Vec<&Page> = pages
            .iter()
            .filter(|p| p.infobox_type().is_some_and(|t| t.eq_ignore_ascii_case(ty)))
            .collect();
        let label = category_to_label(ty);
        write_group(store, &mut report, &fields, &targets, EntityKind::Generic, &[label.as_str()]);
    }

    for &kind in EntityKind::SPECIFIC {
        let targets: Vec<&Page> = pages
            .iter()
            .filter(|p| p.infobox_type().and_then(EntityKind::from_infobox_type) == Some(kind))
            .collect();
        write_group(store, &mut report, &fields, &targets, kind, &[kind.default_label()]);
    }

    let before = report.relationships;
    for page in pages {
        report.absorb(body::add_page_categories(store, page));
    }
    for page in pages.iter().filter(|p| p.is_category_page()) {
        report.absorb(body::add_category_structure(store, page));
    }
    info!(relationships = report.relationships - before, "categories written");

    let leaves = crop_categories(pages);
    info!(categories = ?leaves, "crop categories");
    let crops: Vec<&Page> = pages
        .iter()
        .filter(|p| !p.is_category_page() && in_any(p, &leaves))
        .collect();
    write_group(store, &mut report, &fields, &crops, EntityKind::Crop, &["Crop"]);

    for category in CURATED_CATEGORIES {
        let wanted = BTreeSet::from([format_page_name(category)]);
        let targets: Vec<&Page> = pages
            .iter()
            .filter(|p| {
                p.infobox_type().is_some_and(|t| t.eq_ignore_ascii_case(UNKNOWN_TYPE))
                    && in_any(p, &wanted)
            })
            .collect();
        let label = category_to_label(category);
        write_group(store, &mut report, &fields, &targets, EntityKind::Generic, &[label.as_str()]);
    }

    let before = report.relationships;
    for bundle in bundles {
        report.absorb(body::add_bundle(store, bundle));
    }
    info!(bundles = bundles.len(), relationships = report.relationships - before, "bundles written");

    let before = report.relationships;
    for page in pages {
        report.absorb(body::add_gifting(store, page));
    }
    info!(relationships = report.relationships - before, "gifting written");

    Ok(report)
}

/// Provider key of a page: its title with spaces.
fn field_key(page: &Page) -> String {
    page.title.replace('_', " ")
}

fn provider_fields(
    provider: &dyn FieldProvider,
    pages: &[Page],
) -> Result<BTreeMap<String, Option<FieldMap>>> {
    let requests: Vec<(String, String)> = pages
        .iter()
        .filter_map(|p| Some((field_key(p), p.infobox.as_ref()?.raw.clone())))
        .collect();
    let fields = provider.pages_to_fields(&requests)?;
    let usable = fields.values().filter(|f| f.is_some()).count();
    info!(requested = requests.len(), usable, "fields provided");
    Ok(fields)
}

fn write_group(
    store: &mut dyn GraphStore,
    report: &mut BatchReport,
    fields: &BTreeMap<String, Option<FieldMap>>,
    pages: &[&Page],
    kind: EntityKind,
    labels: &[&str],
) {
    if pages.is_empty() {
        return;
    }

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(labels.join(","));

    let (mut written, mut relationships) = (0, 0);
    for page in pages {
        match fields.get(&field_key(page)).and_then(Option::as_ref) {
            Some(map) => {
                let result = InfoboxWriter::new(kind, &page.name, map).with_labels(labels).write(store);
                relationships += result.relationships;
                report.absorb(result);
                written += 1;
            }
            None => {
                debug!(page = %page.name, "no field data, skipped");
                report.skipped += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.written += written;
    info!(labels = ?labels, pages = pages.len(), written, relationships, "group written");
}

fn in_any(page: &Page, categories: &BTreeSet<String>) -> bool {
    page.categories
        .iter()
        .any(|c| categories.contains(&format_page_name(c)))
}

/// Leaf categories under "Crops" in the category tree built from category
/// pages. Seed categories are not crops.
pub fn crop_categories(pages: &[Page]) -> BTreeSet<String> {
    let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for page in pages {
        let Some(name) = body::category_page_name(page) else {
            continue;
        };
        for parent in body::parent_categories(page) {
            children
                .entry(format_page_name(&parent))
                .or_default()
                .insert(name.clone());
        }
    }

    let mut leaves = BTreeSet::new();
    let mut seen = BTreeSet::new();
    let mut stack: Vec<String> = children.get(CROPS).into_iter().flatten().cloned().collect();
    while let Some(category) = stack.pop() {
        if !seen.insert(category.clone()) {
            continue;
        }
        match children.get(&category) {
            Some(below) => stack.extend(below.iter().cloned()),
            None if !category.to_lowercase().contains("seed") => {
                leaves.insert(category);
            }
            None => {}
        }
    }
    leaves
}
