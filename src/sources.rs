use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::parser::Page;
use crate::writer::body::Bundle;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub title: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Page title of a source file: the stem with its first letter capitalized.
/// The rest is kept as saved; `format_page_name` canonicalizes node names.
pub fn title_from_stem(stem: &str) -> String {
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Every `.txt` page in `dir`. The same page saved twice under different
/// file names keeps its largest copy.
pub fn discover(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut by_title: BTreeMap<String, SourceFile> = BTreeMap::new();

    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let is_txt = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if !is_txt || !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let file = SourceFile {
            title: title_from_stem(stem),
            size: entry.metadata()?.len(),
            path: path.clone(),
        };
        match by_title.get(&file.title) {
            Some(kept) if kept.size >= file.size => {
                debug!(title = %file.title, path = %path.display(), "duplicate page skipped");
            }
            _ => {
                by_title.insert(file.title.clone(), file);
            }
        }
    }

    Ok(by_title.into_values().collect())
}

/// Read and parse every discovered page.
pub fn load_pages(dir: &Path) -> Result<Vec<Page>> {
    let files = discover(dir)?;
    info!(dir = %dir.display(), files = files.len(), "loading pages");

    let pages = files
        .par_iter()
        .map(|f| {
            let source = std::fs::read_to_string(&f.path)
                .with_context(|| format!("reading {}", f.path.display()))?;
            Ok(Page::parse(&f.title, &source))
        })
        .collect::<Result<Vec<_>>>()?;

    let with_infobox = pages.iter().filter(|p| p.infobox.is_some()).count();
    info!(pages = pages.len(), with_infobox, "parsed pages");
    Ok(pages)
}

pub fn load_bundles(path: &Path) -> Result<Vec<Bundle>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading bundles {}", path.display()))?;
    let bundles: Vec<Bundle> = serde_json::from_str(&text)
        .with_context(|| format!("parsing bundles {}", path.display()))?;
    info!(bundles = bundles.len(), "loaded bundles");
    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[test]
    fn titles() {
        assert_eq!(title_from_stem("abigail"), "Abigail");
        assert_eq!(title_from_stem("Category:Crops"), "Category:Crops");
        assert_eq!(title_from_stem(""), "");
        assert_eq!(title_from_stem("complete_Breakfast"), "Complete_Breakfast");
    }

    #[test]
    fn discovers_fixture_pages() {
        let files = discover(&fixtures()).unwrap();
        let titles: Vec<_> = files.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Abigail"));
        assert!(titles.contains(&"Complete_Breakfast"));
        assert!(files.iter().all(|f| f.path.extension().unwrap() == "txt"));
    }

    #[test]
    fn keeps_the_largest_duplicate() {
        let dir = std::env::temp_dir().join(format!("stardew_graph_sources_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("parsnip.txt"), "short").unwrap();
        std::fs::write(dir.join("Parsnip.txt"), "a much longer copy").unwrap();
        std::fs::write(dir.join("notes.md"), "ignored").unwrap();

        let files = discover(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].title, "Parsnip");
        assert_eq!(files[0].size, "a much longer copy".len() as u64);
    }

    #[test]
    fn loads_and_parses() {
        let pages = load_pages(&fixtures()).unwrap();
        let abigail = pages.iter().find(|p| p.name == "Abigail").unwrap();
        assert_eq!(abigail.infobox_type(), Some("villager"));
    }

    #[test]
    fn bundle_file() {
        let bundles = load_bundles(&fixtures().join("bundles.json")).unwrap();
        assert_eq!(bundles[0].id, "Spring Crops Bundle");
        assert_eq!(bundles[0].bundle.len(), 4);
    }
}
