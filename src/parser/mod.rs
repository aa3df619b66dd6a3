pub mod infobox;
pub mod sections;
pub mod wikicode;

use std::collections::BTreeSet;

use crate::util::format_page_name;
use infobox::Infobox;
use wikicode::Wikicode;

/// A source page: markup, its tree, and everything derived from it.
#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    /// Canonical node name.
    pub name: String,
    pub wikicode: Wikicode,
    pub infobox: Option<Infobox>,
    pub categories: BTreeSet<String>,
}

impl Page {
    /// Two passes: markup → tree → infobox/categories.
    pub fn parse(title: &str, source: &str) -> Self {
        let wikicode = wikicode::parse(source);
        let infobox = infobox::find(&wikicode).map(|t| infobox::extract(title, t));
        let categories = sections::standalone_categories(source);

        Page {
            title: title.to_string(),
            name: format_page_name(title),
            wikicode,
            infobox,
            categories,
        }
    }

    pub fn infobox_type(&self) -> Option<&str> {
        self.infobox.as_ref().map(|i| i.entity_type.as_str())
    }

    pub fn headings(&self, level: Option<u8>) -> Vec<String> {
        sections::headings(&self.wikicode, level)
    }

    pub fn get_heading_content(&self, heading: &str) -> Option<String> {
        sections::section_content(&self.wikicode, heading)
    }

    pub fn is_category_page(&self) -> bool {
        self.title.contains("Category")
    }

    pub fn source(&self) -> String {
        self.wikicode.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn villager_page() {
        let page = Page::parse("abigail", &fixture("Abigail.txt"));
        assert_eq!(page.name, "Abigail");
        assert_eq!(page.infobox_type(), Some("villager"));
        let ib = page.infobox.as_ref().unwrap();
        assert!(ib.fields.contains_key("birthday"));
        assert!(page.categories.contains("Villagers"));
        assert!(page.headings(Some(2)).contains(&"Gifting".to_string()));
    }

    #[test]
    fn cooking_page() {
        let page = Page::parse("Complete_Breakfast", &fixture("Complete_Breakfast.txt"));
        assert_eq!(page.name, "Complete Breakfast");
        assert_eq!(page.infobox_type(), Some("cooking"));
        let ib = page.infobox.unwrap();
        match &ib.fields["ingredients"] {
            infobox::FieldValue::Nested(n) => assert_eq!(n.entries.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn category_page_has_no_infobox() {
        let page = Page::parse("Category:Crops", &fixture("Category_Crops.txt"));
        assert!(page.is_category_page());
        assert_eq!(page.infobox_type(), None);
    }

    #[test]
    fn source_is_preserved() {
        let src = fixture("Abigail.txt");
        assert_eq!(Page::parse("Abigail", &src).source(), src);
    }

    #[test]
    fn gifting_section() {
        let page = Page::parse("Fried Egg", &fixture("Fried_Egg.txt"));
        let body = page.get_heading_content("Gifting").unwrap();
        assert!(body.contains("|love="));
        assert!(page.get_heading_content("Trivia").is_none());
    }
}
