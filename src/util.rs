/// Format a page name (possibly underscored, wrong caps) into the canonical
/// node name: "the_mines" → "The Mines".
pub fn format_page_name(page_name: &str) -> String {
    page_name
        .trim()
        .replace('_', " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a category name into a CamelCase label.
pub fn category_to_label(category: &str) -> String {
    category.split(' ').map(capitalize).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names() {
        assert_eq!(format_page_name("the_mines"), "The Mines");
        assert_eq!(format_page_name("  Carpenter's Shop "), "Carpenter's Shop");
        assert_eq!(format_page_name("spring 1"), "Spring 1");
        assert_eq!(format_page_name("JOJAMART"), "Jojamart");
    }

    #[test]
    fn labels() {
        assert_eq!(category_to_label("Artisan Goods"), "ArtisanGoods");
        assert_eq!(category_to_label("Craftable lighting"), "CraftableLighting");
    }
}
