//! `"Value (extra)"` splitting.
//!
//! The auxiliary span runs from the first `(` to the last `)`. Parentheses are
//! not balanced, so `"A (x) B (y)"` yields the auxiliary `"x) B (y"`. Callers
//! rely on this (the artifact writer reads an inner group out of the
//! auxiliary text), so keep it as is.

use serde_json::{Map, Value};

/// Text between the first `(` and the last `)`, if the `(` comes first.
pub fn auxiliary(text: &str) -> Option<&str> {
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    if start < end {
        Some(&text[start + 1..end])
    } else {
        None
    }
}

/// Split `text` into `(primary, auxiliary)`.
pub fn extract(text: &str) -> (String, Option<String>) {
    match auxiliary(text) {
        Some(aux) => (strip(text, Some(aux)), Some(aux.to_string())),
        None => (text.trim().to_string(), None),
    }
}

/// Remove `"(auxiliary)"` once and trim. Computes the auxiliary when not given.
pub fn strip(text: &str, auxiliary_text: Option<&str>) -> String {
    let aux = match auxiliary_text {
        Some(a) => Some(a),
        None => auxiliary(text),
    };
    match aux {
        Some(a) => text.replacen(&format!("({})", a), "", 1).trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// How an auxiliary value reads when it annotates an amount.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Quantity(i64),
    Any,
    Data(String),
}

impl Annotation {
    pub fn classify(aux: &str) -> Self {
        if let Ok(n) = aux.trim().parse::<i64>() {
            Annotation::Quantity(n)
        } else if aux.to_lowercase().contains("any") {
            Annotation::Any
        } else {
            Annotation::Data(aux.to_string())
        }
    }

    /// `quantity` for numbers and the `Any` sentinel, `data` otherwise.
    pub fn insert_into(self, props: &mut Map<String, Value>) {
        match self {
            Annotation::Quantity(n) => {
                props.insert("quantity".into(), Value::from(n));
            }
            Annotation::Any => {
                props.insert("quantity".into(), Value::from("Any"));
            }
            Annotation::Data(d) => {
                props.insert("data".into(), Value::from(d));
            }
        }
    }
}

/// Parse a skill level such as `"3"` or `"Level 3"`.
pub fn parse_level(aux: &str) -> Option<i64> {
    let trimmed = aux.trim();
    let number = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("level") => &trimmed[5..],
        _ => trimmed,
    };
    number.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_quantity() {
        assert_eq!(
            extract("Fried Egg (1)"),
            ("Fried Egg".to_string(), Some("1".to_string()))
        );
    }

    #[test]
    fn extract_without_parenthesis() {
        assert_eq!(extract("Parsnip"), ("Parsnip".to_string(), None));
    }

    #[test]
    fn strip_computes_auxiliary() {
        assert_eq!(strip("Speed-Gro (20)", None), "Speed-Gro");
    }

    #[test]
    fn strip_removes_once() {
        assert_eq!(strip("A (x) (x)", Some("x")), "A  (x)");
    }

    #[test]
    fn closing_before_opening() {
        assert_eq!(auxiliary(") odd ("), None);
    }

    #[test]
    fn disjoint_groups_span_both() {
        assert_eq!(auxiliary("A (x) B (y)"), Some("x) B (y"));
        assert_eq!(extract("A (x) B (y)").0, "A");
    }

    #[test]
    fn nested_group() {
        assert_eq!(auxiliary("Bone (Skeleton (2.5%))"), Some("Skeleton (2.5%)"));
    }

    #[test]
    fn annotations() {
        assert_eq!(Annotation::classify("5"), Annotation::Quantity(5));
        assert_eq!(Annotation::classify("Any Fish"), Annotation::Any);
        assert_eq!(Annotation::classify("ANY"), Annotation::Any);
        assert_eq!(Annotation::classify("rare"), Annotation::Data("rare".into()));
    }

    #[test]
    fn levels() {
        assert_eq!(parse_level("Level 3"), Some(3));
        assert_eq!(parse_level("level 10"), Some(10));
        assert_eq!(parse_level("7"), Some(7));
        assert_eq!(parse_level("Heart 3"), None);
    }
}
