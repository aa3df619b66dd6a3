use crate::definitions::{DAYS_PER_SEASON, SEASONS};
use crate::graph::{GraphStore, NodeRef, Properties};

use super::WriteReport;

/// Calendar nodes: every `"<Season> <day>"` is `PART_OF` its season, and
/// seasons and days each form a `PRECEDES`/`FOLLOWS` cycle.
pub fn create_dates(store: &mut dyn GraphStore) -> WriteReport {
    let mut report = WriteReport::default();
    let none = Properties::new();

    let mut days = Vec::with_capacity(SEASONS.len() * DAYS_PER_SEASON as usize);
    for season in SEASONS {
        for day in 1..=DAYS_PER_SEASON {
            let name = format!("{} {}", season, day);
            link(store, &mut report, &date(&name), &date(season), "PART_OF", &none);
            days.push(name);
        }
    }

    let seasons: Vec<String> = SEASONS.iter().map(|s| s.to_string()).collect();
    for cycle in [&seasons, &days] {
        for (i, current) in cycle.iter().enumerate() {
            let next = &cycle[(i + 1) % cycle.len()];
            link(store, &mut report, &date(current), &date(next), "PRECEDES", &none);
            link(store, &mut report, &date(next), &date(current), "FOLLOWS", &none);
        }
    }

    report
}

fn date(name: &str) -> NodeRef {
    NodeRef::new(name).label("Date")
}

fn link(
    store: &mut dyn GraphStore,
    report: &mut WriteReport,
    from: &NodeRef,
    to: &NodeRef,
    rel_type: &str,
    props: &Properties,
) {
    match store.merge_relationship(from, to, rel_type, props) {
        Ok(()) => report.relationships += 1,
        Err(e) => report.record(&from.name, rel_type, &to.name, e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn full_year() {
        let mut g = MemoryGraph::new();
        let report = create_dates(&mut g);
        assert!(report.failures.is_empty());

        let stats = g.stats().unwrap();
        assert_eq!(stats.nodes, 4 + 4 * 28);
        // 112 PART_OF, 4 + 112 of each direction.
        assert_eq!(stats.relationships, 112 + 2 * (4 + 112));
        assert_eq!(stats.by_type["PRECEDES"], 116);
        assert_eq!(stats.by_label["Date"], 116);
    }

    #[test]
    fn cycles_wrap_around() {
        let mut g = MemoryGraph::new();
        create_dates(&mut g);
        assert!(g.relationship("Winter", "Spring", "PRECEDES").is_some());
        assert!(g.relationship("Spring", "Winter", "FOLLOWS").is_some());
        assert!(g.relationship("Winter 28", "Spring 1", "PRECEDES").is_some());
        assert!(g.relationship("Spring 1", "Winter 28", "FOLLOWS").is_some());
        assert!(g.relationship("Fall 13", "Fall", "PART_OF").is_some());
    }

    #[test]
    fn rerun_is_stable() {
        let mut g = MemoryGraph::new();
        create_dates(&mut g);
        let first = g.snapshot();
        create_dates(&mut g);
        assert_eq!(g.snapshot(), first);
    }
}
