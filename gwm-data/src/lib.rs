//! Aggregation of observation rows into per-point results.
//!
//! This crate turns the flat row stream returned by the backend into the
//! shapes the map and detail views consume.

/// Grouping of rows by monitoring point code.
pub mod aggregate {
    use chrono::NaiveDateTime;
    use gwm_core::dates::parse_lenient;
    use gwm_core::{PointStats, Row, VariableSpec};
    use log::debug;
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};

    /// One representative row per point plus statistics for every point.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Aggregation {
        /// First usable row seen for each code, in first-seen order
        pub representatives: Vec<Row>,
        pub stats: BTreeMap<String, PointStats>,
    }

    /// Incremental aggregator; rows can be pushed page by page and the
    /// result is the same as aggregating the concatenated stream.
    #[derive(Debug)]
    pub struct PointAggregator<'a> {
        spec: &'a VariableSpec,
        representatives: Vec<Row>,
        stats: BTreeMap<String, PointStats>,
        /// Parsed (earliest, latest) per code, kept alongside the raw text
        bounds: HashMap<String, (NaiveDateTime, NaiveDateTime)>,
        skipped: usize,
    }

    impl<'a> PointAggregator<'a> {
        pub fn new(spec: &'a VariableSpec) -> Self {
            Self {
                spec,
                representatives: Vec::new(),
                stats: BTreeMap::new(),
                bounds: HashMap::new(),
                skipped: 0,
            }
        }

        /// Rows dropped for lacking a code or numeric coordinates.
        pub fn skipped(&self) -> usize {
            self.skipped
        }

        pub fn push(&mut self, row: Row) {
            let Some(code) = row.code(self.spec.code_field) else {
                self.skipped += 1;
                return;
            };
            if row.number(self.spec.x_field).is_none() || row.number(self.spec.y_field).is_none() {
                self.skipped += 1;
                return;
            }

            let date_text = row.text(self.spec.date_field);
            if !self.stats.contains_key(&code) {
                self.representatives.push(row);
            }
            let stats = self.stats.entry(code.clone()).or_default();
            stats.count += 1;

            let Some(text) = date_text else {
                return;
            };
            let parsed = parse_lenient(&text);
            if parsed.is_sentinel() {
                stats.unparsed_dates += 1;
            }
            let when = parsed.value();
            match self.bounds.get_mut(&code) {
                None => {
                    self.bounds.insert(code, (when, when));
                    stats.min = Some(text.clone());
                    stats.max = Some(text);
                }
                Some((earliest, latest)) => {
                    if when < *earliest {
                        *earliest = when;
                        stats.min = Some(text.clone());
                    }
                    if when > *latest {
                        *latest = when;
                        stats.max = Some(text);
                    }
                }
            }
        }

        pub fn finish(self) -> Aggregation {
            debug!(
                "aggregated {} points, skipped {} rows",
                self.representatives.len(),
                self.skipped
            );
            Aggregation {
                representatives: self.representatives,
                stats: self.stats,
            }
        }
    }

    impl Extend<Row> for PointAggregator<'_> {
        fn extend<I: IntoIterator<Item = Row>>(&mut self, iter: I) {
            for row in iter {
                self.push(row);
            }
        }
    }

    /// Group `rows` by the variable's code column.
    ///
    /// Rows without a code or without numeric x/y are dropped. The first row
    /// per code becomes its representative; later rows only update stats.
    pub fn aggregate<I>(rows: I, spec: &VariableSpec) -> Aggregation
    where
        I: IntoIterator<Item = Row>,
    {
        let mut aggregator = PointAggregator::new(spec);
        aggregator.extend(rows);
        aggregator.finish()
    }

}

/// Distinct region labels.
pub mod regions {
    use gwm_core::Row;
    use std::collections::BTreeSet;

    /// Trimmed, non-empty, de-duplicated labels of `field`, sorted.
    pub fn distinct_regions(rows: &[Row], field: &str) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.text(field))
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn distinct_sorted_labels() {
            let rows: Vec<Row> = ["Bassa Pianura", " Alta Pianura", "Bassa Pianura", "", "Alta Pianura "]
                .iter()
                .map(|label| Row::from_pairs([("aquifer_system", json!(label))]))
                .chain(std::iter::once(Row::from_pairs([("aquifer_system", json!(null))])))
                .collect();
            assert_eq!(
                distinct_regions(&rows, "aquifer_system"),
                vec!["Alta Pianura", "Bassa Pianura"]
            );
        }
    }
}

pub use aggregate::{aggregate, Aggregation, PointAggregator};
pub use regions::distinct_regions;
