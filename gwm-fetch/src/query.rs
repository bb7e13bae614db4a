use std::fmt;

/// Sort direction for [`TableQuery::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

/// Row filter supported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column equals the given text value
    Eq(String, String),
    /// Column is not null
    NotNull(String),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::NotNull(column) => column,
        }
    }
}

/// Query shape sent to the backend, independent of pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    /// Projection; empty selects every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::NotNull(column.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }
}

/// Inclusive row range `from..=to`, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub from: usize,
    pub to: usize,
}

impl PageRange {
    /// Range covered by `page` when pages hold `page_size` rows.
    /// `page_size` must be positive.
    pub fn for_page(page: usize, page_size: usize) -> Self {
        let from = page * page_size;
        Self {
            from,
            to: from + page_size - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.to - self.from + 1
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_ranges_are_inclusive() {
        assert_eq!(PageRange::for_page(0, 1000), PageRange { from: 0, to: 999 });
        assert_eq!(PageRange::for_page(2, 1000), PageRange { from: 2000, to: 2999 });
        assert_eq!(PageRange::for_page(3, 1).len(), 1);
        assert_eq!(PageRange::for_page(1, 250).to_string(), "250-499");
    }

    #[test]
    fn builder_collects_filters_in_order() {
        let query = TableQuery::new("nitrate_samples")
            .select(["point_code", "x"])
            .not_null("point_code")
            .eq("aquifer_system", "Alta Pianura")
            .order_by("sample_date", Direction::Ascending);
        assert_eq!(query.columns, vec!["point_code", "x"]);
        assert_eq!(query.filters[0], Filter::NotNull("point_code".into()));
        assert_eq!(query.filters[1].column(), "aquifer_system");
        assert_eq!(query.order, Some(("sample_date".to_string(), Direction::Ascending)));
    }
}
