pub const DEFAULT_PER_PAGE: usize = 25;

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    /// Pages below 1 are clamped to 1, a zero `per_page` falls back to the default.
    pub fn new(page: i64, per_page: usize) -> Self {
        Self {
            page: if page < 1 { 1 } else { page as usize },
            per_page: if per_page == 0 {
                DEFAULT_PER_PAGE
            } else {
                per_page
            },
        }
    }

    /// Reads the raw `page` query value; missing, empty and non-numeric values select page 1.
    pub fn from_query(page: Option<&str>, per_page: usize) -> Self {
        let page = page
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1);
        Self::new(page, per_page)
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}
