use kudos_common::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// A page position with out-of-range input already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u32,
    /// Within `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
}

impl PageRequest {
    pub fn clamped(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
        let page_size = page_size
            .unwrap_or(i64::from(DEFAULT_PAGE_SIZE))
            .clamp(1, i64::from(MAX_PAGE_SIZE)) as u32;
        Self { page, page_size }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}
