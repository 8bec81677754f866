use crate::app_config::LimitsConfig;
use serde::Serialize;

/// Resolved page request. `page` is 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub page: u64,
    pub limit: u64,
}

/// Largest row offset handed to the database. SQL offsets are signed 64-bit.
const MAX_OFFSET: u64 = i64::MAX as u64;

impl Paging {
    /// Apply defaults and clamp raw query values. `page` is capped so the
    /// row offset `(page - 1) * limit` stays within `MAX_OFFSET`.
    pub fn new(page: Option<u64>, limit: Option<u64>, limits: &LimitsConfig) -> Self {
        let max = limits.max_page_size.max(1);
        let limit = limit.unwrap_or(limits.default_page_size).clamp(1, max);
        let last_page = MAX_OFFSET / limit + 1;
        Self {
            page: page.unwrap_or(1).clamp(1, last_page),
            limit,
        }
    }

    /// Zero-based page index for sea-orm paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }

    pub fn describe(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + self.limit - 1) / self.limit,
        }
    }
}

/// Paging block carried by list responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let paging = Paging::new(None, None, &LimitsConfig::default());
        assert_eq!(paging, Paging { page: 1, limit: 20 });
        assert_eq!(paging.index(), 0);
    }

    #[test]
    fn test_clamping() {
        let limits = LimitsConfig::default();
        assert_eq!(Paging::new(Some(0), Some(0), &limits), Paging { page: 1, limit: 1 });
        assert_eq!(Paging::new(Some(3), Some(500), &limits).limit, 100);
    }

    #[test]
    fn test_huge_page_offset_stays_in_range() {
        let limits = LimitsConfig::default();
        for limit in [1, 7, 20, 100] {
            let paging = Paging::new(Some(u64::MAX), Some(limit), &limits);
            let offset = paging
                .index()
                .checked_mul(paging.limit)
                .expect("offset should not overflow");
            assert!(offset <= i64::MAX as u64);
        }
        assert_eq!(Paging::new(Some(42), Some(10), &limits).page, 42);
    }

    #[test]
    fn test_total_pages() {
        let paging = Paging { page: 1, limit: 20 };
        assert_eq!(paging.describe(0).total_pages, 0);
        assert_eq!(paging.describe(20).total_pages, 1);
        assert_eq!(paging.describe(21).total_pages, 2);
    }
}
