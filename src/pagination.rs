//! This modules defines the common functionality for paging data.

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Resolve the page and page size requested by a client, falling back to
    /// the defaults and keeping the page size within `1..=max_page_size`.
    ///
    /// The page is capped so the offset of its first item fits in an SQL integer.
    pub fn resolve(&self, page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1));
        let last_page = i64::MAX.unsigned_abs() / page_size;
        let page = page.unwrap_or(self.default_page).clamp(1, last_page);

        (page, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::PaginationConfig;

    #[test]
    fn uses_defaults_when_unspecified() {
        let config = PaginationConfig::default();

        assert_eq!(config.resolve(None, None), (1, 10));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let config = PaginationConfig::default();

        assert_eq!(config.resolve(Some(0), Some(0)), (1, 1));
        assert_eq!(config.resolve(Some(3), Some(1000)), (3, 100));
    }

    #[test]
    fn caps_page_so_offset_fits_in_sql_integer() {
        let config = PaginationConfig::default();

        for page_size in [1, 10, 100] {
            let (page, page_size) = config.resolve(Some(u64::MAX), Some(page_size));
            let offset = (page - 1) * page_size;

            assert!(i64::try_from(offset).is_ok());
        }
        assert_eq!(
            config.resolve(Some(1_000_000_000_000_000_000), None),
            (i64::MAX.unsigned_abs() / 10, 10)
        );
    }
}
