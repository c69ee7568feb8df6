use cmdr_common::{LibraryItemStatus, LibraryName};

pub const DEFAULT_PAGE_SIZE: u16 = 50;
pub const MAX_PAGE_SIZE: u16 = 200;

/// Query for listing the latest versions of library items of one type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    /// latest version having this status, instead of the latest version
    pub status: Option<LibraryItemStatus>,
    pub library: Option<LibraryName>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: LibraryItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_library(mut self, library: LibraryName) -> Self {
        self.library = Some(library);
        self
    }

    /// Set pagination using page number and page size
    ///
    /// Enforces invariants:
    /// - Page defaults to 1 if 0
    /// - Page size is capped at 200
    pub fn paginate(mut self, mut page: u16, mut page_size: u16) -> Self {
        if page == 0 {
            page = 1;
        }

        if page_size > MAX_PAGE_SIZE {
            page_size = MAX_PAGE_SIZE;
        }

        if page_size > 0 {
            let offset = ((page - 1) as i64) * (page_size as i64);
            self.offset = Some(offset);
            self.limit = Some(page_size as i64);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_caps_page_size_and_starts_at_one() {
        let query = ItemQuery::new().paginate(0, 500);
        assert_eq!(query.offset, Some(0));
        assert_eq!(query.limit, Some(200));

        let query = ItemQuery::new().paginate(3, 20);
        assert_eq!(query.offset, Some(40));
        assert_eq!(query.limit, Some(20));
    }

    #[test]
    fn zero_page_size_means_unbounded() {
        let query = ItemQuery::new().paginate(2, 0);
        assert_eq!(query.limit, None);
        assert_eq!(query.offset, None);
    }
}
