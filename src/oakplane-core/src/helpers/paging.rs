use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

fn def_page() -> usize { DEFAULT_PAGE }
fn def_page_size() -> usize { DEFAULT_PAGE_SIZE }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default = "def_page")]
    pub page: usize,
    #[serde(default = "def_page_size")]
    pub page_size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Page {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }.normalized()
    }

    /// Clamp to page >= 1 and 1 <= page_size <= MAX_PAGE_SIZE.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        let p = self.normalized();
        (p.page - 1).saturating_mul(p.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    /// Slice an already filtered and ordered result set.
    pub fn from_vec(all: Vec<T>, page: Page) -> Self {
        let page = page.normalized();
        let total = all.len();
        let items = all.into_iter().skip(page.offset()).take(page.page_size).collect();
        Self { page: page.page, page_size: page.page_size, total, items }
    }
}
