//! Result paging / 结果分页

/// One page of results / 单页结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: usize,
}

/// Slice `results` into 1-based pages of `page_size` / 按页码切分结果
///
/// An out-of-range page yields no items but still reports the real page count.
/// Callers validate that both numbers are at least 1; a zero page size yields
/// an empty page with zero pages.
pub fn page<T: Clone>(results: &[T], page_num: usize, page_size: usize) -> Page<T> {
    if page_size == 0 {
        return Page { items: Vec::new(), total_pages: 0 };
    }

    let total_pages = results.len().div_ceil(page_size);
    let start = page_num.saturating_sub(1).saturating_mul(page_size);
    let end = page_num.saturating_mul(page_size).min(results.len());

    let items = if page_num == 0 || start >= end {
        Vec::new()
    } else {
        results[start..end].to_vec()
    };

    Page { items, total_pages }
}
