//! Result pagination. Pure logic.

use crate::result::ValueItem;

/// Page size applied when the display config leaves it unset or invalid.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Slice one page out of the ordered value-item set.
///
/// `page_size <= 0` normalizes to [`DEFAULT_PAGE_SIZE`]; `page_index` is
/// 1-based. Returns the page plus whether more items follow it. A start
/// beyond the total yields an empty page, not an error.
pub fn paginate(values: &[ValueItem], page_size: i64, page_index: i64) -> (Vec<ValueItem>, bool) {
    let page_size = if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    let page_index = page_index.max(1);

    let total = values.len() as i64;
    let has_more = total > page_size * page_index;

    let start = (page_index - 1) * page_size;
    if start >= total {
        return (Vec::new(), has_more);
    }
    let end = (start + page_size).min(total);
    (values[start as usize..end as usize].to_vec(), has_more)
}

/// The effective page size after normalization, for the report's `page`
/// block.
pub fn effective_page_size(page_size: i64) -> i64 {
    if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<ValueItem> {
        (0..n)
            .map(|i| ValueItem {
                target: format!("node-{i}"),
                value: Some(i as f64),
                status: "ok".to_string(),
                missing: false,
            })
            .collect()
    }

    #[test]
    fn last_partial_page_has_no_more() {
        // 25 items, page size 10, page 3 -> items 21-25.
        let all = items(25);
        let (page, has_more) = paginate(&all, 10, 3);
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].target, "node-20");
        assert_eq!(page[4].target, "node-24");
        assert!(!has_more);
    }

    #[test]
    fn full_page_with_remainder_has_more() {
        let all = items(25);
        let (page, has_more) = paginate(&all, 10, 1);
        assert_eq!(page.len(), 10);
        assert!(has_more);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let all = items(5);
        let (page, has_more) = paginate(&all, 10, 4);
        assert!(page.is_empty());
        assert!(!has_more);
    }

    #[test]
    fn non_positive_page_size_uses_default() {
        let all = items(25);
        let (page, has_more) = paginate(&all, 0, 1);
        assert_eq!(page.len(), DEFAULT_PAGE_SIZE as usize);
        assert!(has_more);
        assert_eq!(effective_page_size(-3), DEFAULT_PAGE_SIZE);
        assert_eq!(effective_page_size(7), 7);
    }

    #[test]
    fn concatenated_pages_reproduce_the_input() {
        let all = items(23);
        let size = 7i64;
        let mut rebuilt = Vec::new();
        let mut index = 1;
        loop {
            let (page, has_more) = paginate(&all, size, index);
            rebuilt.extend(page);
            if !has_more {
                break;
            }
            index += 1;
        }
        assert_eq!(rebuilt.len(), all.len());
        for (a, b) in rebuilt.iter().zip(&all) {
            assert_eq!(a.target, b.target);
        }
    }
}
