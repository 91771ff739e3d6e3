//! Offset pagination arithmetic.

/// Highest page a listing will seek to. Offsets derived from it stay well
/// inside the signed 64-bit range databases bind.
pub const MAX_PAGE: u64 = u32::MAX as u64;

/// Parse a `?page=` value. Anything missing, malformed or below 1 is page 1;
/// anything past [`MAX_PAGE`] is clamped to it.
pub fn page_number(raw: Option<&str>) -> u64 {
    raw.and_then(|p| p.trim().parse::<u64>().ok())
        .filter(|p| *p >= 1)
        .map_or(1, |p| p.min(MAX_PAGE))
}

pub fn offset(page: u64, size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(size)
}

pub fn total_pages(total: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    (total + size - 1) / size
}

/// With a real total, more rows exist past this page.
pub fn has_more_than(page: u64, size: u64, total: u64) -> bool {
    offset(page, size).saturating_add(size) < total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("3")), 3);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some("-2")), 1);
        assert_eq!(page_number(Some("two")), 1);
        assert_eq!(page_number(Some("18446744073709551615")), MAX_PAGE);
    }

    #[test]
    fn test_offset() {
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(3, 10), 20);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn test_has_more_than() {
        assert!(has_more_than(1, 10, 11));
        assert!(!has_more_than(1, 10, 10));
        assert!(!has_more_than(2, 10, 15));
        assert!(!has_more_than(u64::MAX, 10, 15));
    }
}
