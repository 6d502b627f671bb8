//! Typed view over one spreadsheet record.

use crate::quantity::Kilograms;

/// One input record plus the outputs the pipeline fills in.
///
/// `values` holds every cell of the record in header order, so columns the
/// tool does not understand are written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-indexed line in the file, accounting for the header row.
    pub line: usize,

    /// Disambiguates otherwise identical rows.
    pub timestamp: String,

    /// Customer display name; the dedup key for remote accounts.
    pub recipient_name: String,

    /// `None` when the cell is blank; filled with the default once purchased.
    pub quantity: Option<Kilograms>,

    pub order_id: Option<String>,

    pub page_url: Option<String>,

    pub(crate) values: Vec<String>,
}

impl Row {
    /// A row is complete once both outputs are recorded.
    pub fn is_complete(&self) -> bool {
        self.has_order() && is_filled(&self.page_url)
    }

    /// Whether an order was already placed for this row.
    pub fn has_order(&self) -> bool {
        is_filled(&self.order_id)
    }

    /// The quantity that will be (or was) ordered.
    pub fn effective_quantity(&self, default: Kilograms) -> Kilograms {
        self.quantity.unwrap_or(default)
    }

    /// Raw cells in header order, as read from the file.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

fn is_filled(cell: &Option<String>) -> bool {
    cell.as_deref().is_some_and(|v| !v.is_empty())
}

/// Treats blank cells as absent.
pub(crate) fn non_empty(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn row(order_id: Option<&str>, page_url: Option<&str>) -> Row {
        Row {
            line: 2,
            timestamp: "2024-05-01 10:00:00".to_string(),
            recipient_name: "Alice".to_string(),
            quantity: None,
            order_id: order_id.map(str::to_string),
            page_url: page_url.map(str::to_string),
            values: Vec::new(),
        }
    }

    #[test]
    fn test_complete_needs_both_outputs() {
        assert!(row(Some("ord_1"), Some("https://example.com/p")).is_complete());
        assert!(!row(Some("ord_1"), None).is_complete());
        assert!(!row(None, Some("https://example.com/p")).is_complete());
        assert!(!row(None, None).is_complete());
    }

    #[test]
    fn test_empty_strings_do_not_count() {
        assert!(!row(Some(""), Some("https://example.com/p")).is_complete());
        assert!(!row(Some("ord_1"), Some("")).is_complete());
        assert!(!row(Some(""), None).has_order());
    }

    #[test]
    fn test_effective_quantity_falls_back_to_default() {
        let mut r = row(None, None);
        assert_eq!(r.effective_quantity(Kilograms::DEFAULT), Kilograms::DEFAULT);

        let five = Kilograms::from_str("5").unwrap();
        r.quantity = Some(five);
        assert_eq!(r.effective_quantity(Kilograms::DEFAULT), five);
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" ord_1 "), Some("ord_1".to_string()));
    }
}
