//! Plain text receipts for a fixed-pitch 80mm printer.
//!
//! ```text
//! ==================================
//!            CRAVEHUB CAFE
//! ==================================
//!
//! Receipt #: 000042
//! Date: 18/10/2026 01:05 PM
//! Type: Takeaway
//! ----------------------------------
//! ITEM                QTY    AMOUNT
//! ----------------------------------
//! Zinger Burger         2 Rs.900.00
//! ```

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Item names longer than this are cut down.
const NAME_LIMIT: usize = 18;
const NAME_KEEP: usize = 15;
const NAME_COLUMN: usize = 20;
const QTY_COLUMN: usize = 3;
const AMOUNT_COLUMN: usize = 10;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// An order as stored by the point of sale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub id: u64,
    pub created_at: String,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Receipt text layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiptFormatter {
    /// Characters per line.
    pub width: usize,
    pub store_name: String,
    /// Prefix of every amount.
    pub currency: String,
    /// Lines printed centered under the thank-you line.
    pub footer: Vec<String>,
}

impl Default for ReceiptFormatter {
    fn default() -> Self {
        ReceiptFormatter {
            width: 34,
            store_name: String::new(),
            currency: "Rs.".to_string(),
            footer: Vec::new(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn item_name(name: &str) -> String {
    if name.chars().count() > NAME_LIMIT {
        let mut short: String = name.chars().take(NAME_KEEP).collect();
        short.push_str("...");
        short
    } else {
        name.to_string()
    }
}

/// `created_at` as `dd/mm/yyyy hh:mm AM`, or unchanged when it can't be parsed.
fn format_date(created_at: &str) -> String {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(created_at, format).ok())
        .map(|date| date.format("%d/%m/%Y %I:%M %p").to_string())
        .unwrap_or_else(|| created_at.to_string())
}

impl ReceiptFormatter {
    pub fn new<S: Into<String>>(store_name: S) -> Self {
        ReceiptFormatter {
            store_name: store_name.into(),
            ..Default::default()
        }
    }

    pub fn currency<S: Into<String>>(self, currency: S) -> Self {
        ReceiptFormatter {
            currency: currency.into(),
            ..self
        }
    }

    pub fn footer<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReceiptFormatter {
            footer: lines.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    fn centered(&self, text: &str) -> String {
        let pad = self.width.saturating_sub(text.chars().count()) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    /// Render `order` and its `items` as receipt text, one `\n` per line.
    pub fn format(&self, order: &Order, items: &[LineItem]) -> String {
        let double = "=".repeat(self.width);
        let single = "-".repeat(self.width);
        let mut lines: Vec<String> = Vec::new();

        lines.push(double.clone());
        if !self.store_name.trim().is_empty() {
            lines.push(self.centered(self.store_name.trim()));
            lines.push(double.clone());
        }
        lines.push(String::new());

        lines.push(format!("Receipt #: {:06}", order.id));
        lines.push(format!("Date: {}", format_date(&order.created_at)));
        lines.push(format!("Type: {}", present(&order.order_type).unwrap_or("Takeaway")));
        if let Some(name) = present(&order.customer_name) {
            lines.push(format!("Customer: {}", name));
        }
        if let Some(phone) = present(&order.customer_phone) {
            lines.push(format!("Phone: {}", phone));
        }
        if let Some(table) = present(&order.table_number) {
            lines.push(format!("Table: {}", table));
        }

        lines.push(single.clone());
        lines.push(format!(
            "{:<name$}{:>qty$}{:>amount$}",
            "ITEM",
            "QTY",
            "AMOUNT",
            name = NAME_COLUMN,
            qty = QTY_COLUMN,
            amount = AMOUNT_COLUMN
        ));
        lines.push(single.clone());

        for item in items {
            let amount = format!("{}{:.2}", self.currency, item.amount());
            lines.push(format!(
                "{:<name$}{:>qty$}{:>amount_width$}",
                item_name(&item.name),
                item.quantity,
                amount,
                name = NAME_COLUMN,
                qty = QTY_COLUMN,
                amount_width = AMOUNT_COLUMN
            ));
        }

        lines.push(single);
        lines.push(format!("TOTAL:{}{} {:.2}", " ".repeat(20), self.currency, order.total));
        lines.push(double);
        lines.push(String::new());
        lines.push(self.centered("Thank you for your order!"));
        lines.push(String::new());
        for line in &self.footer {
            lines.push(self.centered(line));
        }
        lines.push(String::new());

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order {
            id: 42,
            created_at: "2026-10-18 13:05:00".to_string(),
            order_type: None,
            customer_name: Some("Ali".to_string()),
            customer_phone: Some(String::new()),
            table_number: None,
            total: 1250.0,
        }
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem {
                name: "Zinger Burger".to_string(),
                quantity: 2,
                price: 450.0,
            },
            LineItem {
                name: "Chocolate Fudge Brownie Shake".to_string(),
                quantity: 1,
                price: 350.0,
            },
        ]
    }

    #[test]
    fn header_and_order_info() {
        let text = ReceiptFormatter::new("CraveHub Cafe").format(&order(), &items());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(34));
        assert_eq!(lines[1], "          CraveHub Cafe");
        assert_eq!(lines[4], "Receipt #: 000042");
        assert_eq!(lines[5], "Date: 18/10/2026 01:05 PM");
        assert_eq!(lines[6], "Type: Takeaway");
        assert_eq!(lines[7], "Customer: Ali");
        // blank phone is skipped
        assert_eq!(lines[8], "-".repeat(34));
        assert_eq!(lines[9], "ITEM                QTY    AMOUNT");
    }

    #[test]
    fn item_rows_are_fixed_width() {
        let text = ReceiptFormatter::default().format(&order(), &items());
        assert!(text.contains("Zinger Burger         2 Rs.900.00\n"));
        assert!(text.contains("Chocolate Fudge...    1 Rs.350.00\n"));
        assert!(text.contains("TOTAL:                    Rs. 1250.00\n"));
    }

    #[test]
    fn unparsable_date_is_kept() {
        let mut order = order();
        order.created_at = "yesterday".to_string();
        let text = ReceiptFormatter::default().format(&order, &[]);
        assert!(text.contains("Date: yesterday\n"));
    }

    #[test]
    fn footer_and_currency() {
        let formatter = ReceiptFormatter::new("Cafe")
            .currency("$")
            .footer(vec!["Open 9 to 5"]);
        let text = formatter.format(&order(), &items()[..1]);
        assert!(text.contains("$900.00\n"));
        assert!(text.contains("\n    Thank you for your order!\n"));
        assert!(text.contains("\n           Open 9 to 5\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn order_from_json() {
        let order: Order = serde_json::from_str(
            r#"{"id": 7, "created_at": "2026-01-02 08:00:00", "order_type": "Table", "table_number": "4", "total": 99.5}"#,
        )
        .unwrap();
        let text = ReceiptFormatter::default().format(&order, &[]);
        assert!(text.contains("Type: Table\nTable: 4\n"));
        assert!(text.contains("Rs. 99.50"));
    }
}
