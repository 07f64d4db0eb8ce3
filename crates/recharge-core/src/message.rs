//! Customer-facing message texts.
//!
//! Messages are plain text for a WhatsApp-style gateway: line breaks and
//! `*bold*` markers, no markup beyond that.

use std::fmt::Write as _;

/// One priced line of an order confirmation.
#[derive(Debug, Clone)]
pub struct ReceivedLine {
    /// App name.
    pub app_name: String,
    /// Number of codes.
    pub quantity: u32,
    /// Unit price in cents.
    pub unit_price_cents: i64,
}

/// One delivered code.
#[derive(Debug, Clone)]
pub struct DeliveredCode {
    /// App name.
    pub app_name: String,
    /// The voucher value.
    pub code: String,
}

/// Format cents as `R$ 12.34`.
#[must_use]
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}R$ {}.{:02}", abs / 100, abs % 100)
}

/// Confirmation sent when an order is created.
#[must_use]
pub fn order_received(
    customer_name: &str,
    order_number: &str,
    lines: &[ReceivedLine],
    total_cents: i64,
) -> String {
    let mut items = String::new();
    for line in lines {
        let _ = writeln!(
            items,
            "- {}x {} ({})",
            line.quantity,
            line.app_name,
            format_money(line.unit_price_cents)
        );
    }

    format!(
        "Hello {customer_name}!\n\n\
         Your order #{order_number} was received.\n\n\
         *Order details:*\n\
         {items}\n\
         *Total: {}*\n\n\
         Thank you for your purchase! Your recharge codes will follow shortly.",
        format_money(total_cents)
    )
}

/// Delivery message sent when an order is completed.
///
/// Codes are grouped by app name, groups in order of first appearance.
#[must_use]
pub fn order_completed(customer_name: &str, order_number: &str, codes: &[DeliveredCode]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for delivered in codes {
        match groups.iter_mut().find(|(name, _)| *name == delivered.app_name) {
            Some((_, values)) => values.push(delivered.code.as_str()),
            None => groups.push((delivered.app_name.as_str(), vec![delivered.code.as_str()])),
        }
    }

    let mut body = String::new();
    for (app_name, values) in groups {
        for value in values {
            let _ = writeln!(body, "- {app_name}: {value}");
        }
    }

    format!(
        "Hello {customer_name}!\n\n\
         Your order #{order_number} is complete!\n\n\
         *Your recharge codes:*\n\
         {body}\n\
         Thank you for your purchase!"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(0), "R$ 0.00");
        assert_eq!(format_money(2505), "R$ 25.05");
        assert_eq!(format_money(-150), "-R$ 1.50");
    }

    #[test]
    fn received_message_lists_items_and_total() {
        let text = order_received(
            "Ana",
            "1f2e3d4c",
            &[ReceivedLine {
                app_name: "Netflix".into(),
                quantity: 2,
                unit_price_cents: 2500,
            }],
            5000,
        );
        assert!(text.starts_with("Hello Ana!"));
        assert!(text.contains("#1f2e3d4c"));
        assert!(text.contains("- 2x Netflix (R$ 25.00)"));
        assert!(text.contains("*Total: R$ 50.00*"));
    }

    #[test]
    fn completed_message_groups_codes_by_app() {
        let code = |app: &str, value: &str| DeliveredCode {
            app_name: app.into(),
            code: value.into(),
        };
        let text = order_completed(
            "Ana",
            "1f2e3d4c",
            &[code("Netflix", "N1"), code("Spotify", "S1"), code("Netflix", "N2")],
        );

        let netflix_2 = text.find("- Netflix: N2").unwrap();
        let spotify_1 = text.find("- Spotify: S1").unwrap();
        assert!(text.find("- Netflix: N1").unwrap() < netflix_2);
        assert!(netflix_2 < spotify_1);
    }
}
