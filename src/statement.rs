use crate::models::Order;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const DEFAULT_CURRENCY: &str = "EGP";
pub const DEFAULT_COUNTRY_CODE: &str = "20";

const WHATSAPP_BASE: &str = "https://wa.me/";

/// Characters a URI component keeps as-is; everything else is escaped, so
/// spaces become `%20` rather than `+`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Renders a client's orders as a payment request, in the order given
/// (the store delivers them most recent first).
pub fn format_statement(client_name: &str, orders: &[Order], currency: &str) -> String {
    if orders.is_empty() {
        return format!("Hello {client_name},\nPlease settle your account.");
    }

    let mut message = format!("Hello {client_name},\nPlease settle the following account:\n");
    let mut total = 0.0;
    for (index, order) in orders.iter().enumerate() {
        total += order.price;
        message.push_str(&format!(
            "{}. {} - {} {currency}\n",
            index + 1,
            order.drink_name,
            format_amount(order.price)
        ));
    }
    message.push_str(&format!("Total: {} {currency}\nThank you!", format_amount(total)));
    message
}

/// Shortest decimal rendering: `10`, `12.5`.
pub fn format_amount(amount: f64) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    rounded.to_string()
}

/// Digits only; a leading `0` becomes the country code.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('0') {
        Some(rest) => format!("{country_code}{rest}"),
        None => digits,
    }
}

pub fn whatsapp_link(phone: &str, text: &str, country_code: &str) -> String {
    let normalized = normalize_phone(phone, country_code);
    let text = utf8_percent_encode(text, URI_COMPONENT);
    format!("{WHATSAPP_BASE}{normalized}?text={text}")
}
