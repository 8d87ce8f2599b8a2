use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// One withdrawal charged to a client's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub drink_name: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_false")]
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id,
            name: client.name.clone(),
            phone: client.phone.clone(),
        }
    }
}

/// An order row with its owning client embedded, as the withdrawals screen
/// reads it. The embedded client is absent when the row is orphaned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithClient {
    #[serde(flatten)]
    pub order: Order,
    #[serde(rename = "clients", default)]
    pub client: Option<ClientSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub client_id: Uuid,
    pub drink_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_email: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub signed_in: bool,
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddClientRequest {
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// Price arrives as free text from the form and as a number from the JSON
/// API; both are parsed by the handler.
#[derive(Debug, Deserialize)]
pub struct AddOrderRequest {
    pub drink_name: String,
    pub price: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AddOrderForm {
    pub drink_name: String,
    pub price: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteOrderForm {
    pub client: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientBalance {
    #[serde(flatten)]
    pub client: Client,
    pub total: f64,
    pub order_count: usize,
    pub over_limit: bool,
    pub progress: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientOrdersResponse {
    pub client_id: Uuid,
    pub orders: Vec<Order>,
    pub total: f64,
    pub over_limit: bool,
    pub progress: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatementResponse {
    pub client_id: Uuid,
    pub text: String,
    pub phone: String,
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<OrderWithClient>,
    pub total: f64,
}

/// Reads a price the way the ledger expects it: numbers and numeric strings
/// pass through, anything else counts as zero.
pub fn parse_price(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(price) if price.is_finite() && price != 0.0 => price,
        _ => 0.0,
    }
}

fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_price(&value))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_accepts_string_and_garbage_prices() {
        let base = json!({
            "id": "7f0c1c5e-4c1a-4d7e-9a59-2b7c4d8e1f00",
            "client_id": "0b6a7a3c-1d2e-4f50-8a9b-c0d1e2f3a4b5",
            "drink_name": "Tea",
            "created_at": "2026-01-05T10:00:00Z"
        });

        let mut numeric = base.clone();
        numeric["price"] = json!("12.5");
        let order: Order = serde_json::from_value(numeric).unwrap();
        assert_eq!(order.price, 12.5);
        assert!(!order.paid);

        let mut garbage = base.clone();
        garbage["price"] = json!("free");
        garbage["paid"] = json!(null);
        let order: Order = serde_json::from_value(garbage).unwrap();
        assert_eq!(order.price, 0.0);
        assert!(!order.paid);
    }

    #[test]
    fn joined_row_reads_embedded_client() {
        let row: OrderWithClient = serde_json::from_value(json!({
            "id": "7f0c1c5e-4c1a-4d7e-9a59-2b7c4d8e1f00",
            "client_id": "0b6a7a3c-1d2e-4f50-8a9b-c0d1e2f3a4b5",
            "drink_name": "Coffee",
            "price": 15,
            "paid": true,
            "created_at": "2026-01-05T10:00:00Z",
            "clients": {
                "id": "0b6a7a3c-1d2e-4f50-8a9b-c0d1e2f3a4b5",
                "name": "Ali",
                "phone": null
            }
        }))
        .unwrap();

        assert_eq!(row.order.price, 15.0);
        assert!(row.order.paid);
        let client = row.client.expect("embedded client");
        assert_eq!(client.name, "Ali");
        assert_eq!(client.phone, "");
    }
}
