use crate::models::{Client, Order, OrderWithClient};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub const TOP_LIMIT: usize = 5;
pub const UNSPECIFIED_ITEM: &str = "Unspecified";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemGrouping {
    #[default]
    Trimmed,
    CaseInsensitive,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientCount {
    pub client_id: Uuid,
    pub name: String,
    pub orders: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientTotal {
    pub client_id: Uuid,
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonthlyPoint {
    /// `YYYY-MM`, sortable.
    pub month: String,
    pub label: String,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_clients: usize,
    pub total_orders: usize,
    pub total_due: f64,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub orders_per_client: Vec<ClientCount>,
    pub top_debtors: Vec<ClientTotal>,
    pub popular_items: Vec<ItemCount>,
    pub monthly_totals: Vec<MonthlyPoint>,
}

pub fn build_analytics(
    clients: &[Client],
    orders: &[Order],
    grouping: ItemGrouping,
) -> AnalyticsReport {
    let total_due = orders.iter().map(|order| order.price).sum();
    let paid_count = orders.iter().filter(|order| order.paid).count();

    let mut per_client: HashMap<Uuid, (usize, f64)> = HashMap::new();
    for order in orders {
        let entry = per_client.entry(order.client_id).or_default();
        entry.0 += 1;
        entry.1 += order.price;
    }

    let orders_per_client = clients
        .iter()
        .map(|client| ClientCount {
            client_id: client.id,
            name: client.name.clone(),
            orders: per_client.get(&client.id).map_or(0, |(count, _)| *count),
        })
        .collect();

    AnalyticsReport {
        total_clients: clients.len(),
        total_orders: orders.len(),
        total_due,
        paid_count,
        unpaid_count: orders.len() - paid_count,
        orders_per_client,
        top_debtors: top_debtors(clients, &per_client),
        popular_items: popular_items(orders, grouping),
        monthly_totals: monthly_totals(orders),
    }
}

fn top_debtors(clients: &[Client], per_client: &HashMap<Uuid, (usize, f64)>) -> Vec<ClientTotal> {
    let mut totals: Vec<ClientTotal> = clients
        .iter()
        .filter_map(|client| {
            let total = per_client.get(&client.id).map_or(0.0, |(_, total)| *total);
            (total > 0.0).then(|| ClientTotal {
                client_id: client.id,
                name: client.name.clone(),
                total,
            })
        })
        .collect();

    // sort_by is stable, equal totals keep collection order
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals.truncate(TOP_LIMIT);
    totals
}

fn popular_items(orders: &[Order], grouping: ItemGrouping) -> Vec<ItemCount> {
    let mut items: Vec<ItemCount> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let trimmed = order.drink_name.trim();
        let label = if trimmed.is_empty() { UNSPECIFIED_ITEM } else { trimmed };
        let key = match grouping {
            ItemGrouping::Trimmed => label.to_string(),
            ItemGrouping::CaseInsensitive => label.to_lowercase(),
        };

        match index_by_key.get(&key) {
            Some(&index) => items[index].count += 1,
            None => {
                index_by_key.insert(key, items.len());
                items.push(ItemCount {
                    name: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    items.sort_by(|a, b| b.count.cmp(&a.count));
    items.truncate(TOP_LIMIT);
    items
}

fn monthly_totals(orders: &[Order]) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for order in orders {
        let date = order.created_at.date_naive();
        *months.entry((date.year(), date.month())).or_default() += order.price;
    }

    months
        .into_iter()
        .filter_map(|((year, month), total)| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(MonthlyPoint {
                month: first.format("%Y-%m").to_string(),
                label: first.format("%b %Y").to_string(),
                total,
            })
        })
        .collect()
}

/// Keeps the rows belonging to `client_id`; `None` keeps everything.
pub fn filter_withdrawals(
    rows: Vec<OrderWithClient>,
    client_id: Option<Uuid>,
) -> Vec<OrderWithClient> {
    match client_id {
        Some(id) => rows
            .into_iter()
            .filter(|row| row.client.as_ref().is_some_and(|client| client.id == id))
            .collect(),
        None => rows,
    }
}

pub fn withdrawals_total(rows: &[OrderWithClient]) -> f64 {
    rows.iter().map(|row| row.order.price).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientSummary;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn client(name: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "0100".to_string(),
            created_at: at(2026, 1, 1),
        }
    }

    fn order(client_id: Uuid, drink: &str, price: f64, created_at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            client_id,
            drink_name: drink.to_string(),
            price,
            paid: false,
            created_at,
        }
    }

    #[test]
    fn summary_counts_and_paid_split() {
        let ali = client("Ali");
        let mona = client("Mona");
        let mut orders = vec![
            order(ali.id, "Tea", 10.0, at(2026, 1, 2)),
            order(ali.id, "Coffee", 15.0, at(2026, 1, 3)),
            order(mona.id, "Tea", 5.0, at(2026, 1, 4)),
        ];
        orders[1].paid = true;

        let report = build_analytics(&[ali, mona], &orders, ItemGrouping::default());
        assert_eq!(report.total_clients, 2);
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.total_due, 30.0);
        assert_eq!(report.paid_count, 1);
        assert_eq!(report.unpaid_count, 2);
        let counts: Vec<usize> = report
            .orders_per_client
            .iter()
            .map(|entry| entry.orders)
            .collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn top_debtors_are_stable_and_skip_zero() {
        let clients: Vec<Client> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| client(name))
            .collect();
        let totals = [100.0, 500.0, 500.0, 0.0, 50.0];
        let orders: Vec<Order> = clients
            .iter()
            .zip(totals)
            .filter(|(_, total)| *total > 0.0)
            .map(|(client, total)| order(client.id, "Tea", total, at(2026, 1, 1)))
            .collect();

        let report = build_analytics(&clients, &orders, ItemGrouping::default());
        let names: Vec<&str> = report
            .top_debtors
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c", "a", "e"]);
        let values: Vec<f64> = report
            .top_debtors
            .iter()
            .map(|entry| entry.total)
            .collect();
        assert_eq!(values, vec![500.0, 500.0, 100.0, 50.0]);
    }

    #[test]
    fn top_debtors_truncate_to_five() {
        let clients: Vec<Client> = (0..7).map(|i| client(&format!("c{i}"))).collect();
        let orders: Vec<Order> = clients
            .iter()
            .enumerate()
            .map(|(i, client)| order(client.id, "Tea", (i + 1) as f64, at(2026, 1, 1)))
            .collect();

        let report = build_analytics(&clients, &orders, ItemGrouping::default());
        assert_eq!(report.top_debtors.len(), TOP_LIMIT);
        assert_eq!(report.top_debtors[0].name, "c6");
        assert_eq!(report.top_debtors[4].name, "c2");
    }

    #[test]
    fn popular_items_trim_and_rank() {
        let id = Uuid::new_v4();
        let orders: Vec<Order> = ["Coffee", "Tea", "Tea ", "  ", "Juice", "Coffee", "Tea"]
            .iter()
            .map(|drink| order(id, drink, 1.0, at(2026, 1, 1)))
            .collect();

        let items = popular_items(&orders, ItemGrouping::Trimmed);
        let ranked: Vec<(&str, usize)> = items
            .iter()
            .map(|item| (item.name.as_str(), item.count))
            .collect();
        assert_eq!(
            ranked,
            vec![("Tea", 3), ("Coffee", 2), (UNSPECIFIED_ITEM, 1), ("Juice", 1)]
        );
    }

    #[test]
    fn popular_items_case_folding_is_opt_in() {
        let id = Uuid::new_v4();
        let orders: Vec<Order> = ["Tea", "tea ", "Coffee"]
            .iter()
            .map(|drink| order(id, drink, 1.0, at(2026, 1, 1)))
            .collect();

        let trimmed = popular_items(&orders, ItemGrouping::Trimmed);
        assert_eq!(trimmed.len(), 3);
        assert!(trimmed.iter().all(|item| item.count == 1));

        let folded = popular_items(&orders, ItemGrouping::CaseInsensitive);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].name, "Tea");
        assert_eq!(folded[0].count, 2);
        assert_eq!(folded[1].name, "Coffee");
    }

    #[test]
    fn monthly_series_is_chronological() {
        let id = Uuid::new_v4();
        let orders = vec![
            order(id, "Tea", 10.0, at(2026, 2, 3)),
            order(id, "Tea", 5.0, at(2025, 12, 30)),
            order(id, "Tea", 7.0, at(2026, 2, 20)),
            order(id, "Tea", 1.0, at(2025, 4, 1)),
        ];

        let series = monthly_totals(&orders);
        let months: Vec<&str> = series
            .iter()
            .map(|point| point.month.as_str())
            .collect();
        assert_eq!(months, vec!["2025-04", "2025-12", "2026-02"]);
        assert_eq!(series[0].label, "Apr 2025");
        assert_eq!(series[2].label, "Feb 2026");
        assert_eq!(series[2].total, 17.0);
    }

    #[test]
    fn withdrawals_filter_by_client() {
        let ali = client("Ali");
        let mona = client("Mona");
        let rows: Vec<OrderWithClient> = [(&ali, 10.0), (&mona, 4.0), (&ali, 2.5)]
            .into_iter()
            .map(|(owner, price)| OrderWithClient {
                order: order(owner.id, "Tea", price, at(2026, 1, 1)),
                client: Some(ClientSummary::from(owner)),
            })
            .collect();

        let filtered = filter_withdrawals(rows.clone(), Some(ali.id));
        assert_eq!(filtered.len(), 2);
        assert_eq!(withdrawals_total(&filtered), 12.5);

        let all = filter_withdrawals(rows, None);
        assert_eq!(withdrawals_total(&all), 16.5);
    }
}
