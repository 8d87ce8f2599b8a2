use crate::models::{Client, ClientBalance, Order};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_CREDIT_LIMIT: f64 = 500.0;

/// Balance of one client, recomputed from its orders on every read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientLedger {
    pub total: f64,
    pub order_count: usize,
    pub over_limit: bool,
    pub progress: f64,
}

impl ClientLedger {
    pub fn compute<'a, I>(orders: I, credit_limit: f64) -> Self
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let (total, order_count) = orders
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), order| (sum + order.price, count + 1));
        Self::from_total(total, order_count, credit_limit)
    }

    pub fn from_total(total: f64, order_count: usize, credit_limit: f64) -> Self {
        let progress = if credit_limit > 0.0 {
            (total / credit_limit).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            total,
            order_count,
            over_limit: total >= credit_limit,
            progress,
        }
    }
}

/// Pairs every client with its ledger, keeping the order the clients were listed in.
pub fn client_balances(
    clients: &[Client],
    orders: &[Order],
    credit_limit: f64,
) -> Vec<ClientBalance> {
    let mut by_client: HashMap<Uuid, Vec<&Order>> = HashMap::new();
    for order in orders {
        by_client.entry(order.client_id).or_default().push(order);
    }

    clients
        .iter()
        .map(|client| {
            let owned = by_client
                .get(&client.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let ledger = ClientLedger::compute(owned.iter().copied(), credit_limit);
            ClientBalance {
                client: client.clone(),
                total: ledger.total,
                order_count: ledger.order_count,
                over_limit: ledger.over_limit,
                progress: ledger.progress,
            }
        })
        .collect()
}
