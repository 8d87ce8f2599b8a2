use crate::analytics::{AnalyticsReport, MonthlyPoint};
use crate::models::{Client, ClientBalance, Order, OrderWithClient, StatementResponse};
use crate::statement::format_amount;
use uuid::Uuid;

/// Transient message shown once after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ClientAdded,
    ClientAddFailed,
    ClientDeleted,
    OrderAdded,
    OrderAddFailed,
    InvalidOrder,
    OrderDeleted,
    DeleteFailed,
    LoadFailed,
}

const NOTICES: [(Notice, &str); 9] = [
    (Notice::ClientAdded, "client_added"),
    (Notice::ClientAddFailed, "client_add_failed"),
    (Notice::ClientDeleted, "client_deleted"),
    (Notice::OrderAdded, "order_added"),
    (Notice::OrderAddFailed, "order_add_failed"),
    (Notice::InvalidOrder, "invalid_order"),
    (Notice::OrderDeleted, "order_deleted"),
    (Notice::DeleteFailed, "delete_failed"),
    (Notice::LoadFailed, "load_failed"),
];

impl Notice {
    pub fn from_key(key: &str) -> Option<Self> {
        NOTICES.iter().find(|(_, k)| *k == key).map(|(notice, _)| *notice)
    }

    pub fn key(self) -> &'static str {
        NOTICES
            .iter()
            .find(|(notice, _)| *notice == self)
            .map_or("", |(_, key)| *key)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::ClientAdded => "Client added",
            Self::ClientAddFailed => "Could not add the client",
            Self::ClientDeleted => "Client and their withdrawals deleted",
            Self::OrderAdded => "Withdrawal added",
            Self::OrderAddFailed => "Could not add the withdrawal",
            Self::InvalidOrder => "Enter a drink name and a non-negative price",
            Self::OrderDeleted => "Withdrawal deleted",
            Self::DeleteFailed => "Delete failed",
            Self::LoadFailed => "Could not load data from the store",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::ClientAddFailed
                | Self::OrderAddFailed
                | Self::InvalidOrder
                | Self::DeleteFailed
                | Self::LoadFailed
        )
    }
}

pub struct ClientsView<'a> {
    pub rows: &'a [(ClientBalance, StatementResponse)],
    pub selected: Option<(&'a ClientBalance, &'a [Order])>,
    pub currency: &'a str,
    pub notice: Option<Notice>,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn money(amount: f64, currency: &str) -> String {
    format!("{} {}", format_amount(amount), escape(currency))
}

fn notice_html(notice: Option<Notice>) -> String {
    match notice {
        Some(notice) => format!(
            r#"<div class="status" data-type="{}">{}</div>"#,
            if notice.is_error() { "error" } else { "ok" },
            notice.message()
        ),
        None => String::new(),
    }
}

fn layout(title: &str, active: &str, body: &str) -> String {
    let nav = [
        ("/", "clients", "Clients"),
        ("/withdrawals", "withdrawals", "Withdrawals"),
        ("/analytics", "analytics", "Analytics"),
    ]
    .iter()
        .map(|(href, key, label)| {
            let class = if *key == active { "tab active" } else { "tab" };
            format!(r#"<a class="{class}" href="{href}">{label}</a>"#)
        })
        .collect::<String>();

    LAYOUT_HTML
        .replace("{{TITLE}}", title)
        .replace("{{NAV}}", &nav)
        .replace("{{BODY}}", body)
}

pub fn render_login(error: Option<&str>) -> String {
    let error = error
        .map(|message| {
            format!(
                r#"<div class="status" data-type="error">{}</div>"#,
                escape(message)
            )
        })
        .unwrap_or_default();
    LOGIN_HTML.replace("{{ERROR}}", &error)
}

pub fn render_clients(view: &ClientsView<'_>) -> String {
    let mut body = notice_html(view.notice);
    body.push_str(
        r#"<section class="card">
  <h2>Add client</h2>
  <form class="inline" method="post" action="/clients">
    <input name="name" placeholder="Name" required />
    <input name="phone" placeholder="Phone" />
    <button class="btn-add" type="submit">Add</button>
  </form>
</section>"#,
    );

    if let Some((balance, orders)) = view.selected {
        body.push_str(&account_panel(balance, orders, view.currency));
    }

    if view.rows.is_empty() {
        body.push_str(r#"<p class="hint">No clients yet.</p>"#);
    } else {
        body.push_str(r#"<section class="list">"#);
        for (balance, statement) in view.rows {
            body.push_str(&client_row(balance, statement, view.currency));
        }
        body.push_str("</section>");
    }

    layout("Clients", "clients", &body)
}

fn client_row(balance: &ClientBalance, statement: &StatementResponse, currency: &str) -> String {
    let client = &balance.client;
    let flag = if balance.over_limit { " over" } else { "" };
    format!(
        r#"<article class="row{flag}">
  <div class="who">
    <strong>{name}</strong>
    <span class="hint">{phone}</span>
  </div>
  <div class="meter"><span style="width: {pct:.0}%"></span></div>
  <span class="value">{total}</span>
  <div class="actions">
    <a class="btn" href="/?client={id}">Account</a>
    <a class="btn" href="{link}" target="_blank" rel="noopener">WhatsApp</a>
    <form method="post" action="/clients/{id}/delete"
      onsubmit="return confirm('Delete this client and all their withdrawals?')">
      <button class="btn-sub" type="submit">Delete</button>
    </form>
  </div>
</article>"#,
        name = escape(&client.name),
        phone = escape(&client.phone),
        pct = balance.progress * 100.0,
        total = money(balance.total, currency),
        id = client.id,
        link = escape(&statement.link),
    )
}

fn account_panel(balance: &ClientBalance, orders: &[Order], currency: &str) -> String {
    let client = &balance.client;
    let mut lines = String::new();
    if orders.is_empty() {
        lines.push_str(r#"<p class="hint">No withdrawals yet.</p>"#);
    }
    for (index, order) in orders.iter().enumerate() {
        lines.push_str(&format!(
            r#"<li><span>{n}. {drink}</span><span>{price}</span><span class="hint">{date}</span>
  <form method="post" action="/orders/{order_id}/delete">
    <input type="hidden" name="client" value="{client_id}" />
    <button class="btn-sub small" type="submit">Delete</button>
  </form></li>"#,
            n = index + 1,
            drink = escape(&order.drink_name),
            price = money(order.price, currency),
            date = order.created_at.format("%Y-%m-%d %H:%M"),
            order_id = order.id,
            client_id = client.id,
        ));
    }

    let status = if balance.over_limit {
        r#"<span class="badge over">Over credit limit</span>"#
    } else {
        ""
    };

    format!(
        r#"<section class="card">
  <h2>{name} {status}</h2>
  <form class="inline" method="post" action="/clients/{id}/orders">
    <input name="drink_name" placeholder="Drink" required />
    <input name="price" type="number" min="0" step="0.01" placeholder="Price" required />
    <button class="btn-add" type="submit">Add withdrawal</button>
  </form>
  <ol class="orders">{lines}</ol>
  <p class="total">Total: {total}</p>
  <a class="btn" href="/">Close</a>
</section>"#,
        name = escape(&client.name),
        id = client.id,
        total = money(balance.total, currency),
    )
}

pub fn render_withdrawals(
    rows: &[OrderWithClient],
    clients: &[Client],
    selected: Option<Uuid>,
    total: f64,
    currency: &str,
    notice: Option<Notice>,
) -> String {
    let mut options = String::from(r#"<option value="all">All clients</option>"#);
    for client in clients {
        let marker = if selected == Some(client.id) { " selected" } else { "" };
        options.push_str(&format!(
            r#"<option value="{}"{marker}>{}</option>"#,
            client.id,
            escape(&client.name)
        ));
    }

    let mut list = String::new();
    if rows.is_empty() {
        list.push_str(r#"<p class="hint">No withdrawals.</p>"#);
    }
    for row in rows {
        let name = row
            .client
            .as_ref()
            .map_or("Unknown client", |client| client.name.as_str());
        list.push_str(&format!(
            r#"<article class="row">
  <div class="who"><strong>{}</strong><span class="hint">{}</span></div>
  <span>{}</span><span class="value">{}</span>
</article>"#,
            escape(name),
            row.order.created_at.format("%Y-%m-%d %H:%M"),
            escape(&row.order.drink_name),
            money(row.order.price, currency),
        ));
    }

    let body = format!(
        r#"{notice}<section class="card">
  <div class="chart-header">
    <h2>Withdrawals</h2>
    <span class="value">{total}</span>
  </div>
  <form method="get" action="/withdrawals">
    <select name="client" onchange="this.form.submit()">{options}</select>
  </form>
</section>
<section class="list">{list}</section>"#,
        notice = notice_html(notice),
        total = money(total, currency),
    );
    layout("Withdrawals", "withdrawals", &body)
}

pub fn render_analytics(report: Option<&AnalyticsReport>, currency: &str) -> String {
    let Some(report) = report else {
        return layout("Analytics", "analytics", &notice_html(Some(Notice::LoadFailed)));
    };

    let mut body = format!(
        r#"<section class="panel">
  <div class="stat"><span class="label">Clients</span><span class="value">{}</span></div>
  <div class="stat"><span class="label">Withdrawals</span><span class="value">{}</span></div>
  <div class="stat"><span class="label">Total due</span><span class="value net">{}</span></div>
  <div class="stat"><span class="label">Paid / unpaid</span><span class="value">{} / {}</span></div>
</section>"#,
        report.total_clients,
        report.total_orders,
        money(report.total_due, currency),
        report.paid_count,
        report.unpaid_count,
    );

    let per_client: Vec<(String, f64)> = report
        .orders_per_client
        .iter()
        .map(|entry| (entry.name.clone(), entry.orders as f64))
        .collect();
    let debtors: Vec<(String, f64)> = report
        .top_debtors
        .iter()
        .map(|entry| (entry.name.clone(), entry.total))
        .collect();
    let items: Vec<(String, f64)> = report
        .popular_items
        .iter()
        .map(|item| (item.name.clone(), item.count as f64))
        .collect();

    body.push_str(&chart_card("Withdrawals per client", &bar_chart(&per_client)));
    body.push_str(&chart_card("Top debtors", &bar_chart(&debtors)));
    body.push_str(&chart_card("Popular drinks", &bar_chart(&items)));
    body.push_str(&chart_card("Monthly totals", &line_chart(&report.monthly_totals)));

    layout("Analytics", "analytics", &body)
}

fn chart_card(title: &str, svg: &str) -> String {
    format!(r#"<section class="chart-card"><h2>{title}</h2>{svg}</section>"#)
}

const CHART_WIDTH: f64 = 600.0;
const CHART_HEIGHT: f64 = 260.0;
const PADDING: f64 = 40.0;

fn empty_chart() -> String {
    r#"<svg viewBox="0 0 600 260" role="img">
  <text class="chart-label" x="50%" y="50%" text-anchor="middle">No data yet</text>
</svg>"#
        .to_string()
}

fn bar_chart(points: &[(String, f64)]) -> String {
    if points.is_empty() {
        return empty_chart();
    }

    let max = points
        .iter()
        .map(|(_, value)| *value)
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let slot = (CHART_WIDTH - PADDING * 2.0) / points.len() as f64;
    let usable = CHART_HEIGHT - PADDING * 2.0;

    let mut svg = format!(r#"<svg viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" role="img">"#);
    for (index, (label, value)) in points.iter().enumerate() {
        let height = value / max * usable;
        let x = PADDING + slot * index as f64 + slot * 0.15;
        let y = CHART_HEIGHT - PADDING - height;
        svg.push_str(&format!(
            r#"<rect class="chart-bar" x="{x:.2}" y="{y:.2}"
  width="{w:.2}" height="{height:.2}" rx="4" />"#,
            w = slot * 0.7,
        ));
        svg.push_str(&format!(
            r#"<text class="chart-label" x="{cx:.2}" y="{ly:.2}" text-anchor="middle">{label}</text>
<text class="chart-label" x="{cx:.2}" y="{vy:.2}" text-anchor="middle">{value}</text>"#,
            cx = x + slot * 0.35,
            ly = CHART_HEIGHT - PADDING + 18.0,
            vy = y - 6.0,
            label = escape(label),
            value = format_amount(*value),
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn line_chart(points: &[MonthlyPoint]) -> String {
    if points.is_empty() {
        return empty_chart();
    }

    let max = points
        .iter()
        .map(|point| point.total)
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let step = if points.len() > 1 {
        (CHART_WIDTH - PADDING * 2.0) / (points.len() - 1) as f64
    } else {
        0.0
    };
    let usable = CHART_HEIGHT - PADDING * 2.0;
    let coords: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            (
                PADDING + step * index as f64,
                CHART_HEIGHT - PADDING - point.total / max * usable,
            )
        })
        .collect();

    let path = coords
        .iter()
        .enumerate()
        .map(|(index, (x, y))| {
            let command = if index == 0 { 'M' } else { 'L' };
            format!("{command} {x:.2} {y:.2}")
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut svg = format!(
        r#"<svg viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" role="img">
<path class="chart-line" d="{path}" />"#
    );
    for ((x, y), point) in coords.iter().zip(points) {
        svg.push_str(&format!(
            r#"<circle class="chart-point" cx="{x:.2}" cy="{y:.2}" r="4"><title>{}</title></circle>
<text class="chart-label" x="{x:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
            format_amount(point.total),
            CHART_HEIGHT - PADDING + 18.0,
            escape(&point.label),
        ));
    }
    svg.push_str("</svg>");
    svg
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}} · Café Ledger</title>
  <style>
    :root {
      --bg-1: #f8f3e6;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      grid-template-columns: 220px 1fr;
    }

    nav {
      background: var(--accent-2);
      padding: 28px 18px;
      display: flex;
      flex-direction: column;
      gap: 10px;
    }

    nav .tab {
      color: white;
      text-decoration: none;
      padding: 12px 16px;
      border-radius: 12px;
    }

    nav .tab.active {
      background: var(--accent);
    }

    nav form {
      margin-top: auto;
    }

    main {
      padding: 32px;
      display: grid;
      gap: 20px;
      align-content: start;
    }

    .card, .chart-card, .row, .stat {
      background: var(--card);
      border-radius: 18px;
      box-shadow: var(--shadow);
      padding: 18px;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .stat .label {
      display: block;
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .value {
      font-size: 1.4rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .value.net {
      color: var(--accent);
    }

    .list {
      display: grid;
      gap: 12px;
    }

    .row {
      display: grid;
      grid-template-columns: 2fr 1fr auto auto;
      align-items: center;
      gap: 16px;
    }

    .row.over {
      border: 2px solid var(--accent);
    }

    .who {
      display: grid;
    }

    .meter {
      height: 8px;
      background: #eee3d3;
      border-radius: 999px;
      overflow: hidden;
    }

    .meter span {
      display: block;
      height: 100%;
      background: var(--accent);
    }

    .actions, form.inline {
      display: flex;
      gap: 8px;
      align-items: center;
    }

    .orders li {
      display: grid;
      grid-template-columns: 2fr 1fr 1fr auto;
      gap: 12px;
      padding: 6px 0;
    }

    button, .btn {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 10px 16px;
      font-weight: 600;
      cursor: pointer;
      text-decoration: none;
      background: white;
      color: var(--accent-2);
    }

    .btn-add {
      background: var(--accent);
      color: white;
    }

    .btn-sub {
      background: var(--accent-2);
      color: white;
    }

    .badge.over {
      color: var(--accent);
      font-size: 0.9rem;
    }

    .status {
      padding: 12px 16px;
      border-radius: 12px;
      background: #e6f4ea;
    }

    .status[data-type="error"] {
      background: #fde2dc;
      color: #9b2c14;
    }

    .hint {
      color: #8b857d;
    }

    .chart-header {
      display: flex;
      justify-content: space-between;
      align-items: center;
    }

    .chart-bar {
      fill: var(--accent-2);
    }

    .chart-line {
      fill: none;
      stroke: var(--accent);
      stroke-width: 3;
    }

    .chart-point {
      fill: var(--accent);
    }

    .chart-label {
      font-size: 12px;
      fill: #5f5c57;
    }
  </style>
</head>
<body>
  <nav>
    {{NAV}}
    <form method="post" action="/logout"><button type="submit">Sign out</button></form>
  </nav>
  <main>
    <h1>{{TITLE}}</h1>
    {{BODY}}
  </main>
</body>
</html>
"#;

const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Sign in · Café Ledger</title>
  <style>
    body {
      margin: 0;
      min-height: 100vh;
      display: grid;
      place-items: center;
      background: linear-gradient(135deg, #f8f3e6, #ffe9d4 60%, #f9f2e9 100%);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      color: #2b2a28;
    }

    form {
      background: rgba(255, 255, 255, 0.86);
      border-radius: 28px;
      box-shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
      padding: 36px;
      display: grid;
      gap: 14px;
      width: min(380px, 100%);
    }

    input, button {
      padding: 12px 16px;
      border-radius: 12px;
      border: 1px solid rgba(47, 72, 88, 0.2);
      font-size: 1rem;
    }

    button {
      background: #ff6b4a;
      color: white;
      border: none;
      font-weight: 600;
      cursor: pointer;
    }

    .status[data-type="error"] {
      padding: 10px 14px;
      border-radius: 12px;
      background: #fde2dc;
      color: #9b2c14;
    }
  </style>
</head>
<body>
  <form method="post" action="/login">
    <h1>Café Ledger</h1>
    {{ERROR}}
    <input name="username" placeholder="Username" autocomplete="username" required />
    <input name="password" type="password" placeholder="Password"
      autocomplete="current-password" required />
    <button type="submit">Sign in</button>
  </form>
</body>
</html>
"#;
