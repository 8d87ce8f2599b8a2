use once_cell::sync::Lazy;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    signed_in: bool,
    user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientRow {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ClientBalance {
    id: String,
    total: f64,
    order_count: usize,
    over_limit: bool,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    id: String,
    drink_name: String,
}

#[derive(Debug, Deserialize)]
struct ClientOrders {
    orders: Vec<OrderRow>,
    total: f64,
    over_limit: bool,
}

#[derive(Debug, Deserialize)]
struct Statement {
    text: String,
    phone: String,
    link: String,
}

#[derive(Debug, Deserialize)]
struct Withdrawals {
    withdrawals: Vec<serde_json::Value>,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct Analytics {
    total_orders: usize,
    unpaid_count: usize,
    top_debtors: Vec<serde_json::Value>,
    popular_items: Vec<serde_json::Value>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/session")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_cafe_ledger"))
        .env("PORT", port.to_string())
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env("DEMO_USERNAME", "admin")
        .env("DEMO_PASSWORD", "letmein")
        .env("CREDIT_LIMIT", "25")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

fn http_client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

async fn sign_in(client: &Client, base_url: &str) {
    let session: SessionResponse = client
        .post(format!("{base_url}/api/session"))
        .json(&json!({ "username": " Admin ", "password": "letmein" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(session.signed_in);
    assert_eq!(session.user_email.as_deref(), Some("admin@cafe.com"));
}

async fn add_client(client: &Client, base_url: &str, name: &str, phone: &str) -> ClientRow {
    let response = client
        .post(format!("{base_url}/api/clients"))
        .json(&json!({ "name": name, "phone": phone }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn add_order(
    client: &Client,
    base_url: &str,
    client_id: &str,
    drink: &str,
    price: f64,
) -> OrderRow {
    let response = client
        .post(format!("{base_url}/api/clients/{client_id}/orders"))
        .json(&json!({ "drink_name": drink, "price": price }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn http_requires_a_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = http_client();

    let response = client
        .delete(format!("{}/api/session", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/api/clients", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client.get(format!("{}/", server.base_url)).send().await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/login");

    let response = client
        .post(format!("{}/api/session", server.base_url))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_ledger_statement_and_cascade() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = http_client();
    let base = server.base_url.as_str();
    sign_in(&client, base).await;

    let ali = add_client(&client, base, "Ali", "0101 234 5678").await;
    assert_eq!(ali.name, "Ali");
    add_order(&client, base, &ali.id, "Coffee", 15.0).await;
    sleep(Duration::from_millis(5)).await;
    add_order(&client, base, &ali.id, "Tea", 10.0).await;

    let orders: ClientOrders = client
        .get(format!("{base}/api/clients/{}/orders", ali.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.orders.len(), 2);
    assert_eq!(orders.orders[0].drink_name, "Tea");
    assert_eq!(orders.total, 25.0);
    assert!(orders.over_limit);

    let balances: Vec<ClientBalance> = client
        .get(format!("{base}/api/clients"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let balance = balances
        .iter()
        .find(|row| row.id == ali.id)
        .expect("ali listed");
    assert_eq!(balance.total, 25.0);
    assert_eq!(balance.order_count, 2);
    assert!(balance.over_limit);

    let statement: Statement = client
        .get(format!("{base}/api/clients/{}/statement", ali.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(statement.text.contains("1. Tea - 10 EGP"));
    assert!(statement.text.contains("2. Coffee - 15 EGP"));
    assert!(statement.text.contains("Total: 25 EGP"));
    assert_eq!(statement.phone, "201012345678");
    assert!(statement.link.starts_with("https://wa.me/201012345678?text=Hello%20Ali"));
    assert!(!statement.link.contains('+'));

    let response = client
        .delete(format!("{base}/api/clients/{}", ali.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let orders: ClientOrders = client
        .get(format!("{base}/api/clients/{}/orders", ali.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(orders.orders.is_empty());
    assert_eq!(orders.total, 0.0);
}

#[tokio::test]
async fn http_withdrawals_and_analytics() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = http_client();
    let base = server.base_url.as_str();
    sign_in(&client, base).await;

    let before: Analytics = client
        .get(format!("{base}/api/analytics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mona = add_client(&client, base, "Mona", "").await;
    let sara = add_client(&client, base, "Sara", "").await;
    let tea = add_order(&client, base, &mona.id, "Tea", 4.0).await;
    add_order(&client, base, &sara.id, "Tea ", 6.0).await;

    let filtered: Withdrawals = client
        .get(format!("{base}/api/withdrawals?client_id={}", mona.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered.withdrawals.len(), 1);
    assert_eq!(filtered.total, 4.0);

    let after: Analytics = client
        .get(format!("{base}/api/analytics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after.total_orders, before.total_orders + 2);
    assert_eq!(after.unpaid_count, before.unpaid_count + 2);
    assert!(!after.top_debtors.is_empty());
    assert!(after.popular_items.iter().any(|item| item["name"] == "Tea"));

    let response = client
        .delete(format!("{base}/api/orders/{}", tea.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .post(format!("{base}/api/clients/{}/orders", mona.id))
        .json(&json!({ "drink_name": "Tea", "price": -3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for page in ["/", "/withdrawals", "/analytics"] {
        let response = client.get(format!("{base}{page}")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = response.text().await.unwrap();
        assert!(html.contains("Mona"), "{page} should list Mona");
    }
}

fn location(response: &reqwest::Response) -> &str {
    response.headers()["location"].to_str().unwrap()
}

#[tokio::test]
async fn http_form_posts_redirect_with_notices() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = http_client();
    let base = server.base_url.as_str();
    sign_in(&client, base).await;

    let response = client
        .post(format!("{base}/clients"))
        .form(&[("name", "Nour"), ("phone", "0100")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?notice=client_added");

    let clients: Vec<ClientRow> = client
        .get(format!("{base}/api/clients"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let nour = clients
        .iter()
        .find(|row| row.name == "Nour")
        .expect("nour listed");

    let response = client
        .post(format!("{base}/clients/{}/orders", nour.id))
        .form(&[("drink_name", "Tea"), ("price", "abc")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/?client={}&notice=invalid_order", nour.id)
    );

    let response = client
        .post(format!("{base}/clients/{}/orders", nour.id))
        .form(&[("drink_name", "Tea"), ("price", "7.5")])
        .send()
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        format!("/?client={}&notice=order_added", nour.id)
    );

    let html = client
        .get(format!("{base}/?client={}&notice=order_added", nour.id))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Total: 7.5 EGP"));

    let orders: ClientOrders = client
        .get(format!("{base}/api/clients/{}/orders", nour.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.orders.len(), 1);

    let response = client
        .post(format!("{base}/orders/{}/delete", orders.orders[0].id))
        .form(&[("client", nour.id.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/?client={}&notice=order_deleted", nour.id)
    );

    let response = client
        .post(format!("{base}/clients/{}/delete", nour.id))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/?notice=client_deleted");
}
