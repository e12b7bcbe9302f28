//! Deterministic HTTP test server: accepts one connection on an ephemeral
//! port, captures the raw request and answers with a canned response.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::api::BackendClient;
use crate::checkout::CheckoutServices;
use crate::config::AppConfig;
use crate::customers::{CustomerPersistence, CustomerRecord, CustomerStore, MemoryPersistence};
use crate::error::StoreError;
use crate::navigation::SystemBrowser;
use crate::payments::HttpPaymentClient;
use crate::AppState;

/// Serve exactly one request. Returns the base URL and a handle that yields
/// the raw request text once the response has been written.
pub(crate) fn one_shot_server(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP port for test");
    let port = listener.local_addr().unwrap().port();
    let body = body.to_string();

    let handle = std::thread::spawn(move || {
        let (mut stream, _addr) = listener.accept().expect("accept TCP connection");
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            reason(status),
            body.len(),
        );
        stream
            .write_all(response.as_bytes())
            .expect("write HTTP response");
        stream.flush().expect("flush HTTP response");
        request
    });

    (format!("http://127.0.0.1:{port}"), handle)
}

/// A base URL nothing is listening on.
pub(crate) fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP port for test");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// App state over an in-memory store whose clients point at `payment_base`
/// and at a backend nobody answers.
pub(crate) fn state_with_payment_proxy(payment_base: &str) -> AppState {
    let timeout = Duration::from_secs(5);
    let store = CustomerStore::open(Box::new(MemoryPersistence::new())).expect("open store");
    let services = CheckoutServices {
        store: Arc::new(store),
        payments: Arc::new(
            HttpPaymentClient::new(payment_base, timeout, Duration::ZERO).expect("payment client"),
        ),
        backend: Arc::new(BackendClient::new(&refused_url(), timeout).expect("backend client")),
        navigator: Arc::new(SystemBrowser),
    };
    AppState::new(AppConfig::default(), services)
}

pub(crate) fn memory_state() -> AppState {
    state_with_payment_proxy(&refused_url())
}

/// In-memory persistence whose saves can be switched to fail.
#[derive(Clone, Default)]
pub(crate) struct SwitchablePersistence {
    inner: MemoryPersistence,
    failing: Arc<AtomicBool>,
}

impl SwitchablePersistence {
    pub(crate) fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl CustomerPersistence for SwitchablePersistence {
    fn load(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        self.inner.load()
    }

    fn save(&self, customers: &[CustomerRecord]) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Lock);
        }
        self.inner.save(customers)
    }
}

/// JSON body of a captured request.
pub(crate) fn request_json(raw: &str) -> serde_json::Value {
    let body = raw.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
    serde_json::from_str(body).expect("request body is JSON")
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).expect("read from TCP connection");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Status",
    }
}
