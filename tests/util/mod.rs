//! Shared helpers for integration tests: a fake search backend and log capture.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

#[allow(dead_code)]
struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Canned reply for one grouped field.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

#[allow(dead_code)]
impl Reply {
    /// A well-formed grouping result whose buckets carry `counts`.
    pub fn buckets(counts: &[i64]) -> Self {
        let children: Vec<serde_json::Value> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                serde_json::json!({
                    "id": format!("group:string:v{i}"),
                    "relevance": 1.0,
                    "value": format!("v{i}"),
                    "fields": { "count()": c }
                })
            })
            .collect();
        let body = serde_json::json!({
            "timing": { "querytime": 0.002, "summaryfetchtime": 0.0, "searchtime": 0.003 },
            "root": {
                "id": "toplevel",
                "relevance": 1.0,
                "fields": { "totalCount": counts.iter().sum::<i64>() },
                "coverage": { "coverage": 100, "documents": 42, "full": true, "nodes": 1, "results": 1, "resultsFull": 1 },
                "children": [{
                    "id": "group:root:0",
                    "relevance": 1.0,
                    "continuation": { "this": "" },
                    "children": [{
                        "id": "grouplist:field",
                        "relevance": 1.0,
                        "label": "field",
                        "children": children
                    }]
                }]
            }
        });
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    /// A 200 response with no grouping children at all.
    pub fn no_groups() -> Self {
        Self {
            status: 200,
            body: r#"{"root":{"id":"toplevel","relevance":1.0,"fields":{"totalCount":0}}}"#.into(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Search backend on an ephemeral port answering by grouped field name.
/// Fields without a registered reply get a 500.
#[allow(dead_code)]
pub struct FakeBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

/// One request as received: the head (request line and headers) and the
/// decoded JSON body.
#[derive(Clone, Debug)]
pub struct Request {
    pub head: String,
    pub body: serde_json::Value,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn start(replies: &[(&str, Reply)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to ephemeral port");
        let addr = listener.local_addr().expect("get local addr");
        let replies: HashMap<String, Reply> = replies
            .iter()
            .map(|(field, reply)| (field.to_string(), reply.clone()))
            .collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let (head, body) = read_request(&mut stream);
                let json: serde_json::Value =
                    serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                let field = json["yql"].as_str().and_then(grouped_field).unwrap_or_default();
                seen.lock().unwrap().push(Request { head, body: json });

                let reply = replies
                    .get(&field)
                    .cloned()
                    .unwrap_or_else(|| Reply::status(500, "no such field"));
                let _ = stream.write_all(http_response(&reply).as_bytes());
                let _ = stream.flush();
            }
        });

        Self { addr, requests }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/search", self.addr)
    }

    /// JSON request bodies received so far, in arrival order.
    pub fn queries(&self) -> Vec<serde_json::Value> {
        self.requests().into_iter().map(|r| r.body).collect()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

/// Field name inside `group(...)` of a YQL grouping query.
fn grouped_field(yql: &str) -> Option<String> {
    let start = yql.find("group(")? + "group(".len();
    let end = yql[start..].find(')')? + start;
    Some(yql[start..end].trim().to_string())
}

/// Read the head and a Content-Length body.
fn read_request(stream: &mut TcpStream) -> (String, String) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data).into_owned();
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= split + 4 + content_length {
                return (text[..split].to_string(), text[split + 4..].to_string());
            }
        }
    }
    (String::from_utf8_lossy(&data).into_owned(), String::new())
}

fn http_response(reply: &Reply) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        reply.status,
        match reply.status {
            200 => "OK",
            400 => "Bad Request",
            500 => "Internal Server Error",
            _ => "Unknown",
        },
        reply.body.len(),
        reply.body
    )
}

/// A small schema with three attribute fields and one indexed-only field.
#[allow(dead_code)]
pub const PURCHASE_SCHEMA: &str = "\
schema purchase {
    document purchase {
        field date type long {
            indexing: summary | attribute
        }
        field price  type int {
            indexing: summary | attribute
        }
        field\ttitle\ttype string {
            indexing: summary | index
        }
        field customer type string {
            indexing: summary | attribute
        }
    }
}
";
