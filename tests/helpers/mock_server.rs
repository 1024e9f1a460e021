use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// What the server does with one accepted connection.
#[allow(dead_code)]
pub enum Reply {
    /// Write these bytes after reading the request head, then close.
    Raw(Vec<u8>),
    /// Read the request head and close without answering.
    Hangup,
    /// Write these bytes, then hold the connection open for a while.
    Stall(Vec<u8>),
}

/// Request heads in arrival order, one per connection.
pub type Recorded = Arc<Mutex<Vec<String>>>;

/// Scripted HTTP/1.1 server: connection N gets the N-th reply.
pub struct MockHttpServer {
    listener: TcpListener,
    port: u16,
}

impl MockHttpServer {
    /// Create a new mock server bound to a random port.
    pub async fn new() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    #[allow(dead_code)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Serve `replies` in order, one connection each, then stop accepting.
    pub fn serve(self, replies: Vec<Reply>) -> (tokio::task::JoinHandle<()>, Recorded) {
        let recorded: Recorded = Arc::default();
        let log = Arc::clone(&recorded);
        let handle = tokio::spawn(async move {
            for reply in replies {
                let (stream, _) = match self.listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                        break;
                    }
                };
                handle_connection(stream, reply, &log).await;
            }
        });
        (handle, recorded)
    }
}

async fn handle_connection(mut stream: TcpStream, reply: Reply, log: &Recorded) {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return,
            Ok(Ok(n)) => head.extend_from_slice(&buf[..n]),
        }
    }
    log.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

    match reply {
        Reply::Raw(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.flush().await;
        }
        Reply::Stall(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.flush().await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        Reply::Hangup => {}
    }
    let _ = stream.shutdown().await;
}

/// Build a `Connection: close` response with a correct Content-Length.
pub fn response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Reply {
    let mut out = format!("HTTP/1.1 {}\r\n", status_line);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    Reply::Raw(bytes)
}

/// Value of header `name` in a recorded request head, case-insensitive.
#[allow(dead_code)]
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.eq_ignore_ascii_case(name).then(|| v.trim())
    })
}
