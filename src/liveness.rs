//! The HTTP liveness endpoint.
//!
//! `GET /live` and `GET /health` answer 200 once the enforcement bit is
//! set and 503 until then, so orchestrators can hold traffic from a target
//! whose gatekeeper has not engaged yet. Any other method on those paths is
//! a 405. The endpoint is two fixed paths with fixed bodies, served off a
//! plain listener on a dedicated thread.

use crate::enforcement;
use crate::policy::Policy;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{debug, warn};

pub fn start() {
    let policy = Policy::get();
    if !policy.server_enabled {
        return;
    }
    let port = policy.server_port;
    thread::Builder::new()
        .name("gk-liveness".into())
        .spawn(move || match TcpListener::bind(("0.0.0.0", port)) {
            Ok(listener) => {
                debug!(port, "liveness endpoint listening");
                serve(listener, enforcement::is_enforced);
            }
            Err(e) => warn!(port, "liveness endpoint disabled: {}", e),
        })
        .ok();
}

fn serve<F: Fn() -> bool>(listener: TcpListener, is_live: F) {
    for stream in listener.incoming() {
        if let Ok(stream) = stream {
            let _ = handle(stream, &is_live);
        }
    }
}

fn handle<F: Fn() -> bool>(mut stream: TcpStream, is_live: &F) -> std::io::Result<()> {
    let mut request_line = String::new();
    BufReader::new(&mut stream).read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");

    let response: &[u8] = match (method, path) {
        ("GET", "/live") | ("GET", "/health") => {
            if is_live() {
                b"HTTP/1.1 200 Ok\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOk"
            } else {
                b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            }
        }
        (_, "/live") | (_, "/health") => {
            b"HTTP/1.1 405 Method Not Allowed\r\nAllow: GET\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        }
        _ => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    };
    stream.write_all(response)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpStream;

    fn request(port: u16, req: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    fn spawn_server<F: Fn() -> bool + Send + 'static>(is_live: F) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || serve(listener, is_live));
        port
    }

    #[test]
    fn live_paths_answer_200_when_enforced() {
        let port = spawn_server(|| true);
        assert!(request(port, "GET /live HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 200"));
        assert!(request(port, "GET /health HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn live_paths_answer_503_until_enforced() {
        let port = spawn_server(|| false);
        assert!(request(port, "GET /live HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 503"));
    }

    #[test]
    fn other_methods_are_rejected() {
        let port = spawn_server(|| true);
        assert!(request(port, "POST /live HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 405"));
        assert!(request(port, "DELETE /health HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 405"));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        let port = spawn_server(|| true);
        assert!(request(port, "GET /metrics HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 404"));
    }
}
