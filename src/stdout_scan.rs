//! Forwarding the tracee's output, optionally watching for the log-match
//! enforcement trigger.
//!
//! The tracee's stdout and stderr are piped through the gatekeeper. The
//! forwarders echo every line to the gatekeeper's own streams; when a match
//! pattern is armed, the stdout forwarder additionally scans each line and
//! flips the enforcement bit on the first hit, then keeps forwarding
//! without scanning.

use crate::enforcement;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::io::{FromRawFd, RawFd};
use std::thread;
use tracing::info;

fn forward<R: BufRead, W: Write>(reader: R, mut out: W, mut pattern: Option<String>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();

        if let Some(p) = &pattern {
            if line.contains(p.as_str()) {
                info!("enabling gatekeeper now because the log match pattern was seen");
                enforcement::enforce_now();
                pattern = None;
            }
        }
    }
}

pub fn spawn_stdout_forwarder(fd: RawFd, pattern: Option<String>) {
    thread::Builder::new()
        .name("gk-stdout".into())
        .spawn(move || {
            let reader = BufReader::new(unsafe { File::from_raw_fd(fd) });
            forward(reader, io::stdout(), pattern);
        })
        .ok();
}

pub fn spawn_stderr_forwarder(fd: RawFd) {
    thread::Builder::new()
        .name("gk-stderr".into())
        .spawn(move || {
            let reader = BufReader::new(unsafe { File::from_raw_fd(fd) });
            forward(reader, io::stderr(), None);
        })
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_are_forwarded_verbatim() {
        let input = Cursor::new(b"one\ntwo\n".to_vec());
        let mut out = Vec::new();
        forward(input, &mut out, None);
        assert_eq!(out, b"one\ntwo\n");
    }

    #[test]
    fn a_matching_line_flips_the_enforcement_bit() {
        let input = Cursor::new(b"starting\nServer running at :8080\nmore\n".to_vec());
        let mut out = Vec::new();
        forward(input, &mut out, Some("Server running at".to_string()));
        assert!(enforcement::is_enforced());
        // Forwarding continues after the match.
        assert_eq!(out, b"starting\nServer running at :8080\nmore\n");
    }
}
