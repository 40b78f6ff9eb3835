//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};

/// In-memory log sink target.
#[derive(Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Split the captured output into request blocks (delimiter excluded).
    pub fn blocks(&self) -> Vec<Vec<String>> {
        let mut blocks: Vec<Vec<String>> = Vec::new();
        for line in self.contents().lines() {
            if line == "====" {
                blocks.push(Vec::new());
            } else if let Some(block) = blocks.last_mut() {
                block.push(line.to_string());
            } else {
                panic!("line outside of a block: {line}");
            }
        }
        blocks
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that always fails.
pub struct Broken;

impl Write for Broken {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}

/// Writer that panics on its first write, then appends to `out`.
#[derive(Clone, Default)]
pub struct PanicOnce {
    panicked: Arc<AtomicBool>,
    pub out: Buffer,
}

impl Write for PanicOnce {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("log writer exploded");
        }
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that panics on every write.
pub struct Exploding;

impl Write for Exploding {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        panic!("log writer exploded");
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Parse a `Duration` debug rendering such as `1.52ms`, `830ns` or `2.1s`.
pub fn parse_debug_duration(text: &str) -> Option<Duration> {
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    let nanos = match unit {
        "ns" => value,
        "µs" => value * 1e3,
        "ms" => value * 1e6,
        "s" => value * 1e9,
        _ => return None,
    };
    Some(Duration::from_nanos(nanos as u64))
}
