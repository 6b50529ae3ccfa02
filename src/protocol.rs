//! HTTP-shaped wire protocol for the leader socket.
//!
//! Requests and responses travel over a Unix domain socket, one exchange per
//! connection. The shape is a small HTTP/1.1 subset: a request line with a
//! percent-encoded query string, headers that both sides ignore beyond
//! `Content-Length`, and a status line coming back. Two operations exist:
//!
//! - `GET /v1/lock?key=K` — read the current token (200, body = value)
//! - `PATCH /v1/lock?key=K&old=O&new=N` — compare-and-swap (204 replaced,
//!   304 unchanged, 400 malformed)
//!
//! Any status outside an operation's defined outcomes is a protocol
//! violation and fatal for the client.

use crate::error::{CorralError, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Request path for the lock API.
pub const LOCK_PATH: &str = "/v1/lock";

/// Read the current value of a key.
pub const METHOD_GET: &str = "GET";

/// Compare-and-swap the value of a key.
pub const METHOD_PATCH: &str = "PATCH";

/// A parsed request: method, path, and decoded query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl Request {
    /// Decoded query parameter, or the empty string when absent.
    ///
    /// Absent and empty are deliberately the same: the empty string is a
    /// legal state token, so no caller may need to tell them apart.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }
}

/// A response: status code plus body (empty for 204/304).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn no_content() -> Self {
        Self { status: 204, body: String::new() }
    }

    pub fn not_modified() -> Self {
        Self { status: 304, body: String::new() }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: 400, body: detail.into() }
    }

    pub fn not_found() -> Self {
        Self { status: 404, body: "not found".to_string() }
    }

    pub fn method_not_allowed() -> Self {
        Self { status: 405, body: "unsupported method".to_string() }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Unknown",
    }
}

/// Percent-encode a query component. Everything outside the unreserved set
/// is escaped, so arbitrary state tokens survive the round trip.
pub fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Decode a percent-encoded query component.
pub fn decode_component(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        CorralError::ProtocolError(format!("invalid percent-escape in '{}'", s))
                    })?;
                out.push(hex);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out)
        .map_err(|_| CorralError::ProtocolError(format!("query component '{}' is not UTF-8", s)))
}

/// Parse a raw query string (`k=v&k2=v2`) into decoded parameters.
pub fn parse_query(query: &str) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(name)?, decode_component(value)?);
    }
    Ok(params)
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", encode_component(name), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn read_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .map_err(|e| CorralError::TransportError(format!("read from leader socket: {}", e)))?;
    if n == 0 {
        return Err(CorralError::ProtocolError(
            "connection closed mid-exchange".to_string(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Skip header lines until the blank separator, returning `Content-Length`
/// if one was present.
fn read_headers(reader: &mut impl BufRead) -> Result<Option<usize>> {
    let mut content_length = None;
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            return Ok(content_length);
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = Some(value.trim().parse().map_err(|_| {
                CorralError::ProtocolError(format!("invalid Content-Length '{}'", value.trim()))
            })?);
        }
    }
}

/// Write a request onto `writer`. The request has no body.
pub fn write_request(
    writer: &mut impl Write,
    method: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<()> {
    let target = if params.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, encode_query(params))
    };
    write!(
        writer,
        "{} {} HTTP/1.1\r\nHost: corral\r\nConnection: close\r\n\r\n",
        method, target
    )
    .map_err(|e| CorralError::TransportError(format!("write to leader socket: {}", e)))?;
    writer
        .flush()
        .map_err(|e| CorralError::TransportError(format!("flush leader socket: {}", e)))
}

/// Parse one request from `reader` (request line plus headers).
pub fn read_request(reader: &mut impl BufRead) -> Result<Request> {
    let request_line = read_line(reader)?;
    let mut parts = request_line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CorralError::ProtocolError(format!(
            "malformed request line '{}'",
            request_line
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(CorralError::ProtocolError(format!(
            "unsupported protocol version '{}'",
            version
        )));
    }

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let params = parse_query(query)?;

    // Headers are read so the stream is positioned correctly, then ignored.
    read_headers(reader)?;

    Ok(Request {
        method: method.to_string(),
        path: path.to_string(),
        params,
    })
}

/// Write a response onto `writer`.
pub fn write_response(writer: &mut impl Write, response: &Response) -> Result<()> {
    write!(
        writer,
        "HTTP/1.1 {} {}\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
        response.status,
        reason_phrase(response.status),
        response.body.len(),
        response.body
    )
    .map_err(|e| CorralError::TransportError(format!("write to client: {}", e)))?;
    writer
        .flush()
        .map_err(|e| CorralError::TransportError(format!("flush to client: {}", e)))
}

/// Parse one response from `reader` (status line, headers, body).
pub fn read_response(reader: &mut impl BufRead) -> Result<Response> {
    let status_line = read_line(reader)?;
    let mut parts = status_line.splitn(3, ' ');
    let (version, status) = match (parts.next(), parts.next()) {
        (Some(v), Some(s)) => (v, s),
        _ => {
            return Err(CorralError::ProtocolError(format!(
                "malformed status line '{}'",
                status_line
            )));
        }
    };
    if !version.starts_with("HTTP/1.") {
        return Err(CorralError::ProtocolError(format!(
            "unsupported protocol version '{}'",
            version
        )));
    }
    let status: u16 = status.parse().map_err(|_| {
        CorralError::ProtocolError(format!("invalid status code in '{}'", status_line))
    })?;

    let content_length = read_headers(reader)?;

    let mut body = Vec::new();
    match content_length {
        Some(len) => {
            body.resize(len, 0);
            reader.read_exact(&mut body).map_err(|e| {
                CorralError::TransportError(format!("read response body: {}", e))
            })?;
        }
        None => {
            // No Content-Length: the peer closes the connection after the
            // body, so read to EOF.
            reader.read_to_end(&mut body).map_err(|e| {
                CorralError::TransportError(format!("read response body: {}", e))
            })?;
        }
    }

    let body = String::from_utf8(body)
        .map_err(|_| CorralError::ProtocolError("response body is not UTF-8".to_string()))?;

    Ok(Response { status, body })
}
