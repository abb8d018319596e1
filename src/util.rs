pub mod hex;

use std::sync::OnceLock;
use std::time::Instant;

pub fn now_millis() -> u128 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    Instant::now().duration_since(*start).as_millis()
}

/// Splits a `host[:port]` token into the bare host and an optional port.
///
/// Bracketed IPv6 literals keep no brackets in the returned host. A bare IPv6
/// literal (more than one colon, no brackets) is treated as having no port.
pub fn split_host_port(input: &str) -> (&str, Option<&str>) {
    if let Some(rest) = input.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').filter(|p| !p.is_empty());
            return (host, port);
        }
        return (input, None);
    }

    match input.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && !port.is_empty() => (host, Some(port)),
        _ => (input, None),
    }
}

/// Appends `default_port` to `host` unless it already names a port.
pub fn with_default_port(host: &str, default_port: u16) -> String {
    match split_host_port(host) {
        (_, Some(_)) => host.to_string(),
        (bare, None) if bare.contains(':') => format!("[{bare}]:{default_port}"),
        (bare, None) => format!("{bare}:{default_port}"),
    }
}
