/// Lowercase hex rendering with `sep` between bytes.
pub fn to_hex(bytes: &[u8], sep: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(sep)
}
