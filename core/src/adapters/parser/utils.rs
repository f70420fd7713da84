//! Helpers shared by the tool output parsers.

/// Split a socket address into host and port.
///
/// Handles multiple address formats:
/// - IPv4: "127.0.0.1:3000" or "*:8080"
/// - IPv6 (bracketed): "\[::1]:3000" or "\[fe80::1%lo0]:8080"
/// - IPv6 (netstat): ":::8080" (port after the last colon)
///
/// Returns `None` when there is no numeric port, including `*:*`.
pub fn split_address(address: &str) -> Option<(String, u16)> {
    if address.starts_with('[') {
        let bracket_end = address.find(']')?;
        if bracket_end + 1 >= address.len() || address.as_bytes()[bracket_end + 1] != b':' {
            return None;
        }
        let host = &address[..=bracket_end];
        let port: u16 = address[bracket_end + 2..].parse().ok()?;
        Some((host.to_string(), port))
    } else {
        let last_colon = address.rfind(':')?;
        let host = &address[..last_colon];
        let port: u16 = address[last_colon + 1..].parse().ok()?;
        let host = if host.is_empty() { "*" } else { host };
        Some((host.to_string(), port))
    }
}

/// Undo the hex escapes lsof applies to command names.
pub fn unescape_lsof(name: &str) -> String {
    name.replace("\\x20", " ").replace("\\x2f", "/")
}

/// First field of a CSV line, with surrounding quotes removed.
///
/// Quoted fields may contain commas.
pub fn first_csv_field(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('"') {
        let end = rest.find('"')?;
        return Some(&rest[..end]);
    }
    line.split(',').next().map(|f| f.trim())
}
