/// Percent-encode bytes that `http::Uri` refuses but browsers happily send,
/// such as spaces, quotes, braces and non-ASCII characters.
pub fn encode_problematic_path_chars(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b' ' | b'"' | b'<' | b'>' | b'`' | b'{' | b'}' | b'|' | b'\\' | b'^' => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
            0x00..=0x1F | 0x7F..=0xFF => encoded.push_str(&format!("%{:02X}", byte)),
            _ => encoded.push(byte as char),
        }
    }
    encoded
}

/// Split `scheme://authority/path?query` at the first `/` after the authority.
pub fn split_after_authority(url: &str) -> Option<(&str, &str)> {
    let start = url.find("://")? + 3;
    let slash = url[start..].find('/')? + start;
    Some(url.split_at(slash))
}
