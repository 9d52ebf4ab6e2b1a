//! Wire codecs for proxy-wasm header maps.
//!
//! The two directions use different formats on purpose:
//! - host→guest (`proxy_get_header_map_pairs`) is a length-prefixed pairs blob
//! - guest→host (`proxy_set_header_map_pairs`) is a bare NUL-delimited token list
//!
//! They are kept as independent functions; do not expect round-trip symmetry.

use std::collections::HashMap;

/// Header name → single value. Names are stored lowercased; any string key is
/// accepted and normalized, never rejected.
pub type HeaderMap = HashMap<String, String>;

/// Lowercase every key, keeping the value set intact.
pub fn normalize(map: &HeaderMap) -> HeaderMap {
    map.iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}

/// Serialize a map to the host→guest pairs blob:
/// `[u32 pair_count][u32 key_len, u32 val_len]*N [key_bytes 0x00 val_bytes 0x00]*N`,
/// all integers little-endian.
pub fn encode_pairs(map: &HeaderMap) -> Vec<u8> {
    let pairs: Vec<(&String, &String)> = map.iter().collect();
    let mut out = Vec::new();
    out.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
    for (key, value) in &pairs {
        out.extend_from_slice(&(key.len() as u32).to_le_bytes());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    }
    for (key, value) in &pairs {
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(value.as_bytes());
        out.push(0);
    }
    out
}

/// Deserialize the guest→host format: split on NUL, drop empty tokens, pair up
/// consecutive tokens as (key, value). A trailing unpaired token is dropped.
pub fn decode_pairs(data: &[u8]) -> HeaderMap {
    let tokens: Vec<String> = data
        .split(|&b| b == 0)
        .filter(|t| !t.is_empty())
        .map(|t| String::from_utf8_lossy(t).into_owned())
        .collect();

    let mut map = HeaderMap::new();
    for pair in tokens.chunks(2) {
        if let [key, value] = pair {
            map.insert(key.clone(), value.clone());
        }
    }
    map
}
