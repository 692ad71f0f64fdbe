//! Mapping between source event ids and sink-safe remote ids.
//!
//! Sink ids may only use lowercase base32hex characters (`0-9a-v`) and must be
//! 5 to 1024 characters long. The payload is a version byte, the UTF-8 id and
//! a one-byte checksum, so a one-character id still encodes to 5 characters.

use data_encoding::BASE32HEX_NOPAD;

use crate::error::{CalBridgeError, CalBridgeResult};

pub const MIN_REMOTE_ID_LEN: usize = 5;
pub const MAX_REMOTE_ID_LEN: usize = 1024;

const VERSION: u8 = 1;

/// Longest internal id (in bytes) whose encoding fits in `MAX_REMOTE_ID_LEN`.
pub const MAX_INTERNAL_ID_LEN: usize = MAX_REMOTE_ID_LEN * 5 / 8 - 2;

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn is_remote_symbol(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='v')
}

fn invalid(id: &str, reason: impl Into<String>) -> CalBridgeError {
    CalBridgeError::InvalidIdentifier {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Encode an internal id into its remote form. Deterministic.
pub fn encode(internal_id: &str) -> CalBridgeResult<String> {
    if internal_id.is_empty() {
        return Err(invalid(internal_id, "internal id is empty"));
    }
    if internal_id.len() > MAX_INTERNAL_ID_LEN {
        return Err(invalid(
            internal_id,
            format!("internal id longer than {MAX_INTERNAL_ID_LEN} bytes"),
        ));
    }

    let mut payload = Vec::with_capacity(internal_id.len() + 2);
    payload.push(VERSION);
    payload.extend_from_slice(internal_id.as_bytes());
    payload.push(checksum(internal_id.as_bytes()));

    Ok(BASE32HEX_NOPAD.encode(&payload).to_ascii_lowercase())
}

/// Decode a remote id back into the internal id it was produced from.
pub fn decode(remote_id: &str) -> CalBridgeResult<String> {
    if !(MIN_REMOTE_ID_LEN..=MAX_REMOTE_ID_LEN).contains(&remote_id.len()) {
        return Err(invalid(remote_id, "length out of range"));
    }
    if let Some(c) = remote_id.chars().find(|c| !is_remote_symbol(*c)) {
        return Err(invalid(remote_id, format!("character '{c}' not allowed")));
    }

    let payload = BASE32HEX_NOPAD
        .decode(remote_id.to_ascii_uppercase().as_bytes())
        .map_err(|e| invalid(remote_id, format!("corrupted encoding: {e}")))?;

    let (version, rest) = payload
        .split_first()
        .ok_or_else(|| invalid(remote_id, "empty payload"))?;
    if *version != VERSION {
        return Err(invalid(remote_id, format!("unknown version {version}")));
    }
    let (sum, id_bytes) = rest
        .split_last()
        .ok_or_else(|| invalid(remote_id, "missing checksum"))?;
    if id_bytes.is_empty() {
        return Err(invalid(remote_id, "empty internal id"));
    }
    if checksum(id_bytes) != *sum {
        return Err(invalid(remote_id, "checksum mismatch"));
    }

    String::from_utf8(id_bytes.to_vec()).map_err(|_| invalid(remote_id, "not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_remote_shape(remote: &str) {
        assert!(
            (MIN_REMOTE_ID_LEN..=MAX_REMOTE_ID_LEN).contains(&remote.len()),
            "length {} out of range for {remote}",
            remote.len()
        );
        assert!(remote.chars().all(is_remote_symbol), "bad alphabet: {remote}");
    }

    #[test]
    fn test_round_trip() {
        let ids = [
            "e",
            "e1",
            "040000008200E00074C5B7101A82E00800000000D0D5F2A1C2ABDA01000000000000000010000000",
            "AAMkAGI2TG93AAA=",
            "Ünïcödé id with spaces / slashes",
        ];

        for id in ids {
            let remote = encode(id).unwrap();
            assert_remote_shape(&remote);
            assert_eq!(decode(&remote).unwrap(), id);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode("e1").unwrap(), encode("e1").unwrap());
        assert_ne!(encode("e1").unwrap(), encode("e2").unwrap());
    }

    #[test]
    fn test_longest_id_fits() {
        let id = "x".repeat(MAX_INTERNAL_ID_LEN);
        let remote = encode(&id).unwrap();
        assert_remote_shape(&remote);
        assert_eq!(decode(&remote).unwrap(), id);

        let too_long = "x".repeat(MAX_INTERNAL_ID_LEN + 1);
        assert!(matches!(
            encode(&too_long),
            Err(CalBridgeError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(encode("").is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_alphabet() {
        let remote = encode("e1").unwrap();
        assert!(decode(&remote.to_ascii_uppercase()).is_err());

        let mut bad = remote.clone();
        bad.replace_range(0..1, "z");
        assert!(matches!(
            decode(&bad),
            Err(CalBridgeError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let remote = encode("meeting-42").unwrap();

        // Dropping a symbol leaves an impossible length or non-zero trailing bits
        assert!(decode(&remote[..remote.len() - 1]).is_err());

        // Flipping a symbol in the middle breaks the checksum
        let mut chars: Vec<char> = remote.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == '0' { '1' } else { '0' };
        let flipped: String = chars.into_iter().collect();
        assert!(decode(&flipped).is_err());

        assert!(decode("abc").is_err());
    }

    /// Any non-empty id of at most 150 chars, which stays within the byte limit.
    fn arb_internal_id() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<char>(), 1..150).prop_map(|chars| chars.into_iter().collect())
    }

    const SYMBOLS: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    proptest! {
        #[test]
        fn prop_round_trip(id in arb_internal_id()) {
            let remote = encode(&id).unwrap();
            prop_assert!((MIN_REMOTE_ID_LEN..=MAX_REMOTE_ID_LEN).contains(&remote.len()));
            prop_assert!(remote.chars().all(is_remote_symbol));
            prop_assert_eq!(decode(&remote).unwrap(), id);
        }

        #[test]
        fn prop_changed_symbol_never_decodes_to_original(
            id in arb_internal_id(),
            position in any::<prop::sample::Index>(),
            symbol in prop::sample::select(SYMBOLS),
        ) {
            let remote = encode(&id).unwrap();
            let mut bytes = remote.clone().into_bytes();
            let at = position.index(bytes.len());
            prop_assume!(bytes[at] != symbol);
            bytes[at] = symbol;
            let changed = String::from_utf8(bytes).unwrap();

            if let Ok(decoded) = decode(&changed) {
                prop_assert_ne!(&decoded, &id);
                prop_assert_eq!(encode(&decoded).unwrap(), changed);
            }
        }
    }
}
