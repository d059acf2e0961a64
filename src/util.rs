//! Small standalone helpers with no natural home elsewhere.

use sha1::{Digest, Sha1};

/// Derive a stable, short identifier for a service from its IP and name.
///
/// Stability matters more than collision-resistance here: the same
/// `(ip, name)` pair must always produce the same `uid` across restarts and
/// across cache refreshes, since SIP phones key their directory cache on it.
pub fn stable_uid(ip: &str, name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..12].to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stable_uid_is_deterministic() {
        let a = stable_uid("10.0.0.10", "AREDN Echo Test");
        let b = stable_uid("10.0.0.10", "AREDN Echo Test");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn test_stable_uid_matches_known_sha1_prefix() {
        let mut hasher = Sha1::new();
        hasher.update(b"10.0.0.10|AREDN Echo Test");
        let expected = hex::encode(hasher.finalize())[..12].to_string();
        assert_eq!(stable_uid("10.0.0.10", "AREDN Echo Test"), expected);
    }

    #[test]
    fn test_stable_uid_distinguishes_inputs() {
        assert_ne!(stable_uid("10.0.0.10", "A"), stable_uid("10.0.0.11", "A"));
        assert_ne!(stable_uid("10.0.0.10", "A"), stable_uid("10.0.0.10", "B"));
    }
}
