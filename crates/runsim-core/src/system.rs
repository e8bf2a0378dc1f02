//! Host facts used to label uploads and notices.

const UNKNOWN_HOST: &str = "unknown-host";

/// Identifier of this machine within a fleet: the hostname, or
/// `unknown-host` when it cannot be read.
pub fn host_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_is_never_empty() {
        assert!(!host_id().is_empty());
    }
}
