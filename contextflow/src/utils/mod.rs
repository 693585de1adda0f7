//! Utility functions for id generation and timestamp handling.

mod ids;
pub mod timestamps;

pub use ids::{generate_uuid, prefixed_id};
pub use timestamps::{iso_timestamp, now_millis};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }
}
