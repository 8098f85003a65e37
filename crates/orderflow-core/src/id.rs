// Order identity. Ids are assigned once at acceptance and never reassigned.
use uuid::Uuid;

use crate::error::CoreError;

pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Parses an id received from the outside world (path segment, cache key).
pub fn parse_id(raw: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(raw.trim()).map_err(|_| CoreError::invalid_id(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id("").is_err());

        let id = generate_id();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
