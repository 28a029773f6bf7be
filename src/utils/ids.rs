use chrono::Utc;

const SUFFIX_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Fresh id for one WebSocket connection.
pub fn connection_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `breakout_<unix millis>_<6 random chars>`; the registry re-rolls on the
/// unlikely collision.
pub fn breakout_room_id() -> String {
    format!(
        "breakout_{}_{}",
        Utc::now().timestamp_millis(),
        nanoid::nanoid!(6, &SUFFIX_ALPHABET)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakout_id_shape() {
        let id = breakout_room_id();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "breakout");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_connection_ids_differ() {
        assert_ne!(connection_id(), connection_id());
    }
}
