use std::collections::HashMap;

use crate::models::{BucketKey, ChatMessage};

/// Messages of one bucket, in their original order
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub messages: Vec<ChatMessage>,
}

/// Group messages by bucket key.
///
/// Buckets come out in order of the first message seen for each key and
/// keep the relative order of their messages.
pub fn partition(messages: Vec<ChatMessage>) -> Vec<Bucket> {
    let mut index: HashMap<BucketKey, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for message in messages {
        let key = BucketKey::from_timestamp(message.created_at);
        match index.get(&key) {
            Some(&slot) => buckets[slot].messages.push(message),
            None => {
                index.insert(key, buckets.len());
                buckets.push(Bucket {
                    key,
                    messages: vec![message],
                });
            }
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64, hour: u32, minute: u32) -> ChatMessage {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap();
        ChatMessage::new(1, id, 10, "user", format!("m{}", id), ts)
    }

    #[test]
    fn test_empty_input_yields_no_buckets() {
        assert!(partition(Vec::new()).is_empty());
    }

    #[test]
    fn test_groups_by_hour() {
        let buckets = partition(vec![msg(1, 10, 5), msg(2, 10, 40), msg(3, 11, 10)]);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key.hour_of_day(), 10);
        assert_eq!(
            buckets[0].messages.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(buckets[1].key.hour_of_day(), 11);
        assert_eq!(buckets[1].messages.len(), 1);
    }

    #[test]
    fn test_preserves_first_appearance_order() {
        // Out-of-order input: the 12:00 bucket is seen first.
        let buckets = partition(vec![msg(1, 12, 0), msg(2, 9, 0), msg(3, 12, 30)]);

        let hours: Vec<u32> = buckets.iter().map(|b| b.key.hour_of_day()).collect();
        assert_eq!(hours, vec![12, 9]);
        assert_eq!(
            buckets[0].messages.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }
}
