// Priority Codec - maps priorities to sortable node-name fragments
//
// Any codec is valid as long as plain lexicographic comparison of full node
// names yields the desired dequeue order.

use std::fmt::Debug;
use std::sync::LazyLock;

use regex::Regex;

use super::error::{DomainError, Result};
use super::path;

/// Priority encoding capability plugged into the queue engine.
///
/// Lower priorities (under `Ord`) are more urgent and dequeued first.
pub trait PriorityCodec: Send + Sync + 'static {
    type Priority: Ord + Clone + Debug + Send + Sync + 'static;
    type Key: Ord + Clone + Debug + Send + Sync + 'static;

    /// Reject priorities the codec cannot encode.
    fn validate(&self, priority: &Self::Priority) -> Result<()>;

    /// Node-name prefix for a sequential child; the service appends the sequence.
    fn encode_prefix(&self, priority: &Self::Priority) -> Result<String>;

    /// True iff `child_name` matches the node grammar exactly.
    fn is_valid_name(&self, child_name: &str) -> bool;

    /// Priority encoded in a bare child name or a full node path.
    /// Returns `None` for anything outside the grammar.
    fn decode_priority(&self, name_or_path: &str) -> Option<Self::Priority>;

    /// Ordering key of a valid child name.
    fn sort_key(&self, child_name: &str) -> Result<Self::Key>;
}

pub const CHILD_NAME_DELIM: &str = "-";
pub const PREFIX: &str = "q-";
pub const PRIORITY_WIDTH: usize = 3;
pub const MIN_PRIORITY: i32 = 0;
pub const MAX_PRIORITY: i32 = 999;
pub const HIGHEST_PRIORITY: i32 = MIN_PRIORITY;

/// Width the in-memory service and tests use for sequence suffixes.
/// Re-exported from `application::queue::constants`.
pub const SEQUENCE_WIDTH: usize = 10;

static CHILD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^{}([0-9]{{{}}}){}([0-9]+)$",
        regex::escape(PREFIX),
        PRIORITY_WIDTH,
        regex::escape(CHILD_NAME_DELIM)
    ))
    .expect("Invalid child name regex")
});

/// Reference codec: `q-<3-digit priority>-<sequence>`, priorities in [0, 999].
///
/// The zero-padded name already sorts correctly, so the name is its own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePriorityCodec;

impl SimplePriorityCodec {
    pub fn new() -> Self {
        Self
    }

    /// Full child name for a priority and sequence number.
    pub fn child_name(&self, priority: i32, sequence: u64) -> Result<String> {
        Ok(format!(
            "{}{:0width$}",
            self.encode_prefix(&priority)?,
            sequence,
            width = SEQUENCE_WIDTH
        ))
    }
}

impl PriorityCodec for SimplePriorityCodec {
    type Priority = i32;
    type Key = String;

    fn validate(&self, priority: &i32) -> Result<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(priority) {
            return Err(DomainError::PriorityOutOfRange {
                priority: i64::from(*priority),
                min: i64::from(MIN_PRIORITY),
                max: i64::from(MAX_PRIORITY),
            });
        }
        Ok(())
    }

    fn encode_prefix(&self, priority: &i32) -> Result<String> {
        self.validate(priority)?;
        Ok(format!(
            "{}{:0width$}{}",
            PREFIX,
            priority,
            CHILD_NAME_DELIM,
            width = PRIORITY_WIDTH
        ))
    }

    fn is_valid_name(&self, child_name: &str) -> bool {
        CHILD_PATTERN.is_match(child_name)
    }

    fn decode_priority(&self, name_or_path: &str) -> Option<i32> {
        let child_name = if path::is_valid_path(name_or_path, true) {
            path::path_end(name_or_path)
        } else {
            name_or_path
        };

        CHILD_PATTERN
            .captures(child_name)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
    }

    fn sort_key(&self, child_name: &str) -> Result<String> {
        if child_name.trim().is_empty() || !self.is_valid_name(child_name) {
            return Err(DomainError::InvalidChildName(child_name.to_string()));
        }
        Ok(child_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(priority_digits: &str, sequence: &str) -> String {
        format!("{}{}{}{}", PREFIX, priority_digits, CHILD_NAME_DELIM, sequence)
    }

    #[test]
    fn test_encode_prefix() {
        let codec = SimplePriorityCodec::new();
        assert_eq!(codec.encode_prefix(&1).unwrap(), "q-001-");
        assert_eq!(codec.encode_prefix(&0).unwrap(), "q-000-");
        assert_eq!(codec.encode_prefix(&999).unwrap(), "q-999-");
    }

    #[test]
    fn test_encode_prefix_out_of_range() {
        let codec = SimplePriorityCodec::new();
        assert!(matches!(
            codec.encode_prefix(&-1),
            Err(DomainError::PriorityOutOfRange { priority: -1, .. })
        ));
        assert!(matches!(
            codec.encode_prefix(&1000),
            Err(DomainError::PriorityOutOfRange { priority: 1000, .. })
        ));
    }

    #[test]
    fn test_priority_round_trip_over_full_range() {
        let codec = SimplePriorityCodec::new();
        for priority in MIN_PRIORITY..=MAX_PRIORITY {
            let child = format!("{}0000000042", codec.encode_prefix(&priority).unwrap());
            assert_eq!(codec.decode_priority(&child), Some(priority));
        }
    }

    #[test]
    fn test_is_valid_name() {
        let codec = SimplePriorityCodec::new();
        assert!(codec.is_valid_name(&name("001", "0000001")));
        assert!(codec.is_valid_name(&name("020", "000000002")));
        assert!(codec.is_valid_name(&name("999", "000000002")));
        // the prefix is matched literally
        assert!(!codec.is_valid_name("Q-001-5"));

        // negative-looking priority field
        assert!(!codec.is_valid_name(&name("-1", "000000002")));
        // missing prefix
        assert!(!codec.is_valid_name("020-000000002"));
        // missing delimiter
        assert!(!codec.is_valid_name("q-999000000002"));
        // wrong digit width
        assert!(!codec.is_valid_name(&name("01", "0000001")));
        assert!(!codec.is_valid_name(&name("0001", "0000001")));
        // empty or non-numeric sequence
        assert!(!codec.is_valid_name(&name("001", "")));
        assert!(!codec.is_valid_name(&name("001", "12a")));
        // trailing garbage
        assert!(!codec.is_valid_name(&format!("{}x", name("001", "1"))));
    }

    #[test]
    fn test_uppercase_prefix_cannot_jump_the_queue() {
        let codec = SimplePriorityCodec::new();
        let urgent = codec.child_name(1, 0).unwrap();
        let foreign = "Q-900-0000000001";

        assert!(codec.sort_key(foreign).is_err());
        assert_eq!(codec.decode_priority(foreign), None);
        assert!(codec.sort_key(&urgent).is_ok());
    }

    #[test]
    fn test_decode_priority() {
        let codec = SimplePriorityCodec::new();
        assert_eq!(codec.decode_priority(&name("001", "0000001")), Some(1));
        assert_eq!(codec.decode_priority("/apps/queue/q-042-0000000007"), Some(42));
        assert_eq!(codec.decode_priority(&name("-1", "000000002")), None);
        assert_eq!(codec.decode_priority("/apps/queue"), None);
        assert_eq!(codec.decode_priority(""), None);
    }

    #[test]
    fn test_sort_key() {
        let codec = SimplePriorityCodec::new();
        let child = name("001", "0000001");
        assert_eq!(codec.sort_key(&child).unwrap(), child);
        assert!(matches!(
            codec.sort_key("lock-0001"),
            Err(DomainError::InvalidChildName(_))
        ));
        assert!(codec.sort_key("  ").is_err());
    }

    #[test]
    fn test_sort_key_orders_by_priority_then_sequence() {
        let codec = SimplePriorityCodec::new();
        let mut names = vec![
            codec.child_name(5, 1).unwrap(),
            codec.child_name(3, 2).unwrap(),
            codec.child_name(3, 0).unwrap(),
            codec.child_name(100, 3).unwrap(),
        ];
        names.sort_by_key(|n| codec.sort_key(n).unwrap());

        assert_eq!(
            names,
            vec![
                "q-003-0000000000",
                "q-003-0000000002",
                "q-005-0000000001",
                "q-100-0000000003",
            ]
        );
    }
}
