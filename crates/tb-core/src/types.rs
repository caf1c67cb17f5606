//! Core type definitions for Timeblock
//!
//! These types are shared by the schema, the matcher and the collection.

use serde::{Deserialize, Serialize};

/// Identifier of a block set within one collection.
pub type BlockSetId = u32;

/// Milliseconds in one day.
pub const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

// =============================================================================
// List Types
// =============================================================================

/// Which rule list of a block set an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Blacklist,
    Whitelist,
}

impl ListType {
    pub const ALL: [ListType; 2] = [ListType::Blacklist, ListType::Whitelist];

    /// Key of this list inside persisted block set data.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blacklist => "blacklist",
            Self::Whitelist => "whitelist",
        }
    }

    /// Parse from the persisted key or a user-supplied name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "blacklist" | "block" => Some(Self::Blacklist),
            "whitelist" | "allow" => Some(Self::Whitelist),
            _ => None,
        }
    }
}

// =============================================================================
// Test Result
// =============================================================================

/// Outcome of testing a candidate request against one block set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TestResult {
    /// Nothing in either list matched
    Ignored = 0,
    /// A blacklist rule matched and no whitelist rule did
    Blacklisted = 1,
    /// A whitelist rule matched (wins over any blacklist match)
    Whitelisted = 2,
}

// =============================================================================
// Time Budget State
// =============================================================================

bitflags::bitflags! {
    /// Time budget state of a block set.
    ///
    /// A block set is always in exactly one state; sets of states are used to
    /// ask disjunctive questions such as `BLOCK | OVER_TIME`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimeState: u8 {
        /// Elapsed time is still within the allowance
        const TIME_LEFT = 1 << 0;
        /// Allowance used up, requests are hard blocked
        const BLOCK = 1 << 1;
        /// Allowance used up in annoy mode, only warned
        const OVER_TIME = 1 << 2;
    }
}

// =============================================================================
// Active Time Window
// =============================================================================

/// Daily active window in milliseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ActiveTime {
    pub from: u64,
    pub to: u64,
}

impl ActiveTime {
    pub const fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Equal bounds mean the block set is active all day.
    pub const fn is_always(&self) -> bool {
        self.from == self.to
    }

    /// Whether `time` (ms since midnight) falls inside the window.
    ///
    /// Bounds are exclusive. A window with `from > to` wraps past midnight.
    pub const fn contains(&self, time: u64) -> bool {
        if self.from == self.to {
            true
        } else if self.from < self.to {
            time > self.from && time < self.to
        } else {
            time > self.from || time < self.to
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 60 * 60 * 1000;

    #[test]
    fn test_active_time_always() {
        let window = ActiveTime::new(5 * HOUR, 5 * HOUR);
        assert!(window.contains(0));
        assert!(window.contains(5 * HOUR));
        assert!(window.contains(MS_PER_DAY - 1));
    }

    #[test]
    fn test_active_time_plain() {
        let window = ActiveTime::new(9 * HOUR, 17 * HOUR);
        assert!(window.contains(12 * HOUR));
        assert!(!window.contains(9 * HOUR));
        assert!(!window.contains(17 * HOUR));
        assert!(!window.contains(20 * HOUR));
    }

    #[test]
    fn test_active_time_wraps_midnight() {
        let window = ActiveTime::new(23 * HOUR, HOUR);
        assert!(window.contains(23 * HOUR + 30 * 60 * 1000));
        assert!(window.contains(30 * 60 * 1000));
        assert!(!window.contains(12 * HOUR));
    }

    #[test]
    fn test_list_type_names() {
        for list in ListType::ALL {
            assert_eq!(ListType::from_str(list.as_str()), Some(list));
        }
        assert_eq!(ListType::from_str("graylist"), None);
    }
}
