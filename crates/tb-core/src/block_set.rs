//! Block Set Matching and Time Budget
//!
//! A [`BlockSet`] owns one [`BlockSetData`] plus the compiled regular
//! expressions of its URL rules. Every mutation of a pattern or regex list
//! updates the compiled cache in the same call, so matching never sees the
//! two out of sync.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, LocalResult, TimeZone, Timelike};
use regex::Regex;
use serde_json::Value;

use crate::events::{Change, EventChannel};
use crate::pattern::pattern_to_regexp;
use crate::schema::{parse_block_set_data, BlockList, BlockSetData, ParseError, YTChannel};
use crate::types::{ActiveTime, BlockSetId, ListType, TestResult, TimeState, MS_PER_DAY};
use crate::url::strip_scheme;
use crate::youtube::{is_known_category, ChannelTitleFetcher, FetchError};

// =============================================================================
// Errors
// =============================================================================

/// Error type for adding a rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddError {
    #[error("Rule is already in the list")]
    Duplicate,
    #[error("Invalid regular expression: {0}")]
    InvalidRegExp(String),
    #[error("Unknown YouTube category id: {0}")]
    InvalidYTCategoryId(String),
    #[error("Channel lookup failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Error type for setters with a restricted range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

// =============================================================================
// Compiled Rules
// =============================================================================

/// Compiled URL rules of one list, index-aligned with the data lists.
///
/// Stored regexps are written in the browser's RegExp dialect, so they go
/// through `fancy_regex` for look-around and backreferences. A slot is `None`
/// when stored source failed to compile; it never matches.
#[derive(Debug, Default)]
struct CompiledList {
    patterns: Vec<Option<Regex>>,
    regexps: Vec<Option<fancy_regex::Regex>>,
}

impl CompiledList {
    fn compile(list: &BlockList) -> Self {
        Self {
            patterns: list
                .url_patterns
                .iter()
                .map(|p| compile_logged(p, pattern_to_regexp(p)))
                .collect(),
            regexps: list
                .url_reg_exps
                .iter()
                .map(|r| compile_logged(r, fancy_regex::Regex::new(r)))
                .collect(),
        }
    }

    fn is_match(&self, url: &str) -> bool {
        self.patterns.iter().flatten().any(|re| re.is_match(url))
            || self.regexps.iter().flatten().any(|re| match re.is_match(url) {
                Ok(found) => found,
                Err(e) => {
                    log::warn!("Rule {:?} failed on {url:?}: {e}", re.as_str());
                    false
                }
            })
    }
}

fn compile_logged<R, E: fmt::Display>(source: &str, compiled: Result<R, E>) -> Option<R> {
    match compiled {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("Ignoring rule {source:?} that does not compile: {e}");
            None
        }
    }
}

// =============================================================================
// Change Channels
// =============================================================================

/// Change notification channels of a block set.
///
/// Field channels receive the new value; `any` receives the whole block set
/// after every change.
#[derive(Debug, Default)]
pub struct BlockSetEvents {
    pub name: EventChannel<Change<String>>,
    pub require_active: EventChannel<Change<bool>>,
    pub annoy_mode: EventChannel<Change<bool>>,
    pub time_allowed: EventChannel<Change<u64>>,
    pub reset_time: EventChannel<Change<u64>>,
    pub last_reset: EventChannel<Change<u64>>,
    pub active_days: EventChannel<Change<[bool; 7]>>,
    pub active_time: EventChannel<Change<ActiveTime>>,
    pub time_elapsed: EventChannel<Change<u64>>,
    pub blacklist: EventChannel<Change<BlockList>>,
    pub whitelist: EventChannel<Change<BlockList>>,
    pub any: EventChannel<BlockSet>,
}

impl BlockSetEvents {
    fn list(&self, list: ListType) -> &EventChannel<Change<BlockList>> {
        match list {
            ListType::Blacklist => &self.blacklist,
            ListType::Whitelist => &self.whitelist,
        }
    }
}

// =============================================================================
// Block Set
// =============================================================================

pub struct BlockSet {
    id: BlockSetId,
    data: BlockSetData,
    time_elapsed: u64,
    blacklist: CompiledList,
    whitelist: CompiledList,
    events: BlockSetEvents,
}

impl fmt::Debug for BlockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockSet")
            .field("id", &self.id)
            .field("name", &self.data.name)
            .field("time_elapsed", &self.time_elapsed)
            .finish_non_exhaustive()
    }
}

impl BlockSet {
    /// Parse stored data (of any schema version) into a block set.
    pub fn create(id: BlockSetId, raw: Option<&Value>, time_elapsed: u64) -> Result<Self, ParseError> {
        let data = parse_block_set_data(raw)?;
        Ok(Self::from_data(id, data, time_elapsed))
    }

    /// A block set with default settings and no rules.
    pub fn create_default(id: BlockSetId) -> Self {
        Self::from_data(id, BlockSetData::default(), 0)
    }

    /// Wrap already validated data.
    pub fn from_data(id: BlockSetId, data: BlockSetData, time_elapsed: u64) -> Self {
        Self {
            id,
            blacklist: CompiledList::compile(&data.blacklist),
            whitelist: CompiledList::compile(&data.whitelist),
            data,
            time_elapsed,
            events: BlockSetEvents::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> BlockSetId {
        self.id
    }

    #[inline]
    pub fn data(&self) -> &BlockSetData {
        &self.data
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.data.name
    }

    #[inline]
    pub fn time_elapsed(&self) -> u64 {
        self.time_elapsed
    }

    pub fn list(&self, list: ListType) -> &BlockList {
        self.data.list(list)
    }

    pub fn events(&self) -> &BlockSetEvents {
        &self.events
    }

    fn compiled(&self, list: ListType) -> &CompiledList {
        match list {
            ListType::Blacklist => &self.blacklist,
            ListType::Whitelist => &self.whitelist,
        }
    }

    // -------------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------------

    /// Test a request against the whitelist, then the blacklist.
    ///
    /// A whitelist match always wins. URL rules see the URL without scheme.
    pub fn test(&self, url: &str, channel_id: Option<&str>, category_id: Option<&str>) -> TestResult {
        let url = strip_scheme(url);
        if self.list_matches(ListType::Whitelist, url, channel_id, category_id) {
            TestResult::Whitelisted
        } else if self.list_matches(ListType::Blacklist, url, channel_id, category_id) {
            TestResult::Blacklisted
        } else {
            TestResult::Ignored
        }
    }

    fn list_matches(
        &self,
        list: ListType,
        url: &str,
        channel_id: Option<&str>,
        category_id: Option<&str>,
    ) -> bool {
        let rules = self.data.list(list);
        self.compiled(list).is_match(url)
            || channel_id.is_some_and(|id| rules.yt_channels.iter().any(|ch| ch.id == id))
            || category_id.is_some_and(|id| rules.yt_category_ids.iter().any(|cat| cat == id))
    }

    // -------------------------------------------------------------------------
    // Schedule
    // -------------------------------------------------------------------------

    /// Whether the block set is active on `day` (0 = Monday).
    pub fn is_in_active_weekday(&self, day: usize) -> bool {
        self.data.active_days.get(day).copied().unwrap_or(false)
    }

    /// Whether `time` (ms since midnight) is inside the active window.
    pub fn is_in_active_time(&self, time: u64) -> bool {
        self.data.active_time.contains(time)
    }

    // -------------------------------------------------------------------------
    // Time Budget
    // -------------------------------------------------------------------------

    pub fn time_state(&self) -> TimeState {
        let allowed = self.data.time_allowed;
        if self.time_elapsed < allowed {
            TimeState::TIME_LEFT
        } else if !self.data.annoy_mode {
            TimeState::BLOCK
        } else if self.time_elapsed == allowed {
            // Exact boundary in annoy mode is still reported as time left
            TimeState::TIME_LEFT
        } else {
            TimeState::OVER_TIME
        }
    }

    /// Whether the current state is any of `states`.
    pub fn is_in_state(&self, states: TimeState) -> bool {
        states.intersects(self.time_state())
    }

    /// Unix ms of the most recent scheduled reset at or before `now`.
    pub fn last_scheduled_reset<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> i64 {
        let local = now.naive_local();
        let midnight = local - Duration::milliseconds(ms_since_midnight(now) as i64);
        let mut reset_at = midnight + Duration::milliseconds(self.data.reset_time as i64);
        if local < reset_at {
            reset_at -= Duration::days(1);
        }

        let tz = now.timezone();
        match tz.from_local_datetime(&reset_at) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
            // Reset time falls into a DST gap
            LocalResult::None => tz.from_utc_datetime(&reset_at).timestamp_millis(),
        }
    }

    /// Whether a scheduled reset passed since the last one.
    pub fn is_reset_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        (self.data.last_reset as i64) < self.last_scheduled_reset(now)
    }

    /// Zero the elapsed time if a scheduled reset passed since the last one.
    pub fn reset_if_due<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> bool {
        if !self.is_reset_due(now) {
            return false;
        }
        self.set_time_elapsed(0);
        self.set_last_reset(now.timestamp_millis().max(0) as u64);
        true
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    fn notify_any(&self) {
        self.events.any.publish(self);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.data.name = name.into();
        self.events.name.publish(&Change { new_value: self.data.name.clone() });
        self.notify_any();
    }

    pub fn set_require_active(&mut self, require_active: bool) {
        self.data.require_active = require_active;
        self.events.require_active.publish(&Change { new_value: require_active });
        self.notify_any();
    }

    pub fn set_annoy_mode(&mut self, annoy_mode: bool) {
        self.data.annoy_mode = annoy_mode;
        self.events.annoy_mode.publish(&Change { new_value: annoy_mode });
        self.notify_any();
    }

    pub fn set_time_allowed(&mut self, time_allowed: u64) {
        self.data.time_allowed = time_allowed;
        self.events.time_allowed.publish(&Change { new_value: time_allowed });
        self.notify_any();
    }

    pub fn set_reset_time(&mut self, reset_time: u64) -> Result<(), SetError> {
        if reset_time >= MS_PER_DAY {
            return Err(SetError::OutOfRange { field: "resetTime", value: reset_time });
        }
        self.data.reset_time = reset_time;
        self.events.reset_time.publish(&Change { new_value: reset_time });
        self.notify_any();
        Ok(())
    }

    pub fn set_last_reset(&mut self, last_reset: u64) {
        self.data.last_reset = last_reset;
        self.events.last_reset.publish(&Change { new_value: last_reset });
        self.notify_any();
    }

    pub fn set_active_days(&mut self, active_days: [bool; 7]) {
        self.data.active_days = active_days;
        self.events.active_days.publish(&Change { new_value: active_days });
        self.notify_any();
    }

    pub fn set_active_time(&mut self, active_time: ActiveTime) -> Result<(), SetError> {
        for (field, value) in [("activeTime.from", active_time.from), ("activeTime.to", active_time.to)] {
            if value >= MS_PER_DAY {
                return Err(SetError::OutOfRange { field, value });
            }
        }
        self.data.active_time = active_time;
        self.events.active_time.publish(&Change { new_value: active_time });
        self.notify_any();
        Ok(())
    }

    pub fn set_time_elapsed(&mut self, time_elapsed: u64) {
        self.time_elapsed = time_elapsed;
        self.events.time_elapsed.publish(&Change { new_value: time_elapsed });
        self.notify_any();
    }

    // -------------------------------------------------------------------------
    // Rule Mutations
    // -------------------------------------------------------------------------

    fn notify_list(&self, list: ListType) {
        self.events.list(list).publish(&Change { new_value: self.data.list(list).clone() });
        self.notify_any();
    }

    fn compiled_mut(&mut self, list: ListType) -> &mut CompiledList {
        match list {
            ListType::Blacklist => &mut self.blacklist,
            ListType::Whitelist => &mut self.whitelist,
        }
    }

    pub fn add_pattern(&mut self, list: ListType, pattern: &str) -> Result<(), AddError> {
        if self.data.list(list).url_patterns.iter().any(|p| p == pattern) {
            return Err(AddError::Duplicate);
        }
        let compiled = pattern_to_regexp(pattern).map_err(|e| AddError::InvalidRegExp(e.to_string()))?;

        self.data.list_mut(list).url_patterns.push(pattern.to_string());
        self.compiled_mut(list).patterns.push(Some(compiled));
        self.notify_list(list);
        Ok(())
    }

    pub fn remove_pattern(&mut self, list: ListType, pattern: &str) -> bool {
        let Some(index) = self.data.list(list).url_patterns.iter().position(|p| p == pattern) else {
            return false;
        };
        self.data.list_mut(list).url_patterns.remove(index);
        self.compiled_mut(list).patterns.remove(index);
        self.notify_list(list);
        true
    }

    pub fn add_regexp(&mut self, list: ListType, source: &str) -> Result<(), AddError> {
        if self.data.list(list).url_reg_exps.iter().any(|r| r == source) {
            return Err(AddError::Duplicate);
        }
        let compiled =
            fancy_regex::Regex::new(source).map_err(|e| AddError::InvalidRegExp(e.to_string()))?;

        self.data.list_mut(list).url_reg_exps.push(source.to_string());
        self.compiled_mut(list).regexps.push(Some(compiled));
        self.notify_list(list);
        Ok(())
    }

    pub fn remove_regexp(&mut self, list: ListType, source: &str) -> bool {
        let Some(index) = self.data.list(list).url_reg_exps.iter().position(|r| r == source) else {
            return false;
        };
        self.data.list_mut(list).url_reg_exps.remove(index);
        self.compiled_mut(list).regexps.remove(index);
        self.notify_list(list);
        true
    }

    pub fn add_yt_category(&mut self, list: ListType, category_id: &str) -> Result<(), AddError> {
        if self.data.list(list).yt_category_ids.iter().any(|id| id == category_id) {
            return Err(AddError::Duplicate);
        }
        if !is_known_category(category_id) {
            return Err(AddError::InvalidYTCategoryId(category_id.to_string()));
        }

        self.data.list_mut(list).yt_category_ids.push(category_id.to_string());
        self.notify_list(list);
        Ok(())
    }

    pub fn remove_yt_category(&mut self, list: ListType, category_id: &str) -> bool {
        let ids = &mut self.data.list_mut(list).yt_category_ids;
        let before = ids.len();
        ids.retain(|id| id != category_id);
        if ids.len() == before {
            return false;
        }
        self.notify_list(list);
        true
    }

    /// Add a channel after resolving its title through `fetcher`.
    ///
    /// Nothing changes unless the lookup succeeds.
    pub async fn add_yt_channel(
        &mut self,
        list: ListType,
        channel_id: &str,
        fetcher: &dyn ChannelTitleFetcher,
    ) -> Result<(), AddError> {
        if self.has_yt_channel(list, channel_id) {
            return Err(AddError::Duplicate);
        }
        let title = fetcher.fetch_channel_title(channel_id).await?;

        self.data.list_mut(list).yt_channels.push(YTChannel {
            id: channel_id.to_string(),
            title,
        });
        self.notify_list(list);
        Ok(())
    }

    pub fn remove_yt_channel(&mut self, list: ListType, channel_id: &str) -> bool {
        let channels = &mut self.data.list_mut(list).yt_channels;
        let before = channels.len();
        channels.retain(|ch| ch.id != channel_id);
        if channels.len() == before {
            return false;
        }
        self.notify_list(list);
        true
    }

    fn has_yt_channel(&self, list: ListType, channel_id: &str) -> bool {
        self.data.list(list).yt_channels.iter().any(|ch| ch.id == channel_id)
    }
}

// =============================================================================
// Calendar Helpers
// =============================================================================

/// Day of week of `dt` in its own time zone, 0 = Monday.
pub fn weekday_index<Tz: TimeZone>(dt: &DateTime<Tz>) -> usize {
    dt.weekday().num_days_from_monday() as usize
}

/// Milliseconds since local midnight of `dt`.
pub fn ms_since_midnight<Tz: TimeZone>(dt: &DateTime<Tz>) -> u64 {
    let time = dt.time();
    // Leap seconds report nanoseconds above 1e9
    let millis = (time.nanosecond() / 1_000_000).min(999);
    time.num_seconds_from_midnight() as u64 * 1000 + millis as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    const HOUR: u64 = 60 * 60 * 1000;

    struct FixedTitle(Result<String, FetchError>);

    #[async_trait(?Send)]
    impl ChannelTitleFetcher for FixedTitle {
        async fn fetch_channel_title(&self, _channel_id: &str) -> Result<String, FetchError> {
            self.0.clone()
        }
    }

    fn with_rules() -> BlockSet {
        let raw = json!({
            "schemaVersion": 1,
            "blacklist": {
                "urlPatterns": ["*youtube.com*", "news.example.com"],
                "urlRegExps": ["reddit\\.com/r/[a-z]+"],
                "ytChannels": [{"id": "UCblocked", "title": "Blocked"}],
                "ytCategoryIds": ["20"]
            },
            "whitelist": {
                "urlPatterns": ["*youtube.com/watch?v=allowed*"],
                "ytChannels": [{"id": "UCallowed", "title": "Allowed"}],
                "ytCategoryIds": ["27"]
            }
        });
        BlockSet::create(1, Some(&raw), 0).unwrap()
    }

    #[test]
    fn test_default_ignores_everything() {
        let bs = BlockSet::create_default(0);
        assert_eq!(bs.test("https://example.com/", None, None), TestResult::Ignored);
        assert_eq!(bs.test("https://youtube.com/", Some("UC1"), Some("20")), TestResult::Ignored);
    }

    #[test]
    fn test_blacklist_rules() {
        let bs = with_rules();
        assert_eq!(bs.test("https://www.youtube.com/feed", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("http://news.example.com", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://news.example.com/today", None, None), TestResult::Ignored);
        assert_eq!(bs.test("https://old.reddit.com/r/rust", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://vimeo.com", Some("UCblocked"), None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://vimeo.com", None, Some("20")), TestResult::Blacklisted);
        assert_eq!(bs.test("https://vimeo.com", Some("UCother"), Some("10")), TestResult::Ignored);
    }

    #[test]
    fn test_whitelist_wins() {
        let bs = with_rules();
        assert_eq!(
            bs.test("https://www.youtube.com/watch?v=allowed", None, None),
            TestResult::Whitelisted
        );
        assert_eq!(
            bs.test("https://www.youtube.com/feed", Some("UCallowed"), None),
            TestResult::Whitelisted
        );
        assert_eq!(
            bs.test("https://www.youtube.com/feed", Some("UCblocked"), Some("27")),
            TestResult::Whitelisted
        );
    }

    #[test]
    fn test_whitelist_wins_for_identical_patterns() {
        let mut bs = BlockSet::create_default(0);
        for pattern in ["example.com", "*tracker*", "a*b"] {
            bs.add_pattern(ListType::Blacklist, pattern).unwrap();
            bs.add_pattern(ListType::Whitelist, pattern).unwrap();
        }
        for url in ["https://example.com", "https://x.tracker.net", "https://a-to-b"] {
            assert_eq!(bs.test(url, None, None), TestResult::Whitelisted);
        }
    }

    #[test]
    fn test_active_weekday() {
        let mut bs = BlockSet::create_default(0);
        bs.set_active_days([true, false, true, true, true, true, false]);
        assert!(bs.is_in_active_weekday(0));
        assert!(!bs.is_in_active_weekday(1));
        assert!(!bs.is_in_active_weekday(6));
        assert!(!bs.is_in_active_weekday(7));
        assert!(!bs.is_in_active_weekday(usize::MAX));
    }

    #[test]
    fn test_active_time_wrap() {
        let mut bs = BlockSet::create_default(0);
        bs.set_active_time(ActiveTime::new(23 * HOUR, HOUR)).unwrap();
        assert!(bs.is_in_active_time(23 * HOUR + HOUR / 2));
        assert!(bs.is_in_active_time(HOUR / 2));
        assert!(!bs.is_in_active_time(12 * HOUR));
    }

    #[test]
    fn test_setter_range_checks() {
        let mut bs = BlockSet::create_default(0);
        assert_eq!(
            bs.set_reset_time(MS_PER_DAY),
            Err(SetError::OutOfRange { field: "resetTime", value: MS_PER_DAY })
        );
        assert!(bs.set_active_time(ActiveTime::new(0, MS_PER_DAY + 5)).is_err());
        assert_eq!(bs.data().active_time, ActiveTime::default());
    }

    #[test]
    fn test_time_state_hard_block() {
        let raw = json!({"schemaVersion": 1, "timeAllowed": 0, "annoyMode": false});
        let bs = BlockSet::create(0, Some(&raw), 1).unwrap();
        assert!(bs.is_in_state(TimeState::BLOCK));
        assert!(!bs.is_in_state(TimeState::TIME_LEFT));
        assert!(bs.is_in_state(TimeState::BLOCK | TimeState::OVER_TIME));
    }

    #[test]
    fn test_time_state_annoy_mode() {
        let mut bs = BlockSet::create_default(0);
        bs.set_time_allowed(1000);
        bs.set_annoy_mode(true);

        bs.set_time_elapsed(999);
        assert_eq!(bs.time_state(), TimeState::TIME_LEFT);
        bs.set_time_elapsed(1000);
        assert_eq!(bs.time_state(), TimeState::TIME_LEFT);
        bs.set_time_elapsed(1001);
        assert_eq!(bs.time_state(), TimeState::OVER_TIME);
        assert!(!bs.is_in_state(TimeState::BLOCK));

        bs.set_annoy_mode(false);
        bs.set_time_elapsed(1000);
        assert_eq!(bs.time_state(), TimeState::BLOCK);
    }

    #[test]
    fn test_duplicates_do_not_mutate() {
        let mut bs = with_rules();
        let before = bs.data().clone();

        assert_eq!(bs.add_pattern(ListType::Blacklist, "*youtube.com*"), Err(AddError::Duplicate));
        assert_eq!(
            bs.add_regexp(ListType::Blacklist, "reddit\\.com/r/[a-z]+"),
            Err(AddError::Duplicate)
        );
        assert_eq!(bs.add_yt_category(ListType::Blacklist, "20"), Err(AddError::Duplicate));
        assert_eq!(bs.data(), &before);
    }

    #[tokio::test]
    async fn test_duplicate_channel_skips_lookup() {
        let mut bs = with_rules();
        let fetcher = FixedTitle(Err(FetchError::Network("should not be called".into())));
        let result = bs.add_yt_channel(ListType::Blacklist, "UCblocked", &fetcher).await;
        assert_eq!(result, Err(AddError::Duplicate));
    }

    #[tokio::test]
    async fn test_add_channel() {
        let mut bs = BlockSet::create_default(0);
        let fetcher = FixedTitle(Ok("Speedruns".into()));
        bs.add_yt_channel(ListType::Blacklist, "UCspeed", &fetcher).await.unwrap();
        assert_eq!(
            bs.list(ListType::Blacklist).yt_channels,
            vec![YTChannel { id: "UCspeed".into(), title: "Speedruns".into() }]
        );
        assert_eq!(bs.test("https://youtube.com", Some("UCspeed"), None), TestResult::Blacklisted);
    }

    #[tokio::test]
    async fn test_add_channel_lookup_failure() {
        let mut bs = BlockSet::create_default(0);
        let fetcher = FixedTitle(Err(FetchError::BadStatus(403)));
        let result = bs.add_yt_channel(ListType::Whitelist, "UCx", &fetcher).await;
        assert_eq!(result, Err(AddError::Fetch(FetchError::BadStatus(403))));
        assert!(bs.list(ListType::Whitelist).yt_channels.is_empty());
    }

    #[test]
    fn test_invalid_additions() {
        let mut bs = BlockSet::create_default(0);
        assert!(matches!(
            bs.add_regexp(ListType::Blacklist, "(unclosed"),
            Err(AddError::InvalidRegExp(_))
        ));
        assert_eq!(
            bs.add_yt_category(ListType::Blacklist, "999"),
            Err(AddError::InvalidYTCategoryId("999".into()))
        );
        assert!(bs.list(ListType::Blacklist).is_empty());
    }

    #[test]
    fn test_remove_keeps_cache_in_sync() {
        let mut bs = BlockSet::create_default(0);
        bs.add_pattern(ListType::Blacklist, "a.com").unwrap();
        bs.add_pattern(ListType::Blacklist, "b.com").unwrap();
        bs.add_regexp(ListType::Blacklist, "c\\.com").unwrap();

        assert!(bs.remove_pattern(ListType::Blacklist, "a.com"));
        assert!(!bs.remove_pattern(ListType::Blacklist, "a.com"));
        assert_eq!(bs.test("https://a.com", None, None), TestResult::Ignored);
        assert_eq!(bs.test("https://b.com", None, None), TestResult::Blacklisted);

        assert!(bs.remove_regexp(ListType::Blacklist, "c\\.com"));
        assert_eq!(bs.test("https://c.com", None, None), TestResult::Ignored);

        bs.add_yt_category(ListType::Blacklist, "10").unwrap();
        assert!(bs.remove_yt_category(ListType::Blacklist, "10"));
        assert!(!bs.remove_yt_channel(ListType::Blacklist, "UCnone"));
    }

    #[test]
    fn test_invalid_stored_regexp_never_matches() {
        let raw = json!({"schemaVersion": 1, "blacklist": {"urlRegExps": ["(unclosed", "ok"]}});
        let bs = BlockSet::create(0, Some(&raw), 0).unwrap();
        assert_eq!(bs.list(ListType::Blacklist).url_reg_exps.len(), 2);
        assert_eq!(bs.test("https://ok.com", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://unclosed.net", None, None), TestResult::Ignored);
    }

    #[test]
    fn test_stored_lookaround_regexp() {
        let raw = json!({
            "schemaVersion": 1,
            "blacklist": {"urlRegExps": ["^(?!docs\\.).*example\\.com"]},
            "whitelist": {"urlRegExps": ["(?<=/r/)rust\\b"]},
        });
        let bs = BlockSet::create(0, Some(&raw), 0).unwrap();
        assert_eq!(bs.test("https://www.example.com/", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://docs.example.com/", None, None), TestResult::Ignored);
        assert_eq!(bs.test("https://example.com/r/rust", None, None), TestResult::Whitelisted);
    }

    #[test]
    fn test_add_backreference_regexp() {
        let mut bs = BlockSet::create_default(0);
        bs.add_regexp(ListType::Blacklist, "^(\\w)\\1").unwrap();
        assert_eq!(bs.test("https://aabb.com", None, None), TestResult::Blacklisted);
        assert_eq!(bs.test("https://abab.com", None, None), TestResult::Ignored);
    }

    #[test]
    fn test_change_notifications() {
        let mut bs = BlockSet::create_default(3);
        let names = Rc::new(RefCell::new(Vec::new()));
        let any = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&names);
        bs.events().name.subscribe(move |change| seen.borrow_mut().push(change.new_value.clone()));
        let seen = Rc::clone(&any);
        let handle = bs.events().any.subscribe(move |set: &BlockSet| {
            seen.borrow_mut().push((set.id(), set.name().to_string()))
        });

        bs.set_name("Work");
        bs.add_pattern(ListType::Blacklist, "x.com").unwrap();
        handle.unsubscribe();
        bs.set_name("Play");

        assert_eq!(*names.borrow(), vec!["Work".to_string(), "Play".to_string()]);
        assert_eq!(
            *any.borrow(),
            vec![(3, "Work".to_string()), (3, "Work".to_string())]
        );
    }

    #[test]
    fn test_list_channel_receives_new_list() {
        let mut bs = BlockSet::create_default(0);
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&sizes);
        bs.events()
            .whitelist
            .subscribe(move |change| seen.borrow_mut().push(change.new_value.url_patterns.len()));

        bs.add_pattern(ListType::Whitelist, "a").unwrap();
        bs.add_pattern(ListType::Whitelist, "b").unwrap();
        bs.add_pattern(ListType::Blacklist, "c").unwrap();
        bs.remove_pattern(ListType::Whitelist, "a");

        assert_eq!(*sizes.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn test_daily_reset() {
        let mut bs = BlockSet::create_default(0);
        bs.set_reset_time(6 * HOUR).unwrap();
        bs.set_time_elapsed(5000);

        // 2024-03-04 is a Monday
        let before_reset = Utc.with_ymd_and_hms(2024, 3, 4, 5, 0, 0).unwrap();
        let after_reset = Utc.with_ymd_and_hms(2024, 3, 4, 7, 0, 0).unwrap();
        let expected_prev = Utc.with_ymd_and_hms(2024, 3, 3, 6, 0, 0).unwrap();

        assert_eq!(bs.last_scheduled_reset(&before_reset), expected_prev.timestamp_millis());

        bs.set_last_reset(expected_prev.timestamp_millis() as u64);
        assert!(!bs.reset_if_due(&before_reset));
        assert_eq!(bs.time_elapsed(), 5000);

        assert!(bs.reset_if_due(&after_reset));
        assert_eq!(bs.time_elapsed(), 0);
        assert_eq!(bs.data().last_reset, after_reset.timestamp_millis() as u64);
        assert!(!bs.reset_if_due(&after_reset));
    }

    #[test]
    fn test_calendar_helpers() {
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 1, 2, 3).unwrap();
        assert_eq!(weekday_index(&monday), 0);
        assert_eq!(ms_since_midnight(&monday), (3600 + 120 + 3) * 1000);

        let sunday = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(weekday_index(&sunday), 6);
    }
}
