//! Block set data, current shape and legacy shapes.

use serde::Serialize;
use serde_json::Value;

use super::reader::{child_path, index_path, Object, Reader};
use super::{detect_version, require_present, ParseError};
use crate::pattern::escape_wildcards;
use crate::types::{ActiveTime, ListType, MS_PER_DAY};

/// Current block set schema version.
pub const BLOCK_SET_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_NAME: &str = "Block Set";
/// 30 minutes.
pub const DEFAULT_TIME_ALLOWED: u64 = 30 * 60 * 1000;

// =============================================================================
// Current Shape (version 1)
// =============================================================================

/// A YouTube channel rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct YTChannel {
    pub id: String,
    pub title: String,
}

/// Rules of one list type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockList {
    /// Wildcard patterns, see [`crate::pattern`]
    pub url_patterns: Vec<String>,
    /// Regular expression sources
    pub url_reg_exps: Vec<String>,
    pub yt_channels: Vec<YTChannel>,
    pub yt_category_ids: Vec<String>,
}

impl BlockList {
    pub fn is_empty(&self) -> bool {
        self.url_patterns.is_empty()
            && self.url_reg_exps.is_empty()
            && self.yt_channels.is_empty()
            && self.yt_category_ids.is_empty()
    }

    /// Total number of rules across the four kinds.
    pub fn len(&self) -> usize {
        self.url_patterns.len()
            + self.url_reg_exps.len()
            + self.yt_channels.len()
            + self.yt_category_ids.len()
    }
}

/// Persisted configuration of one block set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSetData {
    pub schema_version: u32,
    pub name: String,
    pub require_active: bool,
    pub annoy_mode: bool,
    /// Milliseconds of browsing allowed per reset period
    pub time_allowed: u64,
    /// Milliseconds since midnight of the daily reset
    pub reset_time: u64,
    /// Unix timestamp in milliseconds of the last reset
    pub last_reset: u64,
    /// Monday first
    pub active_days: [bool; 7],
    pub active_time: ActiveTime,
    pub blacklist: BlockList,
    pub whitelist: BlockList,
}

impl Default for BlockSetData {
    fn default() -> Self {
        Self {
            schema_version: BLOCK_SET_SCHEMA_VERSION,
            name: DEFAULT_NAME.to_string(),
            require_active: false,
            annoy_mode: false,
            time_allowed: DEFAULT_TIME_ALLOWED,
            reset_time: 0,
            last_reset: 0,
            active_days: [true; 7],
            active_time: ActiveTime::default(),
            blacklist: BlockList::default(),
            whitelist: BlockList::default(),
        }
    }
}

impl BlockSetData {
    pub fn list(&self, list: ListType) -> &BlockList {
        match list {
            ListType::Blacklist => &self.blacklist,
            ListType::Whitelist => &self.whitelist,
        }
    }

    pub fn list_mut(&mut self, list: ListType) -> &mut BlockList {
        match list {
            ListType::Blacklist => &mut self.blacklist,
            ListType::Whitelist => &mut self.whitelist,
        }
    }

    /// JSON form as persisted.
    pub fn to_value(&self) -> Value {
        // Plain data with string keys always serializes
        serde_json::to_value(self).unwrap_or_default()
    }
}

// =============================================================================
// Legacy Shape (version 0)
// =============================================================================

/// Version 0 rules: one flat, type-tagged list per list type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleV0 {
    UrlEquals(String),
    UrlContains(String),
    UrlPrefix(String),
    UrlSuffix(String),
    UrlRegexp(String),
    YtChannel(YTChannel),
    YtCategory(String),
}

/// Fields shared unchanged by every version.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    name: String,
    require_active: bool,
    annoy_mode: bool,
    time_allowed: u64,
    reset_time: u64,
    last_reset: u64,
    active_days: [bool; 7],
    active_time: ActiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockSetDataV0 {
    settings: Settings,
    blacklist: Vec<RuleV0>,
    whitelist: Vec<RuleV0>,
}

// =============================================================================
// Migration Chain
// =============================================================================

/// Block set data tagged with the version it is currently in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Versioned {
    V0(BlockSetDataV0),
    V1(BlockSetData),
}

impl Versioned {
    fn read(version: u32, value: &Value) -> Result<Self, ParseError> {
        let mut reader = Reader::new();
        let Some(obj) = reader.root(value) else {
            return Err(reader.into_error());
        };
        let settings = read_settings(&mut reader, obj);

        match version {
            0 => {
                let blacklist = read_rules_v0(&mut reader, obj, ListType::Blacklist);
                let whitelist = read_rules_v0(&mut reader, obj, ListType::Whitelist);
                reader.finish(Self::V0(BlockSetDataV0 {
                    settings,
                    blacklist,
                    whitelist,
                }))
            }
            BLOCK_SET_SCHEMA_VERSION => {
                let blacklist = read_list(&mut reader, obj, ListType::Blacklist);
                let whitelist = read_list(&mut reader, obj, ListType::Whitelist);
                reader.finish(Self::V1(with_settings(settings, blacklist, whitelist)))
            }
            _ => Err(ParseError::CantIdentifyVersion),
        }
    }

    /// Advance by exactly one version.
    fn upgrade(self) -> Self {
        match self {
            Self::V0(old) => Self::V1(with_settings(
                old.settings,
                migrate_rules_v0(old.blacklist),
                migrate_rules_v0(old.whitelist),
            )),
            current @ Self::V1(_) => current,
        }
    }

    fn into_current(mut self) -> BlockSetData {
        loop {
            match self {
                Self::V1(data) => return data,
                older => self = older.upgrade(),
            }
        }
    }
}

fn with_settings(settings: Settings, blacklist: BlockList, whitelist: BlockList) -> BlockSetData {
    BlockSetData {
        schema_version: BLOCK_SET_SCHEMA_VERSION,
        name: settings.name,
        require_active: settings.require_active,
        annoy_mode: settings.annoy_mode,
        time_allowed: settings.time_allowed,
        reset_time: settings.reset_time,
        last_reset: settings.last_reset,
        active_days: settings.active_days,
        active_time: settings.active_time,
        blacklist,
        whitelist,
    }
}

fn migrate_rules_v0(rules: Vec<RuleV0>) -> BlockList {
    let mut list = BlockList::default();
    for rule in rules {
        match rule {
            RuleV0::UrlEquals(v) => list.url_patterns.push(escape_wildcards(&v)),
            RuleV0::UrlContains(v) => list.url_patterns.push(format!("*{}*", escape_wildcards(&v))),
            RuleV0::UrlPrefix(v) => list.url_patterns.push(format!("{}*", escape_wildcards(&v))),
            RuleV0::UrlSuffix(v) => list.url_patterns.push(format!("*{}", escape_wildcards(&v))),
            RuleV0::UrlRegexp(v) => list.url_reg_exps.push(v),
            RuleV0::YtChannel(channel) => list.yt_channels.push(channel),
            RuleV0::YtCategory(id) => list.yt_category_ids.push(id),
        }
    }
    list
}

// =============================================================================
// Readers
// =============================================================================

fn read_settings(reader: &mut Reader, obj: &Object) -> Settings {
    let defaults = BlockSetData::default();

    let active_time = match reader.object(obj, "", "activeTime") {
        Some(window) => ActiveTime::new(
            reader.ms_below(window, "activeTime", "from", 0, MS_PER_DAY),
            reader.ms_below(window, "activeTime", "to", 0, MS_PER_DAY),
        ),
        None => defaults.active_time,
    };

    Settings {
        name: reader.string(obj, "", "name", &defaults.name),
        require_active: reader.bool(obj, "", "requireActive", defaults.require_active),
        annoy_mode: reader.bool(obj, "", "annoyMode", defaults.annoy_mode),
        time_allowed: reader.ms(obj, "", "timeAllowed", defaults.time_allowed),
        reset_time: reader.ms_below(obj, "", "resetTime", defaults.reset_time, MS_PER_DAY),
        last_reset: reader.ms(obj, "", "lastReset", defaults.last_reset),
        active_days: reader.bool_array(obj, "", "activeDays", defaults.active_days),
        active_time,
    }
}

fn read_list(reader: &mut Reader, obj: &Object, list: ListType) -> BlockList {
    let key = list.as_str();
    let Some(inner) = reader.object(obj, "", key) else {
        return BlockList::default();
    };

    let mut yt_channels = Vec::new();
    if let Some(items) = reader.array(inner, key, "ytChannels") {
        let channels_path = child_path(key, "ytChannels");
        for (i, item) in items.iter().enumerate() {
            match read_channel(item) {
                Some(channel) => yt_channels.push(channel),
                None => reader.issue(index_path(&channels_path, i), "{id, title} channel"),
            }
        }
    }

    BlockList {
        url_patterns: reader.string_list(inner, key, "urlPatterns"),
        url_reg_exps: reader.string_list(inner, key, "urlRegExps"),
        yt_channels,
        yt_category_ids: reader.string_list(inner, key, "ytCategoryIds"),
    }
}

fn read_channel(value: &Value) -> Option<YTChannel> {
    let id = value.get("id")?.as_str()?;
    let title = match value.get("title") {
        None | Some(Value::Null) => "",
        Some(title) => title.as_str()?,
    };
    Some(YTChannel {
        id: id.to_string(),
        title: title.to_string(),
    })
}

fn read_rules_v0(reader: &mut Reader, obj: &Object, list: ListType) -> Vec<RuleV0> {
    let key = list.as_str();
    let Some(items) = reader.array(obj, "", key) else {
        return Vec::new();
    };

    let mut rules = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = index_path(key, i);
        let Some(kind) = item.get("type").and_then(Value::as_str) else {
            reader.issue(child_path(&path, "type"), "rule type string");
            continue;
        };
        let value = item.get("value").unwrap_or(&Value::Null);
        let text = value.as_str().map(str::to_string);

        let rule = match kind {
            "urlEquals" => text.map(RuleV0::UrlEquals),
            "urlContains" => text.map(RuleV0::UrlContains),
            "urlPrefix" => text.map(RuleV0::UrlPrefix),
            "urlSuffix" => text.map(RuleV0::UrlSuffix),
            "urlRegexp" => text.map(RuleV0::UrlRegexp),
            "ytChannel" => read_channel(value).map(RuleV0::YtChannel),
            "ytCategory" => value
                .get("id")
                .and_then(Value::as_str)
                .map(|id| RuleV0::YtCategory(id.to_string())),
            _ => {
                reader.issue(child_path(&path, "type"), "known rule type");
                continue;
            }
        };

        match rule {
            Some(rule) => rules.push(rule),
            None => reader.issue(child_path(&path, "value"), "value matching the rule type"),
        }
    }
    rules
}

// =============================================================================
// Entry Point
// =============================================================================

/// Parse untrusted stored data into current-version block set data.
pub fn parse_block_set_data(raw: Option<&Value>) -> Result<BlockSetData, ParseError> {
    let value = require_present(raw)?;
    let version = detect_version(value, BLOCK_SET_SCHEMA_VERSION)?;
    Ok(Versioned::read(version, value)?.into_current())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_undefined() {
        assert_eq!(parse_block_set_data(None), Err(ParseError::NullOrUndefined));
        assert_eq!(
            parse_block_set_data(Some(&Value::Null)),
            Err(ParseError::NullOrUndefined)
        );
    }

    #[test]
    fn test_unknown_version() {
        let raw = json!({"schemaVersion": 7, "name": "Future"});
        assert_eq!(
            parse_block_set_data(Some(&raw)),
            Err(ParseError::CantIdentifyVersion)
        );
    }

    #[test]
    fn test_empty_object_gets_defaults() {
        let data = parse_block_set_data(Some(&json!({}))).unwrap();
        assert_eq!(data, BlockSetData::default());
        assert_eq!(data.time_allowed, 1_800_000);
        assert_eq!(data.active_days, [true; 7]);
        assert_eq!(data.active_time, ActiveTime::new(0, 0));
    }

    #[test]
    fn test_v0_migration() {
        let raw = json!({
            "name": "Legacy",
            "timeAllowed": 600000,
            "blacklist": [
                {"type": "urlEquals", "value": "example.com"},
                {"type": "urlContains", "value": "reddit"},
                {"type": "urlPrefix", "value": "news.ycombinator.com"},
                {"type": "urlSuffix", "value": ".pdf"},
                {"type": "urlRegexp", "value": "^.*\\.(gif|png)$"},
                {"type": "ytChannel", "value": {"id": "UC123", "title": "Some Channel"}},
                {"type": "ytCategory", "value": {"id": "20", "name": "Gaming"}}
            ],
            "whitelist": [
                {"type": "urlContains", "value": "a*b"}
            ]
        });

        let data = parse_block_set_data(Some(&raw)).unwrap();
        assert_eq!(data.schema_version, 1);
        assert_eq!(data.name, "Legacy");
        assert_eq!(data.time_allowed, 600_000);
        assert_eq!(
            data.blacklist.url_patterns,
            vec!["example.com", "*reddit*", "news.ycombinator.com*", "*.pdf"]
        );
        assert_eq!(data.blacklist.url_reg_exps, vec!["^.*\\.(gif|png)$"]);
        assert_eq!(
            data.blacklist.yt_channels,
            vec![YTChannel { id: "UC123".into(), title: "Some Channel".into() }]
        );
        assert_eq!(data.blacklist.yt_category_ids, vec!["20"]);
        assert_eq!(data.whitelist.url_patterns, vec!["*a\\*b*"]);
    }

    #[test]
    fn test_v0_backslash_is_not_escaped() {
        let raw = json!({"blacklist": [{"type": "urlEquals", "value": "a\\*"}]});
        let data = parse_block_set_data(Some(&raw)).unwrap();
        // Backslash kept, star escaped: reads back as backslash then wildcard
        assert_eq!(data.blacklist.url_patterns, vec!["a\\\\*"]);
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let raw = json!({
            "name": "Twice",
            "blacklist": [{"type": "urlPrefix", "value": "x.com/*"}],
            "activeTime": {"from": 3600000, "to": 7200000}
        });
        let once = parse_block_set_data(Some(&raw)).unwrap();
        let twice = parse_block_set_data(Some(&once.to_value())).unwrap();
        let thrice = parse_block_set_data(Some(&twice.to_value())).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice, thrice);
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let raw = json!({"schemaVersion": 1, "name": "A", "favoriteColor": "green"});
        let data = parse_block_set_data(Some(&raw)).unwrap();
        assert!(data.to_value().get("favoriteColor").is_none());
    }

    #[test]
    fn test_invalid_fields_enumerated() {
        let raw = json!({
            "schemaVersion": 1,
            "name": 5,
            "annoyMode": "yes",
            "activeDays": [true, true],
            "resetTime": 90000000,
            "blacklist": {"urlPatterns": ["ok", false], "ytChannels": [{"title": "no id"}]}
        });
        let Err(ParseError::Invalid(issues)) = parse_block_set_data(Some(&raw)) else {
            panic!("expected validation failure");
        };
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "name",
                "annoyMode",
                "resetTime",
                "activeDays",
                "blacklist.ytChannels[0]",
                "blacklist.urlPatterns[1]",
            ]
        );
    }

    #[test]
    fn test_invalid_v0_rule() {
        let raw = json!({"blacklist": [{"type": "urlMagic", "value": "x"}, {"type": "urlEquals", "value": 3}]});
        let Err(ParseError::Invalid(issues)) = parse_block_set_data(Some(&raw)) else {
            panic!("expected validation failure");
        };
        assert_eq!(issues[0].path, "blacklist[0].type");
        assert_eq!(issues[1].path, "blacklist[1].value");
    }

    #[test]
    fn test_non_object_root() {
        let Err(ParseError::Invalid(issues)) = parse_block_set_data(Some(&json!("text"))) else {
            panic!("expected validation failure");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "");
    }

    #[test]
    fn test_serialized_shape() {
        let value = BlockSetData::default().to_value();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["timeAllowed"], 1_800_000);
        assert_eq!(value["activeTime"], json!({"from": 0, "to": 0}));
        assert_eq!(
            value["whitelist"],
            json!({"urlPatterns": [], "urlRegExps": [], "ytChannels": [], "ytCategoryIds": []})
        );
    }
}
