//! General (non block set) options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reader::{Object, Reader};
use super::{detect_version, require_present, ParseError};

/// Current general options schema version.
pub const GENERAL_OPTIONS_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_TYPING_TEST_WORD_COUNT: u64 = 30;

/// Color theme of the extension pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Dark,
    Light,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

/// Persisted general options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralOptionsData {
    pub schema_version: u32,
    pub theme: Theme,
    /// Words in the typing challenge shown before a locked edit
    pub typing_test_word_count: u64,
}

impl Default for GeneralOptionsData {
    fn default() -> Self {
        Self {
            schema_version: GENERAL_OPTIONS_SCHEMA_VERSION,
            theme: Theme::default(),
            typing_test_word_count: DEFAULT_TYPING_TEST_WORD_COUNT,
        }
    }
}

impl GeneralOptionsData {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GeneralOptionsV0 {
    dark_theme: bool,
    typing_test_word_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Versioned {
    V0(GeneralOptionsV0),
    V1(GeneralOptionsData),
}

impl Versioned {
    fn read(version: u32, value: &Value) -> Result<Self, ParseError> {
        let mut reader = Reader::new();
        let Some(obj) = reader.root(value) else {
            return Err(reader.into_error());
        };
        let typing_test_word_count = read_word_count(&mut reader, obj);

        match version {
            0 => {
                let dark_theme = reader.bool(obj, "", "darkTheme", false);
                reader.finish(Self::V0(GeneralOptionsV0 {
                    dark_theme,
                    typing_test_word_count,
                }))
            }
            GENERAL_OPTIONS_SCHEMA_VERSION => {
                let theme = reader.string(obj, "", "theme", Theme::default().as_str());
                let theme = Theme::from_str(&theme).unwrap_or_else(|| {
                    reader.issue("theme".to_string(), "\"system\", \"dark\" or \"light\"");
                    Theme::default()
                });
                reader.finish(Self::V1(GeneralOptionsData {
                    schema_version: GENERAL_OPTIONS_SCHEMA_VERSION,
                    theme,
                    typing_test_word_count,
                }))
            }
            _ => Err(ParseError::CantIdentifyVersion),
        }
    }

    fn upgrade(self) -> Self {
        match self {
            Self::V0(old) => Self::V1(GeneralOptionsData {
                schema_version: GENERAL_OPTIONS_SCHEMA_VERSION,
                theme: if old.dark_theme { Theme::Dark } else { Theme::System },
                typing_test_word_count: old.typing_test_word_count,
            }),
            current @ Self::V1(_) => current,
        }
    }

    fn into_current(mut self) -> GeneralOptionsData {
        loop {
            match self {
                Self::V1(data) => return data,
                older => self = older.upgrade(),
            }
        }
    }
}

fn read_word_count(reader: &mut Reader, obj: &Object) -> u64 {
    let count = reader.ms(obj, "", "typingTestWordCount", DEFAULT_TYPING_TEST_WORD_COUNT);
    if count == 0 {
        reader.issue("typingTestWordCount".to_string(), "positive integer");
        return DEFAULT_TYPING_TEST_WORD_COUNT;
    }
    count
}

/// Parse untrusted stored general options into the current version.
pub fn parse_general_options(raw: Option<&Value>) -> Result<GeneralOptionsData, ParseError> {
    let value = require_present(raw)?;
    let version = detect_version(value, GENERAL_OPTIONS_SCHEMA_VERSION)?;
    Ok(Versioned::read(version, value)?.into_current())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dark_flag_migration() {
        let dark = parse_general_options(Some(&json!({"darkTheme": true}))).unwrap();
        assert_eq!(dark.theme, Theme::Dark);

        let light = parse_general_options(Some(&json!({"darkTheme": false}))).unwrap();
        assert_eq!(light.theme, Theme::System);

        let absent = parse_general_options(Some(&json!({}))).unwrap();
        assert_eq!(absent, GeneralOptionsData::default());
    }

    #[test]
    fn test_current_version() {
        let raw = json!({"schemaVersion": 1, "theme": "light", "typingTestWordCount": 50});
        let options = parse_general_options(Some(&raw)).unwrap();
        assert_eq!(options.theme, Theme::Light);
        assert_eq!(options.typing_test_word_count, 50);

        let again = parse_general_options(Some(&options.to_value())).unwrap();
        assert_eq!(again, options);
    }

    #[test]
    fn test_invalid_options() {
        let raw = json!({"schemaVersion": 1, "theme": "neon", "typingTestWordCount": 0});
        let Err(ParseError::Invalid(issues)) = parse_general_options(Some(&raw)) else {
            panic!("expected validation failure");
        };
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["typingTestWordCount", "theme"]);
    }

    #[test]
    fn test_null_options() {
        assert_eq!(parse_general_options(None), Err(ParseError::NullOrUndefined));
    }
}
