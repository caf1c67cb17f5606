//! Command implementations.

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Local};
use serde_json::Value;
use tb_core::block_set::{ms_since_midnight, weekday_index};
use tb_core::schema::{parse_block_set_data, parse_general_options};
use tb_core::{compress, decompress, BlockSet, BlockSetId, BlockSets, ListType, TestResult, TimeState};

use crate::store::StorageFile;

pub enum Rule {
    Pattern(ListType, String),
    RegExp(ListType, String),
    Category(ListType, String),
}

pub async fn load(file: &StorageFile, prefer_sync: bool) -> Result<BlockSets, String> {
    BlockSets::create(file.gateway(prefer_sync))
        .await
        .map_err(|e| format!("Failed to load block sets: {e}"))
}

fn read_input(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to format JSON: {e}"))?;
    println!("{text}");
    Ok(())
}

fn state_name(state: TimeState) -> &'static str {
    if state == TimeState::BLOCK {
        "blocked"
    } else if state == TimeState::OVER_TIME {
        "over time"
    } else {
        "time left"
    }
}

fn minutes(ms: u64) -> f64 {
    ms as f64 / 60_000.0
}

fn find(block_sets: &mut BlockSets, id: BlockSetId) -> Result<&mut BlockSet, String> {
    block_sets
        .get_mut(id)
        .ok_or_else(|| format!("No block set with id {id}"))
}

// ===== Payloads =====

pub fn cmd_migrate(input: &Path, general_options: bool) -> Result<(), String> {
    let text = read_input(input)?;
    let value = match serde_json::from_str::<Value>(&text) {
        Ok(Value::String(encoded)) => decompress(&encoded).map_err(|e| e.to_string())?,
        Ok(value) => value,
        Err(_) => decompress(&text).map_err(|e| format!("Input is neither JSON nor a payload: {e}"))?,
    };

    let migrated = if general_options {
        parse_general_options(Some(&value)).map_err(|e| e.to_string())?.to_value()
    } else {
        parse_block_set_data(Some(&value)).map_err(|e| e.to_string())?.to_value()
    };
    print_json(&migrated)
}

pub fn cmd_compress(input: &Path) -> Result<(), String> {
    let value: Value = serde_json::from_str(&read_input(input)?)
        .map_err(|e| format!("Invalid JSON in '{}': {}", input.display(), e))?;
    println!("{}", compress(&value).map_err(|e| e.to_string())?);
    Ok(())
}

pub fn cmd_decompress(input: &Path) -> Result<(), String> {
    let value = decompress(&read_input(input)?).map_err(|e| e.to_string())?;
    print_json(&value)
}

// ===== Queries =====

pub async fn cmd_inspect(block_sets: &BlockSets) -> Result<(), String> {
    println!("Block sets: {}", block_sets.len());
    for bs in block_sets.iter() {
        let data = bs.data();
        println!("  [{}] {}", bs.id(), bs.name());
        println!(
            "      Time:     {:.1} / {:.1} min ({})",
            minutes(bs.time_elapsed()),
            minutes(data.time_allowed),
            state_name(bs.time_state())
        );
        for list in ListType::ALL {
            let rules = bs.list(list);
            println!(
                "      {:<9} {} patterns, {} regexps, {} channels, {} categories",
                format!("{}:", list.as_str()),
                rules.url_patterns.len(),
                rules.url_reg_exps.len(),
                rules.yt_channels.len(),
                rules.yt_category_ids.len()
            );
        }
    }

    let options = block_sets
        .storage()
        .load_general_options()
        .await
        .map_err(|e| e.to_string())?;
    println!();
    println!("General options:");
    println!("  Theme:       {}", options.theme.as_str());
    println!("  Typing test: {} words", options.typing_test_word_count);
    Ok(())
}

pub fn cmd_check(
    block_sets: &BlockSets,
    url: &str,
    channel: Option<&str>,
    category: Option<&str>,
    at: Option<&str>,
) -> Result<(), String> {
    let now: DateTime<FixedOffset> = match at {
        Some(at) => DateTime::parse_from_rfc3339(at).map_err(|e| format!("Invalid --at '{at}': {e}"))?,
        None => Local::now().into(),
    };
    let day = weekday_index(&now);
    let time = ms_since_midnight(&now);

    for bs in block_sets.iter() {
        let result = match bs.test(url, channel, category) {
            TestResult::Ignored => "ignored",
            TestResult::Blacklisted => "blacklisted",
            TestResult::Whitelisted => "whitelisted",
        };
        let active = bs.is_in_active_weekday(day) && bs.is_in_active_time(time);
        println!(
            "  [{}] {}: {} ({})",
            bs.id(),
            bs.name(),
            result,
            if active { "active" } else { "inactive" }
        );
    }
    println!("Blocked by: {:?}", block_sets.blocked_by_at(&now, url, channel, category));
    Ok(())
}

// ===== Edits =====

pub async fn cmd_add_default(block_sets: &mut BlockSets) -> Result<(), String> {
    let id = block_sets.add_default_block_set().await.map_err(|e| e.to_string())?;
    println!("Added block set {id}");
    Ok(())
}

pub async fn cmd_copy(block_sets: &mut BlockSets, id: BlockSetId) -> Result<(), String> {
    let copy = block_sets.add_block_set_copy(id).await.map_err(|e| e.to_string())?;
    println!("Copied block set {id} into {copy}");
    Ok(())
}

pub async fn cmd_delete(block_sets: &mut BlockSets, id: BlockSetId) -> Result<(), String> {
    block_sets.delete_block_set(id).await.map_err(|e| e.to_string())?;
    println!("Deleted block set {id}");
    Ok(())
}

pub async fn cmd_move(block_sets: &mut BlockSets, id: BlockSetId, index: usize) -> Result<(), String> {
    block_sets.move_block_set(id, index).await.map_err(|e| e.to_string())?;
    println!("Order: {:?}", block_sets.ids());
    Ok(())
}

pub async fn cmd_reset(block_sets: &mut BlockSets) -> Result<(), String> {
    let reset = block_sets
        .reset_due_block_sets(&Local::now())
        .await
        .map_err(|e| e.to_string())?;
    println!("Reset block sets: {reset:?}");
    Ok(())
}

pub async fn cmd_add_rule(block_sets: &mut BlockSets, id: BlockSetId, rule: Rule) -> Result<(), String> {
    let bs = find(block_sets, id)?;
    let added = match &rule {
        Rule::Pattern(list, pattern) => bs.add_pattern(*list, pattern),
        Rule::RegExp(list, source) => bs.add_regexp(*list, source),
        Rule::Category(list, category) => bs.add_yt_category(*list, category),
    };
    added.map_err(|e| e.to_string())?;

    block_sets.save_block_set(id).await.map_err(|e| e.to_string())?;
    tracing::info!("Updated block set {id}");
    Ok(())
}

#[cfg(feature = "youtube-api")]
pub async fn cmd_add_channel(
    block_sets: &mut BlockSets,
    id: BlockSetId,
    list: ListType,
    channel: &str,
    api_key: Option<String>,
) -> Result<(), String> {
    use tb_core::youtube::YouTubeDataApi;

    let api_key = api_key
        .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
        .ok_or("No API key: pass --api-key or set YOUTUBE_API_KEY")?;
    let fetcher = YouTubeDataApi::new(api_key);

    let bs = find(block_sets, id)?;
    bs.add_yt_channel(list, channel, &fetcher)
        .await
        .map_err(|e| e.to_string())?;

    block_sets.save_block_set(id).await.map_err(|e| e.to_string())?;
    tracing::info!("Added channel {channel} to block set {id}");
    Ok(())
}
