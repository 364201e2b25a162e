//! Definition builders shared by unit tests

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tableau_types::{AssetRef, PackDefinition, PackItem, ReturnMode, TriggerDefinition};

/// Fixed session start plus `ms` milliseconds
pub fn at(ms: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid base time")
        + TimeDelta::milliseconds(ms)
}

pub fn asset(name: &str) -> AssetRef {
    AssetRef::parse(name).expect("valid asset name")
}

pub fn trigger(id: &str, keywords: &[&str], priority: i32) -> TriggerDefinition {
    TriggerDefinition {
        id: id.to_string(),
        title: id.to_string(),
        active: true,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        require_pipes: false,
        case_sensitive: false,
        cooldown_ms: 0,
        priority,
        target_asset: asset(&format!("{id}.png")),
        return_after_ms: 0,
        return_mode: ReturnMode::ToDefaultCollection,
        return_asset: None,
    }
}

pub fn piped(mut def: TriggerDefinition) -> TriggerDefinition {
    def.require_pipes = true;
    def
}

pub fn pack(id: &str, activation: &[&str], items: Vec<PackItem>) -> PackDefinition {
    PackDefinition {
        id: id.to_string(),
        title: id.to_string(),
        active: true,
        activation_keywords: activation.iter().map(|k| k.to_string()).collect(),
        require_pipes: false,
        case_sensitive: false,
        cooldown_ms: 0,
        priority: 0,
        return_after_ms: 0,
        return_mode: ReturnMode::ToDefaultCollection,
        return_asset: None,
        items,
    }
}

pub fn item(id: &str, keys: &[&str], target: &str) -> PackItem {
    PackItem {
        id: id.to_string(),
        enabled: true,
        library: Vec::new(),
        keys: keys.iter().map(|k| k.to_string()).collect(),
        target_asset: asset(target),
        return_after_ms: None,
        return_asset: None,
        cooldown_ms: None,
    }
}
