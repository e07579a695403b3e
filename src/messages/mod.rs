//! Typed out-of-band messages delivered alongside entity notifications.
//!
//! Only the fields the pipeline reads are typed. Everything else the
//! producer sends is kept in `extra` and written back out unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Recording header; opens a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoHeader {
    pub demo_file_stamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_protocol: Option<i32>,
    pub server_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub map_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_num: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DemoHeader {
    /// Copy with the NUL padding stripped from the file stamp.
    pub fn trimmed(&self) -> Self {
        Self {
            demo_file_stamp: self.demo_file_stamp.trim_matches('\0').to_string(),
            ..self.clone()
        }
    }
}

/// Playback totals, delivered near the end of a recording
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    /// Seconds
    pub playback_time: f32,
    pub playback_ticks: i32,
    pub playback_frames: i32,
}

impl FileInfo {
    /// Ticks per second, rounded half away from zero.
    pub fn tickrate(&self) -> Option<u32> {
        if self.playback_time <= 0.0 || self.playback_ticks <= 0 {
            return None;
        }
        let rate = (self.playback_ticks as f64 / self.playback_time as f64).round();
        u32::try_from(rate as i64).ok()
    }
}

/// In-game chat event (kills, glyphs, runes, ...)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEvent {
    /// Event type name, e.g. "CHAT_MESSAGE_HERO_KILL"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value3: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_1: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_2: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_3: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_4: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_5: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playerid_6: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatEvent {
    /// The six player id fields paired with their role suffix
    pub fn player_ids(&self) -> [(&'static str, Option<i32>); 6] {
        [
            ("1", self.playerid_1),
            ("2", self.playerid_2),
            ("3", self.playerid_3),
            ("4", self.playerid_4),
            ("5", self.playerid_5),
            ("6", self.playerid_6),
        ]
    }
}

/// Combat log entry (damage, heals, deaths, purchases, ...)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatLogEntry {
    /// Entry type name, e.g. "DOTA_COMBATLOG_DAMAGE"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_name: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_source_name: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inflictor_name: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_attacker_hero: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_target_hero: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_y: Option<f32>,
    /// Player id the entry is located at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_location: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_trim_strips_nul_padding() {
        let header = DemoHeader {
            demo_file_stamp: "PBDEMS2\0\0\0".to_string(),
            server_name: "Valve Dota 2 Server".to_string(),
            ..Default::default()
        };
        let trimmed = header.trimmed();
        assert_eq!(trimmed.demo_file_stamp, "PBDEMS2");
        assert_eq!(trimmed.server_name, header.server_name);
    }

    #[test]
    fn test_tickrate_rounds_half_away_from_zero() {
        let info = FileInfo {
            playback_time: 100.0,
            playback_ticks: 3050,
            playback_frames: 0,
        };
        assert_eq!(info.tickrate(), Some(31));

        let info = FileInfo {
            playback_time: 2165.4,
            playback_ticks: 64962,
            playback_frames: 0,
        };
        assert_eq!(info.tickrate(), Some(30));
    }

    #[test]
    fn test_tickrate_requires_positive_playback() {
        assert_eq!(FileInfo::default().tickrate(), None);
    }

    #[test]
    fn test_chat_event_deserializes_sparse_fields() {
        let event: ChatEvent = serde_json::from_str(
            r#"{"type":"CHAT_MESSAGE_HERO_KILL","value":200,"playerid_1":3,"playerid_2":7}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "CHAT_MESSAGE_HERO_KILL");
        assert_eq!(event.player_ids()[1], ("2", Some(7)));
        assert_eq!(event.player_ids()[2], ("3", None));
    }

    #[test]
    fn test_combat_log_keeps_unknown_fields() {
        let raw = json!({
            "type": "DOTA_COMBATLOG_GOLD",
            "value": 200,
            "gold_reason": 12,
            "attacker_team": 2,
            "is_attacker_illusion": false,
        });
        let entry: CombatLogEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.kind, "DOTA_COMBATLOG_GOLD");
        assert_eq!(entry.value, Some(200));
        assert_eq!(entry.extra["gold_reason"], json!(12));

        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn test_chat_event_keeps_unknown_fields() {
        let raw = json!({
            "type": "CHAT_MESSAGE_RUNE_PICKUP",
            "value": 3,
            "playerid_1": 4,
            "rune_type": "haste",
        });
        let event: ChatEvent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.player_ids()[0], ("1", Some(4)));
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_header_keeps_unknown_fields_through_trim() {
        let raw = json!({
            "demo_file_stamp": "PBDEMS2\u{0}",
            "server_name": "Valve Dota 2 Server",
            "map_name": "dota",
            "server_start_tick": 4812,
            "game": "dota",
        });
        let header: DemoHeader = serde_json::from_value(raw).unwrap();
        let trimmed = serde_json::to_value(header.trimmed()).unwrap();

        assert_eq!(trimmed["demo_file_stamp"], "PBDEMS2");
        assert_eq!(trimmed["server_start_tick"], 4812);
        assert_eq!(trimmed["game"], "dota");
    }
}
