//! Monster roster: the application-side lookup the engine consults.
//!
//! The engine only needs two answers about a monster: which archetype it
//! belongs to and whether a captured recording exists for it. Those answers
//! come through [`MonsterDirectory`]; [`MonsterRoster`] is the stock
//! implementation holding the eight starter monsters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, ConfigError, DecodeError};
use crate::pattern::Archetype;

pub trait MonsterDirectory: Send {
    /// Archetype of `id`. Unknown monsters get the default archetype.
    fn archetype(&self, id: &str) -> Archetype;
    /// Encoded recording bytes for `id`, if one was captured.
    fn recorded_audio(&self, id: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monster {
    pub id: String,
    pub name: String,
    /// Type name as the roster data spells it (`bass`, `rhythm`, ...).
    #[serde(rename = "type")]
    pub monster_type: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_unlocked: bool,
    /// Base64 data URL (`data:audio/wav;base64,...`) or bare base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_audio: Option<String>,
}

impl Monster {
    fn stock(id: &str, name: &str, monster_type: &str, color: &str, is_unlocked: bool) -> Self {
        Monster {
            id: id.to_string(),
            name: name.to_string(),
            monster_type: monster_type.to_string(),
            color: color.to_string(),
            is_unlocked,
            recorded_audio: None,
        }
    }

    pub fn archetype(&self) -> Archetype {
        Archetype::from_type_name(&self.monster_type)
    }

    /// Decoded bytes of the stored recording.
    pub fn recording_bytes(&self) -> Option<Result<Vec<u8>, DecodeError>> {
        self.recorded_audio.as_deref().map(decode_data_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterRoster {
    monsters: Vec<Monster>,
}

impl Default for MonsterRoster {
    fn default() -> Self {
        MonsterRoster {
            monsters: vec![
                Monster::stock("kick-bot", "KickBot", "bass", "#DC2626", true),
                Monster::stock("snare-snake", "SnareSnake", "rhythm", "#F59E0B", true),
                Monster::stock("synth-cat", "SynthCat", "melody", "#8B5CF6", false),
                Monster::stock("vocal-viper", "VocalViper", "vocals", "#EC4899", false),
                Monster::stock("fx-falcon", "FXFalcon", "fx", "#06B6D4", false),
                Monster::stock("techno-beast", "TechnoBeast", "bass", "#EF4444", false),
                Monster::stock("loop-lord", "LoopLord", "rhythm", "#10B981", false),
                Monster::stock("harmony-hawk", "HarmonyHawk", "melody", "#3B82F6", false),
            ],
        }
    }
}

impl MonsterRoster {
    pub fn new(monsters: Vec<Monster>) -> Self {
        MonsterRoster { monsters }
    }

    /// Load a roster from a JSON array of monsters.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let monsters: Vec<Monster> = serde_json::from_str(json)?;
        Ok(MonsterRoster { monsters })
    }

    pub fn get(&self, id: &str) -> Option<&Monster> {
        self.monsters.iter().find(|m| m.id == id)
    }

    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    pub fn unlocked(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.iter().filter(|m| m.is_unlocked)
    }

    /// Mark `id` unlocked, storing `data_url` as its recording when given.
    pub fn unlock(&mut self, id: &str, data_url: Option<String>) -> Result<(), CaptureError> {
        let monster = self
            .monsters
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| CaptureError::UnknownMonster(id.to_string()))?;
        monster.is_unlocked = true;
        if data_url.is_some() {
            monster.recorded_audio = data_url;
        }
        Ok(())
    }

    /// Unlock `id` with raw encoded audio, stored as a base64 data URL.
    pub fn unlock_with_recording(&mut self, id: &str, mime: &str, bytes: &[u8]) -> Result<(), CaptureError> {
        self.unlock(id, Some(encode_data_url(mime, bytes)))
    }
}

impl MonsterDirectory for MonsterRoster {
    fn archetype(&self, id: &str) -> Archetype {
        self.get(id).map(Monster::archetype).unwrap_or(Archetype::Default)
    }

    fn recorded_audio(&self, id: &str) -> Option<Vec<u8>> {
        // An undecodable payload is still a recording: the engine's decode
        // step reports it and falls back to synthesis.
        self.get(id)?
            .recorded_audio
            .as_deref()
            .map(|url| decode_data_url(url).unwrap_or_else(|_| url.as_bytes().to_vec()))
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = match url.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, p)| p),
        None => url,
    };
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_roster() {
        let r = MonsterRoster::default();
        assert_eq!(r.monsters().len(), 8);
        let unlocked: Vec<&str> = r.unlocked().map(|m| m.id.as_str()).collect();
        assert_eq!(unlocked, vec!["kick-bot", "snare-snake"]);
        assert_eq!(r.archetype("fx-falcon"), Archetype::Fx);
        assert_eq!(r.archetype("loop-lord"), Archetype::Rhythm);
        assert_eq!(r.archetype("nobody"), Archetype::Default);
        assert!(r.recorded_audio("kick-bot").is_none());
    }

    #[test]
    fn data_url_round_trip() {
        let url = encode_data_url("audio/wav", b"RIFF1234");
        assert!(url.starts_with("data:audio/wav;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), b"RIFF1234");
        assert_eq!(decode_data_url("UklGRg==").unwrap(), b"RIFF");
        assert!(matches!(decode_data_url("data:audio/wav;base64,!!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn unlock_with_recording_is_visible_to_directory() {
        let mut r = MonsterRoster::default();
        r.unlock_with_recording("synth-cat", "audio/wav", b"RIFFxxxx").unwrap();
        assert!(r.get("synth-cat").unwrap().is_unlocked);
        assert_eq!(r.recorded_audio("synth-cat").unwrap(), b"RIFFxxxx");
        assert!(matches!(
            r.unlock("ghost", None),
            Err(CaptureError::UnknownMonster(_))
        ));
    }

    #[test]
    fn from_json_accepts_app_shape() {
        let json = r#"[{"id":"m1","name":"M1","type":"vocals","isUnlocked":true,
            "recordedAudio":"data:audio/webm;base64,AAEC"}]"#;
        let r = MonsterRoster::from_json(json).unwrap();
        let m = r.get("m1").unwrap();
        assert_eq!(m.archetype(), Archetype::Vocals);
        assert_eq!(m.recording_bytes().unwrap().unwrap(), vec![0, 1, 2]);
    }
}
