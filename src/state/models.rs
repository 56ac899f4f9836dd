// Data models for the seismic event document
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record registered in the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub sha256: String,
    pub sample_rate: f64,
    pub sample_count: i64,
}

/// A picked seismic event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    pub id: Uuid,
    pub record_id: Uuid,
    /// Onset as a sample index into the record
    pub time: usize,
    pub method: PickMethod,
    pub mode: PickMode,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Algorithm that produced a pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickMethod {
    Takanami,
    Stalta,
    Ampa,
    Other,
}

impl PickMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickMethod::Takanami => "takanami",
            PickMethod::Stalta => "stalta",
            PickMethod::Ampa => "ampa",
            PickMethod::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "takanami" => PickMethod::Takanami,
            "stalta" => PickMethod::Stalta,
            "ampa" => PickMethod::Ampa,
            _ => PickMethod::Other,
        }
    }
}

/// Whether a pick was made by an algorithm or by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickMode {
    Automatic,
    Manual,
    Undefined,
}

impl PickMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickMode::Automatic => "automatic",
            PickMode::Manual => "manual",
            PickMode::Undefined => "undefined",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "automatic" => PickMode::Automatic,
            "manual" => PickMode::Manual,
            _ => PickMode::Undefined,
        }
    }
}

/// Review status of a pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Preliminary,
    Reported,
    Revised,
    Confirmed,
    Rejected,
    Final,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Preliminary => "preliminary",
            EventStatus::Reported => "reported",
            EventStatus::Revised => "revised",
            EventStatus::Confirmed => "confirmed",
            EventStatus::Rejected => "rejected",
            EventStatus::Final => "final",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "reported" => EventStatus::Reported,
            "revised" => EventStatus::Revised,
            "confirmed" => EventStatus::Confirmed,
            "rejected" => EventStatus::Rejected,
            "final" => EventStatus::Final,
            _ => EventStatus::Preliminary,
        }
    }
}

/// Fields to change on an existing event. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEdit {
    pub time: Option<usize>,
    pub method: Option<PickMethod>,
    pub mode: Option<PickMode>,
    pub status: Option<EventStatus>,
}

impl EventEdit {
    /// Edit applied when a refined onset is accepted
    pub fn takanami(time: usize) -> Self {
        EventEdit {
            time: Some(time),
            method: Some(PickMethod::Takanami),
            mode: Some(PickMode::Automatic),
            status: Some(EventStatus::Reported),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.method.is_none() && self.mode.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_forms_round_trip() {
        for method in [
            PickMethod::Takanami,
            PickMethod::Stalta,
            PickMethod::Ampa,
            PickMethod::Other,
        ] {
            assert_eq!(PickMethod::from_string(method.as_str()), method);
        }
        for status in [
            EventStatus::Preliminary,
            EventStatus::Reported,
            EventStatus::Revised,
            EventStatus::Confirmed,
            EventStatus::Rejected,
            EventStatus::Final,
        ] {
            assert_eq!(EventStatus::from_string(status.as_str()), status);
        }
        assert_eq!(PickMode::from_string("manual"), PickMode::Manual);
    }

    #[test]
    fn test_unknown_strings_fall_back() {
        assert_eq!(PickMethod::from_string("???"), PickMethod::Other);
        assert_eq!(PickMode::from_string(""), PickMode::Undefined);
        assert_eq!(EventStatus::from_string("x"), EventStatus::Preliminary);
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&PickMethod::Takanami).unwrap();
        assert_eq!(json, "\"takanami\"");
    }

    #[test]
    fn test_takanami_edit() {
        let edit = EventEdit::takanami(512);
        assert_eq!(edit.time, Some(512));
        assert_eq!(edit.method, Some(PickMethod::Takanami));
        assert_eq!(edit.mode, Some(PickMode::Automatic));
        assert_eq!(edit.status, Some(EventStatus::Reported));
        assert!(!edit.is_empty());
        assert!(EventEdit::default().is_empty());
    }
}
