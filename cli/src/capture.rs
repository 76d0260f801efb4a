//! JSON-lines capture format.
//!
//! One host input per line, tagged by `type`:
//!
//! ```text
//! {"type":"host","at":0.0,"player":{"guid":"Player-1","name":"Ayla"},"zone":"Deadmines","context":{"instance":"party","group_size":3}}
//! {"type":"combat","at":0.0,"in_combat":true}
//! {"type":"event","timestamp":0.4,"kind":"SPELL_DAMAGE","source_id":"Player-1",...,"args":[133,"Fireball",4,812]}
//! {"type":"scale","dps_scale":1.0,"hps_scale":1.0,"character":"Ayla","timestamp":0.0}
//! {"type":"advance","at":12.0}
//! ```
//!
//! `at` is local clock time. Events without `at` use their own timestamp when
//! it is in the local domain.

use serde::Deserialize;
use skirmish_core::bus::ScaleUpdate;
use skirmish_core::{RawEvent, StaticHost};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureLine {
    Host {
        #[serde(default)]
        at: Option<f64>,
        #[serde(flatten)]
        host: StaticHost,
    },
    Combat {
        #[serde(default)]
        at: Option<f64>,
        in_combat: bool,
    },
    Event {
        #[serde(default)]
        at: Option<f64>,
        #[serde(flatten)]
        event: RawEvent,
    },
    Scale {
        #[serde(default)]
        at: Option<f64>,
        #[serde(flatten)]
        update: ScaleUpdate,
    },
    Advance {
        at: f64,
    },
}

#[derive(Debug, Error)]
#[error("line {line}: {source}")]
pub struct CaptureError {
    pub line: usize,
    pub source: serde_json::Error,
}

impl CaptureLine {
    /// Local clock time to advance to before applying this line.
    pub fn at(&self, log_domain_threshold: f64) -> Option<f64> {
        match self {
            CaptureLine::Host { at, .. }
            | CaptureLine::Combat { at, .. }
            | CaptureLine::Scale { at, .. } => *at,
            CaptureLine::Event { at, event } => {
                at.or_else(|| (event.timestamp < log_domain_threshold).then_some(event.timestamp))
            }
            CaptureLine::Advance { at } => Some(*at),
        }
    }
}

/// Parse one capture line. Blank lines and `#` comments yield `None`.
pub fn parse_line(number: usize, text: &str) -> Result<Option<CaptureLine>, CaptureError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| CaptureError { line: number, source })
}
