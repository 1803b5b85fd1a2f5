//! Persisted script state: the record every codec reads and writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventRecord;
use crate::translate::{EventTranslator, LinkIdShape, ScriptEvent};
use crate::value::{EntityKey, TypedValue};

/// Permission delegated to the script by an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermsGrant {
    pub granter: EntityKey,
    pub mask: i32,
}

/// Suspended execution state of one script instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptState {
    pub item_id: Uuid,
    pub asset_id: Uuid,
    pub current_state: String,
    pub is_running: bool,
    pub start_parameter: i32,
    pub variables: BTreeMap<String, TypedValue>,
    pub event_queue: Vec<EventRecord>,
    pub perms_granter: Option<PermsGrant>,
    pub plugin_data: Vec<TypedValue>,
    pub min_event_delay: f64,
}

impl ScriptState {
    /// Creates a running state in the `default` script state with nothing queued.
    pub fn new(item_id: Uuid, asset_id: Uuid) -> Self {
        Self {
            item_id,
            asset_id,
            current_state: "default".to_string(),
            is_running: true,
            start_parameter: 0,
            variables: BTreeMap::new(),
            event_queue: Vec::new(),
            perms_granter: None,
            plugin_data: Vec::new(),
            min_event_delay: 0.0,
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Appends a runtime event to the queue; returns false when it has no wire mapping.
    pub fn queue_event(
        &mut self,
        translator: &EventTranslator,
        event: &ScriptEvent,
        link_id: LinkIdShape,
    ) -> bool {
        match translator.to_record(event, link_id) {
            Some(record) => {
                self.event_queue.push(record);
                true
            }
            None => false,
        }
    }

    /// Rebuilds the runtime events to replay on resume, in queue order.
    /// Records whose parameters do not fit their event are skipped.
    pub fn resume_events(&self, translator: &EventTranslator) -> Vec<ScriptEvent> {
        self.event_queue
            .iter()
            .filter_map(|record| translator.from_record(record))
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
