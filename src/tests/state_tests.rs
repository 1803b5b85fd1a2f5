use super::*;

use crate::event::DetectedInfo;
use crate::translate::DetectionKind;

#[test]
fn new_state_is_running_in_default() {
    let state = ScriptState::new(Uuid::from_u128(1), Uuid::from_u128(2));
    assert_eq!(state.current_state, "default");
    assert!(state.is_running);
    assert!(state.variables.is_empty());
    assert!(state.event_queue.is_empty());
    assert_eq!(state.perms_granter, None);
}

#[test]
fn set_variable_replaces_existing_value() {
    let mut state = ScriptState::new(Uuid::nil(), Uuid::nil());
    state.set_variable("count", 1);
    state.set_variable("count", "one");
    assert_eq!(state.variables.len(), 1);
    assert_eq!(state.variables["count"], TypedValue::Text("one".into()));
}

#[test]
fn queued_events_resume_in_order() {
    let translator = EventTranslator::default();
    let mut state = ScriptState::new(Uuid::nil(), Uuid::nil());
    let touch = ScriptEvent::Detection {
        kind: DetectionKind::Touch,
        detected: vec![DetectedInfo::new(Uuid::from_u128(3))],
    };
    assert!(state.queue_event(&translator, &ScriptEvent::Timer, LinkIdShape::Text));
    assert!(state.queue_event(&translator, &touch, LinkIdShape::Text));

    let unmapped = ScriptEvent::Custom {
        name: "not_registered".to_string(),
        params: Vec::new(),
    };
    assert!(!state.queue_event(&translator, &unmapped, LinkIdShape::Text));

    assert_eq!(state.event_queue.len(), 2);
    assert_eq!(
        state.resume_events(&translator),
        vec![ScriptEvent::Timer, touch]
    );
}
