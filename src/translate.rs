//! Conversion between host runtime events and generic [`EventRecord`]s.
//!
//! Reverse translation is keyed by event name. The decoders drop queued
//! records whose name is not registered instead of failing the whole load.
//! Records with a registered name are always kept; if their parameters do not
//! fit the event's signature they stay in the queue as stored and are only
//! skipped when the host rebuilds its runtime events.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::event::{DetectedInfo, EventRecord};
use crate::value::{EntityKey, Quaternion, TypedValue, ValueKind, Vector3};

/// Wire shape preferred by the host for the `id` parameter of `link_message`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkIdShape {
    /// Always send the id as text.
    #[default]
    Text,
    /// Send the id as an entity key when it is a canonical UUID.
    Key,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionKind {
    TouchStart,
    Touch,
    TouchEnd,
    CollisionStart,
    Collision,
    CollisionEnd,
    Sensor,
}

impl DetectionKind {
    pub const ALL: [DetectionKind; 7] = [
        DetectionKind::TouchStart,
        DetectionKind::Touch,
        DetectionKind::TouchEnd,
        DetectionKind::CollisionStart,
        DetectionKind::Collision,
        DetectionKind::CollisionEnd,
        DetectionKind::Sensor,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            DetectionKind::TouchStart => "touch_start",
            DetectionKind::Touch => "touch",
            DetectionKind::TouchEnd => "touch_end",
            DetectionKind::CollisionStart => "collision_start",
            DetectionKind::Collision => "collision",
            DetectionKind::CollisionEnd => "collision_end",
            DetectionKind::Sensor => "sensor",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandCollisionKind {
    Start,
    Continue,
    End,
}

impl LandCollisionKind {
    pub const ALL: [LandCollisionKind; 3] = [
        LandCollisionKind::Start,
        LandCollisionKind::Continue,
        LandCollisionKind::End,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            LandCollisionKind::Start => "land_collision_start",
            LandCollisionKind::Continue => "land_collision",
            LandCollisionKind::End => "land_collision_end",
        }
    }
}

/// Event as the host runtime holds it, with type-specific fields.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptEvent {
    StateEntry,
    StateExit,
    Timer,
    NoSensor,
    NotAtTarget,
    NotAtRotTarget,
    MovingStart,
    MovingEnd,
    Detection {
        kind: DetectionKind,
        detected: Vec<DetectedInfo>,
    },
    LandCollision {
        kind: LandCollisionKind,
        position: Vector3,
    },
    Listen {
        channel: i32,
        name: String,
        id: EntityKey,
        message: String,
    },
    LinkMessage {
        sender_num: i32,
        num: i32,
        message: String,
        id: String,
    },
    Changed {
        change: i32,
    },
    OnRez {
        start_param: i32,
    },
    Attach {
        id: EntityKey,
    },
    Money {
        id: EntityKey,
        amount: i32,
    },
    RunTimePermissions {
        perms: i32,
    },
    Dataserver {
        query_id: EntityKey,
        data: String,
    },
    HttpResponse {
        request_id: EntityKey,
        status: i32,
        metadata: Vec<TypedValue>,
        body: String,
    },
    HttpRequest {
        request_id: EntityKey,
        method: String,
        body: String,
    },
    AtTarget {
        handle: i32,
        target: Vector3,
        position: Vector3,
    },
    AtRotTarget {
        handle: i32,
        target: Quaternion,
        rotation: Quaternion,
    },
    Control {
        id: EntityKey,
        level: i32,
        edge: i32,
    },
    Email {
        time: String,
        address: String,
        subject: String,
        message: String,
        num_left: i32,
    },
    ObjectRez {
        id: EntityKey,
    },
    TransactionResult {
        id: EntityKey,
        success: i32,
        data: String,
    },
    /// Host extension event; only translatable once registered.
    Custom {
        name: String,
        params: Vec<TypedValue>,
    },
}

impl ScriptEvent {
    pub fn name(&self) -> &str {
        match self {
            ScriptEvent::StateEntry => "state_entry",
            ScriptEvent::StateExit => "state_exit",
            ScriptEvent::Timer => "timer",
            ScriptEvent::NoSensor => "no_sensor",
            ScriptEvent::NotAtTarget => "not_at_target",
            ScriptEvent::NotAtRotTarget => "not_at_rot_target",
            ScriptEvent::MovingStart => "moving_start",
            ScriptEvent::MovingEnd => "moving_end",
            ScriptEvent::Detection { kind, .. } => kind.event_name(),
            ScriptEvent::LandCollision { kind, .. } => kind.event_name(),
            ScriptEvent::Listen { .. } => "listen",
            ScriptEvent::LinkMessage { .. } => "link_message",
            ScriptEvent::Changed { .. } => "changed",
            ScriptEvent::OnRez { .. } => "on_rez",
            ScriptEvent::Attach { .. } => "attach",
            ScriptEvent::Money { .. } => "money",
            ScriptEvent::RunTimePermissions { .. } => "run_time_permissions",
            ScriptEvent::Dataserver { .. } => "dataserver",
            ScriptEvent::HttpResponse { .. } => "http_response",
            ScriptEvent::HttpRequest { .. } => "http_request",
            ScriptEvent::AtTarget { .. } => "at_target",
            ScriptEvent::AtRotTarget { .. } => "at_rot_target",
            ScriptEvent::Control { .. } => "control",
            ScriptEvent::Email { .. } => "email",
            ScriptEvent::ObjectRez { .. } => "object_rez",
            ScriptEvent::TransactionResult { .. } => "transaction_result",
            ScriptEvent::Custom { name, .. } => name,
        }
    }
}

type RecordDecoder = fn(&EventRecord) -> Option<ScriptEvent>;

#[derive(Clone)]
enum Decoder {
    Fixed(RecordDecoder),
    Detection(DetectionKind),
    LandCollision(LandCollisionKind),
    Custom(Vec<ValueKind>),
}

/// Name-keyed event registry, immutable once built.
#[derive(Clone)]
pub struct EventTranslator {
    decoders: HashMap<String, Decoder>,
}

impl fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EventTranslator")
            .field("events", &names)
            .finish()
    }
}

/// Collects host extension events before freezing them into an [`EventTranslator`].
///
/// Standard event names always keep their built-in mapping: a custom
/// registration that reuses one is ignored by [`build`](Self::build), and
/// registering the same custom name twice keeps the first signature.
#[derive(Default)]
pub struct EventTranslatorBuilder {
    custom: Vec<(String, Vec<ValueKind>)>,
}

impl Default for EventTranslator {
    fn default() -> Self {
        EventTranslatorBuilder::default().build()
    }
}

impl EventTranslatorBuilder {
    /// Registers a host extension event with its parameter kinds.
    pub fn register_custom(mut self, name: impl Into<String>, signature: &[ValueKind]) -> Self {
        self.custom.push((name.into(), signature.to_vec()));
        self
    }

    pub fn build(self) -> EventTranslator {
        let mut decoders = HashMap::new();
        for (name, decoder) in fixed_decoders() {
            decoders.insert(name.to_string(), Decoder::Fixed(decoder));
        }
        for kind in DetectionKind::ALL {
            decoders.insert(kind.event_name().to_string(), Decoder::Detection(kind));
        }
        for kind in LandCollisionKind::ALL {
            decoders.insert(kind.event_name().to_string(), Decoder::LandCollision(kind));
        }
        for (name, signature) in self.custom {
            decoders.entry(name).or_insert(Decoder::Custom(signature));
        }
        EventTranslator { decoders }
    }
}

impl EventTranslator {
    pub fn builder() -> EventTranslatorBuilder {
        EventTranslatorBuilder::default()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Forward translation. `None` means the event has no wire mapping.
    pub fn to_record(&self, event: &ScriptEvent, link_id: LinkIdShape) -> Option<EventRecord> {
        use TypedValue as V;

        let mut detected = Vec::new();
        let params = match event {
            ScriptEvent::StateEntry
            | ScriptEvent::StateExit
            | ScriptEvent::Timer
            | ScriptEvent::NoSensor
            | ScriptEvent::NotAtTarget
            | ScriptEvent::NotAtRotTarget
            | ScriptEvent::MovingStart
            | ScriptEvent::MovingEnd => Vec::new(),
            ScriptEvent::Detection {
                detected: entries, ..
            } => {
                let count = i32::try_from(entries.len()).ok()?;
                detected = entries.clone();
                vec![V::Integer32(count)]
            }
            ScriptEvent::LandCollision { position, .. } => vec![V::Vector3(*position)],
            ScriptEvent::Listen {
                channel,
                name,
                id,
                message,
            } => vec![
                V::Integer32(*channel),
                V::Text(name.clone()),
                V::EntityKey(*id),
                V::Text(message.clone()),
            ],
            ScriptEvent::LinkMessage {
                sender_num,
                num,
                message,
                id,
            } => vec![
                V::Integer32(*sender_num),
                V::Integer32(*num),
                V::Text(message.clone()),
                link_id_value(id, link_id),
            ],
            ScriptEvent::Changed { change } => vec![V::Integer32(*change)],
            ScriptEvent::OnRez { start_param } => vec![V::Integer32(*start_param)],
            ScriptEvent::Attach { id } | ScriptEvent::ObjectRez { id } => vec![V::EntityKey(*id)],
            ScriptEvent::Money { id, amount } => vec![V::EntityKey(*id), V::Integer32(*amount)],
            ScriptEvent::RunTimePermissions { perms } => vec![V::Integer32(*perms)],
            ScriptEvent::Dataserver { query_id, data } => {
                vec![V::EntityKey(*query_id), V::Text(data.clone())]
            }
            ScriptEvent::HttpResponse {
                request_id,
                status,
                metadata,
                body,
            } => vec![
                V::EntityKey(*request_id),
                V::Integer32(*status),
                V::List(metadata.clone()),
                V::Text(body.clone()),
            ],
            ScriptEvent::HttpRequest {
                request_id,
                method,
                body,
            } => vec![
                V::EntityKey(*request_id),
                V::Text(method.clone()),
                V::Text(body.clone()),
            ],
            ScriptEvent::AtTarget {
                handle,
                target,
                position,
            } => vec![
                V::Integer32(*handle),
                V::Vector3(*target),
                V::Vector3(*position),
            ],
            ScriptEvent::AtRotTarget {
                handle,
                target,
                rotation,
            } => vec![
                V::Integer32(*handle),
                V::Quaternion(*target),
                V::Quaternion(*rotation),
            ],
            ScriptEvent::Control { id, level, edge } => vec![
                V::EntityKey(*id),
                V::Integer32(*level),
                V::Integer32(*edge),
            ],
            ScriptEvent::Email {
                time,
                address,
                subject,
                message,
                num_left,
            } => vec![
                V::Text(time.clone()),
                V::Text(address.clone()),
                V::Text(subject.clone()),
                V::Text(message.clone()),
                V::Integer32(*num_left),
            ],
            ScriptEvent::TransactionResult { id, success, data } => vec![
                V::EntityKey(*id),
                V::Integer32(*success),
                V::Text(data.clone()),
            ],
            ScriptEvent::Custom { name, params } => match self.decoders.get(name) {
                Some(Decoder::Custom(signature)) if matches_signature(params, signature) => {
                    params.clone()
                }
                _ => return None,
            },
        };

        Some(EventRecord {
            name: event.name().to_string(),
            params,
            detected,
        })
    }

    /// Reverse translation through the name-keyed registry.
    pub fn from_record(&self, record: &EventRecord) -> Option<ScriptEvent> {
        match self.decoders.get(&record.name)? {
            Decoder::Fixed(decode) => decode(record),
            Decoder::Detection(kind) => {
                let mut params = Params::new(record);
                let count = params.int()?;
                if usize::try_from(count).ok()? != record.detected.len() {
                    return None;
                }
                params.done(ScriptEvent::Detection {
                    kind: *kind,
                    detected: record.detected.clone(),
                })
            }
            Decoder::LandCollision(kind) => {
                let mut params = Params::new(record);
                let position = params.vector()?;
                params.done(ScriptEvent::LandCollision {
                    kind: *kind,
                    position,
                })
            }
            Decoder::Custom(signature) => {
                matches_signature(&record.params, signature).then(|| ScriptEvent::Custom {
                    name: record.name.clone(),
                    params: record.params.clone(),
                })
            }
        }
    }
}

fn link_id_value(id: &str, shape: LinkIdShape) -> TypedValue {
    match shape {
        LinkIdShape::Key => match Uuid::parse_str(id) {
            Ok(key) if key.hyphenated().to_string() == id => TypedValue::EntityKey(key),
            _ => TypedValue::Text(id.to_string()),
        },
        LinkIdShape::Text => TypedValue::Text(id.to_string()),
    }
}

fn matches_signature(params: &[TypedValue], signature: &[ValueKind]) -> bool {
    params.len() == signature.len()
        && params
            .iter()
            .zip(signature)
            .all(|(value, kind)| value.kind() == *kind)
}

struct Params<'a> {
    iter: std::slice::Iter<'a, TypedValue>,
}

impl<'a> Params<'a> {
    fn new(record: &'a EventRecord) -> Self {
        Self {
            iter: record.params.iter(),
        }
    }

    fn int(&mut self) -> Option<i32> {
        self.iter.next()?.as_i32()
    }

    fn text(&mut self) -> Option<String> {
        self.iter.next()?.as_text().map(str::to_string)
    }

    /// Older hosts store key parameters as text.
    fn key(&mut self) -> Option<EntityKey> {
        match self.iter.next()? {
            TypedValue::EntityKey(key) => Some(*key),
            TypedValue::Text(text) => Uuid::parse_str(text.trim()).ok(),
            _ => None,
        }
    }

    fn key_or_text(&mut self) -> Option<String> {
        match self.iter.next()? {
            TypedValue::EntityKey(key) => Some(key.hyphenated().to_string()),
            TypedValue::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn vector(&mut self) -> Option<Vector3> {
        match self.iter.next()? {
            TypedValue::Vector3(value) => Some(*value),
            _ => None,
        }
    }

    fn rotation(&mut self) -> Option<Quaternion> {
        match self.iter.next()? {
            TypedValue::Quaternion(value) => Some(*value),
            _ => None,
        }
    }

    fn list(&mut self) -> Option<Vec<TypedValue>> {
        match self.iter.next()? {
            TypedValue::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    fn done(mut self, event: ScriptEvent) -> Option<ScriptEvent> {
        self.iter.next().is_none().then_some(event)
    }
}

fn fixed_decoders() -> [(&'static str, RecordDecoder); 24] {
    [
        ("state_entry", |r| Params::new(r).done(ScriptEvent::StateEntry)),
        ("state_exit", |r| Params::new(r).done(ScriptEvent::StateExit)),
        ("timer", |r| Params::new(r).done(ScriptEvent::Timer)),
        ("no_sensor", |r| Params::new(r).done(ScriptEvent::NoSensor)),
        ("not_at_target", |r| {
            Params::new(r).done(ScriptEvent::NotAtTarget)
        }),
        ("not_at_rot_target", |r| {
            Params::new(r).done(ScriptEvent::NotAtRotTarget)
        }),
        ("moving_start", |r| Params::new(r).done(ScriptEvent::MovingStart)),
        ("moving_end", |r| Params::new(r).done(ScriptEvent::MovingEnd)),
        ("listen", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Listen {
                channel: p.int()?,
                name: p.text()?,
                id: p.key()?,
                message: p.text()?,
            };
            p.done(event)
        }),
        ("link_message", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::LinkMessage {
                sender_num: p.int()?,
                num: p.int()?,
                message: p.text()?,
                id: p.key_or_text()?,
            };
            p.done(event)
        }),
        ("changed", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Changed { change: p.int()? };
            p.done(event)
        }),
        ("on_rez", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::OnRez {
                start_param: p.int()?,
            };
            p.done(event)
        }),
        ("attach", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Attach { id: p.key()? };
            p.done(event)
        }),
        ("object_rez", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::ObjectRez { id: p.key()? };
            p.done(event)
        }),
        ("money", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Money {
                id: p.key()?,
                amount: p.int()?,
            };
            p.done(event)
        }),
        ("run_time_permissions", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::RunTimePermissions { perms: p.int()? };
            p.done(event)
        }),
        ("dataserver", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Dataserver {
                query_id: p.key()?,
                data: p.text()?,
            };
            p.done(event)
        }),
        ("http_response", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::HttpResponse {
                request_id: p.key()?,
                status: p.int()?,
                metadata: p.list()?,
                body: p.text()?,
            };
            p.done(event)
        }),
        ("http_request", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::HttpRequest {
                request_id: p.key()?,
                method: p.text()?,
                body: p.text()?,
            };
            p.done(event)
        }),
        ("at_target", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::AtTarget {
                handle: p.int()?,
                target: p.vector()?,
                position: p.vector()?,
            };
            p.done(event)
        }),
        ("at_rot_target", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::AtRotTarget {
                handle: p.int()?,
                target: p.rotation()?,
                rotation: p.rotation()?,
            };
            p.done(event)
        }),
        ("control", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Control {
                id: p.key()?,
                level: p.int()?,
                edge: p.int()?,
            };
            p.done(event)
        }),
        ("email", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::Email {
                time: p.text()?,
                address: p.text()?,
                subject: p.text()?,
                message: p.text()?,
                num_left: p.int()?,
            };
            p.done(event)
        }),
        ("transaction_result", |r| {
            let mut p = Params::new(r);
            let event = ScriptEvent::TransactionResult {
                id: p.key()?,
                success: p.int()?,
                data: p.text()?,
            };
            p.done(event)
        }),
    ]
}

#[cfg(test)]
#[path = "tests/translate_tests.rs"]
mod tests;
