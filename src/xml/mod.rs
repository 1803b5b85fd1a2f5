//! Legacy XML document format.
//!
//! Reading is lenient: unrecognized elements are skipped wholesale and queued
//! events with no registered mapping are dropped, both with a log line.
//! Malformed nesting, leaf text that does not parse as its declared type, a
//! missing `type` attribute and unregistered opaque types still fail the load.

mod reader;
mod writer;

pub use reader::XmlCursor;
pub use writer::XmlWriter;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use quick_xml::events::BytesStart;
use uuid::Uuid;

use crate::codec::DecodeContext;
use crate::error::{encode_error, structural, type_mismatch, CodecError, CodecResult};
use crate::event::{DetectedInfo, EventRecord, ObjectType};
use crate::state::{PermsGrant, ScriptState};
use crate::value::{Quaternion, TypedValue, ValueKind, Vector3};

pub const SCRIPT_STATE: &str = "ScriptState";
pub const STATE: &str = "State";
pub const RUNNING: &str = "Running";
pub const START_PARAMETER: &str = "StartParameter";
pub const VARIABLES: &str = "Variables";
pub const VARIABLE: &str = "Variable";
pub const QUEUE: &str = "Queue";
pub const ITEM: &str = "Item";
pub const PARAMS: &str = "Params";
pub const PARAM: &str = "Param";
pub const DETECTED: &str = "Detected";
pub const OBJECT: &str = "Object";
pub const PERMISSIONS: &str = "Permissions";
pub const PLUGINS: &str = "Plugins";
pub const LIST_ITEM: &str = "ListItem";
pub const MIN_EVENT_DELAY: &str = "MinEventDelay";

#[cold]
#[inline(never)]
pub(crate) fn xml_error(err: impl Display) -> CodecError {
    structural(format!("xml: {err}"))
}

#[cold]
#[inline(never)]
pub(crate) fn write_error(err: impl Display) -> CodecError {
    encode_error(format!("xml: {err}"))
}

pub(crate) fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Shortest text that parses back to the same `f64`.
pub fn format_real(value: f64) -> String {
    value.to_string()
}

/// Writes `<ScriptState>` and its children in the fixed legacy order.
pub fn write_body(out: &mut XmlWriter, state: &ScriptState) -> CodecResult<()> {
    out.element(SCRIPT_STATE, &[], |out| {
        out.leaf(STATE, &[], &state.current_state)?;
        out.leaf(RUNNING, &[], if state.is_running { "True" } else { "False" })?;
        out.leaf(START_PARAMETER, &[], &state.start_parameter.to_string())?;
        out.element(VARIABLES, &[], |out| {
            for (name, value) in &state.variables {
                write_value(out, VARIABLE, &[("name", name.as_str())], value)?;
            }
            Ok(())
        })?;
        out.element(QUEUE, &[], |out| {
            for record in &state.event_queue {
                write_item(out, record)?;
            }
            Ok(())
        })?;
        if let Some(grant) = &state.perms_granter {
            let granter = grant.granter.to_string();
            let mask = grant.mask.to_string();
            out.empty(PERMISSIONS, &[("granter", &granter), ("mask", &mask)])?;
        }
        out.element(PLUGINS, &[], |out| {
            for value in &state.plugin_data {
                write_value(out, LIST_ITEM, &[], value)?;
            }
            Ok(())
        })?;
        out.leaf(MIN_EVENT_DELAY, &[], &format_real(state.min_event_delay))
    })
}

fn write_item(out: &mut XmlWriter, record: &EventRecord) -> CodecResult<()> {
    out.element(ITEM, &[("event", record.name.as_str())], |out| {
        out.element(PARAMS, &[], |out| {
            for param in &record.params {
                write_value(out, PARAM, &[], param)?;
            }
            Ok(())
        })?;
        out.element(DETECTED, &[], |out| {
            for detected in &record.detected {
                write_object(out, detected)?;
            }
            Ok(())
        })
    })
}

fn write_object(out: &mut XmlWriter, detected: &DetectedInfo) -> CodecResult<()> {
    let grab_offset = detected.grab_offset.to_legacy_string();
    let link_number = detected.link_number.to_string();
    let group = detected.group.to_string();
    let owner = detected.owner.to_string();
    let position = detected.position.to_legacy_string();
    let rotation = detected.rotation.to_legacy_string();
    let obj_type = detected.obj_type.bits().to_string();
    let velocity = detected.velocity.to_legacy_string();
    let touch_st = detected.touch_st.to_legacy_string();
    let touch_uv = detected.touch_uv.to_legacy_string();
    let touch_binormal = detected.touch_binormal.to_legacy_string();
    let touch_position = detected.touch_position.to_legacy_string();
    let touch_face = detected.touch_face.to_string();
    let attrs = [
        ("pos", grab_offset.as_str()),
        ("linkNum", link_number.as_str()),
        ("group", group.as_str()),
        ("name", detected.name.as_str()),
        ("owner", owner.as_str()),
        ("position", position.as_str()),
        ("rotation", rotation.as_str()),
        ("type", obj_type.as_str()),
        ("velocity", velocity.as_str()),
        ("touchST", touch_st.as_str()),
        ("touchUV", touch_uv.as_str()),
        ("touchBinormal", touch_binormal.as_str()),
        ("touchPos", touch_position.as_str()),
        ("touchFace", touch_face.as_str()),
    ];
    out.leaf(OBJECT, &attrs, &detected.key.to_string())
}

fn write_value(
    out: &mut XmlWriter,
    element: &str,
    attrs: &[(&str, &str)],
    value: &TypedValue,
) -> CodecResult<()> {
    let mut all = attrs.to_vec();
    all.push(("type", type_attribute(value)));
    match value {
        TypedValue::List(items) => out.element(element, &all, |out| {
            for item in items {
                write_value(out, LIST_ITEM, &[], item)?;
            }
            Ok(())
        }),
        scalar => out.leaf(element, &all, &scalar_text(scalar)),
    }
}

fn type_attribute(value: &TypedValue) -> &str {
    match value {
        TypedValue::OpaqueBlob { type_name, .. } => type_name.as_str(),
        other => other.kind().legacy_name().unwrap_or_default(),
    }
}

fn scalar_text(value: &TypedValue) -> String {
    match value {
        TypedValue::Integer32(value) => value.to_string(),
        TypedValue::Integer64(value) => value.to_string(),
        TypedValue::Real64(value) => format_real(*value),
        TypedValue::Text(value) => value.clone(),
        TypedValue::EntityKey(value) => value.to_string(),
        TypedValue::Vector3(value) => value.to_legacy_string(),
        TypedValue::Quaternion(value) => value.to_legacy_string(),
        TypedValue::OpaqueBlob { bytes, .. } => hex::encode(bytes),
        TypedValue::List(_) => String::new(),
    }
}

/// Reads the children of a `<ScriptState>` element whose start tag the cursor
/// has just returned, through its end tag.
pub fn read_body(
    cursor: &mut XmlCursor<'_>,
    item_id: Uuid,
    asset_id: Uuid,
    ctx: &DecodeContext<'_>,
) -> CodecResult<ScriptState> {
    let mut state = ScriptState::new(item_id, asset_id);
    while let Some(child) = cursor.next_child()? {
        let name = element_name(&child);
        match name.as_str() {
            STATE => state.current_state = read_text_value(cursor, ctx)?,
            RUNNING => state.is_running = parse_running(&cursor.read_text()?)?,
            START_PARAMETER => {
                let text = cursor.read_text()?;
                state.start_parameter = parse_scalar(&text, START_PARAMETER, ValueKind::Integer32)?;
            }
            VARIABLES => read_variables(cursor, &mut state.variables, ctx)?,
            QUEUE => read_queue(cursor, &mut state.event_queue, ctx)?,
            PERMISSIONS => {
                state.perms_granter = Some(read_permissions(&child)?);
                cursor.skip(&child)?;
            }
            PLUGINS => {
                while let Some(item) = cursor.next_child()? {
                    if element_name(&item) == LIST_ITEM {
                        state.plugin_data.push(read_value(cursor, &item, 0, ctx)?);
                    } else {
                        skip_unknown(cursor, &item, PLUGINS)?;
                    }
                }
            }
            MIN_EVENT_DELAY => {
                let text = cursor.read_text()?;
                state.min_event_delay = parse_scalar(&text, MIN_EVENT_DELAY, ValueKind::Real64)?;
            }
            _ => skip_unknown(cursor, &child, SCRIPT_STATE)?,
        }
    }
    Ok(state)
}

fn read_variables(
    cursor: &mut XmlCursor<'_>,
    variables: &mut BTreeMap<String, TypedValue>,
    ctx: &DecodeContext<'_>,
) -> CodecResult<()> {
    while let Some(child) = cursor.next_child()? {
        if element_name(&child) != VARIABLE {
            skip_unknown(cursor, &child, VARIABLES)?;
            continue;
        }
        let name = attribute(&child, "name")?
            .ok_or_else(|| structural("<Variable> without name attribute"))?;
        let value = read_value(cursor, &child, 0, ctx)?;
        if variables.insert(name.clone(), value).is_some() {
            return Err(structural(format!("duplicate variable '{name}'")));
        }
        ctx.limits.check_variables(variables.len())?;
    }
    Ok(())
}

fn read_queue(
    cursor: &mut XmlCursor<'_>,
    queue: &mut Vec<EventRecord>,
    ctx: &DecodeContext<'_>,
) -> CodecResult<()> {
    let mut queued = 0usize;
    while let Some(child) = cursor.next_child()? {
        if element_name(&child) != ITEM {
            skip_unknown(cursor, &child, QUEUE)?;
            continue;
        }
        queued += 1;
        ctx.limits.check_queue(queued)?;
        let record = read_item(cursor, &child, ctx)?;
        if !ctx.events.is_registered(&record.name) {
            tracing::warn!(event = %record.name, "dropping unrecognized queued event");
            continue;
        }
        if ctx.events.from_record(&record).is_none() {
            tracing::debug!(event = %record.name, "queued event does not fit its signature");
        }
        queue.push(record);
    }
    Ok(())
}

fn read_item(
    cursor: &mut XmlCursor<'_>,
    start: &BytesStart<'_>,
    ctx: &DecodeContext<'_>,
) -> CodecResult<EventRecord> {
    let name =
        attribute(start, "event")?.ok_or_else(|| structural("<Item> without event attribute"))?;
    let mut record = EventRecord::new(name, Vec::new());
    while let Some(child) = cursor.next_child()? {
        match element_name(&child).as_str() {
            PARAMS => {
                while let Some(param) = cursor.next_child()? {
                    if element_name(&param) == PARAM {
                        record.params.push(read_value(cursor, &param, 0, ctx)?);
                    } else {
                        skip_unknown(cursor, &param, PARAMS)?;
                    }
                }
            }
            DETECTED => {
                while let Some(object) = cursor.next_child()? {
                    if element_name(&object) == OBJECT {
                        record.detected.push(read_object(cursor, &object)?);
                    } else {
                        skip_unknown(cursor, &object, DETECTED)?;
                    }
                }
            }
            _ => skip_unknown(cursor, &child, ITEM)?,
        }
    }
    Ok(record)
}

fn read_object(cursor: &mut XmlCursor<'_>, start: &BytesStart<'_>) -> CodecResult<DetectedInfo> {
    let mut info = DetectedInfo::default();
    if let Some(value) = vector_attribute(start, "pos")? {
        info.grab_offset = value;
    }
    if let Some(value) = attribute(start, "linkNum")? {
        info.link_number = parse_scalar(&value, "Object linkNum", ValueKind::Integer32)?;
    }
    if let Some(value) = attribute(start, "group")? {
        info.group = parse_key(&value, "Object group")?;
    }
    if let Some(value) = attribute(start, "name")? {
        info.name = value;
    }
    if let Some(value) = attribute(start, "owner")? {
        info.owner = parse_key(&value, "Object owner")?;
    }
    if let Some(value) = vector_attribute(start, "position")? {
        info.position = value;
    }
    if let Some(value) = attribute(start, "rotation")? {
        info.rotation = Quaternion::parse_legacy(&value).ok_or_else(|| {
            type_mismatch("Object rotation", ValueKind::Quaternion, format!("'{value}'"))
        })?;
    }
    if let Some(value) = attribute(start, "type")? {
        let bits = parse_scalar(&value, "Object type", ValueKind::Integer32)?;
        info.obj_type = ObjectType::from_bits_retain(bits);
    }
    if let Some(value) = vector_attribute(start, "velocity")? {
        info.velocity = value;
    }
    if let Some(value) = vector_attribute(start, "touchST")? {
        info.touch_st = value;
    }
    if let Some(value) = vector_attribute(start, "touchUV")? {
        info.touch_uv = value;
    }
    if let Some(value) = vector_attribute(start, "touchBinormal")? {
        info.touch_binormal = value;
    }
    if let Some(value) = vector_attribute(start, "touchPos")? {
        info.touch_position = value;
    }
    if let Some(value) = attribute(start, "touchFace")? {
        info.touch_face = parse_scalar(&value, "Object touchFace", ValueKind::Integer32)?;
    }
    info.key = parse_key(&cursor.read_text()?, OBJECT)?;
    Ok(info)
}

fn read_permissions(start: &BytesStart<'_>) -> CodecResult<PermsGrant> {
    let granter = attribute(start, "granter")?
        .ok_or_else(|| structural("<Permissions> without granter attribute"))?;
    let mask = attribute(start, "mask")?
        .ok_or_else(|| structural("<Permissions> without mask attribute"))?;
    Ok(PermsGrant {
        granter: parse_key(&granter, "Permissions granter")?,
        mask: parse_scalar(&mask, "Permissions mask", ValueKind::Integer32)?,
    })
}

/// Reads a typed value element (`Variable`, `Param`, `ListItem`) through its end tag.
fn read_value(
    cursor: &mut XmlCursor<'_>,
    start: &BytesStart<'_>,
    depth: usize,
    ctx: &DecodeContext<'_>,
) -> CodecResult<TypedValue> {
    let element = element_name(start);
    let type_name = attribute(start, "type")?
        .ok_or_else(|| structural(format!("<{element}> without type attribute")))?;

    let Some(kind) = ValueKind::from_legacy_name(&type_name) else {
        if !ctx.registry.contains(&type_name) {
            return Err(CodecError::UnknownType(type_name));
        }
        let text = cursor.read_text()?;
        let bytes = hex::decode(text.trim())
            .map_err(|err| type_mismatch(element.as_str(), "hex blob", err))?;
        ctx.limits.check_blob(bytes.len())?;
        ctx.registry.verify(&type_name, &bytes)?;
        return Ok(TypedValue::OpaqueBlob { type_name, bytes });
    };

    if kind == ValueKind::List {
        ctx.limits.check_depth(depth + 1)?;
        let mut items = Vec::new();
        while let Some(child) = cursor.next_child()? {
            if element_name(&child) == LIST_ITEM {
                items.push(read_value(cursor, &child, depth + 1, ctx)?);
            } else {
                skip_unknown(cursor, &child, LIST_ITEM)?;
            }
        }
        return Ok(TypedValue::List(items));
    }

    let text = cursor.read_text()?;
    let value = match kind {
        ValueKind::Integer32 => TypedValue::Integer32(parse_scalar(&text, &element, kind)?),
        ValueKind::Integer64 => TypedValue::Integer64(parse_scalar(&text, &element, kind)?),
        ValueKind::Real64 => TypedValue::Real64(parse_scalar(&text, &element, kind)?),
        ValueKind::Text => {
            ctx.limits.check_text(text.len())?;
            TypedValue::Text(text)
        }
        ValueKind::EntityKey => TypedValue::EntityKey(parse_key(&text, &element)?),
        ValueKind::Vector3 => TypedValue::Vector3(
            Vector3::parse_legacy(&text)
                .ok_or_else(|| type_mismatch(element.as_str(), kind, format!("'{text}'")))?,
        ),
        ValueKind::Quaternion => TypedValue::Quaternion(
            Quaternion::parse_legacy(&text)
                .ok_or_else(|| type_mismatch(element.as_str(), kind, format!("'{text}'")))?,
        ),
        ValueKind::List | ValueKind::OpaqueBlob => {
            return Err(structural(format!("<{element}> has no scalar form for {kind}")))
        }
    };
    Ok(value)
}

fn read_text_value(cursor: &mut XmlCursor<'_>, ctx: &DecodeContext<'_>) -> CodecResult<String> {
    let text = cursor.read_text()?;
    ctx.limits.check_text(text.len())?;
    Ok(text)
}

fn skip_unknown(
    cursor: &mut XmlCursor<'_>,
    start: &BytesStart<'_>,
    scope: &str,
) -> CodecResult<()> {
    tracing::debug!(element = %element_name(start), scope, "skipping unknown xml element");
    cursor.skip(start)
}

pub(crate) fn attribute(start: &BytesStart<'_>, key: &str) -> CodecResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn vector_attribute(start: &BytesStart<'_>, key: &str) -> CodecResult<Option<Vector3>> {
    match attribute(start, key)? {
        Some(value) => Vector3::parse_legacy(&value).map(Some).ok_or_else(|| {
            type_mismatch(format!("Object {key}"), ValueKind::Vector3, format!("'{value}'"))
        }),
        None => Ok(None),
    }
}

fn parse_scalar<T: FromStr>(text: &str, context: &str, expected: ValueKind) -> CodecResult<T> {
    text.trim()
        .parse()
        .map_err(|_| type_mismatch(context, expected, format!("'{text}'")))
}

fn parse_key(text: &str, context: &str) -> CodecResult<Uuid> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Uuid::nil());
    }
    Uuid::parse_str(text)
        .map_err(|_| type_mismatch(context, ValueKind::EntityKey, format!("'{text}'")))
}

fn parse_running(text: &str) -> CodecResult<bool> {
    match text.trim() {
        value if value.eq_ignore_ascii_case("true") => Ok(true),
        value if value.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(type_mismatch(RUNNING, "True or False", format!("'{other}'"))),
    }
}

#[cfg(test)]
#[path = "../tests/xml_tests.rs"]
mod tests;
