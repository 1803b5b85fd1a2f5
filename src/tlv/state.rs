use std::collections::BTreeMap;

use uuid::Uuid;

use crate::codec::DecodeContext;
use crate::error::{structural, type_mismatch, CodecResult};
use crate::event::{DetectedInfo, EventRecord, ObjectType};
use crate::state::{PermsGrant, ScriptState};
use crate::value::{Quaternion, TypedValue, ValueKind, Vector3};

use super::tags;
use super::{Header, TlvReader, TlvWriter};

/// Encodes the state's records, terminated by the top-level End marker.
pub fn encode_body(state: &ScriptState) -> CodecResult<Vec<u8>> {
    let mut writer = TlvWriter::new();
    writer.write_text(tags::CURRENT_STATE, &state.current_state)?;
    writer.write_i32(tags::IS_RUNNING, i32::from(state.is_running))?;
    writer.write_i32(tags::START_PARAMETER, state.start_parameter)?;

    if !state.variables.is_empty() {
        let mut variables = writer.begin_nested(tags::VARIABLES);
        for (name, value) in &state.variables {
            let mut variable = variables.begin_nested(tags::VARIABLE);
            variable.write_text(tags::VAR_NAME, name)?;
            variable.write_value(tags::VAR_VALUE, value)?;
        }
    }

    for record in &state.event_queue {
        let mut item = writer.begin_nested(tags::QUEUE);
        item.write_text(tags::EVENT_NAME, &record.name)?;
        {
            let mut params = item.begin_nested(tags::PARAMS);
            for param in &record.params {
                params.write_value(tags::PARAM_VALUE, param)?;
            }
        }
        for detected in &record.detected {
            let mut block = item.begin_nested(tags::DETECTED);
            write_detected(&mut block, detected)?;
        }
    }

    if let Some(grant) = &state.perms_granter {
        writer.write_i32(tags::PERMS_GRANTER_MASK, grant.mask)?;
        writer.write_key(tags::PERMS_GRANTER_ID, &grant.granter)?;
    }

    if !state.plugin_data.is_empty() {
        let mut plugins = writer.begin_nested(tags::PLUGIN_DATA);
        for value in &state.plugin_data {
            plugins.write_value(tags::PLUGIN_VALUE, value)?;
        }
    }

    writer.write_f64(tags::MIN_EVENT_DELAY, state.min_event_delay)?;
    writer.finish()
}

fn write_detected(writer: &mut TlvWriter, detected: &DetectedInfo) -> CodecResult<()> {
    writer.write_key(tags::DETECTED_KEY, &detected.key)?;
    writer.write_key(tags::DETECTED_OWNER, &detected.owner)?;
    writer.write_key(tags::DETECTED_GROUP, &detected.group)?;
    writer.write_text(tags::DETECTED_NAME, &detected.name)?;
    writer.write_i32(tags::DETECTED_OBJ_TYPE, detected.obj_type.bits())?;
    writer.write_value(tags::DETECTED_POSITION, &detected.position.into())?;
    writer.write_value(tags::DETECTED_VELOCITY, &detected.velocity.into())?;
    writer.write_value(tags::DETECTED_ROTATION, &detected.rotation.into())?;
    writer.write_value(tags::DETECTED_GRAB_OFFSET, &detected.grab_offset.into())?;
    writer.write_i32(tags::DETECTED_LINK_NUMBER, detected.link_number)?;
    writer.write_i32(tags::DETECTED_TOUCH_FACE, detected.touch_face)?;
    writer.write_value(tags::DETECTED_TOUCH_ST, &detected.touch_st.into())?;
    writer.write_value(tags::DETECTED_TOUCH_UV, &detected.touch_uv.into())?;
    writer.write_value(tags::DETECTED_TOUCH_BINORMAL, &detected.touch_binormal.into())?;
    writer.write_value(tags::DETECTED_TOUCH_POSITION, &detected.touch_position.into())?;
    Ok(())
}

/// Decodes a complete record stream. Fails as a whole on any error.
pub fn decode_body(
    input: &[u8],
    item_id: Uuid,
    asset_id: Uuid,
    ctx: &DecodeContext<'_>,
) -> CodecResult<ScriptState> {
    let mut reader = TlvReader::new(input);
    let mut current_state = None;
    let mut is_running = None;
    let mut start_parameter = None;
    let mut min_event_delay = None;
    let mut perms_mask = None;
    let mut perms_id = None;
    let mut variables = BTreeMap::new();
    let mut event_queue = Vec::new();
    let mut plugin_data = Vec::new();
    let mut queued = 0usize;

    loop {
        let header = reader.try_read_header()?;
        let Some(tag) = header.tag() else {
            break;
        };
        match tag {
            tags::CURRENT_STATE => {
                let value = text(&mut reader, &header, ctx)?;
                set_once(&mut current_state, value, "CurrentState")?;
            }
            tags::IS_RUNNING => {
                let running = match int(&mut reader, &header, ctx)? {
                    0 => false,
                    1 => true,
                    other => return Err(type_mismatch("IsRunning", "0 or 1", other)),
                };
                set_once(&mut is_running, running, "IsRunning")?;
            }
            tags::START_PARAMETER => {
                let value = int(&mut reader, &header, ctx)?;
                set_once(&mut start_parameter, value, "StartParameter")?;
            }
            tags::MIN_EVENT_DELAY => {
                let value = real(&mut reader, &header, ctx)?;
                set_once(&mut min_event_delay, value, "MinEventDelay")?;
            }
            tags::PERMS_GRANTER_MASK => {
                let value = int(&mut reader, &header, ctx)?;
                set_once(&mut perms_mask, value, "PermsGranterMask")?;
            }
            tags::PERMS_GRANTER_ID => {
                let value = key(&mut reader, &header, ctx)?;
                set_once(&mut perms_id, value, "PermsGranterID")?;
            }
            tags::VARIABLES => {
                let mut block = reader.nested(&header)?;
                read_variables(&mut block, &mut variables, ctx)?;
            }
            tags::QUEUE => {
                queued += 1;
                ctx.limits.check_queue(queued)?;
                let mut block = reader.nested(&header)?;
                let record = read_event(&mut block, ctx)?;
                if !ctx.events.is_registered(&record.name) {
                    tracing::warn!(event = %record.name, "dropping unrecognized queued event");
                    continue;
                }
                if ctx.events.from_record(&record).is_none() {
                    tracing::debug!(
                        event = %record.name,
                        "queued event does not fit its signature"
                    );
                }
                event_queue.push(record);
            }
            tags::PLUGIN_DATA => {
                let mut block = reader.nested(&header)?;
                read_repeated_values(&mut block, tags::PLUGIN_VALUE, &mut plugin_data, ctx)?;
            }
            _ => skip_unknown(&mut reader, &header, ctx, "state")?,
        }
    }

    let perms_granter = match (perms_mask, perms_id) {
        (Some(mask), Some(granter)) => Some(PermsGrant { granter, mask }),
        (None, None) => None,
        _ => return Err(structural("permission grant needs both mask and granter")),
    };

    Ok(ScriptState {
        item_id,
        asset_id,
        current_state: required(current_state, "CurrentState")?,
        is_running: required(is_running, "IsRunning")?,
        start_parameter: required(start_parameter, "StartParameter")?,
        variables,
        event_queue,
        perms_granter,
        plugin_data,
        min_event_delay: required(min_event_delay, "MinEventDelay")?,
    })
}

fn read_variables(
    reader: &mut TlvReader<'_>,
    variables: &mut BTreeMap<String, TypedValue>,
    ctx: &DecodeContext<'_>,
) -> CodecResult<()> {
    loop {
        let header = reader.try_read_header()?;
        match header.tag() {
            None => return Ok(()),
            Some(tags::VARIABLE) => {
                let mut block = reader.nested(&header)?;
                let mut name = None;
                let mut value = None;
                loop {
                    let field = block.try_read_header()?;
                    match field.tag() {
                        None => break,
                        Some(tags::VAR_NAME) => {
                            set_once(&mut name, text(&mut block, &field, ctx)?, "VarName")?
                        }
                        Some(tags::VAR_VALUE) => {
                            set_once(&mut value, block.read_any(&field, ctx)?, "VarValue")?
                        }
                        Some(_) => skip_unknown(&mut block, &field, ctx, "variable")?,
                    }
                }
                let name = required(name, "VarName")?;
                let value = required(value, "VarValue")?;
                if variables.insert(name.clone(), value).is_some() {
                    return Err(structural(format!("duplicate variable '{name}'")));
                }
                ctx.limits.check_variables(variables.len())?;
            }
            Some(_) => skip_unknown(reader, &header, ctx, "variables")?,
        }
    }
}

fn read_event(reader: &mut TlvReader<'_>, ctx: &DecodeContext<'_>) -> CodecResult<EventRecord> {
    let mut name = None;
    let mut params = Vec::new();
    let mut detected = Vec::new();
    loop {
        let header = reader.try_read_header()?;
        match header.tag() {
            None => break,
            Some(tags::EVENT_NAME) => {
                set_once(&mut name, text(reader, &header, ctx)?, "EventName")?
            }
            Some(tags::PARAMS) => {
                let mut block = reader.nested(&header)?;
                read_repeated_values(&mut block, tags::PARAM_VALUE, &mut params, ctx)?;
            }
            Some(tags::DETECTED) => {
                let mut block = reader.nested(&header)?;
                detected.push(read_detected(&mut block, ctx)?);
            }
            Some(_) => skip_unknown(reader, &header, ctx, "queued event")?,
        }
    }
    Ok(EventRecord {
        name: required(name, "EventName")?,
        params,
        detected,
    })
}

fn read_detected(reader: &mut TlvReader<'_>, ctx: &DecodeContext<'_>) -> CodecResult<DetectedInfo> {
    let mut key_seen = false;
    let mut info = DetectedInfo::default();
    loop {
        let header = reader.try_read_header()?;
        let Some(tag) = header.tag() else {
            break;
        };
        match tag {
            tags::DETECTED_KEY => {
                info.key = key(reader, &header, ctx)?;
                key_seen = true;
            }
            tags::DETECTED_OWNER => info.owner = key(reader, &header, ctx)?,
            tags::DETECTED_GROUP => info.group = key(reader, &header, ctx)?,
            tags::DETECTED_NAME => info.name = text(reader, &header, ctx)?,
            tags::DETECTED_OBJ_TYPE => {
                info.obj_type = ObjectType::from_bits_retain(int(reader, &header, ctx)?)
            }
            tags::DETECTED_POSITION => info.position = vector(reader, &header, ctx)?,
            tags::DETECTED_VELOCITY => info.velocity = vector(reader, &header, ctx)?,
            tags::DETECTED_ROTATION => info.rotation = rotation(reader, &header, ctx)?,
            tags::DETECTED_GRAB_OFFSET => info.grab_offset = vector(reader, &header, ctx)?,
            tags::DETECTED_LINK_NUMBER => info.link_number = int(reader, &header, ctx)?,
            tags::DETECTED_TOUCH_FACE => info.touch_face = int(reader, &header, ctx)?,
            tags::DETECTED_TOUCH_ST => info.touch_st = vector(reader, &header, ctx)?,
            tags::DETECTED_TOUCH_UV => info.touch_uv = vector(reader, &header, ctx)?,
            tags::DETECTED_TOUCH_BINORMAL => info.touch_binormal = vector(reader, &header, ctx)?,
            tags::DETECTED_TOUCH_POSITION => info.touch_position = vector(reader, &header, ctx)?,
            _ => skip_unknown(reader, &header, ctx, "detected entry")?,
        }
    }
    if !key_seen {
        return Err(structural("detected entry without key"));
    }
    Ok(info)
}

fn read_repeated_values(
    reader: &mut TlvReader<'_>,
    item_tag: u16,
    out: &mut Vec<TypedValue>,
    ctx: &DecodeContext<'_>,
) -> CodecResult<()> {
    loop {
        let header = reader.try_read_header()?;
        match header.tag() {
            None => return Ok(()),
            Some(tag) if tag == item_tag => out.push(reader.read_any(&header, ctx)?),
            Some(_) => skip_unknown(reader, &header, ctx, "value list")?,
        }
    }
}

fn skip_unknown(
    reader: &mut TlvReader<'_>,
    header: &Header,
    ctx: &DecodeContext<'_>,
    scope: &str,
) -> CodecResult<()> {
    let tag = header.tag().unwrap_or(0);
    if ctx.limits.reject_unknown_tags {
        return Err(structural(format!("unknown tag {tag} in {scope}")));
    }
    tracing::debug!(tag, scope, "skipping unknown tlv record");
    reader.skip(header)
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> CodecResult<()> {
    if slot.replace(value).is_some() {
        return Err(structural(format!("duplicate {field} record")));
    }
    Ok(())
}

fn required<T>(slot: Option<T>, field: &str) -> CodecResult<T> {
    slot.ok_or_else(|| structural(format!("missing {field} record")))
}

fn int(reader: &mut TlvReader<'_>, header: &Header, ctx: &DecodeContext<'_>) -> CodecResult<i32> {
    match reader.read_value(header, ValueKind::Integer32, ctx)? {
        TypedValue::Integer32(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::Integer32, other.kind())),
    }
}

fn real(reader: &mut TlvReader<'_>, header: &Header, ctx: &DecodeContext<'_>) -> CodecResult<f64> {
    match reader.read_value(header, ValueKind::Real64, ctx)? {
        TypedValue::Real64(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::Real64, other.kind())),
    }
}

fn text(
    reader: &mut TlvReader<'_>,
    header: &Header,
    ctx: &DecodeContext<'_>,
) -> CodecResult<String> {
    match reader.read_value(header, ValueKind::Text, ctx)? {
        TypedValue::Text(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::Text, other.kind())),
    }
}

fn key(reader: &mut TlvReader<'_>, header: &Header, ctx: &DecodeContext<'_>) -> CodecResult<Uuid> {
    match reader.read_value(header, ValueKind::EntityKey, ctx)? {
        TypedValue::EntityKey(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::EntityKey, other.kind())),
    }
}

fn vector(
    reader: &mut TlvReader<'_>,
    header: &Header,
    ctx: &DecodeContext<'_>,
) -> CodecResult<Vector3> {
    match reader.read_value(header, ValueKind::Vector3, ctx)? {
        TypedValue::Vector3(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::Vector3, other.kind())),
    }
}

fn rotation(
    reader: &mut TlvReader<'_>,
    header: &Header,
    ctx: &DecodeContext<'_>,
) -> CodecResult<Quaternion> {
    match reader.read_value(header, ValueKind::Quaternion, ctx)? {
        TypedValue::Quaternion(value) => Ok(value),
        other => Err(type_mismatch("scalar", ValueKind::Quaternion, other.kind())),
    }
}
