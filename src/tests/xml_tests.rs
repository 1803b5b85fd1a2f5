use super::*;

use crate::error::ErrorCategory;
use crate::registry::TypeRegistry;
use crate::resource::DecodeLimits;
use crate::translate::{EventTranslator, ScriptEvent};

const ITEM: Uuid = Uuid::from_u128(0xa1);
const ASSET: Uuid = Uuid::from_u128(0xb2);

struct Fixture {
    registry: TypeRegistry,
    events: EventTranslator,
    limits: DecodeLimits,
}

impl Fixture {
    fn new() -> Self {
        Self {
            registry: TypeRegistry::builder()
                .register_raw("Test.Blob", |_| Ok(()))
                .build(),
            events: EventTranslator::default(),
            limits: DecodeLimits::default(),
        }
    }

    fn ctx(&self) -> DecodeContext<'_> {
        DecodeContext {
            registry: &self.registry,
            events: &self.events,
            limits: &self.limits,
        }
    }

    fn read(&self, document: &str) -> CodecResult<ScriptState> {
        let mut cursor = XmlCursor::new(document);
        let root = cursor.root()?;
        assert_eq!(element_name(&root), SCRIPT_STATE);
        let state = read_body(&mut cursor, ITEM, ASSET, &self.ctx())?;
        cursor.finish()?;
        Ok(state)
    }
}

fn write(state: &ScriptState) -> String {
    let mut out = XmlWriter::new();
    write_body(&mut out, state).expect("write body");
    out.into_string().expect("utf-8")
}

const INTEGER: &str = "OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLInteger";
const STRING: &str = "OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLString";

#[test]
fn minimal_body_golden() {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.set_variable("count", 3);
    state.min_event_delay = 0.1;
    insta::assert_snapshot!(write(&state), @r#"<ScriptState><State>default</State><Running>True</Running><StartParameter>0</StartParameter><Variables><Variable name="count" type="OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLInteger">3</Variable></Variables><Queue></Queue><Plugins></Plugins><MinEventDelay>0.1</MinEventDelay></ScriptState>"#);
}

#[test]
fn permissions_are_written_only_with_a_grant() {
    let mut state = ScriptState::new(ITEM, ASSET);
    assert!(!write(&state).contains("<Permissions"));

    state.perms_granter = Some(PermsGrant {
        granter: Uuid::from_u128(3),
        mask: 1028,
    });
    let document = write(&state);
    assert!(document.contains(
        r#"<Permissions granter="00000000-0000-0000-0000-000000000003" mask="1028"/>"#
    ));
    assert_eq!(Fixture::new().read(&document).expect("read"), state);
}

#[test]
fn body_round_trips_with_escaping_and_lists() {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.is_running = false;
    state.set_variable("quote", "a < b & \"c\"");
    state.set_variable("empty", "");
    state.set_variable(
        "nested",
        vec![
            TypedValue::Integer64(-9),
            TypedValue::List(vec![TypedValue::Real64(2.5)]),
            TypedValue::Quaternion(Quaternion::new(0.0, 0.0, 0.5, 0.5)),
        ],
    );
    state.plugin_data.push(TypedValue::OpaqueBlob {
        type_name: "Test.Blob".to_string(),
        bytes: vec![0xde, 0xad],
    });
    let mut detected = DetectedInfo::new(Uuid::from_u128(77));
    detected.owner = Uuid::from_u128(78);
    detected.name = "Crate & Barrel".to_string();
    detected.obj_type = ObjectType::PASSIVE;
    detected.grab_offset = Vector3::new(0.5, 0.0, 0.0);
    detected.touch_face = 3;
    state.event_queue.push(
        EventRecord::new("collision", vec![TypedValue::Integer32(1)])
            .with_detected(vec![detected]),
    );

    let document = write(&state);
    assert!(document.contains("<Running>False</Running>"));
    assert_eq!(Fixture::new().read(&document).expect("read"), state);
}

#[test]
fn unknown_elements_and_events_are_skipped() {
    let document = format!(
        r#"<ScriptState>
            <State>default</State>
            <Running>True</Running>
            <Flavor><Deep>ignored</Deep></Flavor>
            <Variables><Variable name="n" type="{INTEGER}">5</Variable></Variables>
            <Queue>
              <Item event="teleport"><Params><Param type="{STRING}">x</Param></Params><Detected/></Item>
              <Item event="timer"><Params/><Detected/></Item>
            </Queue>
            <MinEventDelay>0.25</MinEventDelay>
          </ScriptState>"#
    );
    let state = Fixture::new().read(&document).expect("lenient read");
    assert_eq!(state.variables.get("n"), Some(&TypedValue::Integer32(5)));
    assert_eq!(state.event_queue, vec![EventRecord::new("timer", vec![])]);
    assert_eq!(state.min_event_delay, 0.25);
}

#[test]
fn legacy_items_with_text_keys_are_kept_and_resume() {
    let document = format!(
        r#"<ScriptState>
            <Queue>
              <Item event="listen"><Params>
                <Param type="{INTEGER}">0</Param>
                <Param type="{STRING}">Bob</Param>
                <Param type="{STRING}">00000000-0000-0000-0000-0000000000b0</Param>
                <Param type="{STRING}">hi</Param>
              </Params><Detected/></Item>
              <Item event="changed"><Params><Param type="{STRING}">16</Param></Params></Item>
            </Queue>
          </ScriptState>"#
    );
    let fixture = Fixture::new();
    let state = fixture.read(&document).expect("read");
    assert_eq!(state.event_queue.len(), 2);
    assert_eq!(state.event_queue[1].params, vec![TypedValue::Text("16".into())]);
    assert_eq!(
        state.resume_events(&fixture.events),
        vec![ScriptEvent::Listen {
            channel: 0,
            name: "Bob".to_string(),
            id: Uuid::from_u128(0xb0),
            message: "hi".to_string(),
        }]
    );
}

#[test]
fn legacy_aliases_are_accepted() {
    let document = r#"<ScriptState><Variables><Variable name="a" type="System.Int32">1</Variable><Variable name="b" type="System.String">two</Variable><Variable name="c" type="System.Double">3.5</Variable></Variables></ScriptState>"#;
    let state = Fixture::new().read(document).expect("read");
    assert_eq!(state.variables["a"], TypedValue::Integer32(1));
    assert_eq!(state.variables["b"], TypedValue::Text("two".into()));
    assert_eq!(state.variables["c"], TypedValue::Real64(3.5));
}

#[test]
fn unparsable_leaf_is_type_mismatch() {
    let document = format!(
        r#"<ScriptState><Variables><Variable name="n" type="{INTEGER}">five</Variable></Variables></ScriptState>"#
    );
    let err = Fixture::new().read(&document).expect_err("not an integer");
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);

    let err = Fixture::new()
        .read("<ScriptState><Running>maybe</Running></ScriptState>")
        .expect_err("not a flag");
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);
}

#[test]
fn missing_type_attribute_is_structural() {
    let err = Fixture::new()
        .read(r#"<ScriptState><Variables><Variable name="n">5</Variable></Variables></ScriptState>"#)
        .expect_err("no type");
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn unregistered_opaque_type_is_unknown_type() {
    let err = Fixture::new()
        .read(r#"<ScriptState><Plugins><ListItem type="Foreign.Type">00ff</ListItem></Plugins></ScriptState>"#)
        .expect_err("unregistered");
    assert_eq!(err.category(), ErrorCategory::UnknownType);
}

#[test]
fn broken_nesting_and_truncation_are_structural() {
    for document in [
        "<ScriptState><State>default</Running></ScriptState>",
        "<ScriptState><State>default</State>",
        "<ScriptState><Variables>",
        "",
    ] {
        let err = Fixture::new()
            .read(document)
            .expect_err("malformed document must fail");
        assert_eq!(err.category(), ErrorCategory::Structural, "{document:?}");
    }
}

#[test]
fn duplicate_variable_is_structural() {
    let document = format!(
        r#"<ScriptState><Variables><Variable name="n" type="{INTEGER}">1</Variable><Variable name="n" type="{INTEGER}">2</Variable></Variables></ScriptState>"#
    );
    let err = Fixture::new().read(&document).expect_err("duplicate");
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn real_formatting_is_shortest_round_trip() {
    assert_eq!(format_real(0.1), "0.1");
    assert_eq!(format_real(2.0), "2");
    assert_eq!(format_real(-0.000125), "-0.000125");
    let value = 1.0 / 3.0;
    assert_eq!(format_real(value).parse::<f64>().expect("parse"), value);
}
