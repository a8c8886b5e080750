//! Integration tests for fxrig-platform control mapping.
//!
//! Drives a [`ControlMapper`] from persisted links, posts through the event
//! queue and applies the drained events to a real parameter set, the way the
//! audio thread does.

use fxrig_core::{
    EventQueue, ParamDesc, ParamDomain, ParamEvent, ParamKey, ParamStateSet, ParamStateSetBuilder,
    ParamUnit,
};
use fxrig_platform::{
    ControlCurve, ControlError, ControlMapper, ControlSource, ControlTarget, CtrlLink, CtrlUnit,
};

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK: usize = 64;

fn delay_params() -> (ParamStateSet, ParamKey, ParamKey) {
    let mut b = ParamStateSetBuilder::new();
    let time = b.add(ParamDesc::log("Time", 1.0, 2000.0, ParamUnit::Milliseconds).with_default(0.5));
    let mix = b.add(ParamDesc::linear("Mix", 0.0, 100.0, ParamUnit::Percent).with_ramp_time(0.0));
    let mut params = b.build();
    params.set_sample_rate(SAMPLE_RATE);
    (params, time, mix)
}

fn apply(params: &mut ParamStateSet, events: &[ParamEvent]) {
    for ev in events {
        params.set_target(ev.key, ev.value).unwrap();
    }
}

// ============================================================================
// Links to events to parameter values
// ============================================================================

#[test]
fn pedal_link_drives_parameter_to_target() {
    let (mut params, _time, mix) = delay_params();
    let (tx, rx) = EventQueue::bounded(16);
    let mut mapper = ControlMapper::new();

    let link: CtrlLink = toml::from_str(
        r#"
        source = { kind = "pedal", index = 0 }
        abs = true
        curve = "slow"
        "#,
    )
    .unwrap();
    mapper
        .bind_link(ControlTarget::new(0, mix), ParamDomain::Unipolar, &link)
        .unwrap();

    mapper.handle(ControlSource::pedal(0), 0.5, &tx).unwrap();
    let mut events = Vec::with_capacity(16);
    rx.drain_into(&mut events);
    apply(&mut params, &events);
    params.process_block(BLOCK);

    assert!((params.get_val_end_nat(mix) - 25.0).abs() < 1e-3);
}

#[test]
fn encoder_steps_ramp_the_parameter() {
    let (mut params, time, _mix) = delay_params();
    let (tx, rx) = EventQueue::bounded(16);
    let mut mapper = ControlMapper::new();
    let enc = ControlSource::rotenc(1);
    let target = ControlTarget::new(0, time);

    let mut unit = CtrlUnit::new(enc, true);
    unit.set_step(0.1).unwrap();
    mapper.bind(target, ParamDomain::Unipolar, unit).unwrap();
    mapper
        .set_base(target, params.get_val_end_nrm(time))
        .unwrap();

    mapper.handle(enc, 1.0, &tx).unwrap();
    let mut events = Vec::with_capacity(16);
    rx.drain_into(&mut events);
    assert!((events[0].value - 0.6).abs() < 1e-5);

    apply(&mut params, &events);
    params.process_block(BLOCK);
    assert!(params.state(time).is_ramping());
    for _ in 0..16 {
        params.process_block(BLOCK);
    }
    assert!((params.get_val_end_nrm(time) - 0.6).abs() < 1e-5);
}

#[test]
fn bipolar_parameter_with_u2b_link() {
    let mut b = ParamStateSetBuilder::new();
    let pan = b.add(ParamDesc::linear("Pan", -1.0, 1.0, ParamUnit::None).bipolar());
    let mut params = b.build();
    params.set_sample_rate(SAMPLE_RATE);

    let (tx, rx) = EventQueue::bounded(4);
    let mut mapper = ControlMapper::new();
    let link = CtrlLink {
        u2b: true,
        ..CtrlLink::new(ControlSource::pot(4), true)
    };
    mapper
        .bind_link(ControlTarget::new(0, pan), ParamDomain::Bipolar, &link)
        .unwrap();

    mapper.handle(ControlSource::pot(4), 0.0, &tx).unwrap();
    let mut events = Vec::with_capacity(4);
    rx.drain_into(&mut events);
    assert_eq!(events[0].value, -1.0);
}

// ============================================================================
// Link validation
// ============================================================================

#[test]
fn invalid_link_is_not_bound() {
    let mut mapper = ControlMapper::new();
    let link = CtrlLink {
        step: 0.0,
        ..CtrlLink::new(ControlSource::rotenc(0), true)
    };
    assert_eq!(
        mapper.bind_link(
            ControlTarget::new(0, ParamKey::global(0)),
            ParamDomain::Unipolar,
            &link
        ),
        Err(ControlError::InvalidStep(0.0))
    );
    assert!(mapper.is_empty());
}

#[test]
fn persisted_link_detects_material_changes() {
    let mut unit = CtrlUnit::new(ControlSource::pedal(0), true);
    unit.curve = ControlCurve::S1;
    unit.set_notches([0.25, 0.75]);
    let stored = unit.to_link();

    let mut reloaded = CtrlUnit::from_link(&stored).unwrap();
    assert!(unit.is_similar(&reloaded));

    reloaded.base = 0.1;
    assert!(!unit.is_similar(&reloaded));
}
