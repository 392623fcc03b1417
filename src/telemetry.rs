use serde::Serialize;

use crate::decode::{RawTelemetry, SeqValue};

pub const MPS_TO_MPH: f64 = 2.23694;
pub const MPS_TO_KPH: f64 = 3.6;
pub const STANDARD_GRAVITY: f64 = 9.80665;

const MAX_SPEED_MPS: f64 = 100.0;
const MAX_STEERING_DEG: f64 = 720.0;
const MAX_LINEAR_ACCEL: f64 = 50.0;
const MAX_GEAR_STATE: u8 = 3;
const MAX_AUTOPILOT_STATE: u8 = 10;

const GEAR_NAMES: [&str; 4] = ["P", "D", "R", "N"];
const AUTOPILOT_NAMES: [&str; 4] = ["NONE", "SELF_DRIVING", "AUTOSTEER", "TACC"];

/// One frame's worth of sanitized telemetry.
///
/// Every numeric field is finite and inside its plausible range; values that were missing or
/// implausible on the wire hold their fallback (0 / `false`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub version: u32,
    /// Firmware frame counter, monotonically increasing across a drive.
    pub frame_seq_no: u64,
    /// 0 park, 1 drive, 2 reverse, 3 neutral.
    pub gear_state: u8,
    pub vehicle_speed_mps: f64,
    pub speed_mph: f64,
    pub speed_kph: f64,
    pub steering_wheel_angle_deg: f64,
    /// Fraction of full travel, 0..=1.
    pub accelerator_pedal_position: f64,
    pub blinker_on_left: bool,
    pub blinker_on_right: bool,
    pub brake_applied: bool,
    pub autopilot_state: u8,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub heading_deg: f64,
    pub linear_acceleration_mps2_x: f64,
    pub linear_acceleration_mps2_y: f64,
    pub linear_acceleration_mps2_z: f64,
    pub g_force_x: f64,
    pub g_force_y: f64,
    pub g_force_z: f64,
    /// Position of the carrying frame in stream order.
    pub frame_index: usize,
}

impl TelemetryRecord {
    pub fn gear_name(&self) -> &'static str {
        gear_name(self.gear_state)
    }

    pub fn autopilot_name(&self) -> &'static str {
        autopilot_name(self.autopilot_state)
    }

    pub(crate) fn with_frame_index(mut self, frame_index: usize) -> Self {
        self.frame_index = frame_index;
        self
    }
}

pub fn gear_name(code: u8) -> &'static str {
    GEAR_NAMES.get(usize::from(code)).copied().unwrap_or("P")
}

/// States 4..=10 exist in newer firmware but carry no overlay label.
pub fn autopilot_name(code: u8) -> &'static str {
    AUTOPILOT_NAMES
        .get(usize::from(code))
        .copied()
        .unwrap_or("NONE")
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite())
}

fn clamp_or_zero(v: Option<f64>, min: f64, max: f64) -> f64 {
    finite(v).map_or(0.0, |v| v.clamp(min, max))
}

fn within_or_zero(v: Option<f64>, min: f64, max: f64) -> f64 {
    finite(v).filter(|v| (min..=max).contains(v)).unwrap_or(0.0)
}

fn state_code(v: Option<f64>, max: u8) -> u8 {
    finite(v)
        .filter(|v| v.fract() == 0.0 && (0.0..=f64::from(max)).contains(v))
        .map_or(0, |v| v as u8)
}

fn pedal_fraction(v: Option<f64>) -> f64 {
    // Some firmware reports percent.
    finite(v).map_or(0.0, |v| {
        let v = if v > 1.0 { v / 100.0 } else { v };
        v.clamp(0.0, 1.0)
    })
}

/// Bring raw telemetry into plausible ranges and derive the convenience units.
///
/// Continuous quantities are clamped; coordinates and heading outside their domain, gear and
/// autopilot codes outside their tables fall back to 0. The result has `frame_index` 0.
pub fn sanitize(raw: &RawTelemetry) -> TelemetryRecord {
    let speed = clamp_or_zero(raw.vehicle_speed_mps, 0.0, MAX_SPEED_MPS);
    let accel_x = clamp_or_zero(raw.linear_acceleration_mps2_x, -MAX_LINEAR_ACCEL, MAX_LINEAR_ACCEL);
    let accel_y = clamp_or_zero(raw.linear_acceleration_mps2_y, -MAX_LINEAR_ACCEL, MAX_LINEAR_ACCEL);
    let accel_z = clamp_or_zero(raw.linear_acceleration_mps2_z, -MAX_LINEAR_ACCEL, MAX_LINEAR_ACCEL);

    TelemetryRecord {
        version: finite(raw.version)
            .filter(|v| (0.0..=f64::from(u32::MAX)).contains(v))
            .map_or(0, |v| v as u32),
        frame_seq_no: raw
            .frame_seq_no
            .as_ref()
            .and_then(SeqValue::to_u64)
            .unwrap_or(0),
        gear_state: state_code(raw.gear_state, MAX_GEAR_STATE),
        vehicle_speed_mps: speed,
        speed_mph: speed * MPS_TO_MPH,
        speed_kph: speed * MPS_TO_KPH,
        steering_wheel_angle_deg: clamp_or_zero(
            raw.steering_wheel_angle,
            -MAX_STEERING_DEG,
            MAX_STEERING_DEG,
        ),
        accelerator_pedal_position: pedal_fraction(raw.accelerator_pedal_position),
        blinker_on_left: raw.blinker_on_left.unwrap_or(false),
        blinker_on_right: raw.blinker_on_right.unwrap_or(false),
        brake_applied: raw.brake_applied.unwrap_or(false),
        autopilot_state: state_code(raw.autopilot_state, MAX_AUTOPILOT_STATE),
        latitude_deg: within_or_zero(raw.latitude_deg, -90.0, 90.0),
        longitude_deg: within_or_zero(raw.longitude_deg, -180.0, 180.0),
        heading_deg: within_or_zero(raw.heading_deg, 0.0, 360.0),
        linear_acceleration_mps2_x: accel_x,
        linear_acceleration_mps2_y: accel_y,
        linear_acceleration_mps2_z: accel_z,
        g_force_x: accel_x / STANDARD_GRAVITY,
        g_force_y: accel_y / STANDARD_GRAVITY,
        g_force_z: accel_z / STANDARD_GRAVITY,
        frame_index: 0,
    }
}

impl From<&TelemetryRecord> for RawTelemetry {
    fn from(r: &TelemetryRecord) -> Self {
        RawTelemetry {
            version: Some(f64::from(r.version)),
            gear_state: Some(f64::from(r.gear_state)),
            frame_seq_no: Some(SeqValue::Int(r.frame_seq_no)),
            vehicle_speed_mps: Some(r.vehicle_speed_mps),
            accelerator_pedal_position: Some(r.accelerator_pedal_position),
            steering_wheel_angle: Some(r.steering_wheel_angle_deg),
            blinker_on_left: Some(r.blinker_on_left),
            blinker_on_right: Some(r.blinker_on_right),
            brake_applied: Some(r.brake_applied),
            autopilot_state: Some(f64::from(r.autopilot_state)),
            latitude_deg: Some(r.latitude_deg),
            longitude_deg: Some(r.longitude_deg),
            heading_deg: Some(r.heading_deg),
            linear_acceleration_mps2_x: Some(r.linear_acceleration_mps2_x),
            linear_acceleration_mps2_y: Some(r.linear_acceleration_mps2_y),
            linear_acceleration_mps2_z: Some(r.linear_acceleration_mps2_z),
        }
    }
}
