//! Protobuf schema of the telemetry message the dashcam firmware embeds in SEI units.
//!
//! Declared with prost's derive macros so no `protoc` is needed at build time. Field numbers
//! follow the firmware's `dashcam.proto`.

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SeiMetadata {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(enumeration = "sei_metadata::Gear", tag = "2")]
    pub gear_state: i32,
    #[prost(uint64, tag = "3")]
    pub frame_seq_no: u64,
    #[prost(float, tag = "4")]
    pub vehicle_speed_mps: f32,
    #[prost(float, tag = "5")]
    pub accelerator_pedal_position: f32,
    #[prost(float, tag = "6")]
    pub steering_wheel_angle: f32,
    #[prost(bool, tag = "7")]
    pub blinker_on_left: bool,
    #[prost(bool, tag = "8")]
    pub blinker_on_right: bool,
    #[prost(bool, tag = "9")]
    pub brake_applied: bool,
    #[prost(enumeration = "sei_metadata::AutopilotState", tag = "10")]
    pub autopilot_state: i32,
    #[prost(double, tag = "11")]
    pub latitude_deg: f64,
    #[prost(double, tag = "12")]
    pub longitude_deg: f64,
    #[prost(double, tag = "13")]
    pub heading_deg: f64,
    #[prost(double, tag = "14")]
    pub linear_acceleration_mps2_x: f64,
    #[prost(double, tag = "15")]
    pub linear_acceleration_mps2_y: f64,
    #[prost(double, tag = "16")]
    pub linear_acceleration_mps2_z: f64,
}

/// Nested message and enum types in `SeiMetadata`.
pub mod sei_metadata {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Gear {
        Park = 0,
        Drive = 1,
        Reverse = 2,
        Neutral = 3,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum AutopilotState {
        Disengaged = 0,
        SelfDriving = 1,
        Autosteer = 2,
        Tacc = 3,
    }
}
