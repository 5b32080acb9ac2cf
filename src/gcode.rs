// src/gcode.rs - The one firmware command this crate emits
/// Formats the command that sets the heated-bed target temperature. `M140`
/// applies the target without waiting for it to be reached; a target of 0
/// turns the heater off.
pub fn set_bed_temperature(celsius: i32) -> String {
    format!("M140 S{celsius}")
}
