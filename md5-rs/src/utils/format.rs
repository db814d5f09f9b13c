//! Formatting utilities

use md5_model::BoundingBox;
use glam::Vec3;

/// Format a vector as `( x y z )`, the way MD5 files write tuples
pub fn format_vec3(v: Vec3) -> String {
    format!("( {} {} {} )", trim_float(v.x), trim_float(v.y), trim_float(v.z))
}

/// Format a bounding box as `min .. max`
pub fn format_bounds(bounds: &BoundingBox) -> String {
    if bounds.is_empty() {
        "empty".to_string()
    } else {
        format!("{} .. {}", format_vec3(bounds.min), format_vec3(bounds.max))
    }
}

/// Format a duration in seconds
pub fn format_seconds(seconds: f32) -> String {
    format!("{seconds:.3}s")
}

/// Format a fraction as a percentage
pub fn format_percentage(value: f32) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Print floats with at most four decimals and no trailing zeros
fn trim_float(value: f32) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
