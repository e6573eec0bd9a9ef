// ABOUTME: Thin facade over the `metrics` crate's gauge/counter API
// ABOUTME: publishing the actual Prometheus HTTP exposition endpoint is out of scope; callers install their own recorder

use metrics::{Key, Label};

/// Increment a named counter by one, with the given labels.
pub fn increment_counter(name: &'static str, labels: Vec<Label>) {
    let key = Key::from_parts(name, labels);
    metrics::counter!(key).increment(1);
}

/// Set a named gauge to `value`, with the given labels.
pub fn set_gauge(name: impl Into<String>, labels: Vec<Label>, value: f64) {
    let key = Key::from_parts(name.into(), labels);
    metrics::gauge!(key).set(value);
}

/// Build the single `name` label every metric in this crate carries.
pub fn name_label(monitor_name: &str) -> Label {
    Label::new("name", monitor_name.to_string())
}

/// Publish a device-info record as a gauge fixed at 1 with the info fields
/// folded into labels -- the `metrics` facade has no dedicated Info type
/// the way `prometheus_client.Info` does.
pub fn set_device_info(monitor_name: &str, device: &str, fields: &[(String, String)]) {
    let mut labels = vec![name_label(monitor_name), Label::new("device", device.to_string())];
    labels.extend(fields.iter().map(|(k, v)| Label::new(k.to_lowercase(), v.clone())));
    set_gauge("finitude_device_info", labels, 1.0);
}
