// ABOUTME: Per-connection monitor: owns a Bus, decodes and publishes registers, keeps an optional change-log
// ABOUTME: and services a FIFO of outgoing read/write transactions across reconnects

use std::array;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use metrics::Label;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::bus::{Bus, LiveBus};
use crate::error::{FinitudeError, Result};
use crate::frame::{Address, AssembledFrame, Function, ParsedFrame};
use crate::metrics as pub_metrics;
use crate::registers::{HvacMode, Value};
use crate::stream;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const MAX_INLINE_DIFF: usize = 8;

/// A byte-level difference between two captured remainders for the same
/// register label.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// `(offset, old, new)` triples, at most [`MAX_INLINE_DIFF`] entries.
    Bytes(Vec<(usize, u8, u8)>),
    /// The remainder's length itself changed: `(old_len, new_len)`.
    LenChange(usize, usize),
    /// More than [`MAX_INLINE_DIFF`] bytes differ; only the count is kept.
    Count(usize),
}

fn compute_diff(old: &[u8], new: &[u8]) -> Diff {
    if old.len() != new.len() {
        return Diff::LenChange(old.len(), new.len());
    }
    let changed: Vec<(usize, u8, u8)> = old
        .iter()
        .zip(new)
        .enumerate()
        .filter_map(|(i, (o, n))| if o != n { Some((i, *o, *n)) } else { None })
        .collect();
    if changed.len() > MAX_INLINE_DIFF {
        Diff::Count(changed.len())
    } else {
        Diff::Bytes(changed)
    }
}

/// One entry in a monitor's change-log.
#[derive(Debug, Clone)]
pub struct ChangeLogEntry {
    pub timestamp: SystemTime,
    pub label: String,
    pub index: usize,
    pub diff: Option<Diff>,
}

/// Change-only frame capture: tracks the last remainder per register label,
/// a monotonic payload index for compact replay, and the ordered log itself.
/// Disabled by default; a monitor only pays for this bookkeeping once a
/// consumer (e.g. a sniffer endpoint) asks for it.
#[derive(Default)]
struct ChangeLog {
    enabled: bool,
    register_to_rest: HashMap<String, Vec<u8>>,
    framedata_to_index: HashMap<Bytes, usize>,
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.register_to_rest.clear();
            self.framedata_to_index.clear();
            self.entries.clear();
        }
        self.enabled = enabled;
    }

    /// If `rest` is non-empty and differs from the last capture for `label`,
    /// append an entry. The backing frame payload is interned by exact byte
    /// equality so repeated states share one index.
    fn record(&mut self, frame: &ParsedFrame, label: &str, rest: &[u8]) {
        if !self.enabled || rest.is_empty() {
            return;
        }
        let prior = self.register_to_rest.get(label).cloned();
        if prior.as_deref() == Some(rest) {
            return;
        }
        let diff = prior.as_deref().map(|old| compute_diff(old, rest));
        self.register_to_rest.insert(label.to_string(), rest.to_vec());

        let data = Bytes::copy_from_slice(frame.data());
        let next_index = self.framedata_to_index.len() + 1;
        let index = *self.framedata_to_index.entry(data).or_insert(next_index);

        let logged_label = if frame.function() == Some(Function::Write) {
            format!("WRITE({}):{label}", frame.source())
        } else {
            label.to_string()
        };
        self.entries.push(ChangeLogEntry { timestamp: SystemTime::now(), label: logged_label, index, diff });
    }

    fn stored_frames(&self) -> usize {
        self.framedata_to_index.len()
    }

    fn sequence_length(&self) -> usize {
        self.entries.len()
    }
}

/// A snapshot of a monitor's capture state, safe to hand to a consumer
/// outside the monitor's own task.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub synchronized: bool,
    pub entries: Vec<ChangeLogEntry>,
    /// Payload index -> raw frame bytes, ordered by index.
    pub payload_index: Vec<(usize, Vec<u8>)>,
    pub zone_names: [String; 8],
}

struct QueuedTransaction {
    frame: AssembledFrame,
    deadline: Instant,
    reply: oneshot::Sender<Result<Option<ParsedFrame>>>,
}

enum Command {
    Send { frame: AssembledFrame, timeout: Duration, reply: oneshot::Sender<Result<Option<ParsedFrame>>> },
    SetStoreFrames(bool),
    Snapshot(oneshot::Sender<MonitorSnapshot>),
}

/// A cloneable reference to a running [`Monitor`] task.
#[derive(Clone)]
pub struct MonitorHandle {
    name: String,
    commands: mpsc::Sender<Command>,
}

impl MonitorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue `frame` and wait for its correlated reply, or `Ok(None)` if
    /// `timeout` elapses first.
    pub async fn send_with_response(&self, frame: AssembledFrame, timeout: Duration) -> Result<Option<ParsedFrame>> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, timeout, reply })
            .await
            .map_err(|_| FinitudeError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| FinitudeError::ConnectionClosed)?
    }

    /// Enable or disable change-log capture. Enabling resets all prior state.
    pub async fn set_store_frames(&self, enabled: bool) -> Result<()> {
        self.commands.send(Command::SetStoreFrames(enabled)).await.map_err(|_| FinitudeError::ConnectionClosed)
    }

    pub async fn snapshot(&self) -> Result<MonitorSnapshot> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(reply)).await.map_err(|_| FinitudeError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| FinitudeError::ConnectionClosed)
    }
}

/// Builds and spawns a [`Monitor`] task.
pub struct MonitorBuilder {
    name: String,
    path: String,
    listen_before_talk: bool,
}

impl MonitorBuilder {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        MonitorBuilder { name: name.into(), path: path.into(), listen_before_talk: true }
    }

    /// Disable only on a bus with no autonomous master to ACK our requests.
    pub fn listen_before_talk(mut self, enabled: bool) -> Self {
        self.listen_before_talk = enabled;
        self
    }

    pub fn spawn(self) -> MonitorHandle {
        let (tx, rx) = mpsc::channel(32);
        let name = self.name.clone();
        let monitor = Monitor {
            name: self.name,
            path: self.path,
            listen_before_talk: self.listen_before_talk,
            commands: rx,
            synchronized: false,
            last_desync_count: 0,
            zone_to_name: array::from_fn(|_| String::new()),
            change_log: ChangeLog::default(),
            queue: VecDeque::new(),
            in_flight: None,
        };
        tokio::spawn(monitor.run());
        MonitorHandle { name, commands: tx }
    }
}

/// One instance per configured bus connection. Owns the stream and framer,
/// runs the receive loop, publishes decoded registers as metrics, optionally
/// records change-only frame history, and services outgoing transactions.
struct Monitor {
    name: String,
    path: String,
    listen_before_talk: bool,
    commands: mpsc::Receiver<Command>,
    synchronized: bool,
    last_desync_count: u64,
    zone_to_name: [String; 8],
    change_log: ChangeLog,
    queue: VecDeque<QueuedTransaction>,
    in_flight: Option<QueuedTransaction>,
}

impl Monitor {
    async fn open(&self) -> Result<LiveBus> {
        info!(name = %self.name, path = %self.path, "connecting");
        let stream = stream::open(&self.path).await?;
        Ok(Bus::new(stream, self.listen_before_talk))
    }

    async fn run(mut self) {
        let mut bus = match self.open().await {
            Ok(bus) => bus,
            Err(e) => {
                error!(name = %self.name, error = %e, "initial connect failed, monitor exiting");
                return;
            }
        };
        pub_metrics::increment_counter("finitude_reconnects", vec![pub_metrics::name_label(&self.name)]);

        loop {
            tokio::select! {
                result = bus.read_frame() => {
                    match result {
                        Ok(frame) => {
                            let total_desyncs = bus.desync_count();
                            if total_desyncs > self.last_desync_count && self.synchronized {
                                self.synchronized = false;
                                pub_metrics::increment_counter("finitude_desyncs", vec![pub_metrics::name_label(&self.name)]);
                            }
                            self.last_desync_count = total_desyncs;
                            pub_metrics::increment_counter("finitude_frames", vec![pub_metrics::name_label(&self.name)]);
                            self.handle_frame(&mut bus, frame).await;
                        }
                        Err(e) => {
                            warn!(name = %self.name, error = %e, "stream fault, reconnecting");
                            self.synchronized = false;
                            loop {
                                sleep(RECONNECT_BACKOFF).await;
                                match self.open().await {
                                    Ok(new_bus) => {
                                        bus = new_bus;
                                        pub_metrics::increment_counter("finitude_reconnects", vec![pub_metrics::name_label(&self.name)]);
                                        break;
                                    }
                                    Err(e) => warn!(name = %self.name, error = %e, "reconnect failed, retrying"),
                                }
                            }
                        }
                    }
                }
                Some(cmd) = self.commands.recv() => self.handle_command(cmd),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Send { frame, timeout, reply } => {
                self.queue.push_back(QueuedTransaction { frame, deadline: Instant::now() + timeout, reply });
            }
            Command::SetStoreFrames(enabled) => self.change_log.set_enabled(enabled),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> MonitorSnapshot {
        let mut payload_index: Vec<(usize, Vec<u8>)> =
            self.change_log.framedata_to_index.iter().map(|(data, idx)| (*idx, data.to_vec())).collect();
        payload_index.sort_by_key(|(idx, _)| *idx);
        MonitorSnapshot {
            synchronized: self.synchronized,
            entries: self.change_log.entries.clone(),
            payload_index,
            zone_names: self.zone_to_name.clone(),
        }
    }

    async fn handle_frame(&mut self, bus: &mut LiveBus, frame: ParsedFrame) {
        let (label, rest) = self.process_frame(&frame);
        if let Some(label) = &label {
            self.change_log.record(&frame, label, &rest);
        }
        self.service_send_queue(bus, &frame).await;
        self.publish_ambient_gauges();
    }

    fn publish_ambient_gauges(&self) {
        let name = pub_metrics::name_label(&self.name);
        pub_metrics::set_gauge("finitude_synchronized", vec![name.clone()], if self.synchronized { 1.0 } else { 0.0 });
        pub_metrics::set_gauge("finitude_stored_frames", vec![name.clone()], self.change_log.stored_frames() as f64);
        pub_metrics::set_gauge("finitude_frame_sequence_length", vec![name], self.change_log.sequence_length() as f64);
    }

    /// Decode a WRITE/ACK06 frame's register, publish metrics for an ACK's
    /// values, and return `(store_key, remainder)` for change-log capture.
    /// READ frames and anything shorter than a register id carry nothing to
    /// publish or store.
    fn process_frame(&mut self, frame: &ParsedFrame) -> (Option<String>, Vec<u8>) {
        self.synchronized = true;
        let is_write = frame.function() == Some(Function::Write);
        let is_ack = frame.function() == Some(Function::Ack06);
        if frame.length() < 3 || !(is_write || is_ack) {
            return (None, Vec::new());
        }

        let decoded = match frame.parse_register() {
            Some(Ok(decoded)) => decoded,
            Some(Err(e)) => {
                let label = frame.printable_register().unwrap_or_else(|| "register(unknown)".to_string());
                warn!(name = %self.name, register = %label, error = %e, "register decode failed");
                return (Some(format!("{}_{label}", frame.dest())), format!("ERROR:{e}").into_bytes());
            }
            None => return (None, Vec::new()),
        };

        let basename = decoded.label.split('(').next().unwrap_or(&decoded.label);
        let mut addr = frame.dest();
        if !decoded.values.is_empty() && is_ack {
            addr = frame.source();
            if basename == "DeviceInfo" {
                let fields: Vec<(String, String)> =
                    decoded.values.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect();
                pub_metrics::set_device_info(&self.name, &addr.to_string(), &fields);
            } else {
                let tablename = table_name_map(basename);
                for (k, v) in &decoded.values {
                    match v {
                        Value::Record(records) => self.publish_record_list(tablename, k, records),
                        _ => self.set_gauge(tablename, k, v),
                    }
                }
            }
        }
        (Some(format!("{addr}_{}", decoded.label)), decoded.remainder)
    }

    /// Publish one gauge per decoded scalar field, applying the zone,
    /// Times7/Times16, RPM/CFM, and Mode-splitting projection rules.
    fn set_gauge(&mut self, tablename: &str, itemname: &str, value: &Value) {
        let zone = zone_match(itemname);
        if let Value::Str(s) = value {
            if let Some((zone_num, suffix)) = zone {
                if suffix == "Name" && tablename.is_empty() {
                    let idx = (zone_num - 1) as usize;
                    if self.zone_to_name[idx] != *s {
                        info!(name = %self.name, zone = zone_num, zone_name = %s, "zone name updated");
                        self.zone_to_name[idx] = s.clone();
                    }
                }
            }
            return;
        }
        let Some(raw) = value.as_f64() else { return };

        if itemname == "Mode" && tablename.is_empty() {
            self.publish_mode(value.as_u32().unwrap_or(0) as u8);
            return;
        }

        let (rewritten, divisor) = rewrite_itemname(itemname);
        // The zone suffix used for the gauge name comes from the original
        // `Zone<N>` match, not from the Times/RPM/CFM-rewritten name: no
        // zone field currently uses those suffixes, but this mirrors the
        // upstream projection rule exactly rather than only the cases it
        // happens to be exercised by.
        let nonzone = zone.map(|(_, suffix)| suffix.to_string()).unwrap_or(rewritten);
        let gaugename = gauge_name(tablename, &nonzone);

        match zone {
            Some((zone_num, _)) => {
                let idx = (zone_num - 1) as usize;
                let zname = self.zone_to_name[idx].trim_matches(|c| c == ' ' || c == '\0');
                if zname.is_empty() {
                    debug!(name = %self.name, gauge = %gaugename, zone = zone_num, "ignoring: no zone name yet");
                    return;
                }
                let labels = vec![
                    pub_metrics::name_label(&self.name),
                    Label::new("zone", zone_num.to_string()),
                    Label::new("zonename", zname.to_string()),
                ];
                pub_metrics::set_gauge(gaugename, labels, raw / divisor);
            }
            None => {
                pub_metrics::set_gauge(gaugename, vec![pub_metrics::name_label(&self.name)], raw / divisor);
            }
        }
    }

    /// Split a `Mode` reading into its enumerated mode, stage, signed state,
    /// and `off|heat|cool` projection.
    fn publish_mode(&self, raw: u8) {
        let (mode_bits, stage, state, enum_state) = mode_decomposition(raw);
        let mode_name = HvacMode::try_from(mode_bits).map(|m| format!("{m:?}").to_lowercase()).unwrap_or_else(|_| "unknown".to_string());
        pub_metrics::set_gauge(
            "finitude_mode",
            vec![pub_metrics::name_label(&self.name), Label::new("state", mode_name)],
            mode_bits as f64,
        );
        pub_metrics::set_gauge("finitude_stage", vec![pub_metrics::name_label(&self.name)], stage as f64);
        pub_metrics::set_gauge("finitude_state", vec![pub_metrics::name_label(&self.name)], state as f64);
        pub_metrics::set_gauge(
            "finitude_state_enum",
            vec![pub_metrics::name_label(&self.name), Label::new("state", enum_state.to_string())],
            1.0,
        );
    }

    /// Explode a REPEATING field's records into one metric series per
    /// subkey, labelled by the record's `Tag` member.
    fn publish_record_list(&self, tablename: &str, repeat_name: &str, records: &[Vec<(String, Value)>]) {
        for record in records {
            let Some(tag) = record.iter().find(|(k, _)| k == "Tag").and_then(|(_, v)| v.as_u32()) else {
                continue;
            };
            for (subkey, subval) in record {
                if subkey == "Tag" {
                    continue;
                }
                if let Some(raw) = subval.as_f64() {
                    let gaugename = gauge_name(tablename, &format!("{repeat_name}{subkey}"));
                    let labels = vec![pub_metrics::name_label(&self.name), Label::new("tag", tag.to_string())];
                    pub_metrics::set_gauge(gaugename, labels, raw);
                }
            }
        }
    }

    /// Check a just-read frame against the in-flight transaction (reply
    /// match or timeout), then, if none is in-flight and the frame is an
    /// ACK06, attempt to send the head of the queue.
    async fn service_send_queue(&mut self, bus: &mut LiveBus, frame: &ParsedFrame) {
        if let Some(inflight) = &self.in_flight {
            let is_reply = frame.source() == inflight.frame.dest
                && frame.dest() == inflight.frame.source
                && frame.function().map(Function::is_reply).unwrap_or(false);
            if is_reply {
                let inflight = self.in_flight.take().unwrap();
                let _ = inflight.reply.send(Ok(Some(frame.clone())));
            } else if Instant::now() >= inflight.deadline {
                let inflight = self.in_flight.take().unwrap();
                let _ = inflight.reply.send(Ok(None));
            }
        }

        if self.in_flight.is_none() && frame.function() == Some(Function::Ack06) {
            if let Some(queued) = self.queue.pop_front() {
                let bytes = queued.frame.to_bytes();
                match bus.try_write(&bytes).await {
                    Ok(true) => self.in_flight = Some(queued),
                    Ok(false) => self.queue.push_front(queued),
                    Err(e) => {
                        let _ = queued.reply.send(Err(e));
                    }
                }
            }
        }
    }
}

/// Map a register's bare name to its metric table prefix, falling back to
/// the name itself for anything not explicitly collapsed.
fn table_name_map(basename: &str) -> &str {
    match basename {
        "AirHandler06" | "AirHandler16" => "airhandler",
        "TStatCurrentParams" | "TStatZoneParams" => "",
        "TStatVacationParams" => "vacation",
        "HeatPump01" | "HeatPump02" => "heatpump",
        other => other,
    }
}

/// `Zone<1-8><suffix>` -> `(zone, suffix)`, else `None`.
fn zone_match(itemname: &str) -> Option<(u8, &str)> {
    let rest = itemname.strip_prefix("Zone")?;
    let mut chars = rest.chars();
    let digit = chars.next()?;
    if !('1'..='8').contains(&digit) {
        return None;
    }
    Some((digit.to_digit(10).unwrap() as u8, chars.as_str()))
}

/// Strip a `Times7`/`Times16` suffix (returning the matching divisor) and
/// lower-case any `RPM`/`CFM` substring, underscore-separated from its
/// neighbours.
fn rewrite_itemname(itemname: &str) -> (String, f64) {
    let mut name = itemname.to_string();
    let mut divisor = 1.0;
    if let Some(pre) = name.strip_suffix("Times7") {
        name = pre.to_string();
        divisor = 7.0;
    }
    if let Some(pre) = name.strip_suffix("Times16") {
        name = pre.to_string();
        divisor = 16.0;
    }
    for word in ["RPM", "CFM"] {
        if let Some(idx) = name.find(word) {
            let pre = &name[..idx];
            let post = &name[idx + word.len()..];
            let mut out = String::new();
            out.push_str(pre);
            if !pre.is_empty() {
                out.push('_');
            }
            out.push_str(&word.to_lowercase());
            if !post.is_empty() {
                out.push('_');
            }
            out.push_str(post);
            name = out;
            break;
        }
    }
    (name, divisor)
}

/// Split a raw `Mode` byte into `(mode_bits, stage, state, off|heat|cool)`.
/// State and the enum are stage signed by mode, except they're known to
/// mislabel cooling as heating when `mode_bits` is AUTO -- ported as-is from
/// the source this was distilled from rather than fixed.
fn mode_decomposition(raw: u8) -> (u8, i32, i32, &'static str) {
    let mode_bits = raw & 0x1f;
    let stage = (raw >> 5) as i32;
    let state = if mode_bits == HvacMode::Cool as u8 { -stage } else { stage };
    let enum_state = if state == 0 {
        "off"
    } else if state < 0 {
        "cool"
    } else {
        "heat"
    };
    (mode_bits, stage, state, enum_state)
}

/// `finitude_<table>_<item>`, lower-casing `item` only when a table prefix
/// is present -- matches the upstream projection exactly, quirk included:
/// table-less items (the current thermostat/zone params) keep their
/// original case.
fn gauge_name(tablename: &str, suffix: &str) -> String {
    if tablename.is_empty() {
        format!("finitude_{suffix}")
    } else {
        format!("finitude_{tablename}_{}", suffix.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_monitor() -> Monitor {
        let (_tx, rx) = mpsc::channel(4);
        Monitor {
            name: "test".to_string(),
            path: "unused".to_string(),
            listen_before_talk: true,
            commands: rx,
            synchronized: false,
            last_desync_count: 0,
            zone_to_name: array::from_fn(|_| String::new()),
            change_log: ChangeLog::default(),
            queue: VecDeque::new(),
            in_flight: None,
        }
    }

    #[test]
    fn table_name_map_known_and_default() {
        assert_eq!(table_name_map("AirHandler06"), "airhandler");
        assert_eq!(table_name_map("TStatCurrentParams"), "");
        assert_eq!(table_name_map("SomeOtherRegister"), "SomeOtherRegister");
    }

    #[test]
    fn zone_match_parses_prefix_and_suffix() {
        assert_eq!(zone_match("Zone3CurrentTemp"), Some((3, "CurrentTemp")));
        assert_eq!(zone_match("Zone9Bogus"), None);
        assert_eq!(zone_match("NotAZone"), None);
    }

    #[test]
    fn rewrite_itemname_applies_times_and_unit_rewrites() {
        let (name, divisor) = rewrite_itemname("OutdoorTempTimes16");
        assert_eq!(name, "OutdoorTemp");
        assert_eq!(divisor, 16.0);
        let (name, divisor) = rewrite_itemname("BlowerRPM");
        assert_eq!(name, "Blower_rpm");
        assert_eq!(divisor, 1.0);
    }

    #[test]
    fn mode_decomposition_splits_stage_and_state() {
        // mode=1 (Cool), stage=1 -> state should be negative
        assert_eq!(mode_decomposition(0b0010_0001), (1, 1, -1, "cool"));
        // mode=0 (Heat), stage=2 -> state positive
        assert_eq!(mode_decomposition(0b0100_0000), (0, 2, 2, "heat"));
        assert_eq!(mode_decomposition(0), (0, 0, 0, "off"));
    }

    #[test]
    fn compute_diff_variants() {
        assert_eq!(compute_diff(&[1, 2, 3], &[1, 9, 3]), Diff::Bytes(vec![(1, 2, 9)]));
        assert_eq!(compute_diff(&[1, 2], &[1, 2, 3]), Diff::LenChange(2, 3));
        let old = vec![0u8; 10];
        let new: Vec<u8> = (0..10).collect();
        assert!(matches!(compute_diff(&old, &new), Diff::Count(10)));
    }

    #[test]
    fn change_log_dedups_identical_remainders() {
        let mut log = ChangeLog::default();
        log.set_enabled(true);
        let frame = AssembledFrame::new(
            Address::from_hex_str("2001").unwrap(),
            Address::from_hex_str("3001").unwrap(),
            Function::Ack06 as u8,
            Bytes::from_static(&[0x00, 0x3b, 0x02, 0xaa]),
        );
        let parsed = ParsedFrame::new(frame.to_bytes());
        log.record(&parsed, "TStatCurrentParams(3b02)", &[0xaa]);
        log.record(&parsed, "TStatCurrentParams(3b02)", &[0xaa]);
        assert_eq!(log.entries.len(), 1);
        assert!(log.entries[0].diff.is_none());

        log.record(&parsed, "TStatCurrentParams(3b02)", &[0xbb]);
        assert_eq!(log.entries.len(), 2);
        assert!(log.entries[1].diff.is_some());
        assert_eq!(log.stored_frames(), 1);
    }

    #[tokio::test]
    async fn service_send_queue_writes_after_ack06_and_resolves_reply() {
        let (_client, server) = tokio::io::duplex(256);
        let mut bus = Bus::new(server, false);
        let mut monitor = make_monitor();

        let (reply, reply_rx) = oneshot::channel();
        let write_frame = crate::transaction::build_write(
            Address::from_hex_str("2001").unwrap(),
            Address::from_hex_str("3001").unwrap(),
            0x3b02,
            None,
            &[0x01],
        );
        monitor.queue.push_back(QueuedTransaction { frame: write_frame, deadline: Instant::now() + Duration::from_secs(5), reply });

        let ack = AssembledFrame::new(Address::from_hex_str("0000").unwrap(), Address::from_hex_str("0000").unwrap(), Function::Ack06 as u8, Bytes::new());
        let ack = ParsedFrame::new(ack.to_bytes());
        monitor.service_send_queue(&mut bus, &ack).await;
        assert!(monitor.in_flight.is_some());
        assert!(monitor.queue.is_empty());

        let reply_frame =
            AssembledFrame::new(Address::from_hex_str("3001").unwrap(), Address::from_hex_str("2001").unwrap(), Function::Ack06 as u8, Bytes::new());
        let reply_frame = ParsedFrame::new(reply_frame.to_bytes());
        monitor.service_send_queue(&mut bus, &reply_frame).await;
        assert!(monitor.in_flight.is_none());

        let got = reply_rx.await.unwrap().unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn service_send_queue_times_out_in_flight_transaction() {
        let (_client, server) = tokio::io::duplex(256);
        let mut bus = Bus::new(server, false);
        let mut monitor = make_monitor();

        let (reply, reply_rx) = oneshot::channel();
        let read_frame =
            crate::transaction::build_read(Address::from_hex_str("2001").unwrap(), Address::from_hex_str("3001").unwrap(), 0x3b02);
        monitor.in_flight =
            Some(QueuedTransaction { frame: read_frame, deadline: Instant::now(), reply });

        let unrelated = AssembledFrame::new(Address::from_hex_str("4001").unwrap(), Address::from_hex_str("5001").unwrap(), Function::Ack02 as u8, Bytes::new());
        let unrelated = ParsedFrame::new(unrelated.to_bytes());
        monitor.service_send_queue(&mut bus, &unrelated).await;
        assert!(monitor.in_flight.is_none());
        assert_eq!(reply_rx.await.unwrap().unwrap(), None);
    }
}
