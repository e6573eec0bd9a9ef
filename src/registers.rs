//! Declarative schema for decoding register payloads carried by READ/WRITE/ACK06
//! frames.
//!
//! Each entry in [`REGISTER_INFO`] maps a 3-byte register id (table + item,
//! printed as 6 hex digits) to a human name and a list of [`FieldSpec`]
//! descriptors. [`decode`] walks the descriptor list against the payload
//! bytes that follow the register id, in order, producing an ordered list of
//! named values plus whatever bytes were left over (a register whose layout
//! isn't fully known, or a WRITE frame with trailing mask/data bytes we don't
//! attempt to interpret).
//!
//! Two descriptors are not simple fixed-width fields:
//! - [`FieldSpec::Zones8`] repeats a single field 8 times, naming each
//!   `Zone<1..8><suffix>`.
//! - [`FieldSpec::Repeating`] marks the start of a record template: every
//!   descriptor after it (including ones following the repeating marker
//!   itself, such as trailing length/type bytes) is replayed in a loop until
//!   the payload is exhausted, producing one record per iteration.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{FinitudeError, Result};

/// The lower 5 bits of a `TStatCurrentParams` `Mode` reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum HvacMode {
    Heat = 0,
    Cool = 1,
    Auto = 2,
    Electric = 3,
    HeatPump = 4,
    Off = 5,
}

/// Primitive field encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// NUL-padded UTF-8, width given by the field's `reps`.
    Utf8,
    /// NUL-padded UTF-8, always exactly 12 bytes regardless of `reps`.
    Name,
    Uint8,
    Int8,
    Uint16,
}

/// One entry in a register's field list.
#[derive(Debug, Clone, Copy)]
pub enum FieldSpec {
    /// A single named field, `reps` bytes/repetitions wide (only meaningful
    /// for `Utf8`; other kinds are always 1 byte/word).
    Field { reps: u16, kind: FieldKind, name: &'static str },
    /// The same field repeated once per zone (always 8 zones), producing
    /// `Zone1<suffix>` .. `Zone8<suffix>`.
    Zones8 { kind: FieldKind, suffix: &'static str },
    /// `reps` bytes whose meaning is not known; surfaced as
    /// `<label>_unk<run>_<index>` entries.
    Unknown { reps: u16 },
    /// Marks the start of a repeated record: every following descriptor is
    /// replayed until the payload is exhausted.
    Repeating { name: &'static str },
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    U8(u8),
    I8(i8),
    U16(u16),
    /// The payload of a `Repeating` field: one entry per record.
    Record(Vec<Vec<(String, Value)>>),
}

impl Value {
    /// Numeric reading, for metric publication. `None` for `Str`/`Record`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::U8(v) => Some(*v as f64),
            Value::I8(v) => Some(*v as f64),
            Value::U16(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U8(v) => Some(*v as u32),
            Value::I8(v) => Some(*v as u32),
            Value::U16(v) => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// The result of decoding a register payload.
#[derive(Debug, Clone)]
pub struct DecodedRegister {
    /// Printable register identity, e.g. `TStatCurrentParams(3b02)`.
    pub label: String,
    pub values: Vec<(String, Value)>,
    /// Bytes left over after applying the schema: empty when the schema
    /// fully accounts for the payload.
    pub remainder: Vec<u8>,
}

/// Render 3 raw register-id bytes as 6 lowercase hex digits, e.g. `003b02`.
pub fn key_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Drop a leading `00` table byte for display, e.g. `003b02` -> `3b02`, but
/// leave `000101`-style keys with a nonzero high table byte untouched.
pub fn short_key(key: &str) -> String {
    key.strip_prefix("00").map(str::to_string).unwrap_or_else(|| key.to_string())
}

/// Look up a register's name and field schema by its 6-hex-digit id.
pub fn lookup(key: &str) -> Option<(&'static str, &'static [FieldSpec])> {
    REGISTER_INFO.iter().find(|(k, _, _)| *k == key).map(|(_, name, specs)| (*name, *specs))
}

/// Decode `payload` (the register's data bytes, with the 3-byte register id
/// already stripped) against `specs`. `label` is used only to name `UNKNOWN`
/// fields and to annotate decode errors.
pub fn decode(label: &str, specs: &[FieldSpec], payload: &[u8]) -> Result<DecodedRegister> {
    if specs.is_empty() {
        return Ok(DecodedRegister { label: label.to_string(), values: Vec::new(), remainder: payload.to_vec() });
    }

    let mut cursor = payload;
    let mut values: Vec<(String, Value)> = Vec::new();
    let mut unknown_runs: usize = 0;

    for (i, spec) in specs.iter().enumerate() {
        if let FieldSpec::Repeating { name } = spec {
            let template = &specs[i + 1..];
            let mut records = Vec::new();
            while !cursor.is_empty() {
                let mut record = Vec::new();
                for field in template {
                    cursor = decode_field(field, cursor, &mut record, label, &mut unknown_runs)?;
                }
                if record.is_empty() {
                    return Err(FinitudeError::SchemaError(format!(
                        "{label}: REPEATING record template produced no fields"
                    )));
                }
                records.push(record);
            }
            values.push((name.to_string(), Value::Record(records)));
            return Ok(DecodedRegister { label: label.to_string(), values, remainder: cursor.to_vec() });
        }
        cursor = decode_field(spec, cursor, &mut values, label, &mut unknown_runs)?;
    }
    Ok(DecodedRegister { label: label.to_string(), values, remainder: cursor.to_vec() })
}

fn decode_field<'a>(
    spec: &FieldSpec,
    cursor: &'a [u8],
    out: &mut Vec<(String, Value)>,
    label: &str,
    unknown_runs: &mut usize,
) -> Result<&'a [u8]> {
    match *spec {
        FieldSpec::Zones8 { kind, suffix } => {
            let mut c = cursor;
            for zone in 1..=8u8 {
                let (value, rest) = parse_reps(kind, 1, c, label)?;
                out.push((format!("Zone{zone}{suffix}"), value));
                c = rest;
            }
            Ok(c)
        }
        FieldSpec::Unknown { reps } => {
            let reps = reps as usize;
            if cursor.len() < reps {
                return Err(too_short(label, "UNKNOWN"));
            }
            for r in 0..reps {
                out.push((format!("{label}_unk{unknown_runs}_{r}"), Value::U8(cursor[r])));
            }
            *unknown_runs += 1;
            Ok(&cursor[reps..])
        }
        FieldSpec::Field { reps, kind, name } => {
            let (value, rest) = parse_reps(kind, reps, cursor, label)?;
            if out.iter().any(|(n, _)| n == name) {
                return Err(FinitudeError::SchemaError(format!("{label}: duplicate field {name}")));
            }
            out.push((name.to_string(), value));
            Ok(rest)
        }
        FieldSpec::Repeating { .. } => {
            unreachable!("REPEATING only ever appears as the loop marker handled in decode()")
        }
    }
}

fn parse_reps<'a>(kind: FieldKind, reps: u16, cursor: &'a [u8], label: &str) -> Result<(Value, &'a [u8])> {
    match kind {
        FieldKind::Name => parse_reps(FieldKind::Utf8, 12, cursor, label),
        FieldKind::Utf8 => {
            let reps = reps as usize;
            if cursor.len() < reps {
                return Err(too_short(label, "UTF8"));
            }
            let s = String::from_utf8_lossy(&cursor[..reps]).trim_matches('\0').to_string();
            Ok((Value::Str(s), &cursor[reps..]))
        }
        FieldKind::Uint8 => {
            if cursor.is_empty() {
                return Err(too_short(label, "UINT8"));
            }
            Ok((Value::U8(cursor[0]), &cursor[1..]))
        }
        FieldKind::Int8 => {
            if cursor.is_empty() {
                return Err(too_short(label, "INT8"));
            }
            Ok((Value::I8(cursor[0] as i8), &cursor[1..]))
        }
        FieldKind::Uint16 => {
            if cursor.len() < 2 {
                return Err(too_short(label, "UINT16"));
            }
            Ok((Value::U16(u16::from_be_bytes([cursor[0], cursor[1]])), &cursor[2..]))
        }
    }
}

fn too_short(label: &str, field: &str) -> FinitudeError {
    FinitudeError::Decode { register: label.to_string(), reason: format!("payload too short for {field} field") }
}

use FieldKind::{Int8, Name, Uint16, Uint8, Utf8};
use FieldSpec::Field as F;
use FieldSpec::{Repeating, Unknown, Zones8};

/// Shared schema for the `RegInfoNN` table-directory register present at the
/// head of every table (`NN01`): two unknown bytes, an 8-byte table name, two
/// more unknown bytes, a register count, and then one repeated record per
/// register in the table.
const REG_INFO_FMT: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Unknown1" },
    F { reps: 1, kind: Uint8, name: "Unknown2" },
    F { reps: 8, kind: Utf8, name: "TableName" },
    F { reps: 1, kind: Uint8, name: "Unknown3" },
    F { reps: 1, kind: Uint8, name: "Unknown4" },
    F { reps: 1, kind: Uint8, name: "NumRegisters" },
    Repeating { name: "Registers" },
    F { reps: 1, kind: Uint8, name: "Length" },
    F { reps: 1, kind: Uint8, name: "Type" },
];

const ADDRESS_INFO: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "DeviceClass" },
    F { reps: 1, kind: Uint8, name: "DeviceBus" },
    F { reps: 1, kind: Uint8, name: "Unknown" },
];

const UNKNOWN_INFO_0103: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Unknown1" },
    F { reps: 1, kind: Uint8, name: "Unknown2" },
    F { reps: 1, kind: Uint8, name: "Unknown3" },
    F { reps: 1, kind: Uint8, name: "Unknown4" },
];

const DEVICE_INFO: &[FieldSpec] = &[
    F { reps: 48, kind: Utf8, name: "Module" },
    F { reps: 16, kind: Utf8, name: "Firmware" },
    F { reps: 20, kind: Utf8, name: "Model" },
    F { reps: 36, kind: Utf8, name: "Serial" },
];

const SYS_TIME: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Hour" },
    F { reps: 1, kind: Uint8, name: "Minute" },
    F { reps: 1, kind: Uint8, name: "DayOfWeek" },
];

const SYS_DATE: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Day" },
    F { reps: 1, kind: Uint8, name: "Month" },
    F { reps: 1, kind: Uint8, name: "Year" },
];

const TEMPERATURES: &[FieldSpec] = &[
    Repeating { name: "TempSensors" },
    F { reps: 1, kind: Uint8, name: "State" },
    F { reps: 1, kind: Uint8, name: "Type" },
    F { reps: 1, kind: Uint16, name: "TempTimes16" },
];

const UNTITLED_HEAT_PUMP: &[FieldSpec] = &[Unknown { reps: 4 }];

const AIR_HANDLER_06: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Unknown1" },
    F { reps: 1, kind: Uint16, name: "BlowerRPM" },
    F { reps: 1, kind: Uint8, name: "Unknown2" },
    F { reps: 1, kind: Uint16, name: "Unknown3" },
    F { reps: 1, kind: Uint16, name: "Unknown4" },
    F { reps: 1, kind: Uint8, name: "Unknown5" },
    F { reps: 1, kind: Uint8, name: "State" },
];

const UNTITLED_AIR_HANDLER_07: &[FieldSpec] = &[Unknown { reps: 3 }];

const DAMPER_CONTROL: &[FieldSpec] = &[Zones8 { kind: Uint8, suffix: "DamperPosition" }];

const UNKNOWN_ONE_BYTE: &[FieldSpec] = &[
    Repeating { name: "OneByte" },
    F { reps: 1, kind: Uint8, name: "Tag" },
    F { reps: 1, kind: Uint8, name: "Value" },
];

const UNKNOWN_TWO_BYTE: &[FieldSpec] = &[
    Repeating { name: "TwoByte" },
    F { reps: 1, kind: Uint8, name: "Tag" },
    F { reps: 1, kind: Uint16, name: "Value" },
];

const UNKNOWN_THREE_BYTE: &[FieldSpec] = &[
    Repeating { name: "ThreeByte" },
    F { reps: 1, kind: Uint8, name: "Tag" },
    F { reps: 1, kind: Uint8, name: "Unknown" },
    F { reps: 1, kind: Uint16, name: "Value" },
];

const AIR_HANDLER_16: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "State" },
    Unknown { reps: 3 },
    F { reps: 1, kind: Uint16, name: "AirflowCFM" },
    F { reps: 1, kind: Uint16, name: "Unknown0" },
    F { reps: 1, kind: Uint16, name: "Unknown0078" },
    F { reps: 1, kind: Uint16, name: "Unknown0100" },
    F { reps: 1, kind: Uint8, name: "Unknown02" },
    F { reps: 1, kind: Uint8, name: "UnknownFanSpeed" },
];

const DAMPER_STATE: &[FieldSpec] = &[Zones8 { kind: Uint8, suffix: "DamperPosition" }];

const UNKNOWN_031B: &[FieldSpec] = &[F { reps: 1, kind: Uint8, name: "Unknown" }];

const LAST_STATUS: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "StatusCode" },
    F { reps: 1, kind: Uint8, name: "Severity" },
    F { reps: 38, kind: Utf8, name: "Message" },
];

const UNTITLED_AIR_HANDLER_03: &[FieldSpec] = &[Unknown { reps: 4 }];
const UNTITLED_AIR_HANDLER: &[FieldSpec] = &[Unknown { reps: 4 }];

const HRV_STATE: &[FieldSpec] = &[F { reps: 1, kind: Uint8, name: "Speed" }];

const UNKNOWN_3405: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Unknown1" },
    F { reps: 1, kind: Uint16, name: "Unknown0" },
];

const TSTAT_CURRENT_PARAMS: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "ZonesUnknown" },
    Unknown { reps: 2 },
    Zones8 { kind: Uint8, suffix: "CurrentTemp" },
    Zones8 { kind: Uint8, suffix: "CurrentHumidity" },
    Unknown { reps: 1 },
    F { reps: 1, kind: Int8, name: "OutdoorAirTemp" },
    F { reps: 1, kind: Uint8, name: "ZonesUnoccupied" },
    F { reps: 1, kind: Uint8, name: "Mode" },
    Unknown { reps: 5 },
    F { reps: 1, kind: Uint8, name: "DisplayedZone" },
];

const TSTAT_ZONE_PARAMS: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "ZonesUnknown" },
    Unknown { reps: 2 },
    Zones8 { kind: Uint8, suffix: "FanMode" },
    F { reps: 1, kind: Uint8, name: "ZonesHolding" },
    Zones8 { kind: Uint8, suffix: "CurrentHeatSetpoint" },
    Zones8 { kind: Uint8, suffix: "CurrentCoolSetpoint" },
    Zones8 { kind: Uint8, suffix: "CurrentHumidityTarget" },
    F { reps: 1, kind: Uint8, name: "FanAutoConfig" },
    Unknown { reps: 1 },
    Zones8 { kind: Uint16, suffix: "HoldDuration" },
    Zones8 { kind: Name, suffix: "Name" },
];

const TSTAT_VACATION_PARAMS: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "Active" },
    F { reps: 1, kind: Uint16, name: "Hours" },
    F { reps: 1, kind: Uint8, name: "MinTemp" },
    F { reps: 1, kind: Uint8, name: "MaxTemp" },
    F { reps: 1, kind: Uint8, name: "MinHumidity" },
    F { reps: 1, kind: Uint8, name: "MaxHumidity" },
    F { reps: 1, kind: Uint8, name: "FanMode" },
];

const TSTAT_UNTITLED: &[FieldSpec] = &[
    F { reps: 1, kind: Uint8, name: "ValidZones" },
    Unknown { reps: 11 },
    F { reps: 20, kind: Utf8, name: "DealerName" },
    F { reps: 20, kind: Utf8, name: "DealerPhone" },
];

const SAM_NOTIFICATION: &[FieldSpec] = &[F { reps: 1, kind: Uint8, name: "Unknown" }];

const LEGACY_HEAT_PUMP_TEMPERATURES: &[FieldSpec] = &[
    F { reps: 1, kind: Uint16, name: "OutsideTempTimes16" },
    F { reps: 1, kind: Uint16, name: "CoilTempTimes16" },
];

const LEGACY_HEAT_PUMP_STAGE: &[FieldSpec] = &[F { reps: 1, kind: Uint8, name: "StageShift1" }];

const ONE_UNKNOWN: &[FieldSpec] = &[F { reps: 1, kind: Uint8, name: "Unknown" }];

/// Register id -> (name, field schema). Empty schemas mark registers whose
/// layout is unknown; [`decode`] reports their whole payload as `remainder`.
#[rustfmt::skip]
pub static REGISTER_INFO: &[(&str, &str, &[FieldSpec])] = &[
    ("000101", "RegInfo01", REG_INFO_FMT),
    ("000102", "AddressInfo", ADDRESS_INFO),
    ("000103", "UnknownInfo0103", UNKNOWN_INFO_0103),
    ("000104", "DeviceInfo", DEVICE_INFO),
    ("000201", "RegInfo02", REG_INFO_FMT),
    ("000202", "SysTime", SYS_TIME),
    ("000203", "SysDate", SYS_DATE),
    ("000301", "RegInfo03", REG_INFO_FMT),
    ("000302", "Temperatures", TEMPERATURES),
    ("000303", "UntitledHeatPump", UNTITLED_HEAT_PUMP),
    ("000306", "AirHandler06", AIR_HANDLER_06),
    ("000307", "UntitledAirHandler07", UNTITLED_AIR_HANDLER_07),
    ("000308", "DamperControl", DAMPER_CONTROL),
    ("00030d", "Unknown030d", &[]),
    ("00030e", "UnknownOneByte", UNKNOWN_ONE_BYTE),
    ("00030f", "UnknownTwoByte", UNKNOWN_TWO_BYTE),
    ("000310", "UnknownThreeByte", UNKNOWN_THREE_BYTE),
    ("000311", "UnknownThreeByteBookend", UNKNOWN_THREE_BYTE),
    ("000316", "AirHandler16", AIR_HANDLER_16),
    ("000319", "DamperState", DAMPER_STATE),
    ("00031b", "Unknown031b", UNKNOWN_031B),
    ("00031c", "LastStatus", LAST_STATUS),
    ("00041e", "SmartSensor", &[]),
    ("000401", "RegInfo04", REG_INFO_FMT),
    ("000403", "UntitledAirHandler03", UNTITLED_AIR_HANDLER_03),
    ("000409", "UntitledAirHandler", UNTITLED_AIR_HANDLER),
    ("000601", "RegInfo06", REG_INFO_FMT),
    ("00060d", "UntitledHeatPump0d", ONE_UNKNOWN),
    ("000610", "UntitledHeatPump10", &[FieldSpec::Unknown { reps: 4 }]),
    ("00061a", "UntitledHeatPump1a", ONE_UNKNOWN),
    ("000701", "RegInfo07", REG_INFO_FMT),
    ("003001", "RegInfo30", REG_INFO_FMT),
    ("003401", "RegInfo34", REG_INFO_FMT),
    ("003404", "HRVState", HRV_STATE),
    ("003405", "Unknown3405", UNKNOWN_3405),
    ("003b01", "RegInfo3b", REG_INFO_FMT),
    ("003b02", "TStatCurrentParams", TSTAT_CURRENT_PARAMS),
    ("003b03", "TStatZoneParams", TSTAT_ZONE_PARAMS),
    ("003b04", "TStatVacationParams", TSTAT_VACATION_PARAMS),
    ("003b05", "TStatUntitled05", &[]),
    ("003b06", "TStatUntitled", TSTAT_UNTITLED),
    ("003b0e", "SamNotification", SAM_NOTIFICATION),
    ("003e01", "LegacyHeatPumpTemperatures", LEGACY_HEAT_PUMP_TEMPERATURES),
    ("003e02", "LegacyHeatPumpStage", LEGACY_HEAT_PUMP_STAGE),
    ("003e08", "LegacyHeatPumpUnknown08", &[]),
    ("003e0a", "LegacyHeatPumpUnknown0a", &[]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_register() {
        let (name, specs) = lookup("003b02").unwrap();
        assert_eq!(name, "TStatCurrentParams");
        assert!(!specs.is_empty());
    }

    #[test]
    fn lookup_unknown_register_returns_none() {
        assert!(lookup("00ffff").is_none());
    }

    #[test]
    fn short_key_elides_leading_table_zero_byte() {
        assert_eq!(short_key("003b02"), "3b02");
        assert_eq!(short_key("000101"), "000101".strip_prefix("00").unwrap());
    }

    #[test]
    fn decode_sys_time() {
        let decoded = decode("SysTime(0202)", SYS_TIME, &[14, 30, 2]).unwrap();
        assert_eq!(decoded.values, vec![
            ("Hour".to_string(), Value::U8(14)),
            ("Minute".to_string(), Value::U8(30)),
            ("DayOfWeek".to_string(), Value::U8(2)),
        ]);
        assert!(decoded.remainder.is_empty());
    }

    #[test]
    fn decode_zones8_uint16() {
        let specs: &[FieldSpec] = &[Zones8 { kind: Uint16, suffix: "HoldDuration" }];
        let payload: Vec<u8> = (0..8u16).flat_map(|z| (z * 10).to_be_bytes()).collect();
        let decoded = decode("Test", specs, &payload).unwrap();
        assert_eq!(decoded.values.len(), 8);
        assert_eq!(decoded.values[0].0, "Zone1HoldDuration");
        assert_eq!(decoded.values[0].1, Value::U16(0));
        assert_eq!(decoded.values[7].1, Value::U16(70));
    }

    #[test]
    fn decode_zones8_name_consumes_twelve_bytes_each() {
        let specs: &[FieldSpec] = &[Zones8 { kind: Name, suffix: "Name" }];
        let mut payload = Vec::new();
        for i in 0..8u8 {
            let mut name = vec![b'A' + i, 0, 0];
            name.resize(12, 0);
            payload.extend_from_slice(&name);
        }
        let decoded = decode("Test", specs, &payload).unwrap();
        assert_eq!(decoded.values.len(), 8);
        assert_eq!(decoded.values[0].1, Value::Str("A".to_string()));
        assert_eq!(decoded.values[3].1, Value::Str("D".to_string()));
    }

    #[test]
    fn decode_unknown_field_names_by_run_and_index() {
        let specs: &[FieldSpec] = &[Unknown { reps: 3 }];
        let decoded = decode("Foo(0001)", specs, &[1, 2, 3]).unwrap();
        assert_eq!(decoded.values[0].0, "Foo(0001)_unk0_0");
        assert_eq!(decoded.values[2].0, "Foo(0001)_unk0_2");
    }

    #[test]
    fn decode_repeating_replays_trailing_fields_until_payload_exhausted() {
        let decoded = decode("RegInfo01(0101)", REG_INFO_FMT, &reg_info_payload()).unwrap();
        let (_, records) = decoded.values.iter().find(|(k, _)| k == "Registers").unwrap();
        match records {
            Value::Record(recs) => {
                assert_eq!(recs.len(), 2);
                assert_eq!(recs[0][0].0, "Length");
                assert_eq!(recs[0][1].0, "Type");
            }
            _ => panic!("expected Record"),
        }
    }

    #[test]
    fn decode_repeating_record_template_cannot_be_empty() {
        let specs: &[FieldSpec] = &[Repeating { name: "X" }];
        let err = decode("Empty(0000)", specs, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, FinitudeError::SchemaError(_)));
    }

    #[test]
    fn decode_too_short_payload_errors() {
        let err = decode("SysTime(0202)", SYS_TIME, &[14]).unwrap_err();
        assert!(matches!(err, FinitudeError::Decode { .. }));
    }

    #[test]
    fn decode_invalid_utf8_uses_replacement_not_error() {
        let specs: &[FieldSpec] = &[F { reps: 4, kind: Utf8, name: "Name" }];
        let decoded = decode("Test", specs, &[0xff, 0xfe, b'a', 0]).unwrap();
        match &decoded.values[0].1 {
            Value::Str(s) => assert!(s.contains('a')),
            _ => panic!("expected Str"),
        }
    }

    fn reg_info_payload() -> Vec<u8> {
        let mut v = vec![0u8, 0x20];
        v.extend_from_slice(b"RLCSMAIN");
        v.push(0);
        v.push(0xbc);
        v.push(2); // NumRegisters
        v.extend_from_slice(&[10, 1]); // record 1: Length, Type
        v.extend_from_slice(&[0, 0]); // record 2: Length, Type
        v
    }
}
