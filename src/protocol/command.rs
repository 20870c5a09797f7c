// Command grammar and the command table
//
// Grammar: `NAME`, `NAME:ARG` or `NAME:ARG1,ARG2`. Names match exactly;
// the table maps each name to its argument parser and help summary.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::CommandError;

/// A parsed command with typed arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Calibration
    ZeroCal,
    RecalibrateBias,
    ScaleCal(f32),
    Calibrate(f32),
    CalKnown(f32),
    ManualCal { bias: f32, scale: f32 },
    ResetCal,
    CalStatus,
    SetBias(f32),
    SetScale(f32),
    SctInfo,

    // Auto-calibration
    AutoCalOn,
    AutoCalOff,
    AutoCalStatus,
    AutoCalSensitivity(f32),
    AutoCalLearningRate(f32),

    // Recognition
    ListDevices,
    RecognizeCurrent(f32),
    AutoRecognize,
    AddDevice {
        min: f32,
        max: f32,
        typical: f32,
        name: String,
    },

    // Learning
    LearningStats,
    ResetLearning,
    ApplyLearning,

    // Detection and diagnostics
    AutoDetect,
    AutoDetectOn,
    AutoDetectOff,
    GetCurrent,
    MeasurementStats,
    ResetStats,
    BufferAnalysis,

    // Relay and system
    RelayOn,
    RelayOff,
    RelayToggle,
    SystemStatus,
    Ping,
    GetConfig,
    Help,
}

type ArgParser = fn(Option<&str>) -> Result<Command, CommandError>;

/// One row of the command table
pub struct CommandEntry {
    pub name: &'static str,
    pub usage: &'static str,
    parse: ArgParser,
}

fn number(arg: Option<&str>) -> Result<f32, CommandError> {
    arg.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .ok_or(CommandError::InvalidFormat)
}

fn numbers<const N: usize>(arg: Option<&str>) -> Result<[f32; N], CommandError> {
    let raw = arg.ok_or(CommandError::InvalidFormat)?;
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != N {
        return Err(CommandError::InvalidFormat);
    }
    let mut values = [0.0f32; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        *slot = number(Some(part))?;
    }
    Ok(values)
}

fn parse_add_device(arg: Option<&str>) -> Result<Command, CommandError> {
    let raw = arg.ok_or(CommandError::InvalidFormat)?;
    let mut parts = raw.splitn(4, ',');
    let min = number(parts.next())?;
    let max = number(parts.next())?;
    let typical = number(parts.next())?;
    let name = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CommandError::InvalidFormat)?;
    Ok(Command::AddDevice {
        min,
        max,
        typical,
        name: name.to_string(),
    })
}

macro_rules! entry {
    ($name:literal, $usage:literal, $parse:expr) => {
        CommandEntry {
            name: $name,
            usage: $usage,
            parse: $parse,
        }
    };
}

/// Every recognised command, in HELP order
pub static COMMAND_TABLE: Lazy<Vec<CommandEntry>> = Lazy::new(|| {
    vec![
        entry!("ZERO_CAL", "ZERO_CAL", |_| Ok(Command::ZeroCal)),
        entry!("RECALIBRATE_BIAS", "RECALIBRATE_BIAS", |_| Ok(Command::RecalibrateBias)),
        entry!("SCALE_CAL", "SCALE_CAL:amps", |a| Ok(Command::ScaleCal(number(a)?))),
        entry!("CALIBRATE", "CALIBRATE:amps", |a| Ok(Command::Calibrate(number(a)?))),
        entry!("CAL_KNOWN", "CAL_KNOWN:amps", |a| Ok(Command::CalKnown(number(a)?))),
        entry!("MANUAL_CAL", "MANUAL_CAL:bias,scale", |a| {
            let [bias, scale] = numbers::<2>(a)?;
            Ok(Command::ManualCal { bias, scale })
        }),
        entry!("RESET_CAL", "RESET_CAL", |_| Ok(Command::ResetCal)),
        entry!("CAL_STATUS", "CAL_STATUS", |_| Ok(Command::CalStatus)),
        entry!("SET_BIAS", "SET_BIAS:volts", |a| Ok(Command::SetBias(number(a)?))),
        entry!("SET_SCALE", "SET_SCALE:amps_per_volt", |a| Ok(Command::SetScale(number(a)?))),
        entry!("SCT_INFO", "SCT_INFO", |_| Ok(Command::SctInfo)),
        entry!("AUTO_CAL_ON", "AUTO_CAL_ON", |_| Ok(Command::AutoCalOn)),
        entry!("AUTO_CAL_OFF", "AUTO_CAL_OFF", |_| Ok(Command::AutoCalOff)),
        entry!("AUTO_CAL_STATUS", "AUTO_CAL_STATUS", |_| Ok(Command::AutoCalStatus)),
        entry!("AUTO_CAL_SENSITIVITY", "AUTO_CAL_SENSITIVITY:0..1", |a| {
            Ok(Command::AutoCalSensitivity(number(a)?))
        }),
        entry!("AUTO_CAL_LEARNING_RATE", "AUTO_CAL_LEARNING_RATE:0..1", |a| {
            Ok(Command::AutoCalLearningRate(number(a)?))
        }),
        entry!("LIST_DEVICES", "LIST_DEVICES", |_| Ok(Command::ListDevices)),
        entry!("RECOGNIZE_CURRENT", "RECOGNIZE_CURRENT:amps", |a| {
            Ok(Command::RecognizeCurrent(number(a)?))
        }),
        entry!("AUTO_RECOGNIZE", "AUTO_RECOGNIZE", |_| Ok(Command::AutoRecognize)),
        entry!("ADD_DEVICE", "ADD_DEVICE:min,max,typical,name", parse_add_device),
        entry!("LEARNING_STATS", "LEARNING_STATS", |_| Ok(Command::LearningStats)),
        entry!("RESET_LEARNING", "RESET_LEARNING", |_| Ok(Command::ResetLearning)),
        entry!("APPLY_LEARNING", "APPLY_LEARNING", |_| Ok(Command::ApplyLearning)),
        entry!("AUTO_DETECT", "AUTO_DETECT", |_| Ok(Command::AutoDetect)),
        entry!("AUTO_DETECT_ON", "AUTO_DETECT_ON", |_| Ok(Command::AutoDetectOn)),
        entry!("AUTO_DETECT_OFF", "AUTO_DETECT_OFF", |_| Ok(Command::AutoDetectOff)),
        entry!("GET_CURRENT", "GET_CURRENT", |_| Ok(Command::GetCurrent)),
        entry!("MEASUREMENT_STATS", "MEASUREMENT_STATS", |_| Ok(Command::MeasurementStats)),
        entry!("RESET_STATS", "RESET_STATS", |_| Ok(Command::ResetStats)),
        entry!("BUFFER_ANALYSIS", "BUFFER_ANALYSIS", |_| Ok(Command::BufferAnalysis)),
        entry!("RELAY_ON", "RELAY_ON", |_| Ok(Command::RelayOn)),
        entry!("RELAY_OFF", "RELAY_OFF", |_| Ok(Command::RelayOff)),
        entry!("RELAY_TOGGLE", "RELAY_TOGGLE", |_| Ok(Command::RelayToggle)),
        entry!("SYSTEM_STATUS", "SYSTEM_STATUS", |_| Ok(Command::SystemStatus)),
        entry!("PING", "PING", |_| Ok(Command::Ping)),
        entry!("GET_CONFIG", "GET_CONFIG", |_| Ok(Command::GetConfig)),
        entry!("HELP", "HELP", |_| Ok(Command::Help)),
    ]
});

static COMMAND_INDEX: Lazy<HashMap<&'static str, &'static CommandEntry>> =
    Lazy::new(|| COMMAND_TABLE.iter().map(|entry| (entry.name, entry)).collect());

/// Look up a command name in the table
pub fn lookup(name: &str) -> Option<&'static CommandEntry> {
    COMMAND_INDEX.get(name).copied()
}

/// Split raw text into its name and optional argument string
pub fn split(raw: &str) -> (&str, Option<&str>) {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    match trimmed.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (trimmed, None),
    }
}

/// Parse raw command text
///
/// # Errors
/// - `UnknownCommand` carrying the raw text when no table entry matches
/// - `InvalidFormat` when the arguments do not parse
pub fn parse(raw: &str) -> Result<Command, CommandError> {
    let (name, arg) = split(raw);
    let entry = lookup(name).ok_or_else(|| CommandError::UnknownCommand {
        raw: raw.trim().to_string(),
    })?;
    (entry.parse)(arg)
}

impl Command {
    /// Name used as the prefix of the response line
    pub fn response_tag(&self) -> &'static str {
        match self {
            Command::ZeroCal | Command::RecalibrateBias => "ZERO_CAL",
            Command::ScaleCal(_) => "SCALE_CAL",
            Command::Calibrate(_) => "CALIBRATE",
            Command::CalKnown(_) => "CAL_KNOWN",
            Command::ManualCal { .. } => "MANUAL_CAL",
            Command::ResetCal => "RESET_CAL",
            Command::CalStatus => "CAL_STATUS",
            Command::SetBias(_) => "SET_BIAS",
            Command::SetScale(_) => "SET_SCALE",
            Command::SctInfo => "SCT_INFO",
            Command::AutoCalOn => "AUTO_CAL_ON",
            Command::AutoCalOff => "AUTO_CAL_OFF",
            Command::AutoCalStatus => "AUTO_CAL_STATUS",
            Command::AutoCalSensitivity(_) => "AUTO_CAL_SENSITIVITY",
            Command::AutoCalLearningRate(_) => "LEARNING_RATE",
            Command::ListDevices => "DEVICE_LIST",
            Command::RecognizeCurrent(_) => "DEVICE_RECOGNIZED",
            Command::AutoRecognize => "AUTO_RECOGNIZE",
            Command::AddDevice { .. } => "ADD_DEVICE",
            Command::LearningStats => "LEARNING_STATS",
            Command::ResetLearning => "RESET_LEARNING",
            Command::ApplyLearning => "APPLY_LEARNING",
            Command::AutoDetect => "AUTO_DETECT",
            Command::AutoDetectOn => "AUTO_DETECT_ON",
            Command::AutoDetectOff => "AUTO_DETECT_OFF",
            Command::GetCurrent => "CURRENT",
            Command::MeasurementStats => "MEASUREMENT_STATS",
            Command::ResetStats => "RESET_STATS",
            Command::BufferAnalysis => "BUFFER_ANALYSIS",
            Command::RelayOn => "RELAY_ON",
            Command::RelayOff => "RELAY_OFF",
            Command::RelayToggle => "RELAY_TOGGLE",
            Command::SystemStatus => "SYSTEM_STATUS",
            Command::Ping => "PONG",
            Command::GetConfig => "CONFIG",
            Command::Help => "HELP",
        }
    }
}

/// Tag used for an error response when parsing failed
///
/// Argument errors answer under the command's own tag; unknown names fall
/// back to `ERROR`.
pub fn error_tag(raw: &str) -> &'static str {
    let (name, _) = split(raw);
    match name {
        "AUTO_CAL_LEARNING_RATE" => "LEARNING_RATE",
        "RECOGNIZE_CURRENT" => "DEVICE_RECOGNIZED",
        "RECALIBRATE_BIAS" => "ZERO_CAL",
        _ => lookup(name).map(|entry| entry.name).unwrap_or("ERROR"),
    }
}
