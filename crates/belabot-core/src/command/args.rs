// ── Argument parsing ──
//
// Turns the words after a trigger into a typed `Action`. Everything that
// can be checked without the encoder state is checked here; a failure is
// a usage reply and never reaches the link.

use crate::config::BotCommand;
use crate::error::CoreError;

pub const BITRATE_RANGE: (i64, i64) = (500, 12_000);
pub const BITRATE_STEP: i64 = 250;
pub const LATENCY_RANGE: (i64, i64) = (100, 4_000);
pub const LATENCY_STEP: i64 = 100;
pub const AUDIO_DELAY_RANGE: (i64, i64) = (-2_000, 2_000);
pub const AUDIO_DELAY_STEP: i64 = 20;

/// A validated command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Stats,
    Modems,
    Sensor,
    Restart,
    Poweroff,
    /// Max bitrate in kbps, already rounded to the step.
    Bitrate(u32),
    /// `None` asks for the current value.
    Latency(Option<u64>),
    /// `None` asks for the current value.
    AudioDelay(Option<i32>),
    /// Interface id or custom label.
    Network(String),
    /// Pipeline query, lowercased.
    Pipeline(String),
    /// Audio source query, lowercased.
    AudioSrc(String),
}

impl Action {
    pub fn parse(command: BotCommand, trigger: &str, args: &[&str]) -> Result<Self, CoreError> {
        let usage = || CoreError::usage(format!("Usage: {trigger} {}", command.usage()));

        let action = match command {
            BotCommand::Start => Self::Start,
            BotCommand::Stop => Self::Stop,
            BotCommand::Stats => Self::Stats,
            BotCommand::Modems => Self::Modems,
            BotCommand::Sensor => Self::Sensor,
            BotCommand::Restart => Self::Restart,
            BotCommand::Poweroff => Self::Poweroff,
            BotCommand::Bitrate => {
                let raw = args.first().ok_or_else(usage)?;
                let value = parse_stepped(raw, BITRATE_RANGE, BITRATE_STEP)?;
                Self::Bitrate(narrow(value)?)
            }
            BotCommand::Latency => match args.first() {
                Some(raw) => {
                    let value = parse_stepped(raw, LATENCY_RANGE, LATENCY_STEP)?;
                    Self::Latency(Some(narrow(value)?))
                }
                None => Self::Latency(None),
            },
            BotCommand::AudioDelay => match args.first() {
                Some(raw) => {
                    let value = parse_stepped(raw, AUDIO_DELAY_RANGE, AUDIO_DELAY_STEP)?;
                    Self::AudioDelay(Some(narrow(value)?))
                }
                None => Self::AudioDelay(None),
            },
            BotCommand::Network => Self::Network((*args.first().ok_or_else(usage)?).to_owned()),
            BotCommand::Pipeline => Self::Pipeline(query(args).ok_or_else(usage)?),
            BotCommand::AudioSrc => Self::AudioSrc(query(args).ok_or_else(usage)?),
        };

        Ok(action)
    }
}

/// Parse an integer, check it against an inclusive range and round it to
/// the nearest step.
fn parse_stepped(raw: &str, (min, max): (i64, i64), step: i64) -> Result<i64, CoreError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| CoreError::usage(format!("Invalid number {raw} given")))?;

    if !(min..=max).contains(&value) {
        return Err(CoreError::usage(format!(
            "Invalid value: {value}, use a value between {min} - {max}"
        )));
    }

    Ok(round_to_step(value, step))
}

/// Round half away from zero to a multiple of `step`.
pub fn round_to_step(value: i64, step: i64) -> i64 {
    let magnitude = (value.abs() + step / 2) / step * step;
    if value < 0 { -magnitude } else { magnitude }
}

fn narrow<T: TryFrom<i64>>(value: i64) -> Result<T, CoreError> {
    T::try_from(value).map_err(|_| CoreError::Internal(format!("{value} out of range")))
}

fn query(args: &[&str]) -> Option<String> {
    let joined = args.join(" ").to_lowercase();
    (!joined.is_empty()).then_some(joined)
}

/// Normalize a name for matching: lowercase, underscores as spaces.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', " ")
}

/// Pick the choice whose normalized name equals the query, or failing that
/// the only one it is a prefix of.
pub fn pick<'a, T>(
    what: &str,
    query: &str,
    choices: impl IntoIterator<Item = (String, &'a T)>,
) -> Result<&'a T, CoreError> {
    let query = normalize(query);
    let mut prefixed = Vec::new();

    for (name, choice) in choices {
        let normalized = normalize(&name);
        if normalized == query {
            return Ok(choice);
        }
        if normalized.starts_with(&query) {
            prefixed.push((name, choice));
        }
    }

    match prefixed.len() {
        0 => Err(CoreError::usage(format!("{what} not found"))),
        1 => Ok(prefixed.remove(0).1),
        _ => {
            let mut names: Vec<String> = prefixed.into_iter().map(|(name, _)| name).collect();
            names.sort();
            Err(CoreError::usage(format!(
                "{what} is ambiguous: {}",
                names.join(", ")
            )))
        }
    }
}
