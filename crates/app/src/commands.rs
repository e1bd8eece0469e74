use looper_core::TRACK_COUNT;

/// A line typed at the looper prompt. Track numbers are 0-based here; the
/// prompt takes them 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Record(usize),
    Stop,
    Play,
    Mute(usize),
    Volume(usize, u8),
    Clear(usize),
    Export(String),
    Status,
    Wave(usize),
    SaveConfig,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("'{0}' needs {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("track must be 1-4, got '{0}'")]
    BadTrack(String),
    #[error("volume must be 0-100, got '{0}'")]
    BadVolume(String),
}

pub const HELP: &str = "\
rec N       record onto track N (1-4)
stop        stop recording and commit the take
play        start or stop playback
mute N      toggle mute on track N
vol N P     set track N volume to P percent
clear N     empty track N
export NAME write the mix to NAME.wav
status      show loop and track state
wave N      print track N's waveform
save-config write the current settings file
quit        exit";

fn track(word: Option<&str>, command: &'static str) -> Result<usize, ParseError> {
    let word = word.ok_or(ParseError::MissingArgument(command, "a track number"))?;
    match word.parse::<usize>() {
        Ok(n) if (1..=TRACK_COUNT).contains(&n) => Ok(n - 1),
        _ => Err(ParseError::BadTrack(word.to_string())),
    }
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "rec" | "record" => Command::Record(track(words.next(), "rec")?),
            "stop" => Command::Stop,
            "play" => Command::Play,
            "mute" => Command::Mute(track(words.next(), "mute")?),
            "vol" | "volume" => {
                let track = track(words.next(), "vol")?;
                let percent = words
                    .next()
                    .ok_or(ParseError::MissingArgument("vol", "a percentage"))?;
                match percent.parse::<u8>() {
                    Ok(p) if p <= 100 => Command::Volume(track, p),
                    _ => return Err(ParseError::BadVolume(percent.to_string())),
                }
            }
            "clear" => Command::Clear(track(words.next(), "clear")?),
            "export" => {
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(ParseError::MissingArgument("export", "a file name"));
                }
                Command::Export(name)
            }
            "status" => Command::Status,
            "wave" => Command::Wave(track(words.next(), "wave")?),
            "save-config" => Command::SaveConfig,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_tracks_are_one_based() {
        assert_eq!(Command::parse("rec 1"), Ok(Some(Command::Record(0))));
        assert_eq!(Command::parse("mute 4"), Ok(Some(Command::Mute(3))));
        assert_eq!(
            Command::parse("rec 0"),
            Err(ParseError::BadTrack("0".into()))
        );
        assert_eq!(
            Command::parse("clear 5"),
            Err(ParseError::BadTrack("5".into()))
        );
    }

    #[test]
    fn test_volume() {
        assert_eq!(
            Command::parse("vol 2 75"),
            Ok(Some(Command::Volume(1, 75)))
        );
        assert_eq!(
            Command::parse("vol 2 101"),
            Err(ParseError::BadVolume("101".into()))
        );
        assert_eq!(
            Command::parse("vol 2"),
            Err(ParseError::MissingArgument("vol", "a percentage"))
        );
    }

    #[test]
    fn test_export_name_keeps_spaces() {
        assert_eq!(
            Command::parse("export late night jam"),
            Ok(Some(Command::Export("late night jam".into())))
        );
        assert!(Command::parse("export").is_err());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(Command::parse("PLAY"), Ok(Some(Command::Play)));
        assert_eq!(Command::parse("stop"), Ok(Some(Command::Stop)));
        assert_eq!(Command::parse("q"), Ok(Some(Command::Quit)));
        assert_eq!(
            Command::parse("dance"),
            Err(ParseError::Unknown("dance".into()))
        );
    }
}
