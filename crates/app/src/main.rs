mod commands;
mod config;

use std::io::{self, BufRead, Write};

use commands::{Command, HELP};
use config::Config;
use looper_core::{Looper, TRACK_COUNT};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load();
    let mut looper = Looper::new(config.to_options());
    log::info!("Looper ready, {TRACK_COUNT} tracks. Type 'help' for commands.");

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match Command::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => run(&mut looper, &config, command),
            Ok(None) => {}
            Err(err) => println!("{err}"),
        }
        looper.poll();
        prompt()?;
    }

    if looper.is_recording() {
        log::info!("Discarding unfinished recording");
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn run(looper: &mut Looper, config: &Config, command: Command) {
    let result = match command {
        Command::Record(track) => looper
            .record_start(track)
            .map(|()| println!("Recording track {}", track + 1)),
        Command::Stop => looper.record_stop().map(|recorded| match recorded {
            Some(recorded) => println!(
                "Track {}: {} frames captured, loop is {} frames",
                recorded.track + 1,
                recorded.captured_frames,
                recorded.loop_frames
            ),
            None => println!("Not recording"),
        }),
        Command::Play => looper
            .play_toggle()
            .map(|state| println!("Playback {state:?}")),
        Command::Mute(track) => looper.toggle_mute(track).map(|enabled| {
            println!(
                "Track {} {}",
                track + 1,
                if enabled { "unmuted" } else { "muted" }
            )
        }),
        Command::Volume(track, percent) => looper
            .set_volume(track, percent)
            .map(|()| println!("Track {} volume {percent}%", track + 1)),
        Command::Clear(track) => looper
            .clear_track(track)
            .map(|()| println!("Track {} cleared", track + 1)),
        Command::Export(name) => looper
            .export_mix(&name)
            .map(|path| println!("Saved mix to: {}", path.display())),
        Command::Status => {
            print_status(looper);
            Ok(())
        }
        Command::Wave(track) => looper.waveform(track).map(|waveform| {
            if waveform.points.is_empty() {
                println!("Track {} is empty", track + 1);
            }
            for (seconds, amplitude) in waveform.points {
                println!("{seconds:8.3}s {amplitude:+.4}");
            }
        }),
        Command::SaveConfig => {
            config.save();
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(err) = result {
        println!("Error: {err}");
    }
}

fn print_status(looper: &Looper) {
    match looper.loop_length_secs() {
        Some(secs) => println!("Loop: {secs:.2}s"),
        None => println!("Loop: none"),
    }
    match looper.position() {
        Some(frame) => println!("Playing at frame {frame}"),
        None => println!("Stopped"),
    }
    if let Some(track) = looper.recording_track() {
        println!("Recording track {}", track + 1);
    }

    for track in 0..TRACK_COUNT {
        let populated = matches!(looper.snapshot(track), Ok(Some(_)));
        let enabled = looper.track_enabled(track).unwrap_or(false);
        let gain = looper.track_gain(track).unwrap_or(0.0);
        println!(
            "  {}: {:<6} {:<7} vol {:>3}%",
            track + 1,
            if populated { "loaded" } else { "empty" },
            if enabled { "on" } else { "muted" },
            (gain * 100.0).round() as u32
        );
    }
}
