// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A line based terminal shell for the quiz.

use std::io;

use tokio::{
    select,
    sync::{
        broadcast::error::RecvError,
        mpsc::{Receiver, Sender},
    },
    task::JoinHandle,
};
use tracing::{info, span, warn, Level};

use crate::chord::Quality;
use crate::round::{Playback, RoundEvent, RoundMachine};

const BEGIN: &str = "begin";
const REPLAY: &str = "replay";
const NEXT: &str = "next";
const COMPARE: &str = "compare";
const SCORE: &str = "score";
const QUIT: &str = "quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Begin,
    Replay,
    Answer(Quality),
    Next,
    Compare(Quality),
    Score,
    Quit,
}

/// Parses a line of input. Returns None for anything unrecognized.
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim().to_lowercase();
    let mut words = input.split_whitespace();
    let command = match words.next()? {
        BEGIN => Command::Begin,
        REPLAY | "r" => Command::Replay,
        NEXT | "n" => Command::Next,
        SCORE => Command::Score,
        QUIT => Command::Quit,
        COMPARE => Command::Compare(words.next()?.parse().ok()?),
        other => Command::Answer(other.parse().ok()?),
    };
    match words.next() {
        Some(_) => None,
        None => Some(command),
    }
}

/// Reads one command from the reader. Returns false once input is exhausted
/// or the user quits.
fn monitor_io<R, W>(commands_tx: &Sender<Command>, mut reader: R, mut writer: W) -> io::Result<bool>
where
    R: io::BufRead,
    W: io::Write,
{
    write!(writer, "> ")?;
    writer.flush()?;
    let mut input = String::default();
    if reader.read_line(&mut input)? == 0 {
        send(commands_tx, Command::Quit)?;
        return Ok(false);
    }
    if input.trim().is_empty() {
        return Ok(true);
    }

    match parse_command(&input) {
        Some(command) => {
            send(commands_tx, command)?;
            Ok(command != Command::Quit)
        }
        None => {
            warn!(input = input.trim(), "Unrecognized input");
            writeln!(writer, "Unrecognized command. {}", HELP)?;
            Ok(true)
        }
    }
}

fn send(commands_tx: &Sender<Command>, command: Command) -> io::Result<()> {
    commands_tx
        .blocking_send(command)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Reads commands from stdin until the user quits or input ends.
pub fn read_stdin(commands_tx: Sender<Command>) -> JoinHandle<io::Result<()>> {
    tokio::task::spawn_blocking(move || {
        let span = span!(Level::INFO, "terminal reader");
        let _enter = span.enter();

        info!("Terminal reader started.");
        while monitor_io(&commands_tx, io::stdin().lock(), io::stdout())? {}
        Ok(())
    })
}

const HELP: &str =
    "Commands: begin, replay (r), major (maj), minor (min), next (n), compare major|minor, score, quit";

/// Applies a command to the machine. Returns a message for the user, if any.
pub fn dispatch<P: Playback>(machine: &RoundMachine<P>, command: Command) -> Option<String> {
    match command {
        Command::Begin => {
            machine.begin();
            None
        }
        Command::Replay => (!machine.replay()).then(|| "Nothing to replay yet.".to_string()),
        Command::Answer(quality) => match machine.answer(quality) {
            Some(_) => None,
            None => Some("Not accepting answers right now.".to_string()),
        },
        Command::Next => (!machine.next()).then(|| "Answer the current chord first.".to_string()),
        Command::Compare(quality) => (!machine.compare(quality))
            .then(|| "Compare is available after answering.".to_string()),
        Command::Score => Some(machine.snapshot().score.to_string()),
        Command::Quit => None,
    }
}

/// Renders an event for the terminal.
pub fn describe(event: &RoundEvent) -> String {
    match event {
        RoundEvent::RoundStarted { .. } => "New round. Listen...".to_string(),
        RoundEvent::AnswerGateOpened => "Major or minor?".to_string(),
        RoundEvent::Answered(outcome) => {
            let mut message = if outcome.correct {
                format!(
                    "Correct! {} {} ({}).",
                    outcome.root_name, outcome.expected, outcome.notes_label
                )
            } else {
                format!(
                    "Wrong. It was {} {} ({}), not {}.",
                    outcome.root_name, outcome.expected, outcome.notes_label, outcome.chosen
                )
            };
            if outcome.ended_best && outcome.previous_streak > 1 {
                message.push_str(&format!(
                    " Streak of {} ended. That was your best!",
                    outcome.previous_streak
                ));
            } else if !outcome.correct && outcome.previous_streak > 1 {
                message.push_str(&format!(" Streak of {} ended.", outcome.previous_streak));
            }
            message.push_str(&format!("\n{}", outcome.score));
            message
        }
        RoundEvent::PlaybackFailed(e) => format!("Playback failed: {}. Type replay to retry.", e),
    }
}

/// Runs the shell until a quit command arrives or the command channel closes.
pub async fn run<P, W>(
    machine: RoundMachine<P>,
    mut commands_rx: Receiver<Command>,
    mut writer: W,
) -> io::Result<()>
where
    P: Playback,
    W: io::Write,
{
    let mut events = machine.subscribe();
    writeln!(writer, "{}", HELP)?;

    loop {
        select! {
            command = commands_rx.recv() => {
                let command = match command {
                    None | Some(Command::Quit) => break,
                    Some(command) => command,
                };
                if let Some(message) = dispatch(&machine, command) {
                    writeln!(writer, "{}", message)?;
                }
            }
            event = events.recv() => match event {
                Ok(event) => writeln!(writer, "{}", describe(&event))?,
                Err(RecvError::Lagged(missed)) => warn!(missed, "Shell fell behind on events"),
                Err(RecvError::Closed) => break,
            },
        }
        writer.flush()?;
    }

    info!("Shell finished.");
    Ok(())
}
