// SPDX-License-Identifier: MPL-2.0

//! Line commands read from stdin, and the single-instance lock.

use crate::LiveWall;
use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};
use sctk::reexports::calloop::{LoopHandle, channel};
use std::{
    fs::{self, File},
    io::{self, BufRead},
    path::{Path, PathBuf},
    thread,
};

const LOCK_FILE: &str = "livewall.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log the senders currently publishing.
    Senders,
    /// Follow a sender, or any sender.
    Sender(Option<String>),
    Video(PathBuf),
    Image(PathBuf),
    /// Show a downloaded daily image, or the newest cached one.
    Daily {
        path: Option<PathBuf>,
        description: String,
    },
    /// Missing arguments fall back to the persisted slideshow settings.
    Slideshow {
        folder: Option<PathBuf>,
        interval: Option<u64>,
        random: Option<bool>,
    },
    About,
    /// `Some(true)` keeps the current wallpaper, `None` uses the configured default.
    Quit(Option<bool>),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs a path")]
    MissingPath(&'static str),
    #[error("unexpected argument `{0}`")]
    Argument(String),
}

/// Parses one line of the control channel.
///
/// # Errors
///
/// Fails on unknown commands or malformed arguments.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let path = |name: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingPath(name))
        } else {
            Ok(PathBuf::from(rest))
        }
    };

    match word {
        "" => Err(ParseError::Empty),
        "senders" => Ok(Command::Senders),
        "sender" => Ok(Command::Sender((!rest.is_empty()).then(|| rest.to_owned()))),
        "video" => path("video").map(Command::Video),
        "image" => path("image").map(Command::Image),
        "daily" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            let path = args.next().filter(|p| !p.is_empty()).map(PathBuf::from);
            let description = args.next().unwrap_or_default().trim().to_owned();
            Ok(Command::Daily { path, description })
        }
        "slideshow" => parse_slideshow(rest),
        "about" => Ok(Command::About),
        "quit" | "exit" => match rest {
            "" => Ok(Command::Quit(None)),
            "keep" => Ok(Command::Quit(Some(true))),
            "restore" => Ok(Command::Quit(Some(false))),
            other => Err(ParseError::Argument(other.to_owned())),
        },
        other => Err(ParseError::Unknown(other.to_owned())),
    }
}

fn parse_slideshow(args: &str) -> Result<Command, ParseError> {
    let mut folder = None;
    let mut interval = None;
    let mut random = None;

    for arg in args.split_whitespace() {
        match arg {
            "random" => random = Some(true),
            "ordered" | "sequential" => random = Some(false),
            arg => match arg.parse::<u64>() {
                Ok(seconds) if interval.is_none() => interval = Some(seconds),
                Ok(_) => return Err(ParseError::Argument(arg.to_owned())),
                Err(_) if folder.is_none() => folder = Some(PathBuf::from(arg)),
                Err(_) => return Err(ParseError::Argument(arg.to_owned())),
            },
        }
    }

    Ok(Command::Slideshow {
        folder,
        interval,
        random,
    })
}

/// Forwards stdin lines to the event loop as commands.
///
/// # Errors
///
/// Fails if the channel cannot be added to the event loop.
pub fn stdin_source(handle: &LoopHandle<'static, LiveWall>) -> eyre::Result<()> {
    let (tx, rx) = channel::sync_channel(20);

    handle
        .insert_source(rx, |event: channel::Event<Command>, _, state| match event {
            channel::Event::Msg(command) => state.handle(command),
            channel::Event::Closed => tracing::debug!("control channel closed"),
        })
        .map_err(|err| eyre::eyre!("{}", err))?;

    thread::Builder::new()
        .name(String::from("livewall-stdin"))
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };

                match parse_command(&line) {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(ParseError::Empty) => (),
                    Err(why) => tracing::warn!(%why, "ignoring command"),
                }
            }
        })?;

    Ok(())
}

/// Finds a video given on the command line.
///
/// Tried in order: the argument itself, then relative to the executable's
/// directory, its `videos` directory and the user's video directory.
#[must_use]
pub fn resolve_video(arg: &str) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    let mut search = Vec::new();
    if let Some(dir) = exe_dir {
        search.push(dir.join("videos"));
        search.insert(0, dir);
    }
    search.extend(dirs::video_dir());

    resolve_video_in(arg, &search)
}

fn resolve_video_in(arg: &str, search: &[PathBuf]) -> Option<PathBuf> {
    let path = Path::new(arg);
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    search
        .iter()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
}

/// Takes the instance lock in `dir`. `None` means another instance holds it.
///
/// # Errors
///
/// Fails if the lock file cannot be created.
pub fn lock_instance(dir: &Path) -> io::Result<Option<Flock<File>>> {
    fs::create_dir_all(dir)?;
    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(dir.join(LOCK_FILE))?;

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(lock) => Ok(Some(lock)),
        Err((_, Errno::EAGAIN)) => Ok(None),
        Err((_, errno)) => Err(errno.into()),
    }
}
