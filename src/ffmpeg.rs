// SPDX-License-Identifier: MPL-2.0

//! Video decoding through `ffmpeg` and `ffprobe` child processes.

use crate::{
    error::SourceError,
    sources::{FrameProducer, ReadOutcome, VideoInfo},
};
use serde::Deserialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
};

const DEFAULT_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Parses an ffprobe rate such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (
            num.trim().parse::<f64>().ok()?,
            den.trim().parse::<f64>().ok()?,
        ),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };

    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_probe(path: &Path, json: &[u8]) -> Result<VideoInfo, SourceError> {
    let probe_error = |reason: String| SourceError::Probe {
        path: path.to_path_buf(),
        reason,
    };

    let output: ProbeOutput =
        serde_json::from_slice(json).map_err(|why| probe_error(why.to_string()))?;

    let stream = output
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .or_else(|| output.streams.first())
        .ok_or_else(|| probe_error(String::from("no video stream")))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        _ => return Err(probe_error(String::from("video stream has no dimensions"))),
    };

    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_rate(rate))
        .unwrap_or(DEFAULT_FRAME_RATE);

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
    })
}

/// Decodes video files to BGRA frames with an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegProducer {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl FfmpegProducer {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            child: None,
            stdout: None,
        }
    }
}

impl FrameProducer for FfmpegProducer {
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError> {
        if !path.is_file() {
            return Err(SourceError::MissingFile(path.to_path_buf()));
        }

        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=codec_type,width,height,r_frame_rate,avg_frame_rate")
            .arg("-of")
            .arg("json")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SourceError::Spawn {
                program: self.ffprobe.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Probe {
                path: path.to_path_buf(),
                reason: format!("ffprobe {}: {}", output.status, stderr.trim()),
            });
        }

        parse_probe(path, &output.stdout)
    }

    fn open(&mut self, path: &Path, info: &VideoInfo) -> Result<(), SourceError> {
        self.close();

        let mut child = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-re")
            .arg("-i")
            .arg(path)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("bgra")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        tracing::debug!(
            path = %path.display(),
            pid = child.id(),
            width = info.width,
            height = info.height,
            "spawned ffmpeg"
        );

        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> ReadOutcome {
        let Some(stdout) = self.stdout.as_mut() else {
            return ReadOutcome::EndOfStream;
        };

        match stdout.read_exact(buf) {
            Ok(()) => ReadOutcome::Frame,
            Err(why) if why.kind() == io::ErrorKind::UnexpectedEof => ReadOutcome::EndOfStream,
            Err(why) => {
                tracing::warn!(?why, "reading from ffmpeg failed");
                ReadOutcome::EndOfStream
            }
        }
    }

    fn close(&mut self) {
        self.stdout = None;

        if let Some(mut child) = self.child.take() {
            // exits on its own at end of file
            if let Ok(None) = child.try_wait() {
                _ = child.kill();
            }
            _ = child.wait();
        }
    }

    fn is_open(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for FfmpegProducer {
    fn drop(&mut self) {
        self.close();
    }
}
