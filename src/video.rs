//! ffprobe/ffmpeg wrappers: frame-rate discovery, demux into numbered frames
//! plus an audio track, and remux of the rendered frames.

use log::{debug, info};
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command as ProcCommand, Stdio};

use crate::error::{Error, Result};

/// Name pattern of extracted and rendered frames. Numbering starts at 1.
pub const FRAME_PATTERN: &str = "%06d.jpg";

/// Executables to run. Overridable with `FRAMEMAT_FFMPEG` / `FRAMEMAT_FFPROBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: OsString,
    pub ffprobe: OsString,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: env::var_os("FRAMEMAT_FFMPEG").unwrap_or_else(|| "ffmpeg".into()),
            ffprobe: env::var_os("FRAMEMAT_FFPROBE").unwrap_or_else(|| "ffprobe".into()),
        }
    }
}

/// What the probe tells us about the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Frame rate exactly as ffprobe printed it, e.g. `29.97`
    pub fps: String,
    pub has_audio: bool,
}

/// Parse ffprobe's human-readable stream listing.
pub fn parse_stream_info(text: &str) -> Result<StreamInfo> {
    let fps = text
        .lines()
        .filter(|l| l.contains("Stream") && l.contains("Video") && l.contains("fps"))
        .find_map(|l| {
            l.split(',')
                .map(str::trim)
                .find(|part| part.contains("fps"))
                .and_then(|part| part.split_whitespace().next())
                .map(str::to_string)
        })
        .ok_or_else(|| Error::config("cannot determine video frame rate from ffprobe output"))?;
    let has_audio = text.lines().any(|l| l.contains("Stream") && l.contains("Audio"));
    Ok(StreamInfo { fps, has_audio })
}

pub fn probe(input: &Path, tools: &ToolPaths) -> Result<StreamInfo> {
    let output = ProcCommand::new(&tools.ffprobe)
        .arg("-hide_banner")
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| tool_error(&tools.ffprobe, format!("cannot start: {}", e)))?;
    if !output.status.success() {
        return Err(tool_error(
            &tools.ffprobe,
            format!("{} ({})", output.status, String::from_utf8_lossy(&output.stderr).trim()),
        ));
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let info = parse_stream_info(&text)?;
    info!("Source {}: {} fps, audio: {}", input.display(), info.fps, info.has_audio);
    Ok(info)
}

/// ffmpeg arguments that split `input` into numbered frames in `frames_dir`
/// and, when `audio` is given, its audio track. The frame rate is forced to
/// the probed one so no frames are dropped or duplicated.
pub fn demux_args(input: &Path, fps: &str, frames_dir: &Path, audio: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-fflags", "+genpts", "-r", fps, "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.into());
    args.push("-fps_mode".into());
    args.push("passthrough".into());
    args.push(frames_dir.join(FRAME_PATTERN).into());
    if let Some(audio) = audio {
        args.push(audio.into());
    }
    args
}

/// ffmpeg arguments that join the frames in `frames_dir` (and `audio`) into `output`.
pub fn remux_args(frames_dir: &Path, fps: &str, audio: Option<&Path>, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> =
        ["-hide_banner", "-loglevel", "error", "-y", "-r", fps, "-i"].into_iter().map(OsString::from).collect();
    args.push(frames_dir.join(FRAME_PATTERN).into());
    if let Some(audio) = audio {
        args.push("-i".into());
        args.push(audio.into());
    }
    args.push("-r".into());
    args.push(fps.into());
    args.push(output.into());
    args
}

pub fn extract_frames(input: &Path, fps: &str, frames_dir: &Path, audio: Option<&Path>, tools: &ToolPaths) -> Result<()> {
    run_tool(&tools.ffmpeg, &demux_args(input, fps, frames_dir, audio))
}

pub fn assemble_video(frames_dir: &Path, fps: &str, audio: Option<&Path>, output: &Path, tools: &ToolPaths) -> Result<()> {
    run_tool(&tools.ffmpeg, &remux_args(frames_dir, fps, audio, output))
}

fn run_tool(program: &OsString, args: &[OsString]) -> Result<()> {
    debug!("Running {} {:?}", program.to_string_lossy(), args);
    let status = ProcCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .map_err(|e| tool_error(program, format!("cannot start: {}", e)))?;
    if !status.success() {
        return Err(tool_error(program, status.to_string()));
    }
    Ok(())
}

fn tool_error(program: &OsString, reason: String) -> Error {
    Error::ExternalTool { tool: program.to_string_lossy().into_owned(), reason }
}
