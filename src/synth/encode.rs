use std::ffi::OsString;
use std::path::Path;

use crate::config::SynthSettings;
use crate::tools::input_arg;

use super::subtitles::escape_filter_path;

/// Cap the longer edge at `max_edge` without upscaling, keeping the other
/// dimension even.
pub fn scale_filter(max_edge: u32) -> String {
    format!("scale='if(gt(iw,ih),min(iw,{max_edge}),-2)':'if(gt(iw,ih),-2,min(ih,{max_edge}))'")
}

pub fn video_filter(max_edge: u32, subtitles: Option<&Path>) -> String {
    let scale = scale_filter(max_edge);
    match subtitles {
        Some(srt) => format!("{scale},subtitles='{}'", escape_filter_path(srt)),
        None => scale,
    }
}

/// Encoders to try in order, each with its attempt budget. Attempts only
/// repeat after timeouts. Without acceleration only the software budget applies.
pub fn encoder_plan(settings: &SynthSettings, use_accelerated: bool) -> Vec<(&str, u32)> {
    let software = (settings.software_codec.as_str(), settings.software_attempts);
    if use_accelerated {
        vec![(settings.accelerated_codec.as_str(), settings.accelerated_attempts), software]
    } else {
        vec![software]
    }
}

pub struct EncodeJob<'p> {
    pub cover: &'p Path,
    pub audio: &'p Path,
    pub output: &'p Path,
    pub subtitles: Option<&'p Path>,
    pub video_codec: &'p str,
}

/// `ffmpeg` arguments looping the cover as video against the audio track.
pub fn encode_args(job: &EncodeJob<'_>, settings: &SynthSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-loop", "1", "-i"].map(OsString::from).to_vec();
    args.push(input_arg(job.cover));
    args.push("-i".into());
    args.push(input_arg(job.audio));
    for a in [
        "-c:v",
        job.video_codec,
        "-c:a",
        settings.audio_codec.as_str(),
        "-b:a",
        settings.audio_bitrate.as_str(),
        "-pix_fmt",
        "yuv420p",
    ] {
        args.push(a.into());
    }
    args.push("-vf".into());
    args.push(video_filter(settings.max_edge, job.subtitles).into());
    args.push("-shortest".into());
    args.push(input_arg(job.output));
    args
}
