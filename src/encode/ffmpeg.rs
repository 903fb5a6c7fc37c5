use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub struct VideoSettings<'a> {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
    pub bitrate: Option<&'a str>,
}

/// Streams raw RGBA frames into an ffmpeg child process.
pub struct FfmpegEncoder {
    child: Child,
    frames: u64,
}

impl FfmpegEncoder {
    /// Video-only encode; the audio track is muxed in afterwards.
    pub fn new(output_path: &Path, settings: &VideoSettings<'_>) -> Result<Self> {
        let args = encode_args(output_path, settings);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec
        );

        Ok(Self { child, frames: 0 })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete ({} frames)", self.frames);
        Ok(())
    }
}

fn encode_args(output_path: &Path, settings: &VideoSettings<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height).into(),
        "-framerate".into(), settings.fps.to_string().into(),
        "-i".into(), "pipe:0".into(),
        "-c:v".into(), settings.codec.into(),
        "-pix_fmt".into(), settings.pix_fmt.into(),
    ];

    if let Some(br) = settings.bitrate {
        args.extend(["-b:v".into(), br.into()]);
    } else {
        args.extend(["-crf".into(), settings.crf.to_string().into()]);
        args.extend(["-preset".into(), "medium".into()]);
    }

    args.push(output_path.as_os_str().to_owned());
    args
}

fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(), video.as_os_str().to_owned(),
        "-i".into(), audio.as_os_str().to_owned(),
        "-map".into(), "0:v:0".into(),
        "-map".into(), "1:a:0".into(),
        "-c:v".into(), "copy".into(),
        "-c:a".into(), "aac".into(),
        "-b:a".into(), "192k".into(),
        "-shortest".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Combines an encoded video stream with the recorded audio output.
pub fn mux(video: &Path, audio: &Path, output: &Path) -> Result<()> {
    let result = Command::new("ffmpeg")
        .args(mux_args(video, audio, output))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("Failed to spawn ffmpeg for muxing")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!("FFmpeg mux failed:\n{}", stderr);
    }

    log::info!("Muxed audio into {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(bitrate: Option<&str>) -> VideoSettings<'_> {
        VideoSettings {
            width: 768,
            height: 320,
            fps: 60,
            codec: "libx264",
            pix_fmt: "yuv420p",
            crf: 18,
            bitrate,
        }
    }

    #[test]
    fn crf_mode_without_bitrate() {
        let args = encode_args(Path::new("out.mkv"), &settings(None));
        assert!(args.windows(2).any(|w| w[0] == "-video_size" && w[1] == "768x320"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert!(!args.iter().any(|a| a == "-b:v"));
        assert_eq!(args.last().unwrap(), "out.mkv");
    }

    #[test]
    fn bitrate_replaces_crf() {
        let args = encode_args(Path::new("out.mkv"), &settings(Some("5M")));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "5M"));
        assert!(!args.iter().any(|a| a == "-crf"));
    }

    #[test]
    fn mux_copies_video_and_encodes_audio() {
        let args = mux_args(Path::new("v.mkv"), Path::new("a.wav"), Path::new("o.mp4"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
        assert_eq!(args.last().unwrap(), "o.mp4");
    }
}
