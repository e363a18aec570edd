//! Audio and video conversion through an external FFmpeg binary

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{
    AudioOptions, ConversionOptions, FormatCategory, FormatTag, VideoOptions,
};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

/// Lines of FFmpeg stderr kept in the error detail
const STDERR_TAIL_LINES: usize = 5;

pub struct FfmpegConverter {
    ffmpeg_path: String,
}

impl FfmpegConverter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    fn audio_codec(ext: &str) -> Option<&'static str> {
        let codec = match ext {
            "mp3" => "libmp3lame",
            "aac" | "m4a" => "aac",
            "wav" => "pcm_s16le",
            "ogg" => "libvorbis",
            "flac" => "flac",
            "wma" => "wmav2",
            "aiff" | "au" => "pcm_s16be",
            _ => return None,
        };
        Some(codec)
    }

    /// (video codec, audio codec) per container
    fn video_codecs(ext: &str) -> Option<(&'static str, &'static str)> {
        let codecs = match ext {
            "mp4" | "m4v" | "mov" | "mkv" => ("libx264", "aac"),
            "webm" => ("libvpx-vp9", "libopus"),
            "avi" => ("mpeg4", "libmp3lame"),
            "wmv" => ("wmv2", "wmav2"),
            "flv" => ("flv1", "libmp3lame"),
            "ogv" => ("libtheora", "libvorbis"),
            _ => return None,
        };
        Some(codecs)
    }

    /// FFmpeg arguments for one conversion. Kept free of I/O so it can be tested.
    pub fn build_args(
        input: &Path,
        output: &Path,
        source: &FormatTag,
        target: &FormatTag,
        options: &ConversionOptions,
    ) -> Result<Vec<String>, ConversionError> {
        let target_ext = target.extension();
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        let video_options = match options {
            ConversionOptions::Video(video) => video.clone(),
            _ => VideoOptions::default(),
        };
        let audio_options = match options {
            ConversionOptions::Audio(audio) => audio.clone(),
            _ => AudioOptions {
                bitrate_kbps: video_options.audio_bitrate_kbps,
                sample_rate_hz: None,
            },
        };

        if target_ext == "gif" && source.category() == FormatCategory::Video {
            let height = video_options
                .max_height
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-1".to_string());
            args.extend([
                "-vf".to_string(),
                format!(
                    "fps={},scale=-2:{}:flags=lanczos",
                    video_options.gif_fps.max(1),
                    height
                ),
                "-loop".to_string(),
                "0".to_string(),
                "-an".to_string(),
            ]);
        } else if let Some(codec) = Self::audio_codec(&target_ext) {
            args.extend(["-vn".to_string(), "-acodec".to_string(), codec.to_string()]);
            if let Some(kbps) = audio_options.bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{kbps}k")]);
            }
            if let Some(rate) = audio_options.sample_rate_hz {
                args.extend(["-ar".to_string(), rate.to_string()]);
            }
            if target_ext == "aac" {
                args.extend(["-f".to_string(), "adts".to_string()]);
            }
        } else if let Some((video_codec, audio_codec)) = Self::video_codecs(&target_ext) {
            args.extend([
                "-c:v".to_string(),
                video_codec.to_string(),
                "-c:a".to_string(),
                audio_codec.to_string(),
            ]);
            if let Some(height) = video_options.max_height {
                args.extend(["-vf".to_string(), format!("scale=-2:'min({height},ih)'")]);
            }
            if let Some(kbps) = video_options.audio_bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{kbps}k")]);
            }
            if video_codec == "libx264" {
                args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
            }
        } else {
            return Err(ConversionError::not_implemented(source, target));
        }

        args.push("-y".to_string());
        args.push(output.to_string_lossy().to_string());
        Ok(args)
    }

    fn stderr_tail(stderr: &[u8]) -> String {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }

    async fn run(&self, args: &[String]) -> Result<(), ConversionError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConversionError::Tool(format!("Failed to execute {}: {}", self.ffmpeg_path, e))
            })?;

        if !output.status.success() {
            return Err(ConversionError::Tool(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                Self::stderr_tail(&output.stderr)
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool {
        let target_ext = target.extension();
        match source.category() {
            FormatCategory::Video => {
                target_ext == "gif"
                    || Self::audio_codec(&target_ext).is_some()
                    || Self::video_codecs(&target_ext).is_some()
            }
            FormatCategory::Audio => Self::audio_codec(&target_ext).is_some(),
            _ => false,
        }
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        let input_temp = tempfile::Builder::new()
            .prefix("convertr-in-")
            .suffix(&format!(".{}", input.source.extension()))
            .tempfile()?;
        tokio::fs::write(input_temp.path(), &input.data).await?;

        let output_temp = tempfile::Builder::new()
            .prefix("convertr-out-")
            .suffix(&format!(".{}", input.target.extension()))
            .tempfile()?;

        let args = Self::build_args(
            input_temp.path(),
            output_temp.path(),
            &input.source,
            &input.target,
            &input.options,
        )?;

        let start = std::time::Instant::now();
        self.run(&args).await?;

        let data = tokio::fs::read(output_temp.path()).await?;
        tracing::debug!(
            source = %input.source,
            target = %input.target,
            input_bytes = input.data.len(),
            output_bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "ffmpeg conversion finished"
        );

        if data.is_empty() {
            return Err(ConversionError::Tool("ffmpeg produced no output".to_string()));
        }

        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(source: &str, target: &str, options: ConversionOptions) -> Vec<String> {
        FfmpegConverter::build_args(
            &PathBuf::from("/tmp/in"),
            &PathBuf::from("/tmp/out"),
            &FormatTag::new(source),
            &FormatTag::new(target),
            &options,
        )
        .unwrap()
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_audio_transcode_args() {
        let options = ConversionOptions::Audio(AudioOptions {
            bitrate_kbps: Some(192),
            sample_rate_hz: Some(44_100),
        });
        let built = args("wav", "mp3", options);
        assert_eq!(window(&built, "-i").as_deref(), Some("/tmp/in"));
        assert_eq!(window(&built, "-acodec").as_deref(), Some("libmp3lame"));
        assert_eq!(window(&built, "-b:a").as_deref(), Some("192k"));
        assert_eq!(window(&built, "-ar").as_deref(), Some("44100"));
        assert_eq!(built.last().map(String::as_str), Some("/tmp/out"));
    }

    #[test]
    fn test_audio_extraction_drops_video() {
        let args = args(
            "mp4",
            "aac",
            ConversionOptions::Video(VideoOptions::default()),
        );
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(window(&args, "-f").as_deref(), Some("adts"));
    }

    #[test]
    fn test_video_to_gif_args() {
        let options = ConversionOptions::Video(VideoOptions {
            max_height: Some(240),
            gif_fps: 12,
            ..Default::default()
        });
        let args = args("mp4", "gif", options);
        assert_eq!(
            window(&args, "-vf").as_deref(),
            Some("fps=12,scale=-2:240:flags=lanczos")
        );
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_video_transcode_args() {
        let webm = args("mov", "webm", ConversionOptions::Video(VideoOptions::default()));
        assert_eq!(window(&webm, "-c:v").as_deref(), Some("libvpx-vp9"));
        assert_eq!(window(&webm, "-c:a").as_deref(), Some("libopus"));
        assert!(!webm.contains(&"-pix_fmt".to_string()));

        let mp4 = args("avi", "mp4", ConversionOptions::Video(VideoOptions::default()));
        assert_eq!(window(&mp4, "-pix_fmt").as_deref(), Some("yuv420p"));
    }

    #[test]
    fn test_handles() {
        let converter = FfmpegConverter::new("ffmpeg");
        assert!(converter.handles(&"mp4".into(), &"gif".into()));
        assert!(converter.handles(&"flac".into(), &"ogg".into()));
        assert!(!converter.handles(&"mp3".into(), &"gif".into()));
        assert!(!converter.handles(&"png".into(), &"jpg".into()));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = b"a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(FfmpegConverter::stderr_tail(stderr), "c\nd\ne\nf\ng");
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_error() {
        let converter = FfmpegConverter::new("/nonexistent/ffmpeg-binary");
        let result = converter
            .convert(ConversionInput {
                data: Bytes::from_static(b"RIFF"),
                file_name: "a.wav".to_string(),
                source: FormatTag::new("wav"),
                target: FormatTag::new("mp3"),
                options: ConversionOptions::Audio(AudioOptions::default()),
            })
            .await;
        assert!(matches!(result, Err(ConversionError::Tool(_))));
    }
}
