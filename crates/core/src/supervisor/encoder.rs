//! Encoder process seam: argument construction, spawning, and the handle
//! the watcher uses to monitor and terminate a running encoder.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};

use super::SupervisorConfig;
use crate::job::{EncodeParams, Job, Orientation};
use crate::media::ResolvedSource;

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("encoder binary not found: {0}")]
    BinaryNotFound(String),

    #[error("failed to spawn encoder: {0}")]
    Spawn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to launch one encoder run.
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub job_id: String,
    pub input: ResolvedSource,
    pub publish_url: String,
    pub params: EncodeParams,
}

impl EncodePlan {
    pub fn from_job(job: &Job, input: ResolvedSource) -> Self {
        Self {
            job_id: job.id.clone(),
            input,
            publish_url: job.destination.publish_url(),
            params: job.encode.clone(),
        }
    }
}

/// How an encoder run ended, as observed by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderExit {
    /// Exit code zero.
    Clean,
    /// Non-zero exit; message carries the code and a stderr tail.
    Failed { message: String },
}

/// Builds the ffmpeg argv for an encode plan.
///
/// The source is read at native rate (`-re`) so the push matches real time,
/// optionally looped forever, scaled to the requested resolution (swapped
/// for vertical output), and pushed as FLV over RTMP.
pub fn build_encoder_args(plan: &EncodePlan) -> Vec<String> {
    let params = &plan.params;
    let mut args = vec!["-re".to_string()];

    if params.loop_source {
        args.extend(["-stream_loop".to_string(), "-1".to_string()]);
    }

    if let ResolvedSource::ConcatList(_) = plan.input {
        args.extend([
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
        ]);
    }

    args.extend([
        "-i".to_string(),
        plan.input.path().to_string_lossy().to_string(),
    ]);

    let scale = match params.orientation {
        Orientation::Horizontal => params.resolution.replace('x', ":"),
        Orientation::Vertical => {
            // Swap the axes so a 1280x720 preset becomes a 720x1280 output.
            let mut parts = params.resolution.splitn(2, 'x');
            let w = parts.next().unwrap_or("1280");
            let h = parts.next().unwrap_or("720");
            format!("{}:{}", h, w)
        }
    };

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-b:v".to_string(),
        format!("{}k", params.bitrate_kbps),
        "-maxrate".to_string(),
        format!("{}k", params.bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", params.bitrate_kbps * 2),
        "-r".to_string(),
        params.fps.to_string(),
        "-g".to_string(),
        (params.fps * 2).to_string(),
        "-vf".to_string(),
        format!("scale={}", scale),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-ar".to_string(),
        "44100".to_string(),
        "-f".to_string(),
        "flv".to_string(),
        plan.publish_url.clone(),
    ]);

    args
}

/// Handle to one running encoder process.
///
/// Owned exclusively by the watcher task for its job; dropped exactly once
/// after the process is confirmed gone.
#[async_trait]
pub trait EncoderProcess: Send {
    fn pid(&self) -> u32;

    /// Wait for the process to exit.
    async fn wait(&mut self) -> Result<EncoderExit, EncoderError>;

    /// Ask the encoder to finish gracefully.
    async fn signal_quit(&mut self) -> Result<(), EncoderError>;

    /// Forcibly terminate the process.
    async fn kill(&mut self) -> Result<(), EncoderError>;
}

/// Spawns encoder processes.
#[async_trait]
pub trait EncoderLauncher: Send + Sync {
    async fn launch(&self, plan: &EncodePlan) -> Result<Box<dyn EncoderProcess>, EncoderError>;
}

/// ffmpeg-backed launcher.
pub struct FfmpegLauncher {
    config: SupervisorConfig,
}

impl FfmpegLauncher {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EncoderLauncher for FfmpegLauncher {
    async fn launch(&self, plan: &EncodePlan) -> Result<Box<dyn EncoderProcess>, EncoderError> {
        let args = build_encoder_args(plan);

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::BinaryNotFound(self.config.ffmpeg_path.clone())
                } else {
                    EncoderError::Spawn(e.to_string())
                }
            })?;

        let pid = child
            .id()
            .ok_or_else(|| EncoderError::Spawn("process exited before pid query".to_string()))?;

        let stdin = child.stdin.take();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));

        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            let capacity = self.config.stderr_tail_lines;
            let job_id = plan.job_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(job_id = %job_id, "ffmpeg: {}", line);
                    let mut tail = tail.lock().unwrap();
                    if tail.len() == capacity {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            });
        }

        Ok(Box::new(FfmpegProcess {
            child,
            pid,
            stdin,
            stderr_tail,
        }))
    }
}

/// A running ffmpeg push.
pub struct FfmpegProcess {
    child: Child,
    pid: u32,
    stdin: Option<ChildStdin>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl FfmpegProcess {
    fn tail_snapshot(&self) -> String {
        let tail = self.stderr_tail.lock().unwrap();
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[async_trait]
impl EncoderProcess for FfmpegProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> Result<EncoderExit, EncoderError> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(EncoderExit::Clean)
        } else {
            let tail = self.tail_snapshot();
            let mut message = match status.code() {
                Some(code) => format!("encoder exited with status {}", code),
                None => "encoder terminated by signal".to_string(),
            };
            if !tail.is_empty() {
                message.push_str(": ");
                message.push_str(&tail);
            }
            Ok(EncoderExit::Failed { message })
        }
    }

    async fn signal_quit(&mut self) -> Result<(), EncoderError> {
        // ffmpeg finalizes the output and exits on a literal `q`.
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(b"q").await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), EncoderError> {
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plan(params: EncodeParams, input: ResolvedSource) -> EncodePlan {
        EncodePlan {
            job_id: "job-1".to_string(),
            input,
            publish_url: "rtmp://a.rtmp.youtube.com/live2/key".to_string(),
            params,
        }
    }

    #[test]
    fn test_build_args_single_file() {
        let args = build_encoder_args(&plan(
            EncodeParams::default(),
            ResolvedSource::File(PathBuf::from("/library/show.mp4")),
        ));

        assert_eq!(args[0], "-re");
        assert!(args.contains(&"-stream_loop".to_string()));
        assert!(args.contains(&"/library/show.mp4".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"2500k".to_string()));
        assert!(args.contains(&"scale=1280:720".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("rtmp://a.rtmp.youtube.com/live2/key"));
        // Not a playlist, no concat demuxer.
        assert!(!args.contains(&"concat".to_string()));
    }

    #[test]
    fn test_build_args_no_loop() {
        let params = EncodeParams {
            loop_source: false,
            ..Default::default()
        };
        let args = build_encoder_args(&plan(
            params,
            ResolvedSource::File(PathBuf::from("/library/show.mp4")),
        ));
        assert!(!args.contains(&"-stream_loop".to_string()));
    }

    #[test]
    fn test_build_args_playlist_uses_concat() {
        let args = build_encoder_args(&plan(
            EncodeParams::default(),
            ResolvedSource::ConcatList(PathBuf::from("/work/job-1.playlist.txt")),
        ));

        let concat_pos = args.iter().position(|a| a == "concat").unwrap();
        assert_eq!(args[concat_pos - 1], "-f");
        assert!(args.contains(&"-safe".to_string()));
        assert!(args.contains(&"/work/job-1.playlist.txt".to_string()));
    }

    #[test]
    fn test_build_args_vertical_swaps_axes() {
        let params = EncodeParams {
            orientation: Orientation::Vertical,
            ..Default::default()
        };
        let args = build_encoder_args(&plan(
            params,
            ResolvedSource::File(PathBuf::from("/library/show.mp4")),
        ));
        assert!(args.contains(&"scale=720:1280".to_string()));
    }

    #[test]
    fn test_build_args_bitrate_and_fps() {
        let params = EncodeParams {
            bitrate_kbps: 4000,
            fps: 60,
            resolution: "1920x1080".to_string(),
            ..Default::default()
        };
        let args = build_encoder_args(&plan(
            params,
            ResolvedSource::File(PathBuf::from("/in.mp4")),
        ));
        assert!(args.contains(&"4000k".to_string()));
        assert!(args.contains(&"8000k".to_string()));
        assert!(args.contains(&"60".to_string()));
        assert!(args.contains(&"120".to_string()));
        assert!(args.contains(&"scale=1920:1080".to_string()));
    }
}
