//! Media resolution: search query in, transcoded MP3 out
//!
//! The production resolver shells out to `yt-dlp`, which searches YouTube,
//! downloads the best audio stream and has ffmpeg transcode it to MP3.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::Quality;

/// What a resolver did with a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The search came back empty, nothing was written
    NoMatch,
    /// Something was downloaded; the path is what the tool reported, if anything
    Downloaded { produced_path: Option<PathBuf> },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Locates and downloads the best audio match for a query
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(
        &self,
        query: &str,
        quality: Quality,
        output_template: &Path,
    ) -> Result<Resolution, ResolveError>;
}

/// Search query for a track
pub fn build_query(artist: &str, title: &str) -> String {
    format!("{} {} official audio", artist, title)
}

/// yt-dlp backed resolver
#[derive(Debug, Clone)]
pub struct YtDlp {
    ytdlp_path: PathBuf,
    /// Found on PATH when unset
    ffmpeg_path: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(ytdlp_path: impl Into<PathBuf>, ffmpeg_path: Option<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            ffmpeg_path,
        }
    }

    fn tool_name(&self) -> String {
        self.ytdlp_path.display().to_string()
    }

    /// Make sure the executable can be started at all
    pub async fn check_available(&self) -> Result<String, ResolveError> {
        let output = Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                tool: self.tool_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Command line for one search-download-transcode run
    fn build_args(&self, query: &str, quality: Quality, output_template: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        args.push(format!("{}K", quality.kbps()).into());
        args.push("--output".into());
        args.push(output_template.as_os_str().to_owned());
        if let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.as_os_str().to_owned());
        }
        args.extend(
            [
                "--print",
                "after_move:filepath",
                "--no-simulate",
                "--no-progress",
                "--no-warnings",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(format!("ytsearch1:{}", query).into());
        args
    }
}

#[async_trait]
impl MediaResolver for YtDlp {
    async fn resolve(
        &self,
        query: &str,
        quality: Quality,
        output_template: &Path,
    ) -> Result<Resolution, ResolveError> {
        let args = self.build_args(query, quality, output_template);
        debug!("Running {} {:?}", self.tool_name(), args);

        let output = Command::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                tool: self.tool_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_printed_path(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// yt-dlp prints the final file path once per downloaded entry
fn parse_printed_path(stdout: &str) -> Resolution {
    match stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
        Some(path) => Resolution::Downloaded {
            produced_path: Some(PathBuf::from(path)),
        },
        None => Resolution::NoMatch,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("ACDC", "T.N.T."), "ACDC T.N.T. official audio");
    }

    #[test]
    fn test_build_args() {
        let ytdlp = YtDlp::new("yt-dlp", Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        let args = ytdlp.build_args(
            "ACDC T.N.T. official audio",
            Quality::Kbps190,
            Path::new("/m/ACDC/High Voltage/ACDC - T.N.T..%(ext)s"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let value_after = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };

        assert_eq!(value_after("--audio-format"), "mp3");
        assert_eq!(value_after("--audio-quality"), "190K");
        assert_eq!(value_after("--output"), "/m/ACDC/High Voltage/ACDC - T.N.T..%(ext)s");
        assert_eq!(value_after("--ffmpeg-location"), "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(value_after("--print"), "after_move:filepath");
        assert_eq!(args.last().unwrap(), "ytsearch1:ACDC T.N.T. official audio");
    }

    #[test]
    fn test_ffmpeg_location_only_when_configured() {
        let ytdlp = YtDlp::new("yt-dlp", None);
        let args = ytdlp.build_args("q", Quality::Kbps320, Path::new("/m/x.%(ext)s"));
        assert!(!args.iter().any(|a| a == "--ffmpeg-location"));
        assert!(args.iter().any(|a| a == "320K"));
    }

    #[test]
    fn test_parse_printed_path() {
        assert_eq!(parse_printed_path(""), Resolution::NoMatch);
        assert_eq!(parse_printed_path("\n  \n"), Resolution::NoMatch);
        assert_eq!(
            parse_printed_path("/m/a.mp3\n"),
            Resolution::Downloaded {
                produced_path: Some(PathBuf::from("/m/a.mp3"))
            }
        );
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let ytdlp = YtDlp::new("/nonexistent/yt-dlp", None);
        let err = ytdlp
            .resolve("q", Quality::Kbps320, Path::new("/tmp/x.%(ext)s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Spawn { .. }));
        assert!(ytdlp.check_available().await.is_err());
    }
}
