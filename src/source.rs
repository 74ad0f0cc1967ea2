//! Upstream hand detection sources.
//!
//! The hand landmark detector runs outside of this crate (typically a MediaPipe-based script
//! reading the webcam). It reports one [`DetectionFrame`] per captured image as a line of JSON:
//!
//! ```json
//! {"width": 640, "height": 480, "hands": [{"label": "Left", "landmarks": [[x, y], ...]}]}
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Stdin},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
};

use anyhow::{bail, Context};

use crate::frame::DetectionFrame;

/// Produces one [`DetectionFrame`] per captured image.
pub trait HandSource {
    /// Returns the next frame, or `None` once the capture source has ended.
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>>;
}

impl<S: HandSource + ?Sized> HandSource for Box<S> {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        (**self).next_frame()
    }
}

/// Reads newline-delimited JSON detection frames.
///
/// Blank lines are skipped. Lines that fail to parse are logged and skipped as well.
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
    line_no: u64,
    skipped: u64,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Number of lines that could not be parsed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl JsonLinesSource<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock())
    }
}

impl<R: BufRead> HandSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .context("failed to read detection frame")?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("skipping malformed detection frame on line {}: {e}", self.line_no);
                }
            }
        }
    }
}

/// Runs an external detector process and reads its stdout as JSON lines.
///
/// The process is killed and reaped when this value is dropped.
pub struct DetectorProcess {
    child: Child,
    lines: JsonLinesSource<BufReader<ChildStdout>>,
}

impl DetectorProcess {
    pub fn spawn<S: AsRef<str>>(program: &str, args: &[S]) -> anyhow::Result<Self> {
        log::info!("starting detector: {program}");
        let mut child = Command::new(program)
            .args(args.iter().map(|a| a.as_ref()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start detector '{program}'"))?;
        let stdout = child
            .stdout
            .take()
            .context("detector stdout was not captured")?;
        Ok(Self {
            child,
            lines: JsonLinesSource::new(BufReader::new(stdout)),
        })
    }
}

impl HandSource for DetectorProcess {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        let frame = self.lines.next_frame()?;
        if frame.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    log::warn!("detector exited with {status}");
                }
                _ => log::info!("detector closed its output"),
            }
        }
        Ok(frame)
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.child.kill().ok();
        }
        self.child.wait().ok();
        log::debug!("detector process released");
    }
}

/// Where detection frames come from, as selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Stdin,
    File(PathBuf),
    Detector { program: String, args: Vec<String> },
}

impl SourceSpec {
    /// Parses command-line arguments (without the program name).
    ///
    /// - no arguments or `-`: read from stdin
    /// - `PATH`: read from a file
    /// - `--detector CMD [ARGS...]`: run `CMD` and read its stdout
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            return Ok(SourceSpec::Stdin);
        };
        match first.as_str() {
            "-" => {}
            "--detector" => {
                let Some(program) = args.next() else {
                    bail!("--detector requires a command");
                };
                return Ok(SourceSpec::Detector {
                    program,
                    args: args.collect(),
                });
            }
            flag if flag.starts_with("--") => bail!("unknown option '{flag}'"),
            _ => {}
        }
        if let Some(extra) = args.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(if first == "-" {
            SourceSpec::Stdin
        } else {
            SourceSpec::File(first.into())
        })
    }

    pub fn open(&self) -> anyhow::Result<Box<dyn HandSource>> {
        Ok(match self {
            SourceSpec::Stdin => Box::new(JsonLinesSource::stdin()),
            SourceSpec::File(path) => Box::new(JsonLinesSource::open(path)?),
            SourceSpec::Detector { program, args } => {
                Box::new(DetectorProcess::spawn(program, args)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reads_frames_and_skips_garbage() {
        let input = concat!(
            "{\"width\": 640, \"height\": 480, \"hands\": []}\n",
            "\n",
            "not json\n",
            "{\"width\": 320, \"height\": 240, \"hands\": [{\"label\": \"Left\", \"landmarks\": [[1, 2]]}]}\n",
        );
        let mut source = JsonLinesSource::new(Cursor::new(input));

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (640.0, 480.0));
        assert!(first.hands.is_empty());

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.width, 320.0);
        assert_eq!(second.hands[0].label, "Left");
        assert_eq!(second.hands[0].coords(), Ok(vec![vec![1.0, 2.0]]));

        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn only_non_objects_are_skipped() {
        let input = concat!(
            "{\"width\": -1, \"height\": 480}\n",
            "[640, 480]\n",
            "{\"width\": 640, \"height\": 480, \"hands\": [{\"label\": 7, \"landmarks\": [1, 2]}]}\n",
        );
        let mut source = JsonLinesSource::new(Cursor::new(input));

        let negative = source.next_frame().unwrap().unwrap();
        assert!(negative.resolution().is_err());

        let broken_hand = source.next_frame().unwrap().unwrap();
        assert!(broken_hand.resolution().is_ok());
        assert_eq!(broken_hand.hands.len(), 1);
        assert!(broken_hand.hands[0].handedness().is_err());

        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn parse_args() {
        assert_eq!(SourceSpec::from_args(args(&[])).unwrap(), SourceSpec::Stdin);
        assert_eq!(SourceSpec::from_args(args(&["-"])).unwrap(), SourceSpec::Stdin);
        assert_eq!(
            SourceSpec::from_args(args(&["frames.jsonl"])).unwrap(),
            SourceSpec::File("frames.jsonl".into())
        );
        assert_eq!(
            SourceSpec::from_args(args(&["--detector", "python3", "detect.py", "--cam", "0"]))
                .unwrap(),
            SourceSpec::Detector {
                program: "python3".into(),
                args: args(&["detect.py", "--cam", "0"]),
            }
        );
        assert!(SourceSpec::from_args(args(&["--detector"])).is_err());
        assert!(SourceSpec::from_args(args(&["--verbose"])).is_err());
        assert!(SourceSpec::from_args(args(&["a", "b"])).is_err());
    }

    #[test]
    fn missing_file() {
        assert!(SourceSpec::File("/nonexistent/frames.jsonl".into())
            .open()
            .is_err());
    }
}
