//! BirdNET classifier bridge.
//!
//! The model is loaded once by a long-lived helper process. We talk to it
//! over stdin/stdout with one JSON object per line:
//!
//! ```text
//! → {"path": "...", "lat": 38.97, "lon": -77.25, "min_conf": 0.65, "return_all_detections": true}
//! ← {"detections": [{"common_name": "...", "scientific_name": "...", "confidence": 0.99,
//!                    "start_time": 0.0, "end_time": 3.0, "is_predicted_for_location_and_date": true}]}
//! ← {"error": "..."}
//! ```
//!
//! The model library prints freely. Stdout lines that are not JSON objects and
//! everything on stderr go to the configured [`OutputSink`] instead of the
//! terminal.
//!
//! Unless other arguments are configured, the interpreter is handed
//! [`BRIDGE_SCRIPT`], a birdnetlib helper bundled into the binary.

use std::process::Stdio;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use super::{AdapterError, Classifier, ClassifyRequest, RawDetection};

/// Where the classifier's own console output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputSink {
    /// Drop it
    #[default]
    Discard,

    /// Forward it to the `birdnet` tracing target at debug level
    Trace,
}

impl OutputSink {
    fn emit(self, line: &str) {
        if self == OutputSink::Trace && !line.is_empty() {
            debug!(target: "birdnet", "{}", line);
        }
    }
}

/// Bundled birdnetlib helper, run with `python3 -u -c`
pub const BRIDGE_SCRIPT: &str = include_str!("../../scripts/birdnet_bridge.py");

/// How to launch the bridge process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Executable to run
    pub command: String,

    /// Arguments; `None` runs the bundled helper under `command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Sink for classifier console output
    #[serde(default)]
    pub output: OutputSink,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: None,
            output: OutputSink::Discard,
        }
    }
}

impl BridgeConfig {
    /// Arguments actually passed to `command`
    pub fn launch_args(&self) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => vec!["-u".to_string(), "-c".to_string(), BRIDGE_SCRIPT.to_string()],
        }
    }

    /// Arguments for display, with the bundled helper named rather than inlined
    pub fn describe_args(&self) -> String {
        match &self.args {
            Some(args) => args.join(" "),
            None => "-u -c <bundled birdnet_bridge.py>".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionsResponse {
    detections: Vec<RawDetection>,
}

/// Classifier backed by a persistent bridge process
pub struct BirdnetBridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    output: OutputSink,
}

impl BirdnetBridge {
    /// Start the bridge process (and with it, load the model)
    pub fn spawn(config: &BridgeConfig) -> Result<Self, AdapterError> {
        let stderr = match config.output {
            OutputSink::Discard => Stdio::null(),
            OutputSink::Trace => Stdio::piped(),
        };

        let mut child = Command::new(&config.command)
            .args(config.launch_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            output: config.output,
        })
    }

    async fn send(&mut self, request: &ClassifyRequest) -> Result<(), AdapterError> {
        let mut line = serde_json::to_string(request).map_err(|source| {
            AdapterError::MalformedResponse {
                path: request.path.clone(),
                source,
            }
        })?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read until the next JSON object, routing noise to the sink
    async fn receive(&mut self, path: &str) -> Result<Vec<RawDetection>, AdapterError> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(self.exited().await);
            };

            let line = line.trim();
            let value = match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) if value.is_object() => value,
                _ => {
                    self.output.emit(line);
                    continue;
                }
            };

            if let Some(message) = value.get("error") {
                return Err(AdapterError::Classifier {
                    path: path.to_string(),
                    message: message
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| message.to_string()),
                });
            }

            let response: DetectionsResponse = serde_json::from_value(value).map_err(|source| {
                AdapterError::MalformedResponse {
                    path: path.to_string(),
                    source,
                }
            })?;

            return Ok(response.detections);
        }
    }

    async fn exited(&mut self) -> AdapterError {
        let status = match self.child.wait().await {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };
        AdapterError::Exited { status }
    }
}

#[async_trait]
impl Classifier for BirdnetBridge {
    fn name(&self) -> &str {
        "birdnet"
    }

    async fn classify(
        &mut self,
        request: &ClassifyRequest,
    ) -> Result<Vec<RawDetection>, AdapterError> {
        self.send(request).await?;
        self.receive(&request.path).await
    }
}

fn missing_pipe(name: &str) -> AdapterError {
    AdapterError::Io(std::io::Error::other(format!(
        "classifier {} was not captured",
        name
    )))
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        OutputSink::Trace.emit(line.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> BridgeConfig {
        BridgeConfig {
            command: "sh".to_string(),
            args: Some(vec!["-c".to_string(), script.to_string()]),
            output: OutputSink::Discard,
        }
    }

    fn request(path: &str) -> ClassifyRequest {
        ClassifyRequest {
            path: path.to_string(),
            lat: 38.97,
            lon: -77.25,
            min_conf: 0.65,
            return_all_detections: true,
        }
    }

    const WREN: &str = r#"{"detections":[{"common_name":"Carolina Wren","scientific_name":"Thryothorus ludovicianus","confidence":0.99,"start_time":0.0,"end_time":3.0,"is_predicted_for_location_and_date":true}]}"#;

    #[tokio::test]
    async fn test_noise_lines_are_skipped() {
        let script = format!(
            "while read line; do echo 'Loading model...'; echo '{}'; done",
            WREN
        );
        let mut bridge = BirdnetBridge::spawn(&sh(&script)).unwrap();

        let detections = bridge.classify(&request("/rec/a.WAV")).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].common_name, "Carolina Wren");

        // Same process answers the next request
        let again = bridge.classify(&request("/rec/b.WAV")).await.unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_non_json_brace_lines_are_noise() {
        let script = format!(
            "read line; echo \"{{'model': 'BirdNET_GLOBAL_6K'}}\"; echo '{{ loading'; echo '{}'",
            WREN
        );
        let mut bridge = BirdnetBridge::spawn(&sh(&script)).unwrap();

        let detections = bridge.classify(&request("/rec/a.WAV")).await.unwrap();
        assert_eq!(detections[0].common_name, "Carolina Wren");
    }

    #[tokio::test]
    async fn test_error_response() {
        let script = r#"read line; echo '{"error":"cannot decode audio"}'"#;
        let mut bridge = BirdnetBridge::spawn(&sh(script)).unwrap();

        match bridge.classify(&request("/rec/a.WAV")).await {
            Err(AdapterError::Classifier { message, .. }) => {
                assert_eq!(message, "cannot decode audio")
            }
            other => panic!("expected classifier error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shape_change_is_typed_error() {
        let script = r#"read line; echo '{"detections":[{"name":"Carolina Wren"}]}'"#;
        let mut bridge = BirdnetBridge::spawn(&sh(script)).unwrap();

        assert!(matches!(
            bridge.classify(&request("/rec/a.WAV")).await,
            Err(AdapterError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_process_exit_is_reported() {
        let mut bridge = BirdnetBridge::spawn(&sh("read line; exit 3")).unwrap();
        assert!(matches!(
            bridge.classify(&request("/rec/a.WAV")).await,
            Err(AdapterError::Exited { .. })
        ));
    }

    #[test]
    fn test_default_runs_bundled_helper() {
        let config = BridgeConfig::default();
        let args = config.launch_args();
        assert_eq!(config.command, "python3");
        assert_eq!(args[..2], ["-u", "-c"]);
        assert_eq!(args[2], BRIDGE_SCRIPT);
        assert!(!config.describe_args().contains("import"));
    }

    #[test]
    fn test_helper_reads_every_request_field() {
        let value = serde_json::to_value(request("/rec/a.WAV")).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), 5);
        for key in fields.keys() {
            let access = format!("request[\"{}\"]", key);
            assert!(BRIDGE_SCRIPT.contains(&access), "helper ignores {}", key);
        }
    }

    #[test]
    fn test_helper_emits_every_detection_field() {
        for key in [
            "common_name",
            "scientific_name",
            "confidence",
            "start_time",
            "end_time",
            "is_predicted_for_location_and_date",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("\"{}\": ", key)), "missing {}", key);
        }
    }

    /// Runs the bundled helper against a stand-in birdnetlib package
    #[tokio::test]
    async fn test_bundled_helper_round_trip() {
        let available = std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        if !available {
            return;
        }

        let temp = tempfile::TempDir::new().unwrap();
        let package = temp.path().join("birdnetlib");
        std::fs::create_dir(&package).unwrap();
        std::fs::write(
            package.join("__init__.py"),
            r#"
class Recording:
    def __init__(self, analyzer, path, lat, lon, min_conf, return_all_detections):
        print("loading", path)
        self.path = path
        self.min_conf = min_conf
        self.detections = []

    def analyze(self):
        print("analyzing")
        if self.path.endswith("broken.WAV"):
            raise ValueError("cannot decode audio")
        self.detections = [{
            "common_name": "Carolina Wren",
            "scientific_name": "Thryothorus ludovicianus",
            "confidence": 0.99,
            "start_time": 0.0,
            "end_time": 3.0,
            "label": "Thryothorus ludovicianus_Carolina Wren",
            "is_predicted_for_location_and_date": True,
        }]
"#,
        )
        .unwrap();
        std::fs::write(
            package.join("analyzer.py"),
            "class Analyzer:\n    def __init__(self):\n        print('Labels loaded.')\n",
        )
        .unwrap();

        let script = format!(
            "PYTHONPATH='{}' exec python3 -u -c \"$0\"",
            temp.path().display()
        );
        let config = BridgeConfig {
            command: "sh".to_string(),
            args: Some(vec!["-c".to_string(), script, BRIDGE_SCRIPT.to_string()]),
            output: OutputSink::Discard,
        };
        let mut bridge = BirdnetBridge::spawn(&config).unwrap();

        let detections = bridge.classify(&request("/rec/a.WAV")).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].common_name, "Carolina Wren");
        assert_eq!(
            detections[0].label.as_deref(),
            Some("Thryothorus ludovicianus_Carolina Wren")
        );

        match bridge.classify(&request("/rec/broken.WAV")).await {
            Err(AdapterError::Classifier { message, .. }) => {
                assert!(message.contains("cannot decode audio"))
            }
            other => panic!("expected classifier error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_command() {
        let config = BridgeConfig {
            command: "/nonexistent/birdnet-bridge".to_string(),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            BirdnetBridge::spawn(&config),
            Err(AdapterError::Spawn { .. })
        ));
    }
}
