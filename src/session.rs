//! Per-document code execution service.
//!
//! Documentation pages execute their code blocks in order, and later blocks
//! see the variables earlier blocks defined. Each document therefore gets its
//! own long-lived interpreter process; two documents never share state.
//!
//! ## Wire protocol
//!
//! The interpreter runs a small driver read from `-c`. Requests and responses
//! are single JSON lines over the child's stdin/stdout:
//!
//! ```text
//! → {"code": "print(a * 2)"}
//! ← {"stdout": "20\n", "error": null}
//! ← {"stdout": "", "error": "NameError: name 'a' is not defined"}
//! ```
//!
//! An exception raised by the executed code is a normal response, rendered as
//! text by [`PythonSessions`]. Only a broken channel is a [`PymdError`].

use crate::config::SessionConfig;
use crate::error::{PymdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// Prefix of the text returned when executed code raises.
pub const ERROR_PREFIX: &str = "Error executing code";

/// Executes source code on behalf of a document.
pub trait ExecutionBackend {
    /// Run `code` in the context of `document` and return what it printed,
    /// or a description of the error it raised.
    fn execute(&mut self, document: &Path, code: &str) -> Result<String>;

    /// Release whatever state `document` holds. Called once a document is
    /// fully processed; the next `execute` for it starts from scratch.
    fn finish(&mut self, _document: &Path) {}
}

const DRIVER: &str = r#"
import contextlib, io, json, sys
namespace = {"__name__": "__main__"}
for line in sys.stdin:
    request = json.loads(line)
    buffer = io.StringIO()
    error = None
    try:
        with contextlib.redirect_stdout(buffer):
            exec(compile(request["code"], "<block>", "exec"), namespace)
    except BaseException as exc:
        error = "%s: %s" % (type(exc).__name__, exc)
    sys.__stdout__.write(json.dumps({"stdout": buffer.getvalue(), "error": error}) + "\n")
    sys.__stdout__.flush()
"#;

#[derive(Serialize)]
struct Request<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct Response {
    stdout: String,
    error: Option<String>,
}

/// One interpreter process bound to one document.
struct PythonSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl PythonSession {
    fn spawn(python: &str) -> Result<Self> {
        let mut child = Command::new(python)
            .arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PymdError::InterpreterUnavailable {
                command: python.to_string(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                return Err(PymdError::Internal(
                    "interpreter spawned without piped stdio".into(),
                ));
            }
        };

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn run(&mut self, document: &Path, code: &str) -> Result<Response> {
        let failed = |detail: String| PymdError::SessionFailed {
            document: document.to_path_buf(),
            detail,
        };

        let mut line = serde_json::to_string(&Request { code })
            .map_err(|e| failed(format!("cannot encode request: {e}")))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|()| self.stdin.flush())
            .map_err(|e| failed(format!("cannot send code: {e}")))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| failed(format!("cannot read reply: {e}")))?;
        if read == 0 {
            return Err(failed("interpreter exited".into()));
        }

        serde_json::from_str(&reply).map_err(|e| failed(format!("malformed reply: {e}")))
    }
}

impl Drop for PythonSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Python interpreters keyed by document path.
///
/// Sessions start lazily on a document's first block and live until
/// [`reset`](PythonSessions::reset) or until the service is dropped. A
/// long-lived service that renders many pages should release each one once
/// it is done, through [`ExecutionBackend::finish`] or
/// [`FencedBlockExecutor::finish`](crate::FencedBlockExecutor::finish),
/// otherwise one interpreter per page stays alive.
pub struct PythonSessions {
    config: SessionConfig,
    sessions: HashMap<PathBuf, PythonSession>,
}

impl Default for PythonSessions {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl PythonSessions {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Number of live interpreter processes.
    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    /// Drop the session of `document`, discarding its state.
    pub fn reset(&mut self, document: &Path) {
        if self.sessions.remove(document).is_some() {
            debug!("Reset session for {}", document.display());
        }
    }

    fn session(&mut self, document: &Path) -> Result<&mut PythonSession> {
        if !self.sessions.contains_key(document) {
            info!(
                "Starting {} session for {}",
                self.config.python,
                document.display()
            );
            let session = PythonSession::spawn(&self.config.python)?;
            self.sessions.insert(document.to_path_buf(), session);
        }
        self.sessions
            .get_mut(document)
            .ok_or_else(|| PymdError::Internal("session vanished after insert".into()))
    }
}

impl ExecutionBackend for PythonSessions {
    fn execute(&mut self, document: &Path, code: &str) -> Result<String> {
        let result = self.session(document)?.run(document, code);
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                // A broken channel leaves nothing worth keeping.
                warn!("Session for {} failed: {e}", document.display());
                self.sessions.remove(document);
                return Err(e);
            }
        };

        Ok(match response.error {
            None => response.stdout,
            Some(error) => format!("{}{ERROR_PREFIX}:\n{error}", response.stdout),
        })
    }

    fn finish(&mut self, document: &Path) {
        self.reset(document);
    }
}

impl std::fmt::Debug for PythonSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonSessions")
            .field("config", &self.config)
            .field("documents", &self.sessions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn missing_interpreter_is_reported() {
        let mut sessions = PythonSessions::new(SessionConfig {
            python: "pymd-test-no-such-python".into(),
        });
        let err = sessions
            .execute(Path::new("a.md"), "print(1)")
            .unwrap_err();
        assert!(matches!(err, PymdError::InterpreterUnavailable { .. }));
        assert_eq!(sessions.active(), 0);
    }

    #[test]
    fn state_persists_within_a_document() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        let doc = Path::new("test.md");
        assert_eq!(sessions.execute(doc, "a = 10").unwrap(), "");
        assert_eq!(sessions.execute(doc, "print(a * 2)").unwrap(), "20\n");
        assert_eq!(sessions.active(), 1);
    }

    #[test]
    fn documents_are_isolated() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        sessions.execute(Path::new("file1.md"), "x = 5").unwrap();
        let out = sessions.execute(Path::new("file2.md"), "print(x)").unwrap();
        assert!(out.starts_with("Error executing code:\n"), "got {out:?}");
        assert!(out.contains("NameError"));
        assert_eq!(sessions.active(), 2);
    }

    #[test]
    fn error_keeps_earlier_output() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        let out = sessions
            .execute(Path::new("e.md"), "print('before')\nraise ValueError('boom')")
            .unwrap();
        assert_eq!(out, "before\nError executing code:\nValueError: boom");
    }

    #[test]
    fn reset_discards_state() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        let doc = Path::new("r.md");
        sessions.execute(doc, "y = 1").unwrap();
        sessions.reset(doc);
        assert_eq!(sessions.active(), 0);
        let out = sessions.execute(doc, "print(y)").unwrap();
        assert!(out.contains("NameError"));
    }

    #[test]
    fn finish_releases_only_that_document() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        sessions.execute(Path::new("one.md"), "a = 1").unwrap();
        sessions.execute(Path::new("two.md"), "b = 2").unwrap();
        sessions.finish(Path::new("one.md"));
        assert_eq!(sessions.active(), 1);
        assert_eq!(sessions.execute(Path::new("two.md"), "print(b)").unwrap(), "2\n");
    }

    #[test]
    fn finish_without_session_is_a_no_op() {
        let mut sessions = PythonSessions::default();
        sessions.finish(Path::new("never-run.md"));
        assert_eq!(sessions.active(), 0);
    }

    #[test]
    fn exit_is_contained() {
        if !python_available() {
            println!("SKIP: python3 not found");
            return;
        }
        let mut sessions = PythonSessions::default();
        let doc = Path::new("x.md");
        let out = sessions.execute(doc, "import sys\nsys.exit(3)").unwrap();
        assert!(out.contains("SystemExit: 3"), "got {out:?}");
        assert_eq!(sessions.execute(doc, "print('alive')").unwrap(), "alive\n");
    }
}
