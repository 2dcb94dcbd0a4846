//! Blocking HTTP via a curl subprocess.
//!
//! Responses land in a temp file rather than a pipe, so polling for
//! cancellation cannot deadlock against a full pipe buffer.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::{CancelFlag, TransportError, USER_AGENT};

const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// GET a URL, returning the response body.
pub fn http_get(
    url: &str,
    basic_auth: Option<&str>,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, TransportError> {
    run_curl(url, basic_auth, None, None, cancel)
}

/// POST a body with the given content type, returning the response body.
pub fn http_post(
    url: &str,
    content_type: &str,
    body: &[u8],
    basic_auth: Option<&str>,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, TransportError> {
    run_curl(url, basic_auth, Some(content_type), Some(body), cancel)
}

fn run_curl(
    url: &str,
    basic_auth: Option<&str>,
    content_type: Option<&str>,
    body: Option<&[u8]>,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, TransportError> {
    if let Some(cancel) = cancel {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
    }

    let out_file = tempfile::NamedTempFile::new()?;

    let mut cmd = Command::new("curl");
    cmd.args(["-s", "-S", "-f", "-L"])
        .args(["-A", USER_AGENT])
        .args(["-o"])
        .arg(out_file.path())
        .stdin(if body.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    if let Some(auth) = basic_auth {
        cmd.args(["-u", auth]);
    }
    if let Some(content_type) = content_type {
        cmd.args(["-H", &format!("Content-Type: {content_type}")]);
        cmd.args(["--data-binary", "@-"]);
    }
    cmd.arg(url);

    let mut child = cmd.spawn().map_err(|e| {
        TransportError::ConnectionFailed(format!("cannot run curl: {e}"))
    })?;

    if let Some(body) = body {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin.write_all(body)?;
        drop(stdin);
    }

    // Poll so a raised cancel flag can kill the transfer mid-flight.
    let status = loop {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Cancelled);
            }
        }
        match child.try_wait()? {
            Some(status) => break status,
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    if !status.success() {
        let mut message = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            use std::io::Read;
            let _ = stderr.read_to_string(&mut message);
        }
        let message = message.trim();
        return Err(TransportError::Http(if message.is_empty() {
            format!("curl exited with {status} for {url}")
        } else {
            message.to_string()
        }));
    }

    Ok(std::fs::read(out_file.path())?)
}
