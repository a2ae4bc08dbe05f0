//! Signature primitive backed by the `gpg` binary.
//!
//! Uses the machine-readable `--status-fd` protocol (see GnuPG's
//! `doc/DETAILS`), which is stable across GnuPG releases.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{MailpostError, Result};
use crate::model::message::SignedPayload;

use super::{CheckOutcome, SignatureCheck};

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// Runs `gpg --verify` on a detached signature.
#[derive(Debug, Clone)]
pub struct GpgCommand {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl Default for GpgCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir: None,
        }
    }
}

impl GpgCommand {
    pub fn new(program: impl Into<PathBuf>, homedir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            homedir,
        }
    }
}

impl SignatureCheck for GpgCommand {
    fn check(&self, payload: &SignedPayload) -> Result<CheckOutcome> {
        if payload.signature.is_empty() {
            return Err(MailpostError::Verification(
                "signed message has no signature part".into(),
            ));
        }

        // gpg only verifies detached signatures from files
        let scratch = tempfile::tempdir().map_err(|e| MailpostError::io(std::env::temp_dir(), e))?;
        let data_path = scratch.path().join("payload");
        let sig_path = scratch.path().join("payload.sig");
        std::fs::write(&data_path, &payload.content)
            .map_err(|e| MailpostError::io(&data_path, e))?;
        std::fs::write(&sig_path, &payload.signature)
            .map_err(|e| MailpostError::io(&sig_path, e))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--no-tty", "--status-fd", "1"]);
        if let Some(ref home) = self.homedir {
            cmd.arg("--homedir").arg(home);
        }
        cmd.arg("--verify").arg(&sig_path).arg(&data_path);

        tracing::debug!(program = %self.program.display(), "Running signature check");
        let output = cmd.output().map_err(|e| {
            MailpostError::Verification(format!(
                "could not run '{}': {e}",
                self.program.display()
            ))
        })?;

        let status = String::from_utf8_lossy(&output.stdout);
        parse_status(&status).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            MailpostError::Verification(
                stderr
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("gpg reported no signature status")
                    .to_string(),
            )
        })
    }
}

/// Interpret GnuPG status lines.
///
/// Returns `None` when gpg could not reach a verdict (`ERRSIG` without any
/// good or bad signature, e.g. a missing public key or unknown algorithm).
pub fn parse_status(status: &str) -> Option<CheckOutcome> {
    let mut good = false;
    let mut bad = false;
    let mut fingerprints: Vec<String> = Vec::new();

    for line in status.lines() {
        let Some(rest) = line.strip_prefix(STATUS_PREFIX) else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        match fields.next() {
            Some("GOODSIG") => good = true,
            Some("BADSIG") => bad = true,
            Some("VALIDSIG") => {
                let args: Vec<&str> = fields.collect();
                // VALIDSIG <fpr> <date> <ts> <expire> <ver> <rsvd> <pk-algo> <hash-algo> <class> [<primary-fpr>]
                let candidates = [args.first(), args.get(9)];
                for fpr in candidates.into_iter().flatten() {
                    if !fingerprints.iter().any(|f| f == fpr) {
                        fingerprints.push((*fpr).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if bad {
        Some(CheckOutcome {
            valid: false,
            fingerprints: Vec::new(),
        })
    } else if good {
        Some(CheckOutcome {
            valid: true,
            fingerprints,
        })
    } else {
        None
    }
}
