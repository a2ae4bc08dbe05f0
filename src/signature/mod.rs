//! Signature verification and the trusted-signer policy.
//!
//! The cryptographic check itself is delegated to a [`SignatureCheck`]
//! implementation (see [`gpg::GpgCommand`]); this module only decides what
//! its answer means for publication.

pub mod gpg;

use crate::error::Result;
use crate::model::message::{Message, SignatureInfo, SignedPayload};

/// Raw answer from a signature primitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckOutcome {
    /// `false` when the payload does not match the signature.
    pub valid: bool,
    /// Fingerprints of every key that produced a good signature.
    pub fingerprints: Vec<String>,
}

/// A cryptographic signature primitive.
pub trait SignatureCheck {
    /// Check a detached signature over `payload.content`.
    ///
    /// Errors mean the primitive could not reach a decision (unsupported
    /// algorithm, garbage signature blob, missing binary, ...).
    fn check(&self, payload: &SignedPayload) -> Result<CheckOutcome>;
}

/// Outcome of verifying one message against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureVerdict {
    /// No signature, or an encrypted message.
    Unsigned,
    /// Tampered payload, or the primitive failed.
    Invalid,
    /// Good signature from a key not on the allow-list.
    Untrusted { fingerprints: Vec<String> },
    /// Good signature from at least one allowed key.
    Trusted { fingerprints: Vec<String> },
}

impl SignatureVerdict {
    pub fn is_trusted(&self) -> bool {
        matches!(self, SignatureVerdict::Trusted { .. })
    }

    /// Whether the import may proceed under the given enforcement setting.
    pub fn permits_import(&self, require_trusted: bool) -> bool {
        !require_trusted || self.is_trusted()
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            SignatureVerdict::Unsigned => "unsigned",
            SignatureVerdict::Invalid => "invalid",
            SignatureVerdict::Untrusted { .. } => "untrusted",
            SignatureVerdict::Trusted { .. } => "trusted",
        }
    }
}

impl std::fmt::Display for SignatureVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Verify `message` and match its signers against `allowed`.
///
/// Encrypted messages are reported as [`SignatureVerdict::Unsigned`]: they are
/// never decrypted. Any primitive error counts as an invalid signature.
pub fn verify(
    message: &Message,
    primitive: &dyn SignatureCheck,
    allowed: &[String],
) -> SignatureVerdict {
    let payload = match &message.signature {
        SignatureInfo::Signed(payload) => payload,
        SignatureInfo::Encrypted => {
            tracing::debug!("Message is encrypted, not attempting verification");
            return SignatureVerdict::Unsigned;
        }
        SignatureInfo::Unsigned => return SignatureVerdict::Unsigned,
    };

    let outcome = match primitive.check(payload) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "Signature check failed, treating as invalid");
            return SignatureVerdict::Invalid;
        }
    };

    if !outcome.valid {
        tracing::warn!("Signature is not valid");
        return SignatureVerdict::Invalid;
    }

    let trusted = outcome.fingerprints.iter().any(|fpr| {
        tracing::debug!(fingerprint = %fpr, "Checking signer against allow-list");
        allowed.iter().any(|a| a == fpr)
    });

    if trusted {
        SignatureVerdict::Trusted {
            fingerprints: outcome.fingerprints,
        }
    } else {
        SignatureVerdict::Untrusted {
            fingerprints: outcome.fingerprints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailpostError;
    use crate::model::address::EmailAddress;
    use crate::model::message::{ContentKind, Part};
    use chrono::DateTime;

    struct Fixed(Result<CheckOutcome>);

    impl SignatureCheck for Fixed {
        fn check(&self, _payload: &SignedPayload) -> Result<CheckOutcome> {
            match &self.0 {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(MailpostError::Verification(e.to_string())),
            }
        }
    }

    fn message(signature: SignatureInfo) -> Message {
        Message {
            sender: EmailAddress::default(),
            subject: None,
            date: DateTime::parse_from_rfc3339("2018-01-01T10:30:00Z").unwrap(),
            body: Part::text(ContentKind::PlainText, "Body"),
            attachments: Vec::new(),
            signature,
        }
    }

    fn signed() -> Message {
        message(SignatureInfo::Signed(SignedPayload {
            content: b"Content-Type: text/plain\r\n\r\nBody\r\n".to_vec(),
            signature: b"sig".to_vec(),
        }))
    }

    fn good(fpr: &str) -> Fixed {
        Fixed(Ok(CheckOutcome {
            valid: true,
            fingerprints: vec![fpr.to_string()],
        }))
    }

    fn allow(fprs: &[&str]) -> Vec<String> {
        fprs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unsigned() {
        let verdict = verify(&message(SignatureInfo::Unsigned), &good("A"), &allow(&["A"]));
        assert_eq!(verdict, SignatureVerdict::Unsigned);
        assert!(!verdict.permits_import(true));
        assert!(verdict.permits_import(false));
    }

    #[test]
    fn test_encrypted_is_unsigned() {
        let verdict = verify(&message(SignatureInfo::Encrypted), &good("A"), &allow(&["A"]));
        assert_eq!(verdict, SignatureVerdict::Unsigned);
    }

    #[test]
    fn test_tampered_payload() {
        let primitive = Fixed(Ok(CheckOutcome {
            valid: false,
            fingerprints: vec!["A".into()],
        }));
        let verdict = verify(&signed(), &primitive, &allow(&["A"]));
        assert_eq!(verdict, SignatureVerdict::Invalid);
        assert!(!verdict.permits_import(true));
    }

    #[test]
    fn test_primitive_error_fails_closed() {
        let primitive = Fixed(Err(MailpostError::Verification("bad blob".into())));
        let verdict = verify(&signed(), &primitive, &allow(&["A"]));
        assert_eq!(verdict, SignatureVerdict::Invalid);
    }

    #[test]
    fn test_untrusted_signer() {
        let verdict = verify(&signed(), &good("B"), &allow(&["A"]));
        assert_eq!(
            verdict,
            SignatureVerdict::Untrusted {
                fingerprints: vec!["B".into()]
            }
        );
        assert!(!verdict.permits_import(true));
    }

    #[test]
    fn test_trusted_signer() {
        let verdict = verify(&signed(), &good("A"), &allow(&["X", "A"]));
        assert!(verdict.is_trusted());
        assert!(verdict.permits_import(true));
        assert_eq!(verdict.to_string(), "trusted");
    }

    #[test]
    fn test_fingerprint_match_is_case_sensitive() {
        let verdict = verify(&signed(), &good("abcd"), &allow(&["ABCD"]));
        assert_eq!(verdict.label(), "untrusted");
    }

    #[test]
    fn test_any_of_several_signers() {
        let primitive = Fixed(Ok(CheckOutcome {
            valid: true,
            fingerprints: vec!["B".into(), "A".into()],
        }));
        assert!(verify(&signed(), &primitive, &allow(&["A"])).is_trusted());
    }
}
