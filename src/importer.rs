//! Mail-to-post pipeline.
//!
//! One [`Importer::import`] call handles one message start to finish:
//! parse → verify → extract body → detect embed → derive slug → save images
//! → write post. A rejected signature stops the pipeline before anything
//! touches the site directory.

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::Config;
use crate::error::{MailpostError, Result};
use crate::export::attachment::save_images;
use crate::export::post::{write_post, FrontMatter};
use crate::extract::body::extract_body;
use crate::extract::embed::{detect_embed, EmbedLookup, NoEmbeds, RegexUrlMatcher, UrlMatcher};
use crate::extract::oembed::OEmbedClient;
use crate::model::message::Message;
use crate::parser::mime::parse_message;
use crate::signature::gpg::GpgCommand;
use crate::signature::{self, SignatureCheck, SignatureVerdict};
use crate::slug::{derive_title_slug, PostSlug};

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Drop everything that is not signed by an allowed key.
    pub require_signature: bool,
    /// Allowed signer fingerprints.
    pub allowed: Vec<String>,
    pub posts_dir: String,
    pub assets_dir: String,
    pub layout: String,
    pub file_mode: u32,
    /// Fall back to the embed's title when the message has no subject.
    pub title_from_embed: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ImportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            require_signature: config.signature.require,
            allowed: config.signature.allowed.clone(),
            posts_dir: config.output.posts_dir.clone(),
            assets_dir: config.output.assets_dir.clone(),
            layout: config.output.layout.clone(),
            file_mode: config.output.file_mode,
            title_from_embed: config.embed.title_from_embed,
        }
    }
}

/// Result of a successful import call.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// The post was written.
    Published {
        post: PathBuf,
        slug: PostSlug,
        images: Vec<String>,
        verdict: SignatureVerdict,
    },
    /// The signature policy rejected the message. Nothing was written.
    Dropped { verdict: SignatureVerdict },
}

/// Imports messages into one site directory.
pub struct Importer {
    site_root: PathBuf,
    options: ImportOptions,
    verifier: Box<dyn SignatureCheck>,
    lookup: Box<dyn EmbedLookup>,
    matcher: Box<dyn UrlMatcher>,
    rng: Box<dyn RngCore>,
}

impl Importer {
    /// Importer with `gpg` verification, no embed lookups and an
    /// entropy-seeded token source.
    ///
    /// Fails if `site_root` is not an existing directory.
    pub fn new(site_root: impl Into<PathBuf>, options: ImportOptions) -> Result<Self> {
        let site_root = site_root.into();
        if !site_root.is_dir() {
            return Err(MailpostError::Config(format!(
                "site root '{}' is not a directory",
                site_root.display()
            )));
        }
        Ok(Self {
            site_root,
            options,
            verifier: Box::new(GpgCommand::default()),
            lookup: Box::new(NoEmbeds),
            matcher: Box::new(RegexUrlMatcher::default()),
            rng: Box::new(StdRng::from_entropy()),
        })
    }

    /// Importer wired from a loaded configuration.
    pub fn from_config(site_root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        config.validate()?;
        let gpg = GpgCommand::new(
            config.signature.gpg_program.clone(),
            config.signature.gpg_homedir.clone(),
        );
        let mut importer =
            Self::new(site_root, ImportOptions::from_config(config))?.with_verifier(gpg);
        if config.embed.enabled {
            let client = OEmbedClient::new(
                Duration::from_secs(config.embed.timeout_secs),
                config.embed.fallback_endpoint.clone(),
            )?;
            importer = importer.with_lookup(client);
        }
        Ok(importer)
    }

    pub fn with_verifier(mut self, verifier: impl SignatureCheck + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn with_lookup(mut self, lookup: impl EmbedLookup + 'static) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    pub fn with_matcher(mut self, matcher: impl UrlMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Replace the source of random slugs (seed it in tests).
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Parse and import one raw RFC 5322 message.
    ///
    /// Errors are reserved for unparseable input and failures to write the
    /// post itself; everything else degrades into a best-effort post.
    pub fn import(&mut self, raw: &[u8]) -> Result<ImportOutcome> {
        let message = parse_message(raw)?;
        self.import_message(&message)
    }

    /// Import an already parsed message.
    pub fn import_message(&mut self, message: &Message) -> Result<ImportOutcome> {
        tracing::debug!(
            sender = %message.sender,
            subject = ?message.subject,
            attachments = message.attachments.len(),
            "Importing message"
        );

        let verdict = signature::verify(message, self.verifier.as_ref(), &self.options.allowed);
        if !verdict.permits_import(self.options.require_signature) {
            tracing::info!(
                sender = %message.sender,
                verdict = %verdict,
                "Dropping message"
            );
            return Ok(ImportOutcome::Dropped { verdict });
        }

        let body = extract_body(&message.body).unwrap_or_else(|| {
            tracing::debug!("No textual body found");
            String::new()
        });
        let embed = detect_embed(&body, self.matcher.as_ref(), self.lookup.as_ref());

        let title = message.subject.clone().or_else(|| {
            self.options
                .title_from_embed
                .then(|| embed.as_ref().and_then(|e| e.title.clone()))
                .flatten()
        });
        let slug = PostSlug::new(
            &message.date,
            &derive_title_slug(title.as_deref(), self.rng.as_mut()),
        );

        let span = tracing::info_span!("post", slug = %slug);
        let _enter = span.enter();

        let images = save_images(
            &message.attachments,
            &self.site_root,
            &self.options.assets_dir,
            &slug,
        );

        let front = FrontMatter {
            layout: self.options.layout.clone(),
            date: message.date,
            title,
            images: images.clone(),
            embed,
        };
        let post = write_post(
            &self.site_root,
            &self.options.posts_dir,
            &slug,
            &front,
            &body,
            self.options.file_mode,
        )?;

        Ok(ImportOutcome::Published {
            post,
            slug,
            images,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::EmailAddress;
    use crate::model::attachment::Attachment;
    use crate::model::embed::EmbedResource;
    use crate::model::message::{ContentKind, Part, SignatureInfo, SignedPayload};
    use crate::signature::CheckOutcome;
    use chrono::DateTime;

    struct TrustAll;

    impl SignatureCheck for TrustAll {
        fn check(&self, _payload: &SignedPayload) -> Result<CheckOutcome> {
            Ok(CheckOutcome {
                valid: true,
                fingerprints: vec!["TRUSTED".into()],
            })
        }
    }

    struct TitledEmbed;

    impl EmbedLookup for TitledEmbed {
        fn lookup(&self, url: &str) -> Result<Option<EmbedResource>> {
            Ok(Some(EmbedResource {
                title: Some("Embedded Title".into()),
                url: url.to_string(),
                ..Default::default()
            }))
        }
    }

    fn open_options() -> ImportOptions {
        ImportOptions {
            require_signature: false,
            ..ImportOptions::default()
        }
    }

    fn message(subject: Option<&str>, body: &str) -> Message {
        Message {
            sender: EmailAddress::from_parts(None, Some("from@example.com")),
            subject: subject.map(String::from),
            date: DateTime::parse_from_rfc3339("2018-01-01T10:30:00Z").unwrap(),
            body: Part::text(ContentKind::PlainText, body),
            attachments: Vec::new(),
            signature: SignatureInfo::Unsigned,
        }
    }

    #[test]
    fn test_new_rejects_missing_site() {
        let site = tempfile::tempdir().unwrap();
        let missing = site.path().join("nope");
        assert!(matches!(
            Importer::new(missing, open_options()),
            Err(MailpostError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_validates() {
        let site = tempfile::tempdir().unwrap();
        assert!(matches!(
            Importer::from_config(site.path(), &Config::default()),
            Err(MailpostError::Config(_))
        ));
    }

    #[test]
    fn test_publishes_simple_message() {
        let site = tempfile::tempdir().unwrap();
        let mut importer = Importer::new(site.path(), open_options()).unwrap();
        let outcome = importer.import_message(&message(Some("Subject"), "Body")).unwrap();

        match outcome {
            ImportOutcome::Published { post, slug, images, verdict } => {
                assert_eq!(slug.as_str(), "2018-01-01-subject");
                assert_eq!(post, site.path().join("_posts/2018-01-01-subject.md"));
                assert!(images.is_empty());
                assert_eq!(verdict, SignatureVerdict::Unsigned);
            }
            ImportOutcome::Dropped { .. } => panic!("message should be published"),
        }
    }

    #[test]
    fn test_drops_unsigned_when_enforced() {
        let site = tempfile::tempdir().unwrap();
        let options = ImportOptions {
            require_signature: true,
            allowed: vec!["TRUSTED".into()],
            ..ImportOptions::default()
        };
        let mut importer = Importer::new(site.path(), options).unwrap();
        let outcome = importer.import_message(&message(Some("Subject"), "Body")).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Dropped {
                verdict: SignatureVerdict::Unsigned
            }
        );
        assert_eq!(std::fs::read_dir(site.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_trusted_signature_publishes_when_enforced() {
        let site = tempfile::tempdir().unwrap();
        let options = ImportOptions {
            require_signature: true,
            allowed: vec!["TRUSTED".into()],
            ..ImportOptions::default()
        };
        let mut importer = Importer::new(site.path(), options)
            .unwrap()
            .with_verifier(TrustAll);
        let mut msg = message(Some("Signed"), "Body");
        msg.signature = SignatureInfo::Signed(SignedPayload {
            content: b"x".to_vec(),
            signature: b"y".to_vec(),
        });
        let outcome = importer.import_message(&msg).unwrap();
        assert!(matches!(
            outcome,
            ImportOutcome::Published { verdict: SignatureVerdict::Trusted { .. }, .. }
        ));
    }

    #[test]
    fn test_random_slug_is_seedable() {
        let slug_with_seed = |seed| {
            let site = tempfile::tempdir().unwrap();
            let mut importer = Importer::new(site.path(), open_options())
                .unwrap()
                .with_rng(StdRng::seed_from_u64(seed));
            match importer.import_message(&message(None, "Body")).unwrap() {
                ImportOutcome::Published { slug, .. } => slug,
                ImportOutcome::Dropped { .. } => panic!("expected a post"),
            }
        };
        assert_eq!(slug_with_seed(3), slug_with_seed(3));
        assert!(slug_with_seed(3).as_str().starts_with("2018-01-01-"));
        assert_eq!(slug_with_seed(3).as_str().len(), "2018-01-01-".len() + 8);
    }

    #[test]
    fn test_title_from_embed_when_enabled() {
        let site = tempfile::tempdir().unwrap();
        let options = ImportOptions {
            title_from_embed: true,
            ..open_options()
        };
        let mut importer = Importer::new(site.path(), options)
            .unwrap()
            .with_lookup(TitledEmbed);
        let outcome = importer
            .import_message(&message(None, "https://vimeo.com/1"))
            .unwrap();
        match outcome {
            ImportOutcome::Published { slug, .. } => {
                assert_eq!(slug.as_str(), "2018-01-01-embedded-title")
            }
            ImportOutcome::Dropped { .. } => panic!("expected a post"),
        }
    }

    #[test]
    fn test_subject_wins_over_embed_title() {
        let site = tempfile::tempdir().unwrap();
        let options = ImportOptions {
            title_from_embed: true,
            ..open_options()
        };
        let mut importer = Importer::new(site.path(), options)
            .unwrap()
            .with_lookup(TitledEmbed);
        let outcome = importer
            .import_message(&message(Some("Mine"), "https://vimeo.com/1"))
            .unwrap();
        assert!(matches!(
            outcome,
            ImportOutcome::Published { ref slug, .. } if slug.as_str() == "2018-01-01-mine"
        ));
    }

    #[test]
    fn test_images_are_saved_with_post() {
        let site = tempfile::tempdir().unwrap();
        let mut importer = Importer::new(site.path(), open_options()).unwrap();
        let mut msg = message(Some("Subject"), "Body");
        msg.attachments.push(Attachment {
            filename: "image.png".into(),
            content_type: "image/png".into(),
            content: b"png".to_vec(),
        });
        match importer.import_message(&msg).unwrap() {
            ImportOutcome::Published { images, .. } => {
                assert_eq!(images, vec!["/posts/2018-01-01-subject/image.png"]);
            }
            ImportOutcome::Dropped { .. } => panic!("expected a post"),
        }
    }

    #[test]
    fn test_malformed_input_writes_nothing() {
        let site = tempfile::tempdir().unwrap();
        let mut importer = Importer::new(site.path(), open_options()).unwrap();
        assert!(matches!(
            importer.import(b""),
            Err(MailpostError::MalformedMessage(_))
        ));
        assert_eq!(std::fs::read_dir(site.path()).unwrap().count(), 0);
    }
}
