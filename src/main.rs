//! CLI entry point for `mailpost`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};

use mailpost::config::{self, Config};
use mailpost::export::post::read_post;
use mailpost::importer::{ImportOutcome, Importer};

#[derive(Parser)]
#[command(
    name = "mailpost",
    version,
    about = "Publish an email as a Jekyll blog post",
    long_about = "Reads one RFC 5322 message from standard input and writes it to \
                  <SITE>/_posts/<date>-<slug>.md. Image attachments are saved under \
                  <SITE>/posts/<date>-<slug>/. By default only messages with a good PGP \
                  signature from an allowed key are published."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Jekyll site folder to import into
    #[arg(value_name = "SITE")]
    site: Option<PathBuf>,

    #[command(flatten)]
    import: ImportArgs,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Overrides for the import pipeline.
#[derive(Args, Clone, Default)]
struct ImportArgs {
    /// Comma-separated fingerprints allowed to publish
    #[arg(long, env = "GPG_ALLOWED", value_name = "FPRS")]
    allow: Option<String>,

    /// Only publish messages signed by an allowed key
    #[arg(long, env = "MAILPOST_REQUIRE_SIGNATURE", value_name = "BOOL")]
    require_signature: Option<bool>,

    /// Do not look up oEmbed data for links
    #[arg(long)]
    no_embed: bool,

    /// GnuPG home directory with the signers' public keys
    #[arg(long, env = "GNUPGHOME", value_name = "DIR")]
    gpg_homedir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one message into a site
    Import {
        site: PathBuf,
        /// Read the message from a file instead of standard input
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        #[command(flatten)]
        opts: ImportArgs,
    },
    /// Print the front matter of a generated post
    Show {
        post: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Import { site, input, opts }) => {
            cmd_import(&site, input.as_deref(), &opts, config)
        }
        Some(Commands::Show { post, json }) => cmd_show(&post, json),
        Some(Commands::Config { save }) => cmd_config(&config, save),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match cli.site {
            Some(site) => cmd_import(&site, None, &cli.import, config),
            None => anyhow::bail!("Please specify the Jekyll site folder as the first parameter"),
        },
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if config.general.log_file && std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailpost.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Apply command-line and environment overrides on top of the file configuration.
fn apply_overrides(mut config: Config, opts: &ImportArgs) -> Config {
    if let Some(ref allow) = opts.allow {
        config.signature.allowed = config::parse_fingerprints(allow);
    }
    if let Some(require) = opts.require_signature {
        config.signature.require = require;
    }
    if opts.no_embed {
        config.embed.enabled = false;
    }
    if let Some(ref home) = opts.gpg_homedir {
        config.signature.gpg_homedir = Some(home.clone());
    }
    config
}

/// Import one message from a file or standard input.
fn cmd_import(
    site: &Path,
    input: Option<&Path>,
    opts: &ImportArgs,
    config: Config,
) -> anyhow::Result<()> {
    let config = apply_overrides(config, opts);

    // Configuration problems surface before the message is read
    let mut importer = Importer::from_config(site, &config)?;

    let raw = match input {
        Some(path) => std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Could not read '{}': {e}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    tracing::debug!(site = %site.display(), bytes = raw.len(), "Read message");

    match importer.import(&raw)? {
        ImportOutcome::Published { post, images, .. } => {
            tracing::info!(
                post = %post.display(),
                images = images.len(),
                "Import complete"
            );
            println!("{}", post.display());
        }
        ImportOutcome::Dropped { verdict } => {
            tracing::info!(verdict = %verdict, "Message not published");
        }
    }
    Ok(())
}

/// Print a post's front matter.
fn cmd_show(path: &Path, json: bool) -> anyhow::Result<()> {
    let (front, body) = read_post(path)?;

    if json {
        let output = serde_json::json!({
            "front_matter": front,
            "body": body,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {:<10} {}", "Layout", front.layout);
    println!(
        "  {:<10} {}",
        "Date",
        front.date.format(mailpost::export::post::DATE_FORMAT)
    );
    if let Some(ref title) = front.title {
        println!("  {:<10} {}", "Title", title);
    }
    for image in &front.images {
        println!("  {:<10} {}", "Image", image);
    }
    if let Some(ref embed) = front.embed {
        println!("  {:<10} {}", "Embed", embed.url);
        if let Some(ref provider) = embed.provider_name {
            println!("  {:<10} {}", "Provider", provider);
        }
    }
    println!(
        "  {:<10} {}",
        "Body",
        humansize::format_size(body.len() as u64, humansize::BINARY)
    );
    println!();
    Ok(())
}

/// Print (and optionally save) the configuration.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if save {
        let path = config::save_config(config)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailpost", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
