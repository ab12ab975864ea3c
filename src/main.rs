use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vsdx_translator::{
    find_language, pipeline::LogProgress, server, translate_batch, translation, AppConfig,
    AppState, GoogleTranslateClient, PipelineOptions, UploadedFile, SUPPORTED_LANGUAGES,
};

#[derive(Debug, Parser)]
#[command(name = "vsdx-translator", version, about = "Translate the text of Visio diagrams")]
struct Cli {
    /// Configuration file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the web UI.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Translate diagrams on disk.
    Translate {
        /// Language code or name, e.g. `es` or `Spanish`.
        #[arg(long, short)]
        target: Option<String>,
        /// Service account key; defaults to the configured path or
        /// GOOGLE_APPLICATION_CREDENTIALS.
        #[arg(long, conflicts_with = "access_token")]
        credentials: Option<PathBuf>,
        /// Ready-made OAuth access token instead of a service account.
        #[arg(long)]
        access_token: Option<String>,
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
        /// Name outputs `{stem}.{code}.vsdx` instead of translating the name.
        #[arg(long)]
        keep_names: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the languages offered by the web UI.
    Languages,
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("vsdx_translator={}", config.logging.level))?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(Some(cli.config.as_str()));
    init_tracing(&config)?;
    tracing::info!("Loaded configuration: {:?}", config.server.name);

    match cli.command {
        Command::Serve { bind, port } => {
            let bind = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            let port = port.unwrap_or(config.server.port);
            let default_client = translation::client_from_environment(&config)?;
            if default_client.is_none() {
                tracing::info!("No server credentials; sessions will ask for a service account key");
            }
            server::serve(AppState::new(config, default_client), &bind, port).await?;
        }
        Command::Translate {
            target,
            credentials,
            access_token,
            output_dir,
            keep_names,
            files,
        } => {
            let target = target.unwrap_or_else(|| config.translation.default_target_lang.clone());
            let target_lang = match find_language(&target) {
                Some(language) => language.code.to_string(),
                None => {
                    tracing::warn!(target = %target, "Language not in the supported table, passing it through");
                    target
                }
            };

            let client = match (credentials, access_token) {
                (_, Some(token)) => GoogleTranslateClient::with_access_token(token, &config)?,
                (Some(path), None) => GoogleTranslateClient::from_credentials_file(&path, &config)?,
                (None, None) => translation::client_from_environment(&config)?.context(
                    "no credentials: pass --credentials, --access-token or set GOOGLE_APPLICATION_CREDENTIALS",
                )?,
            };

            let uploads = files
                .iter()
                .map(|path| UploadedFile::from_path(path))
                .collect::<Result<Vec<_>, _>>()?;
            let options = PipelineOptions {
                target_lang,
                scratch_dir: config.intake.scratch_dir.clone(),
                translate_file_name: !keep_names,
                max_unpacked_bytes: config.max_unpacked_bytes(),
            };

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("cannot create {}", output_dir.display()))?;

            let mut written = 0;
            for item in translate_batch(&client, &uploads, &options, &mut LogProgress).await {
                match item.result {
                    Ok(file) => {
                        let path = output_dir.join(&file.file_name);
                        std::fs::write(&path, &file.bytes)
                            .with_context(|| format!("cannot write {}", path.display()))?;
                        println!("{} -> {}", item.name, path.display());
                        written += 1;
                    }
                    Err(e) => eprintln!("{}: {}", item.name, e),
                }
            }
            // Files skipped after a credential failure count as failed.
            if written < uploads.len() {
                anyhow::bail!("{} of {} files failed", uploads.len() - written, uploads.len());
            }
        }
        Command::Languages => {
            for language in SUPPORTED_LANGUAGES {
                println!("{:<8} {}", language.code, language.name);
            }
        }
    }

    Ok(())
}
