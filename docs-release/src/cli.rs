///
/// This module implements the CLI interface for docs-release: command parsing,
/// argument validation and user-visible output.
///
/// All core business logic (version parsing and the publish pipeline) lives in
/// the [`docs-release-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: use the installed `docs-release` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`docs-release-core`]: ../../docs-release-core/
use crate::load_config::{load_config, CliConfig};
use crate::local::LocalBackend;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docs_release_core::doc_version::get_doc_version;
use docs_release_core::publish::{publish_docs, PublishRequest};
use docs_release_core::version::make_package_version;
use std::path::PathBuf;

/// CLI for docs-release: Flocker release helpers.
#[derive(Parser)]
#[clap(
    name = "docs-release",
    version,
    about = "Release helpers: package version normalization and documentation publishing"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the package version and release for a versioneer style version
    PackageVersion {
        /// Version string, e.g. 0.1.2pre2-3-gabc
        version: String,
    },
    /// Publish a documentation build to the public docs bucket
    PublishDocs {
        /// The version of Flocker from which the documentation was built
        #[clap(long)]
        flocker_version: String,
        /// The version to publish the documentation as (defaults to the doc
        /// version of --flocker-version)
        #[clap(long)]
        doc_version: Option<String>,
        /// The bucket to publish to
        #[clap(long)]
        bucket: Option<String>,
        /// Path to a YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Directory holding the local buckets
        #[clap(long)]
        storage_root: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::PackageVersion { version } => {
            let package = make_package_version(&version)?;
            tracing::info!(command = "package-version", %package, "Normalized version");
            println!("version: {}", package.version);
            println!("release: {}", package.release);
            Ok(())
        }
        Commands::PublishDocs {
            flocker_version,
            doc_version,
            bucket,
            config,
            storage_root,
        } => {
            let config = match config {
                Some(path) => load_config(path)?,
                None => CliConfig::from_env(),
            };
            let doc_version = match doc_version {
                Some(v) => v,
                None => get_doc_version(&flocker_version)
                    .with_context(|| format!("Cannot derive doc version from {flocker_version}"))?,
            };
            let request = PublishRequest {
                flocker_version,
                doc_version,
                bucket: bucket.unwrap_or(config.publish.bucket),
                source_bucket: config.publish.source_bucket,
                copy_scope: config.publish.copy_scope,
            };
            let backend = LocalBackend::new(storage_root.unwrap_or(config.storage.root));

            tracing::info!(command = "publish-docs", ?request, "Starting documentation publish");
            match publish_docs(&backend, &backend, &request).await {
                Ok(report) => {
                    tracing::info!(command = "publish-docs", "Publish complete");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish-docs", error = %e, "Publish failed");
                    Err(e.into())
                }
            }
        }
    }
}
