use anyhow::{Context, Result};
use clap::Parser;
use stackd_core::registry::RuntimeRegistry;
use stackd_provision::config_loader;
use stackd_provision::provisioner::{DestroyRequest, ProvisionRequest, StopRequest};
use stackd_provision::Provisioner;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = config_loader::load_from_env();

    match args.command {
        Commands::Provision {
            project_id,
            project_ref,
            name,
            org,
            cloud_provider,
            region,
            db_password,
            db_version,
            root,
            exclude,
        } => {
            let provisioner = Provisioner::new(config)?;
            let request = ProvisionRequest {
                project_id,
                project_ref: project_ref.clone(),
                project_name: name,
                organization_slug: org,
                cloud_provider,
                region,
                database_password: db_password,
                db_version,
                project_root: root.clone(),
                excluded_services: if exclude.is_empty() {
                    None
                } else {
                    Some(exclude)
                },
            };
            let outcome = provisioner.provision(&request).await?;

            let mut registry = RuntimeRegistry::load().await.unwrap_or_else(|e| {
                warn!("failed to load runtime registry, starting fresh: {e}");
                RuntimeRegistry::default()
            });
            registry.register(project_id, &project_ref, &root);
            registry
                .save()
                .await
                .context("failed to record runtime registration")?;

            println!("stack ready at {}", outcome.runtime.site_url);
        }
        Commands::Stop { project_ref, root } => {
            let provisioner = Provisioner::new(config)?;
            provisioner
                .stop(&StopRequest {
                    project_ref: project_ref.clone(),
                    project_root: root,
                })
                .await?;
            println!("stack {project_ref} stopped");
        }
        Commands::Destroy {
            project_id,
            project_ref,
            org,
            root,
        } => {
            let provisioner = Provisioner::new(config)?;
            provisioner
                .destroy(&DestroyRequest {
                    project_ref: project_ref.clone(),
                    organization_slug: org,
                    project_root: root,
                })
                .await?;

            let mut registry = RuntimeRegistry::load().await.unwrap_or_default();
            if registry.remove(project_id).is_some() {
                registry
                    .save()
                    .await
                    .context("failed to drop runtime registration")?;
            }

            println!("stack {project_ref} destroyed");
        }
        Commands::Ports { project_id } => {
            let ports = config.ports.allocate_for(project_id)?;
            println!("api:    {}", ports.api);
            println!("db:     {}", ports.db);
            println!("studio: {}", ports.studio);
            println!("mail:   {}", ports.mail);
        }
    }

    Ok(())
}
