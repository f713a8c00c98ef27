use anyhow::Context;
use clap::{Parser, Subcommand};
use documents::DocumentKind;
use extraction::{ExtractionResult, OrderFile};
use orders::ExtractedOrder;
use radtrack_core::{
    render_authorization, AppContext, BatchItem, CredentialProvider, FeedFilters, RoleAssignment,
    StudyStatus,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "radtrack")]
#[command(about = "RadTrack imaging order tracking CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract orders from PDF or image files and print them as JSON
    Extract {
        /// Order files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Render the authorization PDF for an order JSON file
    Authorization {
        /// Order JSON file
        order: PathBuf,
        /// Produce the institution's own authorization
        #[arg(long)]
        own: bool,
        /// Output path (defaults to the download file name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create tracked studies from order JSON files
    Ingest {
        /// Order JSON files
        #[arg(required = true)]
        orders: Vec<PathBuf>,
        /// Service area for every study (defaults to RADTRACK_DEFAULT_SERVICE)
        #[arg(long)]
        service: Option<String>,
    },
    /// Print the study feed
    Feed {
        /// Free-text search on patient name or id
        #[arg(long)]
        search: Option<String>,
        /// Modality tags, comma separated
        #[arg(long, value_delimiter = ',')]
        modality: Vec<String>,
        /// Service areas, comma separated
        #[arg(long, value_delimiter = ',')]
        service: Vec<String>,
        /// Statuses, comma separated
        #[arg(long, value_delimiter = ',')]
        status: Vec<String>,
    },
    /// Change the status of a study
    SetStatus {
        /// Study id
        id: String,
        /// Pendiente, Completado, Leído or Cancelado
        status: String,
        /// Cancellation reason (required for Cancelado)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Assign a role to an account (administrators only)
    SetRole {
        /// Bearer token of the administrator making the change
        #[arg(long)]
        caller_token: String,
        /// Account email
        email: String,
        /// administrador, enfermero, tecnologo or transcriptora
        role: String,
        /// Service area
        #[arg(long)]
        service: Option<String>,
        /// Free-text general area
        #[arg(long)]
        area: Option<String>,
    },
}

fn read_order(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))
}

/// Reads every order JSON file, keeping each failure next to its path.
fn read_orders(paths: &[PathBuf]) -> Vec<(&Path, anyhow::Result<serde_json::Value>)> {
    paths
        .iter()
        .map(|path| (path.as_path(), read_order(path)))
        .collect()
}

/// Loads every order file for extraction, keeping each failure next to its name.
fn load_order_files(paths: &[PathBuf]) -> Vec<(String, ExtractionResult<OrderFile>)> {
    paths
        .iter()
        .map(|path| (path.display().to_string(), OrderFile::from_path(path)))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("radtrack=warn".parse()?)
                .add_directive("extraction=warn".parse()?)
                .add_directive("documents=warn".parse()?)
                .add_directive("orders=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'radtrack --help' for commands");
        return Ok(());
    };

    match command {
        Commands::Extract { files } => {
            let ctx = AppContext::from_env()?;
            let client = ctx
                .extraction()
                .context("GEMINI_API_KEY is not set; extraction is unavailable")?;
            let batch = client.extract_loaded(load_order_files(&files)).await;
            for outcome in &batch.outcomes {
                match &outcome.result {
                    Ok(order) => {
                        println!("# {}", outcome.file_name);
                        println!("{}", serde_json::to_string_pretty(order)?);
                    }
                    Err(e) => eprintln!("Error extracting {}: {}", outcome.file_name, e),
                }
            }
            println!(
                "Extracted {} of {} files ({} failed)",
                batch.success_count(),
                batch.outcomes.len(),
                batch.error_count()
            );
        }
        Commands::Authorization { order, own, out } => {
            let order = ExtractedOrder::from_value(read_order(&order)?)?;
            let kind = if own {
                DocumentKind::Own
            } else {
                DocumentKind::Standard
            };
            let document = render_authorization(&order, kind)?;
            let out = out.unwrap_or_else(|| PathBuf::from(&document.file_name));
            std::fs::write(&out, &document.bytes)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        Commands::Ingest { orders, service } => {
            let ctx = AppContext::from_env()?;
            let mut paths = Vec::with_capacity(orders.len());
            let mut items = Vec::with_capacity(orders.len());
            let mut unreadable = 0;
            for (path, order) in read_orders(&orders) {
                match order {
                    Ok(order) => {
                        paths.push(path);
                        items.push(BatchItem {
                            order,
                            service: service.clone(),
                            document_generated: false,
                        });
                    }
                    Err(e) => {
                        unreadable += 1;
                        eprintln!("Error ingesting {}: {:#}", path.display(), e);
                    }
                }
            }
            let report = ctx.ingestion().create_batch(items).await;
            for (path, outcome) in paths.iter().zip(&report.outcomes) {
                match outcome {
                    Ok(id) => println!("Created study {} from {}", id, path.display()),
                    Err(e) => eprintln!("Error ingesting {}: {}", path.display(), e),
                }
            }
            println!(
                "{} created, {} failed",
                report.success_count(),
                report.error_count() + unreadable
            );
        }
        Commands::Feed {
            search,
            modality,
            service,
            status,
        } => {
            let ctx = AppContext::from_env()?;
            let filters = FeedFilters {
                search,
                modalities: modality,
                services: service,
                statuses: status
                    .iter()
                    .map(|s| s.parse::<StudyStatus>())
                    .collect::<Result<Vec<_>, _>>()?,
                ..FeedFilters::default()
            };
            let view = ctx.feed().snapshot(&filters).await?;
            if view.studies.is_empty() {
                println!("No studies found.");
            }
            for study in &view.studies {
                println!(
                    "{}  {:<10}  {:<6}  {:<4}  {}  {}",
                    study.id,
                    study.status,
                    study.service,
                    study.modality,
                    study.patient.full_name,
                    study.study_name
                );
            }
            let summary = |buckets: &[radtrack_core::SummaryBucket]| {
                buckets
                    .iter()
                    .map(|b| format!("{} {}", b.key, b.count))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!("Total: {}", view.total);
            println!("Pending by modality: {}", summary(&view.modality_summary));
            println!("Pending by service: {}", summary(&view.service_summary));
        }
        Commands::SetStatus { id, status, reason } => {
            let ctx = AppContext::from_env()?;
            let study = ctx
                .studies()
                .change_status(&id, status.parse()?, reason.as_deref())
                .await?;
            println!("Study {} is now {}", study.id, study.status);
        }
        Commands::SetRole {
            caller_token,
            email,
            role,
            service,
            area,
        } => {
            let ctx = AppContext::from_env()?;
            let caller = ctx.credentials().verify_token(&caller_token).await?;
            let outcome = ctx
                .users()
                .set_user_role(
                    &caller,
                    RoleAssignment {
                        email: Some(email),
                        role: Some(role),
                        service,
                        area,
                    },
                )
                .await?;
            println!("{}", outcome.message);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use extraction::{ExtractionClient, ExtractionError, ExtractionSettings, MockVisionModel};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn order() -> serde_json::Value {
        json!({
            "patient": {
                "id": "123",
                "fullName": "JUAN PEREZ",
                "birthDate": "1980-06-15",
                "sex": "M",
                "entidad": "NUEVA EPS"
            },
            "studies": [{ "cups": "871121", "nombre": "RX DE TORAX" }],
            "diagnosis": { "code": "R05X", "description": "TOS" },
            "physician": {
                "fullName": "ANA GOMEZ",
                "registryNumber": "RM-5521",
                "specialty": "MEDICINA GENERAL"
            },
            "order": { "date": "2024-05-02", "institutionName": "HOSPITAL SAN JOSE" }
        })
    }

    #[test]
    fn unreadable_order_files_fail_alone() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("orden.json");
        std::fs::write(&good, order().to_string()).unwrap();
        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{ not json").unwrap();
        let missing = dir.path().join("missing.json");

        let paths = vec![good.clone(), missing, garbled, good];
        let read = read_orders(&paths);
        assert_eq!(read.len(), 4);
        assert!(read[0].1.is_ok());
        assert!(read[1].1.is_err());
        assert!(read[2].1.is_err());
        assert_eq!(read[3].1.as_ref().unwrap()["patient"]["id"], "123");
    }

    #[tokio::test]
    async fn extraction_continues_past_a_missing_file() {
        let dir = TempDir::new().unwrap();
        let scan = dir.path().join("orden.pdf");
        std::fs::write(&scan, b"%PDF-1.4\n%fake scan\n").unwrap();
        let paths = vec![dir.path().join("missing.pdf"), scan];

        let model = MockVisionModel::new(&order().to_string());
        let client = ExtractionClient::new(Arc::new(model.clone()), ExtractionSettings::default());
        let batch = client.extract_loaded(load_order_files(&paths)).await;

        assert_eq!(batch.outcomes.len(), 2);
        assert!(matches!(
            batch.outcomes[0].result,
            Err(ExtractionError::FileRead { .. })
        ));
        assert!(batch.outcomes[1].result.is_ok());
        assert_eq!(batch.success_count(), 1);
        assert_eq!(model.calls(), 1);
    }
}
