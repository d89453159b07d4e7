use std::{process, sync::Arc};

use docasm::{
    application::{
        documents::DocumentService,
        error::AppError,
        repos::{DocumentsRepo, DocumentsWriteRepo},
        templates::TemplateFetcher,
    },
    cache::{CacheConfig, DocumentCache, DocumentKey, StoreDocumentLoader},
    config,
    domain::{
        documents::{DocumentPatch, NewDocument},
        entities::Document,
    },
    infra::{db::PostgresRepositories, error::InfraError, telemetry, templates::HttpTemplateFetcher},
};
use futures::future::join_all;
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(i32::from(error.exit_code()));
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    let log = || {
        error!(
            error = %error,
            source = report.source,
            chain = ?report.messages,
            "{}",
            error.presentation_message()
        );
    };

    if dispatcher::has_been_set() {
        log();
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, log);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let repositories = init_repositories(&settings).await?;
    let service = build_document_service(repositories.clone(), &settings)?;

    match cli_args.command {
        config::Command::Migrate => run_migrate(&repositories).await,
        config::Command::Create(args) => run_create(&service, args).await,
        config::Command::Get(args) => run_get(&service, args).await,
        config::Command::List(args) => run_list(&service, args).await,
        config::Command::Update(args) => run_update(&service, args).await,
        config::Command::Delete(args) => run_delete(&service, args).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_document_service(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<DocumentService, AppError> {
    let reader: Arc<dyn DocumentsRepo> = repositories.clone();
    let writer: Arc<dyn DocumentsWriteRepo> = repositories;
    let templates: Arc<dyn TemplateFetcher> =
        Arc::new(HttpTemplateFetcher::new(&settings.templates)?);

    let loader = Arc::new(StoreDocumentLoader::new(reader.clone(), templates));
    let cache = DocumentCache::new(CacheConfig::from(&settings.cache), loader);

    Ok(DocumentService::new(reader, writer, cache))
}

async fn run_migrate(repositories: &PostgresRepositories) -> Result<(), AppError> {
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    info!(target = "docasm::migrate", "Migrations applied");
    Ok(())
}

async fn run_create(service: &DocumentService, args: config::CreateArgs) -> Result<(), AppError> {
    let mut input = NewDocument::new(args.name);
    if let Some(description) = args.description {
        input = input.with_description(description);
    }
    if let Some(uri) = args.template_uri {
        input = input.with_template_uri(uri);
    }

    let document = service.create(input).await?;
    print_json(&document)
}

#[derive(Serialize)]
struct ResolvedDocument<'a> {
    key: String,
    #[serde(flatten)]
    document: &'a Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
}

async fn run_get(service: &DocumentService, args: config::GetArgs) -> Result<(), AppError> {
    let keys: Vec<DocumentKey> = args
        .ids
        .into_iter()
        .map(DocumentKey::id)
        .chain(args.names.into_iter().map(DocumentKey::name))
        .collect();

    let results = join_all(keys.iter().map(|key| service.find(key))).await;

    let mut documents = Vec::with_capacity(results.len());
    for (key, result) in keys.iter().zip(results) {
        documents.push((key, result?));
    }

    let resolved: Vec<ResolvedDocument<'_>> = documents
        .iter()
        .map(|(key, document)| ResolvedDocument {
            key: key.to_string(),
            document: document.as_ref(),
            template: if args.no_template {
                None
            } else {
                document
                    .template
                    .as_ref()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            },
        })
        .collect();

    print_json(&resolved)
}

async fn run_list(service: &DocumentService, args: config::ListArgs) -> Result<(), AppError> {
    let documents = service.list(args.limit, args.offset).await?;
    print_json(&documents)
}

async fn run_update(service: &DocumentService, args: config::UpdateArgs) -> Result<(), AppError> {
    let patch = DocumentPatch {
        name: args.name,
        description: if args.clear_description {
            Some(None)
        } else {
            args.description.map(Some)
        },
        template_uri: if args.clear_template_uri {
            Some(None)
        } else {
            args.template_uri.map(Some)
        },
    };
    if patch.is_empty() {
        return Err(AppError::validation("update requires at least one field"));
    }

    let document = service.update(args.id, patch).await?;
    print_json(&document)
}

async fn run_delete(service: &DocumentService, args: config::DeleteArgs) -> Result<(), AppError> {
    let key = match (args.id, args.name) {
        (Some(id), _) => DocumentKey::id(id),
        (None, Some(name)) => DocumentKey::name(name),
        (None, None) => return Err(AppError::validation("delete requires --id or --name")),
    };

    let document = service.delete(&key).await?;
    print_json(&document)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
