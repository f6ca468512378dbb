#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use shipbridge::utils::logger;
#[cfg(feature = "lambda")]
use shipbridge::{BridgeConfig, JobReport, LocalStorage, ScheduledJob, Services};
#[cfg(feature = "lambda")]
use std::sync::Arc;

#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    pub job: ScheduledJob,
    pub token: String,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub report: JobReport,
}

#[cfg(feature = "lambda")]
async fn function_handler(
    event: LambdaEvent<Request>,
    services: Arc<Services<LocalStorage>>,
) -> Result<Response, Error> {
    let Request { job, token } = event.payload;
    tracing::info!("Starting scheduled job {} from Lambda", job);

    let report = services.jobs.run(job, &token).await.map_err(|e| {
        tracing::error!(
            "❌ Job {} failed: {} (Severity: {:?})",
            job,
            e,
            e.severity()
        );
        Box::new(e) as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Response {
        message: format!("{} completed", job),
        report,
    })
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // storage.data_dir 在 Lambda 上應指向 /tmp
    let config_path =
        std::env::var("SHIPBRIDGE_CONFIG").unwrap_or_else(|_| "shipbridge.toml".to_string());
    let config = BridgeConfig::from_file(&config_path)?;
    let services = Arc::new(Services::from_config(config).await?);

    run(service_fn(move |event: LambdaEvent<Request>| {
        let services = services.clone();
        async move { function_handler(event, services).await }
    }))
    .await
}
