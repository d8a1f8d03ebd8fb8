use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoClient;
use lab_analyzer::DynamoRecordStore;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use medical_event_consumer::{appointment_table, MedicalEventConsumer, Request, Response};
use std::sync::Arc;
use tracing::info;

async fn function_handler(
    consumer: &MedicalEventConsumer,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    Ok(consumer.handle(event.payload).await)
}

async fn build_consumer(table_name: Option<String>) -> MedicalEventConsumer {
    let Some(table_name) = table_name else {
        return MedicalEventConsumer::new();
    };

    info!("Appointment persistence enabled (table {})", table_name);

    let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    MedicalEventConsumer::with_appointment_store(Arc::new(DynamoRecordStore::new(
        DynamoClient::new(&config),
        table_name,
    )))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let table_name = appointment_table(|key| std::env::var(key).ok())?;
    let consumer = build_consumer(table_name).await;
    let consumer = &consumer;

    run(service_fn(move |event: LambdaEvent<Request>| async move {
        function_handler(consumer, event).await
    }))
    .await
}
