use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_sdk_s3::Client as S3Client;
use lab_analyzer::{
    AgentTools, AnalysisResponse, AnalyzerConfig, BedrockAgent, DynamoRecordStore, EventBridgeBus,
    EventTool, LabEventDispatcher, MemoryTool, S3BlobStore,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

async fn function_handler(
    dispatcher: &LabEventDispatcher,
    event: LambdaEvent<Value>,
) -> Result<AnalysisResponse, Error> {
    info!("Lab event received: {}", event.context.request_id);
    Ok(dispatcher.handle_raw(event.payload).await)
}

async fn build_dispatcher(config: &AnalyzerConfig) -> LabEventDispatcher {
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let bedrock_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.bedrock_region.clone()))
        .load()
        .await;

    let tools = AgentTools::new(
        MemoryTool::new(Arc::new(DynamoRecordStore::new(
            DynamoClient::new(&aws_config),
            &config.table_name,
        ))),
        EventTool::new(Arc::new(EventBridgeBus::new(
            EventBridgeClient::new(&aws_config),
            &config.event_bus_name,
        ))),
    );

    let agent = BedrockAgent::new(
        BedrockClient::new(&bedrock_config),
        &config.model_id,
        config.max_agent_turns,
    );

    LabEventDispatcher::new(
        Arc::new(S3BlobStore::new(S3Client::new(&aws_config))),
        tools,
        Arc::new(agent),
    )
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = AnalyzerConfig::from_env()?;
    info!(
        "Starting lab analyzer (table {}, model {})",
        config.table_name, config.model_id
    );

    let dispatcher = build_dispatcher(&config).await;
    let dispatcher = &dispatcher;

    run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(dispatcher, event).await
    }))
    .await
}
