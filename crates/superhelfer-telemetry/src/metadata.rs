use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource as semconv;
use superhelfer_config::TelemetryConfig;

/// Resource attributes attached to every exported span and metric
pub fn build_resource(config: &TelemetryConfig) -> Resource {
    let mut extra: Vec<_> = config.resource_attributes.iter().collect();
    extra.sort();

    let attributes = [
        KeyValue::new(semconv::SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ]
    .into_iter()
    .chain(extra.into_iter().map(|(key, value)| KeyValue::new(key.clone(), value.clone())));

    Resource::builder().with_attributes(attributes).build()
}
