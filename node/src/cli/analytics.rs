use bc_analytics::AnalyticsConfig;
use bp_utils::parsers::parse_url;
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters used to config analytics.
#[derive(Debug, Clone, Args, Deserialize, Serialize)]
pub struct AnalyticsParams {
    /// Name of the service.
    #[arg(env = "BOOP_ANALYTICS_SERVICE_NAME", long, alias = "analytics", default_value = "boop_submitter")]
    pub analytics_service_name: String,

    /// Endpoint of the OTLP collector. Spans, metrics and logs are only exported when this is set.
    #[arg(env = "OTEL_EXPORTER_OTLP_ENDPOINT", long, value_parser = parse_url, value_name = "URL")]
    pub analytics_collection_endpoint: Option<Url>,
}

impl AnalyticsParams {
    pub fn as_analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            service_name: self.analytics_service_name.clone(),
            collection_endpoint: self.analytics_collection_endpoint.clone(),
        }
    }
}
