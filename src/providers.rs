use std::sync::Arc;

use agent_provider::{ModelProvider, ProviderInitError};
use agent_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use agent_provider_openrouter::{
    OpenRouterProvider, OpenRouterProviderConfig, OPENROUTER_PROVIDER_ID,
};

use crate::config::AppConfig;

pub const APP_TITLE: &str = "chat_agent";

pub fn provider_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn ModelProvider>, ProviderInitError> {
    match config.provider_id.as_str() {
        OPENROUTER_PROVIDER_ID => {
            let mut provider_config = OpenRouterProviderConfig::new(
                config.api_key.clone().unwrap_or_default(),
                config.model.clone(),
            )
            .with_base_url(config.base_url.clone())
            .with_app_title(APP_TITLE);
            if let Some(timeout) = config.timeout {
                provider_config = provider_config.with_timeout(timeout);
            }
            Ok(Arc::new(OpenRouterProvider::new(provider_config)?))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(
            MockProvider::echo().with_model_id(config.model.clone()),
        )),
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {OPENROUTER_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        ))),
    }
}
