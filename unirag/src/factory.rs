//! Build providers and stores from [`Settings`].

use std::sync::Arc;

use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::inmemory::InMemoryVectorStore;
use crate::providers::{CohereProvider, DeepSeekProvider, OpenAiProvider};
use crate::settings::{ProviderBackend, Settings, StoreBackend};
use crate::vectorstore::VectorStore;

enum Provider {
    OpenAi(OpenAiProvider),
    DeepSeek(DeepSeekProvider),
    Cohere(CohereProvider),
}

fn require_key(key: Option<&String>, variable: &str) -> Result<String> {
    key.cloned().ok_or_else(|| RagError::ConfigError(format!("{variable} is not set")))
}

fn provider(backend: ProviderBackend, settings: &Settings) -> Result<Provider> {
    let defaults = settings.provider_defaults;
    Ok(match backend {
        ProviderBackend::OpenAi => {
            let key = require_key(settings.openai_api_key.as_ref(), "OPENAI_API_KEY")?;
            Provider::OpenAi(
                OpenAiProvider::new(key)
                    .with_compatible_url(settings.openai_api_url.clone().unwrap_or_default())
                    .with_defaults(defaults),
            )
        }
        ProviderBackend::DeepSeek => {
            let key = require_key(settings.deepseek_api_key.as_ref(), "DEEPSEEK_API_KEY")?;
            let provider = DeepSeekProvider::new(key).with_defaults(defaults);
            Provider::DeepSeek(match &settings.deepseek_api_url {
                Some(url) => provider.with_api_url(url.clone()),
                None => provider,
            })
        }
        ProviderBackend::Cohere => {
            let key = require_key(settings.cohere_api_key.as_ref(), "COHERE_API_KEY")?;
            Provider::Cohere(CohereProvider::new(key).with_defaults(defaults))
        }
    })
}

/// Build the generation provider selected by `GENERATION_BACKEND`.
///
/// The model is set from `GENERATION_MODEL_ID` when present; without it every
/// generation call yields no result.
pub fn generation_provider(settings: &Settings) -> Result<Arc<dyn GenerationProvider>> {
    let model = settings.generation_model_id.clone();
    let backend = settings.generation_backend;
    info!(%backend, model = model.as_deref().unwrap_or("<unset>"), "building generation provider");

    Ok(match provider(backend, settings)? {
        Provider::OpenAi(mut p) => {
            if let Some(model) = model {
                p.set_generation_model(model);
            }
            Arc::new(p)
        }
        Provider::DeepSeek(mut p) => {
            if let Some(model) = model {
                p.set_generation_model(model);
            }
            Arc::new(p)
        }
        Provider::Cohere(mut p) => {
            if let Some(model) = model {
                p.set_generation_model(model);
            }
            Arc::new(p)
        }
    })
}

/// Build the embedding provider selected by `EMBEDDING_BACKEND`.
///
/// The model is set when both `EMBEDDING_MODEL_ID` and `EMBEDDING_MODEL_SIZE` are present.
pub fn embedding_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = settings.embedding_model_id.clone().zip(settings.embedding_model_size);
    let backend = settings.embedding_backend;
    info!(%backend, configured = model.is_some(), "building embedding provider");

    Ok(match provider(backend, settings)? {
        Provider::OpenAi(mut p) => {
            if let Some((id, size)) = model {
                p.set_embedding_model(id, size);
            }
            Arc::new(p)
        }
        Provider::DeepSeek(mut p) => {
            if let Some((id, size)) = model {
                p.set_embedding_model(id, size);
            }
            Arc::new(p)
        }
        Provider::Cohere(mut p) => {
            if let Some((id, size)) = model {
                p.set_embedding_model(id, size);
            }
            Arc::new(p)
        }
    })
}

/// Build the vector store selected by `VECTOR_DB_BACKEND`. The store is not connected yet.
pub fn vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let metric = settings.vector_db_distance;
    match settings.vector_db_backend {
        StoreBackend::Memory => Ok(match &settings.vector_db_path {
            Some(path) => Arc::new(InMemoryVectorStore::persistent(path.clone(), metric)),
            None => Arc::new(InMemoryVectorStore::new(metric)),
        }),
        #[cfg(feature = "qdrant")]
        StoreBackend::Qdrant => Ok(Arc::new(match &settings.vector_db_url {
            Some(url) => crate::qdrant::QdrantVectorStore::new(url.clone(), metric),
            None => crate::qdrant::QdrantVectorStore::default_url(metric),
        })),
        #[cfg(not(feature = "qdrant"))]
        StoreBackend::Qdrant => Err(RagError::ConfigError(
            "VECTOR_DB_BACKEND=QDRANT requires the `qdrant` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorstore::DistanceMetric;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let settings =
            Settings { generation_backend: ProviderBackend::Cohere, ..Settings::default() };
        assert!(matches!(generation_provider(&settings), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn embedding_provider_takes_model_size() {
        let settings = Settings {
            embedding_backend: ProviderBackend::DeepSeek,
            deepseek_api_key: Some("k".into()),
            embedding_model_id: Some("embed".into()),
            embedding_model_size: Some(768),
            ..Settings::default()
        };
        let provider = embedding_provider(&settings).unwrap();
        assert_eq!(provider.name(), "DeepSeek");
        assert_eq!(provider.embedding_size(), Some(768));
    }

    #[test]
    fn embedding_size_needs_model_id() {
        let settings = Settings {
            openai_api_key: Some("k".into()),
            embedding_model_size: Some(768),
            ..Settings::default()
        };
        assert_eq!(embedding_provider(&settings).unwrap().embedding_size(), None);
    }

    #[tokio::test]
    async fn memory_store_uses_configured_metric() {
        let settings = Settings { vector_db_distance: DistanceMetric::Dot, ..Settings::default() };
        let store = vector_store(&settings).unwrap();
        assert_eq!(store.distance_metric(), DistanceMetric::Dot);
        store.connect().await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
