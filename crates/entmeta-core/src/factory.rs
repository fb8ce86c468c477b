//! Public entry point: `ModelFactory` owns the source, the configuration
//! and the model cache, and serves models by key.

use std::fmt;
use std::sync::Arc;
use tracing::{info, trace, warn};

use crate::builder::EntityModelBuilder;
use crate::cache::{CacheStats, EntityModelRef, ModelCache, PublishGuard, Reservation};
use crate::config::GlobalConfig;
use crate::error::ModelError;
use crate::messages::{MessageService, NoMessages, TextOverrideResolver};
use crate::source::AttributeSource;
use crate::types::{EntityModel, ModelKey};

pub(crate) struct FactoryInner {
    pub(crate) source: Arc<dyn AttributeSource>,
    pub(crate) config: GlobalConfig,
    pub(crate) texts: TextOverrideResolver,
    pub(crate) cache: ModelCache,
}

impl FactoryInner {
    /// Handle for `key`, building the model first when nobody has reserved
    /// it yet. Never waits on a slot reserved by someone else.
    pub(crate) fn request(&self, key: &ModelKey) -> Result<EntityModelRef, ModelError> {
        match self.cache.reserve(key) {
            Reservation::Existing(slot) => {
                if slot.peek().is_none() {
                    trace!(%key, "model in flight, handing out forwarding proxy");
                }
                Ok(EntityModelRef::new(slot))
            }
            Reservation::Claimed(slot) => {
                let guard = PublishGuard::new(&self.cache, &slot);
                let outcome = EntityModelBuilder::new(self, key).build().map(Arc::new);
                match &outcome {
                    Ok(model) => info!(
                        %key,
                        attributes = model.attributes().len(),
                        leaf = model.is_leaf(),
                        "entity model built"
                    ),
                    Err(err) => warn!(%key, error = %err, "entity model build failed"),
                }

                let failure = outcome.as_ref().err().cloned();
                guard.finish(outcome);
                match failure {
                    Some(err) => Err(err),
                    None => Ok(EntityModelRef::new(slot)),
                }
            }
        }
    }

    /// Request made by the build of `owner`. A dependency that is still
    /// unpublished ties its publication to the owner's; one that already
    /// failed fails the owner.
    pub(crate) fn request_nested(
        &self,
        owner: &ModelKey,
        key: &ModelKey,
    ) -> Result<EntityModelRef, ModelError> {
        let handle = self.request(key)?;
        self.cache.join(owner, key);
        match handle.outcome() {
            Some(Err(err)) => Err(err.clone()),
            _ => Ok(handle),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Thread-safe, cheaply cloneable model factory. Clones share one cache.
#[derive(Clone)]
pub struct ModelFactory {
    inner: Arc<FactoryInner>,
}

pub struct ModelFactoryBuilder {
    source: Arc<dyn AttributeSource>,
    config: GlobalConfig,
    messages: Arc<dyn MessageService>,
}

impl ModelFactoryBuilder {
    pub fn config(mut self, config: GlobalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn messages(mut self, messages: Arc<dyn MessageService>) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> ModelFactory {
        ModelFactory {
            inner: Arc::new(FactoryInner {
                source: self.source,
                config: self.config,
                texts: TextOverrideResolver::new(self.messages),
                cache: ModelCache::default(),
            }),
        }
    }
}

impl ModelFactory {
    /// Factory with default configuration and no message bundles.
    pub fn new(source: impl AttributeSource + 'static) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: impl AttributeSource + 'static) -> ModelFactoryBuilder {
        Self::builder_shared(Arc::new(source))
    }

    pub fn builder_shared(source: Arc<dyn AttributeSource>) -> ModelFactoryBuilder {
        ModelFactoryBuilder {
            source,
            config: GlobalConfig::default(),
            messages: Arc::new(NoMessages),
        }
    }

    /// Default model of `class` (its reference is the class name).
    pub fn get_model(&self, class: &str) -> Result<Arc<EntityModel>, ModelError> {
        self.get_model_by_key(&ModelKey::root(class))
    }

    /// Named variant of `class`. Distinct references are cached separately.
    pub fn get_model_variant(
        &self,
        reference: &str,
        class: &str,
    ) -> Result<Arc<EntityModel>, ModelError> {
        self.get_model_by_key(&ModelKey::new(reference, class))
    }

    /// Waits for a build in progress on another thread, and for the other
    /// builds of its group.
    pub fn get_model_by_key(&self, key: &ModelKey) -> Result<Arc<EntityModel>, ModelError> {
        self.inner.request(key)?.resolve()
    }

    /// Build the default model of every entity class the source knows,
    /// in class name order.
    pub fn build_all(&self) -> Vec<(String, Result<Arc<EntityModel>, ModelError>)> {
        self.entity_classes()
            .into_iter()
            .map(|class| {
                let outcome = self.get_model(&class);
                (class, outcome)
            })
            .collect()
    }

    pub fn entity_classes(&self) -> Vec<String> {
        self.inner
            .source
            .entity_class_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn is_cached(&self, key: &ModelKey) -> bool {
        self.inner.cache.contains(key)
    }

    pub fn cached_keys(&self) -> Vec<ModelKey> {
        self.inner.cache.keys()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    pub fn source(&self) -> &dyn AttributeSource {
        self.inner.source.as_ref()
    }
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache.stats())
            .finish()
    }
}
