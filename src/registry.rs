use crate::errors::SchedulerError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// [`Handler`] is the invokable unit a [`crate::model::ExecDetail`] ultimately resolves to and
/// fires. The scheduler treats it as opaque: it does not know or care what the handler's
/// `bean_class_name`/`method_name` actually wired up to, only that calling it can fail
///
/// # Object Safety
/// Object safe via [`async_trait`], matching how the registry stores handlers behind `Arc<dyn Handler>`
#[async_trait]
pub trait Handler: Debug + Send + Sync {
    /// Invoke the handler for a single fire. An `Err` here is what drives an
    /// [`crate::model::ExecDetail`] into [`crate::model::ExecState::Error`]
    async fn call(&self) -> Result<(), String>;
}

/// Every handler registered under one `bean_class_name`, keyed by `bean_name`. A type with a
/// single registered object (commonly `bean_name = None`) is unambiguous; a type with more than
/// one needs `bean_name` to pick among them
type NamedVariants = DashMap<Option<String>, Arc<dyn Handler>>;

/// [`HandlerRegistry`] maps the durable `(bean_class_name, bean_name)` identity carried by a
/// [`crate::model::TaskHandler`] back to a live, invokable [`Handler`]. It is append-only after
/// startup: the host application registers every handler it owns during its own boot sequence,
/// before [`crate::recovery::recover`] runs, so resolution during recovery never races a
/// registration
///
/// # Resolution
/// [`HandlerRegistry::resolve`] looks up by type first. A type with exactly one registered
/// object resolves unambiguously regardless of what `bean_name` the caller passed — there was
/// only ever one thing it could mean. A type with more than one registered object is ambiguous:
/// the lookup narrows by `bean_name`, and fails with [`SchedulerError::HandlerNotFound`] if that
/// narrowed lookup misses. An unknown type fails the same way
///
/// # Construction
/// [`HandlerRegistry::new`] starts empty. Use [`HandlerRegistry::register`] once per callable
///
/// # See Also
/// - [`Handler`]
/// - [`crate::registration::register`]
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    classes: DashMap<String, NamedVariants>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            classes: DashMap::new(),
        }
    }

    /// Registers a handler under `(bean_class_name, bean_name)`. Re-registering the same pair
    /// overwrites the previous entry — this is deliberate: it lets a host application re-run its
    /// own registration routine idempotently across restarts
    pub fn register(
        &self,
        bean_class_name: impl Into<String>,
        bean_name: Option<String>,
        handler: Arc<dyn Handler>,
    ) {
        self.classes
            .entry(bean_class_name.into())
            .or_default()
            .insert(bean_name, handler);
    }

    /// Resolves a `(bean_class_name, bean_name)` pair to its registered [`Handler`] using the
    /// type-first, narrow-by-name strategy documented on [`HandlerRegistry`]
    pub fn resolve(
        &self,
        bean_class_name: &str,
        bean_name: Option<&str>,
    ) -> Result<Arc<dyn Handler>, SchedulerError> {
        let variants = self.classes.get(bean_class_name).ok_or_else(|| SchedulerError::HandlerNotFound {
            bean_class_name: bean_class_name.to_string(),
            bean_name: bean_name.map(str::to_string),
        })?;

        if variants.len() == 1 {
            return Ok(Arc::clone(variants.iter().next().unwrap().value()));
        }

        variants
            .get(&bean_name.map(str::to_string))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SchedulerError::HandlerNotFound {
                bean_class_name: bean_class_name.to_string(),
                bean_name: bean_name.map(str::to_string),
            })
    }

    pub fn contains(&self, bean_class_name: &str, bean_name: Option<&str>) -> bool {
        self.resolve(bean_class_name, bean_name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn call(&self) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn resolve_unknown_handler_errors() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve("com.example.Job", None).unwrap_err();
        assert!(matches!(err, SchedulerError::HandlerNotFound { .. }));
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let registry = HandlerRegistry::new();
        registry.register("com.example.Job", Some("primary".to_string()), Arc::new(NoopHandler));
        assert!(registry.contains("com.example.Job", Some("primary")));
        assert!(registry.resolve("com.example.Job", Some("primary")).is_ok());
    }

    #[test]
    fn single_variant_resolves_by_type_alone() {
        let registry = HandlerRegistry::new();
        registry.register("com.example.Job", Some("primary".to_string()), Arc::new(NoopHandler));
        // Only one object of this type exists, so it's unambiguous even though the caller
        // neither named it nor matched the name it was registered under
        assert!(registry.resolve("com.example.Job", None).is_ok());
        assert!(registry.resolve("com.example.Job", Some("nobody-registered-this")).is_ok());
    }

    #[test]
    fn multiple_variants_require_name_to_disambiguate() {
        let registry = HandlerRegistry::new();
        registry.register("com.example.Job", Some("primary".to_string()), Arc::new(NoopHandler));
        registry.register("com.example.Job", Some("secondary".to_string()), Arc::new(NoopHandler));

        assert!(registry.resolve("com.example.Job", Some("primary")).is_ok());
        assert!(registry.resolve("com.example.Job", Some("secondary")).is_ok());
        assert!(matches!(
            registry.resolve("com.example.Job", None),
            Err(SchedulerError::HandlerNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("com.example.Job", Some("nonexistent")),
            Err(SchedulerError::HandlerNotFound { .. })
        ));
    }
}
