use crate::config::types::{ProbeError, Result};
use crate::plugins::contract::{TestKind, TestPlugin};
use crate::plugins::kinds::{
    compliance::CompliancePlugin, performance::PerformancePlugin,
    security_adv::SecurityAdvancedPlugin, security_basic::SecurityBasicPlugin,
    stability::StabilityPlugin,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Zero-argument constructor for one plugin kind.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn TestPlugin> + Send + Sync>;

/// Immutable kind → factory table built once at start-up.
#[derive(Clone)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// The five built-in kinds.
    pub fn builtin() -> Result<Self> {
        Ok(Self::builder()
            .register(TestKind::Performance.as_str(), || Box::new(PerformancePlugin))?
            .register(TestKind::Stability.as_str(), || Box::new(StabilityPlugin))?
            .register(TestKind::Compliance.as_str(), || Box::new(CompliancePlugin))?
            .register(TestKind::SecurityBasic.as_str(), || Box::new(SecurityBasicPlugin))?
            .register(TestKind::SecurityAdv.as_str(), || Box::new(SecurityAdvancedPlugin))?
            .build())
    }

    /// Registered kinds, sorted.
    pub fn available_kinds(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn make_plugin(&self, kind: &str) -> Result<Box<dyn TestPlugin>> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| ProbeError::NotFound(format!("plugin not found for kind: {}", kind)))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kinds", &self.available_kinds())
            .finish()
    }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    factories: BTreeMap<String, PluginFactory>,
}

impl std::fmt::Debug for PluginRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistryBuilder")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistryBuilder {
    /// Add a kind. Registering the same kind twice is a programming error.
    pub fn register<F>(mut self, kind: impl Into<String>, factory: F) -> Result<Self>
    where
        F: Fn() -> Box<dyn TestPlugin> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(ProbeError::DuplicateKind(kind));
        }
        self.factories.insert(kind, Arc::new(factory));
        Ok(self)
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            factories: self.factories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::contract::{PluginContext, PluginOutcome};

    struct Noop;

    #[async_trait::async_trait]
    impl TestPlugin for Noop {
        fn kind(&self) -> &str {
            "noop"
        }

        async fn run(&self, _ctx: &PluginContext) -> Result<PluginOutcome> {
            Ok(PluginOutcome::passed("noop", Default::default()))
        }
    }

    #[test]
    fn builtin_kinds_are_sorted() {
        let registry = PluginRegistry::builtin().unwrap();
        assert_eq!(
            registry.available_kinds(),
            vec!["compliance", "performance", "security_adv", "security_basic", "stability"]
        );
        for kind in TestKind::ALL {
            assert_eq!(registry.make_plugin(kind.as_str()).unwrap().kind(), kind.as_str());
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = PluginRegistry::builder()
            .register("noop", || Box::new(Noop))
            .unwrap()
            .register("noop", || Box::new(Noop))
            .unwrap_err();
        assert!(matches!(err, ProbeError::DuplicateKind(kind) if kind == "noop"));
    }

    #[test]
    fn unknown_kind_is_not_found() {
        let registry = PluginRegistry::builtin().unwrap();
        assert!(matches!(
            registry.make_plugin("bogus_kind"),
            Err(ProbeError::NotFound(_))
        ));
    }
}
