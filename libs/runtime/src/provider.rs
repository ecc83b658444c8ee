use crate::config::AppConfig;

/// Read-only access to a module's configuration section by name.
///
/// Implemented by [`AppConfigProvider`]; kept as a trait so callers (e.g.
/// `main.rs`'s modkit adapter) can depend on `runtime` without pulling in
/// modkit's own `ConfigProvider` trait.
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// Owns the loaded [`AppConfig`] and serves per-module sections from its
/// `modules` bag.
pub struct AppConfigProvider {
    config: AppConfig,
}

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.config.modules.get(module_name)
    }
}
