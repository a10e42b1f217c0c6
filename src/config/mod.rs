pub mod plugin;
pub mod provider;
pub mod settings;

pub use plugin::PluginConfiguration;
pub use provider::ProviderConfiguration;
pub use settings::EngineSettings;
