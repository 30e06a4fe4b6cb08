use std::collections::BTreeMap;

use super::traits::OAuthProvider;
use crate::platform::Platform;

/// Registry of configured direct-OAuth adapters, keyed by canonical platform.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<Platform, Box<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any earlier one for the same platform.
    pub fn register(&mut self, provider: Box<dyn OAuthProvider>) {
        self.providers.insert(provider.platform(), provider);
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn OAuthProvider> {
        self.providers.get(&platform).map(|p| p.as_ref())
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.providers.contains_key(&platform)
    }

    /// Platforms with a configured adapter.
    pub fn list(&self) -> Vec<Platform> {
        self.providers.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.providers.len()
    }
}
