use auth::data_model::{AuthenticationMethod, PluginDescriptor};

use crate::error::ConfigurationError;

/// A plugin we can send an unauthenticated caller to: not us, redirect based, not hidden.
/// Password and QR code plugins need their own UI, so they never qualify.
pub fn is_delegate_candidate(plugin: &PluginDescriptor, own_key: &str) -> bool {
    plugin.key != own_key
        && plugin.authentication_method == AuthenticationMethod::IdpUriRedirection
        && !plugin.is_hidden()
}

/// Picks the plugin that will authenticate the caller for us.
/// `target_key` pins the choice, otherwise the first candidate in registry order wins.
pub fn select_plugin<'a>(
    plugins: &'a [PluginDescriptor],
    own_key: &str,
    target_key: Option<&str>,
) -> Result<&'a PluginDescriptor, ConfigurationError> {
    // us plus at least one other
    if plugins.len() < 2 {
        return Err(ConfigurationError::TooFewPlugins(plugins.len()));
    }
    let candidates: Vec<&PluginDescriptor> = plugins
        .iter()
        .filter(|plugin| is_delegate_candidate(plugin, own_key))
        .collect();
    let Some(&first) = candidates.first() else {
        return Err(ConfigurationError::NoEligiblePlugin);
    };
    match target_key {
        Some(target_key) => candidates
            .iter()
            .find(|plugin| plugin.key == target_key)
            .copied()
            .ok_or_else(|| ConfigurationError::TargetPluginUnavailable(target_key.to_string())),
        None => Ok(first),
    }
}
