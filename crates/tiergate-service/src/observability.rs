//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use tiergate_core::config::ObservabilityConfig;

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
///
/// Returns false if a subscriber was already installed; calling twice is harmless.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = ObservabilityConfig {
            log_level: "not a == valid directive".into(),
            json: true,
        };
        let _ = init_tracing(&config);
        assert!(!init_tracing(&ObservabilityConfig::default()));
    }
}
