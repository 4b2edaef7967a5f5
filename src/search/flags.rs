use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::SearchConfig;

/// Runtime search switches / 搜索运行时开关
///
/// Seeded from config at startup and shared by `Arc`. Either switch may be
/// flipped at any time; a request reads each flag once when it needs it.
#[derive(Debug)]
pub struct SearchFlags {
    full_text: AtomicBool,
    enrichment: AtomicBool,
}

impl SearchFlags {
    pub fn new(full_text: bool, enrichment: bool) -> Self {
        Self {
            full_text: AtomicBool::new(full_text),
            enrichment: AtomicBool::new(enrichment),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.full_text, config.external_enrichment)
    }

    pub fn full_text_enabled(&self) -> bool {
        self.full_text.load(Ordering::Relaxed)
    }

    pub fn enrichment_enabled(&self) -> bool {
        self.enrichment.load(Ordering::Relaxed)
    }

    pub fn set_full_text(&self, enabled: bool) {
        let previous = self.full_text.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            tracing::info!("Full-text search {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn set_enrichment(&self, enabled: bool) {
        let previous = self.enrichment.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            tracing::info!("External enrichment {}", if enabled { "enabled" } else { "disabled" });
        }
    }
}

impl Default for SearchFlags {
    fn default() -> Self {
        Self::new(false, true)
    }
}
