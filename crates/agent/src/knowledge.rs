//! Knowledge base loading.
//!
//! The reference document is optional. When it is missing, unreadable, or
//! blank the built-in fallback text is used instead. Either way the text is
//! read at most once per loader and then served from the cache.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Well-known name of the reference document.
pub const KNOWLEDGE_FILE: &str = "knowledge_base.md";

/// Built-in reference text used when no document is available.
pub const FALLBACK_KNOWLEDGE: &str = "\
# Community Risk Assessment Reference

## Core data sources
- OFIRMS (Ohio Fire Information Reporting Management System): incident history, \
fire cause and origin, response times, property loss.
- SVI (Social Vulnerability Index): census-tract vulnerability across \
socioeconomic status, household composition, minority status and language, \
housing type and transportation.
- GIS community information: land use, hydrants, station locations, road network.
- Local inspection reports and strategic plans.
- EMS incident data: call volume, call types, demand by time of day.
- Building and fire codes, pre-incident plans.
- Weather, crime, and demographic data.
- Public health and environmental indicators.

## Risk analysis basics
- Risk = probability of an event x consequence of that event.
- Prioritize hazards where high probability and high consequence meet vulnerable populations.
- Risk factors compound: older housing stock, elderly residents, and long \
response times together raise fire death risk more than any one alone.
- Always confirm data currency with the department before relying on it.
";

/// Where the knowledge text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeSource {
    File(PathBuf),
    Fallback,
    Preloaded,
}

#[derive(Debug)]
struct Loaded {
    text: String,
    source: KnowledgeSource,
}

/// Loads the reference document once and caches it for the loader's lifetime.
#[derive(Debug)]
pub struct KnowledgeLoader {
    path: PathBuf,
    cache: OnceLock<Loaded>,
}

impl KnowledgeLoader {
    /// Create a loader for the document at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceLock::new(),
        }
    }

    /// A loader that already holds `text`; it never touches the filesystem.
    pub fn preloaded(text: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            cache: OnceLock::from(Loaded {
                text: text.into(),
                source: KnowledgeSource::Preloaded,
            }),
        }
    }

    /// The knowledge text. The first call reads the document; later calls
    /// return the cached string.
    pub fn load(&self) -> &str {
        &self.loaded().text
    }

    /// Where the cached text came from.
    pub fn source(&self) -> &KnowledgeSource {
        &self.loaded().source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn loaded(&self) -> &Loaded {
        self.cache.get_or_init(|| read_or_fallback(&self.path))
    }
}

fn read_or_fallback(path: &Path) -> Loaded {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            info!(path = %path.display(), chars = text.chars().count(), "Loaded knowledge base");
            Loaded {
                text,
                source: KnowledgeSource::File(path.to_path_buf()),
            }
        }
        Ok(_) => {
            warn!(path = %path.display(), "Knowledge base is empty, using built-in reference");
            fallback()
        }
        Err(e) => {
            info!(path = %path.display(), error = %e, "No knowledge base, using built-in reference");
            fallback()
        }
    }
}

fn fallback() -> Loaded {
    Loaded {
        text: FALLBACK_KNOWLEDGE.to_string(),
        source: KnowledgeSource::Fallback,
    }
}
