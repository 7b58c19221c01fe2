//! Per-session source tables.
//!
//! Configuration and playback resources live apart: [`SourceRegistry`] holds
//! the immutable configuration for the whole session, [`RuntimeTable`] holds
//! the gain and playback handles and only exists once audio has started. Both
//! are indexed by the same [`SourceIndex`].

use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::backend::AudioBackend;
use crate::config::{AudioSourceConfig, LoadMode};
use crate::error::{Error, Result};

/// Position of a source in its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceIndex(pub(crate) usize);

impl SourceIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Immutable source configuration for one session.
///
/// Membership never changes after construction.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: Vec<AudioSourceConfig>,
    by_id: HashMap<String, SourceIndex>,
    mode: LoadMode,
    base_dir: PathBuf,
}

impl SourceRegistry {
    /// Build a registry. Source ids must be unique.
    ///
    /// `base_dir` is where relative payload paths are resolved from.
    pub fn new(sources: Vec<AudioSourceConfig>, mode: LoadMode, base_dir: PathBuf) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::NoSources);
        }

        let mut by_id = HashMap::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            if by_id.insert(source.id.clone(), SourceIndex(i)).is_some() {
                return Err(Error::DuplicateId(source.id.clone()));
            }
        }

        Ok(Self {
            sources,
            by_id,
            mode,
            base_dir,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[inline]
    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn index_of(&self, id: &str) -> Option<SourceIndex> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, index: SourceIndex) -> Option<&AudioSourceConfig> {
        self.sources.get(index.0)
    }

    pub fn by_id(&self, id: &str) -> Option<&AudioSourceConfig> {
        self.index_of(id).and_then(|i| self.get(i))
    }

    /// Sources in load order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceIndex, &AudioSourceConfig)> + '_ {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| (SourceIndex(i), s))
    }
}

/// Playback resources of one started source.
pub struct SourceRuntime<B: AudioBackend> {
    pub gain: B::Gain,
    pub playback: B::Playback,
}

/// Runtime handles for every source, parallel to the registry.
pub struct RuntimeTable<B: AudioBackend> {
    entries: Vec<SourceRuntime<B>>,
}

impl<B: AudioBackend> RuntimeTable<B> {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, runtime: SourceRuntime<B>) -> SourceIndex {
        self.entries.push(runtime);
        SourceIndex(self.entries.len() - 1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_mut(&mut self, index: SourceIndex) -> Option<&mut SourceRuntime<B>> {
        self.entries.get_mut(index.0)
    }

    /// Hand every entry back to `backend`, most recent first.
    pub(crate) fn release_all(self, backend: &mut B) {
        for runtime in self.entries.into_iter().rev() {
            backend.release(runtime.gain, Some(runtime.playback));
        }
    }
}
