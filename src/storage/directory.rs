//! A filesystem backed program catalogue.
//!
//! The [`Directory`] ties a catalogue file to the configuration stored next to
//! it. It is a wrapper around the filesystem agnostic [`Catalogue`].

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::{
    domain::{Config, LearningUnit, postponement::PostponementResult},
    storage::{Catalogue, CatalogueError},
};

/// Name of the catalogue file, relative to the root.
pub const CATALOGUE_FILE: &str = "catalogue.yaml";

/// Name of the configuration directory, relative to the root.
pub const CONFIG_DIR: &str = ".ptree";

/// The state of a directory whose catalogue has been read.
#[derive(Debug, Clone)]
pub struct Loaded {
    catalogue: Catalogue,
    config: Config,
}

/// The state of a directory that has not been read yet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unloaded;

/// A filesystem backed program catalogue.
#[derive(Debug)]
pub struct Directory<S> {
    /// The root of the directory the catalogue is stored in.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The root of the directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn catalogue_path(&self) -> PathBuf {
        self.root.join(CATALOGUE_FILE)
    }
}

/// Errors that can occur when initialising a directory.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The directory already holds a catalogue.
    #[error("a catalogue already exists at {}", .0.display())]
    AlreadyInitialised(PathBuf),
    /// The configuration directory could not be created.
    #[error("failed to create {}: {source}", .path.display())]
    Io {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The configuration could not be written.
    #[error("{0}")]
    Config(String),
    /// The empty catalogue could not be written.
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

impl Directory<Unloaded> {
    /// Opens a directory at the given path.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: Unloaded,
        }
    }

    /// Creates the configuration and an empty catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalogue already exists, or if either file
    /// cannot be written.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub fn init(&self, config: &Config) -> Result<(), InitError> {
        let catalogue_path = self.catalogue_path();
        if catalogue_path.exists() {
            return Err(InitError::AlreadyInitialised(catalogue_path));
        }

        let config_dir = self.root.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).map_err(|source| InitError::Io {
            path: config_dir.clone(),
            source,
        })?;
        config
            .save(&config_dir.join("config.toml"))
            .map_err(InitError::Config)?;

        Catalogue::default().save(&catalogue_path)?;
        tracing::info!("Initialised catalogue in {}", self.root.display());
        Ok(())
    }

    /// Loads the catalogue and the configuration from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be read or parsed. A missing
    /// or invalid configuration falls back to the defaults.
    pub fn load(self) -> Result<Directory<Loaded>, CatalogueError> {
        let config = load_config(&self.root);
        let catalogue = Catalogue::load(&self.catalogue_path())?;

        Ok(Directory {
            root: self.root,
            state: Loaded { catalogue, config },
        })
    }
}

fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_DIR).join("config.toml");
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

impl Directory<Loaded> {
    /// The loaded catalogue.
    #[must_use]
    pub const fn catalogue(&self) -> &Catalogue {
        &self.state.catalogue
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }

    /// Mutable access to the configuration, e.g. to apply command-line
    /// overrides. Changes are not written back.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.state.config
    }

    /// Runs the yearly postponement of learning units with the configured
    /// policy.
    ///
    /// Nothing is written to disk until [`Directory::flush`] is called.
    pub fn postpone<'a>(
        &'a mut self,
        notify_before: impl FnMut(&[LearningUnit]) + 'a,
        notify_after: impl FnMut(&[LearningUnit], &PostponementResult) + 'a,
    ) -> PostponementResult {
        let policy = self.state.config.policy();
        self.state
            .catalogue
            .postpone(policy, notify_before, notify_after)
    }

    /// Writes the catalogue back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue file cannot be written.
    pub fn flush(&self) -> Result<(), CatalogueError> {
        self.state.catalogue.save(&self.catalogue_path())
    }
}
