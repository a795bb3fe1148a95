// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin loader: owns every unit, decides what to (re)load on each
//! scan and serializes all administrative operations behind one lock.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use plughost_config::PlughostConfig;
use plughost_core::{PluginDescription, PluginError, PluginState};
use plughost_graph::DependencyGraph;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::environment::PluginEnvironment;
use crate::provider::{LoadContext, ProviderSet};
use crate::recording;
use crate::scanner::{self, ScanOutcome};
use crate::snapshot::ArtifactSnapshot;
use crate::unit::{CleanupHandle, Plugin, PluginInfo};

/// Prefix of the temp copies units are loaded from.
pub const TEMP_PREFIX: &str = "plugin_";
/// Prefix of install staging files in the plugins directory.
pub const STAGING_PREFIX: &str = ".next_";
/// Prefix of the replaced artifact kept while an install is in flight.
pub const LAST_PREFIX: &str = ".last_";

/// Loader settings taken from [`PlughostConfig`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub plugins_dir: PathBuf,
    pub data_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub canonical_web_url: Option<String>,
    pub allow_remote_admin: bool,
    pub mandatory: BTreeSet<String>,
}

impl LoaderConfig {
    pub fn from_config(config: &PlughostConfig) -> Self {
        Self {
            plugins_dir: config.plugins.directory.clone(),
            data_dir: config.plugins.data_directory.clone(),
            tmp_dir: config.plugins.temp_directory.clone(),
            canonical_web_url: config.host.canonical_web_url.clone(),
            allow_remote_admin: config.plugins.allow_remote_admin,
            mandatory: config.plugins.mandatory.iter().cloned().collect(),
        }
    }
}

/// What one run of the load path did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No previous unit existed.
    Loaded,
    /// The previous unit was swapped in place.
    Reloaded,
    /// The previous unit was unloaded before the new one started.
    Restarted,
    /// A mandatory plugin would have needed a restart; the running unit was kept.
    Refused,
}

impl LoadOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadOutcome::Loaded => "loaded",
            LoadOutcome::Reloaded => "reloaded",
            LoadOutcome::Restarted => "restarted",
            LoadOutcome::Refused => "refused",
        }
    }
}

/// An artifact whose last load failed. It is not retried until its bytes
/// change.
#[derive(Debug, Clone)]
pub struct BrokenArtifact {
    pub path: PathBuf,
    pub snapshot: Option<ArtifactSnapshot>,
    pub error: String,
}

impl BrokenArtifact {
    fn unchanged_at(&self, path: &Path) -> bool {
        self.path.as_path() == path && self.snapshot.as_ref().is_some_and(|s| !s.is_modified(path))
    }
}

#[derive(Default)]
struct LoaderState {
    running: BTreeMap<String, Plugin>,
    disabled: BTreeMap<String, Plugin>,
    broken: BTreeMap<String, BrokenArtifact>,
    /// Duplicates already reported as impossible to disable.
    stuck: BTreeSet<PathBuf>,
}

struct PendingCleanup {
    plugin: String,
    handle: CleanupHandle,
}

/// Loads, reloads and unloads plugin units from the plugins directory.
pub struct PluginLoader {
    config: LoaderConfig,
    env: Arc<PluginEnvironment>,
    providers: ProviderSet,
    state: Mutex<LoaderState>,
    cleanup: Mutex<VecDeque<PendingCleanup>>,
    cleanup_hint: Notify,
}

impl PluginLoader {
    pub fn new(config: LoaderConfig, env: Arc<PluginEnvironment>) -> Self {
        Self {
            config,
            env,
            providers: ProviderSet::default(),
            state: Mutex::new(LoaderState::default()),
            cleanup: Mutex::new(VecDeque::new()),
            cleanup_hint: Notify::new(),
        }
    }

    pub fn with_providers(mut self, providers: ProviderSet) -> Self {
        self.providers = providers;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn environment(&self) -> &Arc<PluginEnvironment> {
        &self.env
    }

    pub fn remote_admin_enabled(&self) -> bool {
        self.config.allow_remote_admin
    }

    /// Removes stale temp copies, creates the plugins directory and loads
    /// everything found in it.
    ///
    /// A [`PluginError::MissingMandatoryPlugin`] from the initial scan is
    /// returned and should abort startup.
    pub fn start(&self) -> Result<(), PluginError> {
        info!(directory = %self.config.plugins_dir.display(), "loading plugins");
        self.remove_stale_temp_copies();
        for dir in [&self.config.plugins_dir, &self.config.tmp_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| PluginError::io(format!("cannot create {}", dir.display()), e))?;
        }
        self.rescan()
    }

    /// Unloads every unit and drains the cleanup queue.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        let running = std::mem::take(&mut st.running);
        for (_, plugin) in running.into_iter().rev() {
            self.retire(plugin, true);
        }
        st.disabled.clear();
        st.broken.clear();
        st.stuck.clear();
        recording::set_running(0);
        drop(st);

        let left = self.process_pending_cleanups();
        if left > 0 {
            warn!(left, "plugin temp copies could not be removed");
        }
        info!("plugin loader stopped");
    }

    /// Brings the loaded set in line with the plugins directory.
    pub fn rescan(&self) -> Result<(), PluginError> {
        recording::record_rescan();
        let mut st = self.state.lock();
        let scanned = scanner::scan_and_prune(&self.config.plugins_dir, &self.providers)?;
        let stuck: BTreeSet<PathBuf> = scanned.stuck.iter().cloned().collect();
        for path in stuck.difference(&st.stuck) {
            warn!(
                path = %path.display(),
                "duplicate plugin cannot be disabled; {} already exists",
                scanner::disabled_path(path).display()
            );
        }
        st.stuck = stuck;

        let gone: Vec<String> = st
            .running
            .keys()
            .filter(|name| scanned.active_path(name).is_none())
            .cloned()
            .collect();
        for name in gone {
            if let Some(plugin) = st.running.remove(&name) {
                info!(plugin = %name, "plugin artifact removed");
                self.retire(plugin, true);
            }
        }

        st.broken.retain(|name, broken| {
            let present = broken.path.exists();
            if !present {
                debug!(plugin = %name, "forgetting broken plugin whose artifact is gone");
            }
            present
        });

        self.sync_disabled(&mut st, &scanned.disabled);

        for name in self.load_order(&mut st, &scanned) {
            let Some(path) = scanned.active_path(&name) else {
                continue;
            };
            if st.broken.get(&name).is_some_and(|b| b.unchanged_at(path)) {
                continue;
            }
            if let Some(plugin) = st.running.get(&name)
                && plugin.src_path() == path
                && !plugin.snapshot().is_modified(path)
            {
                continue;
            }
            // Failures are recorded as broken and logged by the load path.
            let _ = self.run_plugin(&mut st, &name, path);
        }
        recording::set_running(st.running.len());

        let missing: Vec<String> = self
            .config
            .mandatory
            .iter()
            .filter(|name| !st.running.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            error!(missing = ?missing, "mandatory plugins are not running");
            return Err(PluginError::MissingMandatoryPlugin { names: missing });
        }
        Ok(())
    }

    /// Installs `bytes` as plugin file `file_name` and loads it.
    ///
    /// The name the artifact declares wins over `file_name`. If the new
    /// version fails to load, the previous artifact is restored and, if it
    /// had already been unloaded, started again.
    pub fn install(&self, file_name: &str, bytes: &[u8]) -> Result<PluginInfo, PluginError> {
        if !self.config.allow_remote_admin {
            return Err(PluginError::RemoteAdminDisabled);
        }
        if file_name.is_empty() || file_name.starts_with('.') || file_name.contains(['/', '\\']) {
            return Err(PluginError::Config(format!(
                "`{file_name}` is not a valid plugin file name"
            )));
        }
        let file_name = if Path::new(file_name).extension().is_none() {
            format!("{file_name}.plugin")
        } else {
            file_name.to_string()
        };
        let requested = Path::new(&file_name);
        let provider = self.providers.for_path(requested).ok_or_else(|| {
            PluginError::Config(format!("no plugin format handles `{file_name}`"))
        })?;
        let extension = provider.extension();

        let mut st = self.state.lock();
        let dir = &self.config.plugins_dir;
        std::fs::create_dir_all(dir)
            .map_err(|e| PluginError::io(format!("cannot create {}", dir.display()), e))?;

        let mut staged = tempfile::Builder::new()
            .prefix(&format!("{STAGING_PREFIX}{file_name}_"))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| PluginError::io("cannot stage plugin", e))?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.flush())
            .map_err(|e| PluginError::io("cannot stage plugin", e))?;

        let stem = requested
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match provider.declared_name(staged.path()) {
            Some(declared) if declared != stem => {
                warn!(requested = %stem, declared = %declared, "using the plugin name declared by the artifact");
                declared
            }
            Some(declared) => declared,
            None => stem,
        };
        let file_name = format!("{name}.{extension}");
        let dst = dir.join(&file_name);

        let active = st
            .running
            .get(&name)
            .map(|p| p.src_path().to_path_buf())
            .or_else(|| dst.exists().then(|| dst.clone()));
        let was_running = st.running.contains_key(&name);
        let backup = match active {
            Some(src) => {
                let last = dir.join(format!(
                    "{LAST_PREFIX}{}",
                    src.file_name().map(|f| f.to_string_lossy()).unwrap_or_default()
                ));
                std::fs::rename(&src, &last).map_err(|e| {
                    PluginError::io(format!("cannot move {} aside", src.display()), e)
                })?;
                Some((src, last))
            }
            None => None,
        };

        let disabled = scanner::disabled_path(&dst);
        if disabled.exists()
            && let Err(e) = std::fs::remove_file(&disabled)
        {
            warn!(path = %disabled.display(), error = %e, "cannot remove disabled copy");
        }
        st.disabled.remove(&name);

        let persisted = staged
            .persist(&dst)
            .map_err(|e| PluginError::io(format!("cannot install {}", dst.display()), e.error));
        let result = persisted.and_then(|_| self.run_plugin(&mut st, &name, &dst));

        let failure = match result {
            Ok(LoadOutcome::Refused) => PluginError::InstallFailure {
                name: name.clone(),
                source: Box::new(PluginError::Lifecycle {
                    plugin: name.clone(),
                    message: "mandatory plugin cannot be restarted".to_string(),
                }),
            },
            Err(err) => err,
            Ok(outcome) => {
                if let Some((_, last)) = backup
                    && let Err(e) = std::fs::remove_file(&last)
                {
                    warn!(path = %last.display(), error = %e, "cannot remove replaced plugin");
                }
                info!(plugin = %name, outcome = outcome.as_str(), "installed plugin");
                return st
                    .running
                    .get(&name)
                    .map(Plugin::info)
                    .ok_or_else(|| PluginError::Internal(format!("{name} not running after install")));
            }
        };

        if let Err(e) = std::fs::remove_file(&dst)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %dst.display(), error = %e, "cannot remove failed plugin version");
        }
        if let Some((src, last)) = &backup {
            if let Err(e) = std::fs::rename(last, src) {
                error!(path = %src.display(), error = %e, "cannot restore previous plugin version");
            } else if was_running && !st.running.contains_key(&name) {
                info!(plugin = %name, "restarting previous plugin version");
                let _ = self.run_plugin(&mut st, &name, src);
            }
        }
        if st.running.contains_key(&name) {
            st.broken.remove(&name);
        }
        Err(failure)
    }

    /// Re-activates disabled plugins. A no-op when remote administration is
    /// off.
    pub fn enable(&self, names: &[String]) -> Result<(), PluginError> {
        if !self.config.allow_remote_admin {
            warn!(names = ?names, "remote plugin administration is disabled; not enabling");
            return Ok(());
        }
        let mut st = self.state.lock();
        let mut first_error = None;
        for name in names {
            let Some(record) = st.disabled.remove(name) else {
                if !st.running.contains_key(name) {
                    warn!(plugin = %name, "no disabled plugin with this name");
                }
                continue;
            };
            let off = record.src_path().to_path_buf();
            let on = scanner::active_path(&off);
            if let Err(e) = std::fs::rename(&off, &on) {
                warn!(plugin = %name, error = %e, "cannot enable plugin");
                st.disabled.insert(name.clone(), record);
                first_error.get_or_insert(PluginError::io(format!("cannot enable {name}"), e));
                continue;
            }
            info!(plugin = %name, "enabling plugin");
            if let Err(err) = self.run_plugin(&mut st, name, &on) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Moves running plugins aside and keeps them as disabled records.
    /// Mandatory plugins are never disabled. A no-op when remote
    /// administration is off.
    pub fn disable(&self, names: &[String]) -> Result<(), PluginError> {
        if !self.config.allow_remote_admin {
            warn!(names = ?names, "remote plugin administration is disabled; not disabling");
            return Ok(());
        }
        let mut st = self.state.lock();
        let mut first_error = None;
        for name in names {
            if self.config.mandatory.contains(name) {
                warn!(plugin = %name, "mandatory plugin cannot be disabled");
                continue;
            }
            let Some(src) = st.running.get(name).map(|p| p.src_path().to_path_buf()) else {
                warn!(plugin = %name, "plugin is not running; nothing to disable");
                continue;
            };
            let off = scanner::disabled_path(&src);
            if let Err(e) = std::fs::rename(&src, &off) {
                warn!(plugin = %name, error = %e, "cannot disable plugin");
                first_error.get_or_insert(PluginError::io(format!("cannot disable {name}"), e));
                continue;
            }
            info!(plugin = %name, "disabling plugin");
            if let Some(plugin) = st.running.remove(name) {
                self.retire(plugin, true);
            }
            match self.load_disabled(&st, name, &off) {
                Ok(record) => {
                    st.disabled.insert(name.clone(), record);
                }
                Err(err) => warn!(plugin = %name, error = %err, "cannot read disabled plugin"),
            }
        }
        recording::set_running(st.running.len());
        first_error.map_or(Ok(()), Err)
    }

    /// Reloads running plugins from their current artifacts; every plugin
    /// when `names` is empty.
    ///
    /// Fails with [`PluginError::NotRunning`] naming every requested plugin
    /// that is not running, before anything is reloaded.
    pub fn reload(&self, names: &[String]) -> Result<(), PluginError> {
        let mut st = self.state.lock();
        let names: Vec<String> = if names.is_empty() {
            st.running.keys().cloned().collect()
        } else {
            names.to_vec()
        };
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !st.running.contains_key(*n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PluginError::NotRunning { names: missing });
        }

        let mut first_error = None;
        for name in &names {
            let Some(path) = st.running.get(name).map(|p| p.src_path().to_path_buf()) else {
                continue;
            };
            info!(plugin = %name, "reloading plugin");
            if let Err(err) = self.run_plugin(&mut st, name, &path) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Status of a running or disabled plugin.
    pub fn get(&self, name: &str) -> Option<PluginInfo> {
        let st = self.state.lock();
        st.running
            .get(name)
            .or_else(|| st.disabled.get(name))
            .map(Plugin::info)
    }

    /// Running plugins, plus disabled ones when `include_disabled`, by name.
    pub fn list(&self, include_disabled: bool) -> Vec<PluginInfo> {
        let st = self.state.lock();
        let mut out: Vec<PluginInfo> = st.running.values().map(Plugin::info).collect();
        if include_disabled {
            out.extend(st.disabled.values().map(Plugin::info));
            out.sort_by(|a, b| a.name.cmp(&b.name));
        }
        out
    }

    pub fn broken(&self) -> BTreeMap<String, BrokenArtifact> {
        self.state.lock().broken.clone()
    }

    /// Runs `f` against a running unit.
    pub fn with_running<R>(&self, name: &str, f: impl FnOnce(&Plugin) -> R) -> Option<R> {
        self.state.lock().running.get(name).map(f)
    }

    /// Tries to delete every queued temp copy. Returns how many remain.
    pub fn process_pending_cleanups(&self) -> usize {
        let mut queue = self.cleanup.lock();
        queue.retain_mut(|pending| match pending.handle.remove() {
            Ok(()) => {
                debug!(plugin = %pending.plugin, path = %pending.handle.path().display(), "removed plugin temp copy");
                false
            }
            Err(e) => {
                debug!(plugin = %pending.plugin, error = %e, "plugin temp copy still in use");
                true
            }
        });
        recording::set_cleanups_pending(queue.len());
        queue.len()
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanup.lock().len()
    }

    /// Signalled after each unload that queued a cleanup.
    pub fn cleanup_hint(&self) -> &Notify {
        &self.cleanup_hint
    }

    /// The shared load path.
    fn run_plugin(
        &self,
        st: &mut LoaderState,
        name: &str,
        path: &Path,
    ) -> Result<LoadOutcome, PluginError> {
        let snapshot = match ArtifactSnapshot::save(path) {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.mark_broken(st, name, path, None, err)),
        };

        let mut old = st.running.remove(name);
        let result = self.try_run(st, name, path, snapshot.clone(), &mut old);
        if let Some(old) = old {
            st.running.insert(name.to_string(), old);
        }
        recording::set_running(st.running.len());
        match result {
            Ok(outcome) => {
                if outcome != LoadOutcome::Refused {
                    recording::record_load(outcome.as_str());
                }
                Ok(outcome)
            }
            Err(err) => {
                recording::record_load("failed");
                Err(self.mark_broken(st, name, path, Some(snapshot), err))
            }
        }
    }

    /// Loads and starts the new unit. On return `old` holds the previous
    /// unit only if it must stay running.
    fn try_run(
        &self,
        st: &mut LoaderState,
        name: &str,
        path: &Path,
        snapshot: ArtifactSnapshot,
        old: &mut Option<Plugin>,
    ) -> Result<LoadOutcome, PluginError> {
        let provider = self
            .providers
            .for_path(path)
            .ok_or_else(|| PluginError::invalid(path, "no plugin format handles this file"))?;
        let mut new = provider.load(LoadContext {
            name,
            src_path: path,
            disabled: false,
            snapshot,
            description: self.description(name),
            tmp_dir: &self.config.tmp_dir,
            library: self.env.library(),
            running: &st.running,
        })?;

        let reload = old
            .as_ref()
            .is_some_and(|o| o.can_reload() && new.can_reload());
        let restart = old.is_some() && !reload;
        if restart {
            if self.config.mandatory.contains(name) {
                warn!(plugin = name, "mandatory plugin needs a restart to update; keeping the running version");
                self.discard(new);
                return Ok(LoadOutcome::Refused);
            }
            if let Some(previous) = old.take() {
                self.retire(previous, true);
            }
        }

        if let Some(previous) = old.as_mut() {
            previous.set_state(PluginState::Reloading);
        }
        if let Err(err) = new.start(&self.env) {
            if let Some(previous) = old.as_mut() {
                previous.set_state(PluginState::Running);
            }
            self.discard(new);
            return Err(err);
        }

        let outcome = match old.take() {
            Some(mut previous) => match self.env.on_reload_plugin(&mut previous, &mut new) {
                Ok(stats) => {
                    debug!(
                        plugin = name,
                        swapped = stats.swapped,
                        attached = stats.attached,
                        detached = stats.detached,
                        "moved extensions to new version"
                    );
                    self.retire(previous, false);
                    LoadOutcome::Reloaded
                }
                Err(err) => {
                    previous.set_state(PluginState::Running);
                    *old = Some(previous);
                    self.discard(new);
                    return Err(err);
                }
            },
            None => {
                if let Err(err) = self.env.on_start_plugin(&mut new) {
                    self.discard(new);
                    return Err(err);
                }
                if restart {
                    LoadOutcome::Restarted
                } else {
                    LoadOutcome::Loaded
                }
            }
        };

        info!(
            plugin = name,
            version = new.version().unwrap_or("unknown"),
            outcome = outcome.as_str(),
            "plugin running"
        );
        st.broken.remove(name);
        st.disabled.remove(name);
        st.running.insert(name.to_string(), new);
        Ok(outcome)
    }

    fn mark_broken(
        &self,
        st: &mut LoaderState,
        name: &str,
        path: &Path,
        snapshot: Option<ArtifactSnapshot>,
        err: PluginError,
    ) -> PluginError {
        let err = err.into_install_failure(name);
        warn!(plugin = name, path = %path.display(), error = %err, "cannot load plugin");
        st.broken.insert(
            name.to_string(),
            BrokenArtifact {
                path: path.to_path_buf(),
                snapshot,
                error: err.to_string(),
            },
        );
        err
    }

    fn description(&self, name: &str) -> PluginDescription {
        PluginDescription::new(
            name,
            self.config.canonical_web_url.as_deref(),
            &self.config.data_dir,
        )
    }

    fn load_disabled(&self, st: &LoaderState, name: &str, path: &Path) -> Result<Plugin, PluginError> {
        let provider = self
            .providers
            .for_path(path)
            .ok_or_else(|| PluginError::invalid(path, "no plugin format handles this file"))?;
        provider.load(LoadContext {
            name,
            src_path: path,
            disabled: true,
            snapshot: ArtifactSnapshot::save(path)?,
            description: self.description(name),
            tmp_dir: &self.config.tmp_dir,
            library: self.env.library(),
            running: &st.running,
        })
    }

    fn sync_disabled(&self, st: &mut LoaderState, found: &BTreeMap<String, PathBuf>) {
        st.disabled.retain(|name, record| {
            found
                .get(name)
                .is_some_and(|p| p.as_path() == record.src_path() && !record.snapshot().is_modified(p))
        });
        for (name, path) in found {
            if st.disabled.contains_key(name) || st.running.contains_key(name) {
                continue;
            }
            match self.load_disabled(st, name, path) {
                Ok(record) => {
                    st.disabled.insert(name.clone(), record);
                }
                Err(err) => debug!(plugin = %name, error = %err, "cannot read disabled plugin"),
            }
        }
    }

    /// Active names in dependency order. Names caught in a cycle, or
    /// depending on one, are recorded as broken and left out.
    fn load_order(&self, st: &mut LoaderState, scanned: &ScanOutcome) -> Vec<String> {
        let mut excluded: HashSet<String> = HashSet::new();
        loop {
            let mut graph = DependencyGraph::new();
            for (name, _) in &scanned.active {
                if !excluded.contains(name) {
                    graph.add_node(name.clone());
                }
            }
            for (name, path) in &scanned.active {
                if excluded.contains(name) {
                    continue;
                }
                let Some(provider) = self.providers.for_path(path) else {
                    continue;
                };
                for dep in provider.dependencies(path) {
                    if graph.contains(&dep) && dep != *name {
                        let _ = graph.add_dependency(name.clone(), dep);
                    }
                }
            }

            match graph.compute_load_order() {
                Ok(order) => return order,
                Err(cycle) => {
                    let remaining = cycle
                        .remaining
                        .iter()
                        .map(|(node, deps)| format!("{node} -> {}", deps.join(", ")))
                        .collect::<Vec<_>>()
                        .join("; ");
                    for node in cycle.nodes() {
                        let Some(path) = scanned.active_path(node) else {
                            continue;
                        };
                        if st.broken.get(node).is_some_and(|b| b.unchanged_at(path)) {
                            excluded.insert(node.clone());
                            continue;
                        }
                        let err = PluginError::CyclicDependency {
                            remaining: remaining.clone(),
                        };
                        let snapshot = ArtifactSnapshot::save(path).ok();
                        self.mark_broken(st, node, path, snapshot, err);
                        excluded.insert(node.clone());
                    }
                }
            }
        }
    }

    fn remove_stale_temp_copies(&self) {
        let Ok(entries) = std::fs::read_dir(&self.config.tmp_dir) else {
            return;
        };
        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => debug!(path = %entry.path().display(), "removed stale plugin temp copy"),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot remove stale plugin temp copy"),
            }
        }
    }

    /// Stops a committed unit and queues its cleanup. `sweep` also removes
    /// anything else registered under its name.
    fn retire(&self, mut plugin: Plugin, sweep: bool) {
        info!(plugin = plugin.name(), "unloading plugin");
        plugin.stop(&self.env);
        if sweep {
            self.env.registry().detach_all(plugin.name());
        }
        recording::record_unload();
        self.enqueue_cleanup(plugin);
    }

    /// Stops a unit that never became the active one.
    fn discard(&self, mut plugin: Plugin) {
        plugin.stop(&self.env);
        self.enqueue_cleanup(plugin);
    }

    fn enqueue_cleanup(&self, mut plugin: Plugin) {
        let Some(mut handle) = plugin.take_cleanup() else {
            return;
        };
        handle.close();
        let mut queue = self.cleanup.lock();
        queue.push_back(PendingCleanup {
            plugin: plugin.name().to_string(),
            handle,
        });
        recording::set_cleanups_pending(queue.len());
        drop(queue);
        self.cleanup_hint.notify_one();
    }
}
