// src/registry.rs

//! Name → constructor registries.
//!
//! A [`Registry`] maps type names to constructors and remembers which
//! modules have already registered themselves, so that a registration entry
//! point can be called any number of times but only takes effect once.
//!
//! Two process-wide instances exist: [`schedule_registry`] and
//! [`process_registry`].

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{Pipeline, Process};
use crate::schedule::Schedule;

/// Builds a schedule for a pipeline.
pub type ScheduleCtor = dyn Fn(&Config, Arc<Pipeline>) -> Result<Box<dyn Schedule>> + Send + Sync;

/// Builds a process given its name and config.
pub type ProcessCtor = dyn Fn(&str, &Config) -> Result<Arc<dyn Process>> + Send + Sync;

pub type ScheduleRegistry = Registry<ScheduleCtor>;
pub type ProcessRegistry = Registry<ProcessCtor>;

static SCHEDULES: Lazy<ScheduleRegistry> = Lazy::new(|| Registry::new("schedule"));
static PROCESSES: Lazy<ProcessRegistry> = Lazy::new(|| Registry::new("process"));

pub fn schedule_registry() -> &'static ScheduleRegistry {
    &SCHEDULES
}

pub fn process_registry() -> &'static ProcessRegistry {
    &PROCESSES
}

struct Entry<C: ?Sized> {
    description: String,
    ctor: Arc<C>,
}

pub struct Registry<C: ?Sized> {
    kind: &'static str,
    entries: Mutex<BTreeMap<String, Entry<C>>>,
    /// Held for the whole of a module load, which makes check-and-mark atomic.
    loaded: Mutex<HashSet<String>>,
}

impl<C: ?Sized> Registry<C> {
    /// `kind` names what is registered ("schedule", "process") in errors
    /// and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(BTreeMap::new()),
            loaded: Mutex::new(HashSet::new()),
        }
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        ctor: Arc<C>,
    ) -> Result<()> {
        let name = name.into();
        let mut entries = lock(&self.entries);

        if entries.contains_key(&name) {
            return Err(SchedError::AlreadyRegistered {
                kind: self.kind,
                name,
            });
        }

        debug!(kind = self.kind, name = %name, "registering type");
        entries.insert(
            name,
            Entry {
                description: description.into(),
                ctor,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<C>> {
        lock(&self.entries)
            .get(name)
            .map(|entry| Arc::clone(&entry.ctor))
            .ok_or_else(|| self.not_registered(name))
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn description(&self, name: &str) -> Result<String> {
        lock(&self.entries)
            .get(name)
            .map(|entry| entry.description.clone())
            .ok_or_else(|| self.not_registered(name))
    }

    pub fn is_module_loaded(&self, module: &str) -> bool {
        lock(&self.loaded).contains(module)
    }

    /// Returns `true` if the module was not marked before.
    pub fn mark_module_as_loaded(&self, module: &str) -> bool {
        lock(&self.loaded).insert(module.to_string())
    }

    /// Run `register` unless `module` has been loaded already.
    ///
    /// Returns `Ok(true)` if this call loaded the module. Concurrent callers
    /// for the same module wait for the first one to finish. If `register`
    /// fails the module stays unmarked.
    pub fn load_module<F>(&self, module: &str, register: F) -> Result<bool>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let mut loaded = lock(&self.loaded);
        if loaded.contains(module) {
            return Ok(false);
        }

        register(self)?;
        loaded.insert(module.to_string());
        info!(kind = self.kind, module, "module loaded");
        Ok(true)
    }

    fn not_registered(&self, name: &str) -> SchedError {
        SchedError::NotRegistered {
            kind: self.kind,
            name: name.to_string(),
        }
    }
}

impl Registry<ScheduleCtor> {
    pub fn create_schedule(
        &self,
        name: &str,
        config: &Config,
        pipeline: Arc<Pipeline>,
    ) -> Result<Box<dyn Schedule>> {
        let ctor = self.get(name)?;
        ctor(config, pipeline)
    }
}

impl Registry<ProcessCtor> {
    pub fn create_process(
        &self,
        type_name: &str,
        name: &str,
        config: &Config,
    ) -> Result<Arc<dyn Process>> {
        let ctor = self.get(type_name)?;
        ctor(name, config)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Maker = dyn Fn() -> u32 + Send + Sync;

    fn maker(v: u32) -> Arc<Maker> {
        Arc::new(move || v)
    }

    #[test]
    fn register_and_lookup() {
        let reg: Registry<Maker> = Registry::new("thing");
        reg.register("b", "second", maker(2)).unwrap();
        reg.register("a", "first", maker(1)).unwrap();

        assert_eq!(reg.types(), vec!["a", "b"]);
        assert_eq!(reg.description("b").unwrap(), "second");
        assert_eq!((reg.get("a").unwrap())(), 1);
    }

    #[test]
    fn duplicate_and_missing_names() {
        let reg: Registry<Maker> = Registry::new("thing");
        reg.register("a", "first", maker(1)).unwrap();

        assert!(matches!(
            reg.register("a", "again", maker(9)),
            Err(SchedError::AlreadyRegistered { kind: "thing", .. })
        ));
        assert!(matches!(
            reg.get("zzz"),
            Err(SchedError::NotRegistered { kind: "thing", .. })
        ));
    }

    #[test]
    fn load_module_runs_once() {
        let reg: Registry<Maker> = Registry::new("thing");
        let mut calls = 0;

        for _ in 0..3 {
            reg.load_module("mod:a", |r| {
                calls += 1;
                r.register("a", "first", maker(1))
            })
            .unwrap();
        }

        assert_eq!(calls, 1);
        assert!(reg.is_module_loaded("mod:a"));
        assert_eq!(reg.types(), vec!["a"]);
    }

    #[test]
    fn failed_load_leaves_module_unmarked() {
        let reg: Registry<Maker> = Registry::new("thing");
        let res = reg.load_module("mod:bad", |_| {
            Err(SchedError::ConfigError("nope".to_string()))
        });

        assert!(res.is_err());
        assert!(!reg.is_module_loaded("mod:bad"));
    }

    #[test]
    fn mark_module_reports_first_marking() {
        let reg: Registry<Maker> = Registry::new("thing");
        assert!(reg.mark_module_as_loaded("m"));
        assert!(!reg.mark_module_as_loaded("m"));
    }
}
