//! Engine facade: top-level API for the terms knowledge base.
//!
//! The `Engine` owns the rule network behind a single-writer lock and a
//! durable store it commits snapshots to. Every mutating call runs as a
//! transaction: with `transactional` set, a failure anywhere in the rule
//! cascade restores the network exactly as it was before the call.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::binding::{Answer, Binding};
use crate::config::EngineConfig;
use crate::error::{EngineError, LexiconError, StoreError, TermsResult};
use crate::lexicon::{TermId, TermKind, Variable};
use crate::network::{AssertOutcome, Network, RetractOutcome, RuleOutcome, RuleSpec};
use crate::predicate::Predicate;
use crate::provenance::Explanation;
use crate::store::{Durable, DurableStore, FORMAT_VERSION, MemStore, STATE_KEY, VERSION_KEY};

/// The terms inference engine.
pub struct Engine {
    config: EngineConfig,
    network: RwLock<Network>,
    store: Box<dyn Durable>,
}

impl Engine {
    /// Open an engine. A data directory holding a committed snapshot is
    /// restored; otherwise a fresh lexicon is bootstrapped.
    pub fn open(config: EngineConfig) -> TermsResult<Self> {
        config.validate()?;

        let store: Box<dyn Durable> = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|_| EngineError::DataDir {
                    path: dir.display().to_string(),
                })?;
                Box::new(DurableStore::open(dir)?)
            }
            None => Box::new(MemStore::new()),
        };

        let (network, restored) = match load_snapshot(store.as_ref())? {
            Some(network) => (network, true),
            None => {
                let mut network = Network::new();
                if let Some(now) = config.bootstrap_now {
                    network.set_time(now)?;
                }
                (network, false)
            }
        };

        let stats = network.stats();
        info!(
            persistent = store.is_persistent(),
            restored,
            terms = stats.terms,
            facts = stats.facts,
            rules = stats.rules,
            "opened terms engine"
        );

        let engine = Self {
            config,
            network: RwLock::new(network),
            store,
        };
        if !restored && engine.config.autocommit {
            engine.persist()?;
        }
        Ok(engine)
    }

    /// Memory-only engine with default settings.
    pub fn in_memory() -> TermsResult<Self> {
        Self::open(EngineConfig::memory())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn read_lock(&self) -> TermsResult<RwLockReadGuard<'_, Network>> {
        self.network
            .read()
            .map_err(|_| EngineError::LockPoisoned.into())
    }

    fn write_lock(&self) -> TermsResult<RwLockWriteGuard<'_, Network>> {
        self.network
            .write()
            .map_err(|_| EngineError::LockPoisoned.into())
    }

    /// Run `f` with shared access to the committed network.
    pub fn read<R>(&self, f: impl FnOnce(&Network) -> R) -> TermsResult<R> {
        let network = self.read_lock()?;
        Ok(f(&network))
    }

    /// Run `f` under the write lock as one transaction. Rollback and commit
    /// are whole-network operations; see [`EngineConfig`] for their cost.
    pub fn transact<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut Network) -> TermsResult<R>,
    ) -> TermsResult<R> {
        let mut network = self.write_lock()?;
        let snapshot = self.config.transactional.then(|| network.clone());
        let result = f(&mut network).and_then(|value| {
            if self.config.autocommit {
                commit_snapshot(self.store.as_ref(), &network)?;
            }
            Ok(value)
        });
        if let Err(err) = &result {
            match snapshot {
                Some(snapshot) => {
                    *network = snapshot;
                    warn!(op, error = %err, "transaction rolled back");
                }
                None => warn!(op, error = %err, "operation failed without rollback"),
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // Lexicon
    // -----------------------------------------------------------------------

    /// Define a type by name. Slots are `(label, type name)` pairs.
    pub fn define_type(
        &self,
        name: &str,
        bases: &[&str],
        slots: &[(&str, &str)],
    ) -> TermsResult<TermId> {
        self.transact("define_type", |net| {
            let lex = net.lexicon_mut();
            let bases = bases
                .iter()
                .map(|b| lex.get(b))
                .collect::<Result<Vec<_>, _>>()?;
            let slots = slots
                .iter()
                .map(|(label, ty)| Ok(((*label).to_string(), lex.get(ty)?)))
                .collect::<Result<Vec<_>, LexiconError>>()?;
            Ok(lex.define_type(name, &bases, &slots)?)
        })
    }

    pub fn define_instance(&self, name: &str, ty: &str) -> TermsResult<TermId> {
        self.transact("define_instance", |net| {
            let lex = net.lexicon_mut();
            let ty = lex.get(ty)?;
            Ok(lex.define_instance(name, ty)?)
        })
    }

    pub fn declare_equal(&self, a: &str, b: &str) -> TermsResult<()> {
        self.transact("declare_equal", |net| {
            let lex = net.lexicon_mut();
            let (a, b) = (lex.get(a)?, lex.get(b)?);
            Ok(lex.declare_equal(a, b)?)
        })
    }

    pub fn term(&self, name: &str) -> TermsResult<TermId> {
        Ok(self.read(|net| net.lexicon().get(name))??)
    }

    pub fn variable(&self, token: &str) -> TermsResult<Variable> {
        Ok(self.read(|net| net.lexicon().variable(token))??)
    }

    pub fn number(&self, value: f64) -> TermsResult<TermId> {
        self.transact("number", |net| Ok(net.lexicon_mut().number(value)?))
    }

    /// Names of every term below `ty` (types and their instances), or of
    /// every term when `ty` is `None`.
    pub fn terms_under(&self, ty: Option<&str>) -> TermsResult<Vec<String>> {
        self.read(|net| -> TermsResult<Vec<String>> {
            let lex = net.lexicon();
            let root = ty.map(|name| lex.get(name)).transpose()?;
            Ok(lex
                .iter()
                .filter(|(id, term)| match root {
                    None => true,
                    Some(root) => match term.kind {
                        TermKind::Instance => lex.is_a(*id, root),
                        _ => lex.are(*id, root),
                    },
                })
                .map(|(_, term)| term.name.clone())
                .collect())
        })?
    }

    // -----------------------------------------------------------------------
    // Facts and rules
    // -----------------------------------------------------------------------

    pub fn add_fact(&self, fact: Predicate) -> TermsResult<AssertOutcome> {
        self.transact("add_fact", |net| net.add_fact(fact))
    }

    pub fn del_fact(&self, fact: &Predicate) -> TermsResult<RetractOutcome> {
        self.transact("del_fact", |net| net.del_fact(fact))
    }

    pub fn retract_matching(&self, pattern: &Predicate) -> TermsResult<RetractOutcome> {
        self.transact("retract_matching", |net| net.retract_matching(pattern))
    }

    pub fn add_rule(&self, rule: RuleSpec) -> TermsResult<RuleOutcome> {
        self.transact("add_rule", |net| net.add_rule(rule))
    }

    pub fn query(&self, pattern: &Predicate) -> TermsResult<Vec<Binding>> {
        self.read(|net| net.query(pattern))?
    }

    pub fn ask(&self, patterns: &[Predicate]) -> TermsResult<Answer> {
        self.read(|net| net.ask(patterns))?
    }

    pub fn explain(&self, fact: &Predicate) -> TermsResult<Option<Explanation>> {
        self.read(|net| net.explain(fact))
    }

    pub fn render(&self, pred: &Predicate) -> TermsResult<String> {
        self.read(|net| net.render(pred))
    }

    pub fn render_binding(&self, binding: &Binding) -> TermsResult<String> {
        self.read(|net| binding.render(net.lexicon()))
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance the clock by one.
    pub fn tick(&self) -> TermsResult<f64> {
        let now = self.transact("tick", |net| net.tick())?;
        info!(now, "tick");
        Ok(now)
    }

    pub fn now(&self) -> TermsResult<Option<f64>> {
        self.read(|net| net.now())
    }

    // -----------------------------------------------------------------------
    // Persistence and introspection
    // -----------------------------------------------------------------------

    /// Commit the current network to the store.
    pub fn persist(&self) -> TermsResult<()> {
        let network = self.read_lock()?;
        commit_snapshot(self.store.as_ref(), &network)
    }

    pub fn info(&self) -> TermsResult<EngineInfo> {
        self.read(|net| {
            let stats = net.stats();
            EngineInfo {
                terms: stats.terms,
                facts: stats.facts,
                fact_nodes: stats.fact_nodes,
                ancestors: stats.ancestors,
                rules: stats.rules,
                premise_nodes: stats.premise_nodes,
                now: net.now(),
                persistent: self.store.is_persistent(),
                transactional: self.config.transactional,
            }
        })
    }
}

fn commit_snapshot(store: &dyn Durable, network: &Network) -> TermsResult<()> {
    let state = bincode::serialize(network).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize network: {e}"),
    })?;
    let version = FORMAT_VERSION.to_le_bytes();
    store.commit(&[(VERSION_KEY, &version[..]), (STATE_KEY, &state[..])])?;
    debug!(bytes = state.len(), "committed snapshot");
    Ok(())
}

fn load_snapshot(store: &dyn Durable) -> TermsResult<Option<Network>> {
    let Some(version) = store.get(VERSION_KEY)? else {
        return Ok(None);
    };
    let version = <[u8; 4]>::try_from(version.as_slice())
        .map(u32::from_le_bytes)
        .map_err(|_| StoreError::Serialization {
            message: "malformed snapshot version".into(),
        })?;
    if version != FORMAT_VERSION {
        return Err(StoreError::Serialization {
            message: format!("snapshot format {version}, expected {FORMAT_VERSION}"),
        }
        .into());
    }
    let Some(state) = store.get(STATE_KEY)? else {
        return Ok(None);
    };
    let network = bincode::deserialize(&state).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize network: {e}"),
    })?;
    Ok(Some(network))
}

/// Summary information about the engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInfo {
    pub terms: usize,
    pub facts: usize,
    pub fact_nodes: usize,
    pub ancestors: usize,
    pub rules: usize,
    pub premise_nodes: usize,
    pub now: Option<f64>,
    pub persistent: bool,
    pub transactional: bool,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "terms engine info")?;
        writeln!(f, "  terms:         {}", self.terms)?;
        writeln!(f, "  facts:         {}", self.facts)?;
        writeln!(f, "  fact nodes:    {}", self.fact_nodes)?;
        writeln!(f, "  ancestors:     {}", self.ancestors)?;
        writeln!(f, "  rules:         {}", self.rules)?;
        writeln!(f, "  premise nodes: {}", self.premise_nodes)?;
        match self.now {
            Some(now) => writeln!(f, "  now:           {now}")?,
            None => writeln!(f, "  now:           -")?,
        }
        writeln!(f, "  persistent:    {}", self.persistent)?;
        writeln!(f, "  transactional: {}", self.transactional)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}
