//! Control side of the engine.
//!
//! A [`Rig`] owns what survives a device restart: the configuration, the
//! control mapper with its accumulated positions, and the [`HostStatus`]
//! shared with the audio thread. Each (re)start builds a fresh
//! [`Dispatcher`] whose modules start from the values the controls are
//! currently at.

use std::sync::Arc;

use anyhow::Context;
use fxrig_config::EngineConfig;
use fxrig_core::{EventQueue, EventSender, Processable};
use fxrig_io::{Dispatcher, HostStatus};
use fxrig_platform::{ControlError, ControlMapper, ControlSource};

use crate::modules::{self, Catalog};

/// Configuration, mapper and status of one engine.
pub struct Rig {
    config: EngineConfig,
    mapper: ControlMapper,
    status: Arc<HostStatus>,
    events: Option<EventSender>,
}

impl Rig {
    /// Validates `config` against the known modules and binds its mappings.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate_with(&Catalog)?;

        let chain = build_chain(&config)?;
        let mut mapper = ControlMapper::new();
        for (i, mapping) in config.mappings.iter().enumerate() {
            let params = chain[mapping.module].param_set();
            let key = mapping.target().key;
            mapper
                .bind_link(mapping.target(), params.desc(key).domain, &mapping.link)
                .with_context(|| format!("mapping {i}"))?;
        }
        let targets: Vec<_> = mapper.targets().collect();
        for target in targets {
            let nrm = chain[target.slot].param_set().get_val_end_nrm(target.key);
            mapper.set_base(target, nrm)?;
        }

        Ok(Self {
            config,
            mapper,
            status: Arc::new(HostStatus::new()),
            events: None,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bound controls.
    pub fn mapper(&self) -> &ControlMapper {
        &self.mapper
    }

    /// Status shared with the audio thread.
    pub fn status(&self) -> &Arc<HostStatus> {
        &self.status
    }

    /// Builds the host for a new transport session. Controls posted from
    /// now on go to this dispatcher.
    pub fn build_dispatcher(&mut self) -> anyhow::Result<Box<Dispatcher>> {
        let capacity = self.config.engine.event_queue_capacity;
        let (tx, rx) = EventQueue::bounded(capacity);
        let nbr_chn = self.config.transport.output_channels.max(1);
        let mut dispatcher =
            Dispatcher::new(nbr_chn, rx, Arc::clone(&self.status)).with_event_capacity(capacity);

        for (slot, (module_config, mut module)) in self
            .config
            .chain
            .iter()
            .zip(build_chain(&self.config)?)
            .enumerate()
        {
            for target in self.mapper.targets().filter(|t| t.slot == slot) {
                if let Some(nrm) = self.mapper.value(target) {
                    module.param_set_mut().set_val(target.key, nrm)?;
                }
            }
            if module_config.bypassed {
                dispatcher.push_bypassed(module);
            } else {
                dispatcher.push(module);
            }
        }

        self.events = Some(tx);
        Ok(Box::new(dispatcher))
    }

    /// Feeds a control change. Returns the number of parameter events
    /// posted; zero when no dispatcher is running, in which case only the
    /// control position moves.
    pub fn apply_control(&mut self, source: ControlSource, raw: f32) -> Result<usize, ControlError> {
        match &self.events {
            Some(tx) => self.mapper.handle(source, raw, tx),
            None => {
                // Keep positions moving; the next dispatcher picks them up.
                let (tx, _rx) = EventQueue::bounded(self.mapper.len().max(1));
                self.mapper.handle(source, raw, &tx).map(|_| 0)
            }
        }
    }

    /// Forgets the dispatcher of the last session.
    pub fn detach(&mut self) {
        self.events = None;
    }
}

fn build_chain(config: &EngineConfig) -> anyhow::Result<Vec<Box<dyn Processable>>> {
    let ramp_time = config.engine.ramp_time();
    config
        .chain
        .iter()
        .enumerate()
        .map(|(slot, m)| modules::build(m, ramp_time).with_context(|| format!("chain slot {slot}")))
        .collect()
}
