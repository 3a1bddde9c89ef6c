//! PopupController: configuration UI that drives the active tab
//!
//! Every control persists its change first, then tells the active tab's
//! content context what to do. Color input is debounced: each call bumps a
//! generation counter before waiting for `settle`, and only the call that is
//! still the latest once it settles persists and rescans.

use std::cell::Cell;
use std::future::Future;

use crate::config::{Color, ConfigStore, Configuration, KeyValueStore};
use crate::protocol::{send_action, Ack, ActionKind, ActionMessage, MessageBus, Target};
use crate::rules::RuleCode;

pub struct PopupController<S, B> {
    config: ConfigStore<S>,
    bus: B,
    generation: Cell<u64>,
}

impl<S: KeyValueStore, B: MessageBus> PopupController<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            config: ConfigStore::new(store),
            bus,
            generation: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ConfigStore<S> {
        &self.config
    }

    /// Stored configuration for initializing the controls
    pub async fn load(&self) -> Configuration {
        self.config.load_or_default().await
    }

    /// Debounced color change
    ///
    /// The generation is taken when this is called, not when the returned
    /// future is first polled. Resolves to `None` when a later call
    /// superseded this one during `settle`.
    pub fn select_color<'s, F>(&'s self, color: &str, settle: F) -> impl Future<Output = Option<Ack>> + 's
    where
        F: Future<Output = ()> + 's,
    {
        let parsed = Color::parse(color);
        let generation = self.generation.get() + 1;
        if parsed.is_ok() {
            self.generation.set(generation);
        }

        async move {
            let color = match parsed {
                Ok(color) => color,
                Err(e) => {
                    log::warn!("[popup] {}", e);
                    return Some(Ack::failed(ActionKind::Scan, e));
                }
            };

            settle.await;
            if self.generation.get() != generation {
                log::debug!("[popup] Color {} superseded", color);
                return None;
            }

            if let Err(e) = self.config.save_color(&color).await {
                log::error!("[popup] Could not save color: {}", e);
                return Some(Ack::failed(ActionKind::Scan, e));
            }
            log::info!("[popup] Selected color {}", color);
            Some(self.send(ActionMessage::Scan).await)
        }
    }

    /// Flip a rule, persist the full map, then ask the tab to rescan with it
    pub async fn toggle_rule(&self, rule: RuleCode) -> Ack {
        let enabled = match self.config.toggle_rule(rule).await {
            Ok(enabled) => enabled,
            Err(e) => {
                log::error!("[popup] Could not save rule {}: {}", rule, e);
                return Ack::failed(ActionKind::SetRule, e);
            }
        };
        self.send(ActionMessage::SetRule {
            rule,
            enabled: Some(enabled),
        })
        .await
    }

    pub async fn scan(&self) -> Ack {
        self.send(ActionMessage::Scan).await
    }

    pub async fn normalize(&self) -> Ack {
        self.send(ActionMessage::Normalize).await
    }

    pub async fn fix(&self) -> Ack {
        self.send(ActionMessage::Fix).await
    }

    async fn send(&self, message: ActionMessage) -> Ack {
        match send_action(&self.bus, Target::ActiveTab, &message).await {
            Ok(ack) => {
                log::info!("[popup] {}", ack.status);
                ack
            }
            Err(e) => {
                log::warn!("[popup] Could not deliver {}: {}", message.kind(), e);
                Ack::failed(message.kind(), e)
            }
        }
    }
}
