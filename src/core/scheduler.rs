// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Task scheduler for timed operations

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Work run once per scheduler tick
#[async_trait]
pub trait PeriodicTask: Send + 'static {
    async fn tick(&mut self);
}

/// Runs named periodic tasks; a name can only be registered once
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    /// Spawn `task` to tick every `period`, starting immediately
    pub async fn add_task<T: PeriodicTask>(&self, name: &str, period: Duration, mut task: T) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(name) {
            bail!("task '{}' is already scheduled", name);
        }
        if *self.shutdown.borrow() {
            bail!("scheduler is shut down");
        }

        let mut stop = self.shutdown.subscribe();
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => task.tick().await,
                    _ = stop.changed() => break,
                }
            }
            debug!("Task '{}' stopped", task_name);
        });

        tasks.insert(name.to_string(), handle);
        debug!("Scheduled task '{}' with interval {:?}", name, period);
        Ok(())
    }

    pub async fn is_scheduled(&self, name: &str) -> bool {
        self.tasks.read().await.contains_key(name)
    }

    /// Signal every task to stop and wait for them
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let drained: Vec<(String, JoinHandle<()>)> = self.tasks.write().await.drain().collect();
        for (name, handle) in drained {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Task '{}' ended abnormally: {}", name, e);
                }
            }
        }
        info!("Scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
