//! Ingestion loop: change detection, buffering, flush boundaries and the
//! shutdown sequence for one recording.

use crate::buffer::{with_retry, BufferedUpdates, FlushExecutor, FlushScheduler, RetryPolicy};
use crate::changes::{self, ChangeDetector};
use crate::config::IngestConfig;
use crate::coords;
use crate::correlate::HeroMap;
use crate::entity::{Entity, EntityEventKind, World};
use crate::event::{synthesize_hero_moves, EventRow, RoleResolver};
use crate::messages::{ChatEvent, CombatLogEntry, DemoHeader, FileInfo};
use crate::sink::{Session, Sink};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;


/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub session_id: String,
    pub notifications: u64,
    pub forwarded: u64,
    pub skipped_positions: u64,
    pub flushes: u64,
    pub updates_written: usize,
    pub updates_dropped: usize,
    pub events_written: usize,
    pub events_dropped: usize,
}

/// Owns every piece of per-recording state.
///
/// Entity notifications are processed synchronously; each flush boundary
/// spawns a background write of the drained generation. `finish` must be
/// called once the stream ends.
pub struct Pipeline {
    config: IngestConfig,
    sink: Arc<dyn Sink>,
    session: Session,
    session_created: bool,
    detector: ChangeDetector,
    updates: BufferedUpdates,
    scheduler: FlushScheduler,
    executor: FlushExecutor,
    heroes: HeroMap,
    events: Vec<EventRow>,
    retry: RetryPolicy,
    tickrate: Option<u32>,
    summary: RunSummary,
}

impl Pipeline {
    pub fn new(config: IngestConfig, sink: Arc<dyn Sink>) -> Self {
        let session_id = Uuid::now_v7().to_string();
        let retry = config.flush.retry_policy();

        let session = Session {
            id: session_id.clone(),
            title: String::new(),
            level: String::new(),
            game: config.sink.game.clone(),
            data: "{}".to_string(),
            tickrate: config.sink.default_tickrate,
            created_at: Utc::now(),
        };

        Self {
            detector: ChangeDetector::new(config.changes.extra_ignored_properties.iter().cloned()),
            updates: BufferedUpdates::new(),
            scheduler: FlushScheduler::new(config.flush.window_ticks),
            executor: FlushExecutor::new(Arc::clone(&sink), session_id.clone(), retry.clone()),
            heroes: HeroMap::new(
                config.correlation.max_players,
                config.correlation.handle_index_bits,
            ),
            events: Vec::new(),
            summary: RunSummary {
                session_id,
                ..Default::default()
            },
            config,
            sink,
            session,
            session_created: false,
            retry,
            tickrate: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    /// Updates buffered since the last flush
    pub fn buffered(&self) -> &BufferedUpdates {
        &self.updates
    }

    /// Events queued for delivery at shutdown
    pub fn events(&self) -> &[EventRow] {
        &self.events
    }

    /// Counters so far; `finish` fills in the write totals
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn heroes(&self) -> &HeroMap {
        &self.heroes
    }

    /// Flush tasks still writing
    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    /// Creates the session row from the recording header.
    pub async fn on_header(&mut self, header: &DemoHeader) -> Result<()> {
        if self.session_created {
            warn!(session_id = %self.session.id, "Ignoring repeated recording header");
            return Ok(());
        }

        let header = header.trimmed();
        self.session.title = header.server_name.clone();
        self.session.level = header.map_name.clone();
        self.session.data =
            serde_json::to_string(&header).context("Failed to serialize recording header")?;

        self.create_session().await?;
        info!(
            session_id = %self.session.id,
            title = %self.session.title,
            level = %self.session.level,
            "Session created"
        );
        Ok(())
    }

    async fn create_session(&mut self) -> Result<()> {
        let sink = Arc::clone(&self.sink);
        let session = self.session.clone();
        with_retry(&self.retry, "session", || sink.create_session(&session))
            .await
            .context("Failed to create session")?;
        self.session_created = true;
        Ok(())
    }

    pub fn on_file_info(&mut self, info: &FileInfo) {
        match info.tickrate() {
            Some(rate) => {
                debug!(tickrate = rate, "Tickrate from file info");
                self.tickrate = Some(rate);
            }
            None => warn!(
                playback_ticks = info.playback_ticks,
                playback_time = info.playback_time,
                "File info has no usable playback totals"
            ),
        }
    }

    /// Processes one entity notification at `tick`.
    ///
    /// `world` must already reflect the notification; `entity` is the
    /// entity's complete current state (its final state for a delete).
    pub fn on_entity(&mut self, world: &World, entity: &Entity, kind: EntityEventKind, tick: u32) {
        self.summary.notifications += 1;

        if entity.class_name == self.config.correlation.player_resource_class
            && kind != EntityEventKind::Delete
        {
            for e in self.heroes.refresh(world, entity) {
                warn!(tick = tick, error = %e, "Skipping player slot");
            }
        }

        match kind {
            EntityEventKind::Delete => {
                self.detector.forget(entity.index);
                return;
            }
            EntityEventKind::Create => self.detector.track(entity.index),
            EntityEventKind::Update => {}
        }

        if self.scheduler.poll(tick) {
            self.flush_boundary(world);
        }

        self.buffer_changes(entity, tick);
    }

    fn buffer_changes(&mut self, entity: &Entity, tick: u32) {
        let mut position_buffered = false;

        for (property, value) in &entity.properties {
            if !self.detector.observe(entity.index, property, value) {
                continue;
            }

            if coords::is_coordinate_property(property) {
                // one reconstruction per notification, from the full state
                if position_buffered {
                    continue;
                }
                position_buffered = true;
            }

            match changes::transform(entity, property, value) {
                Ok((name, value)) => {
                    self.updates.buffer(entity.index, name, tick, value);
                    self.summary.forwarded += 1;
                }
                Err(e) => {
                    warn!(
                        entity = entity.index,
                        tick = tick,
                        error = %e,
                        "Skipping position update"
                    );
                    self.summary.skipped_positions += 1;
                }
            }
        }
    }

    /// Derives movement events from the pending generation, then hands the
    /// generation to a background flush.
    fn flush_boundary(&mut self, world: &World) {
        let moves = synthesize_hero_moves(
            self.updates.entities(),
            &self.heroes,
            world,
            &self.config.correlation.player_id_property,
        );
        self.events.extend(moves);

        let snapshot = self.updates.drain();
        let records = snapshot.values().map(|p| p.len()).sum::<usize>();
        if let Some(generation) = self.executor.flush(snapshot) {
            self.summary.flushes += 1;
            debug!(
                generation = generation,
                records = records,
                last_flush_tick = self.scheduler.last_flush_tick(),
                "Flush started"
            );
        }
    }

    /// Forces a flush boundary regardless of the tick window.
    pub fn flush(&mut self, world: &World, tick: u32) {
        self.scheduler.mark_flushed(tick);
        self.flush_boundary(world);
    }

    pub fn on_chat(&mut self, world: &World, tick: u32, event: &ChatEvent) {
        let resolver =
            RoleResolver::new(world, &self.heroes, &self.config.correlation.player_id_property);
        match resolver.chat_event(tick, event) {
            Ok(row) => self.events.push(row),
            Err(e) => error!(tick = tick, error = %e, "Failed to build chat event, dropping"),
        }
    }

    pub fn on_combat_log(&mut self, world: &World, tick: u32, entry: &CombatLogEntry) {
        let resolver =
            RoleResolver::new(world, &self.heroes, &self.config.correlation.player_id_property);
        match resolver.combat_log_event(tick, entry) {
            Ok(row) => self.events.push(row),
            Err(e) => error!(tick = tick, error = %e, "Failed to build combat log event, dropping"),
        }
    }

    /// Shutdown sequence: final flush, wait for every writer, deliver the
    /// queued events, store the tickrate and commit.
    ///
    /// If any flush generation failed the sink is left uncommitted and an
    /// error is returned.
    pub async fn finish(mut self, world: &World, tick: u32) -> Result<RunSummary> {
        info!("Final flush");
        self.flush(world, tick);

        info!(in_flight = self.executor.in_flight(), "Waiting for writer tasks to complete");
        self.executor.wait_idle().await;
        let flushed = self.executor.join_all().await;

        self.summary.updates_written = flushed.written();
        self.summary.updates_dropped = flushed.dropped();

        if !flushed.failures.is_empty() {
            for failure in &flushed.failures {
                error!(error = %failure, "Flush generation failed");
            }
            bail!(
                "{} of {} flush generations failed; session {} not committed",
                flushed.failures.len(),
                self.executor.generations(),
                self.session.id
            );
        }

        if !self.session_created {
            warn!(session_id = %self.session.id, "Recording had no header, creating bare session");
            self.create_session().await?;
        }

        info!(events = self.events.len(), "Writing events");
        for row in &self.events {
            let record = match row.to_record(&self.session.id) {
                Ok(r) => r,
                Err(e) => {
                    error!(tick = row.tick, name = %row.name, error = %e, "Failed to serialize event, dropping");
                    self.summary.events_dropped += 1;
                    continue;
                }
            };
            let sink = Arc::clone(&self.sink);
            with_retry(&self.retry, "event", || sink.write_event(&record))
                .await
                .with_context(|| format!("Failed to write event '{}' at tick {}", row.name, row.tick))?;
            self.summary.events_written += 1;
        }

        if let Some(rate) = self.tickrate {
            info!(tickrate = rate, "Updating tickrate");
            self.sink
                .set_tickrate(&self.session.id, rate)
                .await
                .context("Failed to update tickrate")?;
        }

        info!("Committing session");
        self.sink.commit().await.context("Failed to commit session")?;

        info!(
            session_id = %self.summary.session_id,
            updates = self.summary.updates_written,
            events = self.summary.events_written,
            flushes = self.summary.flushes,
            "Ingest complete"
        );
        Ok(self.summary)
    }
}
