//! Recording input and the driver that feeds it through a [`Pipeline`].
//!
//! A recording is JSON lines, one tagged message per line, optionally
//! gzip-compressed (`.gz` extension). Entity lines carry only the changed
//! properties; the driver merges them into its [`World`].

use crate::entity::{EntityEventKind, World};
use crate::messages::{ChatEvent, CombatLogEntry, DemoHeader, FileInfo};
use crate::pipeline::{Pipeline, RunSummary};
use crate::value::PropValue;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};


/// One line of a recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayMessage {
    Header(DemoHeader),
    FileInfo(FileInfo),
    Entity {
        tick: u32,
        event: EntityEventKind,
        index: u32,
        #[serde(default)]
        class_name: String,
        #[serde(default)]
        properties: HashMap<String, PropValue>,
    },
    Chat {
        tick: u32,
        event: ChatEvent,
    },
    CombatLog {
        tick: u32,
        entry: CombatLogEntry,
    },
}

/// Line-oriented reader over a recording
pub struct RecordingReader {
    lines: Box<dyn BufRead + Send>,
    line_number: usize,
    buf: String,
}

impl RecordingReader {
    /// Opens `path`, decompressing when it ends in `.gz`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;

        let gzipped = path.extension().map_or(false, |ext| ext == "gz");
        if gzipped {
            debug!(path = %path.display(), "Reading gzip recording");
            Ok(Self::from_reader(GzDecoder::new(file)))
        } else {
            Ok(Self::from_reader(file))
        }
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            lines: Box::new(BufReader::new(reader)),
            line_number: 0,
            buf: String::new(),
        }
    }

    /// Next message, or `None` at end of input. Blank lines are skipped.
    pub fn next_message(&mut self) -> Result<Option<ReplayMessage>> {
        loop {
            self.buf.clear();
            let read = self
                .lines
                .read_line(&mut self.buf)
                .with_context(|| format!("Failed to read recording line {}", self.line_number + 1))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            let message = serde_json::from_str(line)
                .with_context(|| format!("Invalid message on recording line {}", self.line_number))?;
            return Ok(Some(message));
        }
    }

    /// Lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Feeds every message of `reader` through `pipeline`, then finishes it.
pub async fn ingest(reader: &mut RecordingReader, mut pipeline: Pipeline) -> Result<RunSummary> {
    let mut world = World::new();
    let mut last_tick = 0;

    info!(session_id = %pipeline.session_id(), "Ingesting recording");

    while let Some(message) = reader.next_message()? {
        match message {
            ReplayMessage::Header(header) => pipeline.on_header(&header).await?,
            ReplayMessage::FileInfo(file_info) => pipeline.on_file_info(&file_info),
            ReplayMessage::Entity {
                tick,
                event,
                index,
                class_name,
                properties,
            } => {
                last_tick = tick;
                match world.apply(event, index, &class_name, properties) {
                    Some(entity) => pipeline.on_entity(&world, &entity, event, tick),
                    None => debug!(entity = index, tick = tick, "Delete for unknown entity"),
                }
            }
            ReplayMessage::Chat { tick, event } => {
                last_tick = tick;
                pipeline.on_chat(&world, tick, &event);
            }
            ReplayMessage::CombatLog { tick, entry } => {
                last_tick = tick;
                pipeline.on_combat_log(&world, tick, &entry);
            }
        }
    }

    info!(
        lines = reader.line_number(),
        entities = world.len(),
        last_tick = last_tick,
        "Recording exhausted"
    );

    pipeline.finish(&world, last_tick).await
}
