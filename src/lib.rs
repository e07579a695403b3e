// World coordinates and property values
pub mod coords;
pub mod value;

// Live entity table
pub mod entity;

// Change detection and property transformation
pub mod changes;

// Update cache, flush scheduling and background flushing
pub mod buffer;

// Player slot to hero correlation
pub mod correlate;

// Out-of-band protocol messages and derived event rows
pub mod event;
pub mod messages;

// Durable output
pub mod sink;

// Ingestion loop and recording input
pub mod pipeline;
pub mod replay;

// Configuration
pub mod config;
