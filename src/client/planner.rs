//! Choosing a connection to serve a seek
use std::cmp::{max, min};

use client::config::{IDLE_TIMEOUT_MS, MIN_REQUESTS_LEFT, READAHEAD_MIN};


/// What to do with a pooled connection on seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Close the connection, it's stale or nearly out of requests
    Evict,
    /// Read and discard bytes until the target
    ReadAhead,
    /// Request the target range, then finish the current response
    Pipeline,
    /// Leave it for later
    Skip,
}

/// Snapshot of a connection's state
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub pos: u64,
    pub end: Option<u64>,
    /// Outstanding request, `(start, end)`
    pub pending: Option<(u64, Option<u64>)>,
    pub available: u64,
    pub idle_ms: u64,
    pub requests_left: u32,
    pub read_rate: i64,
}

fn transfer_estimate(connect_rate: i64, read_rate: i64) -> u64 {
    max(connect_rate.saturating_mul(read_rate), 0) as u64
}

/// Bytes worth reading instead of opening a new connection
pub fn read_ahead_threshold(connect_rate: i64, read_rate: i64) -> u64 {
    max(READAHEAD_MIN, transfer_estimate(connect_rate, read_rate) >> 11)
}

/// Distance to the response end at which the next request is sent early
pub fn pipeline_threshold(chunk: u64, connect_rate: i64, read_rate: i64)
    -> u64
{
    min(chunk >> 2, transfer_estimate(connect_rate, read_rate) >> 12)
}

pub fn judge(c: &Candidate, target: u64, connect_rate: i64, pipeline: bool)
    -> Plan
{
    if c.idle_ms > IDLE_TIMEOUT_MS || c.requests_left < MIN_REQUESTS_LEFT {
        return Plan::Evict;
    }
    let thresh = read_ahead_threshold(connect_rate, c.read_rate);
    let reach = match c.pending {
        None => c.end,
        Some((start, end)) if Some(start) == c.end => end,
        Some(_) => c.end,
    };
    if c.pos <= target && reach.map_or(true, |end| target < end) &&
        (target - c.pos).saturating_sub(c.available) <= thresh
    {
        return Plan::ReadAhead;
    }
    if pipeline && c.pending.is_none() {
        if let Some(end) = c.end {
            if (end - c.pos).saturating_sub(c.available) <= thresh {
                return Plan::Pipeline;
            }
        }
    }
    Plan::Skip
}
