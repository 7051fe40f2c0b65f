//! Exhaustive day-key search.
//!
//! Every ordered choice of three rotors (60) is tried with every start
//! triple (17,576) under reflector B, no rings and no plugboard. A setting
//! survives only if the first six ciphertext letters decrypt to a doubled
//! message key; survivors are ranked by the letter-frequency score of the
//! decrypted body.

use super::config::{letters, MachineConfig};
use super::machine::{read_message_key, split_message, RotorMachine};
use super::registry::{ReflectorId, Registry, RotorId};
use crate::frequency::FrequencyScorer;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Instant;

/// Number of ordered rotor selections; worker counts must divide it
pub const ROTOR_ORDERS: usize = 60;

/// Cores left free for the rest of the system by default
pub const DEFAULT_RESERVED_CORES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotorCrack {
    /// Left, middle, right
    pub rotors: [RotorId; 3],
    pub day_key: String,
    pub message_key: String,
    pub plaintext: String,
    pub score: f64,
}

/// Best setting found by one worker
#[derive(Debug, Clone)]
struct Candidate {
    rotors: [RotorId; 3],
    day_key: [u8; 3],
    message_key: [u8; 3],
    plaintext: String,
    score: f64,
}

/// Every ordered selection of three distinct rotors, lexicographic by rotor
pub fn rotor_orders() -> Vec<[RotorId; 3]> {
    let mut orders = Vec::with_capacity(ROTOR_ORDERS);
    for left in RotorId::ALL {
        for middle in RotorId::ALL {
            for right in RotorId::ALL {
                if left != middle && left != right && middle != right {
                    orders.push([left, middle, right]);
                }
            }
        }
    }
    orders
}

/// Available cores minus `reserved` (only when there is more than one
/// core), reduced to the nearest divisor of 60. Never less than 1.
pub fn worker_count(available: usize, reserved: usize) -> usize {
    let wanted = if available > 1 {
        available.saturating_sub(reserved)
    } else {
        1
    };
    largest_divisor_at_most(wanted)
}

fn largest_divisor_at_most(wanted: usize) -> usize {
    let mut workers = wanted.clamp(1, ROTOR_ORDERS);
    while ROTOR_ORDERS % workers != 0 {
        workers -= 1;
    }
    workers
}

pub struct RotorMachineCracker<'r> {
    registry: &'r Registry,
    workers: usize,
}

impl<'r> RotorMachineCracker<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            workers: worker_count(num_cpus::get(), DEFAULT_RESERVED_CORES),
        }
    }

    /// Use an explicit worker count, reduced to a divisor of 60
    pub fn with_workers(mut self, workers: usize) -> Self {
        let adjusted = largest_divisor_at_most(workers);
        if adjusted != workers {
            tracing::warn!(requested = workers, using = adjusted, "Worker count must divide 60");
        }
        self.workers = adjusted;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Recover rotor order, day key, message key and plaintext. Among
    /// equal scores the earliest setting in enumeration order wins.
    ///
    /// The result is the best effort over every setting whose doubled
    /// message key is consistent. Input whose six-letter prefix decrypts
    /// to a doubled key under no setting at all fails with
    /// `NoConsistentSetting`.
    pub fn crack(&self, ciphertext: &str) -> Result<RotorCrack> {
        let (prefix, body) = split_message(ciphertext)?;
        let orders = rotor_orders();
        let per_worker = ROTOR_ORDERS / self.workers;

        tracing::info!(workers = self.workers, "Starting rotor key search");
        let started = Instant::now();

        let mut slots: Vec<Option<Candidate>> = vec![None; self.workers];
        thread::scope(|scope| {
            for (slot, block) in slots.iter_mut().zip(orders.chunks(per_worker)) {
                let registry = self.registry;
                let prefix = &prefix;
                scope.spawn(move || {
                    *slot = search_block(registry, block, prefix, body);
                });
            }
        });

        let best = best_candidate(slots)?;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            rotors = ?best.rotors,
            score = best.score,
            "Rotor key search finished"
        );

        Ok(RotorCrack {
            rotors: best.rotors,
            day_key: letters(best.day_key),
            message_key: letters(best.message_key),
            plaintext: best.plaintext,
            score: best.score,
        })
    }
}

/// Reduce per-worker slots in worker order; strict `<` keeps the earlier
/// setting on ties.
fn best_candidate(slots: Vec<Option<Candidate>>) -> Result<Candidate> {
    let mut best: Option<Candidate> = None;
    for (worker, candidate) in slots.into_iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        tracing::debug!(
            worker,
            rotors = ?candidate.rotors,
            day_key = %letters(candidate.day_key),
            score = candidate.score,
            "Worker finished"
        );
        if best.as_ref().map_or(true, |b| candidate.score < b.score) {
            best = Some(candidate);
        }
    }
    best.ok_or(Error::NoConsistentSetting)
}

/// Scan a contiguous block of rotor orders, start triples in A..Z order.
fn search_block(registry: &Registry, orders: &[[RotorId; 3]], prefix: &[u8; 6], body: &str) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for &rotors in orders {
        let config = match MachineConfig::new(ReflectorId::B, rotors) {
            Ok(config) => config,
            Err(_) => continue,
        };
        let mut machine = RotorMachine::new(registry, &config);

        for left in 0..26 {
            for middle in 0..26 {
                for right in 0..26 {
                    let day_key = [left, middle, right];
                    machine.rekey(day_key);
                    let Ok(message_key) = read_message_key(&mut machine, prefix) else {
                        continue;
                    };

                    machine.rekey(message_key);
                    let plaintext = machine.process(body);
                    let score = FrequencyScorer::score_text(&plaintext);
                    if best.as_ref().map_or(true, |b| score < b.score) {
                        best = Some(Candidate {
                            rotors,
                            day_key,
                            message_key,
                            plaintext,
                            score,
                        });
                    }
                }
            }
        }
        tracing::trace!(rotors = ?rotors, "Rotor order searched");
    }
    best
}
