//! Three-rotor cipher machine
//!
//! - `registry` - Immutable rotor and reflector wiring
//! - `config` - Validated machine settings and plugboard
//! - `machine` - Stateful simulator and message format
//! - `cracker` - Parallel day-key search

pub mod config;
pub mod cracker;
pub mod machine;
pub mod registry;

pub use config::{MachineConfig, Plugboard};
pub use cracker::{rotor_orders, worker_count, RotorCrack, RotorMachineCracker, DEFAULT_RESERVED_CORES};
pub use machine::{decrypt_message, encrypt_message, DecryptedMessage, MachineState, RotorMachine};
pub use registry::{ReflectorId, ReflectorSpec, Registry, RotorId, RotorSpec};
