use mcr_core::{derive_substream_seed, WorkerId};

/// Derives the deterministic seed of the sampling session owned by a worker.
pub fn session_seed(master_seed: u64, worker: WorkerId) -> u64 {
    derive_substream_seed(master_seed, worker.index() as u64)
}

/// Derives the deterministic seed handed to the init generator of a worker.
pub fn init_seed(master_seed: u64, worker: WorkerId) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, worker.index() as u64)
}
