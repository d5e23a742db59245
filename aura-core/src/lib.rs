//! Aura core - logging, command-line arguments and shared collections.

pub mod cli;
pub mod log;

pub mod collections {
    pub use smallvec::{smallvec, SmallVec};

    pub mod hashmap {
        pub use hashbrown::HashMap;
    }

    pub mod hashset {
        pub use hashbrown::HashSet;
    }
}
