//! Run names
//!
//! Generated names have the form `adjective-noun`. A generated name that is
//! already taken gets a numeric suffix (`-2`, `-3`, ...); a name chosen by
//! the caller is never changed.

use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;

use crate::error::{Result, StoreError};

const ADJECTIVES: &[&str] = &[
    "able", "brave", "brisk", "candid", "clever", "cosmic", "crisp", "dapper", "deft", "eager",
    "electric", "fancy", "fluent", "frank", "gleaming", "grand", "hardy", "humble", "jovial",
    "kind", "lucid", "mellow", "mighty", "nimble", "plucky", "polished", "quiet", "radiant",
    "rustic", "sharp", "silent", "sleek", "snowy", "steady", "sunny", "tidy", "upbeat", "valiant",
    "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "antelope", "beaver", "bison", "canary", "condor", "cougar", "coyote", "crane", "finch",
    "fox", "gecko", "gopher", "hawk", "hornet", "ibex", "lynx", "magpie", "marmot", "mink",
    "moose", "ocelot", "orca", "osprey", "owl", "panda", "puffin", "python", "robin", "seal",
    "shrew", "sparrow", "stork", "tapir", "tiger", "trout", "weasel", "whale", "wolf", "wren",
    "yak",
];

/// Highest suffix tried before giving up
const MAX_SUFFIX: u32 = 999;

/// Generate a random `adjective-noun` name
pub fn generate_run_name() -> String {
    generate_run_name_with(&mut rand::thread_rng())
}

/// Generate a name from an explicit source of randomness
pub fn generate_run_name_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(rng).copied().unwrap_or("run");
    format!("{}-{}", adjective, noun)
}

/// Pick a free run name and its file path.
///
/// `path_for` maps a candidate name to the file it would occupy. With
/// `generated` set, taken names are retried with suffixes `-2` up to
/// `-999`; otherwise a taken name is an `InvalidValue` error.
pub fn resolve_run_name<F>(name: &str, generated: bool, path_for: F) -> Result<(String, PathBuf)>
where
    F: Fn(&str) -> PathBuf,
{
    let path = path_for(name);
    if !path.exists() {
        return Ok((name.to_string(), path));
    }

    if !generated {
        return Err(StoreError::invalid(format!(
            "run '{}' already exists at {}; choose another name or delete the file",
            name,
            path.display()
        )));
    }

    for suffix in 2..=MAX_SUFFIX {
        let candidate = format!("{}-{}", name, suffix);
        let path = path_for(&candidate);
        if !path.exists() {
            return Ok((candidate, path));
        }
    }

    Err(StoreError::invalid(format!(
        "no free run name left for '{}'",
        name
    )))
}
