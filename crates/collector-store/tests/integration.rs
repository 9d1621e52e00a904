//! Integration tests for the `collector-store` persistence layer.
//!
//! Every test works inside a temporary reports directory, drives a real
//! simulation, and goes through the same save and load path the engine
//! uses.

#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc)]

use std::collections::BTreeSet;

use chrono::Utc;
use collector_core::population::Population;
use collector_core::simulation::{RunIdentity, Simulation};
use collector_store::{
    Checkpoint, CheckpointStore, LoadOutcome, RegistryEntry, RunPaths, RunRegistry,
};
use collector_types::{Member, MemberId, RunName};

fn population() -> Population {
    let members = [("Bulbasaur", 318.0, 0.3), ("Eevee", 325.0, 0.6), ("Mew", 600.0, 0.05)]
        .into_iter()
        .map(|(id, rank, retention_rate)| Member {
            id: MemberId::new(id),
            rank,
            retention_rate,
            draw_weight: collector_core::population::draw_weight(rank, 10.0, 2.0),
            flags: BTreeSet::new(),
        })
        .collect();
    Population::from_members(members).unwrap()
}

fn identity(name: &RunName) -> RunIdentity {
    RunIdentity {
        name: name.clone(),
        rate_label: "custom(0.05)".to_owned(),
    }
}

fn advance(sim: &mut Simulation, draws: u64) {
    for _ in 0..draws {
        if sim.is_complete() {
            break;
        }
        let _ = sim.draw().unwrap();
    }
}

#[test]
fn resume_through_checkpoint_file_matches_uninterrupted_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let name = RunName::parse("resumed").unwrap();
    let paths = RunPaths::new(dir.path(), &name);
    let store = CheckpointStore::new(&paths.checkpoint);

    let mut uninterrupted = Simulation::new(identity(&name), population(), 0.05, false, 42).unwrap();
    advance(&mut uninterrupted, 3_000);

    let mut first = Simulation::new(identity(&name), population(), 0.05, false, 42).unwrap();
    advance(&mut first, 1_000);
    store.save(&Checkpoint::capture(&first)).unwrap();
    drop(first);

    let checkpoint = match store.load(&name, &population()) {
        LoadOutcome::Restored(checkpoint) => checkpoint,
        other => panic!("expected restored checkpoint, got {other:?}"),
    };
    let mut resumed = Simulation::restore(
        identity(&name),
        population(),
        checkpoint.state,
        checkpoint.rng.into(),
        checkpoint.initial_prediction,
    )
    .unwrap();
    advance(&mut resumed, 2_000);

    let a = uninterrupted.state();
    let b = resumed.state();
    assert_eq!(a.draw_count, b.draw_count);
    assert_eq!(a.special_seen, b.special_seen);
    assert_eq!(a.special_retained, b.special_retained);
    assert_eq!(a.special_missed, b.special_missed);
    assert_eq!(a.ordinary_seen, b.ordinary_seen);
    assert_eq!(a.retained_set, b.retained_set);
    assert_eq!(a.per_member_retained_counts, b.per_member_retained_counts);
    assert_eq!(a.per_member_ordinary_counts, b.per_member_ordinary_counts);
    assert_eq!(
        uninterrupted.initial_prediction(),
        resumed.initial_prediction()
    );
}

#[test]
fn overwriting_checkpoint_keeps_latest_and_leaves_no_temp_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let name = RunName::parse("overwrite").unwrap();
    let paths = RunPaths::new(dir.path(), &name);
    let store = CheckpointStore::new(&paths.checkpoint);

    let mut sim = Simulation::new(identity(&name), population(), 0.05, false, 7).unwrap();
    advance(&mut sim, 100);
    store.save(&Checkpoint::capture(&sim)).unwrap();
    advance(&mut sim, 100);
    store.save(&Checkpoint::capture(&sim)).unwrap();

    let loaded = store.read().unwrap().unwrap();
    assert_eq!(loaded.state.draw_count, sim.state().draw_count);

    let leftovers: Vec<_> = std::fs::read_dir(&paths.run_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|file| file.to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn truncated_checkpoint_falls_back_to_fresh_start() {
    let dir = tempfile::TempDir::new().unwrap();
    let name = RunName::parse("truncated").unwrap();
    let paths = RunPaths::new(dir.path(), &name);
    let store = CheckpointStore::new(&paths.checkpoint);

    let mut sim = Simulation::new(identity(&name), population(), 0.05, false, 9).unwrap();
    advance(&mut sim, 500);
    store.save(&Checkpoint::capture(&sim)).unwrap();

    let full = std::fs::read_to_string(&paths.checkpoint).unwrap();
    let cut = full.len() / 2;
    std::fs::write(&paths.checkpoint, full.get(..cut).unwrap()).unwrap();

    assert!(matches!(
        store.load(&name, &population()),
        LoadOutcome::Corrupt { .. }
    ));
}

#[test]
fn separate_runs_share_one_registry() {
    let dir = tempfile::TempDir::new().unwrap();
    let names = ["charm_run", "masuda_run"].map(|n| RunName::parse(n).unwrap());

    for name in &names {
        let paths = RunPaths::new(dir.path(), name);
        let store = CheckpointStore::new(&paths.checkpoint);
        let mut sim = Simulation::new(identity(name), population(), 0.05, false, 1).unwrap();
        advance(&mut sim, 50);
        store.save(&Checkpoint::capture(&sim)).unwrap();

        let mut registry = RunRegistry::load(paths.registry());
        registry
            .record(
                name.as_str(),
                RegistryEntry {
                    rate_label: sim.identity().rate_label.clone(),
                    special_rate: sim.state().special_rate,
                    guaranteed_retention: sim.state().guaranteed_retention,
                    last_updated: Utc::now(),
                    checkpoint_path: paths.checkpoint.clone(),
                    reports_dir: paths.run_dir.clone(),
                },
            )
            .unwrap();
    }

    let registry = RunRegistry::load(dir.path().join("run_registry.json"));
    assert_eq!(registry.last_active(), Some("masuda_run"));
    let resumable: Vec<&str> = registry
        .list_resumable()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(resumable, vec!["charm_run", "masuda_run"]);
}
