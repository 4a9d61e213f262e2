//! File store behaviour seen from the port traits.

use std::sync::{Arc, Barrier};

use brewcore::adapters::file_store::FileStore;
use brewcore::app::ports::{LogStore, RecipeStore};
use brewcore::model::{BrewingLog, HopAddition, HopCookingPlan, MashingPlan, MessageKind, Recipe};
use brewcore::Error;

fn open() -> (tempfile::TempDir, FileStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("recipes"), dir.path().join("logs")).unwrap();
    (dir, store)
}

fn dunkel() -> Recipe {
    let mut r = Recipe::new("dunkel", "Munich Dunkel");
    r.description = "Decoction-free version".into();
    r.mashing = MashingPlan::sequential(&[(52.0, 900), (64.0, 2400), (72.0, 1200)]);
    r.hop_cooking = HopCookingPlan {
        duration_secs: 4200,
        additions: vec![HopAddition {
            name: "Hallertauer".into(),
            amount_grams: 35.0,
            input_time_secs: 600,
        }],
    };
    r
}

fn finished_log(id: i64) -> BrewingLog {
    let mut log = BrewingLog::new(id, dunkel());
    log.append(MessageKind::Transition, "Idle -> Mashing").unwrap();
    log.append(MessageKind::Transition, "Mashing -> IodineTest").unwrap();
    log.close();
    log
}

#[test]
fn saving_a_log_twice_gives_two_loadable_files() {
    let (_dir, store) = open();
    let log = finished_log(0);
    let first = store.save_log(&log).unwrap();
    let second = store.save_log(&log).unwrap();
    assert_ne!(first, second);
    assert!(first.exists() && second.exists());

    assert_eq!(store.get_log_by_id(0).unwrap(), log);
    assert_eq!(store.get_logs().unwrap().len(), 2);
}

#[test]
fn negative_log_id_is_not_found() {
    let (_dir, store) = open();
    store.save_log(&finished_log(0)).unwrap();
    assert!(matches!(store.get_log_by_id(-1), Err(Error::NotFound(_))));
}

#[test]
fn recipe_id_collision_returns_the_new_id() {
    let (_dir, store) = open();
    assert_eq!(store.save_recipe(&dunkel()).unwrap(), "dunkel");
    let id = store.save_recipe(&dunkel()).unwrap();
    assert_eq!(id, "dunkel(0)");

    let stored = store.get_recipe(&id).unwrap();
    assert_eq!(stored.id, "dunkel(0)");
    assert_eq!(stored.mashing, dunkel().mashing);

    let ids: Vec<String> = store
        .recipe_summaries()
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["dunkel".to_string(), "dunkel(0)".to_string()]);
}

#[test]
fn concurrent_saves_land_in_distinct_files() {
    let (_dir, store) = open();
    let store = Arc::new(store);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let recipe_id = store.save_recipe(&dunkel()).unwrap();
                let log_path = store.save_log(&finished_log(5)).unwrap();
                (recipe_id, log_path)
            })
        })
        .collect();
    let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut ids: Vec<String> = results.iter().map(|(id, _)| id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), threads);
    for id in &ids {
        assert_eq!(store.get_recipe(id).unwrap().name, "Munich Dunkel");
    }

    results.sort_by(|a, b| a.1.cmp(&b.1));
    results.dedup_by(|a, b| a.1 == b.1);
    assert_eq!(results.len(), threads);
    assert_eq!(store.get_logs().unwrap().len(), threads);
}

#[test]
fn log_summaries_skip_broken_files() {
    let (_dir, store) = open();
    store.save_log(&finished_log(1)).unwrap();
    std::fs::write(store.log_dir().join("2_20260101-000000.brewlog"), "{}\n").unwrap();

    let summaries = store.log_summaries().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, 1);
    assert_eq!(summaries[0].title, "Munich Dunkel");
    assert!(matches!(store.get_log_by_id(2), Err(Error::ParseFailure(_))));
    assert_eq!(store.next_log_id().unwrap(), 3);
}

#[test]
fn listings_racing_saves_never_cache_a_stale_view() {
    let (_dir, store) = open();
    let store = Arc::new(store);
    let writers = 4;
    let readers = 4;
    let per_writer = 5;
    let barrier = Arc::new(Barrier::new(writers + readers));

    let mut handles = Vec::new();
    for w in 0..writers {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            for n in 0..per_writer {
                let id = (w * per_writer + n + 1) as i64;
                store.save_log(&finished_log(id)).unwrap();
            }
        }));
    }
    for _ in 0..readers {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            for _ in 0..20 {
                store.log_summaries().unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let total = writers * per_writer;
    assert_eq!(store.log_summaries().unwrap().len(), total);
    // Served from the cache this time; it must match the directory.
    let ids: Vec<i64> = store.log_summaries().unwrap().iter().map(|s| s.id).collect();
    assert_eq!(ids, (1..=total as i64).collect::<Vec<_>>());
    assert_eq!(store.next_log_id().unwrap(), total as i64 + 1);
}
