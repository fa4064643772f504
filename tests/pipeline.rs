//! Orchestration tests: batch recalculation, the live calculator, and the
//! async pp cache, all over an in-memory map corpus.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use starpp::batch::{BatchRecalc, MapFileProvider};
use starpp::database::{BeatmapDifficulty, BeatmapSet, Database, FinishedScore, MapHash};
use starpp::diff::PP_ALGORITHM_VERSION;
use starpp::live::{LiveCalc, LiveScoreState};
use starpp::mods::{ModFlags, Mods};
use starpp::options::Options;
use starpp::ppcache::{ActiveMap, AsyncPpCache, PpCalcRequest};
use starpp::precalc;

struct Corpus {
    files: HashMap<String, Vec<u8>>,
    db: Arc<Database>,
}

fn build_corpus(num_maps: usize, scores_per_map: usize) -> Corpus {
    let mut files = HashMap::new();
    let db = Database::new();

    let mut score_id = 1u64;
    for m in 0..num_maps {
        let path = format!("maps/{m}.osu");
        let map = common::jump_map(120 + m * 40);
        files.insert(path.clone(), map.into_bytes());

        let hash = MapHash::from_u64(m as u64 + 1);
        let mut diff = BeatmapDifficulty::new(hash, path, "maps/");
        diff.ar = 9.0;
        diff.cs = 4.0;
        diff.od = 8.0;
        diff.hp = 5.0;
        db.add_set(BeatmapSet::new(vec![diff]));

        for s in 0..scores_per_map {
            let mods = match s % 3 {
                0 => Mods::from_flags(ModFlags::empty()),
                1 => Mods::from_flags(ModFlags::Hidden),
                _ => Mods {
                    speed: 1.5,
                    ..Mods::from_flags(ModFlags::HardRock)
                },
            };
            db.insert_score(FinishedScore {
                id: score_id,
                beatmap_hash: hash,
                mods,
                score: 1_000_000 + s as u64 * 10_000,
                combo_max: (100 + s * 13) as i32,
                num_misses: (s % 2) as i32,
                num_300s: (110 + m * 40 - s) as i32,
                num_100s: (s % 4) as i32,
                num_50s: 0,
                is_legacy_import: s % 5 == 4,
                ..FinishedScore::default()
            });
            score_id += 1;
        }
    }

    Corpus {
        files,
        db: Arc::new(db),
    }
}

fn provider_for(files: HashMap<String, Vec<u8>>) -> Arc<MapFileProvider> {
    Arc::new(move |path: &str| files.get(path).cloned())
}

fn run_to_completion(recalc: &mut BatchRecalc) {
    recalc.start();
    let deadline = Instant::now() + Duration::from_secs(120);
    loop {
        let keep_going = recalc.tick_main();
        if !keep_going {
            break;
        }
        assert!(Instant::now() < deadline, "batch did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
    recalc.abort();
}

fn snapshot_results(db: &Database) -> (Vec<(MapHash, f32, [f32; 54])>, Vec<(u64, f64)>) {
    let mut maps = Vec::new();
    db.for_each_difficulty(|diff| {
        let ratings = db.star_ratings(&diff.hash).unwrap_or([0.0; 54]);
        maps.push((diff.hash, diff.stars_nomod, ratings));
    });
    maps.sort_by_key(|(hash, _, _)| hash.0);

    let mut scores = db.with_scores(|scores| {
        scores
            .values()
            .flatten()
            .map(|s| (s.id, s.ppv2_score))
            .collect::<Vec<_>>()
    });
    scores.sort_by_key(|(id, _)| *id);

    (maps, scores)
}

#[test]
fn batch_fills_star_tables_and_score_pp() {
    let corpus = build_corpus(4, 6);
    let provider = provider_for(corpus.files);

    let mut recalc =
        BatchRecalc::with_file_provider(Arc::clone(&corpus.db), Options::default(), provider);
    run_to_completion(&mut recalc);

    let (maps, scores) = snapshot_results(&corpus.db);

    for (hash, stars_nomod, ratings) in &maps {
        assert!(*stars_nomod > 0.0, "map {hash} got no nomod stars");
        assert!(ratings[precalc::NOMOD_1X_INDEX] > 0.0);
        // every precalc cell is filled
        for (idx, cell) in ratings.iter().enumerate() {
            assert!(*cell > 0.0, "cell {} empty", precalc::describe_index(idx));
        }
        // HD at 1.0x rates at least as high as nomod on AR9
        assert!(ratings[precalc::index_of(ModFlags::Hidden, 1.0)] >= ratings[precalc::NOMOD_1X_INDEX]);
        // 1.5x rates higher than 0.75x
        assert!(
            ratings[precalc::index_of(ModFlags::empty(), 1.5)]
                > ratings[precalc::index_of(ModFlags::empty(), 0.75)]
        );

        let version = corpus
            .db
            .with_difficulty(hash, |d| d.ppv2_version)
            .unwrap();
        assert_eq!(version, PP_ALGORITHM_VERSION);
    }

    for (id, pp) in &scores {
        assert!(*pp > 0.0, "score {id} got no pp");
    }
}

#[test]
fn batch_rerun_is_deterministic() {
    let corpus = build_corpus(3, 5);
    let provider = provider_for(corpus.files);

    let mut recalc = BatchRecalc::with_file_provider(
        Arc::clone(&corpus.db),
        Options::default(),
        Arc::clone(&provider),
    );
    run_to_completion(&mut recalc);
    let first = snapshot_results(&corpus.db);

    // invalidate everything and run again without changing inputs
    corpus.db.with_scores_mut(|scores| {
        for score in scores.values_mut().flatten() {
            score.ppv2_version = 0;
            score.ppv2_score = 0.0;
        }
    });
    let hashes: Vec<MapHash> = {
        let mut hashes = Vec::new();
        corpus.db.for_each_difficulty(|d| hashes.push(d.hash));
        hashes
    };
    for hash in hashes {
        corpus.db.with_difficulty_mut(&hash, |d| {
            d.ppv2_version = 0;
            d.stars_nomod = 0.0;
        });
    }

    let mut recalc =
        BatchRecalc::with_file_provider(Arc::clone(&corpus.db), Options::default(), provider);
    run_to_completion(&mut recalc);
    let second = snapshot_results(&corpus.db);

    // bit-for-bit equal results
    assert_eq!(first.0.len(), second.0.len());
    for ((h1, s1, r1), (h2, s2, r2)) in first.0.iter().zip(&second.0) {
        assert_eq!(h1, h2);
        assert_eq!(s1.to_bits(), s2.to_bits());
        for (a, b) in r1.iter().zip(r2) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
    assert_eq!(first.1.len(), second.1.len());
    for ((id1, pp1), (id2, pp2)) in first.1.iter().zip(&second.1) {
        assert_eq!(id1, id2);
        assert_eq!(pp1.to_bits(), pp2.to_bits());
    }
}

#[test]
fn tick_main_after_finish_returns_false_without_side_effects() {
    let corpus = build_corpus(1, 2);
    let provider = provider_for(corpus.files);

    let mut recalc =
        BatchRecalc::with_file_provider(Arc::clone(&corpus.db), Options::default(), provider);
    recalc.start();
    let deadline = Instant::now() + Duration::from_secs(120);
    while recalc.tick_main() {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
    }

    let before = snapshot_results(&corpus.db);
    for _ in 0..10 {
        assert!(!recalc.tick_main());
    }
    let after = snapshot_results(&corpus.db);
    assert_eq!(before.1, after.1);

    assert!(recalc.did_actual_work());
    recalc.abort();
}

#[test]
fn aborted_batch_applies_no_further_results() {
    let corpus = build_corpus(6, 4);
    let provider = provider_for(corpus.files);

    let mut recalc =
        BatchRecalc::with_file_provider(Arc::clone(&corpus.db), Options::default(), provider);
    recalc.start();
    // drain a few ticks, then abort, likely mid-work
    for _ in 0..4 {
        recalc.tick_main();
        std::thread::sleep(Duration::from_millis(5));
    }
    recalc.abort();

    let snapshot = snapshot_results(&corpus.db);

    // ticking after the abort must not change anything
    for _ in 0..5 {
        recalc.tick_main();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(snapshot.1, snapshot_results(&corpus.db).1);

    // every score is either untouched or carries its full result
    corpus.db.with_scores(|scores| {
        for score in scores.values().flatten() {
            if score.ppv2_version == PP_ALGORITHM_VERSION {
                assert!(score.ppv2_score > 0.0);
                assert!(score.ppv2_total_stars > 0.0);
            } else {
                assert_eq!(score.ppv2_score, 0.0);
            }
        }
    });
}

#[test]
fn live_calc_tracks_hit_object_index() {
    let corpus = build_corpus(1, 0);
    let provider = provider_for(corpus.files);
    let mut live = LiveCalc::with_file_provider(Options::default(), provider);

    let snapshot = |index: i32| LiveScoreState {
        osu_file_path: "maps/0.osu".to_owned(),
        cs: 4.0,
        ar: 9.0,
        hp: 5.0,
        od: 8.0,
        speed_multiplier: 1.0,
        current_hit_object: index,
        num_circles: index.max(0),
        num_sliders: 0,
        num_spinners: 0,
        highest_combo: index.max(0),
        num_300s: index.max(0),
        mods: Mods::from_flags(ModFlags::empty()),
        ..LiveScoreState::default()
    };

    // drive the calculator forward and wait for a current result
    let deadline = Instant::now() + Duration::from_secs(60);
    let mut current = false;
    while Instant::now() < deadline {
        live.update(&snapshot(60));
        if live.is_current_for(60) {
            current = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(current, "live calc never caught up");
    assert!(live.stars() > 0.0);
    assert!(live.pp() > 0.0);
    let pp_at_60 = live.pp();

    // a later index yields more pp
    let deadline = Instant::now() + Duration::from_secs(60);
    while Instant::now() < deadline {
        live.update(&snapshot(110));
        if live.is_current_for(110) {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(live.is_current_for(110));
    assert!(live.pp() > pp_at_60);

    live.invalidate();
    assert_eq!(live.pp(), 0.0);
}

#[test]
fn async_pp_cache_returns_sentinel_then_result() {
    let corpus = build_corpus(1, 0);
    let provider = provider_for(corpus.files);

    let mut cache = AsyncPpCache::with_file_provider(Options::default(), provider);
    cache.set_map(Some(ActiveMap {
        file_path: "maps/0.osu".to_owned(),
        num_circles: 105,
        num_sliders: 15,
        num_spinners: 0,
    }));

    let request = PpCalcRequest::perfect(&Mods::from_flags(ModFlags::Hidden), 9.0, 4.0, 8.0, 5.0);

    let first = cache.query(&request);
    // either still computing (sentinel) or already done; either way it
    // must converge to a real result
    let deadline = Instant::now() + Duration::from_secs(60);
    let mut result = first;
    while !result.is_ready() {
        assert!(Instant::now() < deadline, "cache never produced a result");
        std::thread::sleep(Duration::from_millis(5));
        result = cache.query(&request);
    }
    assert!(result.pp > 0.0);
    assert!(result.total_stars > 0.0);
    assert!(!result.aim_strains.is_empty());

    // switching the map away stops the worker and clears the cache
    cache.set_map(None);
    let after = cache.query(&request);
    assert!(!after.is_ready());
}
