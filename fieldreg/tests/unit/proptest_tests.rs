//! Property-based tests using proptest

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use fieldreg::audit::canonical::canonicalize;
use fieldreg::audit::hash_chain::compute_entry_hash;
use fieldreg::fraud::cluster::UnionFind;
use fieldreg::fraud::build_clusters;
use fieldreg::types::{ComponentScores, FlaggedDetection, ProximityRef, Severity};

const SEVERITIES: [Severity; 5] = [
    Severity::Clean,
    Severity::Low,
    Severity::Medium,
    Severity::High,
    Severity::Critical,
];

/// n件の検知レコードとインデックス間の近接参照から入力を組み立てる
fn detections(n: usize, edges: &[(usize, usize)]) -> Vec<FlaggedDetection> {
    let base = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();
    let mut out: Vec<FlaggedDetection> = (0..n)
        .map(|i| FlaggedDetection {
            id: format!("det-{:03}", i),
            submission_id: format!("sub-{:03}", i),
            owner_id: format!("owner-{}", i % 3),
            owner_name: None,
            computed_at: base + Duration::minutes(i as i64),
            latitude: Some(9.0 + i as f64 * 0.0001),
            longitude: Some(7.4 + i as f64 * 0.0001),
            scores: ComponentScores {
                gps_cluster: 10.0,
                ..Default::default()
            },
            total_score: 20.0 + i as f64,
            severity: SEVERITIES[i % SEVERITIES.len()],
            resolution: None,
            resolution_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            proximity_refs: Vec::new(),
        })
        .collect();

    for &(a, b) in edges {
        let (a, b) = (a % n, b % n);
        let target = ProximityRef {
            submission_id: out[b].submission_id.clone(),
            lat: 0.0,
            lng: 0.0,
            observed_at: out[b].computed_at,
        };
        out[a].proximity_refs.push(target);
    }
    out
}

fn edges_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..25).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..40)))
}

// ---------------------------------------------------------------------------
// build_clusters
// ---------------------------------------------------------------------------

proptest! {
    /// 単独のレコードはクラスタにならず、メンバーはID昇順でcluster_idは最小ID
    #[test]
    fn clusters_have_two_or_more_sorted_members((n, edges) in edges_strategy()) {
        let input = detections(n, &edges);
        for cluster in build_clusters(&input, 50.0) {
            prop_assert!(cluster.member_ids.len() >= 2);
            let mut sorted = cluster.member_ids.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, &cluster.member_ids);
            prop_assert_eq!(&cluster.cluster_id, &cluster.member_ids[0]);
            prop_assert!(cluster.severity_range.min <= cluster.severity_range.max);
            prop_assert!(cluster.time_range.start <= cluster.time_range.end);
        }
    }

    /// 各レコードは高々1つのクラスタに属する
    #[test]
    fn clusters_are_disjoint((n, edges) in edges_strategy()) {
        let input = detections(n, &edges);
        let mut seen = HashSet::new();
        for cluster in build_clusters(&input, 50.0) {
            for id in cluster.member_ids {
                prop_assert!(seen.insert(id.clone()), "{} appears twice", id);
            }
        }
    }

    /// 参照で結ばれたレコードは同じクラスタに入る（推移的）
    #[test]
    fn linked_records_share_a_cluster((n, edges) in edges_strategy()) {
        let input = detections(n, &edges);
        let clusters = build_clusters(&input, 50.0);
        let cluster_of: HashMap<&str, &str> = clusters
            .iter()
            .flat_map(|c| c.member_ids.iter().map(move |id| (id.as_str(), c.cluster_id.as_str())))
            .collect();

        for &(a, b) in &edges {
            let (a, b) = (a % n, b % n);
            if a == b {
                continue;
            }
            let left = cluster_of.get(input[a].id.as_str());
            let right = cluster_of.get(input[b].id.as_str());
            prop_assert!(left.is_some() && left == right);
        }
    }

    /// 入力順序を反転しても結果は同一
    #[test]
    fn clustering_is_order_independent((n, edges) in edges_strategy()) {
        let input = detections(n, &edges);
        let mut reversed = input.clone();
        reversed.reverse();
        prop_assert_eq!(build_clusters(&input, 50.0), build_clusters(&reversed, 50.0));
    }

    /// クラスタはメンバー数降順、同数はcluster_id昇順
    #[test]
    fn clusters_are_ordered_by_size_then_id((n, edges) in edges_strategy()) {
        let clusters = build_clusters(&detections(n, &edges), 50.0);
        for pair in clusters.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.member_ids.len() > b.member_ids.len()
                    || (a.member_ids.len() == b.member_ids.len() && a.cluster_id < b.cluster_id)
            );
        }
    }

    /// UnionFind: union後は同じ代表元を持つ
    #[test]
    fn union_find_merges_sets(
        n in 1usize..50,
        pairs in prop::collection::vec((0usize..50, 0usize..50), 0..60),
    ) {
        let mut uf = UnionFind::new(n);
        for &(a, b) in &pairs {
            let (a, b) = (a % n, b % n);
            uf.union(a, b);
            prop_assert_eq!(uf.find(a), uf.find(b));
        }
        prop_assert_eq!(uf.len(), n);
    }
}

// ---------------------------------------------------------------------------
// canonicalize / compute_entry_hash
// ---------------------------------------------------------------------------

fn object_from(pairs: &[(String, i64)]) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.clone(), Value::from(*v));
    }
    Value::Object(map)
}

proptest! {
    /// キーの挿入順序に関わらず正規化結果は同一
    #[test]
    fn canonical_form_ignores_key_order(
        pairs in prop::collection::vec(("[a-zA-Z_]{1,8}", any::<i64>()), 0..12),
    ) {
        let mut dedup: Vec<(String, i64)> = Vec::new();
        for (k, v) in pairs {
            if !dedup.iter().any(|(existing, _)| existing == &k) {
                dedup.push((k, v));
            }
        }
        let forward = object_from(&dedup);
        let mut reversed_pairs = dedup.clone();
        reversed_pairs.reverse();
        let reversed = object_from(&reversed_pairs);

        prop_assert_eq!(canonicalize(&forward), canonicalize(&reversed));
    }

    /// 正規化JSONは元の値として読み戻せる
    #[test]
    fn canonical_form_parses_back(
        pairs in prop::collection::vec(("[a-z]{1,6}", "[ -~]{0,12}"), 0..8),
    ) {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert(k, Value::String(v));
        }
        let value = Value::Object(map);
        let parsed: Value = serde_json::from_str(&canonicalize(&value)).unwrap();
        prop_assert_eq!(parsed, value);
    }

    /// detailsの値が変わればハッシュも変わる
    #[test]
    fn entry_hash_changes_with_details(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let created_at = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();
        let left = compute_entry_hash(
            "entry-1",
            "fraud_detection.bulk_reviewed",
            Some("sup-1"),
            &created_at,
            Some(&serde_json::json!({ "count": a })),
            "prev",
        );
        let right = compute_entry_hash(
            "entry-1",
            "fraud_detection.bulk_reviewed",
            Some("sup-1"),
            &created_at,
            Some(&serde_json::json!({ "count": b })),
            "prev",
        );
        prop_assert_ne!(left, right);
    }
}
