//! GPS近接クラスタ
//!
//! 検知レコードの近接参照を辺とみなし、Union-Findで連結成分にまとめる。
//! 2件未満の成分はクラスタとして扱わない。
//! 出力は入力順に依存しない（メンバーIDは昇順、クラスタはメンバー数降順・clusterId昇順）。

use crate::types::{ComponentScores, FlaggedDetection, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 素集合データ構造（経路圧縮 + ランクによる併合）
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// `n`個の単一要素集合で初期化
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// 要素数
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// 要素がないか
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// 代表元を返す（反復実装、経路上の全要素を根へ付け替える）
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// 2要素の集合を併合。既に同じ集合ならfalse
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }
}

/// 緯度経度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    /// 緯度
    pub lat: f64,
    /// 経度
    pub lng: f64,
}

/// 時刻範囲
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    /// 最古
    pub start: DateTime<Utc>,
    /// 最新
    pub end: DateTime<Utc>,
}

/// 深刻度の範囲
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityRange {
    /// 最小
    pub min: Severity,
    /// 最大
    pub max: Severity,
}

/// クラスタメンバーの詳細
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterMember {
    /// 検知ID
    pub id: String,
    /// 提出ID
    pub submission_id: String,
    /// 提出者ID
    pub owner_id: String,
    /// 提出者の表示名
    pub owner_name: Option<String>,
    /// 緯度
    pub latitude: Option<f64>,
    /// 経度
    pub longitude: Option<f64>,
    /// スコア算出時刻
    pub computed_at: DateTime<Utc>,
    /// ヒューリスティック別スコア
    pub scores: ComponentScores,
    /// 合計スコア
    pub total_score: f64,
    /// 深刻度
    pub severity: Severity,
}

impl From<&FlaggedDetection> for ClusterMember {
    fn from(d: &FlaggedDetection) -> Self {
        Self {
            id: d.id.clone(),
            submission_id: d.submission_id.clone(),
            owner_id: d.owner_id.clone(),
            owner_name: d.owner_name.clone(),
            latitude: d.latitude,
            longitude: d.longitude,
            computed_at: d.computed_at,
            scores: d.scores,
            total_score: d.total_score,
            severity: d.severity,
        }
    }
}

/// 近接クラスタ（永続化しない派生値）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    /// 辞書順最小のメンバーID
    pub cluster_id: String,
    /// メンバーID（昇順、2件以上）
    pub member_ids: Vec<String>,
    /// 座標を持つメンバーの平均位置（該当なしはNone）
    pub center: Option<GeoPoint>,
    /// 設定上のクラスタ半径（メートル、表示用）
    pub radius_m: f64,
    /// スコア算出時刻の範囲
    pub time_range: TimeRange,
    /// 深刻度の範囲
    pub severity_range: SeverityRange,
    /// 合計スコアの平均（小数第2位で丸め）
    pub total_score_avg: f64,
    /// 提出者ID→表示名（表示名不明の場合はID）
    pub owners: BTreeMap<String, String>,
    /// メンバー詳細（ID昇順）
    pub members: Vec<ClusterMember>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// 検知レコードをクラスタにまとめる
///
/// 入力は呼び出し側で絞り込み済み（未レビュー・GPSスコア正・スコープ内）であること。
/// 自己参照と入力外の提出データへの参照は無視する。
pub fn build_clusters(detections: &[FlaggedDetection], radius_m: f64) -> Vec<Cluster> {
    if detections.len() < 2 {
        return Vec::new();
    }

    let by_submission: HashMap<&str, usize> = detections
        .iter()
        .enumerate()
        .map(|(i, d)| (d.submission_id.as_str(), i))
        .collect();

    let mut uf = UnionFind::new(detections.len());
    for (i, d) in detections.iter().enumerate() {
        for r in &d.proximity_refs {
            if let Some(&j) = by_submission.get(r.submission_id.as_str()) {
                if j != i {
                    uf.union(i, j);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..detections.len() {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| summarize(detections, members, radius_m))
        .collect();

    clusters.sort_by(|a, b| {
        b.member_ids
            .len()
            .cmp(&a.member_ids.len())
            .then_with(|| a.cluster_id.cmp(&b.cluster_id))
    });
    clusters
}

fn summarize(detections: &[FlaggedDetection], mut indices: Vec<usize>, radius_m: f64) -> Cluster {
    indices.sort_by(|&a, &b| detections[a].id.cmp(&detections[b].id));
    let members: Vec<&FlaggedDetection> = indices.iter().map(|&i| &detections[i]).collect();

    let member_ids: Vec<String> = members.iter().map(|d| d.id.clone()).collect();
    let cluster_id = member_ids[0].clone();

    let located: Vec<(f64, f64)> = members
        .iter()
        .filter_map(|d| Some((d.latitude?, d.longitude?)))
        .collect();
    let center = if located.is_empty() {
        None
    } else {
        let n = located.len() as f64;
        Some(GeoPoint {
            lat: located.iter().map(|(lat, _)| lat).sum::<f64>() / n,
            lng: located.iter().map(|(_, lng)| lng).sum::<f64>() / n,
        })
    };

    let first = members[0];
    let mut time_range = TimeRange {
        start: first.computed_at,
        end: first.computed_at,
    };
    let mut severity_range = SeverityRange {
        min: first.severity,
        max: first.severity,
    };
    let mut total = 0.0;
    let mut owners = BTreeMap::new();

    for d in &members {
        time_range.start = time_range.start.min(d.computed_at);
        time_range.end = time_range.end.max(d.computed_at);
        severity_range.min = severity_range.min.min(d.severity);
        severity_range.max = severity_range.max.max(d.severity);
        total += d.total_score;

        let name = d.owner_name.clone().unwrap_or_else(|| d.owner_id.clone());
        owners.entry(d.owner_id.clone()).or_insert(name);
    }

    Cluster {
        cluster_id,
        member_ids,
        center,
        radius_m,
        time_range,
        severity_range,
        total_score_avg: round2(total / members.len() as f64),
        owners,
        members: members.into_iter().map(ClusterMember::from).collect(),
    }
}
