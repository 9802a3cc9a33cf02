//! 改ざん検知付き監査台帳
//!
//! 追記専用のエントリ列をSHA-256ハッシュチェーンで保護する

/// 監査台帳の型定義
pub mod types;

/// ハッシュ入力用の正規化JSON
pub mod canonical;

/// SHA-256ハッシュチェーン（計算・検証）
pub mod hash_chain;

/// ベストエフォート非同期ライター
pub mod writer;
