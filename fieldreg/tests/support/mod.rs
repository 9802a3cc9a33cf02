// 統合テスト共通ヘルパー

pub mod http;
pub mod review;
