//! ハッシュ計算用の正規化JSON
//!
//! オブジェクトのキーを再帰的にソートし、空白なし・区切り`,`/`:`で出力する。
//! キー順序が異なるだけの同値ペイロードは同一バイト列になる。
//! このフォーマットを変えると既存チェーンの検証がすべて失敗するため、
//! 変更時は`CANONICAL_FORMAT_VERSION`を上げて新旧を併存させること。

use serde_json::{Map, Value};

/// 正規化フォーマットのバージョン
pub const CANONICAL_FORMAT_VERSION: u32 = 1;

/// 値を正規化JSON文字列に変換
///
/// - キーはUTF-8バイト列の辞書順
/// - 文字列はserde_jsonのエスケープ規則
/// - 数値はserde_jsonの最短表現
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// detailsを正規化前の形に揃える（null/未指定は空オブジェクト）
pub fn normalize_details(details: Option<&Value>) -> Value {
    match details {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(v) => v.clone(),
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key.as_str()) {
                    write_value(out, v);
                }
            }
            out.push('}');
        }
    }
}
