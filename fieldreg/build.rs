fn main() {
    // sqlx::migrate! はコンパイル時にmigrationsを埋め込むため、変更時に再ビルドさせる
    println!("cargo:rerun-if-changed=migrations");
}
