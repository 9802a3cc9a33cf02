// データベース初期化とマイグレーション実行

use crate::common::error::RegistryError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// SQLiteデータベース接続プールを作成してマイグレーションを実行
///
/// データベースファイルが存在しない場合は作成する。
/// WALジャーナルと`busy_timeout`を設定し、台帳の書き込みロック待ちはタイムアウトまで待機する。
///
/// # Arguments
/// * `database_url` - データベースURL（例: "sqlite:data/fieldreg.db"）
/// * `busy_timeout` - ロック待ちの上限
pub async fn initialize_database(
    database_url: &str,
    busy_timeout: Duration,
) -> Result<SqlitePool, RegistryError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| RegistryError::Database(format!("Invalid database url: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout)
        .foreign_keys(true);

    tracing::info!("Opening database: {}", database_url);
    let pool = SqlitePoolOptions::new()
        .acquire_timeout(busy_timeout.max(Duration::from_secs(1)))
        .connect_with(options)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to connect to database", e))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// マイグレーションを実行（sqlx::migrate!マクロを使用）
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), RegistryError> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RegistryError::Database(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
